// ==========================================
// 并发导入测试
// ==========================================
// 测试目标: 先查后建无锁,同一引用的并发导入会产生重复实体（已知竞态）
// ==========================================


use async_trait::async_trait;
use deposit_import::domain::{
    Attachment, CatalogTerm, DepositEntity, EntityId, EntityKind, ImportRequest, MetaWrite,
    PostStatus, ProductEntity, Taxonomy,
};
use deposit_import::engine::ReconciliationEngine;
use deposit_import::logging;
use deposit_import::repository::{CatalogStore, RepositoryResult, SqliteCatalogStore};
use serde_json::json;
use std::sync::Arc;
use test_helpers::create_test_store;

/// 在自然键查找之后让出执行权,使两个导入交错
struct YieldingStore {
    inner: Arc<SqliteCatalogStore>,
}

#[async_trait]
impl CatalogStore for YieldingStore {
    async fn find_deposit_by_reference(&self, reference: &str) -> RepositoryResult<Option<EntityId>> {
        let found = self.inner.find_deposit_by_reference(reference).await;
        tokio::task::yield_now().await;
        found
    }

    async fn get_deposit(&self, id: EntityId) -> RepositoryResult<Option<DepositEntity>> {
        self.inner.get_deposit(id).await
    }

    async fn save_deposit(&self, deposit: &DepositEntity) -> RepositoryResult<EntityId> {
        self.inner.save_deposit(deposit).await
    }

    async fn find_product_by_sku(&self, sku: &str) -> RepositoryResult<Option<ProductEntity>> {
        let found = self.inner.find_product_by_sku(sku).await;
        tokio::task::yield_now().await;
        found
    }

    async fn save_product(&self, product: &ProductEntity) -> RepositoryResult<EntityId> {
        self.inner.save_product(product).await
    }

    async fn set_status(&self, id: EntityId, status: PostStatus) -> RepositoryResult<EntityId> {
        self.inner.set_status(id, status).await
    }

    async fn get_meta(&self, entity: EntityId, key: &str) -> RepositoryResult<Option<String>> {
        self.inner.get_meta(entity, key).await
    }

    async fn set_meta(&self, entity: EntityId, key: &str, value: &str) -> RepositoryResult<MetaWrite> {
        self.inner.set_meta(entity, key, value).await
    }

    async fn find_term_by_name(&self, taxonomy: Taxonomy, name: &str) -> RepositoryResult<Option<CatalogTerm>> {
        self.inner.find_term_by_name(taxonomy, name).await
    }

    async fn find_term_by_slug(&self, taxonomy: Taxonomy, slug: &str) -> RepositoryResult<Option<CatalogTerm>> {
        self.inner.find_term_by_slug(taxonomy, slug).await
    }

    async fn insert_term(
        &self,
        taxonomy: Taxonomy,
        name: &str,
        slug: Option<&str>,
        parent: Option<EntityId>,
    ) -> RepositoryResult<CatalogTerm> {
        self.inner.insert_term(taxonomy, name, slug, parent).await
    }

    async fn assign_terms(
        &self,
        entity: EntityId,
        taxonomy: Taxonomy,
        term_ids: &[EntityId],
    ) -> RepositoryResult<()> {
        self.inner.assign_terms(entity, taxonomy, term_ids).await
    }

    async fn get_term_meta(&self, term: EntityId, key: &str) -> RepositoryResult<Option<String>> {
        self.inner.get_term_meta(term, key).await
    }

    async fn set_term_meta(&self, term: EntityId, key: &str, value: &str) -> RepositoryResult<MetaWrite> {
        self.inner.set_term_meta(term, key, value).await
    }

    async fn find_attachment(&self, fragment: &str) -> RepositoryResult<Option<Attachment>> {
        self.inner.find_attachment(fragment).await
    }
}

fn request(designation: &str) -> ImportRequest {
    serde_json::from_value(json!({
        "siteData": {"deposit_name": "DEP-1", "building_name": "Halle", "provider": "Bailleur"},
        "depositData": [{"ref": "A1", "designation": designation, "qty": 1, "deposit": "DEP-1"}],
        "update_qty": true
    }))
    .unwrap()
}

#[tokio::test]
async fn test_concurrent_same_reference_creates_duplicates() {
    logging::init_test();

    let (_temp_file, store) = create_test_store().unwrap();
    let racing: Arc<dyn CatalogStore> = Arc::new(YieldingStore { inner: store.clone() });
    let first = ReconciliationEngine::new(racing.clone());
    let second = ReconciliationEngine::new(racing);

    let first_request = request("Porte A");
    let second_request = request("Porte B");
    let (a, b) = tokio::join!(first.import(&first_request), second.import(&second_request));

    // 两次查找都发生在任一写入之前,各自新建
    assert_ne!(a.deposit_id, b.deposit_id);
    assert_ne!(a.product_ids, b.product_ids);
    assert_eq!(store.count_entities(EntityKind::Deposit).unwrap(), 2);
    assert_eq!(store.count_entities(EntityKind::Product).unwrap(), 2);
}

#[tokio::test]
async fn test_sequential_same_reference_does_not_duplicate() {
    let (_temp_file, store) = create_test_store().unwrap();
    let engine = ReconciliationEngine::new(store.clone());

    engine.import(&request("Porte A")).await;
    engine.import(&request("Porte B")).await;

    assert_eq!(store.count_entities(EntityKind::Deposit).unwrap(), 1);
    assert_eq!(store.count_entities(EntityKind::Product).unwrap(), 1);
    let product = store.find_product_by_sku("A1").await.unwrap().unwrap();
    assert_eq!(product.name, "Porte B");
}
