// ==========================================
// 物料盘点导入系统 - 目录存储 Trait
// ==========================================
// 职责: 对账引擎所依赖的最小目录存储契约（不包含实现）
// 红线: 不含业务规则,只做按键查找与读写
// ==========================================

use crate::domain::catalog::{
    Attachment, CatalogTerm, DepositEntity, EntityId, MetaWrite, ProductEntity,
};
use crate::domain::types::{PostStatus, Taxonomy};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CatalogStore Trait
// ==========================================
// 实现者: SqliteCatalogStore（使用 rusqlite）
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ===== 库存点 =====

    /// 按引用号查找库存点（LIKE 匹配 reference 元数据,大小写不敏感）
    ///
    /// # 返回
    /// - Some(id): 最早创建的匹配项
    /// - None: 不存在
    async fn find_deposit_by_reference(&self, reference: &str) -> RepositoryResult<Option<EntityId>>;

    async fn get_deposit(&self, id: EntityId) -> RepositoryResult<Option<DepositEntity>>;

    /// 保存库存点（id 为空时插入,否则更新）
    ///
    /// # 返回
    /// - Ok(EntityId): 实体标识
    async fn save_deposit(&self, deposit: &DepositEntity) -> RepositoryResult<EntityId>;

    // ===== 物料 / 变体 =====

    /// 按 SKU 查找物料或变体
    async fn find_product_by_sku(&self, sku: &str) -> RepositoryResult<Option<ProductEntity>>;

    /// 保存物料或变体（id 为空时插入,否则更新）
    async fn save_product(&self, product: &ProductEntity) -> RepositoryResult<EntityId>;

    // ===== 状态 =====

    /// 变更发布状态
    ///
    /// # 返回
    /// - Ok(EntityId): 存储实际更新的实体标识（调用方需与预期比对）
    async fn set_status(&self, id: EntityId, status: PostStatus) -> RepositoryResult<EntityId>;

    // ===== 元数据 =====

    async fn get_meta(&self, entity: EntityId, key: &str) -> RepositoryResult<Option<String>>;

    /// 写入元数据
    ///
    /// # 返回
    /// - MetaWrite::Written: 已写入
    /// - MetaWrite::Unchanged: 值相同,未执行写入
    async fn set_meta(&self, entity: EntityId, key: &str, value: &str) -> RepositoryResult<MetaWrite>;

    // ===== 分类 =====

    async fn find_term_by_name(&self, taxonomy: Taxonomy, name: &str) -> RepositoryResult<Option<CatalogTerm>>;

    async fn find_term_by_slug(&self, taxonomy: Taxonomy, slug: &str) -> RepositoryResult<Option<CatalogTerm>>;

    /// 新建分类项
    ///
    /// # 参数
    /// - slug: 为空时由名称生成
    /// - parent: 父分类（类目挂在物料族下）
    async fn insert_term(
        &self,
        taxonomy: Taxonomy,
        name: &str,
        slug: Option<&str>,
        parent: Option<EntityId>,
    ) -> RepositoryResult<CatalogTerm>;

    /// 覆盖实体在某分类法下的分类项
    async fn assign_terms(
        &self,
        entity: EntityId,
        taxonomy: Taxonomy,
        term_ids: &[EntityId],
    ) -> RepositoryResult<()>;

    async fn get_term_meta(&self, term: EntityId, key: &str) -> RepositoryResult<Option<String>>;

    async fn set_term_meta(&self, term: EntityId, key: &str, value: &str) -> RepositoryResult<MetaWrite>;

    // ===== 附件 =====

    /// 按文件名片段模糊查找附件（GUID 包含该片段）
    async fn find_attachment(&self, fragment: &str) -> RepositoryResult<Option<Attachment>>;
}
