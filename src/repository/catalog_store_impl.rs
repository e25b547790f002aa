// ==========================================
// 物料盘点导入系统 - 目录存储 SQLite 实现
// ==========================================
// 职责: 实现 CatalogStore（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema};
use crate::domain::catalog::{
    sanitize_slug, Attachment, CatalogTerm, DepositEntity, EntityId, MetaWrite, ProductDimensions,
    ProductEntity,
};
use crate::domain::types::{EntityKind, PostStatus, ProductKind, Taxonomy};
use crate::repository::catalog_store::CatalogStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const PRODUCT_COLUMNS: &str = "id, kind, product_type, sku, parent_id, title, content, status, \
     price, regular_price, manage_stock, stock_quantity, length, width, height, \
     attributes_json, variation_attributes_json, image_id, gallery_json";

/// LIKE 模式转义（'\\' 作为 ESCAPE 字符）
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn parse_status(raw: &str) -> RepositoryResult<PostStatus> {
    PostStatus::parse(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "status".to_string(),
        message: format!("未知发布状态: {}", raw),
    })
}

fn parse_taxonomy(raw: &str) -> RepositoryResult<Taxonomy> {
    match raw {
        "city" => Ok(Taxonomy::City),
        "deposit_type" => Ok(Taxonomy::DepositType),
        "product_cat" => Ok(Taxonomy::ProductCategory),
        other => Err(RepositoryError::FieldValueError {
            field: "taxonomy".to_string(),
            message: format!("未知分类法: {}", other),
        }),
    }
}

/// 行 -> 物料原始列（JSON 列与枚举列稍后解析）
struct ProductRow {
    id: EntityId,
    kind: String,
    product_type: Option<String>,
    sku: Option<String>,
    parent_id: Option<EntityId>,
    title: String,
    content: String,
    status: String,
    price: String,
    regular_price: String,
    manage_stock: bool,
    stock_quantity: Option<i64>,
    length: String,
    width: String,
    height: String,
    attributes_json: String,
    variation_attributes_json: String,
    image_id: Option<EntityId>,
    gallery_json: String,
}

impl ProductRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            product_type: row.get(2)?,
            sku: row.get(3)?,
            parent_id: row.get(4)?,
            title: row.get(5)?,
            content: row.get(6)?,
            status: row.get(7)?,
            price: row.get(8)?,
            regular_price: row.get(9)?,
            manage_stock: row.get(10)?,
            stock_quantity: row.get(11)?,
            length: row.get(12)?,
            width: row.get(13)?,
            height: row.get(14)?,
            attributes_json: row.get(15)?,
            variation_attributes_json: row.get(16)?,
            image_id: row.get(17)?,
            gallery_json: row.get(18)?,
        })
    }

    fn into_entity(self) -> RepositoryResult<ProductEntity> {
        let kind = match self.product_type.as_deref().and_then(ProductKind::parse) {
            Some(kind) => kind,
            None if self.kind == EntityKind::ProductVariation.as_str() => ProductKind::Variation,
            None => ProductKind::Simple,
        };

        Ok(ProductEntity {
            id: Some(self.id),
            kind,
            sku: self.sku.unwrap_or_default(),
            parent_id: self.parent_id,
            name: self.title,
            description: self.content,
            price: self.price,
            regular_price: self.regular_price,
            manage_stock: self.manage_stock,
            stock_quantity: self.stock_quantity,
            dimensions: ProductDimensions {
                length: self.length,
                width: self.width,
                height: self.height,
            },
            attributes: serde_json::from_str(&self.attributes_json)?,
            variation_attributes: serde_json::from_str(&self.variation_attributes_json)?,
            image_id: self.image_id,
            gallery_ids: serde_json::from_str(&self.gallery_json)?,
            status: parse_status(&self.status)?,
        })
    }
}

fn entity_kind_of(kind: ProductKind) -> EntityKind {
    match kind {
        ProductKind::Variation => EntityKind::ProductVariation,
        ProductKind::Simple | ProductKind::Variable => EntityKind::Product,
    }
}

fn term_from_row(row: &Row<'_>) -> rusqlite::Result<(EntityId, String, String, String, Option<EntityId>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn build_term(raw: (EntityId, String, String, String, Option<EntityId>)) -> RepositoryResult<CatalogTerm> {
    let (id, taxonomy, name, slug, parent) = raw;
    Ok(CatalogTerm {
        id,
        taxonomy: parse_taxonomy(&taxonomy)?,
        name,
        slug,
        parent,
    })
}

// ==========================================
// SqliteCatalogStore
// ==========================================
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// 创建新的 Store 实例（建表幂等）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从共享连接创建（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 内存库（测试与一次性导入）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = crate::db::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 非契约辅助方法（媒体登记、查询、测试断言） =====

    /// 登记附件
    pub fn insert_attachment(&self, guid: &str, url: &str, title: &str) -> RepositoryResult<EntityId> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO attachment (guid, url, title) VALUES (?1, ?2, ?3)",
            params![guid, url, title],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 统计某类实体数量
    pub fn count_entities(&self, kind: EntityKind) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM entity WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 按 id 读取物料或变体
    pub fn get_product(&self, id: EntityId) -> RepositoryResult<Option<ProductEntity>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM entity WHERE id = ?1 AND kind IN ('product', 'product_variation')",
            PRODUCT_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![id], ProductRow::from_row)
            .optional()?;
        row.map(ProductRow::into_entity).transpose()
    }

    /// 实体在某分类法下的分类项
    pub fn entity_terms(&self, entity: EntityId, taxonomy: Taxonomy) -> RepositoryResult<Vec<CatalogTerm>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.id, t.taxonomy, t.name, t.slug, t.parent_id
            FROM entity_term et
            JOIN term t ON t.id = et.term_id
            WHERE et.entity_id = ?1 AND et.taxonomy = ?2
            ORDER BY t.id
            "#,
        )?;
        let rows = stmt
            .query_map(params![entity, taxonomy.as_str()], term_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(build_term).collect()
    }

    /// 可变物料下的变体（按 id 升序）
    pub fn list_variations(&self, parent: EntityId) -> RepositoryResult<Vec<ProductEntity>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM entity WHERE kind = 'product_variation' AND parent_id = ?1 ORDER BY id",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![parent], ProductRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ProductRow::into_entity).collect()
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find_deposit_by_reference(&self, reference: &str) -> RepositoryResult<Option<EntityId>> {
        let conn = self.get_conn()?;
        let id = conn
            .query_row(
                r#"
                SELECT e.id
                FROM entity e
                JOIN entity_meta m ON m.entity_id = e.id
                WHERE e.kind = 'deposit'
                  AND m.meta_key = 'reference'
                  AND m.meta_value LIKE ?1 ESCAPE '\'
                ORDER BY e.id
                LIMIT 1
                "#,
                params![escape_like(reference)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    async fn get_deposit(&self, id: EntityId) -> RepositoryResult<Option<DepositEntity>> {
        let conn = self.get_conn()?;
        let row: Option<(String, Option<String>, String, String)> = conn
            .query_row(
                "SELECT title, slug, content, status FROM entity WHERE id = ?1 AND kind = 'deposit'",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(title, slug, content, status)| {
            Ok(DepositEntity {
                id: Some(id),
                title,
                slug,
                content,
                status: parse_status(&status)?,
            })
        })
        .transpose()
    }

    async fn save_deposit(&self, deposit: &DepositEntity) -> RepositoryResult<EntityId> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();

        match deposit.id {
            Some(id) => {
                let affected = conn.execute(
                    r#"
                    UPDATE entity
                    SET title = ?1, slug = ?2, content = ?3, status = ?4, updated_at = ?5
                    WHERE id = ?6 AND kind = 'deposit'
                    "#,
                    params![
                        deposit.title,
                        deposit.slug,
                        deposit.content,
                        deposit.status.as_str(),
                        now,
                        id
                    ],
                )?;
                if affected == 0 {
                    return Err(RepositoryError::NotFound {
                        entity: "deposit".to_string(),
                        id: id.to_string(),
                    });
                }
                Ok(id)
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO entity (kind, title, slug, content, status, created_at, updated_at)
                    VALUES ('deposit', ?1, ?2, ?3, ?4, ?5, ?5)
                    "#,
                    params![
                        deposit.title,
                        deposit.slug,
                        deposit.content,
                        deposit.status.as_str(),
                        now
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            }
        }
    }

    async fn find_product_by_sku(&self, sku: &str) -> RepositoryResult<Option<ProductEntity>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM entity WHERE sku = ?1 AND kind IN ('product', 'product_variation') \
             ORDER BY id LIMIT 1",
            PRODUCT_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![sku], ProductRow::from_row)
            .optional()?;
        row.map(ProductRow::into_entity).transpose()
    }

    async fn save_product(&self, product: &ProductEntity) -> RepositoryResult<EntityId> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();
        let attributes_json = serde_json::to_string(&product.attributes)?;
        let variation_json = serde_json::to_string(&product.variation_attributes)?;
        let gallery_json = serde_json::to_string(&product.gallery_ids)?;
        let kind = entity_kind_of(product.kind);

        match product.id {
            Some(id) => {
                let affected = conn.execute(
                    r#"
                    UPDATE entity SET
                        kind = ?1, product_type = ?2, sku = ?3, parent_id = ?4, title = ?5,
                        content = ?6, status = ?7, price = ?8, regular_price = ?9,
                        manage_stock = ?10, stock_quantity = ?11, length = ?12, width = ?13,
                        height = ?14, attributes_json = ?15, variation_attributes_json = ?16,
                        image_id = ?17, gallery_json = ?18, updated_at = ?19
                    WHERE id = ?20
                    "#,
                    params![
                        kind.as_str(),
                        product.kind.as_str(),
                        product.sku,
                        product.parent_id,
                        product.name,
                        product.description,
                        product.status.as_str(),
                        product.price,
                        product.regular_price,
                        product.manage_stock,
                        product.stock_quantity,
                        product.dimensions.length,
                        product.dimensions.width,
                        product.dimensions.height,
                        attributes_json,
                        variation_json,
                        product.image_id,
                        gallery_json,
                        now,
                        id
                    ],
                )?;
                if affected == 0 {
                    return Err(RepositoryError::NotFound {
                        entity: kind.as_str().to_string(),
                        id: id.to_string(),
                    });
                }
                Ok(id)
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO entity (
                        kind, product_type, sku, parent_id, title, content, status, price,
                        regular_price, manage_stock, stock_quantity, length, width, height,
                        attributes_json, variation_attributes_json, image_id, gallery_json,
                        created_at, updated_at
                    ) VALUES (
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                        ?15, ?16, ?17, ?18, ?19, ?19
                    )
                    "#,
                    params![
                        kind.as_str(),
                        product.kind.as_str(),
                        product.sku,
                        product.parent_id,
                        product.name,
                        product.description,
                        product.status.as_str(),
                        product.price,
                        product.regular_price,
                        product.manage_stock,
                        product.stock_quantity,
                        product.dimensions.length,
                        product.dimensions.width,
                        product.dimensions.height,
                        attributes_json,
                        variation_json,
                        product.image_id,
                        gallery_json,
                        now
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            }
        }
    }

    async fn set_status(&self, id: EntityId, status: PostStatus) -> RepositoryResult<EntityId> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE entity SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "entity".to_string(),
                id: id.to_string(),
            });
        }
        Ok(id)
    }

    async fn get_meta(&self, entity: EntityId, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT meta_value FROM entity_meta WHERE entity_id = ?1 AND meta_key = ?2",
                params![entity, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set_meta(&self, entity: EntityId, key: &str, value: &str) -> RepositoryResult<MetaWrite> {
        let conn = self.get_conn()?;
        let current: Option<String> = conn
            .query_row(
                "SELECT meta_value FROM entity_meta WHERE entity_id = ?1 AND meta_key = ?2",
                params![entity, key],
                |row| row.get(0),
            )
            .optional()?;
        if current.as_deref() == Some(value) {
            return Ok(MetaWrite::Unchanged);
        }

        conn.execute(
            r#"
            INSERT INTO entity_meta (entity_id, meta_key, meta_value) VALUES (?1, ?2, ?3)
            ON CONFLICT(entity_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value
            "#,
            params![entity, key, value],
        )?;
        Ok(MetaWrite::Written)
    }

    async fn find_term_by_name(&self, taxonomy: Taxonomy, name: &str) -> RepositoryResult<Option<CatalogTerm>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, taxonomy, name, slug, parent_id FROM term
                WHERE taxonomy = ?1 AND name = ?2
                ORDER BY id LIMIT 1
                "#,
                params![taxonomy.as_str(), name],
                term_from_row,
            )
            .optional()?;
        row.map(build_term).transpose()
    }

    async fn find_term_by_slug(&self, taxonomy: Taxonomy, slug: &str) -> RepositoryResult<Option<CatalogTerm>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT id, taxonomy, name, slug, parent_id FROM term WHERE taxonomy = ?1 AND slug = ?2",
                params![taxonomy.as_str(), slug],
                term_from_row,
            )
            .optional()?;
        row.map(build_term).transpose()
    }

    async fn insert_term(
        &self,
        taxonomy: Taxonomy,
        name: &str,
        slug: Option<&str>,
        parent: Option<EntityId>,
    ) -> RepositoryResult<CatalogTerm> {
        let slug = match slug {
            Some(s) => s.to_string(),
            None => sanitize_slug(name),
        };
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO term (taxonomy, name, slug, parent_id) VALUES (?1, ?2, ?3, ?4)",
            params![taxonomy.as_str(), name, slug, parent],
        )?;

        Ok(CatalogTerm {
            id: conn.last_insert_rowid(),
            taxonomy,
            name: name.to_string(),
            slug,
            parent,
        })
    }

    async fn assign_terms(
        &self,
        entity: EntityId,
        taxonomy: Taxonomy,
        term_ids: &[EntityId],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM entity_term WHERE entity_id = ?1 AND taxonomy = ?2",
            params![entity, taxonomy.as_str()],
        )?;
        for term_id in term_ids {
            tx.execute(
                "INSERT OR IGNORE INTO entity_term (entity_id, taxonomy, term_id) VALUES (?1, ?2, ?3)",
                params![entity, taxonomy.as_str(), term_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn get_term_meta(&self, term: EntityId, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT meta_value FROM term_meta WHERE term_id = ?1 AND meta_key = ?2",
                params![term, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set_term_meta(&self, term: EntityId, key: &str, value: &str) -> RepositoryResult<MetaWrite> {
        let conn = self.get_conn()?;
        let current: Option<String> = conn
            .query_row(
                "SELECT meta_value FROM term_meta WHERE term_id = ?1 AND meta_key = ?2",
                params![term, key],
                |row| row.get(0),
            )
            .optional()?;
        if current.as_deref() == Some(value) {
            return Ok(MetaWrite::Unchanged);
        }

        conn.execute(
            r#"
            INSERT INTO term_meta (term_id, meta_key, meta_value) VALUES (?1, ?2, ?3)
            ON CONFLICT(term_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value
            "#,
            params![term, key, value],
        )?;
        Ok(MetaWrite::Written)
    }

    async fn find_attachment(&self, fragment: &str) -> RepositoryResult<Option<Attachment>> {
        let conn = self.get_conn()?;
        let pattern = format!("%{}%", escape_like(fragment));
        let row = conn
            .query_row(
                "SELECT id, url FROM attachment WHERE guid LIKE ?1 ESCAPE '\\' ORDER BY id LIMIT 1",
                params![pattern],
                |row| Ok(Attachment { id: row.get(0)?, url: row.get(1)? }),
            )
            .optional()?;
        Ok(row)
    }
}
