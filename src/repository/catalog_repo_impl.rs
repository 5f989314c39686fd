// ==========================================
// 产品目录导入 - 目录仓储实现
// ==========================================
// 职责: 实现 CatalogStore（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::product::{ProductFields, ProductRecord};
use crate::repository::catalog_repo::CatalogStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, part_number, description, image, category, price, quantity, \
     unit, brand, model, created_at, updated_at";

// ==========================================
// CatalogStoreImpl
// ==========================================
pub struct CatalogStoreImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogStoreImpl {
    /// 创建新的 Repository 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库（测试/一次性导入）
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与 ConfigManager 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 共享连接句柄
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductRecord> {
        Ok(ProductRecord {
            id: row.get(0)?,
            part_number: row.get(1)?,
            description: row.get(2)?,
            image: row.get(3)?,
            category: row.get(4)?,
            price: row.get(5)?,
            quantity: row.get(6)?,
            unit: row.get(7)?,
            brand: row.get(8)?,
            model: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn find_one(&self, column: &str, value: &str) -> RepositoryResult<Option<ProductRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM product WHERE {} = ?1 LIMIT 1",
            SELECT_COLUMNS, column
        );
        let record = conn
            .query_row(&sql, params![value], Self::map_row)
            .optional()?;
        Ok(record)
    }
}

#[async_trait]
impl CatalogStore for CatalogStoreImpl {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ProductRecord>> {
        self.find_one("id", id)
    }

    async fn find_by_part_number(
        &self,
        part_number: &str,
    ) -> RepositoryResult<Option<ProductRecord>> {
        self.find_one("part_number", part_number)
    }

    async fn create(
        &self,
        fields: ProductFields,
        id: Option<&str>,
    ) -> RepositoryResult<ProductRecord> {
        let id = id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO product (
                id, part_number, description, image, category, price, quantity,
                unit, brand, model, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                id,
                fields.part_number,
                fields.description,
                fields.image,
                fields.category,
                fields.price,
                fields.quantity,
                fields.unit,
                fields.brand,
                fields.model,
                now,
                now,
            ],
        )?;

        Ok(ProductRecord {
            id,
            part_number: fields.part_number,
            description: fields.description,
            image: fields.image,
            category: fields.category,
            price: fields.price,
            quantity: fields.quantity,
            unit: fields.unit,
            brand: fields.brand,
            model: fields.model,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(
        &self,
        record: &ProductRecord,
        fields: ProductFields,
    ) -> RepositoryResult<ProductRecord> {
        let now = Utc::now();

        let conn = self.lock()?;
        let changed = conn.execute(
            r#"
            UPDATE product SET
                part_number = ?1, description = ?2, image = ?3, category = ?4,
                price = ?5, quantity = ?6, unit = ?7, brand = ?8, model = ?9,
                updated_at = ?10
            WHERE id = ?11
            "#,
            params![
                fields.part_number,
                fields.description,
                fields.image,
                fields.category,
                fields.price,
                fields.quantity,
                fields.unit,
                fields.brand,
                fields.model,
                now,
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "product".to_string(),
                id: record.id.clone(),
            });
        }

        Ok(ProductRecord {
            id: record.id.clone(),
            part_number: fields.part_number,
            description: fields.description,
            image: fields.image,
            category: fields.category,
            price: fields.price,
            quantity: fields.quantity,
            unit: fields.unit,
            brand: fields.brand,
            model: fields.model,
            created_at: record.created_at,
            updated_at: now,
        })
    }

    async fn count(&self) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
