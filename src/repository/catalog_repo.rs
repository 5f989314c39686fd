// ==========================================
// 产品目录导入 - 目录仓储 Trait
// ==========================================
// 职责: 定义目录存储协作方接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::product::{ProductFields, ProductRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CatalogStore Trait
// ==========================================
// 用途: ImportReconciler 的唯一写入目标
// 实现者: CatalogStoreImpl（使用 rusqlite）
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 按持久化标识查询
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<ProductRecord>>;

    /// 按料号查询
    async fn find_by_part_number(&self, part_number: &str)
        -> RepositoryResult<Option<ProductRecord>>;

    /// 新建记录
    ///
    /// # 参数
    /// - fields: 写入字段
    /// - id: 指定标识；None 时由存储分配
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 料号或标识重复
    async fn create(&self, fields: ProductFields, id: Option<&str>)
        -> RepositoryResult<ProductRecord>;

    /// 原地更新记录，保持持久化标识不变
    async fn update(
        &self,
        record: &ProductRecord,
        fields: ProductFields,
    ) -> RepositoryResult<ProductRecord>;

    /// 统计记录数
    async fn count(&self) -> RepositoryResult<usize>;
}
