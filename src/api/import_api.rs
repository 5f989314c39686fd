// ==========================================
// 产品目录导入API
// ==========================================
// 职责: 封装目录导入，输出统一响应信封
// 响应: { success: true, ...ImportOutcome } 或 { success: false, error }
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::open_sqlite_connection;
use crate::domain::import::ImportOutcome;
use crate::importer::{CatalogImporter, CatalogImporterImpl, ImportResult};
use crate::repository::{CatalogStoreImpl, RepositoryError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// 导入API响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 导入是否完成（行级失败不影响）
    pub success: bool,
    /// 导入结果（成功时展开到顶层）
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ImportOutcome>,
    /// 失败原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportApiResponse {
    pub fn ok(outcome: ImportOutcome) -> Self {
        Self {
            success: true,
            outcome: Some(outcome),
            error: None,
        }
    }

    pub fn fail(err: ApiError) -> Self {
        Self {
            success: false,
            outcome: None,
            error: Some(err.to_string()),
        }
    }
}

/// 目录导入API
pub struct ImportApi {
    importer: Arc<dyn CatalogImporter>,
}

impl ImportApi {
    /// 基于 SQLite 文件创建（目录存储与配置共享同一连接）
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(RepositoryError::from)?;
        let conn = Arc::new(Mutex::new(conn));

        let store = CatalogStoreImpl::from_connection(Arc::clone(&conn))?;
        let config = ConfigManager::from_connection(conn)?;

        Ok(Self {
            importer: Arc::new(CatalogImporterImpl::new(Arc::new(store), config)),
        })
    }

    /// 使用外部构造的导入器
    pub fn with_importer(importer: Arc<dyn CatalogImporter>) -> Self {
        Self { importer }
    }

    /// 导入上传内容
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名
    /// - base_dir: 相对图片路径的基准目录
    pub async fn import_catalog(
        &self,
        bytes: &[u8],
        file_name: &str,
        base_dir: Option<&Path>,
    ) -> ImportApiResponse {
        if file_name.trim().is_empty() {
            return ImportApiResponse::fail(ApiError::InvalidInput("文件名不能为空".to_string()));
        }
        let result = self.importer.import_bytes(bytes, file_name, base_dir).await;
        Self::respond(file_name, result)
    }

    /// 导入磁盘文件
    pub async fn import_catalog_file(&self, file_path: &Path) -> ImportApiResponse {
        let result = self.importer.import_file(file_path).await;
        Self::respond(&file_path.display().to_string(), result)
    }

    fn respond(source: &str, result: ImportResult<ImportOutcome>) -> ImportApiResponse {
        match result {
            Ok(outcome) => {
                info!(
                    source = %source,
                    added = outcome.added,
                    updated = outcome.updated,
                    skipped = outcome.skipped,
                    "导入请求完成"
                );
                ImportApiResponse::ok(outcome)
            }
            Err(e) => {
                let api_error = ApiError::from(e);
                error!(source = %source, error = %api_error, "导入请求失败");
                ImportApiResponse::fail(api_error)
            }
        }
    }
}
