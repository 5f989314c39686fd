// ==========================================
// 产品目录导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::error::ImportResult;
use async_trait::async_trait;

/// 默认单次下载超时（秒）
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 15;
/// 默认并发下载数
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;
/// 默认料号最大长度（字符）
pub const DEFAULT_PART_NUMBER_MAX_LEN: usize = 100;
/// 默认描述（料号与描述均为空时）
pub const DEFAULT_DESCRIPTION: &str = "No description";
/// 默认分类（文件名无法派生分类时）
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）, ImportConfig（静态配置）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取单次图片下载超时（秒）
    ///
    /// # 默认值
    /// - 15
    async fn get_download_timeout_secs(&self) -> ImportResult<u64>;

    /// 获取并发下载数（≥1）
    ///
    /// # 默认值
    /// - 4
    async fn get_download_concurrency(&self) -> ImportResult<usize>;

    /// 获取料号最大长度（超出截断）
    ///
    /// # 默认值
    /// - 100
    async fn get_part_number_max_len(&self) -> ImportResult<usize>;

    /// 获取默认描述
    async fn get_default_description(&self) -> ImportResult<String>;

    /// 获取默认分类
    async fn get_default_category(&self) -> ImportResult<String>;

    /// 一次性读取全部导入配置
    async fn load_import_config(&self) -> ImportResult<ImportConfig> {
        Ok(ImportConfig {
            download_timeout_secs: self.get_download_timeout_secs().await?,
            download_concurrency: self.get_download_concurrency().await?.max(1),
            part_number_max_len: self.get_part_number_max_len().await?,
            default_description: self.get_default_description().await?,
            default_category: self.get_default_category().await?,
        })
    }
}

// ==========================================
// ImportConfig - 单次导入使用的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub download_timeout_secs: u64,
    pub download_concurrency: usize,
    pub part_number_max_len: usize,
    pub default_description: String,
    pub default_category: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            part_number_max_len: DEFAULT_PART_NUMBER_MAX_LEN,
            default_description: DEFAULT_DESCRIPTION.to_string(),
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

#[async_trait]
impl ImportConfigReader for ImportConfig {
    async fn get_download_timeout_secs(&self) -> ImportResult<u64> {
        Ok(self.download_timeout_secs)
    }

    async fn get_download_concurrency(&self) -> ImportResult<usize> {
        Ok(self.download_concurrency)
    }

    async fn get_part_number_max_len(&self) -> ImportResult<usize> {
        Ok(self.part_number_max_len)
    }

    async fn get_default_description(&self) -> ImportResult<String> {
        Ok(self.default_description.clone())
    }

    async fn get_default_category(&self) -> ImportResult<String> {
        Ok(self.default_category.clone())
    }
}
