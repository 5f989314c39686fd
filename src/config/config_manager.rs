// ==========================================
// 产品目录导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    ImportConfigReader, DEFAULT_CATEGORY, DEFAULT_DESCRIPTION, DEFAULT_DOWNLOAD_CONCURRENCY,
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_PART_NUMBER_MAX_LEN,
};
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    pub const DOWNLOAD_TIMEOUT_SECS: &str = "import.download_timeout_secs";
    pub const DOWNLOAD_CONCURRENCY: &str = "import.download_concurrency";
    pub const PART_NUMBER_MAX_LEN: &str = "import.part_number_max_len";
    pub const DEFAULT_DESCRIPTION: &str = "import.default_description";
    pub const DEFAULT_CATEGORY: &str = "import.default_category";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(Self::db_error)?;
        init_schema(&conn).map_err(Self::db_error)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let guard = conn.lock().map_err(|e| ImportError::ConfigReadError {
                key: "*".to_string(),
                message: format!("锁获取失败: {}", e),
            })?;
            configure_sqlite_connection(&guard).map_err(Self::db_error)?;
            init_schema(&guard).map_err(Self::db_error)?;
        }

        Ok(Self { conn })
    }

    fn db_error(err: rusqlite::Error) -> ImportError {
        ImportError::ConfigReadError {
            key: "*".to_string(),
            message: err.to_string(),
        }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// 写入 global scope 配置（覆写）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// 读取并解析配置值，缺失时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ImportError::ConfigValueError {
                    key: key.to_string(),
                    value: raw.clone(),
                    message: e.to_string(),
                }),
        }
    }

    /// 读取文本配置值，缺失或空白时返回默认值
    fn get_text_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_download_timeout_secs(&self) -> ImportResult<u64> {
        self.get_parsed_or_default(config_keys::DOWNLOAD_TIMEOUT_SECS, DEFAULT_DOWNLOAD_TIMEOUT_SECS)
    }

    async fn get_download_concurrency(&self) -> ImportResult<usize> {
        self.get_parsed_or_default(config_keys::DOWNLOAD_CONCURRENCY, DEFAULT_DOWNLOAD_CONCURRENCY)
    }

    async fn get_part_number_max_len(&self) -> ImportResult<usize> {
        self.get_parsed_or_default(config_keys::PART_NUMBER_MAX_LEN, DEFAULT_PART_NUMBER_MAX_LEN)
    }

    async fn get_default_description(&self) -> ImportResult<String> {
        self.get_text_or_default(config_keys::DEFAULT_DESCRIPTION, DEFAULT_DESCRIPTION)
    }

    async fn get_default_category(&self) -> ImportResult<String> {
        self.get_text_or_default(config_keys::DEFAULT_CATEGORY, DEFAULT_CATEGORY)
    }
}
