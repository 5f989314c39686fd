// ==========================================
// 产品目录导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: ImportError = 流程级（中止整个导入）; RowError = 行级（只影响单行）
// ==========================================

use crate::domain::types::ErrorType;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 流程级错误：在任何行处理前中止导入
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.csv）")]
    UnsupportedFormat(String),

    #[error("文件为空: 未解析到任何行")]
    EmptyFile,

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 表头映射错误 =====
    #[error("缺少必需列: {0}")]
    MissingRequiredColumn(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(err.to_string()),
            _ => ImportError::FileReadError(err.to_string()),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

/// 行级错误：在行边界捕获，记录行号与错误类型后继续
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("必填字段缺失 (行 {row}): {field} 为空")]
    MissingRequiredField { row: usize, field: String },

    #[error("内嵌图片提取失败 (行 {row}, {media}): {message}")]
    ImageExtractionFailure {
        row: usize,
        media: String,
        message: String,
    },

    #[error("图片下载失败 (行 {row}, {url}): {message}")]
    DownloadFailure {
        row: usize,
        url: String,
        message: String,
    },

    #[error("图片文件不存在 (行 {row}): {path}")]
    ImageNotFound { row: usize, path: String },

    #[error("持久化冲突 (行 {row}): {message}")]
    PersistenceConflict { row: usize, message: String },

    #[error("持久化失败 (行 {row}): {message}")]
    PersistenceFailure { row: usize, message: String },
}

impl RowError {
    pub fn row(&self) -> usize {
        match self {
            RowError::MissingRequiredField { row, .. }
            | RowError::ImageExtractionFailure { row, .. }
            | RowError::DownloadFailure { row, .. }
            | RowError::ImageNotFound { row, .. }
            | RowError::PersistenceConflict { row, .. }
            | RowError::PersistenceFailure { row, .. } => *row,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            RowError::MissingRequiredField { .. } => ErrorType::MissingRequiredField,
            RowError::ImageExtractionFailure { .. } => ErrorType::ImageExtractionFailure,
            RowError::DownloadFailure { .. } => ErrorType::DownloadFailure,
            RowError::ImageNotFound { .. } => ErrorType::ImageNotFound,
            RowError::PersistenceConflict { .. } => ErrorType::PersistenceConflict,
            RowError::PersistenceFailure { .. } => ErrorType::PersistenceFailure,
        }
    }

    /// 仓储错误分类：唯一约束 → 冲突，其余 → 持久化失败
    pub fn from_repository(row: usize, err: &RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg) => RowError::PersistenceConflict {
                row,
                message: msg.clone(),
            },
            other => RowError::PersistenceFailure {
                row,
                message: other.to_string(),
            },
        }
    }
}
