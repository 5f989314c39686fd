// ==========================================
// 产品目录导入 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格文件（xlsx/csv）→ 产品目录，行级容错、幂等导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 导入接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CanonicalField, ColumnMap, EncodedImage, ErrorType, FileFormat, IdSource, ImageSource,
    ImportOutcome, ParsedProduct, ProductRecord, RawGrid,
};

// 导入器
pub use importer::{
    CatalogImporter, CatalogImporterImpl, EmbeddedImageExtractor, ExternalImageResolver,
    HeaderMapper, ImportError, ImportReconciler, ProductRowAssembler, UniversalFileParser,
};

// 仓储
pub use repository::{CatalogStore, CatalogStoreImpl, RepositoryError};

// API
pub use api::{ImportApi, ImportApiResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "产品目录导入";
