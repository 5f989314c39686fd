// ==========================================
// 产品目录导入 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod product;
pub mod types;

// 重导出核心类型
pub use import::{
    ColumnMap, EncodedImage, ExtractedImage, HeuristicImage, ImageWarning, ImportOutcome,
    ProductSummary, RawGrid, RowResult, SkippedProduct,
};
pub use product::{ParsedProduct, ProductFields, ProductRecord};
pub use types::{CanonicalField, ErrorType, FileFormat, IdSource, ImageSource};
