// ==========================================
// 产品目录导入 - 导入层
// ==========================================
// 职责: 表格文件 → 目录产品记录
// 支持: Excel (.xlsx/.xlsm，含内嵌图片), CSV (含外部图片引用)
// ==========================================

// 模块声明
pub mod catalog_importer_impl;
pub mod catalog_importer_trait;
pub mod data_cleaner;
pub mod drawing_parser;
pub mod duplicate_merger;
pub mod error;
pub mod file_parser;
pub mod header_mapper;
pub mod image_codec;
pub mod image_extractor;
pub mod image_resolver;
pub mod reconciler;
pub mod row_assembler;

// 重导出核心类型
pub use catalog_importer_impl::CatalogImporterImpl;
pub use data_cleaner::DataCleaner;
pub use duplicate_merger::DuplicateMerger;
pub use error::{ImportError, ImportResult, RowError};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use header_mapper::HeaderMapper;
pub use image_extractor::{
    AnchorRangeLocator, EmbeddedImageExtractor, ExtractionReport, FirstUnusedMediaLocator,
    ImageLocator, MediaOrderLocator,
};
pub use image_resolver::{
    ExternalImageResolver, FetchError, FetchedImage, HttpImageFetcher, ImageFetcher, ImageRequest,
    ResolutionReport,
};
pub use reconciler::ImportReconciler;
pub use row_assembler::ProductRowAssembler;

// 重导出 Trait 接口
pub use catalog_importer_trait::{CatalogImporter, FileParser};
