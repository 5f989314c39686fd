// ==========================================
// 产品目录导入 - 领域枚举类型
// ==========================================
// 职责: 标准字段 / 文件格式 / 错误类型 / 图片来源 等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ==========================================
// CanonicalField - 标准字段
// ==========================================
// 声明顺序即字段优先级（表头冲突时优先级高者先占列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Id,
    PartNumber,
    Description,
    Image,
    Category,
    Price,
    Quantity,
    Unit,
    Brand,
    Model,
}

impl CanonicalField {
    /// 全部标准字段（按优先级）
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::Id,
        CanonicalField::PartNumber,
        CanonicalField::Description,
        CanonicalField::Image,
        CanonicalField::Category,
        CanonicalField::Price,
        CanonicalField::Quantity,
        CanonicalField::Unit,
        CanonicalField::Brand,
        CanonicalField::Model,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Id => "id",
            CanonicalField::PartNumber => "partNumber",
            CanonicalField::Description => "description",
            CanonicalField::Image => "image",
            CanonicalField::Category => "category",
            CanonicalField::Price => "price",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Unit => "unit",
            CanonicalField::Brand => "brand",
            CanonicalField::Model => "model",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// FileFormat - 支持的输入格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    /// ZIP 归档表格（.xlsx / .xlsm）
    SpreadsheetArchive,
    /// 逗号分隔文本（.csv）
    DelimitedText,
}

impl FileFormat {
    /// 根据扩展名识别格式（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(FileFormat::SpreadsheetArchive),
            "csv" => Some(FileFormat::DelimitedText),
            _ => None,
        }
    }

    /// 根据声明的原始文件名识别格式
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

// ==========================================
// ErrorType - 行级错误分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    MissingRequiredField,
    ImageExtractionFailure,
    DownloadFailure,
    ImageNotFound,
    PersistenceConflict,
    PersistenceFailure,
}

// ==========================================
// ImageSource - 内嵌图片定位来源（置信度）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// 锚点范围命中（权威）
    Anchor,
    /// 按归档顺序对应行（启发式）
    Positional,
    /// 兜底取第一张未使用图片（最不可靠）
    FirstAvailable,
}

impl ImageSource {
    pub fn is_heuristic(&self) -> bool {
        !matches!(self, ImageSource::Anchor)
    }
}

// ==========================================
// IdSource - 产品标识来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdSource {
    /// 来自文件 id 列
    Row,
    /// 导入时合成
    Synthesized,
}
