// ==========================================
// 产品目录导入 - 导入过程领域模型
// ==========================================
// 职责: RawGrid / ColumnMap / 图片载荷 / 导入结果
// ==========================================

use crate::domain::product::ParsedProduct;
use crate::domain::types::{CanonicalField, ErrorType, ImageSource};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RawGrid - 原始单元格网格
// ==========================================
// 约束: 处理开始前已整体读入内存；第 0 行为表头
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGrid {
    rows: Vec<Vec<String>>,
    /// 网格 (0,0) 在工作表中的位置（0 基 行/列）
    origin: (u32, u32),
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            origin: (0, 0),
        }
    }

    pub fn with_origin(mut self, origin: (u32, u32)) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }

    /// 数据行迭代: (行号, 单元格)，行号按表格习惯从 2 开始（表头为 1）
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, row)| (idx + 1, row.as_slice()))
    }

    /// 行号对应的工作表 0 基行索引
    pub fn sheet_row_of(&self, row_number: usize) -> u32 {
        self.origin.0 + (row_number.saturating_sub(1)) as u32
    }

    /// 网格列索引对应的工作表 0 基列索引
    pub fn sheet_col_of(&self, column: usize) -> u32 {
        self.origin.1 + column as u32
    }
}

// ==========================================
// ColumnMap - 标准字段 → 列索引
// ==========================================
// 约束: 同一列不会分配给两个字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    columns: BTreeMap<CanonicalField, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 列是否已被占用
    pub fn is_claimed(&self, column: usize) -> bool {
        self.columns.values().any(|&c| c == column)
    }

    /// 分配列（列已被占用时返回 false）
    pub(crate) fn claim(&mut self, field: CanonicalField, column: usize) -> bool {
        if self.is_claimed(column) || self.contains(field) {
            return false;
        }
        self.columns.insert(field, column);
        true
    }

    /// 取行内某字段的原始值（字段缺失或越界返回 None）
    pub fn cell<'a>(&self, row: &'a [String], field: CanonicalField) -> Option<&'a str> {
        self.get(field)
            .and_then(|idx| row.get(idx))
            .map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.columns.iter().map(|(f, c)| (*f, *c))
    }
}

// ==========================================
// EncodedImage - 自包含编码图片
// ==========================================
// 形式: data:<mime>;base64,<payload>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub mime_type: String,
    pub data_uri: String,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        let payload = STANDARD.encode(bytes);
        Self {
            mime_type: mime_type.to_string(),
            data_uri: format!("data:{};base64,{}", mime_type, payload),
        }
    }

    /// 识别已是自包含图片的单元格值（原样透传）
    pub fn parse_data_uri(value: &str) -> Option<Self> {
        let value = value.trim();
        let rest = value.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime_type = meta.strip_suffix(";base64")?;
        if !mime_type.starts_with("image/") || payload.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data_uri: value.to_string(),
        })
    }

    /// 解码回原始字节
    pub fn decode(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.data_uri.split_once(',')?;
        STANDARD.decode(payload).ok()
    }
}

// ==========================================
// ExtractedImage - 内嵌图片提取结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub row_number: usize,   // 数据行号（表头为第 1 行）
    pub image: EncodedImage, // 编码后的图片
    pub media_path: String,  // 归档内路径，如 xl/media/image1.png
    pub source: ImageSource, // 定位来源（置信度）
}

// ==========================================
// 导入结果
// ==========================================

/// 被跳过的行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedProduct {
    pub part_number: String,
    pub row_number: usize,
    pub error: String,
    pub error_type: ErrorType,
}

/// 图片降级告警（行仍然导入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageWarning {
    pub row_number: usize,
    pub error: String,
    pub error_type: ErrorType,
}

/// 启发式匹配的内嵌图片（非锚点定位，归属可能不准）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicImage {
    pub row_number: usize,
    pub media_path: String,
    pub source: ImageSource,
}

/// 新增/更新产品摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    pub part_number: String,
    pub description: String,
    pub row_number: usize,
    pub has_image: bool,
}

/// 组装阶段的行结果
#[derive(Debug, Clone, PartialEq)]
pub enum RowResult {
    Ready(ParsedProduct),
    Skipped(SkippedProduct),
}

impl RowResult {
    pub fn row_number(&self) -> usize {
        match self {
            RowResult::Ready(p) => p.row_number,
            RowResult::Skipped(s) => s.row_number,
        }
    }
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub total: usize,   // 非空数据行数
    pub added: usize,   // 新增
    pub updated: usize, // 更新
    pub skipped: usize, // 跳过（含错误明细）
    pub merged: usize,  // 同文件内重复料号被合并的行数
    pub added_products: Vec<ProductSummary>,
    pub updated_products: Vec<ProductSummary>,
    pub skipped_products: Vec<SkippedProduct>,
    pub image_warnings: Vec<ImageWarning>,
    pub heuristic_images: Vec<HeuristicImage>,
    pub elapsed_ms: u64,
}
