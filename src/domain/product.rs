// ==========================================
// 产品目录导入 - 产品领域模型
// ==========================================
// 职责: 导入中间产物 ParsedProduct / 入库字段 ProductFields / 持久化记录 ProductRecord
// ==========================================

use crate::domain::import::EncodedImage;
use crate::domain::types::IdSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ParsedProduct - 行组装结果
// ==========================================
// 用途: ProductRowAssembler 输出，按值交给 ImportReconciler
// 生命周期: 仅在一次导入任务内
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedProduct {
    pub id: String,                   // 产品标识（行内提供或合成）
    pub id_source: IdSource,          // 标识来源
    pub part_number: String,          // 料号（非空，≤100 字符）
    pub description: String,          // 描述（为空时回落到料号/默认值）
    pub image: Option<EncodedImage>,  // 自包含编码图片，绝不是未解析的引用
    pub category: String,             // 分类

    // 描述/分类是否取自行内单元格（false 表示回落值）
    #[serde(default)]
    pub description_from_row: bool,
    #[serde(default)]
    pub category_from_row: bool,

    // ===== 字段采集（不含业务逻辑）=====
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,

    // 元信息
    pub row_number: usize, // 原始文件行号（表头为第 1 行）
}

impl ParsedProduct {
    /// 转换为仓储写入字段
    pub fn to_fields(&self) -> ProductFields {
        ProductFields {
            part_number: self.part_number.clone(),
            description: self.description.clone(),
            image: self.image.as_ref().map(|img| img.data_uri.clone()),
            category: self.category.clone(),
            price: self.price,
            quantity: self.quantity,
            unit: self.unit.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
        }
    }

    /// 用 later 覆盖当前值：later 非空字段优先，空字段保留当前值
    ///
    /// 描述与分类按来源比较：行内值优先于回落值，两行都是回落值时取 later
    pub fn overlay(self, later: ParsedProduct) -> ParsedProduct {
        let (description, description_from_row) = pick_from_row(
            (self.description, self.description_from_row),
            (later.description, later.description_from_row),
        );
        let (category, category_from_row) = pick_from_row(
            (self.category, self.category_from_row),
            (later.category, later.category_from_row),
        );

        ParsedProduct {
            id: if later.id_source == IdSource::Row || self.id_source != IdSource::Row {
                later.id
            } else {
                self.id
            },
            id_source: if later.id_source == IdSource::Row {
                IdSource::Row
            } else {
                self.id_source
            },
            part_number: later.part_number,
            description,
            image: later.image.or(self.image),
            category,
            description_from_row,
            category_from_row,
            price: later.price.or(self.price),
            quantity: later.quantity.or(self.quantity),
            unit: later.unit.or(self.unit),
            brand: later.brand.or(self.brand),
            model: later.model.or(self.model),
            row_number: later.row_number,
        }
    }
}

fn pick_from_row(earlier: (String, bool), later: (String, bool)) -> (String, bool) {
    if earlier.1 && !later.1 {
        earlier
    } else {
        later
    }
}

// ==========================================
// ProductFields - 仓储写入字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    pub part_number: String,
    pub description: String,
    pub image: Option<String>, // data URI
    pub category: String,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

// ==========================================
// ProductRecord - 目录持久化记录
// ==========================================
// 对齐: product 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String, // 持久化标识（更新时保持不变）
    pub part_number: String,
    pub description: String,
    pub image: Option<String>,
    pub category: String,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(part: &str, row: usize, id_source: IdSource) -> ParsedProduct {
        ParsedProduct {
            id: format!("{}-{}", part, row),
            id_source,
            part_number: part.to_string(),
            description: part.to_string(),
            image: None,
            category: "Fasteners".to_string(),
            description_from_row: true,
            category_from_row: true,
            price: None,
            quantity: None,
            unit: None,
            brand: None,
            model: None,
            row_number: row,
        }
    }

    #[test]
    fn test_overlay_keeps_earlier_image_and_captures() {
        let mut first = product("X-100", 2, IdSource::Synthesized);
        first.image = Some(EncodedImage::from_bytes(b"png", "image/png"));
        first.brand = Some("Acme".to_string());

        let mut second = product("X-100", 4, IdSource::Synthesized);
        second.description = "Updated widget".to_string();

        let merged = first.clone().overlay(second);

        assert_eq!(merged.description, "Updated widget");
        assert_eq!(merged.row_number, 4);
        assert_eq!(merged.image, first.image);
        assert_eq!(merged.brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_overlay_keeps_earlier_row_values_over_fallbacks() {
        let mut first = product("X-100", 2, IdSource::Synthesized);
        first.description = "Widget".to_string();
        first.price = Some(9.5);

        // 后一行描述/分类为空，已回落到料号与文件派生分类
        let mut second = product("X-100", 3, IdSource::Synthesized);
        second.description = "X-100".to_string();
        second.description_from_row = false;
        second.category = "misc".to_string();
        second.category_from_row = false;

        let merged = first.overlay(second);

        assert_eq!(merged.description, "Widget");
        assert!(merged.description_from_row);
        assert_eq!(merged.category, "Fasteners");
        assert!(merged.category_from_row);
        assert_eq!(merged.price, Some(9.5));
        assert_eq!(merged.row_number, 3);
    }

    #[test]
    fn test_overlay_both_fallbacks_take_later() {
        let mut first = product("X-100", 2, IdSource::Synthesized);
        first.category = "old".to_string();
        first.category_from_row = false;
        let mut second = product("X-100", 3, IdSource::Synthesized);
        second.category = "new".to_string();
        second.category_from_row = false;

        let merged = first.overlay(second);

        assert_eq!(merged.category, "new");
        assert!(!merged.category_from_row);
    }

    #[test]
    fn test_overlay_prefers_explicit_row_id() {
        let first = product("X-100", 2, IdSource::Row);
        let second = product("X-100", 3, IdSource::Synthesized);

        let merged = first.overlay(second);

        assert_eq!(merged.id, "X-100-2");
        assert_eq!(merged.id_source, IdSource::Row);
    }

    #[test]
    fn test_to_fields_uses_data_uri() {
        let mut p = product("X-100", 2, IdSource::Row);
        p.image = Some(EncodedImage::from_bytes(&[1, 2, 3], "image/jpeg"));

        let fields = p.to_fields();

        assert_eq!(fields.image.as_deref(), Some("data:image/jpeg;base64,AQID"));
    }
}
