// ==========================================
// 产品目录导入 - 产品行组装器
// ==========================================
// 职责: 单行单元格 + ColumnMap + 图片 → ParsedProduct
// 规则: 料号必填（截断到上限）；描述回落 料号 → 默认值；
//       标识取 id 列，否则合成；分类取行内值，否则取文件派生值
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import::{ColumnMap, EncodedImage, RawGrid, RowResult, SkippedProduct};
use crate::domain::product::ParsedProduct;
use crate::domain::types::{CanonicalField, IdSource};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::RowError;
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

pub struct ProductRowAssembler {
    cleaner: DataCleaner,
    part_number_max_len: usize,
    default_description: String,
}

impl ProductRowAssembler {
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            cleaner: DataCleaner,
            part_number_max_len: config.part_number_max_len,
            default_description: config.default_description.clone(),
        }
    }

    /// 合成标识: <料号>-<unix 毫秒>-<8 位随机十六进制>
    pub fn synthesize_id(part_number: &str) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            part_number,
            Utc::now().timestamp_millis(),
            &random[..8]
        )
    }

    /// 组装单行
    ///
    /// # 参数
    /// - row: 原始单元格
    /// - column_map: 表头映射
    /// - row_number: 行号（表头为第 1 行）
    /// - import_category: 文件派生分类
    /// - image: 已编码图片（无则为 None）
    ///
    /// # 返回
    /// - Err(MissingRequiredField): 料号为空
    pub fn assemble(
        &self,
        row: &[String],
        column_map: &ColumnMap,
        row_number: usize,
        import_category: &str,
        image: Option<EncodedImage>,
    ) -> Result<ParsedProduct, RowError> {
        let cell = |field: CanonicalField| self.cleaner.normalize_null(column_map.cell(row, field));

        let part_number = cell(CanonicalField::PartNumber)
            .map(|p| self.cleaner.truncate_chars(&p, self.part_number_max_len))
            .ok_or_else(|| RowError::MissingRequiredField {
                row: row_number,
                field: CanonicalField::PartNumber.to_string(),
            })?;

        let description_cell = cell(CanonicalField::Description);
        let description_from_row = description_cell.is_some();
        let description = description_cell
            .or_else(|| Some(part_number.clone()))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.default_description.clone());

        let (id, id_source) = match cell(CanonicalField::Id) {
            Some(id) => (id, IdSource::Row),
            None => (Self::synthesize_id(&part_number), IdSource::Synthesized),
        };

        let category_cell = cell(CanonicalField::Category);
        let category_from_row = category_cell.is_some();
        let category = category_cell.unwrap_or_else(|| import_category.to_string());

        let price_raw = column_map.cell(row, CanonicalField::Price);
        let price = self.cleaner.parse_price(price_raw);
        if price.is_none() && self.cleaner.normalize_null(price_raw).is_some() {
            debug!(row = row_number, value = ?price_raw, "价格无法解析，置空");
        }

        let quantity_raw = column_map.cell(row, CanonicalField::Quantity);
        let quantity = self.cleaner.parse_quantity(quantity_raw);
        if quantity.is_none() && self.cleaner.normalize_null(quantity_raw).is_some() {
            debug!(row = row_number, value = ?quantity_raw, "数量无法解析，置空");
        }

        Ok(ParsedProduct {
            id,
            id_source,
            part_number,
            description,
            image,
            category,
            description_from_row,
            category_from_row,
            price,
            quantity,
            unit: cell(CanonicalField::Unit),
            brand: cell(CanonicalField::Brand),
            model: cell(CanonicalField::Model),
            row_number,
        })
    }

    /// 组装全部非空数据行（空行静默跳过）
    pub fn assemble_all(
        &self,
        grid: &RawGrid,
        column_map: &ColumnMap,
        import_category: &str,
        images: &mut HashMap<usize, EncodedImage>,
    ) -> Vec<RowResult> {
        grid.data_rows()
            .filter(|(_, row)| !self.cleaner.is_blank_row(row))
            .map(|(row_number, row)| {
                let image = images.remove(&row_number);
                match self.assemble(row, column_map, row_number, import_category, image) {
                    Ok(product) => RowResult::Ready(product),
                    Err(e) => RowResult::Skipped(SkippedProduct {
                        part_number: String::new(),
                        row_number,
                        error: e.to_string(),
                        error_type: e.error_type(),
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ErrorType;
    use crate::importer::header_mapper::HeaderMapper;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn assembler() -> ProductRowAssembler {
        ProductRowAssembler::new(&ImportConfig::default())
    }

    #[test]
    fn test_assemble_basic_row() {
        let map = HeaderMapper.map(&row(&["Part No", "Description", "Image"]));

        let product = assembler()
            .assemble(&row(&[" X-100 ", " Widget ", ""]), &map, 2, "Catalog", None)
            .unwrap();

        assert_eq!(product.part_number, "X-100");
        assert_eq!(product.description, "Widget");
        assert_eq!(product.category, "Catalog");
        assert!(product.description_from_row);
        assert!(!product.category_from_row);
        assert_eq!(product.id_source, IdSource::Synthesized);
        assert!(product.id.starts_with("X-100-"));
        assert_eq!(product.row_number, 2);
        assert!(product.image.is_none());
    }

    #[test]
    fn test_synthesized_id_shape() {
        let id = ProductRowAssembler::synthesize_id("AB-1");
        let rest = id.strip_prefix("AB-1-").unwrap();
        let (millis, random) = rest.split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(random.len(), 8);
        assert!(random.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, ProductRowAssembler::synthesize_id("AB-1"));
    }

    #[test]
    fn test_missing_part_number() {
        let map = HeaderMapper.map(&row(&["Part No", "Description"]));

        let err = assembler()
            .assemble(&row(&["   ", "Orphan"]), &map, 4, "Catalog", None)
            .unwrap_err();

        assert_eq!(err.error_type(), ErrorType::MissingRequiredField);
        assert_eq!(err.row(), 4);
    }

    #[test]
    fn test_description_fallbacks() {
        let map = HeaderMapper.map(&row(&["Part No", "Description"]));
        let product = assembler()
            .assemble(&row(&["X-300", ""]), &map, 2, "Catalog", None)
            .unwrap();
        assert_eq!(product.description, "X-300");
        assert!(!product.description_from_row);

        // 无描述列同样回落到料号
        let map = HeaderMapper.map(&row(&["sku"]));
        let product = assembler()
            .assemble(&row(&["X-301"]), &map, 2, "Catalog", None)
            .unwrap();
        assert_eq!(product.description, "X-301");
    }

    #[test]
    fn test_part_number_truncated_to_limit() {
        let map = HeaderMapper.map(&row(&["Part Number"]));
        let long = "P".repeat(150);

        let product = assembler()
            .assemble(&row(&[&long]), &map, 2, "Catalog", None)
            .unwrap();

        assert_eq!(product.part_number.chars().count(), 100);
    }

    #[test]
    fn test_row_id_and_category_override() {
        let map = HeaderMapper.map(&row(&["ID", "SKU", "Category"]));

        let product = assembler()
            .assemble(&row(&["prod-7", "A-1", "Fasteners"]), &map, 2, "spare parts", None)
            .unwrap();

        assert_eq!(product.id, "prod-7");
        assert_eq!(product.id_source, IdSource::Row);
        assert_eq!(product.category, "Fasteners");
        assert!(product.category_from_row);
    }

    #[test]
    fn test_capture_fields() {
        let map = HeaderMapper.map(&row(&["SKU", "Price", "Qty", "Unit", "Brand", "Model"]));

        let product = assembler()
            .assemble(
                &row(&["A-1", "$1,299.00", "n/a", " box ", "", "M-9"]),
                &map,
                2,
                "Catalog",
                None,
            )
            .unwrap();

        assert_eq!(product.price, Some(1299.0));
        assert_eq!(product.quantity, None);
        assert_eq!(product.unit.as_deref(), Some("box"));
        assert_eq!(product.brand, None);
        assert_eq!(product.model.as_deref(), Some("M-9"));
    }

    #[test]
    fn test_assemble_all_skips_blank_rows_and_attaches_images() {
        let grid = RawGrid::new(vec![
            row(&["Part No", "Description"]),
            row(&["A-1", "First"]),
            row(&["", "  "]),
            row(&["", "No part"]),
            row(&["A-2", ""]),
        ]);
        let map = HeaderMapper.map(grid.header().unwrap());
        let mut images = HashMap::new();
        images.insert(5, EncodedImage::from_bytes(&[1], "image/png"));

        let results = assembler().assemble_all(&grid, &map, "Catalog", &mut images);

        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.row_number()).collect::<Vec<_>>(),
            vec![2, 4, 5]
        );
        assert!(matches!(&results[1], RowResult::Skipped(s) if s.error_type == ErrorType::MissingRequiredField));
        match &results[2] {
            RowResult::Ready(p) => assert!(p.image.is_some()),
            other => panic!("unexpected {:?}", other),
        }
        assert!(images.is_empty());
    }
}
