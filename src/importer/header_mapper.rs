// ==========================================
// 产品目录导入 - 表头映射器
// ==========================================
// 职责: 表头行 → ColumnMap（同义词匹配，按字段优先级分配列）
// 规则: 子串匹配（大小写不敏感）；极短词精确匹配
// ==========================================

use crate::domain::import::ColumnMap;
use crate::domain::types::CanonicalField;
use tracing::debug;

/// 同义词条目
struct Synonyms {
    field: CanonicalField,
    /// 整个表头必须等于该词
    exact: &'static [&'static str],
    /// 表头包含该词即可
    contains: &'static [&'static str],
}

/// 同义词字典（按字段优先级排列）
const SYNONYMS: &[Synonyms] = &[
    Synonyms {
        field: CanonicalField::Id,
        exact: &["id", "#"],
        contains: &["product id", "item id", "record id"],
    },
    Synonyms {
        field: CanonicalField::PartNumber,
        exact: &[],
        contains: &[
            "part number",
            "part no",
            "part#",
            "part num",
            "sku",
            "item code",
            "item no",
            "item number",
            "product code",
            "catalog number",
            "mpn",
        ],
    },
    Synonyms {
        field: CanonicalField::Description,
        exact: &[],
        contains: &["description", "desc", "name", "title", "details"],
    },
    Synonyms {
        field: CanonicalField::Image,
        exact: &[],
        contains: &["image", "photo", "picture", "img", "thumbnail"],
    },
    Synonyms {
        field: CanonicalField::Category,
        exact: &[],
        contains: &["category", "family", "department", "group"],
    },
    Synonyms {
        field: CanonicalField::Price,
        exact: &[],
        contains: &["price", "cost", "rate", "amount", "msrp"],
    },
    Synonyms {
        field: CanonicalField::Quantity,
        exact: &[],
        contains: &["quantity", "qty", "stock", "inventory", "on hand"],
    },
    Synonyms {
        field: CanonicalField::Unit,
        exact: &[],
        contains: &["unit", "uom"],
    },
    Synonyms {
        field: CanonicalField::Brand,
        exact: &[],
        contains: &["brand", "manufacturer", "make", "vendor"],
    },
    Synonyms {
        field: CanonicalField::Model,
        exact: &[],
        contains: &["model"],
    },
];

impl Synonyms {
    fn matches(&self, header: &str) -> bool {
        self.exact.iter().any(|s| header == *s)
            || self.contains.iter().any(|s| header.contains(s))
    }
}

// ==========================================
// HeaderMapper
// ==========================================
pub struct HeaderMapper;

impl HeaderMapper {
    /// 映射表头
    ///
    /// 每个字段取最靠左的未占用匹配列；缺失字段不报错，由调用方判断
    pub fn map(&self, header: &[String]) -> ColumnMap {
        let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut map = ColumnMap::default();

        for synonyms in SYNONYMS {
            let found = normalized
                .iter()
                .enumerate()
                .filter(|(idx, h)| !h.is_empty() && !map.is_claimed(*idx))
                .find(|(_, h)| synonyms.matches(h));

            if let Some((idx, _)) = found {
                map.claim(synonyms.field, idx);
            }
        }

        debug!(
            mapped = map.len(),
            columns = header.len(),
            fields = ?map.iter().map(|(f, c)| format!("{}={}", f, c)).collect::<Vec<_>>(),
            "表头映射完成"
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_basic_mapping() {
        let map = HeaderMapper.map(&header(&["Part No", "Description", "Image"]));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Description), Some(1));
        assert_eq!(map.get(CanonicalField::Image), Some(2));
        assert_eq!(map.get(CanonicalField::Id), None);
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let map = HeaderMapper.map(&header(&["  SKU  ", "PRODUCT PHOTO"]));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Image), Some(1));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let map = HeaderMapper.map(&header(&["Name", "Description", "SKU"]));
        assert_eq!(map.get(CanonicalField::Description), Some(0));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(2));
    }

    #[test]
    fn test_higher_priority_field_claims_column() {
        // "product code name" 同时匹配料号与描述，料号优先级更高
        let map = HeaderMapper.map(&header(&["Product Code Name", "Title"]));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Description), Some(1));
    }

    #[test]
    fn test_short_id_token_is_exact() {
        let map = HeaderMapper.map(&header(&["Width", "Valid", "Part Number", "ID"]));
        assert_eq!(map.get(CanonicalField::Id), Some(3));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(2));
    }

    #[test]
    fn test_no_match_is_empty_map() {
        let map = HeaderMapper.map(&header(&["foo", "bar", ""]));
        assert!(map.is_empty());
    }

    #[test]
    fn test_capture_fields() {
        let map = HeaderMapper.map(&header(&[
            "Item Code", "Unit Price", "Qty", "UOM", "Manufacturer", "Model",
        ]));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Price), Some(1));
        assert_eq!(map.get(CanonicalField::Quantity), Some(2));
        assert_eq!(map.get(CanonicalField::Unit), Some(3));
        assert_eq!(map.get(CanonicalField::Brand), Some(4));
        assert_eq!(map.get(CanonicalField::Model), Some(5));
    }
}
