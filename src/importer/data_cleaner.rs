// ==========================================
// 产品目录导入 - 数据清洗器
// ==========================================
// 职责: TRIM / NULL 标准化 / 字符安全截断 / 数值字段宽松采集
// ==========================================

use std::path::Path;

pub struct DataCleaner;

impl DataCleaner {
    /// 清洗文本字段（TRIM）
    pub fn clean_text(&self, value: &str) -> String {
        value.trim().to_string()
    }

    /// 标准化 NULL 值（空字符串/空白 → None）
    pub fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 按字符截断（不切断多字节字符）
    pub fn truncate_chars(&self, value: &str, max_chars: usize) -> String {
        match value.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => value[..byte_idx].to_string(),
            None => value.to_string(),
        }
    }

    /// 整行是否为空（所有单元格空白）
    pub fn is_blank_row(&self, row: &[String]) -> bool {
        row.iter().all(|cell| cell.trim().is_empty())
    }

    /// 宽松解析价格：去掉货币符号、千分位、空白
    ///
    /// # 示例
    /// - "$1,234.50" → 1234.5
    /// - "12.00 USD" → 12.0
    /// - "call us" → None
    pub fn parse_price(&self, value: Option<&str>) -> Option<f64> {
        let raw = self.normalize_null(value)?;
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        if cleaned.is_empty() || raw.chars().any(|c| c.is_alphabetic() && !is_currency_word(&raw)) {
            return None;
        }
        cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// 宽松解析数量：允许千分位与 "12.0" 形式
    pub fn parse_quantity(&self, value: Option<&str>) -> Option<i64> {
        let raw = self.normalize_null(value)?;
        let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
        if let Ok(n) = cleaned.parse::<i64>() {
            return Some(n);
        }
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    }

    /// 由源文件名派生分类："spare_parts-2024.xlsx" → "spare parts 2024"
    pub fn category_from_file_name(&self, file_name: &str, default: &str) -> String {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let words: Vec<&str> = stem
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            default.to_string()
        } else {
            words.join(" ")
        }
    }
}

/// 常见货币代码（作为价格前后缀时允许出现字母）
fn is_currency_word(raw: &str) -> bool {
    let letters: String = raw.chars().filter(|c| c.is_alphabetic()).collect();
    matches!(
        letters.to_uppercase().as_str(),
        "USD" | "EUR" | "GBP" | "CNY" | "RMB" | "JPY" | "INR" | "AUD" | "CAD"
    )
}
