// ==========================================
// 产品目录导入 - 同文件重复料号合并
// ==========================================
// 职责: 同一文件内料号相同的行合并到最后一次出现的行
// 规则: 后出现的非空字段优先，前面的值补空（尤其是图片）
// ==========================================

use crate::domain::import::RowResult;
use std::collections::HashMap;
use tracing::warn;

pub struct DuplicateMerger;

impl DuplicateMerger {
    /// 检测同批次内重复料号
    ///
    /// # 返回
    /// - Vec<(行号, 料号)>: 重复记录列表（不包括第一次出现）
    pub fn detect_duplicates(&self, results: &[RowResult]) -> Vec<(usize, String)> {
        let mut first_occurrence: HashMap<&str, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for result in results {
            if let RowResult::Ready(product) = result {
                if first_occurrence.contains_key(product.part_number.as_str()) {
                    duplicates.push((product.row_number, product.part_number.clone()));
                } else {
                    first_occurrence.insert(&product.part_number, product.row_number);
                }
            }
        }

        duplicates
    }

    /// 合并重复行
    ///
    /// # 返回
    /// - (结果列表（按行号有序）, 被合并掉的行数)
    pub fn merge(&self, results: Vec<RowResult>) -> (Vec<RowResult>, usize) {
        let mut slots: Vec<Option<RowResult>> = Vec::with_capacity(results.len());
        let mut latest: HashMap<String, usize> = HashMap::new();
        let mut merged = 0;

        for result in results {
            let product = match result {
                RowResult::Ready(product) => product,
                skipped => {
                    slots.push(Some(skipped));
                    continue;
                }
            };

            let previous = latest
                .get(&product.part_number)
                .and_then(|&idx| slots[idx].take());
            let product = match previous {
                Some(RowResult::Ready(earlier)) => {
                    warn!(
                        part_number = %product.part_number,
                        earlier_row = earlier.row_number,
                        row = product.row_number,
                        "同文件内重复料号，合并到后出现的行"
                    );
                    merged += 1;
                    earlier.overlay(product)
                }
                _ => product,
            };

            latest.insert(product.part_number.clone(), slots.len());
            slots.push(Some(RowResult::Ready(product)));
        }

        (slots.into_iter().flatten().collect(), merged)
    }
}
