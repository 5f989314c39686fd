// ==========================================
// 产品目录导入 - 导入对账器
// ==========================================
// 职责: ParsedProduct 逐行幂等写入目录存储
// 规则: 先按行内 id 查找，再按料号查找；命中 → 原地更新（标识不变），
//       未命中 → 用行标识新建
// 红线: 单行存储失败只记录为跳过，循环继续
// ==========================================

use crate::domain::import::{ImportOutcome, ProductSummary, RowResult, SkippedProduct};
use crate::domain::product::{ParsedProduct, ProductRecord};
use crate::domain::types::IdSource;
use crate::importer::error::RowError;
use crate::repository::{CatalogStore, RepositoryResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// 单行写入结果
enum Applied {
    Added(ProductRecord),
    Updated(ProductRecord),
}

pub struct ImportReconciler {
    store: Arc<dyn CatalogStore>,
}

impl ImportReconciler {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// 逐行对账（严格串行，按行号顺序）
    ///
    /// # 返回
    /// 新增/更新/跳过明细；total、merged、图片告警由调用方填写
    pub async fn reconcile(&self, results: Vec<RowResult>) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();

        for result in results {
            let product = match result {
                RowResult::Ready(product) => product,
                RowResult::Skipped(skipped) => {
                    outcome.skipped_products.push(skipped);
                    continue;
                }
            };

            match self.apply(&product).await {
                Ok(Applied::Added(record)) => {
                    debug!(row = product.row_number, id = %record.id, "新增产品");
                    outcome.added_products.push(summary(&record, product.row_number));
                }
                Ok(Applied::Updated(record)) => {
                    debug!(row = product.row_number, id = %record.id, "更新产品");
                    outcome.updated_products.push(summary(&record, product.row_number));
                }
                Err(e) => {
                    let row_error = RowError::from_repository(product.row_number, &e);
                    warn!(
                        row = product.row_number,
                        part_number = %product.part_number,
                        error = %row_error,
                        "产品写入失败，跳过该行"
                    );
                    outcome.skipped_products.push(SkippedProduct {
                        part_number: product.part_number.clone(),
                        row_number: product.row_number,
                        error: row_error.to_string(),
                        error_type: row_error.error_type(),
                    });
                }
            }
        }

        outcome.added = outcome.added_products.len();
        outcome.updated = outcome.updated_products.len();
        outcome.skipped = outcome.skipped_products.len();
        outcome
    }

    async fn apply(&self, product: &ParsedProduct) -> RepositoryResult<Applied> {
        let by_id = match product.id_source {
            IdSource::Row => self.store.find_by_id(&product.id).await?,
            IdSource::Synthesized => None,
        };
        let existing = match by_id {
            Some(record) => Some(record),
            None => self.store.find_by_part_number(&product.part_number).await?,
        };

        let mut fields = product.to_fields();
        match existing {
            Some(record) => {
                // 本次无图片时保留已有图片
                if fields.image.is_none() {
                    fields.image = record.image.clone();
                }
                self.store.update(&record, fields).await.map(Applied::Updated)
            }
            None => self
                .store
                .create(fields, Some(&product.id))
                .await
                .map(Applied::Added),
        }
    }
}

fn summary(record: &ProductRecord, row_number: usize) -> ProductSummary {
    ProductSummary {
        id: record.id.clone(),
        part_number: record.part_number.clone(),
        description: record.description.clone(),
        row_number,
        has_image: record.image.is_some(),
    }
}
