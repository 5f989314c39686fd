// ==========================================
// 产品目录导入 - 导入器实现
// ==========================================
// 职责: 整合导入流程，从文件到目录存储
// 流程: 解析 → 表头映射 → 图片提取/解析 → 行组装 → 重复合并 → 对账落库
// ==========================================

use crate::config::{ImportConfig, ImportConfigReader};
use crate::domain::import::{
    ColumnMap, EncodedImage, HeuristicImage, ImageWarning, ImportOutcome, RawGrid,
};
use crate::domain::types::{CanonicalField, FileFormat};
use crate::importer::catalog_importer_trait::CatalogImporter;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::duplicate_merger::DuplicateMerger;
use crate::importer::error::{ImportError, ImportResult, RowError};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::header_mapper::HeaderMapper;
use crate::importer::image_extractor::EmbeddedImageExtractor;
use crate::importer::image_resolver::{
    ExternalImageResolver, HttpImageFetcher, ImageFetcher, ImageRequest,
};
use crate::importer::reconciler::ImportReconciler;
use crate::importer::row_assembler::ProductRowAssembler;
use crate::repository::CatalogStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 阶段 3 产物
#[derive(Default)]
struct CollectedImages {
    images: HashMap<usize, EncodedImage>,
    warnings: Vec<RowError>,
    heuristic: Vec<HeuristicImage>,
}

// ==========================================
// CatalogImporterImpl
// ==========================================
pub struct CatalogImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 目录存储（唯一写入目标）
    store: Arc<dyn CatalogStore>,

    // 配置读取器
    config: C,

    // 图片下载器；None 时按配置的超时创建 HttpImageFetcher
    fetcher: Option<Arc<dyn ImageFetcher>>,

    // 导入组件
    file_parser: UniversalFileParser,
    header_mapper: HeaderMapper,
    image_extractor: EmbeddedImageExtractor,
    duplicate_merger: DuplicateMerger,
    data_cleaner: DataCleaner,
}

impl<C> CatalogImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建导入器
    ///
    /// # 参数
    /// - store: 目录存储
    /// - config: 配置读取器
    pub fn new(store: Arc<dyn CatalogStore>, config: C) -> Self {
        Self {
            store,
            config,
            fetcher: None,
            file_parser: UniversalFileParser,
            header_mapper: HeaderMapper,
            image_extractor: EmbeddedImageExtractor::new(),
            duplicate_merger: DuplicateMerger,
            data_cleaner: DataCleaner,
        }
    }

    /// 替换图片下载器
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    fn image_fetcher(&self, config: &ImportConfig) -> ImportResult<Arc<dyn ImageFetcher>> {
        match &self.fetcher {
            Some(fetcher) => Ok(Arc::clone(fetcher)),
            None => {
                let fetcher =
                    HttpImageFetcher::new(Duration::from_secs(config.download_timeout_secs))?;
                Ok(Arc::new(fetcher))
            }
        }
    }

    /// 阶段 3: 行号 → 已编码图片，图片降级告警，以及启发式匹配清单
    #[allow(clippy::too_many_arguments)]
    async fn collect_images(
        &self,
        format: FileFormat,
        bytes: &[u8],
        grid: &RawGrid,
        column_map: &ColumnMap,
        row_numbers: &[usize],
        base_dir: Option<&Path>,
        config: &ImportConfig,
    ) -> ImportResult<CollectedImages> {
        match format {
            FileFormat::SpreadsheetArchive => {
                let report = self
                    .image_extractor
                    .extract(bytes, grid, column_map, row_numbers);
                let mut collected = CollectedImages {
                    warnings: report.warnings,
                    ..Default::default()
                };
                for img in report.images {
                    if img.source.is_heuristic() {
                        collected.heuristic.push(HeuristicImage {
                            row_number: img.row_number,
                            media_path: img.media_path,
                            source: img.source,
                        });
                    }
                    collected.images.insert(img.row_number, img.image);
                }
                Ok(collected)
            }
            FileFormat::DelimitedText => {
                if !column_map.contains(CanonicalField::Image) {
                    debug!("无图片列，跳过外部图片解析");
                    return Ok(CollectedImages::default());
                }

                let requests: Vec<ImageRequest> = grid
                    .data_rows()
                    .filter(|(row_number, _)| row_numbers.contains(row_number))
                    .filter_map(|(row_number, row)| {
                        let value = column_map.cell(row, CanonicalField::Image)?.trim();
                        if value.is_empty() {
                            return None;
                        }
                        Some(ImageRequest {
                            row_number,
                            value: value.to_string(),
                        })
                    })
                    .collect();
                if requests.is_empty() {
                    return Ok(CollectedImages::default());
                }

                let resolver = ExternalImageResolver::new(
                    self.image_fetcher(config)?,
                    config.download_concurrency,
                );
                let report = resolver.resolve_all(requests, base_dir).await;
                Ok(CollectedImages {
                    images: report.images,
                    warnings: report.warnings,
                    heuristic: Vec::new(),
                })
            }
        }
    }
}

#[async_trait]
impl<C> CatalogImporter for CatalogImporterImpl<C>
where
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, bytes, base_dir), fields(job_id))]
    async fn import_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        base_dir: Option<&Path>,
    ) -> ImportResult<ImportOutcome> {
        let start_time = Instant::now();
        let job_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("job_id", job_id.as_str());
        info!(size = bytes.len(), "开始导入产品目录");

        let config = self.config.load_import_config().await?;

        // === 步骤 1: 解析文件 ===
        let format = self.file_parser.detect_format(file_name).map_err(|e| {
            error!(error = %e, "文件格式不支持");
            e
        })?;
        let grid = self.file_parser.parse(bytes, format).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        info!(format = ?format, rows = grid.len(), "文件解析完成");

        // === 步骤 2: 表头映射 ===
        let header = grid.header().ok_or(ImportError::EmptyFile)?;
        let column_map = self.header_mapper.map(header);
        if !column_map.contains(CanonicalField::PartNumber) {
            error!(header = ?header, "表头中没有料号列");
            return Err(ImportError::MissingRequiredColumn(
                CanonicalField::PartNumber.to_string(),
            ));
        }

        let row_numbers: Vec<usize> = grid
            .data_rows()
            .filter(|(_, row)| !self.data_cleaner.is_blank_row(row))
            .map(|(row_number, _)| row_number)
            .collect();
        let total = row_numbers.len();
        info!(total, mapped_fields = column_map.len(), "表头映射完成");

        // === 步骤 3: 图片 ===
        let CollectedImages {
            mut images,
            warnings: image_errors,
            heuristic: heuristic_images,
        } = self
            .collect_images(format, bytes, &grid, &column_map, &row_numbers, base_dir, &config)
            .await?;

        // === 步骤 4: 行组装 + 重复合并 ===
        let category = self
            .data_cleaner
            .category_from_file_name(file_name, &config.default_category);
        let assembler = ProductRowAssembler::new(&config);
        let rows = assembler.assemble_all(&grid, &column_map, &category, &mut images);

        let duplicates = self.duplicate_merger.detect_duplicates(&rows);
        if !duplicates.is_empty() {
            warn!(count = duplicates.len(), "检测到同文件重复料号");
        }
        let (rows, merged) = self.duplicate_merger.merge(rows);

        // === 步骤 5: 对账落库 ===
        let reconciler = ImportReconciler::new(Arc::clone(&self.store));
        let mut outcome = reconciler.reconcile(rows).await;

        let mut image_warnings: Vec<ImageWarning> = image_errors
            .into_iter()
            .map(|e| ImageWarning {
                row_number: e.row(),
                error: e.to_string(),
                error_type: e.error_type(),
            })
            .collect();
        image_warnings.sort_by_key(|w| w.row_number);

        outcome.total = total;
        outcome.merged = merged;
        outcome.image_warnings = image_warnings;
        outcome.heuristic_images = heuristic_images;
        outcome.elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            total = outcome.total,
            added = outcome.added,
            updated = outcome.updated,
            skipped = outcome.skipped,
            merged = outcome.merged,
            image_warnings = outcome.image_warnings.len(),
            heuristic_images = outcome.heuristic_images.len(),
            elapsed_ms = outcome.elapsed_ms,
            "产品目录导入完成"
        );
        Ok(outcome)
    }

    async fn import_file(&self, file_path: &Path) -> ImportResult<ImportOutcome> {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ImportError::UnsupportedFormat(file_path.display().to_string()))?;

        let bytes = tokio::fs::read(file_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ImportError::FileNotFound(file_path.display().to_string())
            }
            _ => ImportError::FileReadError(format!("{}: {}", file_path.display(), e)),
        })?;

        self.import_bytes(&bytes, file_name, file_path.parent()).await
    }
}
