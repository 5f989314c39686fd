// ==========================================
// 产品目录导入 - 内嵌图片提取器
// ==========================================
// 职责: xlsx 归档内嵌图片 → 数据行
// 策略链: 锚点范围 → 归档顺序（启发式）→ 第一张未用图片（兜底）
// 红线: 单张图片失败只产生告警，不中止导入
// ==========================================

use crate::domain::import::{ColumnMap, ExtractedImage, RawGrid};
use crate::domain::types::{CanonicalField, ImageSource};
use crate::importer::drawing_parser::{load_sheet_drawing, open_archive, read_entry, SheetDrawing};
use crate::importer::error::RowError;
use crate::importer::image_codec::encode_with_path_mime;
use std::collections::HashSet;
use tracing::{debug, info, warn};

// ==========================================
// LocateContext - 单行定位上下文
// ==========================================
pub struct LocateContext<'a> {
    pub drawing: &'a SheetDrawing,
    /// 数据行号（表头为第 1 行）
    pub row_number: usize,
    /// 目标单元格（工作表 0 基坐标）；无图片列时 col 为 None
    pub target_row: u32,
    pub target_col: Option<u32>,
    /// 已分配给其他行的图片
    pub used: &'a HashSet<String>,
}

// ==========================================
// ImageLocator Trait
// ==========================================
// 用途: 单一定位策略，返回归档内图片路径
// 实现者: AnchorRangeLocator, MediaOrderLocator, FirstUnusedMediaLocator
pub trait ImageLocator: Send + Sync {
    fn source(&self) -> ImageSource;

    fn locate(&self, ctx: &LocateContext<'_>) -> Option<String>;
}

/// 锚点范围命中：起始行等于目标行的优先，其次覆盖目标单元格的未用锚点，再按文档顺序
pub struct AnchorRangeLocator;

impl ImageLocator for AnchorRangeLocator {
    fn source(&self) -> ImageSource {
        ImageSource::Anchor
    }

    fn locate(&self, ctx: &LocateContext<'_>) -> Option<String> {
        let mut covering = ctx
            .drawing
            .anchors
            .iter()
            .filter(|a| a.covers(ctx.target_row, ctx.target_col));

        let top_row_hit = covering.clone().find(|a| a.from_row == ctx.target_row);
        top_row_hit
            .or_else(|| covering.find(|a| !ctx.used.contains(&a.media_path)))
            .map(|a| a.media_path.clone())
    }
}

/// 归档顺序：第 n 张光栅图片对应第 n + 2 行（仅当绘图部件没有任何锚点信息）
pub struct MediaOrderLocator;

impl ImageLocator for MediaOrderLocator {
    fn source(&self) -> ImageSource {
        ImageSource::Positional
    }

    fn locate(&self, ctx: &LocateContext<'_>) -> Option<String> {
        if ctx.drawing.has_anchor_metadata() {
            return None;
        }
        let index = ctx.row_number.checked_sub(2)?;
        ctx.drawing
            .orphan_media()
            .nth(index)
            .filter(|m| !ctx.used.contains(*m))
            .map(|m| m.to_string())
    }
}

/// 兜底：第一张既未使用也未被锚点绑定的光栅图片
pub struct FirstUnusedMediaLocator;

impl ImageLocator for FirstUnusedMediaLocator {
    fn source(&self) -> ImageSource {
        ImageSource::FirstAvailable
    }

    fn locate(&self, ctx: &LocateContext<'_>) -> Option<String> {
        ctx.drawing
            .orphan_media()
            .find(|m| !ctx.used.contains(*m))
            .map(|m| m.to_string())
    }
}

// ==========================================
// ExtractionReport - 提取结果
// ==========================================
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub images: Vec<ExtractedImage>,
    pub warnings: Vec<RowError>,
}

impl ExtractionReport {
    pub fn image_for_row(&self, row_number: usize) -> Option<&ExtractedImage> {
        self.images.iter().find(|img| img.row_number == row_number)
    }
}

// ==========================================
// EmbeddedImageExtractor
// ==========================================
pub struct EmbeddedImageExtractor {
    locators: Vec<Box<dyn ImageLocator>>,
}

impl Default for EmbeddedImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedImageExtractor {
    pub fn new() -> Self {
        Self {
            locators: vec![
                Box::new(AnchorRangeLocator),
                Box::new(MediaOrderLocator),
                Box::new(FirstUnusedMediaLocator),
            ],
        }
    }

    pub fn with_locators(locators: Vec<Box<dyn ImageLocator>>) -> Self {
        Self { locators }
    }

    /// 为给定数据行提取内嵌图片
    ///
    /// # 参数
    /// - bytes: xlsx 文件字节
    /// - grid: 解析后的网格（提供行号 → 工作表坐标）
    /// - column_map: 表头映射（提供图片列）
    /// - row_numbers: 需要匹配图片的数据行号（已排除空行）
    ///
    /// # 返回
    /// 归档无法打开时返回空结果，不报错
    pub fn extract(
        &self,
        bytes: &[u8],
        grid: &RawGrid,
        column_map: &ColumnMap,
        row_numbers: &[usize],
    ) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        let mut archive = match open_archive(bytes) {
            Ok(archive) => archive,
            Err(e) => {
                warn!(error = %e, "无法打开表格归档，跳过内嵌图片提取");
                return report;
            }
        };

        let drawing = load_sheet_drawing(&mut archive);
        if drawing.media.is_empty() {
            debug!("归档中没有光栅图片");
            return report;
        }

        let target_col = column_map
            .get(CanonicalField::Image)
            .map(|col| grid.sheet_col_of(col));
        let mut used: HashSet<String> = HashSet::new();

        for &row_number in row_numbers {
            let ctx = LocateContext {
                drawing: &drawing,
                row_number,
                target_row: grid.sheet_row_of(row_number),
                target_col,
                used: &used,
            };

            let located = self
                .locators
                .iter()
                .find_map(|locator| locator.locate(&ctx).map(|path| (locator.source(), path)));
            let Some((source, media_path)) = located else {
                continue;
            };
            used.insert(media_path.clone());

            if source.is_heuristic() {
                warn!(
                    row = row_number,
                    media = %media_path,
                    source = ?source,
                    "未找到锚点，按启发式规则匹配图片"
                );
            }

            match read_entry(&mut archive, &media_path) {
                Ok(data) if !data.is_empty() => {
                    report.images.push(ExtractedImage {
                        row_number,
                        image: encode_with_path_mime(&data, &media_path),
                        media_path,
                        source,
                    });
                }
                Ok(_) => {
                    warn!(row = row_number, media = %media_path, "内嵌图片数据为空");
                    report.warnings.push(RowError::ImageExtractionFailure {
                        row: row_number,
                        media: media_path,
                        message: "图片数据为空".to_string(),
                    });
                }
                Err(message) => {
                    warn!(row = row_number, media = %media_path, error = %message, "内嵌图片读取失败");
                    report.warnings.push(RowError::ImageExtractionFailure {
                        row: row_number,
                        media: media_path,
                        message,
                    });
                }
            }
        }

        info!(
            anchors = drawing.anchors.len(),
            media = drawing.media.len(),
            extracted = report.images.len(),
            failed = report.warnings.len(),
            "内嵌图片提取完成"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::RawGrid;
    use crate::importer::drawing_parser::tests::{
        absolute_anchor, build_archive, drawing_rels, drawing_xml, two_cell_anchor, SHEET_RELS,
        WORKBOOK_RELS, WORKBOOK_XML,
    };
    use crate::importer::header_mapper::HeaderMapper;

    fn grid(rows: usize) -> RawGrid {
        let mut cells = vec![vec![
            "Part No".to_string(),
            "Description".to_string(),
            "Image".to_string(),
        ]];
        for i in 0..rows {
            cells.push(vec![format!("P-{}", i + 1), format!("Item {}", i + 1), String::new()]);
        }
        RawGrid::new(cells)
    }

    fn archive_with(anchors: &[String], rels: &[(&str, &str)], media: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let drawing = drawing_xml(anchors).into_bytes();
        let drawing_rels = drawing_rels(rels).into_bytes();
        let mut entries: Vec<(&str, Vec<u8>)> = vec![
            ("xl/workbook.xml", WORKBOOK_XML.as_bytes().to_vec()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes().to_vec()),
            ("xl/worksheets/sheet1.xml", b"<worksheet/>".to_vec()),
            ("xl/worksheets/_rels/sheet1.xml.rels", SHEET_RELS.as_bytes().to_vec()),
            ("xl/drawings/drawing1.xml", drawing),
            ("xl/drawings/_rels/drawing1.xml.rels", drawing_rels),
        ];
        entries.extend(media.iter().cloned());
        build_archive(&entries)
    }

    #[test]
    fn test_anchor_matches_row_and_image_column() {
        // 第 3 行（0 基 2）图片位于 C 列；第 2 行没有图片
        let bytes = archive_with(
            &[two_cell_anchor((2, 2), (2, 2), "rId1")],
            &[("rId1", "../media/image1.png")],
            &[("xl/media/image1.png", vec![0x89, 0x50, 0x4E, 0x47])],
        );
        let grid = grid(2);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2, 3]);

        assert_eq!(report.images.len(), 1);
        let image = report.image_for_row(3).unwrap();
        assert_eq!(image.source, ImageSource::Anchor);
        assert_eq!(image.media_path, "xl/media/image1.png");
        assert_eq!(image.image.mime_type, "image/png");
        assert_eq!(image.image.decode(), Some(vec![0x89, 0x50, 0x4E, 0x47]));
        assert!(report.image_for_row(2).is_none());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_anchor_in_other_column_is_ignored() {
        let bytes = archive_with(
            &[two_cell_anchor((1, 5), (1, 5), "rId1")],
            &[("rId1", "../media/image1.png")],
            &[("xl/media/image1.png", vec![1])],
        );
        let grid = grid(1);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2]);

        // 图片已被锚点绑定，兜底策略也不会使用
        assert!(report.images.is_empty());
    }

    #[test]
    fn test_anchor_without_image_column_matches_by_row() {
        let bytes = archive_with(
            &[two_cell_anchor((1, 7), (1, 7), "rId1")],
            &[("rId1", "../media/image1.jpeg")],
            &[("xl/media/image1.jpeg", vec![1, 2])],
        );
        let grid = RawGrid::new(vec![
            vec!["sku".to_string()],
            vec!["A-1".to_string()],
        ]);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2]);

        let image = report.image_for_row(2).unwrap();
        assert_eq!(image.source, ImageSource::Anchor);
        assert_eq!(image.image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_top_row_anchor_preferred_over_spanning_anchor() {
        // 图片 1 跨第 2-3 行，图片 2 起始于第 3 行
        let bytes = archive_with(
            &[
                two_cell_anchor((1, 2), (2, 2), "rId1"),
                two_cell_anchor((2, 2), (2, 2), "rId2"),
            ],
            &[("rId1", "../media/image1.png"), ("rId2", "../media/image2.png")],
            &[
                ("xl/media/image1.png", vec![1]),
                ("xl/media/image2.png", vec![2]),
            ],
        );
        let grid = grid(2);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2, 3]);

        assert_eq!(report.image_for_row(2).unwrap().media_path, "xl/media/image1.png");
        assert_eq!(report.image_for_row(3).unwrap().media_path, "xl/media/image2.png");
    }

    #[test]
    fn test_positional_when_no_anchors() {
        let bytes = build_archive(&[
            ("xl/media/image1.png", vec![1]),
            ("xl/media/image2.gif", vec![2]),
        ]);
        let grid = grid(3);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2, 3, 4]);

        assert_eq!(report.images.len(), 2);
        let first = report.image_for_row(2).unwrap();
        assert_eq!(first.source, ImageSource::Positional);
        assert_eq!(first.media_path, "xl/media/image1.png");
        let second = report.image_for_row(3).unwrap();
        assert_eq!(second.media_path, "xl/media/image2.gif");
        assert_eq!(second.image.mime_type, "image/gif");
        assert!(report.image_for_row(4).is_none());
    }

    /// 只有绝对定位的徽标：不按归档顺序分给第一行，也不作兜底
    #[test]
    fn test_absolute_logo_is_not_assigned() {
        let bytes = archive_with(
            &[absolute_anchor("rId1")],
            &[("rId1", "../media/logo.png")],
            &[("xl/media/logo.png", vec![1])],
        );
        let grid = grid(1);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2]);

        assert!(report.images.is_empty());
        assert!(report.warnings.is_empty());
    }

    /// 图片只在第二个工作表：第一个工作表的行不取得任何图片
    #[test]
    fn test_second_sheet_images_are_ignored() {
        let bytes = build_archive(&[
            ("xl/workbook.xml", WORKBOOK_XML.as_bytes().to_vec()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes().to_vec()),
            ("xl/worksheets/sheet1.xml", b"<worksheet/>".to_vec()),
            ("xl/worksheets/sheet2.xml", b"<worksheet/>".to_vec()),
            ("xl/worksheets/_rels/sheet2.xml.rels", SHEET_RELS.as_bytes().to_vec()),
            (
                "xl/drawings/drawing1.xml",
                drawing_xml(&[two_cell_anchor((1, 2), (1, 2), "rId1")]).into_bytes(),
            ),
            (
                "xl/drawings/_rels/drawing1.xml.rels",
                drawing_rels(&[("rId1", "../media/image1.png")]).into_bytes(),
            ),
            ("xl/media/image1.png", vec![1]),
        ]);
        let grid = grid(1);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2]);

        assert!(report.images.is_empty());
    }

    #[test]
    fn test_first_available_for_orphan_media() {
        // 锚点只绑定 image1，image2 未绑定，第 3 行由兜底策略取得
        let bytes = archive_with(
            &[two_cell_anchor((1, 2), (1, 2), "rId1")],
            &[("rId1", "../media/image1.png")],
            &[
                ("xl/media/image1.png", vec![1]),
                ("xl/media/image2.png", vec![2]),
            ],
        );
        let grid = grid(3);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2, 3, 4]);

        assert_eq!(report.image_for_row(2).unwrap().source, ImageSource::Anchor);
        let fallback = report.image_for_row(3).unwrap();
        assert_eq!(fallback.source, ImageSource::FirstAvailable);
        assert_eq!(fallback.media_path, "xl/media/image2.png");
        assert!(report.image_for_row(4).is_none());
    }

    #[test]
    fn test_missing_media_entry_is_row_warning() {
        let bytes = archive_with(
            &[
                two_cell_anchor((1, 2), (1, 2), "rId1"),
                two_cell_anchor((2, 2), (2, 2), "rId2"),
            ],
            &[("rId1", "../media/image1.png"), ("rId2", "../media/missing.png")],
            &[("xl/media/image1.png", vec![1])],
        );
        let grid = grid(2);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2, 3]);

        assert!(report.image_for_row(2).is_some());
        assert!(report.image_for_row(3).is_none());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].row(), 3);
        assert!(matches!(
            &report.warnings[0],
            RowError::ImageExtractionFailure { media, .. } if media == "xl/media/missing.png"
        ));
    }

    #[test]
    fn test_unreadable_archive_yields_nothing() {
        let grid = grid(1);
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(b"not a zip", &grid, &map, &[2]);

        assert!(report.images.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_grid_origin_offsets_target_cell() {
        // 数据从 B3 开始：表头在工作表第 2 行（0 基），第一条数据在 0 基第 3 行
        let bytes = archive_with(
            &[two_cell_anchor((3, 3), (3, 3), "rId1")],
            &[("rId1", "../media/image1.png")],
            &[("xl/media/image1.png", vec![1])],
        );
        let grid = grid(1).with_origin((2, 1));
        let map = HeaderMapper.map(grid.header().unwrap());

        let report = EmbeddedImageExtractor::new().extract(&bytes, &grid, &map, &[2]);

        assert_eq!(report.image_for_row(2).unwrap().source, ImageSource::Anchor);
    }
}
