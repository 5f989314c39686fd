// ==========================================
// 产品目录导入 - 文件解析器实现
// ==========================================
// 阶段 1: 文件字节 → RawGrid
// 支持: Excel (.xlsx/.xlsm，仅第一个工作表) / CSV (.csv)
// ==========================================

use crate::domain::import::RawGrid;
use crate::domain::types::FileFormat;
use crate::importer::catalog_importer_trait::FileParser;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{Reader, Xlsx};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

const UTF8_BOM: char = '\u{feff}';

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<RawGrid> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 表头作为第 0 行保留在网格中
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        let mut rows = Vec::new();
        for result in reader.byte_records() {
            let record = result?;
            let row: Vec<String> = record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect();
            rows.push(row);
        }

        // 去掉首个单元格的 BOM
        if let Some(first) = rows.first_mut().and_then(|r| r.first_mut()) {
            if first.starts_with(UTF8_BOM) {
                *first = first.trim_start_matches(UTF8_BOM).to_string();
            }
        }

        if rows.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        Ok(RawGrid::new(rows))
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<RawGrid> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

        // 只读取第一个 sheet（多工作表不支持）
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        if sheet_names.len() > 1 {
            debug!(
                sheet = %sheet_name,
                ignored = sheet_names.len() - 1,
                "多工作表文件，仅读取第一个工作表"
            );
        }

        let range = workbook.worksheet_range(&sheet_name)?;

        // range 从第一个非空单元格开始，记录其在工作表中的位置
        let origin = range.start().unwrap_or((0, 0));

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        if rows.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        Ok(RawGrid::new(rows).with_origin(origin))
    }
}

// ==========================================
// 通用文件解析器（根据声明的文件名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 识别格式（不支持时返回 UnsupportedFormat）
    pub fn detect_format(&self, file_name: &str) -> ImportResult<FileFormat> {
        FileFormat::from_file_name(file_name).ok_or_else(|| {
            let ext = Path::new(file_name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            ImportError::UnsupportedFormat(if ext.is_empty() {
                file_name.to_string()
            } else {
                ext
            })
        })
    }

    pub fn parse(&self, bytes: &[u8], format: FileFormat) -> ImportResult<RawGrid> {
        match format {
            FileFormat::DelimitedText => CsvParser.parse_bytes(bytes),
            FileFormat::SpreadsheetArchive => ExcelParser.parse_bytes(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parser_keeps_header_row() {
        let data = "Part No,Description,Image\nX-100,Widget,https://example.com/a.png\nX-200,Gadget,\n";

        let grid = CsvParser.parse_bytes(data.as_bytes()).unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(grid.header().unwrap()[0], "Part No");
        let rows: Vec<_> = grid.data_rows().collect();
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1[2], "https://example.com/a.png");
        assert_eq!(rows[1].1[2], "");
    }

    #[test]
    fn test_csv_parser_ragged_and_quoted() {
        let data = "sku,description\n\"A,1\",\"Say \"\"hi\"\"\"\nB-2\n";

        let grid = CsvParser.parse_bytes(data.as_bytes()).unwrap();

        let rows: Vec<_> = grid.data_rows().collect();
        assert_eq!(rows[0].1, &["A,1".to_string(), "Say \"hi\"".to_string()]);
        assert_eq!(rows[1].1.len(), 1);
    }

    #[test]
    fn test_csv_parser_strips_bom() {
        let data = "\u{feff}sku,description\nA,B\n";
        let grid = CsvParser.parse_bytes(data.as_bytes()).unwrap();
        assert_eq!(grid.header().unwrap()[0], "sku");
    }

    #[test]
    fn test_csv_parser_empty_file() {
        let result = CsvParser.parse_bytes(b"");
        assert!(matches!(result, Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_excel_parser_rejects_garbage() {
        let result = ExcelParser.parse_bytes(b"definitely not a zip archive");
        assert!(matches!(result, Err(ImportError::ExcelParseError(_))));
    }

    #[test]
    fn test_detect_format() {
        let parser = UniversalFileParser;
        assert_eq!(
            parser.detect_format("catalog.csv").unwrap(),
            FileFormat::DelimitedText
        );
        assert!(matches!(
            parser.detect_format("catalog.pdf"),
            Err(ImportError::UnsupportedFormat(ext)) if ext == "pdf"
        ));
        assert!(matches!(
            parser.detect_format("catalog"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }
}
