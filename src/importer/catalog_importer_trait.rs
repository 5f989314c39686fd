// ==========================================
// 产品目录导入 - 导入 Trait
// ==========================================
// 职责: 定义导入接口（不包含实现）
// ==========================================

use crate::domain::import::{ImportOutcome, RawGrid};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// CatalogImporter Trait
// ==========================================
// 用途: 目录导入主接口
// 实现者: CatalogImporterImpl
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 从内存字节导入
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 声明的原始文件名（识别格式 + 派生分类）
    /// - base_dir: 上传文件所在目录（解析相对图片路径），可为空
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 逐行结果（行级失败不会中止）
    /// - Err: 流程级失败（格式不支持/空文件/缺少料号列）
    ///
    /// # 导入流程
    /// 1. 文件解析 → RawGrid
    /// 2. 表头映射 → ColumnMap
    /// 3. 图片提取（xlsx 内嵌）/ 图片解析（csv 外部引用）
    /// 4. 逐行组装 + 同文件重复料号合并
    /// 5. 逐行幂等入库
    async fn import_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        base_dir: Option<&Path>,
    ) -> ImportResult<ImportOutcome>;

    /// 从文件路径导入（base_dir 取文件所在目录）
    async fn import_file(&self, file_path: &Path) -> ImportResult<ImportOutcome>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 1）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件字节为原始网格（第 0 行为表头）
    ///
    /// # 返回
    /// - Ok(RawGrid): 至少包含一行
    /// - Err(EmptyFile): 未解析到任何行
    /// - Err: 格式错误
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<RawGrid>;
}
