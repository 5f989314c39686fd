// ==========================================
// 产品目录导入 - 命令行入口
// ==========================================
// 用法: catalog-import <file> [db_path]
// 输出: stdout 打印 JSON 响应信封；流程级失败退出码 1
// ==========================================

use anyhow::{Context, Result};
use catalog_import::{logging, ImportApi, APP_NAME, VERSION};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DB_FILE_NAME: &str = "catalog.db";

/// 默认数据库路径
///
/// 优先级: CATALOG_IMPORT_DB_PATH → 用户数据目录 → 当前目录
fn get_default_db_path() -> PathBuf {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("CATALOG_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("catalog-import");
            // 确保目录存在
            std::fs::create_dir_all(&dir).ok();
            dir.join(DB_FILE_NAME)
        }
        None => PathBuf::from(DB_FILE_NAME),
    }
}

async fn run(file: &Path, db_path: &Path) -> Result<bool> {
    let db_path_str = db_path
        .to_str()
        .with_context(|| format!("数据库路径不是有效 UTF-8: {}", db_path.display()))?;
    tracing::info!(db = %db_path_str, "使用数据库");

    let api = ImportApi::new(db_path_str).context("初始化导入接口失败")?;
    let response = api.import_catalog_file(file).await;

    let json = serde_json::to_string_pretty(&response).context("序列化导入结果失败")?;
    println!("{}", json);
    Ok(response.success)
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let mut args = std::env::args().skip(1);
    let Some(file) = args.next() else {
        eprintln!("{} v{}", APP_NAME, VERSION);
        eprintln!("用法: catalog-import <file> [db_path]");
        return ExitCode::from(2);
    };
    let db_path = args.next().map(PathBuf::from).unwrap_or_else(get_default_db_path);

    match run(Path::new(&file), &db_path).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = ?e, "导入失败");
            eprintln!("错误: {:#}", e);
            ExitCode::from(1)
        }
    }
}
