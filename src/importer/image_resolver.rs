// ==========================================
// 产品目录导入 - 外部图片解析器
// ==========================================
// 职责: CSV 图片单元格 → 自包含编码图片
// 规则: data URI 原样透传; http/https 单次 GET（带超时，不重试）;
//       其余按文件路径（绝对路径，或相对上传文件所在目录）
// 并发: 行间有界并发下载，结果按行号归并
// ==========================================

use crate::domain::import::EncodedImage;
use crate::importer::error::{ImportError, ImportResult, RowError};
use crate::importer::image_codec::{
    encode_with_path_mime, extension_of, mime_type_from_extension, DEFAULT_IMAGE_MIME,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// ==========================================
// ImageFetcher Trait
// ==========================================
// 用途: 网络协作方（可替换为测试桩）
// 实现者: HttpImageFetcher
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// 单次 GET；成功要求 2xx 且响应体非空
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// 下载结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("请求超时")]
    Timeout,

    #[error("HTTP 状态码 {0}")]
    Status(u16),

    #[error("响应体为空")]
    EmptyBody,

    #[error("网络错误: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

// ==========================================
// HttpImageFetcher - reqwest 实现
// ==========================================
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// 创建下载器（timeout 作用于每个请求）
    pub fn new(timeout: Duration) -> ImportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::InternalError(format!("HTTP 客户端创建失败: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

// ==========================================
// 图片引用分类
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
enum ImageReference {
    Embedded(EncodedImage),
    Remote(String),
    Local(PathBuf),
}

fn is_remote(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// 响应 Content-Type 为 image/* 时采用，否则按 URL 扩展名，再否则默认
fn remote_mime_type(content_type: Option<&str>, url: &str) -> String {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"));
    declared.unwrap_or_else(|| {
        extension_of(url)
            .and_then(|ext| mime_type_from_extension(&ext))
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string()
    })
}

/// 一行待解析的图片单元格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub row_number: usize,
    pub value: String,
}

/// 解析结果（按行号索引）
#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub images: HashMap<usize, EncodedImage>,
    pub warnings: Vec<RowError>,
}

// ==========================================
// ExternalImageResolver
// ==========================================
pub struct ExternalImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    concurrency: usize,
}

impl ExternalImageResolver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    fn classify(value: &str, base_dir: Option<&Path>) -> Option<Result<ImageReference, String>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let is_data_uri = value
            .get(..5)
            .map(|prefix| prefix.eq_ignore_ascii_case("data:"))
            .unwrap_or(false);
        if is_data_uri {
            return Some(
                EncodedImage::parse_data_uri(value)
                    .map(ImageReference::Embedded)
                    .ok_or_else(|| "无效的 data URI".to_string()),
            );
        }
        if is_remote(value) {
            return Some(Ok(ImageReference::Remote(value.to_string())));
        }
        let path = Path::new(value);
        let resolved = match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        Some(Ok(ImageReference::Local(resolved)))
    }

    /// 解析单个单元格
    ///
    /// # 返回
    /// - Ok(None): 单元格为空
    /// - Ok(Some): 编码后的图片
    /// - Err(RowError): 图片降级为空，调用方记录告警
    pub async fn resolve(
        &self,
        row_number: usize,
        value: &str,
        base_dir: Option<&Path>,
    ) -> Result<Option<EncodedImage>, RowError> {
        let reference = match Self::classify(value, base_dir) {
            None => return Ok(None),
            Some(Ok(reference)) => reference,
            Some(Err(message)) => {
                return Err(RowError::ImageExtractionFailure {
                    row: row_number,
                    media: "data URI".to_string(),
                    message,
                })
            }
        };

        match reference {
            ImageReference::Embedded(image) => Ok(Some(image)),
            ImageReference::Remote(url) => {
                debug!(row = row_number, url = %url, "下载外部图片");
                let fetched = self.fetcher.fetch(&url).await.map_err(|e| {
                    RowError::DownloadFailure {
                        row: row_number,
                        url: url.clone(),
                        message: e.to_string(),
                    }
                })?;
                let mime = remote_mime_type(fetched.content_type.as_deref(), &url);
                Ok(Some(EncodedImage::from_bytes(&fetched.bytes, &mime)))
            }
            ImageReference::Local(path) => read_local_image(row_number, &path).await.map(Some),
        }
    }

    /// 批量解析（有界并发，结果按行号归并）
    pub async fn resolve_all(
        &self,
        requests: Vec<ImageRequest>,
        base_dir: Option<&Path>,
    ) -> ResolutionReport {
        let requested = requests.len();
        let results: Vec<(usize, Result<Option<EncodedImage>, RowError>)> =
            stream::iter(requests.into_iter().map(|req| async move {
                let result = self.resolve(req.row_number, &req.value, base_dir).await;
                (req.row_number, result)
            }))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = ResolutionReport::default();
        for (row_number, result) in results {
            match result {
                Ok(Some(image)) => {
                    report.images.insert(row_number, image);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(row = row_number, error = %e, "图片解析失败，该行图片置空");
                    report.warnings.push(e);
                }
            }
        }

        info!(
            requested,
            resolved = report.images.len(),
            failed = report.warnings.len(),
            concurrency = self.concurrency,
            "外部图片解析完成"
        );
        report
    }
}

async fn read_local_image(row_number: usize, path: &Path) -> Result<EncodedImage, RowError> {
    let display = path.display().to_string();
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(RowError::ImageNotFound {
            row: row_number,
            path: display,
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RowError::ImageExtractionFailure {
            row: row_number,
            media: display.clone(),
            message: e.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(RowError::ImageExtractionFailure {
            row: row_number,
            media: display,
            message: "图片文件为空".to_string(),
        });
    }

    Ok(encode_with_path_mime(&bytes, &display))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 测试桩：按 URL 返回预设结果，并记录最大并发
    struct StubFetcher {
        responses: HashMap<String, Result<FetchedImage, FetchError>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(responses: Vec<(&str, Result<FetchedImage, FetchError>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(url, r)| (url.to_string(), r))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(url.to_string());
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }

    fn png_response(bytes: &[u8]) -> Result<FetchedImage, FetchError> {
        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type: Some("image/png".to_string()),
        })
    }

    #[test]
    fn test_remote_mime_type() {
        assert_eq!(
            remote_mime_type(Some("image/jpeg; charset=binary"), "https://x/a.png"),
            "image/jpeg"
        );
        assert_eq!(
            remote_mime_type(Some("application/octet-stream"), "https://x/a.gif?v=2"),
            "image/gif"
        );
        assert_eq!(remote_mime_type(None, "https://x/photo"), DEFAULT_IMAGE_MIME);
    }

    #[test]
    fn test_is_remote_case_insensitive() {
        assert!(is_remote("HTTPS://cdn.example.com/a.png"));
        assert!(is_remote("http://a"));
        assert!(!is_remote("images/http.png"));
        assert!(!is_remote("ftp://a/b.png"));
    }

    #[tokio::test]
    async fn test_data_uri_passes_through() {
        let fetcher = Arc::new(StubFetcher::new(vec![]));
        let resolver = ExternalImageResolver::new(fetcher.clone(), 4);
        let uri = "data:image/png;base64,iVBORw0KGgo=";

        let image = resolver.resolve(2, uri, None).await.unwrap().unwrap();

        assert_eq!(image.data_uri, uri);
        assert_eq!(image.mime_type, "image/png");
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cell_is_none() {
        let resolver = ExternalImageResolver::new(Arc::new(StubFetcher::new(vec![])), 4);
        assert_eq!(resolver.resolve(2, "   ", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_download_failure_is_row_warning() {
        let fetcher = Arc::new(StubFetcher::new(vec![(
            "https://cdn.example.com/slow.png",
            Err(FetchError::Timeout),
        )]));
        let resolver = ExternalImageResolver::new(fetcher, 4);

        let err = resolver
            .resolve(5, "https://cdn.example.com/slow.png", None)
            .await
            .unwrap_err();

        assert_eq!(err.row(), 5);
        assert_eq!(err.error_type(), crate::domain::types::ErrorType::DownloadFailure);
    }

    #[tokio::test]
    async fn test_local_path_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("imgs")).unwrap();
        std::fs::write(dir.path().join("imgs/a.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        let resolver = ExternalImageResolver::new(Arc::new(StubFetcher::new(vec![])), 4);

        let image = resolver
            .resolve(2, "imgs/a.jpg", Some(dir.path()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.decode(), Some(vec![0xFF, 0xD8, 0xFF]));
    }

    #[tokio::test]
    async fn test_missing_local_file_is_image_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ExternalImageResolver::new(Arc::new(StubFetcher::new(vec![])), 4);

        let err = resolver
            .resolve(3, "missing.png", Some(dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, RowError::ImageNotFound { row: 3, .. }));
    }

    #[tokio::test]
    async fn test_resolve_all_bounded_concurrency_keyed_by_row() {
        let mut responses = Vec::new();
        let urls: Vec<String> = (0..8)
            .map(|i| format!("https://cdn.example.com/{}.png", i))
            .collect();
        for url in &urls {
            responses.push((url.as_str(), png_response(&[1, 2, 3])));
        }
        let fetcher = Arc::new(StubFetcher::new(responses));
        let resolver = ExternalImageResolver::new(fetcher.clone(), 2);

        let mut requests: Vec<ImageRequest> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| ImageRequest {
                row_number: i + 2,
                value: url.clone(),
            })
            .collect();
        requests.push(ImageRequest {
            row_number: 10,
            value: "https://cdn.example.com/gone.png".to_string(),
        });

        let report = resolver.resolve_all(requests, None).await;

        assert_eq!(report.images.len(), 8);
        assert!(report.images.contains_key(&2));
        assert!(report.images.contains_key(&9));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].row(), 10);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    /// 本地 HTTP 服务：/ok.png 返回图片，/missing 返回 404，/slow 不响应
    async fn spawn_http_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let response: Vec<u8> = match path.as_str() {
                        "/ok.png" => {
                            let body = [0x89u8, 0x50, 0x4E, 0x47];
                            let mut r = format!(
                                "HTTP/1.1 200 OK\r\nContent-Type: image/webp\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                                body.len()
                            )
                            .into_bytes();
                            r.extend_from_slice(&body);
                            r
                        }
                        "/empty.png" => {
                            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
                        }
                        "/slow" => {
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            return;
                        }
                        _ => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_vec(),
                    };
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_fetcher_against_local_server() {
        let base = spawn_http_server().await;
        let fetcher = HttpImageFetcher::new(Duration::from_millis(300)).unwrap();

        let ok = fetcher.fetch(&format!("{}/ok.png", base)).await.unwrap();
        assert_eq!(ok.bytes, vec![0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(ok.content_type.as_deref(), Some("image/webp"));

        assert_eq!(
            fetcher.fetch(&format!("{}/missing", base)).await.unwrap_err(),
            FetchError::Status(404)
        );
        assert_eq!(
            fetcher.fetch(&format!("{}/empty.png", base)).await.unwrap_err(),
            FetchError::EmptyBody
        );
        assert_eq!(
            fetcher.fetch(&format!("{}/slow", base)).await.unwrap_err(),
            FetchError::Timeout
        );
    }
}
