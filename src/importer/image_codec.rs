// ==========================================
// 产品目录导入 - 图片编码工具
// ==========================================
// 职责: 扩展名 → MIME、光栅图片识别、字节 → data URI
// ==========================================

use crate::domain::import::EncodedImage;

/// 无法识别类型时的默认 MIME
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// 光栅图片扩展名（矢量/图元文件 emf/wmf/svg 不参与行匹配）
const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// 取路径或 URL 的扩展名（小写，忽略查询串与片段）
pub fn extension_of(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// 扩展名 → MIME
pub fn mime_type_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "emf" => "image/emf",
        "wmf" => "image/wmf",
        _ => return None,
    };
    Some(mime)
}

/// 路径 → MIME（未知扩展名回落到默认值）
pub fn mime_type_from_path(path: &str) -> &'static str {
    extension_of(path)
        .and_then(|ext| mime_type_from_extension(&ext))
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

/// 是否为光栅图片
pub fn is_raster_media(path: &str) -> bool {
    extension_of(path)
        .map(|ext| RASTER_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// 编码为 data URI，MIME 由路径扩展名决定
pub fn encode_with_path_mime(bytes: &[u8], path: &str) -> EncodedImage {
    EncodedImage::from_bytes(bytes, mime_type_from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("xl/media/image1.PNG"), Some("png".to_string()));
        assert_eq!(
            extension_of("https://cdn.example.com/p/x.jpeg?w=200#top"),
            Some("jpeg".to_string())
        );
        assert_eq!(extension_of("https://cdn.example.com/p/photo"), None);
        assert_eq!(extension_of("C:\\imgs\\a.gif"), Some("gif".to_string()));
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn test_mime_type_from_path() {
        assert_eq!(mime_type_from_path("a.jpg"), "image/jpeg");
        assert_eq!(mime_type_from_path("a.webp"), "image/webp");
        assert_eq!(mime_type_from_path("a.bin"), DEFAULT_IMAGE_MIME);
        assert_eq!(mime_type_from_path("noext"), DEFAULT_IMAGE_MIME);
    }

    #[test]
    fn test_is_raster_media() {
        assert!(is_raster_media("xl/media/image3.jpeg"));
        assert!(!is_raster_media("xl/media/image2.emf"));
        assert!(!is_raster_media("xl/media/logo.svg"));
    }

    #[test]
    fn test_encode_with_path_mime() {
        let encoded = encode_with_path_mime(&[1, 2, 3], "x.gif");
        assert_eq!(encoded.mime_type, "image/gif");
        assert!(encoded.data_uri.starts_with("data:image/gif;base64,"));
        assert_eq!(encoded.decode(), Some(vec![1, 2, 3]));
    }
}
