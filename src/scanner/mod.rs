use crate::error::{AppraiserError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// フォルダ直下の画像を列挙（ファイル名順）
pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(AppraiserError::FileNotFound(folder.display().to_string()));
    }

    let mut images: Vec<ImageInfo> = WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && has_image_extension(e.path()))
        .map(|e| ImageInfo {
            path: e.path().to_path_buf(),
            file_name: e.file_name().to_string_lossy().to_string(),
        })
        .collect();

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// 画像ファイルを読み込み、形式を検証
pub fn load_image(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(AppraiserError::FileNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    validate_image(&bytes)?;
    Ok(bytes)
}

/// Base64文字列（data URL可）を画像バイト列に変換
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.trim().split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => encoded.trim(),
    };
    if payload.is_empty() {
        return Err(AppraiserError::InvalidInput("image is required".into()));
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AppraiserError::ImageLoad(format!("Base64デコード失敗: {}", e)))?;
    validate_image(&bytes)?;
    Ok(bytes)
}

/// 対応形式（JPEG/PNG/WebP）か判定
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat> {
    if bytes.is_empty() {
        return Err(AppraiserError::InvalidInput("image is required".into()));
    }
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => Ok(format),
        Ok(other) => Err(AppraiserError::ImageLoad(format!("未対応の画像形式: {:?}", other))),
        Err(_) => Err(AppraiserError::ImageLoad("画像形式を判別できません".into())),
    }
}

/// 画像のSHA-256（履歴記録用）
pub fn image_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("a.jpg")));
        assert!(has_image_extension(Path::new("a.JPG")));
        assert!(has_image_extension(Path::new("a.jpeg")));
        assert!(has_image_extension(Path::new("a.png")));
        assert!(has_image_extension(Path::new("a.webp")));
        assert!(!has_image_extension(Path::new("a.txt")));
        assert!(!has_image_extension(Path::new("a.gif")));
        assert!(!has_image_extension(Path::new("noext")));
    }

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"));
        assert!(matches!(result, Err(AppraiserError::FileNotFound(_))));
    }

    #[test]
    fn test_scan_folder_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["c.jpg", "a.PNG", "b.webp", "notes.txt"] {
            File::create(dir.path().join(name)).unwrap().write_all(b"dummy").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("d.jpg")).unwrap();

        let result = scan_folder(dir.path()).unwrap();
        let names: Vec<&str> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.PNG", "b.webp", "c.jpg"]);
    }

    #[test]
    fn test_load_image_validates_content() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("item.jpg");
        File::create(&good).unwrap().write_all(JPEG_HEADER).unwrap();
        let bad = dir.path().join("fake.jpg");
        File::create(&bad).unwrap().write_all(b"not an image").unwrap();

        assert_eq!(load_image(&good).unwrap(), JPEG_HEADER);
        assert!(matches!(load_image(&bad), Err(AppraiserError::ImageLoad(_))));
        assert!(matches!(
            load_image(&dir.path().join("missing.jpg")),
            Err(AppraiserError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_decode_base64_plain_and_data_url() {
        let encoded = STANDARD.encode(PNG_HEADER);
        assert_eq!(decode_base64_image(&encoded).unwrap(), PNG_HEADER);

        let data_url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_base64_image(&data_url).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_decode_base64_errors() {
        assert!(matches!(decode_base64_image(""), Err(AppraiserError::InvalidInput(_))));
        assert!(matches!(decode_base64_image("data:image/png;base64,"), Err(AppraiserError::InvalidInput(_))));
        assert!(matches!(decode_base64_image("%%%"), Err(AppraiserError::ImageLoad(_))));
    }

    #[test]
    fn test_validate_image_formats() {
        assert_eq!(validate_image(JPEG_HEADER).unwrap(), ImageFormat::Jpeg);
        assert_eq!(validate_image(PNG_HEADER).unwrap(), ImageFormat::Png);
        assert!(matches!(validate_image(&[]), Err(AppraiserError::InvalidInput(_))));
        assert!(validate_image(b"GIF89a....").is_err());
    }

    #[test]
    fn test_image_digest() {
        assert_eq!(
            image_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(image_digest(JPEG_HEADER).len(), 64);
    }
}
