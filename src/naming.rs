//! Storage names, MIME inference, and size formatting
//!
//! Storage names are opaque on purpose: a UTC timestamp plus 64 bits of
//! randomness, keeping only a sanitized extension from the display name so
//! nothing about the original leaks into the blob directory.

use std::path::Path;

use chrono::Utc;

/// Longest extension carried over into a storage name
const MAX_EXT_LEN: usize = 10;

/// Generate an opaque storage name for a blob.
///
/// Format: `YYYYmmddHHMMSS_<16 hex chars>[.ext]`. Collisions across 10k
/// generations in the same second are ruled out by the 64-bit random segment.
pub fn generate_storage_name(original_name: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let mut random = [0u8; 8];
    getrandom::getrandom(&mut random).expect("failed to generate random bytes");

    match sanitized_extension(original_name) {
        Some(ext) => format!("{timestamp}_{}.{ext}", hex::encode(random)),
        None => format!("{timestamp}_{}", hex::encode(random)),
    }
}

/// Lowercased, alphanumeric-only extension of a display name, if it has one
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    let clean: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXT_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    if clean.is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Infer a MIME type from a file name.
///
/// Common office/media extensions resolve through a fixed table; anything
/// else is looked up in the `mime_guess` registry, with
/// `application/octet-stream` as the final fallback. Total over all inputs.
pub fn infer_mime_type(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let known = match ext.as_str() {
        "txt" => Some("text/plain"),
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "ppt" => Some("application/vnd.ms-powerpoint"),
        "pptx" => {
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        }
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "mp3" => Some("audio/mpeg"),
        "mp4" => Some("video/mp4"),
        "zip" => Some("application/zip"),
        "csv" => Some("text/csv"),
        _ => None,
    };

    if let Some(mime) = known {
        return mime.to_string();
    }

    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Human-readable byte count, one decimal place
pub fn format_size(num_bytes: u64) -> String {
    let mut size = num_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}
