//! Per-file metadata and content hashing.
//!
//! `FileInfo` is immutable after creation: updating a file produces a new
//! value. The checksum is the SHA-256 hex digest of the file content and
//! drives change suppression during incremental updates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::parsing::Language;

/// Metadata snapshot of an indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Absolute path.
    pub file_path: PathBuf,
    /// Modification time in milliseconds since `UNIX_EPOCH`.
    pub last_modified: u64,
    /// Size in bytes.
    pub size: u64,
    /// Extension including the leading dot, lowercased.
    pub extension: String,
    /// Stable language tag, when the extension maps to one.
    pub language: Option<String>,
    /// SHA-256 hex digest of the content; empty when not yet computed.
    pub checksum: String,
}

impl FileInfo {
    pub fn new(
        file_path: impl Into<PathBuf>,
        last_modified: u64,
        size: u64,
        checksum: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        let extension = extension_of(&file_path);
        let language = Language::from_path(&file_path).map(|l| l.id().to_string());
        Self {
            file_path,
            last_modified,
            size,
            extension,
            language,
            checksum: checksum.into(),
        }
    }

    /// Compose from stat metadata plus a precomputed checksum.
    pub fn from_metadata(
        file_path: impl Into<PathBuf>,
        metadata: &std::fs::Metadata,
        checksum: impl Into<String>,
    ) -> Self {
        Self::new(file_path, mtime_millis(metadata), metadata.len(), checksum)
    }

    /// Whether the given content hashes to this file's stored checksum.
    pub fn matches_content(&self, content: &str) -> bool {
        !self.checksum.is_empty() && self.checksum == calculate_checksum(content)
    }
}

/// Dot-prefixed lowercase extension, or empty for extensionless paths.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// SHA-256 hex digest of content.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Current time in milliseconds since `UNIX_EPOCH`.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A file's mtime in milliseconds since `UNIX_EPOCH`.
pub fn mtime_millis(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable_hex() {
        let a = calculate_checksum("export function foo(){}");
        let b = calculate_checksum("export function foo(){}");
        let c = calculate_checksum("export function bar(){}");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timestamp_is_recent_and_monotonic() {
        let t1 = timestamp_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = timestamp_millis();

        assert!(t2 >= t1);
        // After 2020-01-01 in millis.
        assert!(t1 > 1_577_836_800_000);
    }

    #[test]
    fn test_file_info_derives_extension_and_language() {
        let info = FileInfo::new("/ws/src/app.TS", 1000, 42, "");
        assert_eq!(info.extension, ".ts");
        assert_eq!(info.language.as_deref(), Some("typescript"));

        let info = FileInfo::new("/ws/readme.txt", 1000, 42, "");
        assert_eq!(info.extension, ".txt");
        assert_eq!(info.language, None);

        let info = FileInfo::new("/ws/Makefile", 1000, 42, "");
        assert_eq!(info.extension, "");
    }

    #[test]
    fn test_matches_content() {
        let content = "const x = 1;";
        let info = FileInfo::new("/ws/a.ts", 0, 12, calculate_checksum(content));

        assert!(info.matches_content(content));
        assert!(!info.matches_content("const x = 2;"));

        let empty = FileInfo::new("/ws/a.ts", 0, 12, "");
        assert!(!empty.matches_content(content));
    }
}
