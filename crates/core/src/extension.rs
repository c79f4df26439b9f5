//! Extension normalizer.
//!
//! Pure path arithmetic: the host application picks its file parser from the
//! suffix, so every staged file must end in the target extension. Git hands
//! us temp files such as `.merge_file_Xa81bc` that carry none.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::models::TargetExtension;

/// The suffix of `path` including the leading dot, or an empty string.
///
/// Dot-files (`.merge_file_abc`) have no suffix.
pub fn suffix(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Whether `path` already ends in `target`.
pub fn has_extension(path: &Path, target: &TargetExtension) -> bool {
    suffix(path) == target.as_str()
}

/// The path the host application should open for `path`.
///
/// Returns `path` unchanged when its suffix already matches, otherwise
/// `path` with `target` appended (`/tmp/x` → `/tmp/x.docx`).
pub fn effective_path(path: &Path, target: &TargetExtension) -> PathBuf {
    if has_extension(path, target) {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(target.as_str());
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx() -> TargetExtension {
        TargetExtension::new(".docx")
    }

    #[test]
    fn test_suffix() {
        assert_eq!(suffix(Path::new("a/report.docx")), ".docx");
        assert_eq!(suffix(Path::new("a/archive.tar.gz")), ".gz");
        assert_eq!(suffix(Path::new("a/Makefile")), "");
        assert_eq!(suffix(Path::new(".merge_file_Xa81bc")), "");
    }

    #[test]
    fn test_matching_extension_is_unchanged() {
        let path = Path::new("/tmp/old.docx");
        assert!(has_extension(path, &docx()));
        assert_eq!(effective_path(path, &docx()), PathBuf::from("/tmp/old.docx"));
    }

    #[test]
    fn test_mismatching_extension_is_appended() {
        assert_eq!(
            effective_path(Path::new("/tmp/.merge_file_Xa81bc"), &docx()),
            PathBuf::from("/tmp/.merge_file_Xa81bc.docx")
        );
        assert_eq!(
            effective_path(Path::new("/tmp/old.doc"), &docx()),
            PathBuf::from("/tmp/old.doc.docx")
        );
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        assert!(!has_extension(Path::new("/tmp/OLD.DOCX"), &docx()));
    }

    #[test]
    fn test_empty_target_matches_suffixless_paths() {
        let none = TargetExtension::new("");
        let path = Path::new("/tmp/.merge_file_Xa81bc");
        assert_eq!(effective_path(path, &none), path.to_path_buf());
    }
}
