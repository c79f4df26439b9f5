//! Git LFS utilities for staging.
//!
//! Provides:
//! - LFS pointer detection and parsing (used for diagnostics and tests)
//! - [`LfsFilter`], the seam over the `git lfs` CLI, and its real
//!   implementation [`GitLfsCli`]
//! - [`resolve`], which turns a Git-supplied path into real content at the
//!   path the host application will open
//! - [`clean_to`], which re-pointerizes a merge result

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::errors::LfsError;
use crate::extension;
use crate::models::TargetExtension;

// ---------------------------------------------------------------------------
// LFS pointer format
// ---------------------------------------------------------------------------

/// Magic prefix of every Git LFS pointer file.
const LFS_POINTER_PREFIX: &str = "version https://git-lfs.github.com/spec/v1\n";

/// Parsed content of a Git LFS pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsPointer {
    /// The SHA-256 OID of the blob in LFS storage.
    pub oid: String,
    /// Size in bytes of the actual file content.
    pub size: u64,
}

/// Check whether `content` is a Git LFS pointer file.
///
/// A pointer file is a small text file (typically under 200 bytes) starting
/// with `version https://git-lfs.github.com/spec/v1`.
pub fn is_lfs_pointer(content: &[u8]) -> bool {
    // LFS pointers are always small text files.
    if content.len() > 512 {
        return false;
    }
    match std::str::from_utf8(content) {
        Ok(text) => text.starts_with(LFS_POINTER_PREFIX),
        Err(_) => false,
    }
}

/// Parse a Git LFS pointer from bytes.
///
/// Returns `None` if the content is not a valid pointer.
pub fn parse_lfs_pointer(content: &[u8]) -> Option<LfsPointer> {
    if !is_lfs_pointer(content) {
        return None;
    }
    let text = std::str::from_utf8(content).ok()?;

    let mut oid = None;
    let mut size = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("oid sha256:") {
            oid = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("size ") {
            size = rest.trim().parse::<u64>().ok();
        }
    }

    Some(LfsPointer {
        oid: oid?,
        size: size?,
    })
}

// ---------------------------------------------------------------------------
// Filter seam
// ---------------------------------------------------------------------------

/// Answer of `git lfs pointer --check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerStatus {
    /// The file is a pointer stub (exit 0).
    Pointer,
    /// The file is already real content (exit 1).
    Content,
}

/// The three LFS operations staging and teardown need.
pub trait LfsFilter {
    /// Classify `path`. Fails with [`LfsError::FileNotFound`] when the
    /// checker reports the path missing and [`LfsError::UnknownStatus`] for
    /// any other unexpected status.
    fn check_pointer(&self, path: &Path) -> Result<PointerStatus, LfsError>;

    /// Expand the pointer at `pointer` into real content at `dest`.
    fn smudge(&self, pointer: &Path, dest: &Path) -> Result<(), LfsError>;

    /// Store the content at `content` and write its pointer to `dest`.
    fn clean(&self, content: &Path, dest: &Path) -> Result<(), LfsError>;
}

/// [`LfsFilter`] backed by the `git lfs` command line.
#[derive(Debug, Clone)]
pub struct GitLfsCli {
    /// Program followed by any leading arguments, e.g. `["git"]`.
    command: Vec<String>,
}

impl Default for GitLfsCli {
    fn default() -> Self {
        Self {
            command: vec!["git".to_string()],
        }
    }
}

impl GitLfsCli {
    /// Use `command` (program + leading args) in place of `git`.
    pub fn new(command: Vec<String>) -> Self {
        if command.is_empty() {
            return Self::default();
        }
        Self { command }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> LfsError {
        if e.kind() == std::io::ErrorKind::NotFound {
            LfsError::BinaryNotFound(self.command[0].clone())
        } else {
            LfsError::IoError(e)
        }
    }

    /// Pipe `input` through `git lfs <filter>` into `output`.
    fn run_filter(&self, filter: &'static str, input: &Path, output: &Path) -> Result<(), LfsError> {
        let stdin = File::open(input)?;
        let stdout = File::create(output)?;

        debug!(filter, input = %input.display(), output = %output.display(), "running git lfs filter");
        let result = self
            .base_command()
            .args(["lfs", filter])
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !result.status.success() {
            if let Err(e) = std::fs::remove_file(output) {
                debug!(path = %output.display(), error = %e, "could not remove partial filter output");
            }
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let exit_code = result.status.code().unwrap_or(-1);
            warn!(filter, exit_code, %stderr, "git lfs filter failed");
            return Err(LfsError::FilterFailed {
                filter,
                exit_code,
                stderr,
            });
        }
        Ok(())
    }
}

impl LfsFilter for GitLfsCli {
    fn check_pointer(&self, path: &Path) -> Result<PointerStatus, LfsError> {
        let output = self
            .base_command()
            .args(["lfs", "pointer", "--check", "--file"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        let code = output.status.code().unwrap_or(-1);
        debug!(path = %path.display(), code, "git lfs pointer --check");
        match code {
            0 => Ok(PointerStatus::Pointer),
            1 => Ok(PointerStatus::Content),
            2 => Err(LfsError::FileNotFound(path.to_path_buf())),
            code => Err(LfsError::UnknownStatus {
                path: path.to_path_buf(),
                code,
            }),
        }
    }

    fn smudge(&self, pointer: &Path, dest: &Path) -> Result<(), LfsError> {
        self.run_filter("smudge", pointer, dest)
    }

    fn clean(&self, content: &Path, dest: &Path) -> Result<(), LfsError> {
        self.run_filter("clean", content, dest)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What [`resolve`] found out about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub is_lfs: bool,
    /// Where the real content now lives, with the target extension.
    pub effective_path: PathBuf,
}

/// Make sure real content with the target extension exists for `path`.
///
/// | pointer? | has extension | action |
/// |----------|---------------|--------|
/// | yes | yes | smudge in place (via a sibling temp file) |
/// | yes | no  | smudge into `path + ext` |
/// | no  | yes | nothing |
/// | no  | no  | copy to `path + ext` |
pub fn resolve(
    filter: &dyn LfsFilter,
    path: &Path,
    target: &TargetExtension,
) -> Result<Resolution, LfsError> {
    let effective_path = extension::effective_path(path, target);
    let has_extension = effective_path == path;

    debug!(path = %path.display(), "checking if file is a Git LFS pointer");
    let status = filter.check_pointer(path)?;

    match status {
        PointerStatus::Pointer => {
            log_pointer(path);
            info!(path = %path.display(), "converting LFS pointer to blob");
            if has_extension {
                replace_via_temp(path, |tmp| filter.smudge(path, tmp))?;
            } else {
                filter.smudge(path, &effective_path)?;
            }
        }
        PointerStatus::Content => {
            debug!(path = %path.display(), "not an LFS pointer");
            if !has_extension {
                std::fs::copy(path, &effective_path)?;
            }
        }
    }

    Ok(Resolution {
        is_lfs: status == PointerStatus::Pointer,
        effective_path,
    })
}

/// Re-pointerize the content at `content` and write the pointer to `dest`.
///
/// `content` and `dest` may be the same file.
pub fn clean_to(filter: &dyn LfsFilter, content: &Path, dest: &Path) -> Result<(), LfsError> {
    info!(content = %content.display(), dest = %dest.display(), "converting LFS blob to pointer");
    replace_via_temp(dest, |tmp| filter.clean(content, tmp))
}

/// Produce a new version of `dest` in a sibling temp file, then rename it
/// over `dest`.
fn replace_via_temp<F>(dest: &Path, produce: F) -> Result<(), LfsError>
where
    F: FnOnce(&Path) -> Result<(), LfsError>,
{
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".dmfo-lfs-")
        .tempfile_in(dir)?;
    produce(tmp.path())?;
    tmp.persist(dest).map_err(|e| LfsError::IoError(e.error))?;
    Ok(())
}

fn log_pointer(path: &Path) {
    match std::fs::read(path) {
        Ok(bytes) => match parse_lfs_pointer(&bytes) {
            Some(pointer) => debug!(oid = %pointer.oid, size = pointer.size, "LFS pointer"),
            None => debug!("LFS pointer could not be parsed locally"),
        },
        Err(e) => debug!(error = %e, "could not read LFS pointer"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
