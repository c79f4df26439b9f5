//! Permission normalizer.
//!
//! Git checks blobs out read-only on some platforms, and the host
//! application refuses to open a read-only file for editing.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Clear the read-only flag on `path` if the owner cannot write it.
///
/// Idempotent; a writable file is left untouched.
pub fn make_writable(path: &Path) -> std::io::Result<()> {
    let metadata = fs::metadata(path)?;
    let mut perms = metadata.permissions();
    debug!(path = %path.display(), mode = %describe(&perms), "file mode");

    if !is_read_only(&perms) {
        return Ok(());
    }

    debug!(path = %path.display(), "removing read-only flag");
    grant_owner_write(&mut perms);
    fs::set_permissions(path, perms)
}

#[cfg(unix)]
fn is_read_only(perms: &fs::Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;
    perms.mode() & 0o200 == 0
}

#[cfg(not(unix))]
fn is_read_only(perms: &fs::Permissions) -> bool {
    perms.readonly()
}

#[cfg(unix)]
fn grant_owner_write(perms: &mut fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn grant_owner_write(perms: &mut fs::Permissions) {
    perms.set_readonly(false);
}

#[cfg(unix)]
fn describe(perms: &fs::Permissions) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", perms.mode())
}

#[cfg(not(unix))]
fn describe(perms: &fs::Permissions) -> String {
    if perms.readonly() { "readonly" } else { "writable" }.to_string()
}
