//! The removed-staging area and the liveness-lock probe that decides when a
//! relocated checkout is safe to delete for real.

use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fn_error_context::context;
use tracing::warn;

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Probe whether any process holds an advisory write lock on
/// `<dir>/files/.ref`. The store never takes this lock itself; a running
/// sandboxed application holds it for the duration of its execution.
pub fn dir_is_locked(dir: &Path) -> bool {
    let reffile = dir.join("files/.ref");
    let file = match std::fs::OpenOptions::new().read(true).write(true).open(&reffile) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut lock = libc::flock {
        l_type: libc::F_WRLCK as libc::c_short,
        l_whence: libc::SEEK_SET as libc::c_short,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    };

    // SAFETY: `lock` is a valid, fully-initialized `flock` and `fd` stays
    // open for the duration of the call.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETLK, &mut lock) };
    rc == 0 && lock.l_type as i32 != libc::F_UNLCK
}

/// Move `checkoutdir` into `<base>/.removed/<tag>-<checksum>/`, returning the
/// new path. Creates the removed-staging directory if needed. The tag mixes
/// the pid with a per-process counter so repeated calls staging the same
/// checksum (e.g. redeploy-then-undeploy cycles within one process) never
/// collide on the destination name.
#[context("Staging {checksum} for removal")]
pub fn stage_for_removal(
    removed_dir: &Path,
    checkoutdir: &Path,
    checksum: &str,
) -> anyhow::Result<std::path::PathBuf> {
    std::fs::create_dir_all(removed_dir)?;
    let pid = std::process::id() as u64;
    let seq = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dest = removed_dir.join(format!("{pid:x}-{seq:x}-{checksum}"));
    std::fs::rename(checkoutdir, &dest)?;
    Ok(dest)
}

/// Delete `dir` recursively if it is unlocked, or unconditionally when
/// `force` is set. Failures are logged and swallowed, per the undeploy and
/// cleanup-removed contract: a single stuck entry never fails the caller.
pub fn remove_if_unlocked(dir: &Path, force: bool) {
    if force || !dir_is_locked(dir) {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            warn!("unable to remove old checkout {}: {e}", dir.display());
        }
    }
}

/// Scan `removed_dir` and delete every unlocked child. A missing
/// `removed_dir` is not an error.
pub fn cleanup_removed(removed_dir: &Path, cancel: &crate::cancel::Cancellable) -> anyhow::Result<()> {
    let entries = match std::fs::read_dir(removed_dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        cancel.check()?;
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        remove_if_unlocked(&entry.path(), false);
    }
    Ok(())
}
