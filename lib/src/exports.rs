//! Mirrors each app's `export/` subtree into the shared `<base>/exports/`
//! directory using relative symlinks, and runs the triggers afterward.

use std::path::{Path, PathBuf};

use fn_error_context::context;

use crate::triggers::run_triggers;

/// Recursively mirror `source` into `destination`, creating directories and
/// replacing regular files with relative symlinks rooted at
/// `symlink_prefix`. Existing conflicting entries at the destination are
/// replaced.
#[context("Exporting {source:?} to {destination:?}")]
fn export_dir(source: &Path, symlink_prefix: &str, destination: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(destination)?;

    let entries: Vec<_> = match std::fs::read_dir(source) {
        Ok(e) => e.collect::<Result<_, _>>()?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let name = entry.file_name();
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            let child_prefix = format!("../{symlink_prefix}/{}", name.to_string_lossy());
            export_dir(
                &entry.path(),
                &child_prefix,
                &destination.join(&name),
            )?;
        } else if meta.is_file() {
            let target = PathBuf::from(symlink_prefix).join(&name);
            let dest_path = destination.join(&name);
            match std::fs::remove_file(&dest_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            std::os::unix::fs::symlink(&target, &dest_path)?;
        }
    }

    Ok(())
}

/// Remove every symlink under `root` whose target no longer resolves.
fn remove_dangling_symlinks(root: &Path) -> anyhow::Result<()> {
    let entries: Vec<_> = match std::fs::read_dir(root) {
        Ok(e) => e.collect::<Result<_, _>>()?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            remove_dangling_symlinks(&path)?;
        } else if file_type.is_symlink() && std::fs::metadata(&path).is_err() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Rebuild `<base>/exports/` for `changed_app` (when given), prune dangling
/// symlinks, then run the trigger executables. `active_export_dir` is the
/// `export/` directory of the app's currently-active deployment, if any.
pub fn update_exports(
    exports_base: &Path,
    changed_app: Option<&str>,
    active_export_dir: Option<&Path>,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(exports_base)?;

    if let (Some(app), Some(export_dir)) = (changed_app, active_export_dir) {
        if export_dir.exists() {
            let symlink_prefix = format!("../app/{app}/current/active/export");
            export_dir_into(export_dir, &symlink_prefix, exports_base)?;
        }
    }

    remove_dangling_symlinks(exports_base)?;
    run_triggers(exports_base.parent().unwrap_or(exports_base));
    Ok(())
}

fn export_dir_into(source: &Path, symlink_prefix: &str, destination: &Path) -> anyhow::Result<()> {
    export_dir(source, symlink_prefix, destination)
}
