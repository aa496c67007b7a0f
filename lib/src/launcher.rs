//! Rewrites `.desktop` and D-Bus `.service` files inside a deployment's
//! `export/` tree so their `Exec=` line invokes the sandbox launcher instead
//! of the original command.

use std::collections::HashSet;
use std::path::Path;

use fn_error_context::context;
use ostree::glib;
use tracing::warn;

use crate::path::PathQuotedDisplay;

/// Compile-time path to the sandbox launcher binary.
const LAUNCHER_PATH: &str = "/usr/bin/xdg-app";

fn quote(s: &str) -> String {
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '%' | '.' | '=' | ':' | '/' | '@'))
    {
        s.to_string()
    } else {
        format!("{}", PathQuotedDisplay::new(&std::path::PathBuf::from(s)))
    }
}

fn has_name_prefix(filename: &str, app: &str) -> bool {
    filename.starts_with(app)
}

/// Rewrite the `Exec=` key of every group in a `.desktop`/`.service`
/// key-file. For `.service` files, `service_name` carries the file's
/// basename without suffix, which must match the file's own `Name=` key
/// under `[D-BUS Service]`.
#[context("Rewriting launcher exec")]
fn rewrite_keyfile_exec(
    data: &str,
    app: &str,
    branch: &str,
    arch: &str,
    is_service: bool,
    service_name: &str,
) -> anyhow::Result<String> {
    let kf = glib::KeyFile::new();
    kf.load_from_data(data, glib::KeyFileFlags::KEEP_TRANSLATIONS)?;

    if is_service {
        let dbus_name = kf.string("D-BUS Service", "Name").ok();
        if dbus_name.as_deref() != Some(service_name) {
            anyhow::bail!("dbus service file has wrong name (expected {service_name})");
        }
    }

    let escaped_app = quote(app);
    let escaped_branch = quote(branch);
    let escaped_arch = quote(arch);

    for group in kf.groups() {
        let _ = kf.remove_key(&group, "TryExec");
        let _ = kf.remove_key(&group, "X-GNOME-Bugzilla-ExtraInfoScript");

        let mut new_exec = format!(
            "{LAUNCHER_PATH} run --branch={escaped_branch} --arch={escaped_arch}"
        );

        let old_exec = kf.string(&group, "Exec").ok();
        let mut appended_app = false;
        if let Some(old_exec) = old_exec {
            if let Some(tokens) = shlex::split(&old_exec) {
                if let Some((cmd0, rest)) = tokens.split_first() {
                    new_exec.push_str(&format!(" --command={}", quote(cmd0)));
                    new_exec.push(' ');
                    new_exec.push_str(&escaped_app);
                    appended_app = true;
                    for arg in rest {
                        new_exec.push(' ');
                        new_exec.push_str(&quote(arg));
                    }
                }
            }
        }
        if !appended_app {
            new_exec.push(' ');
            new_exec.push_str(&escaped_app);
        }

        kf.set_string(&group, "Exec", &new_exec);
    }

    Ok(kf.to_data().to_string())
}

/// Recursively walk `export_dir`, removing non-namespaced or unsupported
/// files, and rewriting every `.desktop`/`.service` file in place.
#[context("Rewriting export directory {export_dir:?}")]
pub fn rewrite_export_dir(
    app: &str,
    branch: &str,
    arch: &str,
    export_dir: &Path,
) -> anyhow::Result<()> {
    rewrite_export_dir_inner(app, branch, arch, export_dir)
}

fn rewrite_export_dir_inner(app: &str, branch: &str, arch: &str, dir: &Path) -> anyhow::Result<()> {
    let mut visited: HashSet<std::ffi::OsString> = HashSet::new();

    let entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    for entry in entries {
        let name = entry.file_name();
        if !visited.insert(name.clone()) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let path = entry.path();
        let name_str = name.to_string_lossy().into_owned();

        if meta.is_dir() {
            rewrite_export_dir_inner(app, branch, arch, &path)?;
        } else if meta.is_file() {
            if !has_name_prefix(&name_str, app) {
                warn!("non-prefixed filename {name_str} in app {app}, removing");
                remove_ignore_enoent(&path)?;
                continue;
            }

            if name_str.ends_with(".desktop") || name_str.ends_with(".service") {
                let is_service = name_str.ends_with(".service");
                let service_name = name_str.strip_suffix(".service").unwrap_or(&name_str);
                let data = std::fs::read_to_string(&path)?;
                let rewritten =
                    rewrite_keyfile_exec(&data, app, branch, arch, is_service, service_name)?;

                let tmp_path = path.with_extension("rewrite.tmp");
                std::fs::write(&tmp_path, rewritten)?;
                std::fs::rename(&tmp_path, &path)?;
                visited.insert(name);
            }
        } else {
            warn!("not exporting file {name_str} of unsupported type");
            remove_ignore_enoent(&path)?;
        }
    }

    Ok(())
}

fn remove_ignore_enoent(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
