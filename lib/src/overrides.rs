//! The override store: per-app key-file documents layered system-then-user
//! when a deployment is loaded.

use camino::{Utf8Path, Utf8PathBuf};
use fn_error_context::context;
use ostree::glib;

use crate::keyfileext::merge_group;

/// Load the key-file at `path`, returning an empty key-file rather than an
/// error when the file does not exist.
#[context("Loading override keyfile {path}")]
pub fn load_override_keyfile(path: &Utf8Path) -> anyhow::Result<glib::KeyFile> {
    let kf = glib::KeyFile::new();
    match kf.load_from_file(path.as_str(), glib::KeyFileFlags::NONE) {
        Ok(()) => Ok(kf),
        Err(e) if e.kind::<glib::FileError>() == Some(glib::FileError::Noent) => {
            Ok(glib::KeyFile::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Persist `kf` to `path`, creating parent directories as needed.
#[context("Saving override keyfile {path}")]
pub fn save_override_keyfile(kf: &glib::KeyFile, path: &Utf8Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = kf.to_data();
    std::fs::write(path, data.as_bytes())?;
    Ok(())
}

/// Merge the system-scope override for `app_id` (if any) with the
/// user-scope override (if any), user taking precedence key-by-key.
///
/// Per the open question on override precedence (see the design notes):
/// the system override is the baseline and the user override is layered
/// on top group-by-group and key-by-key, so overriding a single key never
/// discards the rest of that group.
pub fn load_merged_override(
    system_base: Option<&Utf8Path>,
    user_base: &Utf8Path,
    app_id: &str,
) -> anyhow::Result<glib::KeyFile> {
    let merged = glib::KeyFile::new();

    if let Some(system_base) = system_base {
        let system_path = system_base.join(app_id);
        if system_path.exists() {
            let system_kf = load_override_keyfile(&system_path)?;
            for group in system_kf.groups() {
                merge_group(&merged, &system_kf, &group)?;
            }
        }
    }

    let user_path = user_base.join(app_id);
    if user_path.exists() {
        let user_kf = load_override_keyfile(&user_path)?;
        for group in user_kf.groups() {
            merge_group(&merged, &user_kf, &group)?;
        }
    }

    Ok(merged)
}

/// The path an override document for `app_id` lives at under `base`.
pub fn override_path(base: &Utf8Path, app_id: &str) -> Utf8PathBuf {
    base.join("overrides").join(app_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_override_loads_empty() {
        let td = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(td.path().join("no-such-app")).unwrap();
        let kf = load_override_keyfile(&path).unwrap();
        assert!(kf.groups().is_empty());
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let td = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(td.path().join("org.example.Foo")).unwrap();
        let kf = glib::KeyFile::new();
        kf.set_string("Context", "shared", "value");
        save_override_keyfile(&kf, &path).unwrap();

        let reloaded = load_override_keyfile(&path).unwrap();
        assert_eq!(reloaded.string("Context", "shared").unwrap(), "value");
    }

    #[test]
    fn test_merge_prefers_user_scope() {
        let td = tempfile::tempdir().unwrap();
        let system_dir = Utf8PathBuf::from_path_buf(td.path().join("system")).unwrap();
        let user_dir = Utf8PathBuf::from_path_buf(td.path().join("user")).unwrap();
        std::fs::create_dir_all(&system_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        let system_kf = glib::KeyFile::new();
        system_kf.set_string("Context", "shared", "system-value");
        system_kf.set_string("Context", "only-system", "keepme");
        save_override_keyfile(&system_kf, &system_dir.join("org.example.Foo")).unwrap();

        let user_kf = glib::KeyFile::new();
        user_kf.set_string("Context", "shared", "user-value");
        save_override_keyfile(&user_kf, &user_dir.join("org.example.Foo")).unwrap();

        let merged =
            load_merged_override(Some(&system_dir), &user_dir, "org.example.Foo").unwrap();
        assert_eq!(merged.string("Context", "shared").unwrap(), "user-value");
        assert_eq!(merged.string("Context", "only-system").unwrap(), "keepme");
    }
}
