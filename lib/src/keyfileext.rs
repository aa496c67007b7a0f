//! Helper methods for [`glib::KeyFile`], used by the override store and by
//! the launcher rewriter's `.desktop`/`.service` handling.

use glib::GString;
use ostree::glib;

/// Helper methods for [`glib::KeyFile`].
pub trait KeyFileExt {
    /// Get a string value, but return `None` if the key does not exist.
    fn optional_string(&self, group: &str, key: &str) -> Result<Option<GString>, glib::Error>;
    /// Get a boolean value, but return `None` if the key does not exist.
    fn optional_bool(&self, group: &str, key: &str) -> Result<Option<bool>, glib::Error>;
    /// Get the string list under a key, or `None` if the key does not exist.
    fn optional_string_list(
        &self,
        group: &str,
        key: &str,
    ) -> Result<Option<Vec<GString>>, glib::Error>;
}

/// Consume a keyfile error, mapping the case where group or key is not found to `Ok(None)`.
pub fn map_keyfile_optional<T>(res: Result<T, glib::Error>) -> Result<Option<T>, glib::Error> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) => match e.kind::<glib::KeyFileError>() {
            Some(glib::KeyFileError::GroupNotFound | glib::KeyFileError::KeyNotFound) => Ok(None),
            _ => Err(e),
        },
    }
}

impl KeyFileExt for glib::KeyFile {
    fn optional_string(&self, group: &str, key: &str) -> Result<Option<GString>, glib::Error> {
        map_keyfile_optional(self.string(group, key))
    }

    fn optional_bool(&self, group: &str, key: &str) -> Result<Option<bool>, glib::Error> {
        map_keyfile_optional(self.boolean(group, key))
    }

    fn optional_string_list(
        &self,
        group: &str,
        key: &str,
    ) -> Result<Option<Vec<GString>>, glib::Error> {
        map_keyfile_optional(self.string_list(group, key)).map(|v| v.map(|l| l.into_iter().collect()))
    }
}

/// Copy every key of `group` from `src` into `dest`, overwriting any key
/// already present in `dest`. Used by override merging: the baseline
/// key-file is cloned, then each override scope is layered on top key by
/// key so a single overridden key never drops its group's other keys.
pub fn merge_group(dest: &glib::KeyFile, src: &glib::KeyFile, group: &str) -> Result<(), glib::Error> {
    let keys = match map_keyfile_optional(src.keys(group))? {
        Some(keys) => keys,
        None => return Ok(()),
    };
    for key in keys {
        let value = src.value(group, &key)?;
        dest.set_value(group, &key, &value);
    }
    Ok(())
}
