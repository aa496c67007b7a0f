//! GVariant schema definitions for the two object types the metadata-only
//! fetch path parses directly, bypassing the repository abstraction.

/// Schema for a commit object: `(metadata, parent-checksum, related, subject,
/// body, timestamp, root-dirtree-checksum, root-dirmeta-checksum)`.
macro_rules! gv_commit {
    () => {
        gvariant::gv!("(a{sv}aya(say)sstayay)")
    };
}

/// Schema for a dirtree object: `(files, dirs)` where each file entry is
/// `(name, checksum)` and each dir entry is `(name, tree-checksum, meta-checksum)`.
macro_rules! gv_dirtree {
    () => {
        gvariant::gv!("(a(say)a(sayay))")
    };
}

pub(crate) use gv_commit;
pub(crate) use gv_dirtree;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_construct() {
        let _ = gv_commit!();
        let _ = gv_dirtree!();
    }
}
