//! The object-store abstraction. Repository internals (content addressing,
//! loose-object layout, gvariant-encoded commits) stay opaque behind this
//! trait; the rest of the crate only ever calls these operations.

use std::collections::BTreeMap;
use std::path::Path;

use fn_error_context::context;

/// Operations the deployment store needs from a content-addressed object
/// repository. A concrete implementation (`OstreeRepo`) backs this with the
/// real `ostree::Repo` GObject bindings; tests use an in-process fake.
pub trait ObjectRepo: std::fmt::Debug + Send + Sync {
    /// Create the repository on disk if it does not already exist.
    fn ensure(&self) -> anyhow::Result<()>;

    /// Resolve a rev spec (a ref, or `<remote>:<ref>`, or a raw checksum) to
    /// a checksum. Returns `Ok(None)` rather than erroring when
    /// `allow_missing` is set and nothing resolves.
    fn resolve_rev(&self, spec: &str, allow_missing: bool) -> anyhow::Result<Option<String>>;

    /// True if the given commit checksum is present locally.
    fn has_commit(&self, checksum: &str) -> anyhow::Result<bool>;

    /// Pull refs or commits from a configured remote.
    fn pull(&self, remote: &str, refs: &[&str]) -> anyhow::Result<()>;

    /// Check out a commit's content into `dest`. `user_mode` selects the
    /// bare-user checkout mode used by user-scope stores.
    fn checkout_tree(&self, checksum: &str, dest: &Path, user_mode: bool) -> anyhow::Result<()>;

    /// List configured remote names.
    fn remote_list(&self) -> anyhow::Result<Vec<String>>;

    /// The URL configured for a remote.
    fn remote_get_url(&self, remote: &str) -> anyhow::Result<String>;

    /// The refs a remote advertises, fetched from its summary file.
    fn remote_list_refs(&self, remote: &str) -> anyhow::Result<BTreeMap<String, String>>;

    /// Raw bytes of a remote's summary file.
    fn remote_fetch_summary(&self, remote: &str) -> anyhow::Result<Vec<u8>>;

    /// Prune unreachable objects. Returns `(objects_pruned, bytes_freed)`.
    fn prune(&self) -> anyhow::Result<(i32, u64)>;

    /// The repository's own configuration, including remote sections.
    fn get_config(&self) -> anyhow::Result<ostree::glib::KeyFile>;
}

/// The real backend, wrapping the published `ostree` GObject bindings.
pub struct OstreeRepo {
    inner: ostree::Repo,
}

impl std::fmt::Debug for OstreeRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OstreeRepo").finish_non_exhaustive()
    }
}

impl OstreeRepo {
    /// Open (without creating) the repository at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = gio::File::for_path(path);
        let inner = ostree::Repo::new(&file);
        Ok(Self { inner })
    }

    /// Create a new repository at `path` in the given mode, then open it.
    #[context("Creating repository at {path:?}")]
    pub fn create(path: &Path, mode: ostree::RepoMode) -> anyhow::Result<Self> {
        let file = gio::File::for_path(path);
        let inner = ostree::Repo::new(&file);
        inner.create(mode, gio::Cancellable::NONE)?;
        Ok(Self { inner })
    }

    /// Access the underlying bindings object for operations not wrapped here.
    pub fn as_inner(&self) -> &ostree::Repo {
        &self.inner
    }
}

impl ObjectRepo for OstreeRepo {
    fn ensure(&self) -> anyhow::Result<()> {
        self.inner.open(gio::Cancellable::NONE)?;
        Ok(())
    }

    fn resolve_rev(&self, spec: &str, allow_missing: bool) -> anyhow::Result<Option<String>> {
        Ok(self
            .inner
            .resolve_rev(spec, allow_missing)?
            .map(|s| s.to_string()))
    }

    fn has_commit(&self, checksum: &str) -> anyhow::Result<bool> {
        let (commit, _) = self.inner.load_variant_if_exists(
            ostree::ObjectType::Commit,
            checksum,
        )?;
        Ok(commit.is_some())
    }

    fn pull(&self, remote: &str, refs: &[&str]) -> anyhow::Result<()> {
        let refs: Vec<&str> = refs.to_vec();
        self.inner
            .pull(remote, &refs, ostree::RepoPullFlags::NONE, gio::Cancellable::NONE)?;
        Ok(())
    }

    #[context("Checking out {checksum} to {dest:?}")]
    fn checkout_tree(&self, checksum: &str, dest: &Path, user_mode: bool) -> anyhow::Result<()> {
        let opts = ostree::RepoCheckoutAtOptions {
            mode: if user_mode {
                ostree::RepoCheckoutMode::User
            } else {
                ostree::RepoCheckoutMode::None
            },
            overwrite_mode: ostree::RepoCheckoutOverwriteMode::None,
            ..Default::default()
        };
        let dest = dest
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non-utf8 checkout destination"))?;
        self.inner.checkout_at(
            Some(&opts),
            ostree::AT_FDCWD,
            dest,
            checksum,
            gio::Cancellable::NONE,
        )?;
        Ok(())
    }

    fn remote_list(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .inner
            .remote_list()
            .into_iter()
            .map(|s| s.to_string())
            .collect())
    }

    fn remote_get_url(&self, remote: &str) -> anyhow::Result<String> {
        Ok(self.inner.remote_get_url(remote)?.to_string())
    }

    fn remote_list_refs(&self, remote: &str) -> anyhow::Result<BTreeMap<String, String>> {
        let refs = self
            .inner
            .remote_list_refs(remote, gio::Cancellable::NONE)?;
        Ok(refs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    fn remote_fetch_summary(&self, remote: &str) -> anyhow::Result<Vec<u8>> {
        let (bytes, _sig) = self
            .inner
            .remote_fetch_summary(remote, gio::Cancellable::NONE)?;
        Ok(bytes.map(|b| b.to_vec()).unwrap_or_default())
    }

    fn prune(&self) -> anyhow::Result<(i32, u64)> {
        let (_total, pruned, freed) = self.inner.prune(
            ostree::RepoPruneFlags::REFS_ONLY,
            0,
            gio::Cancellable::NONE,
        )?;
        Ok((pruned, freed as u64))
    }

    fn get_config(&self) -> anyhow::Result<ostree::glib::KeyFile> {
        Ok(self.inner.config())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-process fake satisfying [`super::ObjectRepo`], used to test the
    //! deployment layer without a live libostree backend.

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct FakeRepo {
        pub refs: Mutex<BTreeMap<String, String>>,
        pub commits: Mutex<std::collections::BTreeSet<String>>,
        pub pulls: Mutex<Vec<(String, String)>>,
        pub config: Mutex<Option<String>>,
    }

    impl FakeRepo {
        pub fn with_ref(self, name: &str, checksum: &str) -> Self {
            self.refs
                .lock()
                .unwrap()
                .insert(name.to_string(), checksum.to_string());
            self.commits.lock().unwrap().insert(checksum.to_string());
            self
        }

        /// Seed the fake repo's `get_config()` result from raw key-file data.
        pub fn with_config(self, data: &str) -> Self {
            *self.config.lock().unwrap() = Some(data.to_string());
            self
        }
    }

    impl ObjectRepo for FakeRepo {
        fn ensure(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn resolve_rev(&self, spec: &str, allow_missing: bool) -> anyhow::Result<Option<String>> {
            let spec = spec.rsplit(':').next().unwrap_or(spec);
            match self.refs.lock().unwrap().get(spec).cloned() {
                Some(c) => Ok(Some(c)),
                None if allow_missing => Ok(None),
                None => anyhow::bail!("no such ref: {spec}"),
            }
        }

        fn has_commit(&self, checksum: &str) -> anyhow::Result<bool> {
            Ok(self.commits.lock().unwrap().contains(checksum))
        }

        fn pull(&self, remote: &str, refs: &[&str]) -> anyhow::Result<()> {
            let mut pulls = self.pulls.lock().unwrap();
            for r in refs {
                pulls.push((remote.to_string(), r.to_string()));
            }
            Ok(())
        }

        fn checkout_tree(&self, _checksum: &str, dest: &Path, _user_mode: bool) -> anyhow::Result<()> {
            std::fs::create_dir_all(dest)?;
            Ok(())
        }

        fn remote_list(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }

        fn remote_get_url(&self, _remote: &str) -> anyhow::Result<String> {
            anyhow::bail!("no remotes configured")
        }

        fn remote_list_refs(&self, _remote: &str) -> anyhow::Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }

        fn remote_fetch_summary(&self, _remote: &str) -> anyhow::Result<Vec<u8>> {
            Ok(vec![])
        }

        fn prune(&self) -> anyhow::Result<(i32, u64)> {
            Ok((0, 0))
        }

        fn get_config(&self) -> anyhow::Result<ostree::glib::KeyFile> {
            let kf = ostree::glib::KeyFile::new();
            if let Some(data) = self.config.lock().unwrap().as_deref() {
                kf.load_from_data(data, ostree::glib::KeyFileFlags::NONE)?;
            }
            Ok(kf)
        }
    }
}
