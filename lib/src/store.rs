//! The scope-rooted deployment store: the public entry point tying together
//! the repo layer, the on-disk deployment hierarchy, the override store,
//! export aggregation, and remote fetches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fn_error_context::context;
use ostree::glib;
use tracing::debug;

use crate::cancel::Cancellable;
use crate::error::{Result, StoreError};
use crate::keyfileext::KeyFileExt;
use crate::overrides;
use crate::refs::{Kind, Ref};
use crate::removed;
use crate::repo::ObjectRepo;
use crate::{exports, launcher};

/// Whether a store operates on the system-wide or the per-user hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Shared system-wide installation, `bare` repo mode.
    System,
    /// Per-user installation, `bare-user` repo mode.
    User,
}

impl Scope {
    fn is_user(self) -> bool {
        matches!(self, Scope::User)
    }
}

/// A loaded deployment: its metadata key-file plus (for apps) merged
/// overrides.
pub struct Deployment {
    /// Absolute path of the checkout.
    pub path: PathBuf,
    /// Parsed `metadata` key-file.
    pub metadata: glib::KeyFile,
    /// Merged overrides, present only for `app`-kind refs.
    pub overrides: Option<glib::KeyFile>,
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("path", &self.path)
            .field("has_overrides", &self.overrides.is_some())
            .finish_non_exhaustive()
    }
}

/// A scope-rooted application deployment store.
pub struct Store {
    base: PathBuf,
    scope: Scope,
    repo: once_cell_repo::OnceRepo,
}

/// A tiny lazily-initialized slot, avoiding a hard dependency on `once_cell`
/// for a single field; the repo handle is opened at most once per `Store`.
mod once_cell_repo {
    use super::*;
    use std::sync::OnceLock;

    #[derive(Default)]
    pub struct OnceRepo(OnceLock<Arc<dyn ObjectRepo>>);

    impl OnceRepo {
        pub fn get(&self) -> Option<&Arc<dyn ObjectRepo>> {
            self.0.get()
        }

        pub fn set(&self, repo: Arc<dyn ObjectRepo>) {
            let _ = self.0.set(repo);
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("base", &self.base)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Store {
    /// Construct a store rooted at `base` for the given scope. Does not
    /// touch the filesystem; call [`Store::ensure_path`]/[`Store::ensure_repo`]
    /// before any operation that needs the hierarchy to exist.
    pub fn new(base: impl Into<PathBuf>, scope: Scope) -> Self {
        Store {
            base: base.into(),
            scope,
            repo: Default::default(),
        }
    }

    /// Construct a store backed by an already-open [`ObjectRepo`], primarily
    /// for tests.
    pub fn with_repo(base: impl Into<PathBuf>, scope: Scope, repo: Arc<dyn ObjectRepo>) -> Self {
        let store = Self::new(base, scope);
        store.repo.set(repo);
        store
    }

    /// The scope this store operates in.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The base directory of this store.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn kind_dir(&self, kind: Kind) -> PathBuf {
        self.base.join(kind.as_str())
    }

    /// The directory a ref's checkouts live under.
    pub fn deploy_base_dir(&self, r: &Ref) -> PathBuf {
        self.base
            .join(r.kind().as_str())
            .join(r.name())
            .join(r.arch())
            .join(r.branch())
    }

    fn exports_dir(&self) -> PathBuf {
        self.base.join("exports")
    }

    fn removed_dir(&self) -> PathBuf {
        self.base.join(".removed")
    }

    fn overrides_dir(&self) -> PathBuf {
        self.base.join("overrides")
    }

    fn repo_dir(&self) -> PathBuf {
        self.base.join("repo")
    }

    /// Create `base` if it doesn't already exist.
    #[context("Ensuring store path {:?}", self.base)]
    pub fn ensure_path(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base)?;
        Ok(())
    }

    /// Open (creating on first use) the object store at `<base>/repo`.
    /// Idempotent: the same handle is reused for the store's lifetime.
    #[context("Ensuring repository")]
    pub fn ensure_repo(&self) -> Result<Arc<dyn ObjectRepo>> {
        if let Some(repo) = self.repo.get() {
            return Ok(repo.clone());
        }
        self.ensure_path()?;

        let repo_path = self.repo_dir();
        let repo: Arc<dyn ObjectRepo> = if repo_path.exists() {
            Arc::new(
                crate::repo::OstreeRepo::open(&repo_path)
                    .map_err(StoreError::backend)?,
            )
        } else {
            let mode = if self.scope.is_user() {
                ostree::RepoMode::BareUser
            } else {
                ostree::RepoMode::Bare
            };
            match crate::repo::OstreeRepo::create(&repo_path, mode) {
                Ok(repo) => Arc::new(repo),
                Err(e) => {
                    let _ = std::fs::remove_dir_all(&repo_path);
                    return Err(StoreError::backend(e));
                }
            }
        };
        repo.ensure().map_err(StoreError::backend)?;
        self.repo.set(repo.clone());
        Ok(repo)
    }

    /// List refs of `kind` for a single app/runtime name, sorted.
    pub fn list_refs_for_name(&self, kind: Kind, name: &str, cancel: &Cancellable) -> Result<Vec<Ref>> {
        cancel.check()?;
        let dir = self.kind_dir(kind).join(name);
        let mut out = Vec::new();
        let arch_entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for arch_entry in arch_entries {
            cancel.check()?;
            let arch_entry = arch_entry?;
            if !arch_entry.file_type()?.is_dir() {
                continue;
            }
            let arch = arch_entry.file_name().to_string_lossy().into_owned();
            if arch == "data" {
                continue;
            }
            for branch_entry in std::fs::read_dir(arch_entry.path())? {
                let branch_entry = branch_entry?;
                if !branch_entry.file_type()?.is_dir() {
                    continue;
                }
                let branch = branch_entry.file_name().to_string_lossy().into_owned();
                if let Ok(r) = Ref::new(kind, name, arch.clone(), branch) {
                    out.push(r);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// List every ref of `kind`, sorted.
    pub fn list_refs(&self, kind: Kind, cancel: &Cancellable) -> Result<Vec<Ref>> {
        cancel.check()?;
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(self.kind_dir(kind)) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            cancel.check()?;
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            out.extend(self.list_refs_for_name(kind, &name, cancel)?);
        }
        out.sort();
        Ok(out)
    }

    /// List the checksums deployed under `r`, sorted.
    pub fn list_deployed(&self, r: &Ref, cancel: &Cancellable) -> Result<Vec<String>> {
        cancel.check()?;
        let dir = self.deploy_base_dir(r);
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "active" {
                continue;
            }
            if name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit()) {
                out.push(name);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Read `<deploy-base>/active`'s symlink target, if present.
    pub fn read_active(&self, r: &Ref) -> Option<String> {
        let link = self.deploy_base_dir(r).join("active");
        std::fs::read_link(link)
            .ok()
            .map(|p| p.to_string_lossy().into_owned())
    }

    /// Look up the checkout directory for `r` at `checksum`, or at `active`
    /// when `checksum` is `None`. Returns `None` rather than an error when
    /// nothing is deployed there.
    pub fn get_if_deployed(&self, r: &Ref, checksum: Option<&str>) -> Option<PathBuf> {
        let dir = self.deploy_base_dir(r).join(checksum.unwrap_or("active"));
        if dir.is_dir() {
            Some(dir)
        } else {
            None
        }
    }

    /// Read the `current` symlink for `name`, e.g. `arch/branch`, returning
    /// the equivalent full ref `app/<name>/<arch>/<branch>`.
    pub fn current_ref(&self, name: &str, cancel: &Cancellable) -> Option<Ref> {
        cancel.check().ok()?;
        let link = self.base.join("app").join(name).join("current");
        let target = std::fs::read_link(link).ok()?;
        let target = target.to_string_lossy();
        let (arch, branch) = target.split_once('/')?;
        Ref::new(Kind::App, name, arch, branch).ok()
    }

    /// Remove the `current` symlink for `name`.
    pub fn drop_current_ref(&self, name: &str, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        let link = self.base.join("app").join(name).join("current");
        match std::fs::remove_file(&link) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Point `app/<name>/current` at `r`'s `arch/branch`. Clears the link
    /// first; if `r`'s branch is empty, leaves it cleared.
    #[context("Making {r} current")]
    pub fn make_current_ref(&self, r: &Ref, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        assert_eq!(r.kind(), Kind::App);
        let dir = self.base.join("app").join(r.name());
        std::fs::create_dir_all(&dir)?;
        let link = dir.join("current");
        let _ = std::fs::remove_file(&link);
        if !r.branch().is_empty() {
            let target = format!("{}/{}", r.arch(), r.branch());
            std::os::unix::fs::symlink(target, &link)?;
        }
        Ok(())
    }

    /// Atomically repoint `<deploy-base>/active` at `checksum`, or remove it
    /// when `checksum` is `None`.
    #[context("Setting active for {r}")]
    pub fn set_active(&self, r: &Ref, checksum: Option<&str>, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        let deploy_base = self.deploy_base_dir(r);
        std::fs::create_dir_all(&deploy_base)?;
        let active_link = deploy_base.join("active");

        match checksum {
            Some(checksum) => {
                let tmp_name = format!(".active-{}", std::process::id());
                let tmp_link = deploy_base.join(&tmp_name);
                let _ = std::fs::remove_file(&tmp_link);
                std::os::unix::fs::symlink(checksum, &tmp_link)?;
                std::fs::rename(&tmp_link, &active_link)?;
            }
            None => match std::fs::remove_file(&active_link) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// The origin remote name recorded for `r`, if deployed.
    pub fn get_origin(&self, r: &Ref) -> Result<String> {
        let deploy_base = self.deploy_base_dir(r);
        if !deploy_base.exists() {
            return Err(StoreError::NotDeployed(r.to_string()));
        }
        Ok(std::fs::read_to_string(deploy_base.join("origin"))?)
    }

    /// Pull `r` from `remote`, recording `remote` as the ref's origin so a
    /// later `deploy(r, None, ..)` can resolve against it.
    #[context("Pulling {r} from {remote}")]
    pub fn pull(&self, remote: &str, r: &Ref, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        let repo = self.ensure_repo()?;
        let refspec = r.to_string();
        repo.pull(remote, &[refspec.as_str()])
            .map_err(StoreError::backend)?;

        let deploy_base = self.deploy_base_dir(r);
        std::fs::create_dir_all(&deploy_base)?;
        std::fs::write(deploy_base.join("origin"), remote)?;
        Ok(())
    }

    /// Deploy `r` at `checksum` (resolving the origin's tip when absent).
    #[context("Deploying {r}")]
    pub fn deploy(&self, r: &Ref, checksum: Option<&str>, cancel: &Cancellable) -> Result<String> {
        cancel.check()?;
        let repo = self.ensure_repo()?;
        let deploy_base = self.deploy_base_dir(r);

        let checksum = match checksum {
            Some(c) => {
                if !repo.has_commit(c).map_err(StoreError::backend)? {
                    let origin = std::fs::read_to_string(deploy_base.join("origin"))
                        .map_err(|_| StoreError::Other(anyhow::anyhow!("missing origin for {r}")))?;
                    debug!("pulling {c} from {origin}");
                    repo.pull(origin.trim(), &[c]).map_err(StoreError::backend)?;
                }
                c.to_string()
            }
            None => {
                let origin = self.get_origin(r).ok();
                let spec = match &origin {
                    Some(origin) => format!("{origin}:{r}"),
                    None => r.to_string(),
                };
                debug!("resolving {spec}");
                repo.resolve_rev(&spec, false)
                    .map_err(StoreError::backend)?
                    .ok_or_else(|| StoreError::Other(anyhow::anyhow!("could not resolve {spec}")))?
            }
        };

        let checkoutdir = deploy_base.join(&checksum);
        if checkoutdir.exists() {
            return Err(StoreError::AlreadyDeployed(format!("{r} {checksum}")));
        }

        cancel.check()?;
        repo.checkout_tree(&checksum, &checkoutdir, self.scope.is_user())
            .map_err(StoreError::backend)?;

        let files_dir = checkoutdir.join("files");
        std::fs::create_dir_all(&files_dir)?;
        std::fs::write(files_dir.join(".ref"), b"")?;

        let export_dir = checkoutdir.join("export");
        if export_dir.is_dir() {
            launcher::rewrite_export_dir(r.name(), r.branch(), r.arch(), &export_dir)
                .map_err(StoreError::Other)?;
        }

        self.set_active(r, Some(&checksum), cancel)?;

        Ok(checksum)
    }

    /// Undeploy `checksum` from `r`. Repoints `active` to another
    /// deployment first if this was the active one, then stages the
    /// checkout for removal, deleting it immediately when `force` is set
    /// or nothing holds its liveness lock.
    #[context("Undeploying {r} {checksum}")]
    pub fn undeploy(&self, r: &Ref, checksum: &str, force: bool, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        let deploy_base = self.deploy_base_dir(r);
        let checkoutdir = deploy_base.join(checksum);
        if !checkoutdir.exists() {
            return Err(StoreError::AlreadyUndeployed(format!("{r} {checksum}")));
        }

        self.ensure_repo()?;

        if self.read_active(r).as_deref() == Some(checksum) {
            let remaining = self
                .list_deployed(r, cancel)?
                .into_iter()
                .find(|c| c != checksum);
            self.set_active(r, remaining.as_deref(), cancel)?;
        }

        cancel.check()?;
        let dest = removed::stage_for_removal(&self.removed_dir(), &checkoutdir, checksum)
            .map_err(StoreError::Other)?;
        removed::remove_if_unlocked(&dest, force);
        Ok(())
    }

    /// Delete every unlocked entry under `<base>/.removed/`.
    pub fn cleanup_removed(&self, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        removed::cleanup_removed(&self.removed_dir(), cancel).map_err(StoreError::Other)
    }

    /// Prune unreachable objects from the repository.
    pub fn prune(&self, cancel: &Cancellable) -> Result<(i32, u64)> {
        cancel.check()?;
        let repo = self.ensure_repo()?;
        cancel.check()?;
        let (pruned, freed) = repo.prune().map_err(StoreError::backend)?;
        debug!("pruned {pruned} objects, freed {freed} bytes");
        Ok((pruned, freed))
    }

    /// Names of every remote configured in the repository.
    pub fn remotes(&self, cancel: &Cancellable) -> Result<Vec<String>> {
        cancel.check()?;
        self.ensure_repo()?.remote_list().map_err(StoreError::backend)
    }

    /// The URL configured for `remote`.
    pub fn remote_url(&self, remote: &str, cancel: &Cancellable) -> Result<String> {
        cancel.check()?;
        self.ensure_repo()?
            .remote_get_url(remote)
            .map_err(StoreError::backend)
    }

    /// The refs a remote advertises, fetched from its summary file.
    pub fn remote_refs(
        &self,
        remote: &str,
        cancel: &Cancellable,
    ) -> Result<std::collections::BTreeMap<String, String>> {
        cancel.check()?;
        self.ensure_repo()?
            .remote_list_refs(remote)
            .map_err(StoreError::backend)
    }

    /// Raw bytes of a remote's summary file.
    pub fn remote_summary(&self, remote: &str, cancel: &Cancellable) -> Result<Vec<u8>> {
        cancel.check()?;
        self.ensure_repo()?
            .remote_fetch_summary(remote)
            .map_err(StoreError::backend)
    }

    /// The `xa.title` option configured for `remote`, if any.
    pub fn remote_title(&self, remote: &str, cancel: &Cancellable) -> Result<Option<String>> {
        cancel.check()?;
        let config = self.ensure_repo()?.get_config().map_err(StoreError::backend)?;
        let group = format!("remote \"{remote}\"");
        Ok(config
            .optional_string(&group, "xa.title")
            .map_err(|e| StoreError::Other(e.into()))?
            .map(|s| s.to_string()))
    }

    /// The `xa.noenumerate` option configured for `remote`, defaulting to
    /// `true` when the key is absent.
    pub fn remote_noenumerate(&self, remote: &str, cancel: &Cancellable) -> Result<bool> {
        cancel.check()?;
        let config = self.ensure_repo()?.get_config().map_err(StoreError::backend)?;
        let group = format!("remote \"{remote}\"");
        Ok(config
            .optional_bool(&group, "xa.noenumerate")
            .map_err(|e| StoreError::Other(e.into()))?
            .unwrap_or(true))
    }

    /// Rebuild `<base>/exports/` for `changed_app` (by name), prune dangling
    /// symlinks, then run triggers.
    pub fn update_exports(&self, changed_app: Option<&str>, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;
        let active_export = changed_app.and_then(|app| {
            let r = self.current_ref(app, cancel)?;
            let active = self.get_if_deployed(&r, None)?;
            let export = active.join("export");
            Some(export)
        });
        exports::update_exports(
            &self.exports_dir(),
            changed_app,
            active_export.as_deref(),
        )
        .map_err(StoreError::Other)
    }

    /// Load a deployment's `metadata` key-file plus (for app refs) its
    /// merged overrides.
    #[context("Loading deployed {r}")]
    pub fn load_deployed(&self, r: &Ref, checksum: Option<&str>, cancel: &Cancellable) -> Result<Deployment> {
        cancel.check()?;
        let path = self
            .get_if_deployed(r, checksum)
            .ok_or_else(|| StoreError::NotDeployed(r.to_string()))?;

        let metadata_path = path.join("metadata");
        let metadata = glib::KeyFile::new();
        metadata
            .load_from_file(metadata_path.to_str().unwrap_or_default(), glib::KeyFileFlags::NONE)
            .map_err(|e| StoreError::Other(e.into()))?;

        let overrides = if r.kind() == Kind::App {
            let system_base = if self.scope.is_user() {
                None
            } else {
                Some(self.overrides_dir())
            };
            let system_base = system_base
                .as_deref()
                .map(|p| camino::Utf8Path::from_path(p).expect("utf8 base path"));
            let user_base = camino::Utf8Path::from_path(&self.overrides_dir())
                .expect("utf8 base path");
            Some(
                overrides::load_merged_override(system_base, user_base, r.name())
                    .map_err(StoreError::Other)?,
            )
        } else {
            None
        };

        Ok(Deployment {
            path,
            metadata,
            overrides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fake::FakeRepo;

    fn test_ref() -> Ref {
        Ref::new(Kind::App, "org.example.Foo", "x86_64", "stable").unwrap()
    }

    fn store_with_fake_repo(base: &Path) -> (Store, Arc<FakeRepo>) {
        let repo = Arc::new(FakeRepo::default().with_ref("app/org.example.Foo/x86_64/stable", "a".repeat(64).as_str()));
        let store = Store::with_repo(base, Scope::User, repo.clone());
        (store, repo)
    }

    #[test]
    fn test_pull_records_origin() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        store.pull("r1", &r, &Cancellable::never()).unwrap();
        assert_eq!(store.get_origin(&r).unwrap(), "r1");
    }

    #[test]
    fn test_pull_records_requested_refspec_on_fake_repo() {
        let td = tempfile::tempdir().unwrap();
        let (store, repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        store.pull("r1", &r, &Cancellable::never()).unwrap();
        let pulls = repo.pulls.lock().unwrap();
        assert_eq!(
            *pulls,
            vec![("r1".to_string(), "app/org.example.Foo/x86_64/stable".to_string())]
        );
    }

    #[test]
    fn test_pull_then_deploy_activates_resolved_commit() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        store.pull("r1", &r, &Cancellable::never()).unwrap();
        let checksum = store.deploy(&r, None, &Cancellable::never()).unwrap();
        assert_eq!(checksum, "a".repeat(64));
        assert_eq!(store.read_active(&r), Some(checksum));
        assert!(store
            .deploy_base_dir(&r)
            .join("a".repeat(64))
            .join("files/.ref")
            .exists());
    }

    #[test]
    fn test_deploy_creates_checkout_and_active_link() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        let checksum = store.deploy(&r, None, &Cancellable::never()).unwrap();
        assert_eq!(checksum, "a".repeat(64));
        assert_eq!(store.read_active(&r), Some(checksum.clone()));
        assert!(store.deploy_base_dir(&r).join(&checksum).join("files/.ref").exists());
    }

    #[test]
    fn test_deploy_twice_is_already_deployed() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        store.deploy(&r, None, &Cancellable::never()).unwrap();
        let err = store.deploy(&r, Some(&"a".repeat(64)), &Cancellable::never()).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyDeployed(_)));
    }

    #[test]
    fn test_undeploy_missing_checksum_is_already_undeployed() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        let err = store
            .undeploy(&r, &"f".repeat(64), false, &Cancellable::never())
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyUndeployed(_)));
    }

    #[test]
    fn test_undeploy_active_repoints_to_remaining() {
        let td = tempfile::tempdir().unwrap();
        let (store, repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        let first = store.deploy(&r, None, &Cancellable::never()).unwrap();

        let second_checksum = "b".repeat(64);
        repo.commits.lock().unwrap().insert(second_checksum.clone());
        let second_dir = store.deploy_base_dir(&r).join(&second_checksum);
        std::fs::create_dir_all(second_dir.join("files")).unwrap();
        std::fs::write(second_dir.join("files/.ref"), b"").unwrap();

        store
            .undeploy(&r, &first, true, &Cancellable::never())
            .unwrap();
        assert_eq!(store.read_active(&r), Some(second_checksum));
    }

    #[test]
    fn test_make_and_read_current_ref() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        let r = test_ref();
        store.make_current_ref(&r, &Cancellable::never()).unwrap();
        assert_eq!(
            store.current_ref("org.example.Foo", &Cancellable::never()),
            Some(r)
        );
    }

    #[test]
    fn test_list_refs_for_name_skips_legacy_data_dir() {
        let td = tempfile::tempdir().unwrap();
        let (store, _repo) = store_with_fake_repo(td.path());
        std::fs::create_dir_all(store.kind_dir(Kind::App).join("org.example.Foo/data")).unwrap();
        std::fs::create_dir_all(store.kind_dir(Kind::App).join("org.example.Foo/x86_64/stable")).unwrap();
        let refs = store
            .list_refs_for_name(Kind::App, "org.example.Foo", &Cancellable::never())
            .unwrap();
        similar_asserts::assert_eq!(refs, vec![test_ref()]);
    }

    #[test]
    fn test_remote_title_and_noenumerate_defaults() {
        let td = tempfile::tempdir().unwrap();
        let repo = Arc::new(FakeRepo::default().with_config(
            "[remote \"r1\"]\nurl=https://example.com/repo\nxa.title=Example Repo\n",
        ));
        let store = Store::with_repo(td.path(), Scope::User, repo);
        assert_eq!(
            store.remote_title("r1", &Cancellable::never()).unwrap(),
            Some("Example Repo".to_string())
        );
        // xa.noenumerate is absent for r1, so it defaults to true.
        assert!(store
            .remote_noenumerate("r1", &Cancellable::never())
            .unwrap());
    }

    #[test]
    fn test_remote_noenumerate_explicit_false() {
        let td = tempfile::tempdir().unwrap();
        let repo = Arc::new(
            FakeRepo::default().with_config("[remote \"r1\"]\nxa.noenumerate=false\n"),
        );
        let store = Store::with_repo(td.path(), Scope::User, repo);
        assert!(!store
            .remote_noenumerate("r1", &Cancellable::never())
            .unwrap());
    }
}
