//! The four-part ref identifying a deployable app or runtime tree:
//! `<kind>/<name>/<arch>/<branch>`.

use std::fmt;
use std::str::FromStr;

/// Whether a ref names an application or a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    /// `app/...`
    App,
    /// `runtime/...`
    Runtime,
}

impl Kind {
    /// The directory name this kind is stored under.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::App => "app",
            Kind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-qualified, validated ref.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ref {
    kind: Kind,
    name: String,
    arch: String,
    branch: String,
}

fn is_valid_component(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn is_valid_name(s: &str) -> bool {
    // Reverse-DNS-ish: at least two dot-separated labels, each a valid component.
    is_valid_component(s) && s.contains('.') && s.split('.').all(|part| !part.is_empty())
}

impl Ref {
    /// Build a ref from already-separated parts, validating each.
    pub fn new(
        kind: Kind,
        name: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        let arch = arch.into();
        let branch = branch.into();
        if !is_valid_name(&name) {
            anyhow::bail!("invalid ref name: {name:?}");
        }
        if !is_valid_component(&arch) {
            anyhow::bail!("invalid ref arch: {arch:?}");
        }
        if !is_valid_component(&branch) {
            anyhow::bail!("invalid ref branch: {branch:?}");
        }
        Ok(Ref {
            kind,
            name,
            arch,
            branch,
        })
    }

    /// The kind component (`app` or `runtime`).
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The reverse-DNS app/runtime name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The architecture component.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The branch component.
    pub fn branch(&self) -> &str {
        &self.branch
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.kind, self.name, self.arch, self.branch)
    }
}

impl FromStr for Ref {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [kind, name, arch, branch] = parts.as_slice() else {
            anyhow::bail!("ref {s:?} does not have exactly four slash-separated parts");
        };
        let kind = match *kind {
            "app" => Kind::App,
            "runtime" => Kind::Runtime,
            other => anyhow::bail!("unknown ref kind {other:?}"),
        };
        Ref::new(kind, *name, *arch, *branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let r: Ref = "app/org.example.Foo/x86_64/stable".parse().unwrap();
        assert_eq!(r.kind(), Kind::App);
        assert_eq!(r.name(), "org.example.Foo");
        assert_eq!(r.to_string(), "app/org.example.Foo/x86_64/stable");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("app/org.example.Foo/x86_64".parse::<Ref>().is_err());
        assert!("app/org.example.Foo/x86_64/stable/extra".parse::<Ref>().is_err());
        assert!("bogus/org.example.Foo/x86_64/stable".parse::<Ref>().is_err());
        assert!("app//x86_64/stable".parse::<Ref>().is_err());
        assert!("app/noDots/x86_64/stable".parse::<Ref>().is_err());
    }

    #[test]
    fn test_runtime_kind_directory_name() {
        let r: Ref = "runtime/org.example.Platform/x86_64/1.0".parse().unwrap();
        assert_eq!(r.kind().as_str(), "runtime");
    }

    quickcheck::quickcheck! {
        fn roundtrips_through_display_and_parse(name_suffix: String, arch: String, branch: String) -> quickcheck::TestResult {
            let clean = |s: &str| -> String {
                s.chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .take(8)
                    .collect()
            };
            let name_suffix = clean(&name_suffix);
            let arch = clean(&arch);
            let branch = clean(&branch);
            if name_suffix.is_empty() || arch.is_empty() || branch.is_empty() {
                return quickcheck::TestResult::discard();
            }
            let name = format!("org.example.{name_suffix}");
            let r = match Ref::new(Kind::App, name, arch, branch) {
                Ok(r) => r,
                Err(_) => return quickcheck::TestResult::discard(),
            };
            let s = r.to_string();
            let parsed: Ref = s.parse().unwrap();
            quickcheck::TestResult::from_bool(parsed == r)
        }
    }
}
