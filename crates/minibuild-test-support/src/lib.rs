//! Fixture helpers for `minibuild`'s integration tests: a small project
//! builder that writes description/config files into a temp directory, plus
//! host-toolchain availability checks so scenarios that need a real `cc`
//! skip cleanly on a machine that doesn't have one.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Accumulates files to write under one fresh temp directory, the way a
/// project's description/source tree is laid out before a build is run
/// against it.
#[derive(Default)]
pub struct ProjectBuilder {
    files: Vec<(PathBuf, String)>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        ProjectBuilder::default()
    }

    /// Queues a file to be written relative to the project root. Parent
    /// directories are created as needed.
    pub fn file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.files.push((path.as_ref().to_path_buf(), contents.into()));
        self
    }

    pub fn build(self) -> Project {
        let root = TempDir::new().expect("create project temp dir");
        for (path, contents) in &self.files {
            let full = root.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("create fixture parent dir");
            }
            fs::write(&full, contents).expect("write fixture file");
        }
        Project { root }
    }
}

/// A scaffolded project rooted at a temp directory. Kept alive for the
/// duration of a test - the directory and every file under it are removed
/// when this value (and its `TempDir`) drops.
pub struct Project {
    root: TempDir,
}

impl Project {
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.path().join(rel)
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> String {
        fs::read_to_string(self.path(rel)).expect("read fixture output file")
    }
}

/// Whether a GNU or Clang C compiler is on `PATH` - scenarios that actually
/// invoke the toolchain (rather than just exercising discovery/freshness
/// logic) skip themselves when neither is available.
pub fn host_cc_available() -> bool {
    minibuild::toolchain::which("cc").is_some() || minibuild::toolchain::which("gcc").is_some() || minibuild::toolchain::which("clang").is_some()
}

pub fn host_ar_available() -> bool {
    minibuild::toolchain::which("ar").is_some()
}

/// Whether `GccTools::discover("gcc", None)` would actually find both tools
/// it needs - the plain `host_cc_available` check accepts `clang`/`cc`
/// alone, neither of which satisfies the `gcc`-flavor toolset.
pub fn host_gnu_toolchain_available() -> bool {
    minibuild::toolchain::which("gcc").is_some() && host_ar_available()
}

/// Skips the calling test (by returning early) when no GCC-flavor toolchain
/// (`gcc` + `ar`) is available on `PATH`.
#[macro_export]
macro_rules! require_host_gnu_toolchain {
    () => {
        if !$crate::host_gnu_toolchain_available() {
            eprintln!("skipping: no host gcc/ar toolchain found on PATH");
            return;
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writes_nested_files() {
        let project = ProjectBuilder::new()
            .file("minibuild.ini", "[MINIBUILD]\n")
            .file("hello/minibuild.mk", "module_type = 'executable'\n")
            .build();
        assert!(project.path("minibuild.ini").is_file());
        assert_eq!(project.read("hello/minibuild.mk"), "module_type = 'executable'\n");
    }
}
