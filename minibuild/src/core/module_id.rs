use crate::utils::InternedString;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Identity of a module, interned for cheap comparison in the dependency
/// graph. A module is identified purely by its directory - there is no
/// version concept in a native build tree, unlike a package registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId {
    inner: &'static ModuleIdInner,
}

struct ModuleIdInner {
    name: InternedString,
    dir: PathBuf,
}

lazy_static::lazy_static! {
    static ref CACHE: Mutex<HashSet<&'static ModuleIdInner>> = Mutex::new(HashSet::new());
}

impl PartialEq for ModuleIdInner {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.dir == other.dir
    }
}
impl Eq for ModuleIdInner {}
impl std::hash::Hash for ModuleIdInner {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.dir.hash(state);
    }
}

impl ModuleId {
    pub fn new(name: impl Into<InternedString>, dir: impl Into<PathBuf>) -> Self {
        let wanted = ModuleIdInner { name: name.into(), dir: dir.into() };
        let mut cache = CACHE.lock().unwrap();
        let inner = match cache.get(&wanted) {
            Some(&existing) => existing,
            None => {
                let leaked: &'static ModuleIdInner = Box::leak(Box::new(wanted));
                cache.insert(leaked);
                leaked
            }
        };
        Self { inner }
    }

    pub fn name(&self) -> InternedString {
        self.inner.name
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// A hash stable across machines for the same relative layout: the
    /// absolute directory is stripped down to its path relative to the
    /// project root before hashing, so moving the whole tree doesn't
    /// invalidate every fingerprint.
    pub fn stable_hash(&self, project_root: &Path) -> u64 {
        let rel = self.inner.dir.strip_prefix(project_root).unwrap_or(&self.inner.dir);
        crate::utils::hash_u64(&(self.inner.name, rel))
    }
}

impl std::fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_is_stable_per_dir() {
        let a = ModuleId::new("foo", "/a/foo");
        let b = ModuleId::new("foo", "/a/foo");
        assert_eq!(a, b);
        let c = ModuleId::new("foo", "/b/foo");
        assert_ne!(a, c);
    }
}
