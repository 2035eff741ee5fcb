use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref CACHE: Mutex<HashSet<&'static str>> = Mutex::new(HashSet::new());
}

/// A cheaply cloneable, globally interned string.
///
/// Module names, toolset ids and model names are compared and hashed far
/// more often than they are constructed, so it pays to intern them once and
/// pass around a `Copy` handle (a fat pointer to a leaked `&'static str`)
/// instead of cloning a `String` at every graph edge.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedString {
    inner: &'static str,
}

impl InternedString {
    pub fn new(s: &str) -> Self {
        let mut cache = CACHE.lock().unwrap();
        let inner = match cache.get(s) {
            Some(&interned) => interned,
            None => {
                let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
                cache.insert(leaked);
                leaked
            }
        };
        Self { inner }
    }

    pub fn as_str(&self) -> &str {
        self.inner
    }
}

impl From<&str> for InternedString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InternedString {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl std::ops::Deref for InternedString {
    type Target = str;
    fn deref(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for InternedString {
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner)
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl serde::Serialize for InternedString {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.inner)
    }
}

impl<'de> serde::Deserialize<'de> for InternedString {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(InternedString::new(&s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_dedupes_backing_storage() {
        let a = InternedString::new("module::lib");
        let b = InternedString::new("module::lib");
        assert_eq!(a, b);
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
    }
}
