use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the target OS families a build model can target.
///
/// `posix` is not a variant here - it is an *alias* that matches both
/// [`Platform::Linux`] and [`Platform::Macosx`] when resolving grammar
/// refinement keys (`build_list_posix`, ...), handled by [`Platform::matches_alias`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    Linux,
    Macosx,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Macosx => "macosx",
        }
    }

    /// `posix` matches both linux and macosx, per the grammar refinement rules.
    pub fn matches_alias(self, alias: &str) -> bool {
        alias == self.as_str() || (alias == "posix" && matches!(self, Platform::Linux | Platform::Macosx))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macosx" => Ok(Platform::Macosx),
            _ => Err(ParseError::new("platform", s)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn posix_alias() {
        assert!(Platform::Linux.matches_alias("posix"));
        assert!(Platform::Macosx.matches_alias("posix"));
        assert!(!Platform::Windows.matches_alias("posix"));
        assert!(Platform::Linux.matches_alias("linux"));
    }

    #[test]
    fn roundtrip() {
        for p in [Platform::Windows, Platform::Linux, Platform::Macosx] {
            assert_eq!(p, p.as_str().parse().unwrap());
        }
    }
}
