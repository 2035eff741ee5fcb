use crate::{Arch, Platform};

/// A concrete (toolset, target-OS, target-arch) configuration, identified by
/// a unique model name (e.g. `gcc-linux-x86_64`, `msvs2017-windows-x86_64`).
///
/// Model names are assigned by the project config (`[<toolset-id>]` sections
/// plus each toolset's own model enumeration) and are only required to be
/// globally unique within one run; this type carries no registry of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildModel {
    name: String,
    toolset: String,
    platform: Platform,
    arch: Arch,
    os_version: Option<String>,
    is_native: bool,
    arch_compile_flags: Vec<String>,
    arch_link_flags: Vec<String>,
}

impl BuildModel {
    pub fn new(name: impl Into<String>, toolset: impl Into<String>, platform: Platform, arch: Arch) -> Self {
        let is_native = platform == crate::host_platform() && arch == crate::host_arch();
        Self {
            name: name.into(),
            toolset: toolset.into(),
            platform,
            arch,
            os_version: None,
            is_native,
            arch_compile_flags: Vec::new(),
            arch_link_flags: Vec::new(),
        }
    }

    pub fn with_os_version(mut self, version: impl Into<String>) -> Self {
        self.os_version = Some(version.into());
        self
    }

    pub fn with_compile_flags(mut self, flags: Vec<String>) -> Self {
        self.arch_compile_flags = flags;
        self
    }

    pub fn with_link_flags(mut self, flags: Vec<String>) -> Self {
        self.arch_link_flags = flags;
        self
    }

    pub fn with_native(mut self, is_native: bool) -> Self {
        self.is_native = is_native;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn toolset(&self) -> &str {
        &self.toolset
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The platform alias used when resolving grammar refinement keys - `posix`
    /// for linux/macosx, otherwise the platform's own name.
    pub fn platform_alias(&self) -> Option<&'static str> {
        matches!(self.platform, Platform::Linux | Platform::Macosx).then_some("posix")
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn os_version(&self) -> Option<&str> {
        self.os_version.as_deref()
    }

    pub fn is_native(&self) -> bool {
        self.is_native
    }

    pub fn arch_compile_flags(&self) -> &[String] {
        &self.arch_compile_flags
    }

    pub fn arch_link_flags(&self) -> &[String] {
        &self.arch_link_flags
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn posix_alias_only_for_linux_macosx() {
        let m = BuildModel::new("gcc-linux-x86_64", "gcc", Platform::Linux, Arch::X86_64);
        assert_eq!(m.platform_alias(), Some("posix"));
        let m = BuildModel::new("msvs-windows-x86_64", "msvs2017", Platform::Windows, Arch::X86_64);
        assert_eq!(m.platform_alias(), None);
    }
}
