//! MSVC environment bootstrap (§4.5), grounded on the upstream
//! `init_msvs_toolset`/`apply_environ_patch`: `vcvarsall.bat` is run once
//! per architecture, its effect on the environment is captured as a
//! key/value patch (not the whole dump - only what changed from the
//! ambient process environment), and that patch is cached to disk so
//! later invocations skip spawning `cmd.exe` again.

use crate::toolchain::Error;
use crate::utils::paths;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The set of environment variables `vcvarsall.bat` adds or overwrites,
/// relative to the ambient process environment it was run from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPatch {
    pub vars: BTreeMap<String, String>,
}

impl EnvPatch {
    fn from_dump(text: &str) -> Self {
        let mut vars = BTreeMap::new();
        for line in text.lines() {
            if let Some((k, v)) = line.split_once('=') {
                vars.insert(k.to_owned(), v.to_owned());
            }
        }
        EnvPatch { vars }
    }

    fn ambient() -> Self {
        EnvPatch { vars: std::env::vars().collect() }
    }

    fn diff_against(after: &Self, before: &Self) -> Self {
        let mut vars = BTreeMap::new();
        for (k, v) in &after.vars {
            if before.vars.get(k) != Some(v) {
                vars.insert(k.clone(), v.clone());
            }
        }
        EnvPatch { vars }
    }

    fn serialize(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.vars {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        out
    }

    fn deserialize(text: &str) -> Self {
        Self::from_dump(text)
    }

    /// Applies the captured patch to a `Command` about to invoke `cl.exe`,
    /// `link.exe`, `lib.exe`, or `mt.exe` - the upstream `merge_env_value`
    /// behavior of prefixing list-valued vars (`PATH`, `INCLUDE`, `LIB`)
    /// onto the ambient value, rather than replacing it outright.
    pub fn apply(&self, command: &mut Command) {
        for (k, v) in &self.vars {
            let merged = match (k.to_ascii_uppercase().as_str(), std::env::var(k).ok()) {
                (name, Some(existing)) if matches!(name, "PATH" | "INCLUDE" | "LIB" | "LIBPATH") => {
                    format!("{v}{}{existing}", path_list_separator())
                }
                _ => v.clone(),
            };
            command.env(k, merged);
        }
    }
}

fn path_list_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}

/// Runs `vcvarsall.bat <arch_arg>`, diffs the resulting environment
/// against the ambient one, and caches it under
/// `<bootstrap_dir>/msvc-<cache_key>/env.patch`.
pub fn bootstrap(bootstrap_dir: &Path, vcvarsall: &Path, arch_arg: &str, cache_key: &str) -> Result<EnvPatch, Error> {
    let cache_dir = bootstrap_dir.join(format!("msvc-{cache_key}"));
    let cache_file = cache_dir.join("env.patch");
    if cache_file.is_file() {
        let text = paths::read_string(&cache_file).map_err(|e| Error::io(e.to_string()))?;
        return Ok(EnvPatch::deserialize(&text));
    }

    let dump = run_env_dump(&cache_dir, vcvarsall, arch_arg)?;
    let after = EnvPatch::from_dump(&dump);
    let before = EnvPatch::ambient();
    let patch = EnvPatch::diff_against(&after, &before);

    paths::create_dir_all(&cache_dir).map_err(|e| Error::io(e.to_string()))?;
    paths::write(&cache_file, patch.serialize().as_bytes()).map_err(|e| Error::io(e.to_string()))?;
    Ok(patch)
}

fn run_env_dump(cache_dir: &Path, vcvarsall: &Path, arch_arg: &str) -> Result<String, Error> {
    paths::create_dir_all(cache_dir).map_err(|e| Error::io(e.to_string()))?;
    let wrapper = cache_dir.join("vars_dump.bat");
    let body = format!("@echo off\r\ncall \"{}\" {}\r\nif errorlevel 0 set\r\n", vcvarsall.display(), arch_arg);
    paths::write(&wrapper, body.as_bytes()).map_err(|e| Error::io(e.to_string()))?;

    let output = Command::new("cmd.exe")
        .arg("/c")
        .arg(&wrapper)
        .output()
        .map_err(|e| Error::tool_exec(format!("failed to run `{}`: {e}", wrapper.display())))?;
    if !output.status.success() {
        return Err(Error::tool_exec(format!("`{}` exited with {}", wrapper.display(), output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Resolves `vcvarsall.bat` from a Visual Studio installation directory
/// (`<install>/VC/Auxiliary/Build/vcvarsall.bat` for modern layouts, falling
/// back to `<install>/VC/vcvarsall.bat` for the pre-2017 layout).
pub fn find_vcvarsall(install_dir: &Path) -> Option<PathBuf> {
    let modern = install_dir.join("VC").join("Auxiliary").join("Build").join("vcvarsall.bat");
    if modern.is_file() {
        return Some(modern);
    }
    let legacy = install_dir.join("VC").join("vcvarsall.bat");
    legacy.is_file().then_some(legacy)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn diffs_only_changed_or_new_vars() {
        let mut before = BTreeMap::new();
        before.insert("PATH".to_owned(), "/usr/bin".to_owned());
        before.insert("HOME".to_owned(), "/root".to_owned());
        let mut after = before.clone();
        after.insert("PATH".to_owned(), "/msvc/bin".to_owned());
        after.insert("INCLUDE".to_owned(), "/msvc/include".to_owned());

        let patch = EnvPatch::diff_against(&EnvPatch { vars: after }, &EnvPatch { vars: before });
        assert_eq!(patch.vars.get("PATH"), Some(&"/msvc/bin".to_owned()));
        assert_eq!(patch.vars.get("INCLUDE"), Some(&"/msvc/include".to_owned()));
        assert!(!patch.vars.contains_key("HOME"));
    }

    #[test]
    fn round_trips_through_serialized_form() {
        let mut vars = BTreeMap::new();
        vars.insert("LIB".to_owned(), "C:\\msvc\\lib".to_owned());
        let patch = EnvPatch { vars };
        let text = patch.serialize();
        assert_eq!(EnvPatch::deserialize(&text), patch);
    }
}
