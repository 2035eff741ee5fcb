//! Toolset registry (§4.3/§4.5): turns one `[<toolset-id>]` project config
//! section into the concrete [`Toolset`] + [`BuildModel`] pairs it
//! contributes to a run. A section names exactly one toolset module
//! (`gcc`, `clang`, `mingw`, `cross-gcc`, `msvs`) and an `arch` list; this
//! is where that module id is dispatched to the right discovery routine.
//!
//! Model names follow `<toolset-id>-<platform>-<arch>` (e.g.
//! `gcc-linux-x86_64`), matching what project configs already write into
//! `[MINIBUILD-ALIAS]`.

use crate::config::ToolsetConfig;
use crate::grammar::{Arch, Platform};
use crate::toolchain::bootstrap::{self, EnvPatch};
use crate::toolchain::gcc::{GccToolset, GccTools};
use crate::toolchain::msvc::{MsvcToolset, MsvcTools};
use crate::toolchain::Toolset;
use crate::utils::IResult;
use minibuild_platform::BuildModel;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One model this run can build for, paired with the toolset that builds
/// it. Several models from the same `[<toolset-id>]` section (one per
/// configured architecture) can share a single gcc-family [`Toolset`]
/// instance - the architecture only matters at action-creation time, via
/// the `&BuildModel` every factory method takes. MSVC can't share like
/// this: each architecture needs its own `vcvarsall.bat` bootstrap, so it
/// gets its own [`MsvcToolset`].
pub struct RegisteredToolset {
    pub model: BuildModel,
    pub toolset: Arc<dyn Toolset>,
}

impl std::fmt::Debug for RegisteredToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredToolset")
            .field("model", &self.model)
            .field("toolset", &self.toolset.toolset_name())
            .finish()
    }
}

/// Builds every model/toolset pair a `[<toolset-id>]` section contributes
/// for one target `platform` (§4.3 step 2). `bootstrap_dir` is where MSVC
/// environment patches are cached (§4.5); gcc-family toolsets ignore it.
pub fn build(id: &str, cfg: &ToolsetConfig, platform: Platform, bootstrap_dir: &Path) -> IResult<Vec<RegisteredToolset>> {
    let arches = parse_arch_list(cfg.config.get("arch"))?;
    match cfg.module.as_str() {
        "gcc" | "clang" | "mingw" | "cross-gcc" => build_gcc_family(id, cfg, platform, &arches),
        "msvs" => build_msvc(id, cfg, platform, &arches, bootstrap_dir),
        other => anyhow::bail!("toolset `{id}` names unknown module `{other}`"),
    }
}

fn parse_arch_list(raw: Option<&String>) -> IResult<Vec<Arch>> {
    let raw = raw.map(String::as_str).unwrap_or("x86_64");
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Arch>().map_err(|e| anyhow::anyhow!("{e}")))
        .collect()
}

fn build_gcc_family(id: &str, cfg: &ToolsetConfig, platform: Platform, arches: &[Arch]) -> IResult<Vec<RegisteredToolset>> {
    let flavor_name = match cfg.module.as_str() {
        "cross-gcc" => "gcc",
        other => other,
    };
    let bin_prefix = cfg.config.get("bin-prefix").map(PathBuf::from);
    if cfg.module == "cross-gcc" && bin_prefix.is_none() {
        anyhow::bail!("toolset `{id}` is `cross-gcc` but has no `bin-prefix` in its `config`");
    }
    let tools = GccTools::discover(flavor_name, bin_prefix.as_deref())?;
    let toolset: Arc<dyn Toolset> = Arc::new(GccToolset::new(id.to_owned(), tools));

    let os_version = cfg.config.get("os-version").cloned();
    arches
        .iter()
        .map(|&arch| {
            let mut model = BuildModel::new(model_name(id, platform, arch), id.to_owned(), platform, arch);
            if let Some(v) = &os_version {
                model = model.with_os_version(v.clone());
            }
            Ok(RegisteredToolset { model, toolset: Arc::clone(&toolset) })
        })
        .collect()
}

fn build_msvc(id: &str, cfg: &ToolsetConfig, platform: Platform, arches: &[Arch], bootstrap_dir: &Path) -> IResult<Vec<RegisteredToolset>> {
    let install_dir = cfg
        .config
        .get("install-dir")
        .ok_or_else(|| anyhow::anyhow!("toolset `{id}` is `msvs` but has no `install-dir` in its `config`"))?;
    let vcvarsall = bootstrap::find_vcvarsall(Path::new(install_dir))
        .ok_or_else(|| anyhow::anyhow!("no `vcvarsall.bat` found under `{install_dir}`"))?;

    let os_version = cfg.config.get("os-version").cloned();
    arches
        .iter()
        .map(|&arch| {
            let arch_arg = msvc_arch_arg(arch)?;
            let cache_key = format!("{id}-{arch_arg}");
            let patch = bootstrap::bootstrap(bootstrap_dir, &vcvarsall, arch_arg, &cache_key)?;
            let tools = msvc_tools_from_patch(patch)?;
            let model_id = model_name(id, platform, arch);
            let toolset: Arc<dyn Toolset> = Arc::new(MsvcToolset::new(model_id.clone(), tools));
            let mut model = BuildModel::new(model_id, id.to_owned(), platform, arch);
            if let Some(v) = &os_version {
                model = model.with_os_version(v.clone());
            }
            Ok(RegisteredToolset { model, toolset })
        })
        .collect()
}

fn msvc_arch_arg(arch: Arch) -> IResult<&'static str> {
    match arch {
        Arch::X86 => Ok("x86"),
        Arch::X86_64 => Ok("x64"),
        other => anyhow::bail!("msvs toolset has no vcvarsall argument for architecture `{other}`"),
    }
}

/// Locates `cl.exe`/`link.exe`/`lib.exe`/`mt.exe` along the `PATH` that a
/// bootstrapped environment patch prepends - the ambient process `PATH`
/// hasn't been mutated, only the patch applied to each spawned `Command`,
/// so discovery has to walk the patch's own `PATH` entry rather than
/// `toolchain::which`.
fn msvc_tools_from_patch(env: EnvPatch) -> IResult<MsvcTools> {
    let cl = find_in_patch(&env, "cl.exe")?;
    let link = find_in_patch(&env, "link.exe")?;
    let lib = find_in_patch(&env, "lib.exe")?;
    let mt = find_in_patch(&env, "mt.exe")?;
    Ok(MsvcTools { cl, link, lib, mt, env })
}

fn find_in_patch(env: &EnvPatch, exe: &str) -> IResult<PathBuf> {
    let path = env.vars.get("PATH").ok_or_else(|| anyhow::anyhow!("bootstrapped environment has no `PATH`"))?;
    std::env::split_paths(path)
        .map(|dir| dir.join(exe))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| anyhow::anyhow!("`{exe}` not found on the bootstrapped MSVC `PATH`"))
}

fn model_name(id: &str, platform: Platform, arch: Arch) -> String {
    format!("{id}-{platform}-{arch}")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_default_single_arch() {
        let arches = parse_arch_list(None).unwrap();
        assert_eq!(arches, vec![Arch::X86_64]);
    }

    #[test]
    fn parses_multi_arch_list() {
        let raw = "x86, x86_64".to_owned();
        let arches = parse_arch_list(Some(&raw)).unwrap();
        assert_eq!(arches, vec![Arch::X86, Arch::X86_64]);
    }

    #[test]
    fn model_name_matches_alias_convention() {
        assert_eq!(model_name("gcc", Platform::Linux, Arch::X86_64), "gcc-linux-x86_64");
    }

    #[test]
    fn cross_gcc_requires_bin_prefix() {
        let cfg = ToolsetConfig { id: "arm".to_owned(), module: "cross-gcc".to_owned(), config: Default::default() };
        let err = build_gcc_family("arm", &cfg, Platform::Linux, &[Arch::Arm]).unwrap_err();
        assert!(err.to_string().contains("bin-prefix"));
    }
}
