//! Toolchain action interface (§4.4): a uniform set of six action
//! factories - compile C, compile C++, assemble, archive, link executable,
//! link shared library - parameterized by build model and configuration.

pub mod error;
pub use error::Error;

mod cmd;

pub mod gcc;
pub mod msvc;
pub mod nasm;
pub mod bootstrap;
pub mod registry;
mod rsp;
pub use rsp::argv_to_rsp;

use crate::core::{BuildConfig, DepInfo, Fingerprint, Freshness, Module};
use crate::utils::{paths, IResult};
use minibuild_platform::BuildModel;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    Gnu,
    Clang,
    Msvc,
}

impl ToolFamily {
    pub fn is_msvc(self) -> bool {
        matches!(self, ToolFamily::Msvc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Lib,
    Pdb,
    Exe,
    Dll,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub is_executable: bool,
}

/// Result of executing one toolset action: whether it actually ran (versus
/// finding its target already fresh) and the artifacts it produces or
/// already owns.
pub struct ActionResult {
    pub rebuilt: bool,
    pub artifacts: Vec<Artifact>,
}

/// A single compile/archive/link step, bound to its inputs and outputs at
/// construction time. `execute` answers the freshness question itself
/// (honoring `force`) rather than leaving that to the caller, mirroring the
/// upstream action objects' `__call__(force, verbose)`.
pub trait Action: Send + Sync {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult>;
}

pub enum SourceKind {
    C,
    Cpp,
    Asm,
}

/// Inputs shared by every link action factory: the module being linked
/// plus its resolved dependency libraries (already-built artifacts of
/// modules it links against, gathered by the workflow engine by walking
/// `lib_list` and keeping the public/private propagation rules).
pub struct LinkInputs<'a> {
    pub module: &'a Module,
    pub static_deps: Vec<PathBuf>,
    pub shared_deps: Vec<PathBuf>,
}

/// A concrete toolchain family (GCC/Clang/MinGW/cross-GCC, or MSVC),
/// producing the six action kinds for one build model/configuration pair.
/// Every factory takes the owning `Module` rather than a raw description -
/// the module already carries the resolved, platform-refined fields the
/// loader produced.
pub trait Toolset: Send + Sync {
    fn toolset_name(&self) -> &str;
    fn family(&self) -> ToolFamily;

    fn create_c_action(
        &self,
        module: &Module,
        source: PathBuf,
        obj_dir: &std::path::Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &std::path::Path,
    ) -> IResult<Box<dyn Action>>;

    fn create_cpp_action(
        &self,
        module: &Module,
        source: PathBuf,
        obj_dir: &std::path::Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &std::path::Path,
    ) -> IResult<Box<dyn Action>>;

    fn create_asm_action(
        &self,
        module: &Module,
        source: PathBuf,
        obj_dir: &std::path::Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &std::path::Path,
    ) -> IResult<Box<dyn Action>>;

    fn create_static_lib_action(
        &self,
        module: &Module,
        lib_dir: &std::path::Path,
        obj_dir: &std::path::Path,
        obj_names: &[String],
        model: &BuildModel,
        config: BuildConfig,
    ) -> IResult<Box<dyn Action>>;

    fn create_exe_link_action(
        &self,
        inputs: LinkInputs,
        exe_dir: &std::path::Path,
        lib_dir: &std::path::Path,
        obj_dir: &std::path::Path,
        obj_names: &[String],
        model: &BuildModel,
        config: BuildConfig,
    ) -> IResult<Box<dyn Action>>;

    fn create_shared_lib_link_action(
        &self,
        inputs: LinkInputs,
        shared_dir: &std::path::Path,
        lib_dir: &std::path::Path,
        obj_dir: &std::path::Path,
        obj_names: &[String],
        model: &BuildModel,
        config: BuildConfig,
    ) -> IResult<Box<dyn Action>>;
}

/// Object-file suffix for a toolchain family.
pub fn obj_suffix(family: ToolFamily) -> &'static str {
    if family.is_msvc() {
        ".obj"
    } else {
        ".o"
    }
}

/// Searches `PATH` for an executable named `name` (plus the platform's
/// executable suffix on Windows), the way a shell would.
pub fn which(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let exe_suffix = if cfg!(windows) { ".exe" } else { "" };
    let candidate_name = if name.ends_with(exe_suffix) || exe_suffix.is_empty() {
        name.to_owned()
    } else {
        format!("{name}{exe_suffix}")
    };
    std::env::split_paths(&path).map(|dir| dir.join(&candidate_name)).find(|p| p.is_file())
}

/// Checks a previously-recorded `.dep` fingerprint plus every file part of
/// the owning description (§4.3/§8 property 6) and reports freshness.
pub fn is_target_up_to_date(output: &Path, extra_deps: &[PathBuf], project_root: &Path) -> IResult<bool> {
    let dep_path = output.with_extension("dep");
    let mut inputs = extra_deps.to_vec();
    if dep_path.is_file() {
        inputs.extend(DepInfo::read(&dep_path)?.inputs.into_iter().map(|p| project_root.join(p)));
    }
    let fp = Fingerprint::new(output.to_path_buf(), inputs);
    Ok(fp.check()? == Freshness::Fresh)
}

/// Filters a compiler-reported dependency list down to paths inside the
/// project (§4.3 steps 2-3), stripping the project root's prefix from the
/// ones that are kept so the persisted `.dep` file stays relocatable.
pub(crate) fn filter_to_project_root(candidates: Vec<PathBuf>, project_root: &Path) -> Vec<PathBuf> {
    let root_abs = paths::normalize(project_root);
    let root_str = root_abs.to_string_lossy().into_owned();
    let root_lower = root_str.to_lowercase();
    let mut out = Vec::with_capacity(candidates.len());
    for p in candidates {
        let raw = p.to_string_lossy();
        let abs = if is_path_absolute(&raw) {
            paths::normalize(&p)
        } else {
            match std::env::current_dir() {
                Ok(cwd) => paths::normalize(cwd.join(&p)),
                Err(_) => continue,
            }
        };
        let abs_str = abs.to_string_lossy().into_owned();
        if abs_str.to_lowercase().starts_with(&root_lower) {
            let stripped = abs_str[root_str.len()..].trim_start_matches(['/', '\\']);
            out.push(PathBuf::from(stripped));
        }
    }
    out
}

/// Whether `raw` is absolute under either path convention a compiler might
/// emit, regardless of which OS minibuild itself is running on: a leading
/// slash (Unix), a drive letter (`C:\`), or a UNC prefix (`\\server\share`).
fn is_path_absolute(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
