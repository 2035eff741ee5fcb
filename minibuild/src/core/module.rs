use crate::core::{Layout, ModuleId, PublicPrivate};
use crate::utils::InternedString;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The kind of artifact a module produces, taken from its `module_type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Exe,
    LibStatic,
    LibShared,
}

impl ModuleKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "executable" | "app-exe" | "exe" => Some(Self::Exe),
            "lib-static" => Some(Self::LibStatic),
            "lib-shared" | "dll" => Some(Self::LibShared),
            _ => None,
        }
    }
}

/// A single compilable source file, tagged by the language it's compiled as.
#[derive(Debug, Clone)]
pub enum Source {
    Cpp(PathBuf),
    C(PathBuf),
    Asm(PathBuf),
}

impl Source {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Source::Cpp(p) | Source::C(p) | Source::Asm(p) => p,
        }
    }

    /// Classifies a source file by its extension (§4.6 step 4): `.cpp`/
    /// `.cc`/`.cxx` compile as C++, `.c` as C, `.s`/`.asm`/`.S` as assembly.
    /// Unrecognized extensions are rejected rather than silently skipped -
    /// an entry in `build_list` is always meant to produce an object.
    pub fn classify(path: PathBuf) -> crate::utils::IResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "cpp" | "cc" | "cxx" => Ok(Source::Cpp(path)),
            "c" => Ok(Source::C(path)),
            "s" | "asm" => Ok(Source::Asm(path)),
            other => anyhow::bail!("`{}` has unrecognized source extension `{other}`", path.display()),
        }
    }
}

#[derive(Clone)]
pub struct Module(Arc<ModuleInner>);

pub struct ModuleInner {
    pub id: ModuleId,
    pub kind: ModuleKind,
    /// Final artifact basename, from `exe_name`/`module_name` - defaults to
    /// the module's directory-derived name when not set explicitly.
    pub output_name: String,
    pub sources: Vec<Source>,
    pub includes: Vec<PublicPrivate<PathBuf>>,
    pub asm_includes: Vec<PathBuf>,
    pub defines: Vec<PublicPrivate<(String, Option<String>)>>,
    pub asm_defines: Vec<(String, Option<String>)>,
    /// Internal module dependencies, resolved by name against the project's
    /// module map (i.e. entries from `lib_list`/`build_list` that refer to
    /// another module in this project).
    pub depends: Vec<PublicPrivate<InternedString>>,
    /// External, prebuilt libraries to link against (`prebuilt_lib_list`),
    /// never part of the dependency graph's cycle detection.
    pub prebuilt_libs: Vec<PathBuf>,
    pub win_console: bool,
    pub win_stack_size: Option<u64>,
    pub wmain: bool,
    pub symbol_visibility_default: bool,
    pub nasm: bool,
    pub disabled_warnings: Vec<String>,
    pub explicit_depends: Vec<PathBuf>,
    pub post_build: Option<Extension>,
    /// DLL-only: explicit export surface, from `export_def_file`/`export`/
    /// `export_winapi_only`. Ignored for executables and static libraries.
    pub export_def_file: Option<PathBuf>,
    pub export: Vec<String>,
    pub export_winapi_only: Vec<String>,
    pub macosx_framework_list: Vec<String>,
    pub macosx_install_name_options: Vec<String>,
    /// Absolute path to the `minibuild.mk` describing this module, plus any
    /// spliced `#include`d files - used to invalidate the fingerprint when
    /// the description itself changes.
    pub description_files: Vec<PathBuf>,
}

/// One resolved `lib_list` entry: a sibling module's name plus whether its
/// artifacts should propagate to anything that in turn depends on *this*
/// module. Static-lib dependencies are always public (§8 property 6 needs
/// `C -> B -> A` to link `A` into `C` even though `C` never names `A`
/// directly); the grammar has no syntax for a private dependency, so
/// [`Module::from_description`] always constructs these as public.
pub struct ResolvedDep {
    pub name: InternedString,
    pub public: bool,
}

impl Module {
    pub fn new(inner: ModuleInner) -> Self {
        Self(Arc::new(inner))
    }

    /// Builds a [`Module`] from a loaded, validated [`BuildDescription`]
    /// (§3/§4.1): resolves the platform/arch-refined build list into
    /// classified sources, the include/definition lists, and the
    /// already-resolved sibling dependency names the caller looked up by
    /// walking `lib_list` directories (§4.6 step 2).
    pub fn from_description(
        desc: &crate::description::BuildDescription,
        platform: crate::grammar::Platform,
        arch: crate::grammar::Arch,
        depends: Vec<ResolvedDep>,
    ) -> crate::utils::IResult<Module> {
        let module_type = desc.str("module_type").unwrap_or_default();
        let kind = ModuleKind::from_tag(module_type)
            .ok_or_else(|| anyhow::anyhow!("module kind `{module_type}` is not part of the core build graph"))?;
        let module_name = desc.str("module_name").unwrap_or_default().to_owned();
        let dir = desc.dirname.clone();
        let id = ModuleId::new(module_name.clone(), dir);

        let output_name = match kind {
            ModuleKind::Exe => desc.str("exe_name").map(str::to_owned).unwrap_or_else(|| module_name.clone()),
            ModuleKind::LibStatic | ModuleKind::LibShared => module_name.clone(),
        };

        let sources = desc
            .refined_list("build_list", platform, arch)
            .into_iter()
            .map(|name| Source::classify(desc.dirname.join(name)))
            .collect::<crate::utils::IResult<Vec<_>>>()?;

        let includes = desc
            .refined_list("include_dir_list", platform, arch)
            .into_iter()
            .map(|p| PublicPrivate::public(PathBuf::from(p)))
            .collect();
        let asm_includes =
            desc.refined_list("asm_include_dir_list", platform, arch).into_iter().map(PathBuf::from).collect();

        let defines = desc
            .refined_list("definitions", platform, arch)
            .into_iter()
            .map(|d| PublicPrivate::public(split_define(&d)))
            .collect();
        let asm_defines =
            desc.refined_list("asm_definitions", platform, arch).into_iter().map(|d| split_define(&d)).collect();

        let prebuilt_libs =
            desc.refined_list("prebuilt_lib_list", platform, arch).into_iter().map(PathBuf::from).collect();

        let depends = depends.into_iter().map(|d| if d.public { PublicPrivate::public(d.name) } else { PublicPrivate::private(d.name) }).collect();

        let post_build = resolve_extension(desc, "post_build")?;

        Ok(Module::new(ModuleInner {
            id,
            kind,
            output_name,
            sources,
            includes,
            asm_includes,
            defines,
            asm_defines,
            depends,
            prebuilt_libs,
            win_console: bool_field(desc, "win_console"),
            win_stack_size: desc.get("win_stack_size").and_then(crate::description::Value::as_int).map(|n| n as u64),
            wmain: bool_field(desc, "wmain"),
            symbol_visibility_default: bool_field(desc, "symbol_visibility_default"),
            nasm: bool_field(desc, "nasm"),
            disabled_warnings: desc.list("disabled_warnings"),
            explicit_depends: desc.list("explicit_depends").into_iter().map(PathBuf::from).collect(),
            post_build,
            export_def_file: desc.str("export_def_file").map(PathBuf::from),
            export: desc.list("export"),
            export_winapi_only: desc.list("export_winapi_only"),
            macosx_framework_list: desc.list("macosx_framework_list"),
            macosx_install_name_options: desc.list("macosx_install_name_options"),
            description_files: desc.file_parts.clone(),
        }))
    }

    pub fn output_path(&self, layout: &Layout) -> PathBuf {
        match self.kind {
            ModuleKind::Exe => layout.exe_dir().join(&self.output_name),
            ModuleKind::LibStatic => layout.lib_dir().join(&self.output_name),
            ModuleKind::LibShared => layout.shared_dir().join(&self.output_name),
        }
    }

    pub fn for_each_dep<F: FnMut(InternedString, bool)>(&self, mut f: F) {
        for dep in &self.depends {
            f(**dep, dep.is_public());
        }
    }
}

impl std::ops::Deref for Module {
    type Target = ModuleInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Module {}
impl std::hash::Hash for Module {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// A `minibuild.ext` extension invocation: an external command run either
/// standalone or as a module's `post_build` hook.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub native_depends: bool,
    pub required_vars: Vec<String>,
}

impl Extension {
    /// Builds an [`Extension`] from an imported `minibuild.ext` description:
    /// `ext_call_cmdline` is split on whitespace into a program plus raw
    /// argv template (variable substitution happens at invocation time,
    /// §4.7, once the module's object/source directories are known).
    pub fn from_description(desc: &crate::description::BuildDescription) -> crate::utils::IResult<Self> {
        let name = desc.str("ext_name").unwrap_or_default().to_owned();
        let cmdline = desc.str("ext_call_cmdline").unwrap_or_default();
        let mut parts = cmdline.split_whitespace();
        let program = parts
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("extension `{name}` has an empty `ext_call_cmdline`"))?;
        let args = parts.map(str::to_owned).collect();
        let native_depends = !desc.list("ext_native_depends").is_empty();
        let mut required_vars = desc.list("ext_vars_required");
        required_vars.extend(desc.list("ext_local_vars_required"));
        Ok(Extension { name, program, args, native_depends, required_vars })
    }
}

/// Resolves a module's `post_build`/`spec_post_build` key (an `ext_name`)
/// against the extensions it imported via `#import` (§4.1 step 11).
fn resolve_extension(desc: &crate::description::BuildDescription, key: &str) -> crate::utils::IResult<Option<Extension>> {
    match desc.str(key) {
        None => Ok(None),
        Some(name) => {
            let ext_desc = desc
                .find_extension(name)
                .ok_or_else(|| anyhow::anyhow!("`{key}` names extension `{name}`, which was never `#import`ed"))?;
            Ok(Some(Extension::from_description(ext_desc)?))
        }
    }
}

fn bool_field(desc: &crate::description::BuildDescription, key: &str) -> bool {
    desc.get(key).and_then(crate::description::Value::as_bool).unwrap_or(false)
}

/// Splits a `definitions` entry (`"NAME"` or `"NAME=VALUE"`) the way every
/// toolchain's compile action expects its `(name, value)` pairs.
fn split_define(entry: &str) -> (String, Option<String>) {
    match entry.split_once('=') {
        Some((name, value)) => (name.to_owned(), Some(value.to_owned())),
        None => (entry.to_owned(), None),
    }
}

/// All modules discovered under a project root, keyed by their declared
/// name. Names must be unique within one project - the description loader
/// rejects a duplicate before this map is built.
#[derive(Default)]
pub struct ModuleMap {
    by_name: HashMap<InternedString, Module>,
}

impl ModuleMap {
    pub fn insert(&mut self, module: Module) {
        self.by_name.insert(module.id.name(), module);
    }

    pub fn get(&self, name: InternedString) -> Option<&Module> {
        self.by_name.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}
