//! GCC/Clang/MinGW toolset (§4.4), grounded on the upstream `toolset_gcc.py`
//! action classes: one compile action shared by C/C++/assembler-with-cpp,
//! one static-archive action, one link action shared by executables and
//! shared libraries (distinguished by whether an `exe_dir` is given).

use super::{
    cmd, which, Action, ActionResult, Artifact, ArtifactKind, Error, LinkInputs, SourceKind, Toolset,
};
use crate::core::{BuildConfig, DepInfo, Fingerprint, Freshness, Module};
use crate::toolchain::ToolFamily;
use crate::utils::{paths, IResult};
use minibuild_platform::BuildModel;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Which flavor of GCC-family compiler drives this toolset: plain
/// GCC/binutils, a MinGW cross toolchain, or Clang (macOS/LLVM conventions
/// for archiving and symbol export differ from GNU binutils).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Gnu,
    Mingw,
    Clang,
}

pub struct GccTools {
    flavor: Flavor,
    cc: PathBuf,
    cxx: PathBuf,
    ar: PathBuf,
    nasm: PathBuf,
}

impl GccTools {
    pub fn discover(flavor_name: &str, bin_prefix: Option<&Path>) -> IResult<Self> {
        let flavor = match flavor_name {
            "clang" => Flavor::Clang,
            "mingw" => Flavor::Mingw,
            "gcc" => Flavor::Gnu,
            other => anyhow::bail!("unknown gcc-family toolset flavor `{other}`"),
        };
        let (cc_name, cxx_name, ar_name) = match flavor {
            Flavor::Clang => ("clang", "clang++", "libtool"),
            _ => ("gcc", "g++", "ar"),
        };
        let resolve = |name: &str| -> PathBuf {
            match bin_prefix {
                Some(dir) => dir.join(name),
                None => which(name).unwrap_or_else(|| PathBuf::from(name)),
            }
        };
        Ok(GccTools { flavor, cc: resolve(cc_name), cxx: resolve(cxx_name), ar: resolve(ar_name), nasm: resolve("nasm") })
    }

    fn is_mingw(&self) -> bool {
        self.flavor == Flavor::Mingw
    }

    fn is_clang(&self) -> bool {
        self.flavor == Flavor::Clang
    }
}

pub struct GccToolset {
    name: String,
    tools: GccTools,
}

impl GccToolset {
    pub fn new(name: impl Into<String>, tools: GccTools) -> Self {
        GccToolset { name: name.into(), tools }
    }
}

impl Toolset for GccToolset {
    fn toolset_name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ToolFamily {
        if self.tools.is_clang() {
            ToolFamily::Clang
        } else {
            ToolFamily::Gnu
        }
    }

    fn create_c_action(
        &self,
        module: &Module,
        source: PathBuf,
        obj_dir: &Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &Path,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(CompileAction::new(&self.tools, module, source, SourceKind::C, obj_dir, obj_name, model, config, project_root)))
    }

    fn create_cpp_action(
        &self,
        module: &Module,
        source: PathBuf,
        obj_dir: &Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &Path,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(CompileAction::new(&self.tools, module, source, SourceKind::Cpp, obj_dir, obj_name, model, config, project_root)))
    }

    fn create_asm_action(
        &self,
        module: &Module,
        source: PathBuf,
        obj_dir: &Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &Path,
    ) -> IResult<Box<dyn Action>> {
        if module.nasm {
            if !self.tools.nasm.is_file() && which("nasm").is_none() {
                anyhow::bail!(
                    "NASM is required to compile `{}` but `{}` was not found",
                    source.display(),
                    self.tools.nasm.display()
                );
            }
            Ok(Box::new(super::nasm::NasmAction::new(self.tools.nasm.clone(), module, source, obj_dir, obj_name, model, config, project_root)))
        } else {
            Ok(Box::new(CompileAction::new(&self.tools, module, source, SourceKind::Asm, obj_dir, obj_name, model, config, project_root)))
        }
    }

    fn create_static_lib_action(
        &self,
        module: &Module,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        _model: &BuildModel,
        _config: BuildConfig,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(StaticLibAction::new(&self.tools, module, lib_dir, obj_dir, obj_names)))
    }

    fn create_exe_link_action(
        &self,
        inputs: LinkInputs,
        exe_dir: &Path,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        model: &BuildModel,
        _config: BuildConfig,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(LinkAction::new(&self.tools, inputs, Some(exe_dir), lib_dir, obj_dir, obj_names, model)))
    }

    fn create_shared_lib_link_action(
        &self,
        inputs: LinkInputs,
        shared_dir: &Path,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        model: &BuildModel,
        _config: BuildConfig,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(LinkAction::new(&self.tools, inputs, None, lib_dir, obj_dir, obj_names, model)))
    }
}

/// Parses a GCC `-MD`-style `.d` file into the dependency list
/// `DepInfo` expects, dropping the output/primary-source tokens the
/// compiler always emits first, and keeping only the entries that fall
/// inside `project_root` (§4.3 steps 2-3). Shared with the NASM action,
/// which emits the same format via its own `-MD`.
pub(crate) fn parse_gnu_depfile(deptmp_path: &Path, _obj_path: &Path, project_root: &Path) -> IResult<Vec<PathBuf>> {
    let data = paths::read_string(deptmp_path)?;
    let mut paths_out = Vec::new();
    let mut index = 0usize;
    for token in data.split_whitespace() {
        let token = token.trim_end_matches('\\');
        if token.is_empty() || token.ends_with(':') {
            continue;
        }
        if index > 1 {
            paths_out.push(PathBuf::from(token));
        }
        index += 1;
    }
    Ok(super::filter_to_project_root(paths_out, project_root))
}

struct CompileAction {
    compiler: PathBuf,
    kind: SourceKind,
    source: PathBuf,
    obj_path: PathBuf,
    dep_path: PathBuf,
    deptmp_path: PathBuf,
    arch_flags: Vec<String>,
    symbol_visibility_default: bool,
    config: BuildConfig,
    includes: Vec<PathBuf>,
    definitions: Vec<(String, Option<String>)>,
    disabled_warnings: Vec<String>,
    is_mingw: bool,
    extra_deps: Vec<PathBuf>,
    project_root: PathBuf,
}

impl CompileAction {
    fn new(
        tools: &GccTools,
        module: &Module,
        source: PathBuf,
        kind: SourceKind,
        obj_dir: &Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &Path,
    ) -> Self {
        let compiler = match kind {
            SourceKind::C => tools.cc.clone(),
            SourceKind::Cpp | SourceKind::Asm => tools.cxx.clone(),
        };
        let (includes, definitions): (Vec<PathBuf>, Vec<(String, Option<String>)>) = match kind {
            SourceKind::Asm => (module.asm_includes.clone(), module.asm_defines.clone()),
            _ => (
                module.includes.iter().map(|p| (**p).clone()).collect(),
                module.defines.iter().map(|d| (**d).clone()).collect(),
            ),
        };
        let disabled_warnings = if matches!(kind, SourceKind::Asm) { Vec::new() } else { module.disabled_warnings.clone() };
        let mut extra_deps = module.description_files.clone();
        extra_deps.push(source.clone());
        CompileAction {
            compiler,
            kind,
            source,
            obj_path: obj_dir.join(format!("{obj_name}.o")),
            dep_path: obj_dir.join(format!("{obj_name}.dep")),
            deptmp_path: obj_dir.join(format!("{obj_name}.deptmp")),
            arch_flags: model.arch_compile_flags().to_vec(),
            symbol_visibility_default: module.symbol_visibility_default,
            config,
            includes,
            definitions,
            disabled_warnings,
            is_mingw: tools.is_mingw(),
            extra_deps,
            project_root: project_root.to_path_buf(),
        }
    }
}

impl Action for CompileAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let artifact = Artifact { kind: ArtifactKind::Lib, path: self.obj_path.clone(), is_executable: false };
        if !force && super::is_target_up_to_date(&self.obj_path, &self.extra_deps, &self.project_root)? {
            if verbose {
                println!("BUILDSYS: up-to-date: {}", self.source.display());
            }
            return Ok(ActionResult { rebuilt: false, artifacts: vec![artifact] });
        }

        let _ = std::fs::remove_file(&self.deptmp_path);

        let mut argv = vec!["-Werror-implicit-function-declaration".to_owned()];
        argv.extend(self.arch_flags.iter().cloned());

        argv.push("-x".to_owned());
        argv.push(
            match self.kind {
                SourceKind::Cpp => "c++",
                SourceKind::C => "c",
                SourceKind::Asm => "assembler-with-cpp",
            }
            .to_owned(),
        );

        if !self.is_mingw {
            argv.push("-fpic".to_owned());
            argv.push("-fstack-protector".to_owned());
        }
        if !self.symbol_visibility_default {
            argv.push("-fvisibility=hidden".to_owned());
        }
        argv.push("-Wall".to_owned());
        argv.push("-MD".to_owned());
        argv.push("-MF".to_owned());
        argv.push(self.deptmp_path.display().to_string());

        for wd in &self.disabled_warnings {
            argv.push(format!("-Wno-{wd}"));
        }

        match self.config {
            BuildConfig::Release => argv.push("-O3".to_owned()),
            BuildConfig::Debug => {
                argv.push("-O0".to_owned());
                argv.push("-g".to_owned());
            }
        }

        for incd in &self.includes {
            argv.push(format!("-I{}", incd.display()));
        }
        for (name, value) in &self.definitions {
            match value {
                Some(v) => argv.push(format!("-D{name}={v}")),
                None => argv.push(format!("-D{name}")),
            }
        }

        argv.push("-c".to_owned());
        argv.push("-o".to_owned());
        argv.push(self.obj_path.display().to_string());
        argv.push(self.source.display().to_string());

        if verbose {
            println!("BUILDSYS: EXEC: {} {}", self.compiler.display(), argv.join(" "));
        }
        println!("{}", self.source.file_name().and_then(|n| n.to_str()).unwrap_or_default());

        let mut command = Command::new(&self.compiler);
        command.args(&argv);
        let mut child = cmd::run(&mut command, "gcc")?;
        let status = cmd::wait_child(&command, "gcc", &mut child)?;
        cmd::verify_status(&command, "gcc", status)?;

        let deps = parse_gnu_depfile(&self.deptmp_path, &self.obj_path, &self.project_root)?;
        DepInfo::new(deps.clone()).write(&self.dep_path)?;
        let _ = std::fs::remove_file(&self.deptmp_path);

        let mut fp_inputs = self.extra_deps.clone();
        fp_inputs.extend(deps.into_iter().map(|p| self.project_root.join(p)));
        let fp = Fingerprint::new(self.obj_path.clone(), fp_inputs);
        fp.persist()?;
        debug_assert_eq!(fp.check()?, Freshness::Fresh);

        Ok(ActionResult { rebuilt: true, artifacts: vec![artifact] })
    }
}

struct StaticLibAction {
    ar: PathBuf,
    is_clang: bool,
    module_name: String,
    rsp_file: PathBuf,
    outlib_path: PathBuf,
    obj_list: Vec<PathBuf>,
    extra_deps: Vec<PathBuf>,
}

impl StaticLibAction {
    fn new(tools: &GccTools, module: &Module, lib_dir: &Path, obj_dir: &Path, obj_names: &[String]) -> Self {
        let module_name = module.id.name().as_str().to_owned();
        let obj_list = obj_names.iter().map(|n| obj_dir.join(format!("{n}.o"))).collect();
        StaticLibAction {
            ar: tools.ar.clone(),
            is_clang: tools.is_clang(),
            rsp_file: obj_dir.join(format!("{module_name}.rsplnk")),
            outlib_path: lib_dir.join(format!("lib{module_name}.a")),
            obj_list,
            extra_deps: module.description_files.clone(),
            module_name,
        }
    }
}

impl Action for StaticLibAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let artifact = Artifact { kind: ArtifactKind::Lib, path: self.outlib_path.clone(), is_executable: false };
        let mut primary_deps = self.obj_list.clone();
        primary_deps.extend(self.extra_deps.iter().cloned());
        if !force && super::is_target_up_to_date(&self.outlib_path, &primary_deps, Path::new(""))? {
            if verbose {
                println!("BUILDSYS: up-to-date: '{}', lib: {}", self.module_name, self.outlib_path.display());
            }
            return Ok(ActionResult { rebuilt: false, artifacts: vec![artifact] });
        }

        println!("BUILDSYS: Create LIB module '{}' ...", self.module_name);
        paths::create_dir_all(self.outlib_path.parent().unwrap())?;

        let argv: Vec<String> = if self.is_clang {
            let mut body = String::new();
            for entry in &self.obj_list {
                body.push_str(&entry.display().to_string());
                body.push('\n');
            }
            paths::write(&self.rsp_file, body.as_bytes())?;
            vec!["-static".to_owned(), "-filelist".to_owned(), self.rsp_file.display().to_string(), "-o".to_owned(), self.outlib_path.display().to_string()]
        } else {
            let mut plain = vec!["ru".to_owned(), self.outlib_path.display().to_string()];
            plain.extend(self.obj_list.iter().map(|p| p.display().to_string()));
            super::argv_to_rsp(&plain, &self.rsp_file)?
        };

        if verbose {
            println!("BUILDSYS: EXEC: {} {}", self.ar.display(), argv.join(" "));
        }
        let mut command = Command::new(&self.ar);
        command.args(&argv);
        let mut child = cmd::run(&mut command, "ar")?;
        let status = cmd::wait_child(&command, "ar", &mut child)?;
        cmd::verify_status(&command, "ar", status)?;

        let fp = Fingerprint::new(self.outlib_path.clone(), primary_deps);
        fp.persist()?;

        Ok(ActionResult { rebuilt: true, artifacts: vec![artifact] })
    }
}

struct LinkAction {
    cxx: PathBuf,
    is_mingw: bool,
    is_clang: bool,
    is_dll: bool,
    module_name: String,
    bin_basename: String,
    link_dir: PathBuf,
    private_dir: PathBuf,
    bin_path_public: PathBuf,
    bin_path_private: PathBuf,
    rsp_file: PathBuf,
    obj_list: Vec<PathBuf>,
    arch_flags: Vec<String>,
    win_console: bool,
    win_stack_size: Option<u64>,
    use_wmain: bool,
    macosx_framework_list: Vec<String>,
    macosx_install_name_options: Vec<String>,
    export_def_file: Option<PathBuf>,
    export: Vec<String>,
    export_winapi_only: Vec<String>,
    static_lib_dir: PathBuf,
    static_deps: Vec<String>,
    shared_lib_dir: PathBuf,
    shared_deps: Vec<String>,
    extra_deps: Vec<PathBuf>,
}

impl LinkAction {
    fn new(
        tools: &GccTools,
        inputs: LinkInputs,
        exe_dir: Option<&Path>,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        model: &BuildModel,
    ) -> Self {
        let module = inputs.module;
        let is_dll = exe_dir.is_none();
        let private_dir = obj_dir.join("raw");
        let link_dir = exe_dir.map(Path::to_path_buf).unwrap_or_else(|| lib_dir.to_path_buf());
        let module_name = module.id.name().as_str().to_owned();

        let bin_basename = if is_dll {
            if tools.is_mingw() {
                format!("{module_name}.dll")
            } else {
                format!("lib{module_name}.so")
            }
        } else if tools.is_mingw() {
            format!("{module_name}.exe")
        } else {
            module_name.clone()
        };

        let obj_list = obj_names.iter().map(|n| obj_dir.join(format!("{n}.o"))).collect();

        let static_deps = module_dep_names(&inputs.static_deps);
        let shared_deps = module_dep_names(&inputs.shared_deps);

        LinkAction {
            cxx: tools.cxx.clone(),
            is_mingw: tools.is_mingw(),
            is_clang: tools.is_clang(),
            is_dll,
            rsp_file: private_dir.join(format!("{module_name}.rsplnk")),
            bin_path_public: link_dir.join(&bin_basename),
            bin_path_private: private_dir.join(&bin_basename),
            link_dir,
            private_dir,
            bin_basename,
            obj_list,
            arch_flags: model.arch_compile_flags().to_vec(),
            win_console: tools.is_mingw() && module.win_console,
            win_stack_size: module.win_stack_size,
            use_wmain: module.wmain,
            macosx_framework_list: module.macosx_framework_list.clone(),
            macosx_install_name_options: module.macosx_install_name_options.clone(),
            export_def_file: module.export_def_file.clone(),
            export: module.export.clone(),
            export_winapi_only: module.export_winapi_only.clone(),
            static_lib_dir: lib_dir.to_path_buf(),
            static_deps,
            shared_lib_dir: lib_dir.to_path_buf(),
            shared_deps,
            extra_deps: module.description_files.clone(),
            module_name,
        }
    }
}

fn module_dep_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
        .map(|s| s.trim_start_matches("lib").to_owned())
        .collect()
}

impl Action for LinkAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let kind = if self.is_dll { ArtifactKind::Dll } else { ArtifactKind::Exe };
        let is_executable = !self.is_dll && !self.is_mingw;
        let artifact = Artifact { kind, path: self.bin_path_public.clone(), is_executable };

        let mut primary_deps = self.obj_list.clone();
        primary_deps.extend(self.extra_deps.iter().cloned());
        if !force && super::is_target_up_to_date(&self.bin_path_public, &primary_deps, Path::new(""))? {
            let mod_type = if self.is_dll { "DLL" } else { "EXE" };
            println!("BUILDSYS: up-to-date: '{}', {}: {}", self.module_name, mod_type, self.bin_path_public.display());
            return Ok(ActionResult { rebuilt: false, artifacts: vec![artifact] });
        }

        let mod_type = if self.is_dll { "DLL" } else { "EXE" };
        println!("BUILDSYS: Link {} module '{}' ...", mod_type, self.module_name);
        paths::create_dir_all(&self.private_dir)?;
        paths::create_dir_all(&self.link_dir)?;

        let mut argv = Vec::new();
        argv.extend(self.arch_flags.iter().cloned());

        if self.is_dll {
            argv.push("-shared".to_owned());
            if !self.is_clang {
                argv.push("-Wl,--no-undefined".to_owned());
            }
            if !self.export.is_empty() || self.export_def_file.is_some() {
                let export_map_file = self.private_dir.join("symbols.map");
                let export_list = self.resolve_export_list()?;
                if self.is_clang {
                    let mut body = String::new();
                    for sym in &export_list {
                        body.push('_');
                        body.push_str(sym);
                        body.push('\n');
                    }
                    paths::write(&export_map_file, body.as_bytes())?;
                    argv.push(format!("-Wl,-exported_symbols_list,{}", export_map_file.display()));
                } else {
                    let mut body = String::from("{\n    global:\n");
                    for sym in &export_list {
                        body.push_str(&format!("        {sym};\n"));
                    }
                    body.push_str("\n    local: *;\n};\n");
                    paths::write(&export_map_file, body.as_bytes())?;
                    argv.push(format!("-Wl,--version-script={}", export_map_file.display()));
                }
            }
        } else if self.is_mingw {
            argv.push(if self.win_console { "-Wl,-subsystem,console".to_owned() } else { "-Wl,-subsystem,windows".to_owned() });
            if self.use_wmain {
                argv.push("-municode".to_owned());
            }
            if let Some(size) = self.win_stack_size {
                argv.push(format!("-Wl,--stack,{size}"));
            }
        } else if !self.is_clang {
            argv.push("-pie".to_owned());
        }

        if !self.is_mingw && !self.is_clang {
            argv.push("-Wl,-z,noexecstack".to_owned());
        }
        if !self.is_clang {
            argv.push("-Wl,--as-needed".to_owned());
        }

        argv.push("-o".to_owned());
        argv.push(self.bin_path_private.display().to_string());

        if self.is_dll && self.is_mingw {
            if let Some(def) = &self.export_def_file {
                argv.push(def.display().to_string());
            }
        }

        argv.extend(self.obj_list.iter().map(|p| p.display().to_string()));

        let wrap_in_group = !self.is_clang && (!self.static_deps.is_empty() || !self.shared_deps.is_empty());
        if wrap_in_group {
            argv.push("-Wl,--start-group".to_owned());
        }
        if !self.static_deps.is_empty() {
            argv.push(format!("-L{}", self.static_lib_dir.display()));
            argv.extend(self.static_deps.iter().map(|n| format!("-l{n}")));
        }
        if !self.shared_deps.is_empty() {
            argv.push(format!("-L{}", self.shared_lib_dir.display()));
            argv.extend(self.shared_deps.iter().map(|n| format!("-l{n}")));
        }
        if wrap_in_group {
            argv.push("-Wl,--end-group".to_owned());
        }

        if self.is_clang {
            argv.push(format!("-Wl,-install_name,{}", self.bin_basename));
        }
        for framework in &self.macosx_framework_list {
            argv.push("-framework".to_owned());
            argv.push(framework.clone());
        }

        let argv = super::argv_to_rsp(&argv, &self.rsp_file)?;
        if verbose {
            println!("BUILDSYS: EXEC: {} {}", self.cxx.display(), argv.join(" "));
        }
        let mut command = Command::new(&self.cxx);
        command.args(&argv);
        let mut child = cmd::run(&mut command, "g++")?;
        let status = cmd::wait_child(&command, "g++", &mut child)?;
        cmd::verify_status(&command, "g++", status)?;

        if !self.macosx_install_name_options.is_empty() {
            let mut ic = Command::new("install_name_tool");
            ic.args(&self.macosx_install_name_options);
            ic.arg(&self.bin_path_private);
            let status = cmd::run(&mut ic, "install_name_tool")?.wait().map_err(|e| Error::tool_exec(e.to_string()))?;
            cmd::verify_status(&ic, "install_name_tool", status)?;
        }

        paths::create_dir_all(self.bin_path_public.parent().unwrap())?;
        std::fs::rename(&self.bin_path_private, &self.bin_path_public)?;

        let fp = Fingerprint::new(self.bin_path_public.clone(), primary_deps);
        fp.persist()?;

        Ok(ActionResult { rebuilt: true, artifacts: vec![artifact] })
    }
}

impl LinkAction {
    fn resolve_export_list(&self) -> IResult<Vec<String>> {
        let mut list = Vec::new();
        if let Some(def_file) = &self.export_def_file {
            list.extend(load_export_list_from_def_file(def_file, &self.export_winapi_only, self.is_mingw)?);
        }
        for sym in &self.export {
            if !self.export_winapi_only.is_empty() && !self.is_mingw && self.export_winapi_only.contains(sym) {
                continue;
            }
            list.push(sym.clone());
        }
        Ok(list)
    }
}

/// Reads the `EXPORTS` section of a Windows `.def` file (§4.4 DLL export
/// handling), filtering out WinAPI-only symbols for non-MinGW targets.
fn load_export_list_from_def_file(def_file: &Path, winapi_only: &[String], for_winapi: bool) -> IResult<Vec<String>> {
    let content = paths::read_string(def_file)?;
    let mut export_section_found = false;
    let mut inside_export = false;
    let mut export_list = Vec::new();
    for raw_line in content.lines() {
        let text = raw_line.trim_start();
        if text.is_empty() || text.starts_with(';') {
            continue;
        }
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let line_is_keyword = raw_line.len() == text.len();
        if line_is_keyword {
            if inside_export {
                inside_export = false;
            } else if tokens.len() == 1 && tokens[0] == "EXPORTS" {
                if export_section_found {
                    anyhow::bail!("'EXPORTS' section found more than once inside DEF file: '{}'", def_file.display());
                }
                export_section_found = true;
                inside_export = true;
            }
            continue;
        }
        if inside_export {
            if let Some(symbol) = tokens.first() {
                if !symbol.starts_with('@') {
                    let enabled = !(winapi_only.contains(&symbol.to_string()) && !for_winapi);
                    if enabled {
                        export_list.push((*symbol).to_owned());
                    }
                }
            }
        }
    }
    if !export_section_found {
        anyhow::bail!("'EXPORTS' section not found inside DEF file: '{}'", def_file.display());
    }
    if export_list.is_empty() {
        anyhow::bail!("cannot load symbols from 'EXPORTS' section inside DEF file: '{}'", def_file.display());
    }
    Ok(export_list)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_def_file_exports() {
        let dir = tempfile::tempdir().unwrap();
        let def = dir.path().join("exports.def");
        paths::write(&def, b"EXPORTS\n    foo\n    bar\n    @1 baz\n").unwrap();
        let list = load_export_list_from_def_file(&def, &[], false).unwrap();
        assert_eq!(list, vec!["foo".to_owned(), "bar".to_owned()]);
    }

    #[test]
    fn filters_winapi_only_exports_for_non_winapi_targets() {
        let dir = tempfile::tempdir().unwrap();
        let def = dir.path().join("exports.def");
        paths::write(&def, b"EXPORTS\n    foo\n    winapi_sym\n").unwrap();
        let list = load_export_list_from_def_file(&def, &["winapi_sym".to_owned()], false).unwrap();
        assert_eq!(list, vec!["foo".to_owned()]);
    }
}
