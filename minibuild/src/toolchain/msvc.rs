//! MSVC toolset (§4.4), grounded on the upstream `toolset_msvs.py` action
//! classes: `cl.exe` compiles, `lib.exe` archives, `link.exe` links and
//! `mt.exe` embeds the resulting manifest. ML/ML64 assembly is out of this
//! crate's scope (no NASM-equivalent MASM action is built; `nasm: True`
//! modules still route through [`super::nasm`]).

use super::bootstrap::EnvPatch;
use super::{cmd, Action, ActionResult, Artifact, ArtifactKind, Error, LinkInputs, SourceKind, Toolset, ToolFamily};
use crate::core::{BuildConfig, DepInfo, Fingerprint, Freshness, Module};
use crate::utils::{paths, IResult};
use minibuild_platform::BuildModel;
use std::path::{Path, PathBuf};
use std::process::Command;

const DEP_MARK: &str = "Note: including file:";

pub struct MsvcTools {
    pub cl: PathBuf,
    pub link: PathBuf,
    pub lib: PathBuf,
    pub mt: PathBuf,
    pub env: EnvPatch,
}

pub struct MsvcToolset {
    name: String,
    tools: MsvcTools,
}

impl MsvcToolset {
    pub fn new(name: impl Into<String>, tools: MsvcTools) -> Self {
        MsvcToolset { name: name.into(), tools }
    }

    fn command(&self, exe: &Path) -> Command {
        let mut cmd = Command::new(exe);
        self.tools.env.apply(&mut cmd);
        cmd
    }
}

impl Toolset for MsvcToolset {
    fn toolset_name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ToolFamily {
        ToolFamily::Msvc
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
        Ok(Box::new(ClAction::new(self.command(&self.tools.cl), module, source, SourceKind::C, obj_dir, obj_name, model, config, project_root)))
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
        Ok(Box::new(ClAction::new(self.command(&self.tools.cl), module, source, SourceKind::Cpp, obj_dir, obj_name, model, config, project_root)))
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
        if !module.nasm {
            anyhow::bail!(
                "module assembles `{}` without `nasm: True` - MASM (`ml.exe`) sources are not supported, route assembly through NASM",
                source.display()
            );
        }
        Ok(Box::new(super::nasm::NasmAction::new(PathBuf::from("nasm"), module, source, obj_dir, obj_name, model, config, project_root)))
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
        Ok(Box::new(LibAction::new(self.command(&self.tools.lib), module, lib_dir, obj_dir, obj_names)))
    }

    fn create_exe_link_action(
        &self,
        inputs: LinkInputs,
        exe_dir: &Path,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        _model: &BuildModel,
        config: BuildConfig,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(LinkAction::new(
            self.command(&self.tools.link),
            self.command(&self.tools.mt),
            inputs,
            Some(exe_dir),
            lib_dir,
            obj_dir,
            obj_names,
            config,
        )))
    }

    fn create_shared_lib_link_action(
        &self,
        inputs: LinkInputs,
        shared_dir: &Path,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        _model: &BuildModel,
        config: BuildConfig,
    ) -> IResult<Box<dyn Action>> {
        Ok(Box::new(LinkAction::new(
            self.command(&self.tools.link),
            self.command(&self.tools.mt),
            inputs,
            None,
            lib_dir,
            obj_dir,
            obj_names,
            config,
        )))
    }
}

struct ClAction {
    command: Command,
    kind: SourceKind,
    source: PathBuf,
    obj_path: PathBuf,
    pdb_path: PathBuf,
    dep_path: PathBuf,
    config: BuildConfig,
    includes: Vec<PathBuf>,
    definitions: Vec<(String, Option<String>)>,
    disabled_warnings: Vec<String>,
    extra_deps: Vec<PathBuf>,
    project_root: PathBuf,
}

impl ClAction {
    #[allow(clippy::too_many_arguments)]
    fn new(
        command: Command,
        module: &Module,
        source: PathBuf,
        kind: SourceKind,
        obj_dir: &Path,
        obj_name: &str,
        _model: &BuildModel,
        config: BuildConfig,
        project_root: &Path,
    ) -> Self {
        let mut extra_deps = module.description_files.clone();
        extra_deps.push(source.clone());
        ClAction {
            command,
            kind,
            source,
            obj_path: obj_dir.join(format!("{obj_name}.obj")),
            pdb_path: obj_dir.join(format!("{obj_name}.pdb")),
            dep_path: obj_dir.join(format!("{obj_name}.dep")),
            config,
            includes: module.includes.iter().map(|p| (**p).clone()).collect(),
            definitions: module.defines.iter().map(|d| (**d).clone()).collect(),
            disabled_warnings: module.disabled_warnings.clone(),
            extra_deps,
            project_root: project_root.to_path_buf(),
        }
    }
}

impl Action for ClAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let artifact = Artifact { kind: ArtifactKind::Lib, path: self.obj_path.clone(), is_executable: false };
        if !force && super::is_target_up_to_date(&self.obj_path, &self.extra_deps, &self.project_root)? {
            if verbose {
                println!("BUILDSYS: up-to-date: {}", self.source.display());
            }
            return Ok(ActionResult { rebuilt: false, artifacts: vec![artifact] });
        }

        let mut argv = vec!["/c".to_owned(), "/nologo".to_owned(), "/showIncludes".to_owned()];
        match self.kind {
            SourceKind::Cpp => argv.extend(["/TP", "/EHsc", "/GR", "/Zc:forScope", "/Zc:wchar_t"].map(String::from)),
            SourceKind::C => argv.push("/TC".to_owned()),
            SourceKind::Asm => anyhow::bail!("MSVC compile action cannot be used for assembly sources"),
        }

        argv.push("/W3".to_owned());
        argv.push("/we4013".to_owned());
        for wd in &self.disabled_warnings {
            argv.push(format!("/wd{wd}"));
        }

        match self.config {
            BuildConfig::Release => argv.extend(["/O2", "/Ob1", "/Zi", "/MD"].map(String::from)),
            BuildConfig::Debug => argv.extend(["/Od", "/Ob0", "/Zi", "/MDd"].map(String::from)),
        }

        for incd in &self.includes {
            argv.push(format!("/I{}", incd.display()));
        }
        for (name, value) in &self.definitions {
            match value {
                Some(v) => argv.push(format!("/D{name}={v}")),
                None => argv.push(format!("/D{name}")),
            }
        }
        if self.config != BuildConfig::Debug {
            argv.push("/DNDEBUG".to_owned());
        }

        argv.push(format!("/Fo{}", self.obj_path.display()));
        argv.push(format!("/Fd{}", self.pdb_path.display()));
        argv.push(self.source.display().to_string());

        if verbose {
            println!("BUILDSYS: EXEC: cl {}", argv.join(" "));
        }
        let mut command = clone_command(&self.command);
        command.args(&argv);
        let stdout = cmd::run_stdout(&mut command, "cl")?;
        let depends = parse_cl_includes(&String::from_utf8_lossy(&stdout), &self.project_root);
        DepInfo::new(depends.clone()).write(&self.dep_path)?;

        let mut fp_inputs = self.extra_deps.clone();
        fp_inputs.extend(depends.into_iter().map(|p| self.project_root.join(p)));
        let fp = Fingerprint::new(self.obj_path.clone(), fp_inputs);
        fp.persist()?;
        debug_assert_eq!(fp.check()?, Freshness::Fresh);

        Ok(ActionResult { rebuilt: true, artifacts: vec![artifact] })
    }
}

/// Extracts the `/showIncludes`-reported header paths from `cl.exe`'s
/// stdout, echoing every other line through unchanged, and keeps only the
/// entries that fall inside `project_root` (§4.3 steps 2-3).
fn parse_cl_includes(stdout: &str, project_root: &Path) -> Vec<PathBuf> {
    let mut depends = Vec::new();
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix(DEP_MARK) {
            depends.push(PathBuf::from(rest.trim_start()));
        } else {
            println!("{line}");
        }
    }
    super::filter_to_project_root(depends, project_root)
}

/// `Command` has no public `Clone`; this copies the program and environment
/// variable overlay set by [`MsvcToolset::command`] onto a fresh instance so
/// each action invocation can append its own argv without sharing state.
fn clone_command(template: &Command) -> Command {
    let mut cmd = Command::new(template.get_program());
    for (k, v) in template.get_envs() {
        if let Some(v) = v {
            cmd.env(k, v);
        }
    }
    cmd
}

struct LibAction {
    command: Command,
    module_name: String,
    rsp_file: PathBuf,
    outlib_path: PathBuf,
    obj_list: Vec<PathBuf>,
    extra_deps: Vec<PathBuf>,
}

impl LibAction {
    fn new(command: Command, module: &Module, lib_dir: &Path, obj_dir: &Path, obj_names: &[String]) -> Self {
        let module_name = module.id.name().as_str().to_owned();
        LibAction {
            command,
            rsp_file: obj_dir.join(format!("{module_name}.rsplnk")),
            outlib_path: lib_dir.join(format!("{module_name}.lib")),
            obj_list: obj_names.iter().map(|n| obj_dir.join(format!("{n}.obj"))).collect(),
            extra_deps: module.description_files.clone(),
            module_name,
        }
    }
}

impl Action for LibAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let artifact = Artifact { kind: ArtifactKind::Lib, path: self.outlib_path.clone(), is_executable: false };
        let mut primary_deps = self.obj_list.clone();
        primary_deps.extend(self.extra_deps.iter().cloned());
        if !force && super::is_target_up_to_date(&self.outlib_path, &primary_deps, Path::new(""))? {
            println!("BUILDSYS: up-to-date: '{}', LIB: {}", self.module_name, self.outlib_path.display());
            return Ok(ActionResult { rebuilt: false, artifacts: vec![artifact] });
        }

        println!("BUILDSYS: Create LIB module '{}' ...", self.module_name);
        paths::create_dir_all(self.outlib_path.parent().unwrap())?;
        let mut argv = vec!["/nologo".to_owned(), format!("/out:{}", self.outlib_path.display())];
        argv.extend(self.obj_list.iter().map(|p| p.display().to_string()));
        let argv = super::argv_to_rsp(&argv, &self.rsp_file)?;

        if verbose {
            println!("BUILDSYS: EXEC: lib {}", argv.join(" "));
        }
        let mut command = clone_command(&self.command);
        command.args(&argv);
        let mut child = cmd::run(&mut command, "lib")?;
        let status = cmd::wait_child(&command, "lib", &mut child)?;
        cmd::verify_status(&command, "lib", status)?;

        let fp = Fingerprint::new(self.outlib_path.clone(), primary_deps);
        fp.persist()?;

        Ok(ActionResult { rebuilt: true, artifacts: vec![artifact] })
    }
}

struct LinkAction {
    link_command: Command,
    mt_command: Command,
    is_dll: bool,
    module_name: String,
    link_dir: PathBuf,
    private_dir: PathBuf,
    bin_path_public: PathBuf,
    bin_path_private: PathBuf,
    pdb_path_public: PathBuf,
    pdb_path_private: PathBuf,
    implib_path_public: Option<PathBuf>,
    implib_path_private: Option<PathBuf>,
    manifest_stub: PathBuf,
    rsp_file: PathBuf,
    obj_list: Vec<PathBuf>,
    config: BuildConfig,
    win_console: bool,
    win_stack_size: Option<u64>,
    use_wmain: bool,
    export_def_file: Option<PathBuf>,
    export: Vec<String>,
    static_lib_dir: PathBuf,
    static_deps: Vec<String>,
    shared_lib_dir: PathBuf,
    shared_deps: Vec<String>,
    extra_deps: Vec<PathBuf>,
}

impl LinkAction {
    #[allow(clippy::too_many_arguments)]
    fn new(
        link_command: Command,
        mt_command: Command,
        inputs: LinkInputs,
        exe_dir: Option<&Path>,
        lib_dir: &Path,
        obj_dir: &Path,
        obj_names: &[String],
        config: BuildConfig,
    ) -> Self {
        let module = inputs.module;
        let is_dll = exe_dir.is_none();
        let private_dir = obj_dir.join("raw");
        let link_dir = exe_dir.map(Path::to_path_buf).unwrap_or_else(|| lib_dir.to_path_buf());
        let module_name = module.id.name().as_str().to_owned();

        let (bin_basename, pdb_basename, implib_basename) = if is_dll {
            (format!("{module_name}.dll"), format!("{module_name}.pdb"), Some(format!("{module_name}.lib")))
        } else {
            (format!("{module_name}.exe"), format!("{module_name}.pdb"), None)
        };

        LinkAction {
            link_command,
            mt_command,
            is_dll,
            bin_path_public: link_dir.join(&bin_basename),
            bin_path_private: private_dir.join(&bin_basename),
            pdb_path_public: link_dir.join(&pdb_basename),
            pdb_path_private: private_dir.join(&pdb_basename),
            implib_path_public: implib_basename.as_ref().map(|n| link_dir.join(n)),
            implib_path_private: implib_basename.as_ref().map(|n| private_dir.join(n)),
            manifest_stub: private_dir.join(format!("{module_name}.manifest-stub")),
            rsp_file: private_dir.join(format!("{module_name}.rsplnk")),
            obj_list: obj_names.iter().map(|n| obj_dir.join(format!("{n}.obj"))).collect(),
            config,
            win_console: module.win_console,
            win_stack_size: module.win_stack_size,
            use_wmain: module.wmain,
            export_def_file: module.export_def_file.clone(),
            export: module.export.clone(),
            static_lib_dir: lib_dir.to_path_buf(),
            static_deps: module_dep_names(&inputs.static_deps),
            shared_lib_dir: lib_dir.to_path_buf(),
            shared_deps: module_dep_names(&inputs.shared_deps),
            extra_deps: module.description_files.clone(),
            private_dir,
            link_dir,
            module_name,
        }
    }
}

fn module_dep_names(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().filter_map(|p| p.file_stem().and_then(|s| s.to_str())).map(str::to_owned).collect()
}

impl Action for LinkAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let kind = if self.is_dll { ArtifactKind::Dll } else { ArtifactKind::Exe };
        let artifact = Artifact { kind, path: self.bin_path_public.clone(), is_executable: !self.is_dll };

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

        let mut argv = vec!["/nologo".to_owned(), "/incremental:no".to_owned(), "/debug".to_owned(), format!("/pdb:{}", self.pdb_path_private.display())];
        match self.config {
            BuildConfig::Release => argv.push("/OPT:REF,ICF=2".to_owned()),
            BuildConfig::Debug => argv.push("/OPT:NOREF,NOICF".to_owned()),
        }
        argv.push(format!("-out:{}", self.bin_path_private.display()));

        if self.obj_list.is_empty() {
            argv.push("/IGNORE:4001".to_owned());
        } else {
            argv.extend(self.obj_list.iter().map(|p| p.display().to_string()));
        }

        if !self.static_deps.is_empty() {
            argv.push(format!("/libpath:{}", self.static_lib_dir.display()));
            argv.extend(self.static_deps.iter().map(|n| format!("{n}.lib")));
        }
        if !self.shared_deps.is_empty() {
            argv.push(format!("/libpath:{}", self.shared_lib_dir.display()));
            argv.extend(self.shared_deps.iter().map(|n| format!("{n}.lib")));
        }

        argv.push("/manifest".to_owned());
        argv.push(format!("/manifestfile:{}", self.manifest_stub.display()));

        if self.is_dll {
            argv.push("/dll".to_owned());
            if let Some(implib) = &self.implib_path_private {
                argv.push(format!("/implib:{}", implib.display()));
            }
            if let Some(def) = &self.export_def_file {
                argv.push(format!("/def:{}", def.display()));
            }
            for export in &self.export {
                argv.push(format!("/EXPORT:{export}"));
            }
        } else {
            argv.push(if self.win_console { "/subsystem:console".to_owned() } else { "/subsystem:windows".to_owned() });
            if self.use_wmain {
                argv.push("/ENTRY:wmainCRTStartup".to_owned());
            }
            if let Some(size) = self.win_stack_size {
                argv.push(format!("/STACK:{size}"));
            }
        }

        let argv = super::argv_to_rsp(&argv, &self.rsp_file)?;
        if verbose {
            println!("BUILDSYS: EXEC: link {}", argv.join(" "));
        }
        let mut command = clone_command(&self.link_command);
        command.args(&argv);
        let mut child = cmd::run(&mut command, "link")?;
        let status = cmd::wait_child(&command, "link", &mut child)?;
        cmd::verify_status(&command, "link", status)?;

        let manifest_id = if self.is_dll { "2" } else { "1" };
        let manifest_built = self.private_dir.join(format!("{}.manifest", self.module_name));
        let mt_argv = [
            "/nologo".to_owned(),
            "/verbose".to_owned(),
            "/manifest".to_owned(),
            self.manifest_stub.display().to_string(),
            format!("/out:{}", manifest_built.display()),
            format!("/outputresource:{};{}", self.bin_path_private.display(), manifest_id),
        ];
        let mut mt_cmd = clone_command(&self.mt_command);
        mt_cmd.args(&mt_argv);
        let mut child = cmd::run(&mut mt_cmd, "mt")?;
        let status = cmd::wait_child(&mt_cmd, "mt", &mut child)?;
        cmd::verify_status(&mt_cmd, "mt", status)?;

        paths::create_dir_all(self.bin_path_public.parent().unwrap())?;
        std::fs::rename(&self.bin_path_private, &self.bin_path_public)?;
        std::fs::rename(&self.pdb_path_private, &self.pdb_path_public)?;
        if let (Some(private), Some(public)) = (&self.implib_path_private, &self.implib_path_public) {
            std::fs::rename(private, public)?;
        }

        let fp = Fingerprint::new(self.bin_path_public.clone(), primary_deps);
        fp.persist()?;

        Ok(ActionResult { rebuilt: true, artifacts: vec![artifact] })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_showincludes_lines() {
        let stdout = "Note: including file: C:\\proj\\a.h\r\nsrc.c\r\nNote: including file:  C:\\proj\\b.h\r\n";
        let deps = parse_cl_includes(stdout, Path::new("C:\\proj"));
        assert_eq!(deps, vec![PathBuf::from("a.h"), PathBuf::from("b.h")]);
    }
}
