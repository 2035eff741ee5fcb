//! NASM assemble action, shared by every toolchain family - `nasm: True`
//! in a module's description routes its assembly sources here instead of
//! through the compiler driver's `-x assembler-with-cpp` path.

use super::{Action, ActionResult, Artifact, ArtifactKind};
use crate::core::{BuildConfig, DepInfo, Fingerprint, Freshness, Module};
use crate::toolchain::{cmd, Error};
use crate::utils::IResult;
use minibuild_platform::{Arch, BuildModel, Platform};
use std::path::{Path, PathBuf};
use std::process::Command;

fn output_format(platform: Platform, arch: Arch) -> Option<&'static str> {
    match (platform, arch) {
        (Platform::Windows, Arch::X86) => Some("win32"),
        (Platform::Windows, Arch::X86_64) => Some("win64"),
        (Platform::Linux, Arch::X86) => Some("elf32"),
        (Platform::Linux, Arch::X86_64) => Some("elf64"),
        _ => None,
    }
}

pub struct NasmAction {
    nasm: PathBuf,
    source: PathBuf,
    obj_path: PathBuf,
    dep_path: PathBuf,
    deptmp_path: PathBuf,
    includes: Vec<PathBuf>,
    definitions: Vec<(String, Option<String>)>,
    platform: Platform,
    arch: Arch,
    config: BuildConfig,
    extra_deps: Vec<PathBuf>,
    project_root: PathBuf,
}

impl NasmAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nasm: PathBuf,
        module: &Module,
        source: PathBuf,
        obj_dir: &Path,
        obj_name: &str,
        model: &BuildModel,
        config: BuildConfig,
        project_root: &Path,
    ) -> Self {
        let includes = module.asm_includes.clone();
        let definitions = module.asm_defines.clone();
        let mut extra_deps = module.description_files.clone();
        extra_deps.push(source.clone());
        NasmAction {
            nasm,
            source,
            obj_path: obj_dir.join(format!("{obj_name}.o")),
            dep_path: obj_dir.join(format!("{obj_name}.dep")),
            deptmp_path: obj_dir.join(format!("{obj_name}.deptmp")),
            includes,
            definitions,
            platform: model.platform(),
            arch: model.arch(),
            config,
            extra_deps,
            project_root: project_root.to_path_buf(),
        }
    }
}

impl Action for NasmAction {
    fn execute(&self, force: bool, verbose: bool) -> IResult<ActionResult> {
        let artifact = Artifact { kind: ArtifactKind::Lib, path: self.obj_path.clone(), is_executable: false };
        if !force && super::is_target_up_to_date(&self.obj_path, &self.extra_deps, &self.project_root)? {
            if verbose {
                println!("BUILDSYS: up-to-date: {}", self.source.display());
            }
            return Ok(ActionResult { rebuilt: false, artifacts: vec![artifact] });
        }

        let out_format = output_format(self.platform, self.arch)
            .ok_or_else(|| Error::invalid_arch(format!("NASM: unsupported platform/arch for `{}`", self.source.display())))?;

        let mut argv = vec!["-f".to_owned(), out_format.to_owned()];
        if self.config == BuildConfig::Debug {
            argv.push("-g".to_owned());
            if self.platform == Platform::Linux {
                argv.push("-F".to_owned());
                argv.push("dwarf".to_owned());
            }
        }
        for incd in &self.includes {
            argv.push(format!("-I{}{}", incd.display(), std::path::MAIN_SEPARATOR));
        }
        for (name, value) in &self.definitions {
            match value {
                Some(v) => argv.push(format!("-D{name}={v}")),
                None => argv.push(format!("-D{name}")),
            }
        }
        argv.push("-o".to_owned());
        argv.push(self.obj_path.display().to_string());
        argv.push("-MD".to_owned());
        argv.push(self.deptmp_path.display().to_string());
        argv.push(self.source.display().to_string());

        if verbose {
            println!("BUILDSYS: EXEC: {} {}", self.nasm.display(), argv.join(" "));
        }
        println!("{}", self.source.file_name().and_then(|n| n.to_str()).unwrap_or_default());

        let mut command = Command::new(&self.nasm);
        command.args(&argv);
        let status = cmd::run(&mut command, "nasm")?.wait().map_err(|e| Error::tool_exec(e.to_string()))?;
        cmd::verify_status(&command, "nasm", status)?;

        let deps = crate::toolchain::gcc::parse_gnu_depfile(&self.deptmp_path, &self.obj_path, &self.project_root)?;
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
