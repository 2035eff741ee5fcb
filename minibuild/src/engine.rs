//! Build workflow engine (§4.6): discovers every module reachable from a
//! project's root description by following `lib_list` references, orders
//! them dependency-first, and drives each module's compile/archive/link
//! actions through the selected [`Toolset`]. Compilation of a module's own
//! sources is parallelized (§5); modules themselves build one at a time,
//! in the order `Graph::parallel_stages` yields, so a dependency's
//! artifact always exists before anything that links against it runs.

use crate::core::{
    build_module_graph, BuildConfig, Layout, Module, ModuleKind, ModuleMap, ResolvedDep, Source,
};
use crate::description::{subst, BuildDescription, Loader};
use crate::toolchain::{Action, LinkInputs, Toolset};
use crate::utils::{hash_u64, paths, IResult, InternedString, Shell};
use minibuild_platform::BuildModel;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of one full engine run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Whether anything was actually recompiled, rearchived or relinked -
    /// `false` means every target was already fresh.
    pub rebuilt: bool,
    /// The root module's produced artifact.
    pub root_artifact: PathBuf,
    /// Set when `--public` copied the root artifact out to the flat public
    /// directory.
    pub published: Option<PathBuf>,
}

#[derive(Clone)]
struct ModuleArtifact {
    kind: ModuleKind,
    path: PathBuf,
    rebuilt: bool,
}

/// One full build run: a fixed project root, target build model/toolset
/// and configuration, plus the CLI's `--force`/`--verbose`/`--public`
/// switches.
pub struct Engine<'a> {
    project_root: PathBuf,
    model: &'a BuildModel,
    toolset: &'a dyn Toolset,
    config: BuildConfig,
    layout: Layout,
    force: bool,
    verbose: bool,
    publish: bool,
}

impl<'a> Engine<'a> {
    pub fn new(
        project_root: PathBuf,
        model: &'a BuildModel,
        toolset: &'a dyn Toolset,
        config: BuildConfig,
        layout: Layout,
        force: bool,
        verbose: bool,
        publish: bool,
    ) -> Self {
        Engine { project_root, model, toolset, config, layout, force, verbose, publish }
    }

    /// Runs the workflow for the module described at `start_dir` (§4.6
    /// steps 1-6).
    pub fn build(&self, start_dir: &Path, shell: &mut Shell) -> IResult<BuildReport> {
        let loader = self.make_loader();

        let mut modules = ModuleMap::default();
        let mut loaded = HashMap::new();
        let mut loading = Vec::new();
        let root_name = self.discover(start_dir, &loader, &mut modules, &mut loaded, &mut loading)?;
        let root = modules.get(root_name).expect("just discovered").clone();

        let graph = build_module_graph(&modules, std::slice::from_ref(&root))?;

        let mut artifacts: HashMap<InternedString, ModuleArtifact> = HashMap::new();
        for stage in graph.parallel_stages() {
            for module in stage {
                let built = self.build_module(module, &artifacts, shell)?;
                artifacts.insert(module.id.name(), built);
            }
        }

        let root_artifact = artifacts.get(&root.id.name()).expect("root just built").clone();

        let published = if self.publish {
            Some(self.publish_artifact(&root_artifact.path, shell)?)
        } else {
            None
        };

        Ok(BuildReport { rebuilt: artifacts.values().any(|a| a.rebuilt), root_artifact: root_artifact.path, published })
    }

    fn make_loader(&self) -> Loader {
        let project_root = self.project_root.clone();
        let target_platform = self.model.platform().as_str().to_owned();
        let toolset_name = self.model.toolset().to_owned();
        let mut loader = Loader::new(project_root.clone(), target_platform.clone(), toolset_name.clone());
        loader.import_hook = Some(Box::new(move |dir, required_by| {
            Loader::new(project_root.clone(), target_platform.clone(), toolset_name.clone()).load_extension(dir, required_by)
        }));
        loader
    }

    /// Recursively loads the description at `dir` and every description it
    /// names in `lib_list`, building a [`Module`] for each and inserting it
    /// into `modules`. `loaded` memoizes directories already built;
    /// `loading` detects a `lib_list` cycle before it can recurse forever
    /// (`build_module_graph` also checks for cycles, but only after every
    /// description involved has already been loaded, which a self-
    /// referential `lib_list` would never reach).
    fn discover(
        &self,
        dir: &Path,
        loader: &Loader,
        modules: &mut ModuleMap,
        loaded: &mut HashMap<PathBuf, InternedString>,
        loading: &mut Vec<PathBuf>,
    ) -> IResult<InternedString> {
        let dir = paths::normalize(dir);
        if let Some(&name) = loaded.get(&dir) {
            return Ok(name);
        }
        if loading.contains(&dir) {
            let mut chain: Vec<_> = loading.iter().map(|p| p.display().to_string()).collect();
            chain.push(dir.display().to_string());
            anyhow::bail!("cyclic `lib_list` reference:\n  {}", chain.join(" -> "));
        }
        loading.push(dir.clone());

        let desc: BuildDescription = loader.load_description(&dir, None)?;

        let mut depends = Vec::new();
        for rel in desc.list("lib_list") {
            let dep_dir = desc.dirname.join(&rel);
            let dep_name = self.discover(&dep_dir, loader, modules, loaded, loading)?;
            depends.push(ResolvedDep { name: dep_name, public: true });
        }

        let module = Module::from_description(&desc, self.model.platform(), self.model.arch(), depends)?;
        let name = module.id.name();
        modules.insert(module);
        loaded.insert(dir.clone(), name);
        loading.pop();
        Ok(name)
    }

    fn build_module(&self, module: &Module, artifacts: &HashMap<InternedString, ModuleArtifact>, shell: &mut Shell) -> IResult<ModuleArtifact> {
        shell.status("Compiling", module.id.name())?;

        let (sources_rebuilt, obj_names) = self.compile_sources(module)?;

        let mut static_deps = Vec::new();
        let mut shared_deps = Vec::new();
        let mut dep_rebuilt = false;
        module.for_each_dep(|name, _public| {
            if let Some(dep) = artifacts.get(&name) {
                dep_rebuilt = dep_rebuilt || dep.rebuilt;
                match dep.kind {
                    ModuleKind::LibStatic => static_deps.push(dep.path.clone()),
                    ModuleKind::LibShared => shared_deps.push(dep.path.clone()),
                    ModuleKind::Exe => {}
                }
            }
        });
        static_deps.extend(module.prebuilt_libs.iter().cloned());

        let obj_dir = self.layout.obj_dir(module.id);
        // A dependency's content can change without touching this module's
        // own sources or description; the link/archive actions only check
        // their own object list and description files for freshness, so
        // force a relink whenever an upstream library was actually rebuilt.
        let force = self.force || sources_rebuilt || dep_rebuilt;

        let action: Box<dyn Action> = match module.kind {
            ModuleKind::LibStatic => {
                self.toolset.create_static_lib_action(module, &self.layout.lib_dir(), &obj_dir, &obj_names, self.model, self.config)?
            }
            ModuleKind::Exe => {
                let inputs = LinkInputs { module, static_deps, shared_deps };
                self.toolset.create_exe_link_action(inputs, &self.layout.exe_dir(), &self.layout.lib_dir(), &obj_dir, &obj_names, self.model, self.config)?
            }
            ModuleKind::LibShared => {
                let inputs = LinkInputs { module, static_deps, shared_deps };
                self.toolset.create_shared_lib_link_action(inputs, &self.layout.shared_dir(), &self.layout.lib_dir(), &obj_dir, &obj_names, self.model, self.config)?
            }
        };

        let result = action.execute(force, self.verbose)?;
        let path = result
            .artifacts
            .into_iter()
            .next()
            .map(|a| a.path)
            .unwrap_or_else(|| module.output_path(&self.layout));

        if let Some(ext) = &module.post_build {
            self.run_extension(ext, module, &path, shell)?;
        }

        Ok(ModuleArtifact { kind: module.kind, path, rebuilt: result.rebuilt })
    }

    /// Builds one action per source and executes them concurrently (§5:
    /// "parallelizable across independent compile actions of a module").
    fn compile_sources(&self, module: &Module) -> IResult<(bool, Vec<String>)> {
        let obj_dir = self.layout.obj_dir(module.id);
        paths::create_dir_all(&obj_dir)?;

        let mut obj_names = Vec::with_capacity(module.sources.len());
        let mut actions: Vec<Box<dyn Action>> = Vec::with_capacity(module.sources.len());
        for source in &module.sources {
            let name = obj_name(source.path());
            let action = match source {
                Source::Cpp(p) => self.toolset.create_cpp_action(module, p.clone(), &obj_dir, &name, self.model, self.config, &self.project_root)?,
                Source::C(p) => self.toolset.create_c_action(module, p.clone(), &obj_dir, &name, self.model, self.config, &self.project_root)?,
                Source::Asm(p) => self.toolset.create_asm_action(module, p.clone(), &obj_dir, &name, self.model, self.config, &self.project_root)?,
            };
            obj_names.push(name);
            actions.push(action);
        }

        let force = self.force;
        let verbose = self.verbose;
        let results: Vec<IResult<bool>> = actions.into_par_iter().map(|action| Ok(action.execute(force, verbose)?.rebuilt)).collect();
        let mut rebuilt = false;
        for r in results {
            rebuilt |= r?;
        }
        Ok((rebuilt, obj_names))
    }

    /// Runs a module's `post_build` extension (§4.7): its argv template is
    /// substituted against the just-built artifact's own paths, then run
    /// with the module's directory as its working directory.
    fn run_extension(&self, ext: &crate::core::Extension, module: &Module, output: &Path, shell: &mut Shell) -> IResult<()> {
        for var in &ext.required_vars {
            if std::env::var_os(var).is_none() {
                anyhow::bail!("extension `{}` requires environment variable `{var}`, which is not set", ext.name);
            }
        }

        let mut env = HashMap::new();
        env.insert("target".to_owned(), output.display().to_string());
        env.insert("module_dir".to_owned(), module.id.dir().display().to_string());
        env.insert("obj_dir".to_owned(), self.layout.obj_dir(module.id).display().to_string());

        let args: Vec<String> = ext.args.iter().map(|a| subst(a, &env)).collect();

        shell.status("Running", format!("post-build extension `{}`", ext.name))?;
        let mut command = std::process::Command::new(&ext.program);
        command.args(&args).current_dir(module.id.dir());
        let status = command.status().map_err(|e| anyhow::anyhow!("failed to run extension `{}`: {e}", ext.name))?;
        if !status.success() {
            anyhow::bail!("extension `{}` exited with {status}", ext.name);
        }
        Ok(())
    }

    fn publish_artifact(&self, artifact: &Path, shell: &mut Shell) -> IResult<PathBuf> {
        let public_dir = self.layout.public_dir();
        paths::create_dir_all(&public_dir)?;
        let name = artifact.file_name().ok_or_else(|| anyhow::anyhow!("artifact `{}` has no file name", artifact.display()))?;
        let dest = public_dir.join(name);
        std::fs::copy(artifact, &dest)?;
        shell.status("Published", dest.display())?;
        Ok(dest)
    }
}

/// Derives a unique object-file stem for `source`: files with a parent
/// directory get it hashed into the name so two same-named sources in
/// different subdirectories (`src/a/util.cpp`, `src/b/util.cpp`) don't
/// collide in one module's flat object directory.
fn obj_name(source: &Path) -> String {
    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("object");
    match source.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => format!("{:016x}_{stem}", hash_u64(&parent.display().to_string())),
        None => stem.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn obj_name_hashes_distinct_parents_differently() {
        let a = obj_name(Path::new("src/a/util.cpp"));
        let b = obj_name(Path::new("src/b/util.cpp"));
        assert_ne!(a, b);
        assert!(a.ends_with("_util"));
    }

    #[test]
    fn obj_name_is_bare_stem_with_no_parent() {
        assert_eq!(obj_name(Path::new("util.cpp")), "util");
    }
}
