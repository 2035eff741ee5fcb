//! Command-line driver (§6): resolves a project root from a starting
//! directory, loads its `minibuild.ini`, registers every configured
//! toolset, and runs the workflow engine for the requested `--model`.

use minibuild::config::{Config, ProjectConfig};
use minibuild::core::{BuildConfig, DirOverrides, Layout, DEFAULT_BOOTSTRAP_DIR};
use minibuild::description::MODULE_DESCRIPTION_FILE;
use minibuild::engine::Engine;
use minibuild::toolchain::registry::{self, RegisteredToolset};
use minibuild::utils::IResult;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const PROJECT_CONFIG_FILE: &str = "minibuild.ini";

struct Args {
    model: String,
    config: BuildConfig,
    force: bool,
    verbose: bool,
    public: bool,
    directory: PathBuf,
}

enum Command {
    Build(Args),
    GenBconf { proto: PathBuf, directory: PathBuf, verbose: bool },
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> IResult<Command> {
    let mut model = None;
    let mut config = None;
    let mut force = false;
    let mut verbose = false;
    let mut public = false;
    let mut directory = None;
    let mut gen_bconf = None;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--model" => model = Some(argv.next().ok_or_else(|| anyhow::anyhow!("`--model` requires a value"))?),
            "--config" => config = Some(argv.next().ok_or_else(|| anyhow::anyhow!("`--config` requires a value"))?),
            "--directory" => {
                directory = Some(PathBuf::from(argv.next().ok_or_else(|| anyhow::anyhow!("`--directory` requires a value"))?))
            }
            "--gen-bconf" => {
                gen_bconf = Some(PathBuf::from(argv.next().ok_or_else(|| anyhow::anyhow!("`--gen-bconf` requires a value"))?))
            }
            "--force" => force = true,
            "--verbose" => verbose = true,
            "--public" => public = true,
            other => anyhow::bail!("unrecognized argument `{other}`"),
        }
    }

    if let Some(proto) = gen_bconf {
        return Ok(Command::GenBconf { proto, directory: directory.unwrap_or_else(|| PathBuf::from(".")), verbose });
    }

    Ok(Command::Build(Args {
        model: model.ok_or_else(|| anyhow::anyhow!("`--model` is required"))?,
        config: config.ok_or_else(|| anyhow::anyhow!("`--config` is required"))?.parse()?,
        force,
        verbose,
        public,
        directory: directory.unwrap_or_else(|| PathBuf::from(".")),
    }))
}

/// Walks upward from `start` looking for `minibuild.ini`, the way a project
/// root is located from any subdirectory inside it.
fn resolve_project_root(start: &Path) -> IResult<PathBuf> {
    let mut candidate = minibuild::utils::paths::normalize(start);
    let mut tried = Vec::new();
    loop {
        let config_path = candidate.join(PROJECT_CONFIG_FILE);
        tried.push(config_path.display().to_string());
        if config_path.is_file() {
            return Ok(candidate);
        }
        match candidate.parent() {
            Some(parent) if parent != candidate => candidate = parent.to_path_buf(),
            _ => anyhow::bail!("couldn't resolve a project root while trying:\n  {}", tried.join("\n  ")),
        }
    }
}

fn host_platform_key() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "macosx",
        _ => "linux",
    }
}

fn collect_toolsets(project: &ProjectConfig, bootstrap_dir: &Path) -> IResult<Vec<RegisteredToolset>> {
    let platform_key = host_platform_key();
    let Some(ids) = project.toolsets_by_platform.get(platform_key) else {
        anyhow::bail!("project has no `[MINIBUILD] toolset-{platform_key}` entry for this host");
    };
    let platform: minibuild::grammar::Platform = platform_key.parse().map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut out = Vec::new();
    for id in ids {
        let toolset_cfg = project
            .toolsets
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("`[MINIBUILD] toolset-{platform_key}` names `{id}`, which has no `[{id}]` section"))?;
        out.extend(registry::build(id, toolset_cfg, platform, bootstrap_dir)?);
    }
    Ok(out)
}

fn run_gen_bconf(proto: &Path, directory: &Path, verbose: bool, cfg: &Config) -> IResult<()> {
    let start_dir = cfg.cwd().join(directory);
    let project_root = resolve_project_root(&start_dir)?;
    let proto_path = if proto.is_absolute() { proto.to_path_buf() } else { project_root.join(proto) };
    let dest = project_root.join(PROJECT_CONFIG_FILE);
    let platform_key = host_platform_key();
    let platform: minibuild::grammar::Platform = platform_key.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
    let arch = host_arch();
    let mut shell = cfg.shell();
    minibuild::bconf::generate(&proto_path, &dest, platform, arch, verbose, &mut shell)
}

fn host_arch() -> minibuild::grammar::Arch {
    match std::env::consts::ARCH {
        "x86" => minibuild::grammar::Arch::X86,
        "aarch64" => minibuild::grammar::Arch::Arm64,
        "arm" => minibuild::grammar::Arch::Arm,
        _ => minibuild::grammar::Arch::X86_64,
    }
}

fn run(args: Args, cfg: &Config) -> IResult<()> {
    let start_dir = cfg.cwd().join(&args.directory);
    let project_root = resolve_project_root(&start_dir)?;
    let project_config_path = project_root.join(PROJECT_CONFIG_FILE);
    let project = ProjectConfig::load(&project_config_path)?;

    let bootstrap_dir = project_root.join(DEFAULT_BOOTSTRAP_DIR);
    let registered = collect_toolsets(&project, &bootstrap_dir)?;

    let requested = project.resolve_model(&args.model);
    let chosen = registered.iter().find(|r| r.model.name() == requested).ok_or_else(|| {
        let suggestion = minibuild::utils::lev_distance::closest_msg(requested, registered.iter(), |r| r.model.name());
        anyhow::anyhow!("model `{requested}` is not configured by this project{suggestion}")
    })?;

    let layout = Layout::new(&project_root, chosen.model.name(), args.config, &DirOverrides::default());
    let module_dir = if start_dir.join(MODULE_DESCRIPTION_FILE).is_file() { start_dir } else { project_root.clone() };

    let engine =
        Engine::new(project_root, &chosen.model, chosen.toolset.as_ref(), args.config, layout, args.force, args.verbose, args.public);

    let mut shell = cfg.shell();
    let report = engine.build(&module_dir, &mut shell)?;
    if report.rebuilt {
        shell.status("Finished", report.root_artifact.display())?;
    } else {
        shell.status("Fresh", report.root_artifact.display())?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("minibuild: {e}");
            return ExitCode::from(126);
        }
    };

    let cfg = match Config::default() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("minibuild: {e}");
            return ExitCode::from(126);
        }
    };

    let result = match args {
        Command::Build(args) => run(args, &cfg),
        Command::GenBconf { proto, directory, verbose } => run_gen_bconf(&proto, &directory, verbose, &cfg),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = cfg.shell().error(format!("{e:#}"));
            ExitCode::from(126)
        }
    }
}
