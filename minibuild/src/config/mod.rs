mod project;
pub use project::{ProjectConfig, ToolsetConfig};

use crate::utils::{minibuild_home, IResult, Shell};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use anyhow::Context;

/// Process-wide configuration: not specific to any one build, just
/// information about the environment minibuild itself is running in.
pub struct Config {
    home_path: PathBuf,
    cwd: PathBuf,
    shell: Mutex<Shell>,
    creation_time: Instant,
}

impl Config {
    /// Minimal constructor used by tests: does no disk I/O beyond what the
    /// caller already did to produce `cwd`/`homedir`.
    pub fn new(shell: Shell, cwd: PathBuf, homedir: PathBuf) -> Config {
        Config { home_path: homedir, shell: Mutex::new(shell), cwd, creation_time: Instant::now() }
    }

    pub fn default() -> IResult<Config> {
        let shell = Shell::new();
        let cwd = std::env::current_dir().with_context(|| "couldn't get the current directory of the process")?;
        let homedir = minibuild_home()?;
        Ok(Config::new(shell, cwd, homedir))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn home(&self) -> &Path {
        &self.home_path
    }

    pub fn shell(&self) -> MutexGuard<Shell> {
        self.shell.lock().unwrap()
    }

    pub fn creation_time(&self) -> Instant {
        self.creation_time
    }
}
