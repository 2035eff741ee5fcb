use crate::core::ModuleId;
use std::path::{Path, PathBuf};

/// Release implies optimized, stripped-of-asserts output; debug implies
/// full debug info and no optimization (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildConfig {
    Release,
    Debug,
}

impl BuildConfig {
    pub fn dir_name(self) -> &'static str {
        match self {
            BuildConfig::Release => "release",
            BuildConfig::Debug => "debug",
        }
    }
}

impl std::str::FromStr for BuildConfig {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(BuildConfig::Release),
            "debug" => Ok(BuildConfig::Debug),
            other => anyhow::bail!("invalid build configuration `{other}`, expected `release` or `debug`"),
        }
    }
}

/// Directory defaults under a project's root, matching the layout a project's
/// `minibuild.ini` `[dirs]` section can override.
pub const DEFAULT_BOOTSTRAP_DIR: &str = "output/bootstrap";
pub const DEFAULT_OBJ_DIR: &str = "output/obj";
pub const DEFAULT_EXE_DIR: &str = "output/exe";
pub const DEFAULT_EXT_DIR: &str = "output/ext";
pub const DEFAULT_LIB_DIR: &str = "output/lib";
pub const DEFAULT_SHARED_DIR: &str = "output/shared";
pub const DEFAULT_PUBLIC_DIR: &str = "output/public";

pub const POST_BUILD_OBJ_STAMP_FILE: &str = "postbuild.stamp";

/// Resolved set of output directories for one build model, rooted at the
/// project directory. Each accessor returns an absolute path; callers are
/// responsible for creating the directory before writing into it.
pub struct Layout {
    root_dir: PathBuf,
    model_name: String,
    config: BuildConfig,
    bootstrap_dir: PathBuf,
    obj_dir: PathBuf,
    exe_dir: PathBuf,
    ext_dir: PathBuf,
    lib_dir: PathBuf,
    shared_dir: PathBuf,
    public_dir: PathBuf,
}

impl Layout {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        model_name: impl Into<String>,
        config: BuildConfig,
        dirs: &DirOverrides,
    ) -> Self {
        let root_dir = root_dir.into();
        let model_name = model_name.into();
        let resolve = |default: &str, over: &Option<PathBuf>| -> PathBuf {
            root_dir.join(over.clone().unwrap_or_else(|| PathBuf::from(default)))
        };
        Self {
            bootstrap_dir: resolve(DEFAULT_BOOTSTRAP_DIR, &dirs.bootstrap),
            obj_dir: resolve(DEFAULT_OBJ_DIR, &dirs.obj),
            exe_dir: resolve(DEFAULT_EXE_DIR, &dirs.exe),
            ext_dir: resolve(DEFAULT_EXT_DIR, &dirs.ext),
            lib_dir: resolve(DEFAULT_LIB_DIR, &dirs.lib),
            shared_dir: resolve(DEFAULT_SHARED_DIR, &dirs.shared),
            public_dir: resolve(DEFAULT_PUBLIC_DIR, &dirs.public),
            root_dir,
            model_name,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn config(&self) -> BuildConfig {
        self.config
    }

    /// Per-module object directory: `<obj>/<model>/<config>/<module>`.
    pub fn obj_dir(&self, module: ModuleId) -> PathBuf {
        self.obj_dir.join(&self.model_name).join(self.config.dir_name()).join(module.name().as_str())
    }

    pub fn exe_dir(&self) -> PathBuf {
        self.exe_dir.join(&self.model_name).join(self.config.dir_name())
    }

    /// Extension output directory has no `<config>` level - extensions are
    /// invoked once per model, independent of release/debug.
    pub fn ext_dir(&self) -> PathBuf {
        self.ext_dir.join(&self.model_name)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.lib_dir.join(&self.model_name).join(self.config.dir_name())
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.shared_dir.join(&self.model_name).join(self.config.dir_name())
    }

    /// Staging directory a module publishes into before the atomic move to
    /// the public directory: `<lib|shared|exe>/<model>/<config>/raw`.
    pub fn raw_dir(&self, public: &Path) -> PathBuf {
        public.join("raw")
    }

    /// Flat, shared across every model and configuration.
    pub fn public_dir(&self) -> PathBuf {
        self.public_dir.clone()
    }

    pub fn bootstrap_dir(&self) -> &Path {
        &self.bootstrap_dir
    }

    pub fn fingerprint_dir(&self) -> PathBuf {
        self.obj_dir.join(&self.model_name).join(self.config.dir_name()).join(".fingerprint")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirOverrides {
    pub bootstrap: Option<PathBuf>,
    pub obj: Option<PathBuf>,
    pub exe: Option<PathBuf>,
    pub ext: Option<PathBuf>,
    pub lib: Option<PathBuf>,
    pub shared: Option<PathBuf>,
    pub public: Option<PathBuf>,
}

/// Wraps a value plus whether it is part of a module's public interface -
/// a public include/define/dependency propagates to anything that depends
/// on the module that declared it, a private one does not.
#[derive(Clone, Copy)]
pub struct PublicPrivate<T>(T, bool);

impl<T> PublicPrivate<T> {
    pub fn public(value: T) -> Self {
        Self(value, true)
    }
    pub fn private(value: T) -> Self {
        Self(value, false)
    }
    pub fn is_public(&self) -> bool {
        self.1
    }
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for PublicPrivate<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PublicPrivate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(if self.is_public() { "Public" } else { "Private" }).field(&self.0).finish()
    }
}
