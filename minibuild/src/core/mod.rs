mod fingerprint;
pub use fingerprint::{DepInfo, Fingerprint, Freshness};

mod graph;
pub use graph::build_module_graph;

mod layout;
pub use layout::{BuildConfig, DirOverrides, Layout, PublicPrivate, DEFAULT_BOOTSTRAP_DIR};

mod module;
pub use module::{Extension, Module, ModuleInner, ModuleKind, ModuleMap, ResolvedDep, Source};

mod module_id;
pub use module_id::ModuleId;
