//! The closed set of recognized description keys (§4.2): each key is
//! tagged with its expected container shape and whether values assigned to
//! it pass through the `subst` preprocessing step.

pub use minibuild_platform::{Arch, Platform};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    List,
    Dict,
}

#[derive(Debug, Clone, Copy)]
pub struct GrammarKey {
    pub shape: Shape,
    pub preprocess: bool,
}

const PLATFORM_TAGS: [&str; 4] = ["windows", "linux", "macosx", "posix"];
const ARCHES: [Arch; 4] = [Arch::X86, Arch::X86_64, Arch::Arm, Arch::Arm64];

/// Base keys subject to platform/arch cross-product refinement (§4.2).
pub const REFINABLE_BASE_KEYS: &[&str] =
    &["build_list", "src_search_dir_list", "asm_search_dir_list", "prebuilt_lib_list", "definitions", "asm_definitions"];

pub struct Grammar {
    keys: HashMap<String, GrammarKey>,
}

impl Grammar {
    /// The module/`minibuild.mk` grammar.
    pub fn module() -> Self {
        let mut keys = HashMap::new();
        let mut add = |key: &str, shape: Shape, preprocess: bool| {
            keys.insert(key.to_owned(), GrammarKey { shape, preprocess });
        };

        add("module_type", Shape::Scalar, false);
        add("module_name", Shape::Scalar, false);
        add("exe_name", Shape::Scalar, false);
        add("build_list", Shape::List, false);
        add("symbol_visibility_default", Shape::Scalar, false);
        add("win_console", Shape::Scalar, false);
        add("win_stack_size", Shape::Scalar, false);
        add("wmain", Shape::Scalar, false);
        add("nasm", Shape::Scalar, false);
        add("include_dir_list", Shape::List, true);
        add("asm_include_dir_list", Shape::List, true);
        add("src_search_dir_list", Shape::List, true);
        add("asm_search_dir_list", Shape::List, true);
        add("lib_list", Shape::List, true);
        add("prebuilt_lib_list", Shape::List, false);
        add("macosx_framework_list", Shape::List, false);
        add("macosx_install_name_options", Shape::Scalar, false);
        add("definitions", Shape::List, false);
        add("asm_definitions", Shape::List, false);
        add("export_def_file", Shape::Scalar, true);
        add("export", Shape::List, false);
        add("export_winapi_only", Shape::List, false);
        add("disabled_warnings", Shape::List, false);
        add("post_build", Shape::Scalar, false);
        add("spec_post_build", Shape::Scalar, false);
        add("explicit_depends", Shape::List, true);

        let mut grammar = Grammar { keys };
        grammar.extend_refined_keys();
        grammar
    }

    /// The extension/`minibuild.ext` grammar.
    pub fn extension() -> Self {
        let mut keys = HashMap::new();
        let mut add = |key: &str, shape: Shape, preprocess: bool| {
            keys.insert(key.to_owned(), GrammarKey { shape, preprocess });
        };
        add("ext_type", Shape::Scalar, false);
        add("ext_name", Shape::Scalar, false);
        add("ext_native_depends", Shape::List, true);
        add("ext_vars_required", Shape::List, false);
        add("ext_local_vars_required", Shape::List, false);
        add("ext_call_cmdline", Shape::Scalar, false);
        Grammar { keys }
    }

    fn extend_refined_keys(&mut self) {
        let mut additions = Vec::new();
        for &base in REFINABLE_BASE_KEYS {
            let defaults = self.keys.get(base).copied().unwrap_or(GrammarKey { shape: Shape::List, preprocess: false });
            for platform in PLATFORM_TAGS {
                additions.push((format!("{base}_{platform}"), defaults));
                for arch in ARCHES {
                    additions.push((format!("{base}_{platform}_{}", arch.as_str()), defaults));
                }
            }
        }
        self.keys.extend(additions);
    }

    pub fn get(&self, key: &str) -> Option<&GrammarKey> {
        self.keys.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// Refined key names consulted for `base`, most general first, per §4.2's
/// resolution order generalized to cumulative concatenation (property 3):
/// `base`, `base_posix` (platform is linux/macosx only), `base_<platform>`,
/// `base_<platform>_<arch>`.
pub fn refinement_chain(base: &str, platform: Platform, arch: Arch) -> Vec<String> {
    let mut chain = vec![base.to_owned()];
    if platform.matches_alias("posix") {
        chain.push(format!("{base}_posix"));
    }
    chain.push(format!("{base}_{}", platform.as_str()));
    chain.push(format!("{base}_{}_{}", platform.as_str(), arch.as_str()));
    chain
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn module_grammar_has_refined_build_list_keys() {
        let g = Grammar::module();
        assert!(g.contains("build_list_linux_x86_64"));
        assert!(g.contains("build_list_posix"));
        assert!(g.get("build_list").unwrap().shape == Shape::List);
    }

    #[test]
    fn refinement_chain_matches_spec_example() {
        let chain = refinement_chain("build_list", Platform::Linux, Arch::X86_64);
        assert_eq!(chain, vec!["build_list", "build_list_posix", "build_list_linux", "build_list_linux_x86_64"]);
    }
}
