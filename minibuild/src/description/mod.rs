//! Description loader (§4.1): reads `minibuild.mk`/`minibuild.ext`, splices
//! `#include`/`#import` directives, evaluates the body against the grammar,
//! and validates the result.

mod value;
pub use value::{subst, subst_value, Value};

use crate::grammar::{Grammar, Shape};
use crate::utils::{paths, IResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MODULE_DESCRIPTION_FILE: &str = "minibuild.mk";
pub const EXTENSION_DESCRIPTION_FILE: &str = "minibuild.ext";

/// A fully loaded and validated description: either a module
/// (`minibuild.mk`) or an extension (`minibuild.ext`).
#[derive(Debug, Clone, Default)]
pub struct BuildDescription {
    pub tokens: HashMap<String, Value>,
    /// Primary file followed by every transitively `#include`d file, in the
    /// order first encountered. A change to any of them invalidates every
    /// target derived from this description.
    pub file_parts: Vec<PathBuf>,
    pub dirname: PathBuf,
    /// Extension descriptions attached via `#import` (§4.1 step 11), kept
    /// around so `post_build`/`spec_post_build` can look one up by
    /// `ext_name` after the module description itself is built.
    pub extensions: Vec<BuildDescription>,
}

impl BuildDescription {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.tokens.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(Value::strings).unwrap_or_default()
    }

    /// Concatenates `base`'s platform/arch refinements in increasing order
    /// of specificity (§4.2, property 3).
    pub fn refined_list(&self, base: &str, platform: crate::grammar::Platform, arch: crate::grammar::Arch) -> Vec<String> {
        let mut out = Vec::new();
        for key in crate::grammar::refinement_chain(base, platform, arch) {
            out.extend(self.list(&key));
        }
        out
    }

    /// Looks up an imported extension by its declared `ext_name` (§4.7) -
    /// used to resolve a module's `post_build`/`spec_post_build` key into
    /// the extension description it names.
    pub fn find_extension(&self, ext_name: &str) -> Option<&BuildDescription> {
        self.extensions.iter().find(|e| e.str("ext_name") == Some(ext_name))
    }
}

struct ParsedSource {
    /// Directive-stripped body, concatenated across every spliced file.
    body: String,
    file_parts: Vec<PathBuf>,
    imports: Vec<(PathBuf, PathBuf, usize)>,
}

fn parse_file(
    project_root: &Path,
    working_dir: &Path,
    file_to_parse: &Path,
    required_by: &mut Vec<PathBuf>,
    import_enabled: bool,
    out: &mut ParsedSource,
) -> IResult<()> {
    let fname = paths::normalize(&working_dir.join(file_to_parse));

    if required_by.iter().any(|p| p == &fname) {
        anyhow::bail!("recursive include: file `{}`", fname.display());
    }

    if !fname.is_file() {
        let chain: Vec<_> = required_by.iter().map(|p| p.display().to_string()).collect();
        if chain.is_empty() {
            anyhow::bail!("no such description: `{}`", fname.display());
        }
        anyhow::bail!("no such description: `{}`, required by:\n  {}", fname.display(), chain.join(" <= "));
    }

    let dir_of_file = fname.parent().unwrap_or(Path::new(".")).to_path_buf();
    let text = paths::read_string(&fname)?;

    out.file_parts.push(fname.clone());

    let mut stop_reparse = false;
    for (idx, line) in text.lines().enumerate() {
        if !stop_reparse {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                stop_reparse = true;
            }
            if !stop_reparse {
                if let Some(path) = trimmed.strip_prefix("#include") {
                    let target = parse_directive_target(path, project_root)
                        .ok_or_else(|| anyhow::anyhow!("invalid #include syntax: file `{}`, line {}", fname.display(), idx + 1))?;
                    required_by.insert(0, fname.clone());
                    parse_file(project_root, &dir_of_file, &target, required_by, import_enabled, out)?;
                    required_by.remove(0);
                } else if let Some(path) = trimmed.strip_prefix("#import") {
                    if !import_enabled {
                        anyhow::bail!("unexpected #import syntax: file `{}`, line {}", fname.display(), idx + 1);
                    }
                    let target = parse_directive_target(path, project_root)
                        .ok_or_else(|| anyhow::anyhow!("invalid #import syntax: file `{}`, line {}", fname.display(), idx + 1))?;
                    let resolved = paths::normalize(&dir_of_file.join(&target));
                    if !resolved.is_dir() {
                        anyhow::bail!(
                            "directory for #import not found: `{}`, required by `{}` at line {}",
                            resolved.display(),
                            fname.display(),
                            idx + 1
                        );
                    }
                    out.imports.push((resolved, fname.clone(), idx + 1));
                }
            }
        }
        out.body.push_str(line);
        out.body.push('\n');
    }

    Ok(())
}

fn parse_directive_target(rest: &str, project_root: &Path) -> Option<PathBuf> {
    let rest = rest.trim();
    let inner = rest.strip_prefix('"')?.strip_suffix('"')?;
    if let Some(stripped) = inner.strip_prefix('@') {
        Some(project_root.join(stripped.trim_start_matches(['/', '\\'])))
    } else {
        Some(PathBuf::from(inner))
    }
}

/// Evaluates the spliced body as a sequence of `name = expr` assignment
/// statements, one per logical line. Bracketed list/dict literals may span
/// multiple physical lines; a statement continues until its brackets
/// balance.
fn evaluate_body(body: &str, grammar: &Grammar, builtins: &HashMap<String, Value>) -> IResult<HashMap<String, Value>> {
    let mut vars: HashMap<String, Value> = builtins.clone();
    for key in grammar.keys() {
        if !vars.contains_key(key) {
            let default = match grammar.get(key).map(|g| g.shape) {
                Some(Shape::List) => Value::List(Vec::new()),
                Some(Shape::Dict) => Value::Dict(Vec::new()),
                _ => Value::None,
            };
            vars.insert(key.to_owned(), default);
        }
    }

    for statement in split_statements(body) {
        let statement = statement.trim();
        if statement.is_empty() || statement.starts_with('#') {
            continue;
        }
        let (name, expr) = statement
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("malformed statement (expected `name = expr`): `{statement}`"))?;
        let name = name.trim();
        let mut parser = value::Parser::new(expr.trim(), &vars);
        let value = parser.parse_expr().map_err(|e| anyhow::anyhow!("in assignment to `{name}`: {e}"))?;
        vars.insert(name.to_owned(), value);
    }

    Ok(vars)
}

fn split_statements(body: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for line in body.lines() {
        for c in line.chars() {
            match c {
                '[' | '{' | '(' => depth += 1,
                ']' | '}' | ')' => depth -= 1,
                _ => {}
            }
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
        if depth <= 0 {
            statements.push(std::mem::take(&mut current));
            depth = 0;
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    statements
}

pub struct Loader {
    pub project_root: PathBuf,
    pub target_platform: String,
    pub toolset_name: String,
    pub import_hook: Option<Box<dyn Fn(&Path, &Path) -> IResult<BuildDescription>>>,
}

impl Loader {
    pub fn new(project_root: PathBuf, target_platform: String, toolset_name: String) -> Self {
        Loader { project_root, target_platform, toolset_name, import_hook: None }
    }

    pub fn load_description(&self, working_dir: &Path, required_by: Option<&Path>) -> IResult<BuildDescription> {
        let grammar = Grammar::module();
        let mut parsed = ParsedSource { body: String::new(), file_parts: Vec::new(), imports: Vec::new() };
        let mut chain = required_by.map(|p| vec![p.to_path_buf()]).unwrap_or_default();
        parse_file(
            &self.project_root,
            working_dir,
            Path::new(MODULE_DESCRIPTION_FILE),
            &mut chain,
            self.import_hook.is_some(),
            &mut parsed,
        )?;

        let mut builtins = HashMap::new();
        builtins.insert("BUILDSYS_TARGET_PLATFORM".to_owned(), Value::Str(self.target_platform.clone()));
        builtins.insert("BUILDSYS_TOOLSET_NAME".to_owned(), Value::Str(self.toolset_name.clone()));

        let tokens = evaluate_body(&parsed.body, &grammar, &builtins)?;
        let tokens = apply_substitution(tokens, &grammar, &self.project_root);

        let dirname = parsed.file_parts[0].parent().unwrap_or(Path::new(".")).to_path_buf();
        let mut desc = BuildDescription { tokens, file_parts: parsed.file_parts, dirname, extensions: Vec::new() };
        validate_module(&desc)?;

        if let Some(hook) = &self.import_hook {
            for (dname, src_file, _line) in &parsed.imports {
                let ext = hook(dname, src_file)?;
                desc.file_parts.extend(ext.file_parts.clone());
                desc.extensions.push(ext);
            }
        }

        Ok(desc)
    }

    pub fn load_extension(&self, working_dir: &Path, required_by: &Path) -> IResult<BuildDescription> {
        let grammar = Grammar::extension();
        let mut parsed = ParsedSource { body: String::new(), file_parts: Vec::new(), imports: Vec::new() };
        let mut chain = vec![required_by.to_path_buf()];
        parse_file(&self.project_root, working_dir, Path::new(EXTENSION_DESCRIPTION_FILE), &mut chain, false, &mut parsed)?;

        let tokens = evaluate_body(&parsed.body, &grammar, &HashMap::new())?;
        let tokens = apply_substitution(tokens, &grammar, &self.project_root);
        let dirname = parsed.file_parts[0].parent().unwrap_or(Path::new(".")).to_path_buf();
        let desc = BuildDescription { tokens, file_parts: parsed.file_parts, dirname, extensions: Vec::new() };
        validate_extension(&desc)?;
        Ok(desc)
    }
}

fn apply_substitution(tokens: HashMap<String, Value>, grammar: &Grammar, project_root: &Path) -> HashMap<String, Value> {
    let mut env = HashMap::new();
    env.insert("project_root".to_owned(), project_root.display().to_string());

    tokens
        .into_iter()
        .map(|(key, value)| {
            let preprocess = grammar.get(&key).map(|g| g.preprocess).unwrap_or(false);
            if preprocess {
                (key, subst_value(&value, &env))
            } else {
                (key, value)
            }
        })
        .collect()
}

fn validate_module(desc: &BuildDescription) -> IResult<()> {
    let module_type = desc.str("module_type").filter(|s| !s.is_empty());
    let module_type = module_type.ok_or_else(|| anyhow::anyhow!("`module_type` is required and must be non-empty"))?;
    const KNOWN: &[&str] = &["executable", "lib-static", "lib-shared", "composite", "zip-file", "download"];
    if !KNOWN.contains(&module_type) {
        anyhow::bail!("`module_type` value `{module_type}` is not one of {KNOWN:?}");
    }
    if desc.str("module_name").filter(|s| !s.is_empty()).is_none() {
        anyhow::bail!("`module_name` is required and must be non-empty");
    }
    Ok(())
}

fn validate_extension(desc: &BuildDescription) -> IResult<()> {
    const KNOWN_TYPES: &[&str] = &["post-build", "spec-post-build"];
    let ext_type = desc.str("ext_type").ok_or_else(|| anyhow::anyhow!("`ext_type` is required"))?;
    if !KNOWN_TYPES.contains(&ext_type) {
        anyhow::bail!("`ext_type` value `{ext_type}` is not one of {KNOWN_TYPES:?}");
    }
    if desc.str("ext_name").filter(|s| !s.is_empty()).is_none() {
        anyhow::bail!("`ext_name` is required and must be non-empty");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn loads_minimal_executable_description() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MODULE_DESCRIPTION_FILE),
            "module_type = 'executable'\nmodule_name = 'hello'\nbuild_list = ['hello.c']\n",
        )
        .unwrap();

        let loader = Loader::new(dir.path().to_path_buf(), "linux".to_owned(), "gcc".to_owned());
        let desc = loader.load_description(dir.path(), None).unwrap();
        assert_eq!(desc.str("module_type"), Some("executable"));
        assert_eq!(desc.list("build_list"), vec!["hello.c".to_owned()]);
        assert_eq!(desc.file_parts.len(), 1);
    }

    #[test]
    fn rejects_unknown_module_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODULE_DESCRIPTION_FILE), "module_type = 'bogus'\nmodule_name = 'x'\n").unwrap();
        let loader = Loader::new(dir.path().to_path_buf(), "linux".to_owned(), "gcc".to_owned());
        assert!(loader.load_description(dir.path(), None).is_err());
    }

    #[test]
    fn splices_included_file_and_tracks_file_parts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("common.mk"), "definitions = ['SHARED=1']\n").unwrap();
        std::fs::write(
            dir.path().join(MODULE_DESCRIPTION_FILE),
            "#include \"common.mk\"\nmodule_type = 'executable'\nmodule_name = 'hello'\nbuild_list = ['hello.c']\n",
        )
        .unwrap();

        let loader = Loader::new(dir.path().to_path_buf(), "linux".to_owned(), "gcc".to_owned());
        let desc = loader.load_description(dir.path(), None).unwrap();
        assert_eq!(desc.list("definitions"), vec!["SHARED=1".to_owned()]);
        assert_eq!(desc.file_parts.len(), 2);
    }

    #[test]
    fn resolves_refined_build_list_per_spec_example() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MODULE_DESCRIPTION_FILE),
            "module_type = 'executable'\nmodule_name = 'hello'\n\
             build_list = ['a.c']\nbuild_list_linux = ['b.c']\nbuild_list_linux_x86_64 = ['c.c']\n",
        )
        .unwrap();
        let loader = Loader::new(dir.path().to_path_buf(), "linux".to_owned(), "gcc".to_owned());
        let desc = loader.load_description(dir.path(), None).unwrap();

        use crate::grammar::{Arch, Platform};
        assert_eq!(
            desc.refined_list("build_list", Platform::Linux, Arch::X86_64),
            vec!["a.c".to_owned(), "b.c".to_owned(), "c.c".to_owned()]
        );
        assert_eq!(desc.refined_list("build_list", Platform::Linux, Arch::Arm), vec!["a.c".to_owned(), "b.c".to_owned()]);
        assert_eq!(desc.refined_list("build_list", Platform::Windows, Arch::X86_64), vec!["a.c".to_owned()]);
    }
}
