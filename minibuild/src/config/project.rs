use crate::utils::IResult;
use std::collections::HashMap;
use std::path::Path;

/// Native-model detection mode from `[MINIBUILD] native-models` - how a
/// model name is picked when the CLI caller doesn't request one explicitly
/// by name (only `disabled`/`config` are reachable from `--model`, but
/// `optional`/`auto` are still parsed so an unsupported project config is
/// reported by name rather than rejected outright).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeModels {
    Disabled,
    Optional,
    Auto,
    Config,
}

impl std::str::FromStr for NativeModels {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(NativeModels::Disabled),
            "optional" => Ok(NativeModels::Optional),
            "auto" => Ok(NativeModels::Auto),
            "config" => Ok(NativeModels::Config),
            other => anyhow::bail!("invalid `native-models` value `{other}`, expected one of disabled, optional, auto, config"),
        }
    }
}

/// A `[<toolset-id>]` section: `module = <toolset-module-id>` plus a
/// restricted dict literal `config = { ... }` whose keys are specific to
/// the toolset module named.
#[derive(Debug, Clone, Default)]
pub struct ToolsetConfig {
    pub id: String,
    pub module: String,
    pub config: HashMap<String, String>,
}

/// A fully parsed `minibuild.ini`.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    pub toolsets_by_platform: HashMap<String, Vec<String>>,
    pub native_models: Option<NativeModels>,
    pub native: HashMap<String, String>,
    pub aliases: HashMap<String, String>,
    pub defaults: HashMap<String, String>,
    pub toolsets: HashMap<String, ToolsetConfig>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> IResult<Self> {
        let ini = ini::Ini::load_from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to parse `{}`: {e}", path.display()))?;

        let mut cfg = ProjectConfig::default();

        if let Some(section) = ini.section(Some("MINIBUILD")) {
            for (key, value) in section.iter() {
                if let Some(platform) = key.strip_prefix("toolset-") {
                    let ids = value.split_whitespace().map(str::to_owned).collect();
                    cfg.toolsets_by_platform.insert(platform.to_owned(), ids);
                } else if key == "native-models" {
                    cfg.native_models = Some(value.parse()?);
                }
            }
        }

        if let Some(section) = ini.section(Some("MINIBUILD-NATIVE")) {
            for (key, value) in section.iter() {
                cfg.native.insert(key.to_owned(), value.to_owned());
            }
        }

        if let Some(section) = ini.section(Some("MINIBUILD-ALIAS")) {
            for (key, value) in section.iter() {
                cfg.aliases.insert(key.to_owned(), value.to_owned());
            }
        }

        if let Some(section) = ini.section(Some("MINIBUILD-DEFAULT")) {
            for (key, value) in section.iter() {
                cfg.defaults.insert(key.to_owned(), value.to_owned());
            }
        }

        let known = ["MINIBUILD", "MINIBUILD-NATIVE", "MINIBUILD-ALIAS", "MINIBUILD-DEFAULT"];
        for (name, section) in ini.iter() {
            let Some(name) = name else { continue };
            if known.contains(&name) {
                continue;
            }
            let module = section
                .get("module")
                .ok_or_else(|| anyhow::anyhow!("toolset section `[{name}]` is missing `module`"))?
                .to_owned();
            let config = section
                .get("config")
                .map(parse_dict_literal)
                .transpose()?
                .unwrap_or_default();
            cfg.toolsets.insert(name.to_owned(), ToolsetConfig { id: name.to_owned(), module, config });
        }

        Ok(cfg)
    }

    /// Resolves a model name against `--model`: the CLI passes either a
    /// toolset-native model name directly, or an alias from
    /// `[MINIBUILD-ALIAS]`. Returns the resolved model name unchanged if it
    /// isn't an alias.
    pub fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        self.aliases.get(requested).map(String::as_str).unwrap_or(requested)
    }
}

/// Evaluates the restricted `config = { key: "value", ... }` dict literal
/// syntax: no builtins, no expressions, just string/identifier keys mapped
/// to string or bare-word values. This is deliberately not a general INI
/// value parser - the grammar is fixed by the spec's toolset `config` key.
fn parse_dict_literal(src: &str) -> IResult<HashMap<String, String>> {
    let src = src.trim();
    let inner = src
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| anyhow::anyhow!("toolset `config` value must be a `{{ ... }}` dict literal, got `{src}`"))?;

    let mut out = HashMap::new();
    for entry in split_top_level(inner, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("malformed `config` entry `{entry}`, expected `key: value`"))?;
        out.insert(unquote(key.trim()), unquote(value.trim()));
    }
    Ok(out)
}

fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')) {
        s[1..s.len() - 1].to_owned()
    } else {
        s.to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_toolset_dict_literal() {
        let parsed = parse_dict_literal(r#"{ path: "/usr/bin/gcc", version: 11 }"#).unwrap();
        assert_eq!(parsed.get("path").unwrap(), "/usr/bin/gcc");
        assert_eq!(parsed.get("version").unwrap(), "11");
    }

    #[test]
    fn loads_full_project_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minibuild.ini");
        std::fs::write(
            &path,
            "[MINIBUILD]\ntoolset-linux = gcc\nnative-models = config\n\n\
             [MINIBUILD-ALIAS]\nrelease-default = gcc-linux-x86_64\n\n\
             [gcc]\nmodule = gcc\nconfig = { cxx_std: c++17 }\n",
        )
        .unwrap();

        let cfg = ProjectConfig::load(&path).unwrap();
        assert_eq!(cfg.toolsets_by_platform.get("linux").unwrap(), &vec!["gcc".to_owned()]);
        assert_eq!(cfg.native_models, Some(NativeModels::Config));
        assert_eq!(cfg.resolve_model("release-default"), "gcc-linux-x86_64");
        let gcc = cfg.toolsets.get("gcc").unwrap();
        assert_eq!(gcc.module, "gcc");
        assert_eq!(gcc.config.get("cxx_std").unwrap(), "c++17");
    }
}
