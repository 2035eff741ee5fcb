//! Build-config generator: turns a platform-agnostic `.bconf` prototype
//! (a handful of `#pragma` lines naming toolsets, aliases and defaults) into
//! a concrete `minibuild.ini` for the host running the generator. A project
//! that targets several machines keeps one prototype instead of hand-writing
//! an `.ini` per OS/toolchain combination.
//!
//! Pragma tokens: `nasm executable=<path>`, `native model=<mode-or-name>`,
//! `toolset module=<id> [arch=<list>] [alias=<arch>:<name>,...] [key=value
//! ...]`, `default-models model=<arch>:<name>,...`. Every pragma line is
//! scoped by a leading `os:<platform>` (or `os:all`) token.

use crate::grammar::{Arch, Platform};
use crate::utils::{paths, IResult};
use std::collections::BTreeMap;
use std::path::Path;

struct Pragma {
    line: usize,
    token: String,
    options: Vec<(String, String)>,
}

fn option<'a>(opts: &'a [(String, String)], key: &str) -> Option<&'a str> {
    opts.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Splits the way a shell would, honoring single/double quotes - just
/// enough for the small key=value tokens a pragma line carries.
fn shell_split(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quote = None;
    let mut in_token = false;
    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => cur.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        out.push(std::mem::take(&mut cur));
                        in_token = false;
                    }
                }
                c => {
                    cur.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        out.push(cur);
    }
    out
}

fn parse_pragmas(text: &str, platform: Platform) -> IResult<Vec<Pragma>> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        let Some(rest) = trimmed.strip_prefix("#pragma") else { continue };
        let argv = shell_split(rest);
        if argv.is_empty() {
            anyhow::bail!("malformed #pragma at line {}", idx + 1);
        }
        let os_tag = argv[0].strip_prefix("os:").ok_or_else(|| anyhow::anyhow!("#pragma at line {} is missing an `os:` scope", idx + 1))?;
        if os_tag != "all" && os_tag != platform.as_str() {
            continue;
        }
        let token = argv.get(1).cloned().ok_or_else(|| anyhow::anyhow!("#pragma at line {} names no token", idx + 1))?;
        let mut options = Vec::new();
        for arg in &argv[2..] {
            let (k, v) = arg.split_once('=').ok_or_else(|| anyhow::anyhow!("#pragma at line {}: malformed token `{arg}`", idx + 1))?;
            options.push((k.to_owned(), v.to_owned()));
        }
        out.push(Pragma { line: idx + 1, token, options });
    }
    Ok(out)
}

/// `arch:name,arch:name` -> `{arch: name}`, as used by both `alias` and
/// `default-models` pragma values.
fn parse_arch_map(raw: &str) -> IResult<BTreeMap<Arch, String>> {
    let mut out = BTreeMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (arch, name) = entry.split_once(':').ok_or_else(|| anyhow::anyhow!("malformed arch mapping entry `{entry}`"))?;
        let arch = arch.parse::<Arch>().map_err(|e| anyhow::anyhow!("{e}"))?;
        out.insert(arch, name.to_owned());
    }
    Ok(out)
}

fn model_name(id: &str, platform: Platform, arch: Arch) -> String {
    format!("{id}-{platform}-{arch}")
}

/// Renders one `[<id>]` toolset section: `module` plus every leftover
/// pragma option as a `config = { ... }` dict literal, matching what
/// [`crate::config::ProjectConfig::load`] parses back out.
fn render_toolset_section(id: &str, module: &str, options: &[(String, String)]) -> String {
    let mut lines = vec![format!("[{id}]"), format!("module = {module}")];
    if !options.is_empty() {
        let dict: Vec<String> = options.iter().map(|(k, v)| format!("{k}: \"{v}\"", v = v.replace('"', "\\\""))).collect();
        lines.push(format!("config = {{ {} }}", dict.join(", ")));
    }
    lines.join("\n")
}

/// Generates `dest` from `proto` for the host `platform`/`arch` (§6): each
/// `toolset` pragma becomes one `[<id>]` section, `alias`/`default-models`
/// pragma values become `[MINIBUILD-ALIAS]`/`[MINIBUILD-DEFAULT]` entries,
/// and a `native` pragma becomes `native-models` (plus `[MINIBUILD-NATIVE]`
/// when it names a concrete model rather than a detection mode).
pub fn generate(proto: &Path, dest: &Path, platform: Platform, arch: Arch, verbose: bool, shell: &mut crate::utils::Shell) -> IResult<()> {
    let text = paths::read_string(proto)?;
    let pragmas = parse_pragmas(&text, platform)?;

    let mut nasm_executable = None;
    let mut native_mode = "optional".to_owned();
    let mut native_value = None;
    let mut toolset_ids = Vec::new();
    let mut toolset_sections = Vec::new();
    let mut aliases: BTreeMap<String, String> = BTreeMap::new();
    let mut defaults: BTreeMap<String, String> = BTreeMap::new();
    let mut seen_modules: BTreeMap<String, u32> = BTreeMap::new();

    for pragma in &pragmas {
        match pragma.token.as_str() {
            "nasm" => {
                if let Some(exe) = option(&pragma.options, "executable") {
                    nasm_executable = Some(exe.to_owned());
                }
            }
            "native" => {
                let model = option(&pragma.options, "model")
                    .ok_or_else(|| anyhow::anyhow!("#pragma at line {} names no `model`", pragma.line))?;
                match model {
                    "disabled" | "optional" | "auto" => native_mode = model.to_owned(),
                    other => {
                        native_mode = "config".to_owned();
                        native_value = Some(other.to_owned());
                    }
                }
            }
            "toolset" => {
                let module = option(&pragma.options, "module")
                    .ok_or_else(|| anyhow::anyhow!("#pragma at line {} names no `module`", pragma.line))?
                    .to_owned();
                let (module, effective) = match module.as_str() {
                    "mingw" => ("gcc", "mingw"),
                    other => (other, other),
                };
                let count = seen_modules.entry(effective.to_owned()).or_insert(0);
                let id = if *count == 0 { effective.to_owned() } else { format!("{effective}{count}") };
                *count += 1;

                let arch_list: Vec<Arch> = match option(&pragma.options, "arch") {
                    Some(raw) => raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(|s| s.parse::<Arch>().map_err(|e| anyhow::anyhow!("{e}"))).collect::<IResult<_>>()?,
                    None => vec![arch],
                };

                let mut config_opts: Vec<(String, String)> = pragma
                    .options
                    .iter()
                    .filter(|(k, _)| k != "module" && k != "alias")
                    .cloned()
                    .collect();
                if !config_opts.iter().any(|(k, _)| k == "arch") {
                    let joined = arch_list.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(",");
                    config_opts.push(("arch".to_owned(), joined));
                }
                if let Some(exe) = &nasm_executable {
                    config_opts.push(("nasm_executable".to_owned(), exe.clone()));
                }

                toolset_sections.push(render_toolset_section(&id, module, &config_opts));
                toolset_ids.push(id.clone());

                if let Some(raw) = option(&pragma.options, "alias") {
                    for (alias_arch, alias_name) in parse_arch_map(raw)? {
                        if arch_list.contains(&alias_arch) {
                            aliases.insert(alias_name, model_name(&id, platform, alias_arch));
                        }
                    }
                }
            }
            "default-models" => {
                let raw = option(&pragma.options, "model")
                    .ok_or_else(|| anyhow::anyhow!("#pragma at line {} names no `model`", pragma.line))?;
                for (default_arch, name) in parse_arch_map(raw)? {
                    defaults.insert(format!("{platform}-{default_arch}"), name);
                }
            }
            other => anyhow::bail!("#pragma at line {}: unknown token `{other}`", pragma.line),
        }
    }

    if toolset_ids.is_empty() {
        anyhow::bail!("`{}` has no `toolset` #pragma for platform `{platform}`", proto.display());
    }

    let mut out = vec!["[MINIBUILD]".to_owned(), format!("toolset-{platform} = {}", toolset_ids.join(" ")), format!("native-models = {native_mode}")];

    if let Some(value) = native_value {
        out.push(String::new());
        out.push("[MINIBUILD-NATIVE]".to_owned());
        out.push(format!("{platform}-{arch} = {value}"));
    }

    if !aliases.is_empty() {
        out.push(String::new());
        out.push("[MINIBUILD-ALIAS]".to_owned());
        for (alias, name) in &aliases {
            out.push(format!("{alias} = {name}"));
        }
    }

    if !defaults.is_empty() {
        out.push(String::new());
        out.push("[MINIBUILD-DEFAULT]".to_owned());
        for (key, name) in &defaults {
            out.push(format!("{key} = {name}"));
        }
    }

    for section in toolset_sections {
        out.push(String::new());
        out.push(section);
    }

    paths::write(dest, out.join("\n") + "\n")?;
    shell.status("Generated", dest.display())?;
    if verbose {
        shell.note(format!("from prototype `{}`, {} toolset(s)", proto.display(), toolset_ids.len()))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const PROTO: &str = "\
#pragma os:all native model=optional\n\
#pragma os:linux toolset module=gcc arch=x86_64 alias=x86_64:release-default\n\
#pragma os:linux default-models model=x86_64:gcc-linux-x86_64\n";

    #[test]
    fn generates_minimal_ini() {
        let dir = tempfile::tempdir().unwrap();
        let proto = dir.path().join("project.bconf");
        std::fs::write(&proto, PROTO).unwrap();
        let dest = dir.path().join("minibuild.ini");
        let mut shell = crate::utils::Shell::new();
        generate(&proto, &dest, Platform::Linux, Arch::X86_64, false, &mut shell).unwrap();

        let written = std::fs::read_to_string(&dest).unwrap();
        assert!(written.contains("toolset-linux = gcc"));
        assert!(written.contains("native-models = optional"));
        assert!(written.contains("release-default = gcc-linux-x86_64"));
        assert!(written.contains("[gcc]"));
        assert!(written.contains("module = gcc"));
    }

    #[test]
    fn rejects_unknown_pragma_token() {
        let dir = tempfile::tempdir().unwrap();
        let proto = dir.path().join("project.bconf");
        std::fs::write(&proto, "#pragma os:all bogus key=value\n").unwrap();
        let dest = dir.path().join("minibuild.ini");
        let mut shell = crate::utils::Shell::new();
        let err = generate(&proto, &dest, Platform::Linux, Arch::X86_64, false, &mut shell).unwrap_err();
        assert!(err.to_string().contains("unknown token"));
    }
}
