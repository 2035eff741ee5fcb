use crate::utils::{paths, IResult};
use std::path::{Path, PathBuf};

/// Result of a freshness check against a previously recorded [`DepInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Dirty,
}

/// The recorded set of inputs an output was built from, re-readable as
/// plain text (one project-relative path per line). Produced either by
/// parsing a compiler's own dependency output (GCC/Clang `-MMD`, MSVC
/// `/showIncludes`, NASM `-MD`) or, for non-compile steps, listed
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct DepInfo {
    pub inputs: Vec<PathBuf>,
}

const HEADER: &str = "@DEPS@";

impl DepInfo {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self { inputs }
    }

    pub fn read(path: &Path) -> IResult<Self> {
        let data = paths::read_string(path)?;
        let inputs = if data.starts_with(HEADER) {
            data.lines().skip(1).map(PathBuf::from).collect()
        } else {
            parse_gcc_depfile(&data)
        };
        Ok(Self { inputs })
    }

    pub fn write(&self, path: &Path) -> IResult<()> {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        for (i, p) in self.inputs.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&p.display().to_string());
        }
        paths::write(path, out.as_bytes())
    }
}

/// Parses a GCC/Make-style `.d` file: `output.o: in1.c in2.h \` continuation
/// lines. Only the dependency paths are kept - the output and primary
/// source (the first two whitespace-separated tokens) are dropped, since
/// the caller already knows both.
///
/// This splits on raw whitespace, so a dependency path containing a space
/// (escaped by GCC as `\ `) is not reassembled correctly - narrower than a
/// real Makefile parser, but matches what the upstream generator emits for
/// ordinary project trees.
fn parse_gcc_depfile(data: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut index = 0usize;
    for token in data.split_whitespace() {
        let token = token.trim_end_matches('\\');
        if token.is_empty() || token.ends_with(':') {
            continue;
        }
        if index > 1 {
            paths.push(PathBuf::from(token));
        }
        index += 1;
    }
    paths
}

/// A module/step's complete set of fingerprint inputs: its sources, its
/// recorded dependency file entries, and any `explicit_depends` entries
/// from the description, plus the description's own file-parts (so editing
/// `minibuild.mk` invalidates every object it describes).
pub struct Fingerprint {
    pub output: PathBuf,
    pub inputs: Vec<PathBuf>,
    /// Sidecar file recording a content signature of `inputs` as of the
    /// last successful build, alongside the output.
    pub sig_path: PathBuf,
}

impl Fingerprint {
    pub fn new(output: PathBuf, inputs: Vec<PathBuf>) -> Self {
        let sig_path = output.with_extension("fpsig");
        Self { output, inputs, sig_path }
    }

    /// An output is fresh when every input's mtime is no newer than the
    /// output's (the upstream rule - equal counts as fresh, since
    /// filesystem timestamp resolution varies) *and* the recorded
    /// (path, size) signature of the input set still matches the one taken
    /// at the end of the last successful build.
    ///
    /// The signature check is the belt-and-suspenders the upstream
    /// implementation lacked: bare mtime comparison alone misses an input
    /// whose content changed without bumping its mtime (a `touch -d`, or a
    /// checkout that preserves timestamps) when the edit lands in the same
    /// timestamp tick as the existing output.
    pub fn check(&self) -> IResult<Freshness> {
        let output_mtime = match paths::mtime(&self.output) {
            Ok(t) => t,
            Err(_) => return Ok(Freshness::Dirty),
        };

        let mut current_sig = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let meta = match std::fs::metadata(input) {
                Ok(m) => m,
                Err(_) => return Ok(Freshness::Dirty),
            };
            let input_mtime = filetime::FileTime::from_last_modification_time(&meta);
            if input_mtime > output_mtime {
                return Ok(Freshness::Dirty);
            }
            current_sig.push((input.clone(), meta.len()));
        }

        match paths::read_bytes(&self.sig_path) {
            Ok(recorded) if recorded == encode_sig(&current_sig) => Ok(Freshness::Fresh),
            _ => Ok(Freshness::Dirty),
        }
    }

    /// Records the current signature of `inputs`; call after a successful
    /// rebuild so the next [`Fingerprint::check`] has something to compare.
    pub fn persist(&self) -> IResult<()> {
        let mut sig = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let len = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);
            sig.push((input.clone(), len));
        }
        paths::write(&self.sig_path, &encode_sig(&sig))
    }
}

fn encode_sig(entries: &[(PathBuf, u64)]) -> Vec<u8> {
    let mut out = String::new();
    for (path, len) in entries {
        out.push_str(&path.display().to_string());
        out.push('\t');
        out.push_str(&len.to_string());
        out.push('\n');
    }
    out.into_bytes()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_gcc_style_depfile() {
        let data = "obj/foo.o: src/foo.c \\\n  include/foo.h \\\n  include/bar.h\n";
        let deps = parse_gcc_depfile(data);
        assert_eq!(deps, vec![PathBuf::from("include/foo.h"), PathBuf::from("include/bar.h")]);
    }

    #[test]
    fn roundtrips_through_own_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.dep");
        let info = DepInfo::new(vec![PathBuf::from("a.h"), PathBuf::from("b.h")]);
        info.write(&path).unwrap();
        let read = DepInfo::read(&path).unwrap();
        assert_eq!(read.inputs, info.inputs);
    }

    #[test]
    fn fresh_after_persist_dirty_after_touch() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.c");
        let output = dir.path().join("out.o");
        paths::write(&input, b"int main(){}").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        paths::write(&output, b"obj").unwrap();

        let fp = Fingerprint::new(output.clone(), vec![input.clone()]);
        assert_eq!(fp.check().unwrap(), Freshness::Dirty);
        fp.persist().unwrap();
        assert_eq!(fp.check().unwrap(), Freshness::Fresh);

        paths::write(&input, b"int main(){return 1;}").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        paths::write(&output, b"obj").unwrap();
        assert_eq!(fp.check().unwrap(), Freshness::Dirty);
    }
}
