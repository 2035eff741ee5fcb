//! Response-file argument passing, for link lines long enough to exceed a
//! platform's command-line length limit.

use crate::utils::{paths, IResult};
use std::path::Path;

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Writes `args[1..]` to `rsp_file` and returns `[args[0], "@rsp_file"]` -
/// the invocation a linker/archiver accepts in place of a long argv.
pub fn argv_to_rsp(args: &[String], rsp_file: &Path) -> IResult<Vec<String>> {
    if args.len() < 2 {
        return Ok(args.to_vec());
    }
    let mut body = String::new();
    for entry in &args[1..] {
        if entry.contains('\\') || entry.contains('"') {
            body.push('"');
            body.push_str(&escape(entry));
            body.push_str("\"\n");
        } else {
            body.push_str(&escape(entry));
            body.push('\n');
        }
    }
    paths::write(rsp_file, body.as_bytes())?;
    Ok(vec![args[0].clone(), format!("@{}", rsp_file.display())])
}
