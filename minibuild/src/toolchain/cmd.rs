use super::Error;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};

pub fn run_stdout(cmd: &mut Command, program: &str) -> Result<Vec<u8>, Error> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
    let mut child = run(cmd, program)?;
    let mut out = Vec::new();
    if let Some(stdout) = child.stdout.as_mut() {
        stdout.read_to_end(&mut out)?;
    }
    let status = wait_child(cmd, program, &mut child)?;
    verify_status(cmd, program, status)?;
    Ok(out)
}

pub fn run_stderr(cmd: &mut Command, program: &str) -> Result<Vec<u8>, Error> {
    cmd.stdout(Stdio::inherit()).stderr(Stdio::piped());
    let mut child = run(cmd, program)?;
    let mut out = Vec::new();
    if let Some(stderr) = child.stderr.as_mut() {
        stderr.read_to_end(&mut out)?;
    }
    let status = wait_child(cmd, program, &mut child)?;
    verify_status(cmd, program, status)?;
    Ok(out)
}

pub fn run(cmd: &mut Command, program: &str) -> Result<Child, Error> {
    cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::tool_not_found(format!("tool `{program}` not found on PATH")),
        _ => Error::tool_exec(format!("failed to spawn `{program}`: {e}")),
    })
}

pub fn verify_status(cmd: &Command, program: &str, status: ExitStatus) -> Result<(), Error> {
    if status.success() {
        return Ok(());
    }
    Err(Error::tool_exec(format!("`{program}` ({cmd:?}) exited with {status}")))
}

pub fn wait_child(cmd: &Command, program: &str, child: &mut Child) -> Result<ExitStatus, Error> {
    child.wait().map_err(|e| Error::tool_exec(format!("failed to wait on `{program}` ({cmd:?}): {e}")))
}

pub fn read_output<R: Read>(input: &mut Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(r) = input.as_mut() {
        let _ = r.read_to_end(&mut buf);
    }
    buf
}
