//! External command execution.
//!
//! The render collaborator is a child process that reads the document on
//! stdin and writes HTML on stdout.

use anyhow::{Context, Result, bail};
use std::{
    ffi::OsString,
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
    thread,
};

/// Run `cmd` with `args`, feed `input` on stdin and capture stdout.
///
/// A non-zero exit status is an error carrying the command's stderr.
pub fn exec_with_stdin(
    root: Option<&Path>,
    cmd: &[String],
    args: &[OsString],
    input: &[u8],
) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn `{name}`"))?;

    // stdin is fed from its own thread while stdout drains here.
    let mut stdin = child.stdin.take().context("Failed to acquire stdin")?;
    let input = input.to_vec();
    let writer = thread::spawn(move || stdin.write_all(&input));

    let output = child
        .wait_with_output()
        .with_context(|| format!("`{name}` process failed"))?;

    let written = writer.join();

    // A failing child usually closes stdin early; report its stderr first.
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "Command `{name}` failed with {}\n{}",
            output.status,
            stderr.trim_end()
        );
    }

    match written {
        Ok(result) => result.with_context(|| format!("Failed to write stdin of `{name}`"))?,
        Err(_) => bail!("stdin writer of `{name}` panicked"),
    }

    Ok(output)
}

fn prepare(root: Option<&Path>, cmd: &[String], args: &[OsString]) -> Result<(String, Command)> {
    let Some((program, prefix_args)) = cmd.split_first() else {
        bail!("Empty command");
    };

    let mut command = Command::new(program);
    command.args(prefix_args).args(args);
    if let Some(root) = root {
        command.current_dir(root);
    }

    Ok((program.clone(), command))
}
