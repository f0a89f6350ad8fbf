//! Blocking child-process helpers shared by the script runner and the
//! external slicing strategy.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::error::CuratorError;

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

pub fn require_tool(name: &str) -> Result<PathBuf, CuratorError> {
    find_in_path(name).ok_or_else(|| CuratorError::MissingTool(name.to_string()))
}

/// Runs `program` to completion and returns its exit status. A process killed
/// by a signal is reported as [`CuratorError::Process`].
pub fn run_blocking(program: &Path, args: &[String]) -> Result<ExitStatus, CuratorError> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|err| CuratorError::Process(format!("{}: {err}", program.display())))?;
    if status.code().is_none() {
        return Err(CuratorError::Process(format!(
            "{} terminated by signal",
            program.display()
        )));
    }
    Ok(status)
}

/// Runs `program` and returns its standard output without the trailing newline.
pub fn run_capture(program: &Path, args: &[String]) -> Result<String, CuratorError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| CuratorError::Process(format!("{}: {err}", program.display())))?;
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        return Ok(stdout.trim_end_matches(['\n', '\r']).to_string());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("command failed: {}", program.display())
    } else {
        stderr
    };
    Err(CuratorError::Process(message))
}
