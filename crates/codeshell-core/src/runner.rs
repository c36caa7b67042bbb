use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Captured result of one external process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    pub success: bool,
    pub output: String,
    pub error: String,
}

impl RunOutput {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Command not found: {0}")]
    NotFound(String),
    #[error("Working directory does not exist: {0}")]
    InvalidCwd(String),
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Executes external programs on behalf of the console.
///
/// A process that starts and exits non-zero is `Ok` with `success == false`;
/// `Err` means it never ran.
pub trait ProcessRunner {
    fn run(&mut self, program: &str, args: &[String], cwd: &str) -> Result<RunOutput, RunnerError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &mut R {
    fn run(&mut self, program: &str, args: &[String], cwd: &str) -> Result<RunOutput, RunnerError> {
        (**self).run(program, args, cwd)
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for Box<R> {
    fn run(&mut self, program: &str, args: &[String], cwd: &str) -> Result<RunOutput, RunnerError> {
        (**self).run(program, args, cwd)
    }
}

/// Runs programs found on `PATH` (or by explicit path) and waits for them.
///
/// An empty `cwd` inherits the current directory of this process. Any other
/// `cwd` must name an existing directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[String], cwd: &str) -> Result<RunOutput, RunnerError> {
        let dir = if cwd.is_empty() {
            None
        } else if Path::new(cwd).is_dir() {
            Some(Path::new(cwd))
        } else {
            return Err(RunnerError::InvalidCwd(cwd.to_string()));
        };
        let resolved = resolve_program(program, dir)?;
        debug!(program = %resolved.display(), ?args, cwd, "spawning process");

        let mut cmd = Command::new(&resolved);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|source| RunnerError::Spawn {
            program: program.to_string(),
            source,
        })?;
        Ok(RunOutput {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).to_string(),
            error: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

fn resolve_program(program: &str, cwd: Option<&Path>) -> Result<PathBuf, RunnerError> {
    let candidate = Path::new(program);
    if program.trim().is_empty() {
        return Err(RunnerError::NotFound(program.to_string()));
    }
    if candidate.components().count() > 1 {
        let full = match cwd {
            Some(dir) if candidate.is_relative() => dir.join(candidate),
            _ => candidate.to_path_buf(),
        };
        return if full.is_file() {
            Ok(full)
        } else {
            Err(RunnerError::NotFound(program.to_string()))
        };
    }
    which::which(program).map_err(|_| RunnerError::NotFound(program.to_string()))
}
