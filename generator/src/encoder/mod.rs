//! External converter invocation.
//!
//! Both converters are opaque command-line tools. Arguments are passed as a
//! list, never through a shell, and a non-zero exit status is an error that
//! carries the tool's stderr.

pub mod lac;
pub mod vgaudio;

use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("{tool} did not produce {}", .path.display())]
    OutputMissing { tool: String, path: PathBuf },
    #[error("Scratch directory {} already exists, remove it first", .path.display())]
    ScratchDirExists { path: PathBuf },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A program plus its argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// File name of the program, used in logs and errors.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Arguments as displayable strings.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

/// Captured result of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs converter invocations to completion.
pub trait ToolRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput, EncoderError>;
}

/// Runs tools as child processes of the generator.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput, EncoderError> {
        let tool = invocation.tool_name();
        debug!(
            "[ENCODER] Running: {} {}",
            invocation.program.display(),
            invocation.args_lossy().join(" ")
        );

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .map_err(|source| EncoderError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        for line in stdout.lines() {
            debug!("[ENCODER] {}: {}", tool, line);
        }
        for line in stderr.lines() {
            debug!("[ENCODER] {} (stderr): {}", tool, line);
        }

        if !output.status.success() {
            return Err(EncoderError::CommandFailed {
                tool,
                exit_code,
                stderr: stderr.trim_end().to_string(),
            });
        }

        Ok(ToolOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Create the parent directory of `path` if needed.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), EncoderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
