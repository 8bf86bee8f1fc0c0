// Synchronous pipe client for the editor's scripting interface.

use super::protocol::{command_status, strip_status_lines, CommandStatus, EditorCommand};
use crate::config::PipeSettings;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use thiserror::Error;

const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024; // 16MB safety limit

#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Pipe I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Editor closed the pipe before the response was complete")]
    Closed,
    #[error("Response exceeded {0} bytes")]
    ResponseTooLarge(usize),
    #[error("Malformed JSON response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("Editor rejected '{command}': {response}")]
    CommandFailed { command: String, response: String },
    #[error("Argument cannot be quoted for the editor: {0}")]
    UnquotableArgument(String),
}

/// Request/response client owning both pipe handles.
///
/// Handles are closed when the client is dropped, on success and error paths alike.
pub struct PipeClient<W: Write, R: BufRead> {
    to_editor: W,
    from_editor: R,
    eol: String,
}

impl PipeClient<File, BufReader<File>> {
    /// Open the editor's command and response pipes.
    ///
    /// The editor must already be running with the scripting module enabled,
    /// otherwise the pipes do not exist and this fails with an I/O error.
    pub fn open(settings: &PipeSettings) -> Result<Self, PipeError> {
        info!("[PIPE] Opening {}", settings.to_editor.display());
        let to_editor = OpenOptions::new().write(true).open(&settings.to_editor)?;

        info!("[PIPE] Opening {}", settings.from_editor.display());
        let from_editor = BufReader::new(File::open(&settings.from_editor)?);

        info!("[PIPE] Connected to editor");
        Ok(Self::new(to_editor, from_editor, &settings.eol))
    }
}

impl<W: Write, R: BufRead> PipeClient<W, R> {
    pub fn new(to_editor: W, from_editor: R, eol: &str) -> Self {
        Self {
            to_editor,
            from_editor,
            eol: eol.to_string(),
        }
    }

    /// Write one command plus the terminator and flush immediately.
    pub fn send(&mut self, command: &str) -> Result<(), PipeError> {
        debug!("[PIPE] Send: >>> {}", command);
        self.to_editor.write_all(command.as_bytes())?;
        self.to_editor.write_all(self.eol.as_bytes())?;
        self.to_editor.flush()?;
        Ok(())
    }

    /// Read one response: every line up to the first blank line that follows
    /// accumulated text. Blocks until the editor finishes the response.
    pub fn receive(&mut self) -> Result<String, PipeError> {
        let mut result = String::new();
        let mut line = String::new();

        loop {
            line.clear();
            let read = self.from_editor.read_line(&mut line)?;
            if read == 0 {
                return Err(PipeError::Closed);
            }

            let blank = line == "\n" || line == "\r\n";
            if blank && !result.is_empty() {
                break;
            }

            if result.len() + line.len() > MAX_RESPONSE_SIZE {
                return Err(PipeError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
            result.push_str(&line);
        }

        debug!("[PIPE] Response: <<< {}", result.trim_end());
        Ok(result)
    }

    /// Send a raw command line and return its response.
    pub fn do_command(&mut self, command: &str) -> Result<String, PipeError> {
        self.send(command)?;
        let response = self.receive()?;

        if command_status(&response) == Some(CommandStatus::Failed) {
            return Err(PipeError::CommandFailed {
                command: command.to_string(),
                response: response.trim_end().to_string(),
            });
        }

        Ok(response)
    }

    /// Send a raw command line and parse the JSON payload of its response.
    pub fn do_command_json<T: DeserializeOwned>(&mut self, command: &str) -> Result<T, PipeError> {
        let response = self.do_command(command)?;
        let payload = strip_status_lines(&response);
        Ok(serde_json::from_str(&payload)?)
    }

    /// Send a typed command.
    pub fn execute(&mut self, command: &EditorCommand) -> Result<String, PipeError> {
        let line = command.render()?;
        self.do_command(&line)
    }

    /// Send a typed query and parse its JSON payload.
    pub fn query<T: DeserializeOwned>(&mut self, command: &EditorCommand) -> Result<T, PipeError> {
        let line = command.render()?;
        self.do_command_json(&line)
    }

    /// Split the client back into its streams.
    pub fn into_parts(self) -> (W, R) {
        (self.to_editor, self.from_editor)
    }
}
