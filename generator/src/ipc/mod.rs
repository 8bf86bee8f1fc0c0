// Audacity mod-script-pipe communication over two named pipes.
// Line-based text commands out, blank-line framed responses back.

pub mod client;
pub mod protocol;

pub use client::{PipeClient, PipeError};
pub use protocol::{EditorCommand, InfoType, Label, LabelTrack, TrackInfo, TrackKind};

/// Pipe the editor reads commands from.
#[cfg(windows)]
pub const TO_PIPE_NAME: &str = r"\\.\pipe\ToSrvPipe";
/// Pipe the editor writes responses to.
#[cfg(windows)]
pub const FROM_PIPE_NAME: &str = r"\\.\pipe\FromSrvPipe";
/// Command terminator expected by the editor.
#[cfg(windows)]
pub const EOL: &str = "\r\n\0";

#[cfg(not(windows))]
pub const TO_PIPE_PREFIX: &str = "/tmp/audacity_script_pipe.to.";
#[cfg(not(windows))]
pub const FROM_PIPE_PREFIX: &str = "/tmp/audacity_script_pipe.from.";
#[cfg(not(windows))]
pub const EOL: &str = "\n";
