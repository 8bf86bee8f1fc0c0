// Editor command rendering, response framing helpers and JSON payload types.
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use super::client::PipeError;

/// Prefix of the status line the editor appends after every response payload.
pub const STATUS_PREFIX: &str = "BatchCommand finished: ";

/// Which metadata set a `GetInfo` command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    Tracks,
    Labels,
}

impl fmt::Display for InfoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoType::Tracks => write!(f, "Tracks"),
            InfoType::Labels => write!(f, "Labels"),
        }
    }
}

/// Commands sent from the generator to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    GetInfo {
        info: InfoType,
    },
    SetProjectRate {
        rate: u32,
    },
    // Time range on a single track, relative to project start
    SelectRange {
        start: f64,
        end: f64,
        track: usize,
    },
    SetMute {
        mute: bool,
    },
    Export {
        path: PathBuf,
        channels: u32,
    },
}

impl EditorCommand {
    pub fn get_tracks() -> Self {
        EditorCommand::GetInfo {
            info: InfoType::Tracks,
        }
    }

    pub fn get_labels() -> Self {
        EditorCommand::GetInfo {
            info: InfoType::Labels,
        }
    }

    /// Render the command as the single line the editor parses.
    ///
    /// The editor has no escape syntax for quoted values, so a filename
    /// containing a double quote is rejected instead of being mangled.
    pub fn render(&self) -> Result<String, PipeError> {
        let line = match self {
            EditorCommand::GetInfo { info } => format!("GetInfo: Type={}", info),
            EditorCommand::SetProjectRate { rate } => format!("SetProject: Rate={}", rate),
            EditorCommand::SelectRange { start, end, track } => format!(
                "Select: Start={} End={} RelativeTo=ProjectStart Track={} Mode=Set",
                start, end, track
            ),
            EditorCommand::SetMute { mute } => {
                format!("SetTrack: Mute={}", if *mute { 1 } else { 0 })
            }
            EditorCommand::Export { path, channels } => {
                let path = path.to_string_lossy();
                if path.contains('"') {
                    return Err(PipeError::UnquotableArgument(path.into_owned()));
                }
                format!("Export2: Filename=\"{}\" NumChannels={}", path, channels)
            }
        };
        Ok(line)
    }
}

/// Outcome reported on the trailing status line of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Failed,
}

/// Read the status line of a response, if the editor sent one.
pub fn command_status(response: &str) -> Option<CommandStatus> {
    let last = response.lines().rev().find(|line| !line.trim().is_empty())?;
    let status = last.trim().strip_prefix(STATUS_PREFIX)?;

    if status.starts_with("OK") {
        Some(CommandStatus::Ok)
    } else if status.starts_with("Failed") {
        Some(CommandStatus::Failed)
    } else {
        None
    }
}

/// Drop the trailing status line(s) of a response, leaving the JSON payload.
///
/// Line endings are normalized first, then the last two `\n`-separated
/// segments are removed. For the usual `payload\nstatus\n` shape that is the
/// status line plus the empty tail; for `payload\nstatus-1\nstatus-2` it is
/// both status lines.
pub fn strip_status_lines(response: &str) -> String {
    let normalized = response.replace("\r\n", "\n");
    normalized
        .rsplitn(3, '\n')
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Kind of an editor track as reported by `GetInfo: Type=Tracks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Wave,
    Label,
    Time,
    #[serde(other)]
    Other,
}

/// One entry of the `GetInfo: Type=Tracks` array.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInfo {
    pub kind: TrackKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub mute: Option<i64>,
    #[serde(default)]
    pub channels: Option<u32>,
}

impl TrackInfo {
    pub fn is_wave(&self) -> bool {
        self.kind == TrackKind::Wave
    }
}

/// A point or region label: `[time, end_time, "name"]` on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(f64, f64, String)")]
pub struct Label {
    pub time: f64,
    pub end_time: f64,
    pub name: String,
}

impl From<(f64, f64, String)> for Label {
    fn from((time, end_time, name): (f64, f64, String)) -> Self {
        Self {
            time,
            end_time,
            name,
        }
    }
}

impl Label {
    pub fn new(time: f64, name: &str) -> Self {
        Self {
            time,
            end_time: time,
            name: name.to_string(),
        }
    }
}

/// Labels of one label track: `[track_index, [label, ...]]` on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(usize, Vec<Label>)")]
pub struct LabelTrack {
    pub track_index: usize,
    pub labels: Vec<Label>,
}

impl From<(usize, Vec<Label>)> for LabelTrack {
    fn from((track_index, labels): (usize, Vec<Label>)) -> Self {
        Self {
            track_index,
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_command() {
        let cases = vec![
            (EditorCommand::get_tracks(), "GetInfo: Type=Tracks"),
            (EditorCommand::get_labels(), "GetInfo: Type=Labels"),
            (
                EditorCommand::SetProjectRate { rate: 32000 },
                "SetProject: Rate=32000",
            ),
            (
                EditorCommand::SelectRange {
                    start: 0.0,
                    end: 11.5,
                    track: 3,
                },
                "Select: Start=0 End=11.5 RelativeTo=ProjectStart Track=3 Mode=Set",
            ),
            (EditorCommand::SetMute { mute: false }, "SetTrack: Mute=0"),
            (EditorCommand::SetMute { mute: true }, "SetTrack: Mute=1"),
            (
                EditorCommand::Export {
                    path: PathBuf::from("/music/My Course/0.wav"),
                    channels: 2,
                },
                "Export2: Filename=\"/music/My Course/0.wav\" NumChannels=2",
            ),
        ];

        for (command, expected) in cases {
            assert_eq!(command.render().unwrap(), expected);
        }
    }

    #[test]
    fn export_rejects_quote_in_path() {
        let command = EditorCommand::Export {
            path: PathBuf::from("bad\"name.wav"),
            channels: 2,
        };
        assert!(matches!(
            command.render(),
            Err(PipeError::UnquotableArgument(_))
        ));
    }

    #[test]
    fn strips_single_status_line_with_trailing_newline() {
        let response = "[1, 2]\nBatchCommand finished: OK\n";
        assert_eq!(strip_status_lines(response), "[1, 2]");
    }

    #[test]
    fn strips_two_trailing_status_lines() {
        let response = "{\"a\":\n 1}\r\nstatus one\r\nstatus two";
        assert_eq!(strip_status_lines(response), "{\"a\":\n 1}");
    }

    #[test]
    fn reads_status_line() {
        assert_eq!(
            command_status("BatchCommand finished: OK\n"),
            Some(CommandStatus::Ok)
        );
        assert_eq!(
            command_status("Export failed\nBatchCommand finished: Failed!\n"),
            Some(CommandStatus::Failed)
        );
        assert_eq!(command_status("[]\n"), None);
        assert_eq!(command_status(""), None);
    }

    #[test]
    fn parses_track_list() {
        let json = r#"[
            {"name":"Intro","focused":1,"selected":0,"kind":"wave","start":0,"end":10.0,"pan":0,"gain":1,"channels":2,"solo":0,"mute":1},
            {"name":"Markers","focused":0,"selected":0,"kind":"label"},
            {"name":"Warp","kind":"time"},
            {"name":"Notes","kind":"note"}
        ]"#;
        let tracks: Vec<TrackInfo> = serde_json::from_str(json).unwrap();

        assert_eq!(tracks.len(), 4);
        assert!(tracks[0].is_wave());
        assert_eq!(tracks[0].end, Some(10.0));
        assert_eq!(tracks[0].mute, Some(1));
        assert_eq!(tracks[1].kind, TrackKind::Label);
        assert_eq!(tracks[1].end, None);
        assert_eq!(tracks[2].kind, TrackKind::Time);
        assert_eq!(tracks[3].kind, TrackKind::Other);
    }

    #[test]
    fn parses_label_tracks() {
        let json = r#"[[2, [[2.0, 2.0, "start"], [11.0, 11.5, "End"]]]]"#;
        let tracks: Vec<LabelTrack> = serde_json::from_str(json).unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_index, 2);
        assert_eq!(tracks[0].labels[0], Label::new(2.0, "start"));
        assert_eq!(tracks[0].labels[1].end_time, 11.5);
        assert_eq!(tracks[0].labels[1].name, "End");
    }
}
