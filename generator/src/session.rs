//! One generator session: query the editor, export the wave tracks, encode
//! the normal and final lap BRSTMs, then remove the exported WAVs.

use crate::config::{ConfigError, GeneratorConfig};
use crate::encoder::{lac, vgaudio, EncoderError, ToolRunner};
use crate::ipc::protocol::{EditorCommand, LabelTrack, TrackInfo};
use crate::ipc::{PipeClient, PipeError};
use crate::loop_points::{compute_loop_bounds, LoopBounds, LoopError};
use log::{debug, info};
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

pub const NORMAL_OUTPUT_NAME: &str = "output_n.brstm";
pub const FAST_OUTPUT_NAME: &str = "output_f.brstm";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Editor pipe error: {0}")]
    Pipe(#[from] PipeError),
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid loop: {0}")]
    Loop(#[from] LoopError),
    #[error("The project has no wave tracks to export")]
    NoWaveTracks,
    #[error("Failed to create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Wave track together with its position in the editor's full track list.
#[derive(Debug, Clone)]
pub struct WaveTrack {
    pub index: usize,
    pub info: TrackInfo,
}

/// What a completed session produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub loop_bounds: LoopBounds,
    pub exported: Vec<PathBuf>,
    pub normal_output: PathBuf,
    pub fast_output: Option<PathBuf>,
}

/// Keep wave tracks, preserving their index among all tracks.
pub fn wave_tracks(tracks: Vec<TrackInfo>) -> Vec<WaveTrack> {
    tracks
        .into_iter()
        .enumerate()
        .filter(|(_, info)| info.is_wave())
        .map(|(index, info)| WaveTrack { index, info })
        .collect()
}

/// Open the editor pipes, run one session, and release the pipes on every path.
pub fn open_and_run(
    config: &GeneratorConfig,
    runner: &mut dyn ToolRunner,
) -> Result<SessionReport, SessionError> {
    config.validate()?;
    let mut client = PipeClient::open(&config.pipes)?;
    let result = run_session(&mut client, runner, config);
    drop(client);
    debug!("[PIPE] Pipes closed");
    result
}

/// Run one session against an already connected editor.
pub fn run_session<W: Write, R: BufRead>(
    client: &mut PipeClient<W, R>,
    runner: &mut dyn ToolRunner,
    config: &GeneratorConfig,
) -> Result<SessionReport, SessionError> {
    let session_start = Instant::now();

    info!("[SESSION] Getting track information from the editor");
    let tracks: Vec<TrackInfo> = client.query(&EditorCommand::get_tracks())?;
    let waves = wave_tracks(tracks);
    if waves.is_empty() {
        return Err(SessionError::NoWaveTracks);
    }

    info!("[SESSION] Setting sample rate to {}", config.sample_rate);
    client.execute(&EditorCommand::SetProjectRate {
        rate: config.sample_rate,
    })?;

    let labels: Vec<LabelTrack> = client.query(&EditorCommand::get_labels())?;
    let wave_infos: Vec<TrackInfo> = waves.iter().map(|w| w.info.clone()).collect();
    let bounds = compute_loop_bounds(
        &labels,
        &wave_infos,
        config.sample_rate,
        config.label_resolution,
    )?;
    info!(
        "[SESSION] Loop start: {}, loop end: {}",
        bounds.start, bounds.end
    );

    info!("[SESSION] Exporting {} audio tracks", waves.len());
    let end_seconds = bounds.end_seconds(config.sample_rate);
    let mut exported = Vec::with_capacity(waves.len());
    for wave in &waves {
        let path = config.export_path(wave.index);
        debug!("[SESSION] Exporting track {} to {}", wave.index, path.display());
        export_track(client, wave.index, end_seconds, &path, config.export_channels)?;
        exported.push(path);
    }

    let output_dir = config.output_path();
    fs::create_dir_all(&output_dir).map_err(|source| SessionError::CreateDir {
        path: output_dir.clone(),
        source,
    })?;
    let normal_output = output_dir.join(NORMAL_OUTPUT_NAME);

    info!("[SESSION] Converting to BRSTM (VGAudio)");
    vgaudio::convert(
        runner,
        &config.tools.vgaudio,
        &exported,
        &normal_output,
        bounds,
    )?;

    let fast_output = if config.final_lap.enabled {
        info!("[SESSION] Creating final lap BRSTM (LoopingAudioConverter)");
        let fast_output = output_dir.join(FAST_OUTPUT_NAME);
        lac::create_fast_variant(
            runner,
            &config.tools.looping_audio_converter,
            &normal_output,
            &fast_output,
            &config.scratch_path(),
            &config.final_lap,
        )?;
        Some(fast_output)
    } else {
        None
    };

    info!("[SESSION] Cleaning up");
    remove_exports(&exported)?;

    info!("[SESSION] Done in {:?}", session_start.elapsed());
    Ok(SessionReport {
        loop_bounds: bounds,
        exported,
        normal_output,
        fast_output,
    })
}

/// Select `[0, end_seconds]` on one track, unmute it and export it.
fn export_track<W: Write, R: BufRead>(
    client: &mut PipeClient<W, R>,
    index: usize,
    end_seconds: f64,
    path: &std::path::Path,
    channels: u32,
) -> Result<(), PipeError> {
    client.execute(&EditorCommand::SelectRange {
        start: 0.0,
        end: end_seconds,
        track: index,
    })?;
    client.execute(&EditorCommand::SetMute { mute: false })?;
    client.execute(&EditorCommand::Export {
        path: path.to_path_buf(),
        channels,
    })?;
    Ok(())
}

fn remove_exports(paths: &[PathBuf]) -> Result<(), SessionError> {
    for path in paths {
        fs::remove_file(path).map_err(|source| SessionError::Cleanup {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}
