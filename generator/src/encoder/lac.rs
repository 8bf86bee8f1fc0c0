// Final lap variant with LoopingAudioConverter.
//
// LAC reads its options from an XML document. Only the output directory,
// pitch and tempo change between runs; everything else is the fixed preset below.

use super::{ensure_parent_dir, EncoderError, ToolInvocation, ToolRunner};
use crate::config::FinalLapSettings;
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the generated options document inside the scratch directory.
pub const OPTIONS_FILE_NAME: &str = "lac.xml";

const OPTIONS_TEMPLATE: &str = r#"<?xml version="1.0"?>
<Options xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <OutputDir>{OUTPUT_DIR}</OutputDir>
  <InputDir />
  <Channels xsi:nil="true" />
  <SampleRate xsi:nil="true" />
  <AmplifydB xsi:nil="true" />
  <AmplifyRatio xsi:nil="true" />
  <PitchSemitones>{PITCH_SEMITONES}</PitchSemitones>
  <TempoRatio>{TEMPO_RATIO}</TempoRatio>
  <DefaultInputDuration />
  <ChannelSplit>OneFile</ChannelSplit>
  <ExporterType>VGAudio_BRSTM</ExporterType>
  <AACEncodingParameters />
  <OggVorbisEncodingParameters />
  <MP3FFmpegParameters />
  <AACFFmpegParameters />
  <AdxOptions>
    <TrimFile>true</TrimFile>
    <Version>4</Version>
    <FrameSize>18</FrameSize>
    <Filter>2</Filter>
    <Type>Linear</Type>
    <EncryptionType>None</EncryptionType>
    <KeyCode xsi:nil="true" />
  </AdxOptions>
  <HcaOptions>
    <TrimFile>true</TrimFile>
    <Quality>NotSet</Quality>
    <LimitBitrate>false</LimitBitrate>
    <Bitrate>0</Bitrate>
    <KeyCode xsi:nil="true" />
  </HcaOptions>
  <BxstmOptions>
    <TrimFile>true</TrimFile>
    <RecalculateSeekTable>true</RecalculateSeekTable>
    <RecalculateLoopContext>true</RecalculateLoopContext>
    <SamplesPerInterleave>14336</SamplesPerInterleave>
    <SamplesPerSeekTableEntry>14336</SamplesPerSeekTableEntry>
    <LoopPointAlignment>14336</LoopPointAlignment>
    <Codec>GcAdpcm</Codec>
    <Endianness xsi:nil="true" />
    <Version>
      <UseDefault>true</UseDefault>
      <Major>0</Major>
      <Minor>0</Minor>
      <Micro>0</Micro>
      <Revision>0</Revision>
    </Version>
    <TrackType>Standard</TrackType>
    <SeekTableType>Standard</SeekTableType>
  </BxstmOptions>
  <WaveEncoding>PCM8</WaveEncoding>
  <InputLoopBehavior>ForceLoop</InputLoopBehavior>
  <ExportWholeSong>true</ExportWholeSong>
  <WholeSongExportByDesiredDuration>false</WholeSongExportByDesiredDuration>
  <WholeSongSuffix />
  <NumberOfLoops>1</NumberOfLoops>
  <DesiredDuration>900</DesiredDuration>
  <FadeOutSec>0</FadeOutSec>
  <ExportPreLoop>false</ExportPreLoop>
  <PreLoopSuffix> (beginning)</PreLoopSuffix>
  <ExportLoop>false</ExportLoop>
  <LoopSuffix> (loop)</LoopSuffix>
  <ExportPostLoop>false</ExportPostLoop>
  <PostLoopSuffix> (end)</PostLoopSuffix>
  <ExportLastLap>false</ExportLastLap>
  <LastLapSuffix> (final lap)</LastLapSuffix>
  <BypassEncoding>false</BypassEncoding>
</Options>"#;

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Fill the options template.
pub fn render_options(output_dir: &Path, pitch_semitones: f64, tempo_ratio: f64) -> String {
    OPTIONS_TEMPLATE
        .replace("{OUTPUT_DIR}", &escape_xml(&output_dir.to_string_lossy()))
        .replace("{PITCH_SEMITONES}", &pitch_semitones.to_string())
        .replace("{TEMPO_RATIO}", &tempo_ratio.to_string())
}

/// Scratch directory removed when dropped.
///
/// Only a directory created here is ever removed; an existing one is refused
/// so that no pre-existing content can be deleted.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(path: &Path) -> Result<Self, EncoderError> {
        ensure_parent_dir(path)?;
        match fs::create_dir(path) {
            Ok(()) => Ok(Self {
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(EncoderError::ScratchDirExists {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(
                "[ENCODER] Failed to remove scratch directory {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Build the LAC argument list.
pub fn build_invocation(program: &Path, options_path: &Path, input: &Path) -> ToolInvocation {
    ToolInvocation::new(program)
        .arg(options_path)
        .arg(input)
        .arg("--auto")
}

/// Produce the pitch/tempo-shifted variant of `input` at `output`.
///
/// LAC writes `<scratch_dir>/<input file name>`; that file is copied to
/// `output` and the scratch directory is removed whether or not the run
/// succeeded.
pub fn create_fast_variant(
    runner: &mut dyn ToolRunner,
    program: &Path,
    input: &Path,
    output: &Path,
    scratch_dir: &Path,
    settings: &FinalLapSettings,
) -> Result<(), EncoderError> {
    let scratch = ScratchDir::create(scratch_dir)?;

    let options_path = scratch.path.join(OPTIONS_FILE_NAME);
    let options = render_options(
        &scratch.path,
        settings.pitch_semitones,
        settings.tempo_ratio,
    );
    fs::write(&options_path, options)?;

    let invocation = build_invocation(program, &options_path, input);
    runner.run(&invocation)?;

    let produced = match input.file_name() {
        Some(name) => scratch.path.join(name),
        None => scratch.path.clone(),
    };
    if !produced.is_file() {
        return Err(EncoderError::OutputMissing {
            tool: invocation.tool_name(),
            path: produced,
        });
    }

    ensure_parent_dir(output)?;
    fs::copy(&produced, output)?;

    info!(
        "[ENCODER] Final lap variant written to {} (pitch {:+} semitones, tempo x{})",
        output.display(),
        settings.pitch_semitones,
        settings.tempo_ratio
    );
    Ok(())
}
