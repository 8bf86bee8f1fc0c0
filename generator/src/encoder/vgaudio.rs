// Normal-speed BRSTM encoding with VGAudioCli.

use super::{ensure_parent_dir, EncoderError, ToolInvocation, ToolRunner};
use crate::loop_points::LoopBounds;
use log::info;
use std::path::{Path, PathBuf};

/// Output codec for the normal-speed container.
pub const OUTPUT_FORMAT: &str = "gd-adpcm";

/// Build the VGAudioCli argument list.
///
/// Every exported track becomes one `-i` input, so the channels end up in a
/// single multi-track container with the loop region applied to all of them.
pub fn build_invocation(
    program: &Path,
    inputs: &[PathBuf],
    output: &Path,
    bounds: LoopBounds,
) -> ToolInvocation {
    let mut invocation = ToolInvocation::new(program);
    for input in inputs {
        invocation = invocation.arg("-i").arg(input);
    }

    invocation
        .arg(output)
        .arg("-l")
        .arg(format!("{}-{}", bounds.start, bounds.end))
        .arg("--out-format")
        .arg(OUTPUT_FORMAT)
}

/// Encode the exported tracks into the normal-speed BRSTM.
pub fn convert(
    runner: &mut dyn ToolRunner,
    program: &Path,
    inputs: &[PathBuf],
    output: &Path,
    bounds: LoopBounds,
) -> Result<(), EncoderError> {
    ensure_parent_dir(output)?;

    let invocation = build_invocation(program, inputs, output, bounds);
    runner.run(&invocation)?;

    info!(
        "[ENCODER] Encoded {} tracks into {}",
        inputs.len(),
        output.display()
    );
    Ok(())
}
