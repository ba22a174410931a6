use log::{error, info};

use crate::encoder::{AudioCodec, TranscodeOptions, Transcoder};
use crate::error::EncodeError;
use crate::pipeline::{FinalArtifact, RawExtensionArtifact};
use crate::OutputFormat;

/// Produce the delivered file from the engine output. Only M4A needs a
/// transcode; every other format is written by the engine directly.
pub fn convert(raw: &RawExtensionArtifact<'_>, encoder: &dyn Transcoder) -> Result<FinalArtifact, EncodeError> {
    let format = raw.request.format;
    if format != OutputFormat::M4a {
        return Ok(FinalArtifact {
            path: raw.path.clone(),
        });
    }

    info!("Converting '{}' to {}", raw.path.display(), format);
    let output_path = raw.path.with_extension(format.extension());
    info!("'{}' -> '{}'", raw.path.display(), output_path.display());

    let options = TranscodeOptions::audio_only(AudioCodec::Aac);
    let command = encoder.compile(&raw.path, &output_path, &options).join(" ");
    info!("{command}");

    if let Err(e) = encoder.transcode(&raw.path, &output_path, &options) {
        error!("    {command}");
        return Err(e);
    }

    Ok(FinalArtifact { path: output_path })
}
