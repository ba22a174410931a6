//! Audio encoder collaborator
//!
//! Transcoding goes through the [`Transcoder`] trait so the pipeline can be
//! exercised without an external process. [`FfmpegEncoder`] is the real
//! implementation and shells out to `ffmpeg`.

use log::debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::EncodeError;
use crate::OutputFormat;

const STDERR_TAIL_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Flac,
    Vorbis,
    Mp3,
}

impl AudioCodec {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Flac => "flac",
            AudioCodec::Vorbis => "libvorbis",
            AudioCodec::Mp3 => "libmp3lame",
        }
    }

    /// Codec used to produce a given output format, if it needs encoding at all.
    pub fn for_format(format: OutputFormat) -> Option<Self> {
        match format {
            OutputFormat::Wav => None,
            OutputFormat::Flac => Some(AudioCodec::Flac),
            OutputFormat::Ogg => Some(AudioCodec::Vorbis),
            OutputFormat::Mp3 => Some(AudioCodec::Mp3),
            OutputFormat::M4a => Some(AudioCodec::Aac),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub codec: AudioCodec,
    /// Map only the first input's audio streams, dropping video/cover streams.
    pub audio_only: bool,
}

impl TranscodeOptions {
    pub fn audio_only(codec: AudioCodec) -> Self {
        Self {
            codec,
            audio_only: true,
        }
    }
}

pub trait Transcoder {
    /// The command line `transcode` would run, for logging.
    fn compile(&self, input: &Path, output: &Path, options: &TranscodeOptions) -> Vec<String>;

    /// Blocks until the output file is complete.
    fn transcode(&self, input: &Path, output: &Path, options: &TranscodeOptions) -> Result<(), EncodeError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder for FfmpegEncoder {
    fn compile(&self, input: &Path, output: &Path, options: &TranscodeOptions) -> Vec<String> {
        let mut args = vec![
            self.program.display().to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
        ];
        if options.audio_only {
            args.push("-map".to_string());
            args.push("0:a".to_string());
        }
        args.push("-acodec".to_string());
        args.push(options.codec.ffmpeg_name().to_string());
        args.push(output.display().to_string());
        args
    }

    fn transcode(&self, input: &Path, output: &Path, options: &TranscodeOptions) -> Result<(), EncodeError> {
        let args = self.compile(input, output, options);
        debug!("Running {}", args.join(" "));

        // Pass the paths as OsStr so non-UTF-8 names survive.
        let mut command = Command::new(&self.program);
        command.args(["-hide_banner", "-nostdin", "-y", "-i"]).arg(input);
        if options.audio_only {
            command.args(["-map", "0:a"]);
        }
        command
            .args(["-acodec", options.codec.ffmpeg_name()])
            .arg(output)
            .stdin(Stdio::null());

        let result = command.output().map_err(|source| EncodeError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(EncodeError::Failed {
                status: result.status,
                stderr: tail,
            });
        }

        Ok(())
    }
}
