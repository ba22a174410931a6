pub mod audio;
pub mod analysis;
pub mod arrange;
pub mod export;
pub mod engine;
pub mod encoder;
pub mod convert;
pub mod metadata;
pub mod config;
pub mod error;
pub mod pipeline;

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopPoints {
    pub start_sample: usize, // Interleaved index, always frame-aligned
    pub end_sample: usize,   // Exclusive; playback jumps back to start_sample here
    pub confidence: f32,     // Mean feature similarity around the two points
}

impl LoopPoints {
    pub fn len_samples(&self) -> usize {
        self.end_sample - self.start_sample
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    Wav,
    Flac,
    Ogg,
    Mp3,
    #[default]
    M4a,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Wav,
        OutputFormat::Flac,
        OutputFormat::Ogg,
        OutputFormat::Mp3,
        OutputFormat::M4a,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Wav => "WAV",
            OutputFormat::Flac => "FLAC",
            OutputFormat::Ogg => "OGG",
            OutputFormat::Mp3 => "MP3",
            OutputFormat::M4a => "M4A",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Flac => "flac",
            OutputFormat::Ogg => "ogg",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::M4a => "m4a",
        }
    }

    /// Format the extension engine is asked to produce. M4A is rendered as WAV
    /// and transcoded afterwards.
    pub fn engine_format(self) -> OutputFormat {
        match self {
            OutputFormat::M4a => OutputFormat::Wav,
            other => other,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    // Expects an already-uppercased name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| format!("unknown output format '{s}'"))
    }
}
