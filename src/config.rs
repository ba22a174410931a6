//! Command-line options and their resolution into an `ExtensionRequest`

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::OutputFormat;

pub const DEFAULT_MIN_DURATION_MULTIPLIER: f64 = 0.35;

/// Extend an audio track to a target length by repeating a detected loop.
#[derive(Parser, Debug, Clone)]
#[command(name = "auto-extend")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of file to extend
    #[arg(value_name = "INPUT_FILE_PATH")]
    pub input_file_path: PathBuf,

    /// Output directory [default: <directory containing INPUT_FILE_PATH>]
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Length (seconds) to extend to
    #[arg(short = 'l', long, value_name = "FLOAT")]
    pub extended_length: f64,

    /// The minimum loop duration as a multiplier of the audio track's total duration
    #[arg(long, value_name = "FLOAT", default_value_t = DEFAULT_MIN_DURATION_MULTIPLIER)]
    pub min_duration_multiplier: f64,

    /// Desired length of the loop fade out in seconds. If not provided, extend
    /// the track with all its sections (intro/loop/outro) without fading out;
    /// --extended-length is then treated as an 'at least' constraint.
    #[arg(long, value_name = "FLOAT")]
    pub fade_length: Option<f64>,

    /// Check the entire audio track instead of just the detected beats
    /// (may take several minutes to complete)
    #[arg(long)]
    pub brute_force: bool,

    #[arg(long)]
    pub show_progress_bar: bool,

    /// Audio format to use for the output audio file
    #[arg(short, long, default_value = "M4A", ignore_case = true)]
    #[arg(value_parser = ["WAV", "FLAC", "OGG", "MP3", "M4A"])]
    pub format: String,

    /// Pick the loop interactively from the ranked candidates
    #[arg(short, long)]
    pub interactive: bool,

    /// ffmpeg executable used for transcoding
    #[arg(long, value_name = "PATH", env = "AUTO_EXTEND_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,
}

/// Host platform, as far as encoder support is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
            Platform::Other => "this platform",
        }
    }

    // OGG output is unavailable on Windows.
    pub fn supports(self, format: OutputFormat) -> bool {
        !(format == OutputFormat::Ogg && self == Platform::Windows)
    }
}

/// A validated extension request. Built once per run, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub extended_length: f64,
    pub min_duration_multiplier: f64,
    /// `None` means no fade-out, and `extended_length` is a minimum.
    pub fade_length: Option<f64>,
    pub brute_force: bool,
    pub show_progress_bar: bool,
    pub interactive: bool,
    pub format: OutputFormat,
}

impl ExtensionRequest {
    /// Validate raw options and fill in defaults.
    pub fn resolve(cli: &Cli, platform: Platform) -> Result<Self, ValidationError> {
        let format: OutputFormat = cli
            .format
            .to_uppercase()
            .parse()
            .map_err(|_| ValidationError::UnknownFormat(cli.format.clone()))?;

        match cli.fade_length {
            Some(fade) if fade == 0.0 => return Err(ValidationError::ZeroFadeLength),
            Some(fade) if !fade.is_finite() || fade < 0.0 => {
                return Err(ValidationError::InvalidFadeLength(fade))
            }
            _ => {}
        }

        if !platform.supports(format) {
            return Err(ValidationError::FormatUnsupportedOnPlatform {
                format,
                platform: platform.name(),
            });
        }

        if !cli.extended_length.is_finite() || cli.extended_length <= 0.0 {
            return Err(ValidationError::InvalidExtendedLength(cli.extended_length));
        }

        if !(0.0..1.0).contains(&cli.min_duration_multiplier) {
            return Err(ValidationError::InvalidMinDurationMultiplier(
                cli.min_duration_multiplier,
            ));
        }

        let output_dir = cli
            .output_dir
            .clone()
            .unwrap_or_else(|| parent_dir(&cli.input_file_path));

        Ok(Self {
            input: cli.input_file_path.clone(),
            output_dir,
            extended_length: cli.extended_length,
            min_duration_multiplier: cli.min_duration_multiplier,
            fade_length: cli.fade_length,
            brute_force: cli.brute_force,
            show_progress_bar: cli.show_progress_bar,
            interactive: cli.interactive,
            format,
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["auto-extend"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_output_dir_to_input_parent() {
        let cli = parse(&["music/album/song.wav", "-l", "180"]);
        let request = ExtensionRequest::resolve(&cli, Platform::Linux).unwrap();

        assert_eq!(request.output_dir, PathBuf::from("music/album"));
        assert_eq!(request.format, OutputFormat::M4a);
        assert_eq!(request.fade_length, None);
        assert_eq!(request.min_duration_multiplier, 0.35);
        assert!(!request.interactive);
    }

    #[test]
    fn bare_file_name_resolves_to_current_dir() {
        let cli = parse(&["song.wav", "-l", "60"]);
        let request = ExtensionRequest::resolve(&cli, Platform::Linux).unwrap();
        assert_eq!(request.output_dir, PathBuf::from("."));
    }

    #[test]
    fn explicit_output_dir_is_kept() {
        let cli = parse(&["a/song.wav", "-l", "60", "-o", "/tmp/out"]);
        let request = ExtensionRequest::resolve(&cli, Platform::Linux).unwrap();
        assert_eq!(request.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn zero_fade_length_is_rejected() {
        let cli = parse(&["track.flac", "-l", "120", "--fade-length", "0"]);
        assert_eq!(
            ExtensionRequest::resolve(&cli, Platform::Linux),
            Err(ValidationError::ZeroFadeLength)
        );
    }

    #[test]
    fn negative_fade_length_is_rejected() {
        let cli = parse(&["track.flac", "-l", "120", "--fade-length=-3"]);
        assert_eq!(
            ExtensionRequest::resolve(&cli, Platform::Linux),
            Err(ValidationError::InvalidFadeLength(-3.0))
        );
    }

    #[test]
    fn ogg_is_rejected_on_windows_only() {
        let cli = parse(&["track.flac", "-l", "120", "-f", "OGG"]);
        assert!(matches!(
            ExtensionRequest::resolve(&cli, Platform::Windows),
            Err(ValidationError::FormatUnsupportedOnPlatform {
                format: OutputFormat::Ogg,
                ..
            })
        ));

        let request = ExtensionRequest::resolve(&cli, Platform::Linux).unwrap();
        assert_eq!(request.format, OutputFormat::Ogg);
    }

    #[test]
    fn format_is_case_insensitive() {
        let cli = parse(&["loop.mp3", "-l", "90", "--format", "flac"]);
        let request = ExtensionRequest::resolve(&cli, Platform::Windows).unwrap();
        assert_eq!(request.format, OutputFormat::Flac);
    }

    #[test]
    fn unknown_format_fails_to_parse() {
        let argv = ["auto-extend", "loop.mp3", "-l", "90", "-f", "AIFF"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn unknown_format_is_rejected_by_resolver() {
        let mut cli = parse(&["loop.mp3", "-l", "90"]);
        cli.format = "opus".to_string();
        assert_eq!(
            ExtensionRequest::resolve(&cli, Platform::Linux),
            Err(ValidationError::UnknownFormat("opus".to_string()))
        );
    }

    #[test]
    fn extended_length_must_be_positive() {
        let cli = parse(&["loop.mp3", "-l", "0"]);
        assert_eq!(
            ExtensionRequest::resolve(&cli, Platform::Linux),
            Err(ValidationError::InvalidExtendedLength(0.0))
        );
    }

    #[test]
    fn extended_length_is_required() {
        assert!(Cli::try_parse_from(["auto-extend", "loop.mp3"]).is_err());
    }

    #[test]
    fn multiplier_out_of_range_is_rejected() {
        let cli = parse(&["loop.mp3", "-l", "90", "--min-duration-multiplier", "1.5"]);
        assert_eq!(
            ExtensionRequest::resolve(&cli, Platform::Linux),
            Err(ValidationError::InvalidMinDurationMultiplier(1.5))
        );
    }

    #[test]
    fn flags_are_carried_on_the_request() {
        let cli = parse(&[
            "x.wav",
            "-l",
            "200",
            "--fade-length",
            "10",
            "--brute-force",
            "--show-progress-bar",
            "-i",
        ]);
        let request = ExtensionRequest::resolve(&cli, Platform::MacOs).unwrap();

        assert_eq!(request.fade_length, Some(10.0));
        assert!(request.brute_force);
        assert!(request.show_progress_bar);
        assert!(request.interactive);
    }
}
