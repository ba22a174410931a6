//! Loop extension engine
//!
//! Finds a loop in the input track, renders an extended version and writes it
//! in the requested engine format (WAV, or FLAC/OGG/MP3 through the encoder).

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::{self, LoopSearch};
use crate::arrange::{ExtendedSource, Extension};
use crate::audio::{self, AudioData};
use crate::encoder::{AudioCodec, TranscodeOptions, Transcoder};
use crate::error::EngineError;
use crate::export;
use crate::{LoopPoints, OutputFormat};

/// Everything the engine needs for one extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendParams {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub min_duration_multiplier: f64,
    pub extended_length: f64,
    /// Seconds; 0 means no fade.
    pub fade_length: f64,
    /// Treat `extended_length` as a minimum and keep the outro.
    pub disable_fade_out: bool,
    /// No progress display.
    pub batch_mode: bool,
    pub brute_force: bool,
    pub interactive: bool,
    pub format: OutputFormat,
}

pub trait LoopExtensionEngine {
    /// Produce the extended track and return its path.
    fn extend(&self, params: &ExtendParams) -> Result<PathBuf, EngineError>;
}

pub struct LoopExtender<'a> {
    encoder: &'a dyn Transcoder,
}

impl<'a> LoopExtender<'a> {
    pub fn new(encoder: &'a dyn Transcoder) -> Self {
        Self { encoder }
    }

    fn select(&self, params: &ExtendParams, candidates: &[LoopPoints], audio: &AudioData) -> Result<LoopPoints, EngineError> {
        let index = if params.interactive {
            let stdin = io::stdin();
            let stdout = io::stdout();
            choose_candidate(candidates, audio, &mut stdin.lock(), &mut stdout.lock()).map_err(EngineError::Selection)?
        } else {
            0
        };
        Ok(candidates[index])
    }

    fn render(&self, params: &ExtendParams, audio: &AudioData, points: LoopPoints) -> Result<PathBuf, EngineError> {
        let fade = (!params.disable_fade_out && params.fade_length > 0.0).then_some(params.fade_length);
        let extension = Extension::plan(audio, &points, params.extended_length, fade);
        let total_frames = extension.total_frames(audio, &points);
        let seconds = (total_frames as f64 / audio.sample_rate as f64).round() as u64;

        let wav_path = output_path(&params.input, &params.output_dir, seconds, OutputFormat::Wav);
        info!(
            "Rendering {:.1}s ({:?}) to '{}'",
            total_frames as f64 / audio.sample_rate as f64,
            extension,
            wav_path.display()
        );

        let progress = if params.batch_mode {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(total_frames as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb.set_message("Rendering");
            pb
        };

        let source = ExtendedSource::new(audio, points, extension);
        export::write_wav(&wav_path, source, audio.channels, audio.sample_rate, &progress).map_err(|source| {
            EngineError::Write {
                path: wav_path.clone(),
                source,
            }
        })?;
        progress.finish_and_clear();

        let Some(codec) = AudioCodec::for_format(params.format) else {
            return Ok(wav_path);
        };

        let final_path = output_path(&params.input, &params.output_dir, seconds, params.format);
        info!("Encoding '{}' as {}", final_path.display(), params.format);
        self.encoder
            .transcode(&wav_path, &final_path, &TranscodeOptions::audio_only(codec))?;
        std::fs::remove_file(&wav_path).map_err(|source| EngineError::Io {
            path: wav_path.clone(),
            source,
        })?;
        Ok(final_path)
    }
}

impl LoopExtensionEngine for LoopExtender<'_> {
    fn extend(&self, params: &ExtendParams) -> Result<PathBuf, EngineError> {
        if params.format == OutputFormat::M4a {
            return Err(EngineError::UnsupportedFormat(params.format));
        }

        info!("Loading audio: '{}'", params.input.display());
        let audio = audio::load_audio_file(&params.input).map_err(|e| EngineError::Decode {
            path: params.input.clone(),
            reason: format!("{e:#}"),
        })?;
        info!(
            "Audio loaded. Sample rate: {}, Channels: {}, Duration: {:.2}s",
            audio.sample_rate,
            audio.channels,
            audio.duration_secs()
        );

        let spinner = if params.batch_mode {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_message(if params.brute_force {
                "Finding loop points (brute force)..."
            } else {
                "Finding loop points..."
            });
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        };
        let search = LoopSearch {
            min_duration_multiplier: params.min_duration_multiplier,
            brute_force: params.brute_force,
            ..Default::default()
        };
        let result = analysis::run_analysis(&audio, &search);
        spinner.finish_and_clear();

        if let Some(fade) = &result.fade_out {
            info!(
                "Existing fade-out detected at {:.2}s, loop ends are kept before it",
                fade.start_frame as f64 / audio.sample_rate as f64
            );
        }
        if result.candidates.is_empty() {
            return Err(EngineError::NoLoopFound {
                path: params.input.clone(),
            });
        }
        info!("Found {} loop candidates ({} onsets)", result.candidates.len(), result.onset_count);

        let points = self.select(params, &result.candidates, &audio)?;
        let channels = audio.channels.max(1) as usize;
        info!(
            "Using loop {} -> {} (confidence {:.3})",
            format_time(points.start_sample / channels, audio.sample_rate),
            format_time(points.end_sample / channels, audio.sample_rate),
            points.confidence
        );
        if points.confidence < 0.5 {
            warn!("Loop confidence is low; the seam may be audible");
        }

        self.render(params, &audio, points)
    }
}

/// `<output_dir>/<input stem>-extended-<seconds>s.<ext>`
pub fn output_path(input: &Path, output_dir: &Path, seconds: u64, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    output_dir.join(format!("{stem}-extended-{seconds}s.{}", format.extension()))
}

/// Print the ranked candidates and read the chosen index. An empty line or
/// end of input picks the best one.
pub fn choose_candidate<R: BufRead, W: Write>(
    candidates: &[LoopPoints],
    audio: &AudioData,
    input: &mut R,
    output: &mut W,
) -> io::Result<usize> {
    if candidates.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no loop candidates to choose from"));
    }
    let channels = audio.channels.max(1) as usize;
    writeln!(output, "{:>5}  {:>10}  {:>10}  {:>10}  {:>6}", "Index", "Start", "End", "Length", "Score")?;
    for (i, c) in candidates.iter().enumerate() {
        writeln!(
            output,
            "{:>5}  {:>10}  {:>10}  {:>10}  {:>6.3}",
            i,
            format_time(c.start_sample / channels, audio.sample_rate),
            format_time(c.end_sample / channels, audio.sample_rate),
            format_time(c.len_samples() / channels, audio.sample_rate),
            c.confidence
        )?;
    }

    let mut line = String::new();
    loop {
        write!(output, "Enter the index of the loop to use [0]: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(0);
        }
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(0);
        }
        match answer.parse::<usize>() {
            Ok(i) if i < candidates.len() => return Ok(i),
            _ => writeln!(output, "Please enter a number between 0 and {}.", candidates.len() - 1)?,
        }
    }
}

fn format_time(frames: usize, sample_rate: u32) -> String {
    let secs = frames as f64 / sample_rate.max(1) as f64;
    let minutes = (secs / 60.0).floor();
    format!("{}:{:06.3}", minutes as u64, secs - minutes * 60.0)
}
