use anyhow::Result;
use auto_extend::analysis::{self, LoopSearch};
use auto_extend::audio;
use clap::Parser;
use std::path::PathBuf;

/// Print the loop candidates found in a file without rendering anything.
#[derive(Parser)]
struct Args {
    input: PathBuf,
    #[arg(long, default_value_t = 0.35)]
    min_duration_multiplier: f64,
    #[arg(long)]
    brute_force: bool,
    #[arg(long, default_value_t = 10)]
    max_candidates: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Loading file: {}", args.input.display());
    let audio_data = audio::load_audio_file(&args.input)?;
    println!(
        "Loaded. Sample Rate: {}, Channels: {}, Duration: {:.2}s",
        audio_data.sample_rate,
        audio_data.channels,
        audio_data.duration_secs()
    );

    let search = LoopSearch {
        min_duration_multiplier: args.min_duration_multiplier,
        brute_force: args.brute_force,
        max_candidates: args.max_candidates,
    };
    let result = analysis::run_analysis(&audio_data, &search);

    let rate = audio_data.sample_rate as f64;
    let channels = audio_data.channels.max(1) as usize;
    println!(
        "Content ends at {:.2}s, {} onsets",
        result.content_end as f64 / rate,
        result.onset_count
    );
    match &result.fade_out {
        Some(fade) => println!(
            "Fade-out from {:.2}s ({:.2}s long)",
            fade.start_frame as f64 / rate,
            fade.duration_frames as f64 / rate
        ),
        None => println!("No fade-out detected"),
    }

    if result.candidates.is_empty() {
        println!("No loop candidates.");
        return Ok(());
    }

    println!("--- Loop candidates ---");
    for (i, c) in result.candidates.iter().enumerate() {
        let start = (c.start_sample / channels) as f64 / rate;
        let end = (c.end_sample / channels) as f64 / rate;
        println!(
            "{}. {:.3}s -> {:.3}s (length {:.3}s), score {:.4}",
            i + 1,
            start,
            end,
            end - start,
            c.confidence
        );
    }

    Ok(())
}
