use indicatif::ProgressBar;
use std::path::Path;

const PROGRESS_CHUNK: u64 = 4096;

/// Write interleaved samples as a 32-bit float WAV, advancing `progress` by frames.
pub fn write_wav<P, I>(
    output_path: P,
    samples: I,
    channels: u16,
    sample_rate: u32,
    progress: &ProgressBar,
) -> Result<u64, hound::Error>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = f32>,
{
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(output_path, spec)?;
    let channels = u64::from(channels.max(1));

    let mut written: u64 = 0;
    for sample in samples {
        writer.write_sample(sample)?;
        written += 1;
        if written % (PROGRESS_CHUNK * channels) == 0 {
            progress.inc(PROGRESS_CHUNK);
        }
    }
    writer.finalize()?;

    let frames = written / channels;
    progress.set_position(frames);
    Ok(frames)
}
