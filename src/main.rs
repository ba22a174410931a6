use auto_extend::config::{Cli, ExtensionRequest, Platform};
use auto_extend::encoder::FfmpegEncoder;
use auto_extend::engine::LoopExtender;
use auto_extend::metadata::{FiletimeDateCopier, LoftyMetadataCopier};
use auto_extend::pipeline::{self, Collaborators};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let request = ExtensionRequest::resolve(&cli, Platform::current())?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let encoder = FfmpegEncoder::new(&cli.ffmpeg);
    let engine = LoopExtender::new(&encoder);
    let collaborators = Collaborators {
        engine: &engine,
        encoder: &encoder,
        tags: &LoftyMetadataCopier,
        dates: &FiletimeDateCopier,
    };

    let output = pipeline::run(&request, &collaborators)?;
    println!("{}", output.path.display());
    Ok(())
}
