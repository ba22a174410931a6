//! Extension pipeline
//!
//! extend -> convert -> propagate metadata -> clean up, strictly in that
//! order. Each stage takes the previous stage's output. Nothing is rolled
//! back on failure.

use log::info;
use std::path::PathBuf;

use crate::config::ExtensionRequest;
use crate::convert;
use crate::encoder::Transcoder;
use crate::engine::{ExtendParams, LoopExtensionEngine};
use crate::error::{ExtendError, Result};
use crate::metadata::{self, FileDateCopier, MetadataCopier};

/// Lossless file written by the engine, owned by the pipeline until it is
/// either delivered as-is or deleted after a transcode.
#[derive(Debug)]
pub struct RawExtensionArtifact<'r> {
    pub path: PathBuf,
    pub request: &'r ExtensionRequest,
}

/// The file handed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    pub path: PathBuf,
}

/// External collaborators of one run.
pub struct Collaborators<'a> {
    pub engine: &'a dyn LoopExtensionEngine,
    pub encoder: &'a dyn Transcoder,
    pub tags: &'a dyn MetadataCopier,
    pub dates: &'a dyn FileDateCopier,
}

/// Engine parameters for a request.
pub fn engine_params(request: &ExtensionRequest) -> ExtendParams {
    ExtendParams {
        input: request.input.clone(),
        output_dir: request.output_dir.clone(),
        min_duration_multiplier: request.min_duration_multiplier,
        extended_length: request.extended_length,
        fade_length: request.fade_length.unwrap_or(0.0),
        disable_fade_out: request.fade_length.is_none(),
        batch_mode: !request.show_progress_bar,
        brute_force: request.brute_force,
        interactive: request.interactive,
        format: request.format.engine_format(),
    }
}

pub fn extend<'r>(request: &'r ExtensionRequest, engine: &dyn LoopExtensionEngine) -> Result<RawExtensionArtifact<'r>> {
    let path = engine.extend(&engine_params(request))?;
    Ok(RawExtensionArtifact { path, request })
}

/// Delete the raw artifact if a transcode replaced it.
pub fn cleanup(raw: RawExtensionArtifact<'_>, final_artifact: &FinalArtifact) -> Result<()> {
    if raw.path == final_artifact.path {
        return Ok(());
    }
    info!("Deleting '{}'", raw.path.display());
    std::fs::remove_file(&raw.path).map_err(|source| ExtendError::Cleanup {
        path: raw.path.clone(),
        source,
    })
}

pub fn run(request: &ExtensionRequest, collaborators: &Collaborators<'_>) -> Result<FinalArtifact> {
    let raw = extend(request, collaborators.engine)?;
    let final_artifact = convert::convert(&raw, collaborators.encoder)?;
    metadata::propagate(
        &request.input,
        &final_artifact.path,
        collaborators.tags,
        collaborators.dates,
    )?;
    cleanup(raw, &final_artifact)?;
    Ok(final_artifact)
}
