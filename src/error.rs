// Crate-wide error type

use std::io;
use thiserror::Error;

use crate::renderer::{BlendEquation, FaceCullingMode, Topology};

/// Errors surfaced by render preparation and the pipeline backends.
///
/// Contract violations (buffer index out of range and the like) are
/// assertions, not variants here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Stale {kind} handle")]
    StaleHandle { kind: &'static str },

    #[error("Topology {0:?} is not supported by this backend")]
    UnsupportedTopology(Topology),

    #[error("Cull mode {0:?} is not supported by this backend")]
    UnsupportedCullMode(FaceCullingMode),

    #[error("Blend equation {0:?} is not supported by this backend")]
    UnsupportedBlendEquation(BlendEquation),

    #[error("No shader module registered for program '{0}'")]
    MissingProgramModule(String),

    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn stale(kind: &'static str) -> Self {
        Error::StaleHandle { kind }
    }
}
