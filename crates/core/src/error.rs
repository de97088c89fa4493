use thiserror::Error;

use crate::package::ClassificationError;
use crate::resolve::ImportResolutionError;
use crate::synth::{InconsistentGraphError, LinkError};

/// Any failure while planning a build. Nothing partial is returned.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    ImportResolution(#[from] ImportResolutionError),
    #[error(transparent)]
    InconsistentGraph(#[from] InconsistentGraphError),
    #[error(transparent)]
    Link(#[from] LinkError),
}
