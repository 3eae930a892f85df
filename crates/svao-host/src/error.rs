use thiserror::Error;

use crate::{BufferId, ProgramId, SamplerId, TextureId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("property `{key}`: expected {expected}, got {got}")]
    PropertyType {
        key: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("property `{key}` = {value} out of range ({allowed})")]
    PropertyRange {
        key: String,
        value: String,
        allowed: &'static str,
    },
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("unknown sampler {0:?}")]
    UnknownSampler(SamplerId),
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),
    #[error("invalid resource: {0}")]
    InvalidResource(String),
}
