use svao_host::HostError;
use svao_sdmath::SdMathError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PassError {
    #[error("property `{key}` = {value}: {reason}")]
    InvalidProperty {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    SdMath(#[from] SdMathError),
    #[error("graph: {0}")]
    Graph(String),
}

impl PassError {
    pub(crate) fn invalid(key: &'static str, value: impl ToString, reason: &'static str) -> Self {
        PassError::InvalidProperty {
            key,
            value: value.to_string(),
            reason,
        }
    }
}
