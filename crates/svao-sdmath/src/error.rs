use svao_geom::Resolution;

/// Configuration errors raised at the sizing/indexing call boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SdMathError {
    #[error("resolution divisor must be at least 1 (got {0})")]
    InvalidDivisor(u32),

    #[error("resolution must be at least 1x1 (got {0})")]
    EmptyResolution(Resolution),

    #[error("extent {0} grown by {1} texels does not fit in u32")]
    ExtentOverflow(Resolution, u32),

    #[error("sample count must be in [1, {max}] (got {got})")]
    InvalidSampleCount { got: u32, max: u32 },

    #[error("a stratified table for {got} samples needs 2^{got} entries; at most {max} samples are supported")]
    TableTooLarge { got: u32, max: u32 },
}
