//! Stochastic-depth math: guard-banded downsample sizing and the stratified
//! sample lookup tables used to compact multi-layer stochastic depth.
#![forbid(unsafe_code)]

mod error;
pub mod sizing;
pub mod stratified;

pub use error::SdMathError;
pub use sizing::{
    DEFAULT_GUARD_BAND_BUDGET, DISPATCH_GROUP_SIZE, GuardBandSpec, compute_extra_guard_band,
    compute_stochastic_map_size, dispatch_extent,
};
pub use stratified::{
    MAX_SAMPLE_COUNT, MAX_TABLE_SAMPLE_COUNT, StratifiedLookupTable, StratifiedTableCache,
    build_lookup_table,
};
