//! Reduced-resolution stochastic depth map sizing with a guard band.
//!
//! The guard band is specified in full-resolution pixels and converted to
//! downsampled texels, so the band covers the same screen-space width at any
//! divisor.

use std::num::NonZeroU32;

use svao_geom::Resolution;

use crate::SdMathError;

/// Guard band width in full-resolution pixels used when none is given.
pub const DEFAULT_GUARD_BAND_BUDGET: u32 = 512;

/// Compute passes run 32x32 thread groups.
pub const DISPATCH_GROUP_SIZE: u32 = 32;

const DISPATCH_GROUP: NonZeroU32 = NonZeroU32::new(DISPATCH_GROUP_SIZE).unwrap();

#[inline]
fn checked_divisor(divisor: u32) -> Result<NonZeroU32, SdMathError> {
    NonZeroU32::new(divisor).ok_or(SdMathError::InvalidDivisor(divisor))
}

/// Guard band width in downsampled texels: `budget / divisor`, floored.
pub fn compute_extra_guard_band(divisor: u32, guard_band_budget: u32) -> Result<u32, SdMathError> {
    let d = checked_divisor(divisor)?;
    Ok(guard_band_budget / d.get())
}

/// Size of the stochastic depth map for a full-resolution target.
///
/// Each axis is ceil-divided by `divisor`; with `include_guard_band` the
/// extra guard band is added on both sides of each axis.
pub fn compute_stochastic_map_size(
    full_res: Resolution,
    include_guard_band: bool,
    divisor: u32,
    guard_band_budget: u32,
) -> Result<Resolution, SdMathError> {
    let d = checked_divisor(divisor)?;
    if full_res.is_empty() {
        return Err(SdMathError::EmptyResolution(full_res));
    }
    let size = full_res.div_ceil(d);
    if !include_guard_band {
        return Ok(size);
    }
    let border = guard_band_budget / d.get();
    size.checked_expand(border)
        .ok_or(SdMathError::ExtentOverflow(size, border))
}

/// Working extent rounded up to whole thread groups, as handed to `dispatch`.
#[inline]
pub fn dispatch_extent(working: Resolution) -> Result<Resolution, SdMathError> {
    working
        .checked_round_up(DISPATCH_GROUP)
        .ok_or(SdMathError::ExtentOverflow(working, DISPATCH_GROUP_SIZE))
}

/// Divisor plus guard-band budget, validated once and reused per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardBandSpec {
    divisor: NonZeroU32,
    budget: u32,
}

impl Default for GuardBandSpec {
    fn default() -> Self {
        Self {
            divisor: NonZeroU32::MIN,
            budget: DEFAULT_GUARD_BAND_BUDGET,
        }
    }
}

impl GuardBandSpec {
    pub fn new(divisor: u32, guard_band_budget: u32) -> Result<Self, SdMathError> {
        Ok(Self {
            divisor: checked_divisor(divisor)?,
            budget: guard_band_budget,
        })
    }

    #[inline]
    pub fn divisor(&self) -> u32 {
        self.divisor.get()
    }

    #[inline]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    #[inline]
    pub fn extra_guard_band(&self) -> u32 {
        self.budget / self.divisor.get()
    }

    pub fn map_size(&self, full_res: Resolution, include_guard_band: bool) -> Result<Resolution, SdMathError> {
        compute_stochastic_map_size(full_res, include_guard_band, self.divisor.get(), self.budget)
    }
}
