//! Stratified sample indexing for multi-layer stochastic depth.
//!
//! A stochastic depth texel stores one layer per active sample bit. Grouping
//! every possible activity mask by popcount gives each layer count a
//! contiguous slot range, so a shader can compact sparse layers with two
//! buffer reads and no sort:
//!
//! - `indices[k]` is the first slot of the popcount-`k` bucket
//!   (prefix sum of `C(n, 0..k)`).
//! - `lookup[slot]` is the mask stored at that slot; masks are ascending
//!   inside each bucket. Shaders depend on this exact order.

use std::ops::Range;
use std::sync::Arc;

use crate::SdMathError;

/// Activity masks are 32-bit.
pub const MAX_SAMPLE_COUNT: u32 = 32;

/// Largest sample count whose 2^n-entry table is built (4 MiB of lookup).
pub const MAX_TABLE_SAMPLE_COUNT: u32 = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StratifiedLookupTable {
    sample_count: u32,
    indices: Vec<u32>,
    lookup: Vec<u32>,
}

// Multiplicative form; every intermediate is itself a binomial so the
// division is exact.
fn binomial(n: u32, k: u32) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut c = 1u64;
    for i in 0..k {
        c = c * u64::from(n - i) / u64::from(i + 1);
    }
    c
}

/// Builds the popcount-bucketed lookup table for `sample_count` samples.
pub fn build_lookup_table(sample_count: u32) -> Result<StratifiedLookupTable, SdMathError> {
    if sample_count == 0 || sample_count > MAX_SAMPLE_COUNT {
        return Err(SdMathError::InvalidSampleCount {
            got: sample_count,
            max: MAX_SAMPLE_COUNT,
        });
    }
    if sample_count > MAX_TABLE_SAMPLE_COUNT {
        return Err(SdMathError::TableTooLarge {
            got: sample_count,
            max: MAX_TABLE_SAMPLE_COUNT,
        });
    }

    let n = sample_count;
    let entries = 1usize << n;

    let mut indices = Vec::with_capacity(n as usize + 1);
    indices.push(0u32);
    for i in 1..=n {
        let prev = indices[i as usize - 1];
        indices.push(prev + binomial(n, i - 1) as u32);
    }

    let mut cursor = indices.clone();
    let mut lookup = vec![0u32; entries];
    for mask in 0..entries as u32 {
        let pc = mask.count_ones() as usize;
        lookup[cursor[pc] as usize] = mask;
        cursor[pc] += 1;
    }

    log::debug!(
        "built stratified lookup table: samples={} entries={}",
        n,
        entries
    );

    Ok(StratifiedLookupTable {
        sample_count: n,
        indices,
        lookup,
    })
}

impl StratifiedLookupTable {
    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Bucket start offsets, `sample_count + 1` entries.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Slot → mask, `2^sample_count` entries.
    #[inline]
    pub fn lookup(&self) -> &[u32] {
        &self.lookup
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Slot range holding every mask with `popcount` set bits.
    /// The last bucket (all bits set) ends at the table length.
    pub fn bucket(&self, popcount: u32) -> Option<Range<usize>> {
        let pc = popcount as usize;
        let start = *self.indices.get(pc)? as usize;
        let end = self
            .indices
            .get(pc + 1)
            .map(|&e| e as usize)
            .unwrap_or(self.lookup.len());
        Some(start..end)
    }

    /// Inverse of `lookup`: the slot where `mask` is stored.
    pub fn slot_of(&self, mask: u32) -> Option<usize> {
        if mask as usize >= self.lookup.len() {
            return None;
        }
        let range = self.bucket(mask.count_ones())?;
        self.lookup[range.clone()]
            .binary_search(&mask)
            .ok()
            .map(|i| range.start + i)
    }
}

/// Keeps the last built table and rebuilds only when the sample count changes.
#[derive(Debug, Default)]
pub struct StratifiedTableCache {
    table: Option<Arc<StratifiedLookupTable>>,
    builds: u64,
}

impl StratifiedTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> Option<&Arc<StratifiedLookupTable>> {
        self.table.as_ref()
    }

    /// Number of tables built over the cache's lifetime.
    #[inline]
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Returns the table for `sample_count` and whether it was rebuilt.
    pub fn ensure(
        &mut self,
        sample_count: u32,
    ) -> Result<(Arc<StratifiedLookupTable>, bool), SdMathError> {
        if let Some(t) = &self.table {
            if t.sample_count() == sample_count {
                return Ok((Arc::clone(t), false));
            }
        }
        let t = Arc::new(build_lookup_table(sample_count)?);
        self.table = Some(Arc::clone(&t));
        self.builds += 1;
        Ok((t, true))
    }

    pub fn invalidate(&mut self) {
        self.table = None;
    }
}
