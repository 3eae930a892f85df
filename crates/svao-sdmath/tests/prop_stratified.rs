use proptest::prelude::*;
use svao_sdmath::{
    MAX_TABLE_SAMPLE_COUNT, SdMathError, StratifiedTableCache, build_lookup_table,
};

fn sample_count() -> impl Strategy<Value = u32> {
    // Tables up to 2^14 keep each case fast
    1u32..=14
}

proptest! {
    // lookup is a permutation of [0, 2^n)
    #[test]
    fn lookup_is_bijection(n in sample_count()) {
        let t = build_lookup_table(n).unwrap();
        let len = 1usize << n;
        prop_assert_eq!(t.len(), len);
        let mut seen = vec![false; len];
        for &m in t.lookup() {
            prop_assert!((m as usize) < len);
            prop_assert!(!seen[m as usize]);
            seen[m as usize] = true;
        }
        prop_assert!(seen.into_iter().all(|b| b));
    }

    // Every slot holds a mask whose popcount selects that slot's bucket
    #[test]
    fn masks_lie_in_their_bucket(n in sample_count()) {
        let t = build_lookup_table(n).unwrap();
        prop_assert_eq!(t.indices().len(), n as usize + 1);
        prop_assert_eq!(t.indices()[0], 0);
        for (slot, &m) in t.lookup().iter().enumerate() {
            let range = t.bucket(m.count_ones()).unwrap();
            prop_assert!(range.contains(&slot));
        }
        // Top bucket ends at the table length and holds the all-ones mask
        let top = t.bucket(n).unwrap();
        prop_assert_eq!(top.end, t.len());
        prop_assert_eq!(top.len(), 1);
        prop_assert_eq!(t.lookup()[top.start], (1u32 << n) - 1);
    }

    #[test]
    fn masks_ascend_within_bucket(n in sample_count()) {
        let t = build_lookup_table(n).unwrap();
        for pc in 0..=n {
            let r = t.bucket(pc).unwrap();
            let bucket = &t.lookup()[r];
            prop_assert!(bucket.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn slot_of_round_trips(n in sample_count(), raw in any::<u32>()) {
        let t = build_lookup_table(n).unwrap();
        let mask = raw & ((1u32 << n) - 1);
        let slot = t.slot_of(mask).unwrap();
        prop_assert_eq!(t.lookup()[slot], mask);
    }
}

#[test]
fn three_samples_exact() {
    let t = build_lookup_table(3).unwrap();
    assert_eq!(t.indices(), &[0, 1, 4, 7]);
    assert_eq!(t.lookup(), &[0, 1, 2, 4, 3, 5, 6, 7]);
}

#[test]
fn eight_sample_bucket_sizes_are_binomials() {
    let t = build_lookup_table(8).unwrap();
    let sizes: Vec<usize> = (0..=8).map(|pc| t.bucket(pc).unwrap().len()).collect();
    assert_eq!(sizes, vec![1, 8, 28, 56, 70, 56, 28, 8, 1]);
}

#[test]
fn largest_supported_table_builds() {
    let t = build_lookup_table(MAX_TABLE_SAMPLE_COUNT).unwrap();
    assert_eq!(t.len(), 1 << MAX_TABLE_SAMPLE_COUNT);
}

#[test]
fn invalid_counts_are_errors() {
    assert!(matches!(build_lookup_table(0), Err(SdMathError::InvalidSampleCount { .. })));
    assert!(matches!(build_lookup_table(40), Err(SdMathError::InvalidSampleCount { .. })));
    assert!(matches!(build_lookup_table(32), Err(SdMathError::TableTooLarge { .. })));
}

#[test]
fn cache_tracks_sample_count_changes() {
    let mut cache = StratifiedTableCache::new();
    for (n, expect_rebuild) in [(8, true), (8, false), (16, true), (16, false), (8, true)] {
        let (t, rebuilt) = cache.ensure(n).unwrap();
        assert_eq!(rebuilt, expect_rebuild, "n={n}");
        assert_eq!(t.sample_count(), n);
    }
    assert_eq!(cache.builds(), 3);
    cache.invalidate();
    assert!(cache.current().is_none());
    assert!(cache.ensure(16).unwrap().1);
}
