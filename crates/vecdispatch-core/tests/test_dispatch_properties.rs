//! Property tests for launch geometry.

use proptest::prelude::*;
use vecdispatch_core::dispatch::{plan, DispatchPlanner, RoundingPolicy};
use vecdispatch_core::DispatchError;

#[test]
fn test_known_geometries() {
    let cases = [
        (100_000, 256, 100_096),
        (256, 256, 512),
        (1, 64, 64),
        (0, 256, 256),
        (1000, 1, 1001),
    ];
    for (n, l, global) in cases {
        let p = plan(n, l).unwrap();
        assert_eq!(p.global_size(), global, "n={n} l={l}");
        assert_eq!(p.local_size(), l);
        assert_eq!(p.element_count(), n);
    }
}

#[test]
fn test_overflow_near_usize_max() {
    assert!(matches!(
        plan(usize::MAX, 2),
        Err(DispatchError::PlanOverflow { .. })
    ));
    assert!(matches!(
        DispatchPlanner::with_policy(RoundingPolicy::Ceiling).plan(usize::MAX, 2),
        Err(DispatchError::PlanOverflow { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Global size is a positive multiple of the local size that covers
    /// every element, with strictly less than one extra group of padding
    /// beyond `floor(n / l) * l`.
    #[test]
    fn prop_default_plan_is_valid(n in 0usize..10_000_000, l in 1usize..2048) {
        let p = plan(n, l).unwrap();
        prop_assert_eq!(p.global_size() % l, 0);
        prop_assert!(p.global_size() > 0);
        prop_assert!(p.global_size() >= n);
        prop_assert!(p.global_size() > n);
        prop_assert!(p.global_size() - n <= l);
        prop_assert_eq!(p.work_groups(), n / l + 1);
    }

    /// The ceiling policy is tight and never launches more than the default.
    #[test]
    fn prop_ceiling_is_tight(n in 0usize..10_000_000, l in 1usize..2048) {
        let tight = DispatchPlanner::with_policy(RoundingPolicy::Ceiling).plan(n, l).unwrap();
        let extra_group = plan(n, l).unwrap();

        prop_assert_eq!(tight.global_size() % l, 0);
        prop_assert!(tight.global_size() >= n);
        prop_assert!(tight.global_size() > 0);
        prop_assert!(n == 0 || tight.padding() < l);
        prop_assert!(tight.global_size() <= extra_group.global_size());
    }

    /// Planning is a pure function of its inputs.
    #[test]
    fn prop_plan_is_idempotent(n in any::<u32>(), l in 1usize..4096) {
        prop_assert_eq!(plan(n as usize, l).unwrap(), plan(n as usize, l).unwrap());
    }

    /// Exact multiples always receive one idle group under the default policy.
    #[test]
    fn prop_exact_multiple_gets_extra_group(k in 0usize..10_000, l in 1usize..1024) {
        let p = plan(k * l, l).unwrap();
        prop_assert_eq!(p.padding(), l);
    }
}
