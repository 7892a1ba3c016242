//! Property tests for best-device selection.
//!
//! Devices are simulated, so any combination of metrics can be generated.

use proptest::prelude::*;
use vecdispatch_core::backend::{SimDeviceSpec, SimPlatform};
use vecdispatch_core::device::{DeviceClass, DeviceScore};
use vecdispatch_core::platform::Platform;
use vecdispatch_core::selector::{select_best, DeviceSelector};

fn platform(metrics: &[(u32, u32)]) -> SimPlatform {
    SimPlatform::new(
        metrics
            .iter()
            .enumerate()
            .map(|(i, &(units, clock))| SimDeviceSpec::accelerator(format!("dev{i}"), units, clock))
            .collect(),
    )
}

fn scores(metrics: &[(u32, u32)]) -> Vec<u64> {
    metrics
        .iter()
        .map(|&(u, c)| u64::from(u) * u64::from(c))
        .collect()
}

#[test]
fn test_known_device_lists() {
    let cases: &[(&[(u32, u32)], usize)] = &[
        (&[(10, 1000), (8, 1500)], 1),
        (&[(20, 1000), (10, 2000)], 0),
        (&[(16, 1200)], 0),
        (&[(0, 0), (0, 0), (0, 0)], 0),
        (&[(1, 1), (2, 2), (3, 3), (2, 5)], 3),
    ];
    for &(metrics, expected) in cases {
        let p = platform(metrics);
        let devices = p.enumerate(DeviceClass::All).unwrap();
        assert_eq!(select_best(&devices).unwrap().index, expected, "metrics {metrics:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The chosen device has the maximum score and is the earliest with it.
    #[test]
    fn prop_selects_first_maximum(
        metrics in prop::collection::vec((0u32..64, 0u32..4000), 1..24)
    ) {
        let p = platform(&metrics);
        let devices = p.enumerate(DeviceClass::All).unwrap();
        let selected = select_best(&devices).unwrap();

        let scores = scores(&metrics);
        let max = *scores.iter().max().unwrap();
        let first = scores.iter().position(|&s| s == max).unwrap();

        prop_assert!(selected.index < devices.len());
        prop_assert_eq!(selected.score(), DeviceScore(max));
        prop_assert_eq!(selected.index, first);
    }

    /// Scores never wrap, even at the top of the attribute range.
    #[test]
    fn prop_scores_are_exact(units in any::<u32>(), clock in any::<u32>()) {
        let p = platform(&[(units, clock)]);
        let devices = p.enumerate(DeviceClass::All).unwrap();
        let candidates = DeviceSelector::default().score_all(&devices).unwrap();
        prop_assert_eq!(candidates[0].score().value(), u64::from(units) * u64::from(clock));
    }

    /// Selection does not depend on anything but the metrics.
    #[test]
    fn prop_selection_is_deterministic(
        metrics in prop::collection::vec((0u32..8, 0u32..8), 1..12)
    ) {
        let p = platform(&metrics);
        let devices = p.enumerate(DeviceClass::All).unwrap();
        let first = select_best(&devices).unwrap().index;
        let second = select_best(&devices).unwrap().index;
        prop_assert_eq!(first, second);
    }
}
