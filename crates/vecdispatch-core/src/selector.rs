//! Device selection by performance heuristic.
//!
//! Candidates are ranked by `compute_units * clock_mhz`. The first
//! enumerated device seeds the scan with its real score and a later
//! candidate only replaces the current best on a strictly greater score,
//! so ties (including all-zero devices) resolve to the earliest candidate.

use crate::device::{ComputeDevice, DeviceClass, DeviceMetrics, DeviceScore};
use crate::error::{DispatchError, Result};
use tracing::{debug, info};

/// A scored candidate device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Candidate {
    /// Position in the enumeration order
    pub index: usize,
    /// Metrics read from the device
    pub metrics: DeviceMetrics,
}

impl Candidate {
    /// Score of this candidate.
    pub fn score(&self) -> DeviceScore {
        self.metrics.score()
    }
}

/// The device chosen for a dispatch.
#[derive(Debug)]
pub struct SelectionResult<'a, D> {
    /// Borrowed handle to the selected device
    pub device: &'a D,
    /// Position of the device in the enumeration order
    pub index: usize,
    /// Metrics the decision was based on
    pub metrics: DeviceMetrics,
}

impl<D> SelectionResult<'_, D> {
    /// Score of the selected device.
    pub fn score(&self) -> DeviceScore {
        self.metrics.score()
    }
}

impl<D> Clone for SelectionResult<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for SelectionResult<'_, D> {}

/// Picks the highest-scoring device out of an enumerated list.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSelector {
    class: DeviceClass,
}

impl DeviceSelector {
    /// Creates a selector for devices of the given class.
    ///
    /// The class is only used to label a `NoDevicesFound` error.
    pub fn for_class(class: DeviceClass) -> Self {
        Self { class }
    }

    /// Selects the best device.
    ///
    /// Fails with `NoDevicesFound` when `devices` is empty and with
    /// `DeviceQuery` as soon as any candidate's metrics cannot be read.
    pub fn select_best<'a, D: ComputeDevice>(
        &self,
        devices: &'a [D],
    ) -> Result<SelectionResult<'a, D>> {
        let (first, rest) = devices
            .split_first()
            .ok_or_else(|| DispatchError::no_devices(self.class))?;

        let seed = Candidate {
            index: 0,
            metrics: DeviceMetrics::query(first, 0)?,
        };
        trace_candidate(first, &seed);

        let best = rest
            .iter()
            .enumerate()
            .try_fold(seed, |best, (offset, device)| {
                let candidate = Candidate {
                    index: offset + 1,
                    metrics: DeviceMetrics::query(device, offset + 1)?,
                };
                trace_candidate(device, &candidate);
                Ok::<_, DispatchError>(if candidate.score() > best.score() {
                    candidate
                } else {
                    best
                })
            })?;

        let device = &devices[best.index];
        info!(
            index = best.index,
            name = device.name(),
            compute_units = best.metrics.compute_units,
            clock_mhz = best.metrics.clock_mhz,
            score = best.score().value(),
            "selected compute device"
        );

        Ok(SelectionResult {
            device,
            index: best.index,
            metrics: best.metrics,
        })
    }

    /// Scores every candidate in enumeration order.
    pub fn score_all<D: ComputeDevice>(&self, devices: &[D]) -> Result<Vec<Candidate>> {
        if devices.is_empty() {
            return Err(DispatchError::no_devices(self.class));
        }
        devices
            .iter()
            .enumerate()
            .map(|(index, device)| {
                DeviceMetrics::query(device, index).map(|metrics| Candidate { index, metrics })
            })
            .collect()
    }
}

/// Selects the best device out of `devices` without a class label.
pub fn select_best<D: ComputeDevice>(devices: &[D]) -> Result<SelectionResult<'_, D>> {
    DeviceSelector::for_class(DeviceClass::All).select_best(devices)
}

fn trace_candidate<D: ComputeDevice>(device: &D, candidate: &Candidate) {
    debug!(
        index = candidate.index,
        name = device.name(),
        compute_units = candidate.metrics.compute_units,
        clock_mhz = candidate.metrics.clock_mhz,
        score = candidate.score().value(),
        "scored candidate device"
    );
}
