//! Launch geometry for one-dimensional kernels.
//!
//! A launch covers `element_count` logical elements with a global work size
//! that must be a multiple of the device's work-group size. The default
//! policy always adds one full group on top of the floor division:
//!
//! ```text
//! global_size = (element_count / local_size + 1) * local_size
//! ```
//!
//! When `element_count` is already an exact multiple this launches one
//! extra, fully idle group. The kernel's `if (i < count)` guard turns those
//! work-items into no-ops. [`RoundingPolicy::Ceiling`] gives the tight
//! partition instead.

use crate::error::{DispatchError, Result};
use std::fmt;
use std::str::FromStr;

/// How the global work size is rounded up to a multiple of the local size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RoundingPolicy {
    /// `(n / l + 1) * l`. Over-allocates one group on exact multiples.
    #[default]
    AlwaysExtraGroup,
    /// `ceil(n / l) * l`, with at least one group for `n == 0`.
    Ceiling,
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysExtraGroup => write!(f, "always-extra-group"),
            Self::Ceiling => write!(f, "ceiling"),
        }
    }
}

impl FromStr for RoundingPolicy {
    type Err = DispatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "always-extra-group" | "default" => Ok(Self::AlwaysExtraGroup),
            "ceiling" | "tight" => Ok(Self::Ceiling),
            other => Err(DispatchError::invalid_config(format!(
                "unknown rounding policy '{other}' (expected always-extra-group or ceiling)"
            ))),
        }
    }
}

/// Launch geometry for a single kernel dispatch.
///
/// Only constructed by [`DispatchPlanner`], which guarantees
/// `global_size % local_size == 0`, `global_size >= element_count` and
/// `global_size > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DispatchPlan {
    element_count: usize,
    local_size: usize,
    global_size: usize,
}

impl DispatchPlan {
    /// Number of logical elements the kernel processes.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Work-group size.
    pub fn local_size(&self) -> usize {
        self.local_size
    }

    /// Total number of launched work-items.
    pub fn global_size(&self) -> usize {
        self.global_size
    }

    /// Number of work-groups launched.
    pub fn work_groups(&self) -> usize {
        self.global_size / self.local_size
    }

    /// Launched work-items beyond `element_count`.
    pub fn padding(&self) -> usize {
        self.global_size - self.element_count
    }

    /// Whether global index `index` maps onto a real element.
    pub fn in_bounds(&self, index: usize) -> bool {
        index < self.element_count
    }
}

impl fmt::Display for DispatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} elements -> {} work-items in {} groups of {}",
            self.element_count,
            self.global_size,
            self.work_groups(),
            self.local_size
        )
    }
}

/// Computes launch geometry from an element count and a work-group size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchPlanner {
    policy: RoundingPolicy,
}

impl DispatchPlanner {
    /// Creates a planner using the default rounding policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a planner with an explicit rounding policy.
    pub fn with_policy(policy: RoundingPolicy) -> Self {
        Self { policy }
    }

    /// The rounding policy in use.
    pub fn policy(&self) -> RoundingPolicy {
        self.policy
    }

    /// Plans a launch of `element_count` elements in groups of `local_size`.
    pub fn plan(&self, element_count: usize, local_size: usize) -> Result<DispatchPlan> {
        if local_size == 0 {
            return Err(DispatchError::invalid_granularity(
                0,
                "device reported a work-group size of zero",
            ));
        }

        let groups = match self.policy {
            RoundingPolicy::AlwaysExtraGroup => (element_count / local_size).checked_add(1),
            RoundingPolicy::Ceiling => Some(element_count.div_ceil(local_size).max(1)),
        };
        let global_size = groups
            .and_then(|g| g.checked_mul(local_size))
            .ok_or(DispatchError::PlanOverflow {
                element_count,
                local_size,
            })?;

        Ok(DispatchPlan {
            element_count,
            local_size,
            global_size,
        })
    }

    /// Plans a launch from a fallible granularity query.
    ///
    /// A failed query is reported as `InvalidGranularity`, same as a zero
    /// size.
    pub fn plan_queried<E: fmt::Display>(
        &self,
        element_count: usize,
        local_size: std::result::Result<usize, E>,
    ) -> Result<DispatchPlan> {
        let local_size = local_size.map_err(|e| {
            DispatchError::invalid_granularity(0, format!("work-group size query failed: {e}"))
        })?;
        self.plan(element_count, local_size)
    }
}

/// Plans a launch with the default rounding policy.
pub fn plan(element_count: usize, local_size: usize) -> Result<DispatchPlan> {
    DispatchPlanner::new().plan(element_count, local_size)
}
