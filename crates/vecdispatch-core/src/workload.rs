//! Vector-addition workload and result validation.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Two input vectors of equal length whose element-wise sum is computed.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorWorkload {
    a: Vec<f32>,
    b: Vec<f32>,
}

impl VectorWorkload {
    /// Creates a workload from explicit inputs.
    ///
    /// Returns `None` when the inputs differ in length.
    pub fn from_vectors(a: Vec<f32>, b: Vec<f32>) -> Option<Self> {
        (a.len() == b.len()).then_some(Self { a, b })
    }

    /// Creates `len` pairs of uniformly distributed values in `[0, 1)`.
    pub fn random(len: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let a = (0..len).map(|_| rng.gen::<f32>()).collect();
        let b = (0..len).map(|_| rng.gen::<f32>()).collect();
        Self { a, b }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    /// Whether the workload is empty.
    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// First operand.
    pub fn a(&self) -> &[f32] {
        &self.a
    }

    /// Second operand.
    pub fn b(&self) -> &[f32] {
        &self.b
    }

    /// Host-computed reference result.
    pub fn expected(&self) -> Vec<f32> {
        self.a.iter().zip(&self.b).map(|(x, y)| x + y).collect()
    }

    /// Compares device output against the host reference.
    ///
    /// Values must match exactly. At most `max_recorded` mismatches are kept
    /// for diagnostics; all of them are counted.
    pub fn validate(&self, output: &[f32], max_recorded: usize) -> ValidationReport {
        let mut report = ValidationReport {
            correct: 0,
            total: self.len(),
            mismatches: Vec::new(),
        };
        for (index, ((x, y), &actual)) in self.a.iter().zip(&self.b).zip(output).enumerate() {
            let expected = x + y;
            if actual == expected {
                report.correct += 1;
            } else if report.mismatches.len() < max_recorded {
                report.mismatches.push(Mismatch {
                    index,
                    actual,
                    expected,
                });
            }
        }
        report
    }
}

/// A single element that differs from the host reference.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mismatch {
    /// Element index
    pub index: usize,
    /// Value read back from the device
    pub actual: f32,
    /// Host-computed value
    pub expected: f32,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.6} {:.6}", self.index, self.actual, self.expected)
    }
}

/// Outcome of validating a readback.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationReport {
    /// Elements equal to the reference
    pub correct: usize,
    /// Elements checked
    pub total: usize,
    /// Recorded mismatches, in index order
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    /// Whether every element matched.
    pub fn all_correct(&self) -> bool {
        self.correct == self.total
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Computed '{}/{}' correct values!", self.correct, self.total)
    }
}
