//! Calibration problem definition
//!
//! Holds the motor samples, the optional leading block of known positions
//! and the spool hardware constants, validated once at construction.

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::kinematics::SpoolHardware;
use crate::params::{positions_from_vec, ParameterLayout};
use crate::{NUM_LINES, PARAMS_ANCHOR};

/// How well a measurement set determines the anchor parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSufficiency {
    /// Fewer measurements than anchor parameters
    Insufficient,
    /// Enough to solve, but results are unreliable unless data is very accurate
    Marginal,
    Sufficient,
}

/// Minimum data thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataRequirements {
    /// Below this many measurements the anchors are undetermined
    pub min_measurements: usize,
    /// Below this many measurements the result is flagged as unreliable
    pub reliable_measurements: usize,
    /// Solve anyway when data is insufficient
    pub allow_insufficient: bool,
}

impl Default for DataRequirements {
    fn default() -> Self {
        Self {
            min_measurements: PARAMS_ANCHOR,
            reliable_measurements: PARAMS_ANCHOR + 4,
            allow_insufficient: false,
        }
    }
}

/// Validated measurement set
#[derive(Debug, Clone)]
pub struct CalibrationProblem {
    /// u×4 motor rotations [deg] relative to the reference sample
    motor_samples: DMatrix<f64>,
    /// Known positions of the first k samples [mm]
    fixed_positions: Vec<Vector3<f64>>,
    hardware: SpoolHardware,
}

impl CalibrationProblem {
    /// Create a problem from a sample matrix and known leading positions
    ///
    /// # Arguments
    /// * `motor_samples` - u×4 motor degrees, columns A, B, C, D
    /// * `fixed_positions` - positions of the first k ≤ u samples
    /// * `hardware` - spool hardware constants
    pub fn new(
        motor_samples: DMatrix<f64>,
        fixed_positions: Vec<Vector3<f64>>,
        hardware: SpoolHardware,
    ) -> Result<Self, CalibrationError> {
        if motor_samples.ncols() != NUM_LINES {
            return Err(CalibrationError::SampleShape {
                count: motor_samples.len(),
            });
        }
        if motor_samples.nrows() == 0 {
            return Err(CalibrationError::NoSamples);
        }
        if fixed_positions.len() > motor_samples.nrows() {
            return Err(CalibrationError::TooManyFixedPositions {
                fixed: fixed_positions.len(),
                samples: motor_samples.nrows(),
            });
        }

        Ok(Self {
            motor_samples,
            fixed_positions,
            hardware,
        })
    }

    /// Create a problem from flat row-major number lists
    ///
    /// # Arguments
    /// * `samples` - [a₁ b₁ c₁ d₁ a₂ …], length divisible by 4
    /// * `fixed_positions` - [x₁ y₁ z₁ x₂ …], length divisible by 3
    pub fn from_flat(
        samples: &[f64],
        fixed_positions: &[f64],
        hardware: SpoolHardware,
    ) -> Result<Self, CalibrationError> {
        if samples.len() % NUM_LINES != 0 {
            return Err(CalibrationError::SampleShape {
                count: samples.len(),
            });
        }
        if fixed_positions.len() % 3 != 0 {
            return Err(CalibrationError::FixedPositionShape {
                count: fixed_positions.len(),
            });
        }

        let rows = samples.len() / NUM_LINES;
        let motor_samples = DMatrix::from_row_slice(rows, NUM_LINES, samples);
        Self::new(motor_samples, positions_from_vec(fixed_positions), hardware)
    }

    pub fn motor_samples(&self) -> &DMatrix<f64> {
        &self.motor_samples
    }

    pub fn fixed_positions(&self) -> &[Vector3<f64>] {
        &self.fixed_positions
    }

    pub fn hardware(&self) -> &SpoolHardware {
        &self.hardware
    }

    /// Number of samples u
    pub fn num_samples(&self) -> usize {
        self.motor_samples.nrows()
    }

    /// Number of known positions k
    pub fn num_fixed(&self) -> usize {
        self.fixed_positions.len()
    }

    /// Number of positions to solve for, u − k
    pub fn num_free(&self) -> usize {
        self.num_samples() - self.num_fixed()
    }

    /// Parameter vector layout for this problem
    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout::new(self.num_free())
    }

    /// Samples plus known coordinates, u + 3k
    pub fn measurement_count(&self) -> usize {
        self.num_samples() + 3 * self.num_fixed()
    }

    pub fn sufficiency(&self, requirements: &DataRequirements) -> DataSufficiency {
        let count = self.measurement_count();
        if count < requirements.min_measurements {
            DataSufficiency::Insufficient
        } else if count < requirements.reliable_measurements {
            DataSufficiency::Marginal
        } else {
            DataSufficiency::Sufficient
        }
    }

    /// All u positions: the known ones first, then the solved ones
    pub fn full_positions(&self, free_positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        let mut positions = Vec::with_capacity(self.fixed_positions.len() + free_positions.len());
        positions.extend_from_slice(&self.fixed_positions);
        positions.extend_from_slice(free_positions);
        positions
    }
}
