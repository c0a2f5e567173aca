//! Transmission ↔ joint kinematic transform.
//!
//! Two fixed matrices loaded once from configuration:
//! - `T→J`: joints × transmissions
//! - `J→T`: transmissions × joints
//!
//! `joint[i] = Σ_j T→J[i][j] * transmission[j]`, and the inverse with `J→T`.
//! Dimensions are checked at construction only; the hot path relies on
//! debug assertions.

use evo_servo_common::config::ServoConfig;
use evo_servo_common::error::ServoError;

/// Fixed row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicMatrix {
    rows: usize,
    cols: usize,
    data: Box<[f64]>,
}

impl KinematicMatrix {
    /// Build a matrix from row-major values.
    ///
    /// # Errors
    /// Returns `ServoError::Config` if `values.len() != rows * cols` or a
    /// value is not finite.
    pub fn from_row_major(rows: usize, cols: usize, values: &[f64]) -> Result<Self, ServoError> {
        if values.len() != rows * cols {
            return Err(ServoError::Config(format!(
                "matrix has {} values, expected {}x{}",
                values.len(),
                rows,
                cols
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ServoError::Config(
                "matrix contains a non-finite value".to_string(),
            ));
        }
        Ok(Self {
            rows,
            cols,
            data: values.into(),
        })
    }

    /// Identity matrix of size `n`.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            rows: n,
            cols: n,
            data: data.into_boxed_slice(),
        }
    }

    /// Number of rows (output length).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (input length).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at `(row, col)`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// `output = self * input`.
    #[inline]
    pub fn apply(&self, input: &[f64], output: &mut [f64]) {
        debug_assert_eq!(input.len(), self.cols);
        debug_assert_eq!(output.len(), self.rows);
        for (row, out) in self.data.chunks_exact(self.cols.max(1)).zip(output.iter_mut()) {
            *out = row.iter().zip(input).map(|(m, x)| m * x).sum();
        }
        if self.cols == 0 {
            output.iter_mut().for_each(|v| *v = 0.0);
        }
    }
}

/// Pair of matrices mapping between the two spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicMapper {
    t2j: KinematicMatrix,
    j2t: KinematicMatrix,
}

impl KinematicMapper {
    /// Build the mapper from explicit matrices.
    ///
    /// # Errors
    /// Returns `ServoError::Config` if `j2t` is not the transposed shape of
    /// `t2j`.
    pub fn new(t2j: KinematicMatrix, j2t: KinematicMatrix) -> Result<Self, ServoError> {
        if t2j.rows != j2t.cols || t2j.cols != j2t.rows {
            return Err(ServoError::Config(format!(
                "T->J is {}x{} but J->T is {}x{}",
                t2j.rows, t2j.cols, j2t.rows, j2t.cols
            )));
        }
        Ok(Self { t2j, j2t })
    }

    /// Load both matrices from the configuration.
    pub fn from_config(config: &ServoConfig) -> Result<Self, ServoError> {
        let joints = config.number_of_joints;
        let transmissions = config.number_of_transmissions;
        let t2j = KinematicMatrix::from_row_major(
            joints,
            transmissions,
            &config.transmission_to_joint_matrix,
        )
        .map_err(|e| ServoError::Config(format!("transmission_to_joint_matrix: {e}")))?;
        let j2t = KinematicMatrix::from_row_major(
            transmissions,
            joints,
            &config.joint_to_transmission_matrix,
        )
        .map_err(|e| ServoError::Config(format!("joint_to_transmission_matrix: {e}")))?;
        Self::new(t2j, j2t)
    }

    /// Number of joints.
    pub fn joints(&self) -> usize {
        self.t2j.rows
    }

    /// Number of transmissions.
    pub fn transmissions(&self) -> usize {
        self.t2j.cols
    }

    /// Map one channel from transmission space to joint space.
    #[inline]
    pub fn transmission_to_joint(&self, transmission: &[f64], joint: &mut [f64]) {
        self.t2j.apply(transmission, joint);
    }

    /// Map one channel from joint space to transmission space.
    #[inline]
    pub fn joint_to_transmission(&self, joint: &[f64], transmission: &mut [f64]) {
        self.j2t.apply(joint, transmission);
    }
}
