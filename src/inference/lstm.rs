use std::error::Error;

use ndarray::{s, Array1, Array2, ArrayView2};

use crate::artifact::ArtifactError;

/// Logistic function used by the gate activations and the output head.
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// A single LSTM layer's weights.
///
/// Gate order along the 4*units axis is input, forget, cell, output — the
/// export pipeline's convention.
pub struct Lstm {
    /// Input projection [input_dim, 4 * units]
    kernel: Array2<f32>,
    /// Recurrent projection [units, 4 * units]
    recurrent: Array2<f32>,
    /// Gate biases [4 * units]
    bias: Array1<f32>,
    units: usize,
}

impl Lstm {
    pub fn new(
        kernel: Array2<f32>,
        recurrent: Array2<f32>,
        bias: Array1<f32>,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let units = recurrent.nrows();
        if recurrent.ncols() != 4 * units {
            return Err(Box::new(ArtifactError::ShapeMismatch {
                name: "lstm.recurrent".to_string(),
                expected: vec![units as u64, 4 * units as u64],
                actual: vec![recurrent.nrows() as u64, recurrent.ncols() as u64],
            }));
        }
        if kernel.ncols() != 4 * units {
            return Err(Box::new(ArtifactError::ShapeMismatch {
                name: "lstm.kernel".to_string(),
                expected: vec![kernel.nrows() as u64, 4 * units as u64],
                actual: vec![kernel.nrows() as u64, kernel.ncols() as u64],
            }));
        }
        if bias.len() != 4 * units {
            return Err(Box::new(ArtifactError::ShapeMismatch {
                name: "lstm.bias".to_string(),
                expected: vec![4 * units as u64],
                actual: vec![bias.len() as u64],
            }));
        }

        Ok(Self {
            kernel,
            recurrent,
            bias,
            units,
        })
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Runs the recurrence over an input sequence of shape
    /// [steps, input_dim] and returns the final hidden state.
    pub fn run(&self, inputs: ArrayView2<f32>) -> Array1<f32> {
        let units = self.units;
        let mut hidden = Array1::zeros(units);
        let mut cell = Array1::zeros(units);

        for x in inputs.outer_iter() {
            let z = x.dot(&self.kernel) + hidden.dot(&self.recurrent) + &self.bias;

            let input_gate = z.slice(s![..units]).mapv(sigmoid);
            let forget_gate = z.slice(s![units..2 * units]).mapv(sigmoid);
            let candidate = z.slice(s![2 * units..3 * units]).mapv(f32::tanh);
            let output_gate = z.slice(s![3 * units..]).mapv(sigmoid);

            cell = &forget_gate * &cell + &input_gate * &candidate;
            hidden = &output_gate * &cell.mapv(f32::tanh);
        }

        hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn zero_weights_produce_zero_hidden_state() {
        let lstm = Lstm::new(
            Array2::zeros((3, 8)),
            Array2::zeros((2, 8)),
            Array1::zeros(8),
        )
        .unwrap();

        let inputs = arr2(&[[1.0, -2.0, 0.5], [0.25, 0.0, -1.0]]);
        let hidden = lstm.run(inputs.view());

        assert_eq!(hidden.len(), 2);
        // Candidate tanh(0) = 0, so the cell never accumulates anything.
        assert!(hidden.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn bias_only_recurrence_matches_hand_computation() {
        // Single unit, zero kernels, candidate bias saturated: each step
        // adds ~0.5 to the cell through the half-open input gate.
        let lstm = Lstm::new(
            Array2::zeros((1, 4)),
            Array2::zeros((1, 4)),
            Array1::from_vec(vec![0.0, 0.0, 10.0, 0.0]),
        )
        .unwrap();

        let one_step = lstm.run(arr2(&[[0.0]]).view());
        // c1 = 0.5 * tanh(10), h1 = 0.5 * tanh(c1)
        assert!((one_step[0] - 0.231_058_58).abs() < 1e-6);

        let two_steps = lstm.run(arr2(&[[0.0], [0.0]]).view());
        // c2 = 0.5 * c1 + 0.5 * tanh(10), h2 = 0.5 * tanh(c2)
        assert!((two_steps[0] - 0.317_574_47).abs() < 1e-6);
    }

    #[test]
    fn restart_resets_state() {
        let lstm = Lstm::new(
            Array2::zeros((1, 4)),
            Array2::zeros((1, 4)),
            Array1::from_vec(vec![0.0, 0.0, 10.0, 0.0]),
        )
        .unwrap();

        let first = lstm.run(arr2(&[[0.0]]).view());
        let second = lstm.run(arr2(&[[0.0]]).view());
        assert_eq!(first, second);
    }

    #[test]
    fn inconsistent_shapes_are_rejected() {
        assert!(Lstm::new(Array2::zeros((3, 8)), Array2::zeros((2, 8)), Array1::zeros(7)).is_err());
        assert!(Lstm::new(Array2::zeros((3, 6)), Array2::zeros((2, 8)), Array1::zeros(8)).is_err());
        assert!(Lstm::new(Array2::zeros((3, 8)), Array2::zeros((2, 7)), Array1::zeros(8)).is_err());
    }
}
