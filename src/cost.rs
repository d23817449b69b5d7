use ndarray::{ArrayView1, Zip};
use serde::{Deserialize, Serialize};

/// Measures how far a prediction is from the expected output.
/// Callers guarantee both vectors have the same length.
pub trait Cost {
    fn aggregate(&self, predictions: ArrayView1<f64>, expected: ArrayView1<f64>) -> f64;

    /// Partial derivative of the cost with respect to one output activation.
    fn derivative(&self, predicted: f64, expected: f64) -> f64;
}

/// Half of the sum of squared differences.
pub struct Quadratic;

impl Cost for Quadratic {
    fn aggregate(&self, predictions: ArrayView1<f64>, expected: ArrayView1<f64>) -> f64 {
        Zip::from(&predictions)
            .and(&expected)
            .fold(0.0, |sum, &a, &e| sum + (a - e).powi(2))
            * 0.5
    }

    fn derivative(&self, predicted: f64, expected: f64) -> f64 {
        predicted - expected
    }
}

const PROBABILITY_EPSILON: f64 = 1e-12;

/// Binary cross entropy over independent outputs in `(0, 1)`.
pub struct CrossEntropy;

fn clamp_probability(a: f64) -> f64 {
    a.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON)
}

impl Cost for CrossEntropy {
    fn aggregate(&self, predictions: ArrayView1<f64>, expected: ArrayView1<f64>) -> f64 {
        -Zip::from(&predictions)
            .and(&expected)
            .fold(0.0, |sum, &a, &e| {
                let a = clamp_probability(a);
                sum + e * a.ln() + (1.0 - e) * (1.0 - a).ln()
            })
    }

    fn derivative(&self, predicted: f64, expected: f64) -> f64 {
        let a = clamp_probability(predicted);
        (a - expected) / (a * (1.0 - a))
    }
}

/// Serializable choice of a cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    Quadratic,
    CrossEntropy,
}

impl CostKind {
    pub fn build(self) -> Box<dyn Cost> {
        match self {
            CostKind::Quadratic => Box::new(Quadratic),
            CostKind::CrossEntropy => Box::new(CrossEntropy),
        }
    }
}
