use std::fmt;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, LayerId, Result};

/// Why an activation refused its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Overflow,
    Underflow,
    NotANumber,
}

/// An activation input outside of the function's safe operating range.
/// Usually the weighted sum feeding the neuron was not scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeError {
    pub input: f64,
    pub kind: RangeKind,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.kind {
            RangeKind::Overflow => "exponent overflowed to infinity",
            RangeKind::Underflow => "exponent underflowed to zero",
            RangeKind::NotANumber => "value is not a number",
        };
        write!(f, "activation input {} is out of range: {}", self.input, reason)
    }
}

impl std::error::Error for RangeError {}

pub trait Activation {
    fn activate(&self, x: f64) -> std::result::Result<f64, RangeError>;

    /// Slope at the pre-activation value `x`.
    fn derivative(&self, x: f64) -> std::result::Result<f64, RangeError>;
}

/// Classify `exp` of `x`, refusing results that lost all information.
fn checked_exp(x: f64, input: f64) -> std::result::Result<f64, RangeError> {
    let e = x.exp();
    let kind = if input.is_nan() || e.is_nan() {
        RangeKind::NotANumber
    } else if e.is_infinite() {
        RangeKind::Overflow
    } else if e == 0.0 {
        RangeKind::Underflow
    } else {
        return Ok(e);
    };
    Err(RangeError { input, kind })
}

fn not_nan(x: f64) -> std::result::Result<f64, RangeError> {
    if x.is_nan() {
        Err(RangeError {
            input: x,
            kind: RangeKind::NotANumber,
        })
    } else {
        Ok(x)
    }
}

pub struct Identity;

impl Activation for Identity {
    fn activate(&self, x: f64) -> std::result::Result<f64, RangeError> {
        not_nan(x)
    }

    fn derivative(&self, x: f64) -> std::result::Result<f64, RangeError> {
        not_nan(x).map(|_| 1.0)
    }
}

/// Logistic function `1 / (1 + e^-x)`.
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn activate(&self, x: f64) -> std::result::Result<f64, RangeError> {
        let e = checked_exp(-x, x)?;
        Ok(1.0 / (1.0 + e))
    }

    fn derivative(&self, x: f64) -> std::result::Result<f64, RangeError> {
        let s = self.activate(x)?;
        Ok(s * (1.0 - s))
    }
}

pub struct Tanh;

impl Activation for Tanh {
    fn activate(&self, x: f64) -> std::result::Result<f64, RangeError> {
        checked_exp(2.0 * x, x)?;
        Ok(x.tanh())
    }

    fn derivative(&self, x: f64) -> std::result::Result<f64, RangeError> {
        let t = self.activate(x)?;
        Ok(1.0 - t * t)
    }
}

pub struct Relu;

impl Activation for Relu {
    fn activate(&self, x: f64) -> std::result::Result<f64, RangeError> {
        not_nan(x).map(|v| if v > 0.0 { v } else { 0.0 })
    }

    fn derivative(&self, x: f64) -> std::result::Result<f64, RangeError> {
        not_nan(x).map(|v| if v > 0.0 { 1.0 } else { 0.0 })
    }
}

/// Serializable choice of an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Sigmoid,
    Tanh,
    Relu,
    Identity,
}

impl ActivationKind {
    pub fn build(self) -> Box<dyn Activation> {
        match self {
            ActivationKind::Sigmoid => Box::new(Sigmoid),
            ActivationKind::Tanh => Box::new(Tanh),
            ActivationKind::Relu => Box::new(Relu),
            ActivationKind::Identity => Box::new(Identity),
        }
    }
}

/// Apply `activation` element-wise, attributing a failure to the neuron that caused it.
pub(crate) fn activate_each(
    activation: &dyn Activation,
    xs: ArrayView1<f64>,
    layer: LayerId,
) -> Result<Array1<f64>> {
    map_each(xs, layer, |x| activation.activate(x))
}

pub(crate) fn derive_each(
    activation: &dyn Activation,
    xs: ArrayView1<f64>,
    layer: LayerId,
) -> Result<Array1<f64>> {
    map_each(xs, layer, |x| activation.derivative(x))
}

fn map_each<F>(xs: ArrayView1<f64>, layer: LayerId, f: F) -> Result<Array1<f64>>
where
    F: Fn(f64) -> std::result::Result<f64, RangeError>,
{
    xs.iter()
        .enumerate()
        .map(|(neuron, &x)| {
            f(x).map_err(|source| Error::NumericRange {
                layer,
                neuron,
                source,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Array1::from)
}
