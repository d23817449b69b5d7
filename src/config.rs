//! Declarative description of a network.
//!
//! A shape can be written in code or parsed from JSON:
//!
//! ```json
//! {
//!   "input": { "size": 2, "learning_rate": 2.0, "bias": 0.5 },
//!   "hidden": [
//!     { "size": 2, "learning_rate": 2.0, "bias": 0.5, "activation": "sigmoid" }
//!   ],
//!   "output": { "size": 1, "activation": "sigmoid", "cost": "quadratic" }
//! }
//! ```
//!
//! Sizes never count bias units. `bias` is the initial value of the bias weights;
//! leave it out for a layer without bias.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationKind;
use crate::cost::CostKind;
use crate::error::{Error, Result};
use crate::synapse::Initializer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputShape {
    pub size: usize,
    pub learning_rate: f64,
    #[serde(default)]
    pub bias: Option<f64>,
    #[serde(default)]
    pub initializer: Initializer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenShape {
    pub size: usize,
    pub learning_rate: f64,
    #[serde(default)]
    pub bias: Option<f64>,
    pub activation: ActivationKind,
    #[serde(default)]
    pub initializer: Initializer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputShape {
    pub size: usize,
    pub activation: ActivationKind,
    pub cost: CostKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkShape {
    pub input: InputShape,
    #[serde(default)]
    pub hidden: Vec<HiddenShape>,
    pub output: OutputShape,
}

fn check_size(layer: &str, size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidConfig(format!("{} size must be > 0", layer)));
    }
    Ok(())
}

fn check_learning_rate(layer: &str, learning_rate: f64) -> Result<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "{} learning rate must be finite and > 0, got {}",
            layer, learning_rate
        )));
    }
    Ok(())
}

fn check_bias(layer: &str, bias: Option<f64>) -> Result<()> {
    match bias {
        Some(b) if !b.is_finite() => Err(Error::InvalidConfig(format!(
            "{} bias must be finite, got {}",
            layer, b
        ))),
        _ => Ok(()),
    }
}

impl NetworkShape {
    pub fn validate(&self) -> Result<()> {
        check_size("input layer", self.input.size)?;
        check_learning_rate("input layer", self.input.learning_rate)?;
        check_bias("input layer", self.input.bias)?;
        for (index, hidden) in self.hidden.iter().enumerate() {
            let name = format!("hidden layer #{}", index);
            check_size(&name, hidden.size)?;
            check_learning_rate(&name, hidden.learning_rate)?;
            check_bias(&name, hidden.bias)?;
        }
        check_size("output layer", self.output.size)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let shape: NetworkShape = serde_json::from_str(json)?;
        shape.validate()?;
        Ok(shape)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Neuron counts from input to output, bias excluded.
    pub fn sizes(&self) -> Vec<usize> {
        std::iter::once(self.input.size)
            .chain(self.hidden.iter().map(|h| h.size))
            .chain(std::iter::once(self.output.size))
            .collect()
    }
}
