//! Layers of a perceptron.
//!
//! Every layer but the output sends the next one a contribution matrix: one row
//! per next neuron, holding the weighted signal of every neuron of the sending
//! layer followed by the bias weight when there is one. The receiving layer sums
//! each row to get the pre-activation input of the matching neuron.

mod hidden;
mod input;
mod output;

pub use hidden::Hidden;
pub use input::Input;
pub use output::Output;

use ndarray::Array2;
use ndarray_rand::rand::RngCore;

use crate::error::{Error, LayerId, Result};
use crate::synapse::{initialize, SynapseShape, Synapses, WeightInitializer};

/// A layer owning synapses and the corrections accumulated for them.
pub trait Trainable {
    fn id(&self) -> LayerId;

    fn synapses(&self) -> &Synapses;

    fn synapses_mut(&mut self) -> &mut Synapses;

    fn apply_corrections(&mut self, batch_size: usize) -> Result<()> {
        self.synapses_mut().apply_corrections(batch_size)
    }

    fn clear_corrections(&mut self) {
        self.synapses_mut().clear_corrections();
    }

    /// Commit corrections computed for one sample.
    fn accumulate(&mut self, corrections: &Array2<f64>) -> Result<()> {
        self.synapses_mut().accumulate(corrections)
    }
}

/// Draw fresh synapses for a layer of `neurons` feeding `next` neurons.
fn drawn_synapses(
    layer: LayerId,
    neurons: usize,
    bias: Option<f64>,
    next: usize,
    learning_rate: f64,
    initializer: &dyn WeightInitializer,
    rng: &mut dyn RngCore,
) -> Result<Synapses> {
    if neurons == 0 || next == 0 {
        return Err(Error::InvalidConfig(format!(
            "{}: cannot connect {} neurons to {} next neurons",
            layer, neurons, next
        )));
    }
    let shape = SynapseShape::new(neurons, bias.is_some(), next);
    let weights = initialize(layer, initializer, shape, bias, rng)?;
    Synapses::new(layer, shape, weights, learning_rate)
}

/// Build synapses around explicit weights, deriving the neuron count from the row count.
fn explicit_synapses(
    layer: LayerId,
    weights: Array2<f64>,
    bias: bool,
    learning_rate: f64,
) -> Result<Synapses> {
    let (rows, next) = weights.dim();
    let bias_rows = usize::from(bias);
    if rows <= bias_rows || next == 0 {
        return Err(Error::InvalidConfig(format!(
            "{}: synapses of shape {:?} leave no neurons (bias: {})",
            layer,
            weights.shape(),
            bias
        )));
    }
    let shape = SynapseShape::new(rows - bias_rows, bias, next);
    Synapses::new(layer, shape, weights, learning_rate)
}
