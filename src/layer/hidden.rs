use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand::RngCore;

use crate::activation::{activate_each, derive_each, Activation};
use crate::error::{Error, LayerId, Result};
use crate::synapse::{Synapses, WeightInitializer};

use super::{drawn_synapses, explicit_synapses, Trainable};

/// Values of the last forward pass needed by `backward`.
#[derive(Debug, Clone)]
struct Retained {
    pre_activation: Array1<f64>,
    activated: Array1<f64>,
}

pub struct Hidden {
    index: usize,
    activation: Box<dyn Activation>,
    synapses: Synapses,
    retained: Option<Retained>,
}

impl Hidden {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        neurons: usize,
        bias: Option<f64>,
        next: usize,
        learning_rate: f64,
        activation: Box<dyn Activation>,
        initializer: &dyn WeightInitializer,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        let synapses = drawn_synapses(
            LayerId::Hidden(index),
            neurons,
            bias,
            next,
            learning_rate,
            initializer,
            rng,
        )?;
        Ok(Self {
            index,
            activation,
            synapses,
            retained: None,
        })
    }

    /// Layer around explicit synapses. With `bias`, the last row holds the bias weights.
    pub fn with_synapses(
        index: usize,
        weights: Array2<f64>,
        bias: bool,
        learning_rate: f64,
        activation: Box<dyn Activation>,
    ) -> Result<Self> {
        Ok(Self {
            index,
            activation,
            synapses: explicit_synapses(LayerId::Hidden(index), weights, bias, learning_rate)?,
            retained: None,
        })
    }

    /// Number of neurons, bias excluded.
    pub fn size(&self) -> usize {
        self.synapses.shape().neurons
    }

    fn propagate(&self, incoming: ArrayView2<f64>) -> Result<(Retained, Array2<f64>)> {
        let neurons = self.size();
        if incoming.nrows() != neurons {
            return Err(Error::shape(
                self.id(),
                "incoming contributions",
                &[neurons, incoming.ncols()],
                incoming.shape(),
            ));
        }
        let pre_activation = incoming.sum_axis(Axis(1));
        let activated = activate_each(&*self.activation, pre_activation.view(), self.id())?;
        let output = self.synapses.contributions(activated.view())?;
        Ok((
            Retained {
                pre_activation,
                activated,
            },
            output,
        ))
    }

    /// Contributions to the next layer, leaving the layer untouched.
    pub fn contributions(&self, incoming: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.propagate(incoming).map(|(_, output)| output)
    }

    /// Sum the incoming contributions per neuron, activate them and weight the
    /// activated values for the next layer.
    pub fn forward(&mut self, incoming: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (retained, output) = self.propagate(incoming)?;
        self.retained = Some(retained);
        Ok(output)
    }

    pub fn activated(&self) -> Option<ArrayView1<f64>> {
        self.retained.as_ref().map(|r| r.activated.view())
    }

    /// Corrections for `errors` and the errors of the previous layer, nothing committed.
    pub fn gradient(&self, errors: ArrayView1<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let retained = self.retained.as_ref().ok_or(Error::Uninitialized {
            layer: self.id(),
            what: "retained activations",
        })?;
        let corrections = self
            .synapses
            .sample_corrections(retained.activated.view(), errors)?;
        let slopes = derive_each(&*self.activation, retained.pre_activation.view(), self.id())?;
        let previous = slopes * self.synapses.weighted_errors(errors)?;
        Ok((corrections, previous))
    }

    /// Accumulate corrections for `errors` and return the errors of the previous layer.
    pub fn backward(&mut self, errors: ArrayView1<f64>) -> Result<Array1<f64>> {
        let (corrections, previous) = self.gradient(errors)?;
        self.accumulate(&corrections)?;
        Ok(previous)
    }
}

impl Trainable for Hidden {
    fn id(&self) -> LayerId {
        LayerId::Hidden(self.index)
    }

    fn synapses(&self) -> &Synapses {
        &self.synapses
    }

    fn synapses_mut(&mut self) -> &mut Synapses {
        &mut self.synapses
    }
}
