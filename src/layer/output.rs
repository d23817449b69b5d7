use ndarray::{Array1, ArrayView1, ArrayView2, Axis, Zip};

use crate::activation::{activate_each, derive_each, Activation};
use crate::cost::Cost;
use crate::error::{Error, LayerId, Result};

/// Last layer. Owns the network's cost; it has no synapses of its own since its
/// incoming weights belong to the layer before it.
pub struct Output {
    neurons: usize,
    activation: Box<dyn Activation>,
    cost: Box<dyn Cost>,
    pre_activation: Option<Array1<f64>>,
}

impl Output {
    pub fn new(
        neurons: usize,
        activation: Box<dyn Activation>,
        cost: Box<dyn Cost>,
    ) -> Result<Self> {
        if neurons == 0 {
            return Err(Error::InvalidConfig(
                "output layer must have at least one neuron".to_owned(),
            ));
        }
        Ok(Self {
            neurons,
            activation,
            cost,
            pre_activation: None,
        })
    }

    pub fn size(&self) -> usize {
        self.neurons
    }

    fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.neurons {
            return Err(Error::shape(LayerId::Output, what, &[self.neurons], &[len]));
        }
        Ok(())
    }

    fn propagate(&self, incoming: ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        if incoming.nrows() != self.neurons {
            return Err(Error::shape(
                LayerId::Output,
                "incoming contributions",
                &[self.neurons, incoming.ncols()],
                incoming.shape(),
            ));
        }
        let pre_activation = incoming.sum_axis(Axis(1));
        let predictions = activate_each(&*self.activation, pre_activation.view(), LayerId::Output)?;
        Ok((pre_activation, predictions))
    }

    /// Predictions for the incoming contributions, leaving the layer untouched.
    pub fn predict(&self, incoming: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.propagate(incoming).map(|(_, predictions)| predictions)
    }

    pub fn forward(&mut self, incoming: ArrayView2<f64>) -> Result<Array1<f64>> {
        let (pre_activation, predictions) = self.propagate(incoming)?;
        self.pre_activation = Some(pre_activation);
        Ok(predictions)
    }

    /// Cost of `predictions` against `labels`.
    pub fn measure(&self, predictions: ArrayView1<f64>, labels: ArrayView1<f64>) -> Result<f64> {
        self.check_len("predictions", predictions.len())?;
        self.check_len("labels", labels.len())?;
        Ok(self.cost.aggregate(predictions, labels))
    }

    pub fn forward_measure(
        &mut self,
        incoming: ArrayView2<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, f64)> {
        self.check_len("labels", labels.len())?;
        let predictions = self.forward(incoming)?;
        let cost = self.measure(predictions.view(), labels)?;
        Ok((predictions, cost))
    }

    /// Delta rule: cost derivative times activation slope, per output neuron.
    pub fn backward(
        &self,
        predictions: ArrayView1<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        self.check_len("predictions", predictions.len())?;
        self.check_len("labels", labels.len())?;
        let pre_activation = self.pre_activation.as_ref().ok_or(Error::Uninitialized {
            layer: LayerId::Output,
            what: "retained pre-activation sums",
        })?;
        let slopes = derive_each(&*self.activation, pre_activation.view(), LayerId::Output)?;
        let mut errors = Array1::<f64>::zeros(self.neurons);
        Zip::from(&mut errors)
            .and(&predictions)
            .and(&labels)
            .and(&slopes)
            .for_each(|error, &predicted, &expected, &slope| {
                *error = self.cost.derivative(predicted, expected) * slope;
            });
        Ok(errors)
    }
}
