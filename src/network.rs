use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_rand::rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::config::NetworkShape;
use crate::error::{Error, LayerId, Result};
use crate::layer::{Hidden, Input, Output, Trainable};

/// Multilayer perceptron: one input layer, any number of hidden layers and one
/// output layer.
pub struct Perceptron {
    input: Input,
    hidden: Vec<Hidden>,
    output: Output,
}

/// Running totals of the batch being accumulated.
#[derive(Debug, Default)]
struct Batch {
    samples: usize,
    cost: f64,
}

impl Perceptron {
    /// Build every layer of `shape`, drawing the initial weights from `rng`.
    pub fn new(shape: &NetworkShape, rng: &mut dyn RngCore) -> Result<Self> {
        shape.validate()?;
        let sizes = shape.sizes();

        let input = Input::new(
            shape.input.size,
            shape.input.bias,
            sizes[1],
            shape.input.learning_rate,
            &*shape.input.initializer.build(),
            rng,
        )?;
        let hidden = shape
            .hidden
            .iter()
            .enumerate()
            .map(|(index, layer)| {
                Hidden::new(
                    index,
                    layer.size,
                    layer.bias,
                    sizes[index + 2],
                    layer.learning_rate,
                    layer.activation.build(),
                    &*layer.initializer.build(),
                    rng,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let output = Output::new(
            shape.output.size,
            shape.output.activation.build(),
            shape.output.cost.build(),
        )?;

        log::debug!("built perceptron with layer sizes {:?}", sizes);
        Ok(Self {
            input,
            hidden,
            output,
        })
    }

    /// Same as `new` with a seeded generator, for reproducible weights.
    pub fn with_seed(shape: &NetworkShape, seed: u64) -> Result<Self> {
        Self::new(shape, &mut StdRng::seed_from_u64(seed))
    }

    /// Assemble prebuilt layers. The hidden layer at position `i` must have been
    /// built with index `i`, and each layer's synapses must have one column per
    /// neuron of the layer after it.
    pub fn from_layers(input: Input, hidden: Vec<Hidden>, output: Output) -> Result<Self> {
        for (position, layer) in hidden.iter().enumerate() {
            if layer.id() != LayerId::Hidden(position) {
                return Err(Error::InvalidConfig(format!(
                    "{} placed at hidden position {}",
                    layer.id(),
                    position
                )));
            }
        }
        let receivers = hidden
            .iter()
            .map(Hidden::size)
            .chain(std::iter::once(output.size()));
        let senders = std::iter::once(&input as &dyn Trainable)
            .chain(hidden.iter().map(|layer| layer as &dyn Trainable));
        for (sender, receiver) in senders.zip(receivers) {
            let columns = sender.synapses().shape().cols();
            if columns != receiver {
                return Err(Error::shape(
                    sender.id(),
                    "synapse columns",
                    &[receiver],
                    &[columns],
                ));
            }
        }
        Ok(Self {
            input,
            hidden,
            output,
        })
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn hidden(&self) -> &[Hidden] {
        &self.hidden
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Neuron counts from input to output, bias excluded.
    pub fn sizes(&self) -> Vec<usize> {
        std::iter::once(self.input.size())
            .chain(self.hidden.iter().map(Hidden::size))
            .chain(std::iter::once(self.output.size()))
            .collect()
    }

    fn trainables_mut(&mut self) -> impl Iterator<Item = &mut dyn Trainable> {
        std::iter::once(&mut self.input as &mut dyn Trainable)
            .chain(self.hidden.iter_mut().map(|layer| layer as &mut dyn Trainable))
    }

    /// Forward one sample, retaining what `backward` needs.
    pub fn forward(&mut self, features: ArrayView1<f64>) -> Result<Array1<f64>> {
        let mut signal = self.input.forward(features)?;
        for layer in self.hidden.iter_mut() {
            signal = layer.forward(signal.view())?;
        }
        self.output.forward(signal.view())
    }

    /// Forward one sample and measure its cost against `labels`.
    pub fn forward_measure(
        &mut self,
        features: ArrayView1<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, f64)> {
        let mut signal = self.input.forward(features)?;
        for layer in self.hidden.iter_mut() {
            signal = layer.forward(signal.view())?;
        }
        self.output.forward_measure(signal.view(), labels)
    }

    /// Propagate the errors of the last forwarded sample and accumulate the
    /// corrections of every layer. When any layer fails, nothing is accumulated.
    pub fn backward(
        &mut self,
        predictions: ArrayView1<f64>,
        labels: ArrayView1<f64>,
    ) -> Result<()> {
        let mut errors = self.output.backward(predictions, labels)?;
        let mut staged = Vec::with_capacity(self.hidden.len());
        for layer in self.hidden.iter().rev() {
            let (corrections, previous) = layer.gradient(errors.view())?;
            staged.push(corrections);
            errors = previous;
        }
        let input_corrections = self.input.gradient(errors.view())?;

        for (layer, corrections) in self.hidden.iter_mut().rev().zip(staged.iter()) {
            layer.accumulate(corrections)?;
        }
        self.input.accumulate(&input_corrections)
    }

    /// Apply the accumulated corrections of every layer, averaged over `batch_size`.
    pub fn apply_corrections(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be > 0".to_owned()));
        }
        for layer in self.trainables_mut() {
            layer.apply_corrections(batch_size)?;
        }
        Ok(())
    }

    pub fn clear_corrections(&mut self) {
        for layer in self.trainables_mut() {
            layer.clear_corrections();
        }
    }

    fn finish_batch(&mut self, batch: &mut Batch) -> Result<f64> {
        self.apply_corrections(batch.samples)?;
        let mean = batch.cost / batch.samples as f64;
        log::debug!("applied batch of {} samples, mean cost {}", batch.samples, mean);
        *batch = Batch::default();
        Ok(mean)
    }

    fn check_dataset(&self, set: ArrayView2<f64>, labels: ArrayView2<f64>) -> Result<()> {
        if set.nrows() != labels.nrows() {
            return Err(Error::InvalidData(format!(
                "{} samples but {} labels",
                set.nrows(),
                labels.nrows()
            )));
        }
        if set.ncols() != self.input.size() {
            return Err(Error::shape(
                LayerId::Input,
                "features",
                &[self.input.size()],
                &[set.ncols()],
            ));
        }
        if labels.ncols() != self.output.size() {
            return Err(Error::shape(
                LayerId::Output,
                "labels",
                &[self.output.size()],
                &[labels.ncols()],
            ));
        }
        Ok(())
    }

    fn run_epochs(
        &mut self,
        set: ArrayView2<f64>,
        labels: ArrayView2<f64>,
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<f64>> {
        let mut trace = Vec::new();
        for epoch in 0..epochs {
            let mut batch = Batch::default();
            let rows = set.rows().into_iter().zip(labels.rows());
            for (sample, (features, expected)) in rows.enumerate() {
                let step = self
                    .forward_measure(features, expected)
                    .and_then(|(predictions, cost)| {
                        self.backward(predictions.view(), expected).map(|_| cost)
                    });
                let cost = step.map_err(|err| {
                    log::warn!("epoch {}, sample {}: {}", epoch + 1, sample, err);
                    err
                })?;
                batch.samples += 1;
                batch.cost += cost;
                if batch.samples == batch_size {
                    trace.push(self.finish_batch(&mut batch)?);
                }
            }
            if batch.samples > 0 {
                trace.push(self.finish_batch(&mut batch)?);
            }
            if let Some(cost) = trace.last() {
                log::info!("epoch {}/{}: cost {}", epoch + 1, epochs, cost);
            }
        }
        Ok(trace)
    }

    /// Train on `set` for `epochs` passes, applying corrections every
    /// `batch_size` samples and once more for the remainder of each epoch.
    ///
    /// Returns the mean cost of every applied batch. On error the accumulated,
    /// unapplied corrections are dropped; already applied batches are kept.
    pub fn learn(
        &mut self,
        set: ArrayView2<f64>,
        labels: ArrayView2<f64>,
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<f64>> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be > 0".to_owned()));
        }
        if set.nrows() == 0 {
            return Err(Error::InvalidData("training set is empty".to_owned()));
        }
        self.check_dataset(set, labels)?;

        let trace = self.run_epochs(set, labels, epochs, batch_size);
        if trace.is_err() {
            self.clear_corrections();
        }
        trace
    }

    /// Predictions for a single sample, leaving the network untouched.
    pub fn predict(&self, features: ArrayView1<f64>) -> Result<Array1<f64>> {
        let mut signal = self.input.contributions(features)?;
        for layer in self.hidden.iter() {
            signal = layer.contributions(signal.view())?;
        }
        self.output.predict(signal.view())
    }

    /// Predictions for every row of `set`, one row per sample.
    pub fn recognize(&self, set: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut predictions = Array2::zeros((set.nrows(), self.output.size()));
        for (features, mut row) in set.rows().into_iter().zip(predictions.rows_mut()) {
            row.assign(&self.predict(features)?);
        }
        Ok(predictions)
    }

    /// Mean cost over `set` without training.
    pub fn evaluate(&self, set: ArrayView2<f64>, labels: ArrayView2<f64>) -> Result<f64> {
        if set.nrows() == 0 {
            return Err(Error::InvalidData("evaluation set is empty".to_owned()));
        }
        self.check_dataset(set, labels)?;
        let mut total = 0.0;
        for (features, expected) in set.rows().into_iter().zip(labels.rows()) {
            let predictions = self.predict(features)?;
            total += self.output.measure(predictions.view(), expected)?;
        }
        Ok(total / set.nrows() as f64)
    }
}
