//! Weight matrices owned by the Input and Hidden layers.
//!
//! A synapse matrix has one row per neuron of the owning layer plus, when the
//! layer carries a bias, one trailing bias row. It has one column per neuron of
//! the next layer. Sizes never count bias units: a bias has no incoming
//! weights, so the bias of the next layer never adds a column.

use ndarray::{s, Array, Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand::RngCore;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, LayerId, Result};

/// Default Nguyen-Widrow scaling base.
pub const SCALING_BASE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynapseShape {
    /// Neurons of the owning layer, bias excluded.
    pub neurons: usize,
    pub bias: bool,
    /// Neurons of the next layer, bias excluded.
    pub next: usize,
}

impl SynapseShape {
    pub fn new(neurons: usize, bias: bool, next: usize) -> Self {
        Self {
            neurons,
            bias,
            next,
        }
    }

    pub fn rows(&self) -> usize {
        self.neurons + usize::from(self.bias)
    }

    pub fn cols(&self) -> usize {
        self.next
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Shape of the contribution matrix sent to the next layer:
    /// one row per next neuron, one column per row of the synapse matrix.
    pub fn contributions_dim(&self) -> (usize, usize) {
        (self.cols(), self.rows())
    }
}

/// Produces the bias-free part of a synapse matrix, shaped `(neurons, next)`.
pub trait WeightInitializer {
    fn draw(&self, neurons: usize, next: usize, rng: &mut dyn RngCore) -> Array2<f64>;
}

/// Uniform draw in `[-0.5, 0.5)`.
pub struct UniformRandom;

impl WeightInitializer for UniformRandom {
    fn draw(&self, neurons: usize, next: usize, rng: &mut dyn RngCore) -> Array2<f64> {
        Array::random_using((neurons, next), Uniform::new(-0.5, 0.5), rng)
    }
}

/// Uniform draw rescaled so that every next neuron's incoming weight vector
/// has the norm `scaling_base * next^(1 / neurons)`.
pub struct NguyenWidrow {
    pub scaling_base: f64,
}

impl Default for NguyenWidrow {
    fn default() -> Self {
        Self {
            scaling_base: SCALING_BASE,
        }
    }
}

impl NguyenWidrow {
    pub fn beta(&self, neurons: usize, next: usize) -> f64 {
        self.scaling_base * (next as f64).powf(1.0 / neurons as f64)
    }
}

impl WeightInitializer for NguyenWidrow {
    fn draw(&self, neurons: usize, next: usize, rng: &mut dyn RngCore) -> Array2<f64> {
        let beta = self.beta(neurons, next);
        // One row per next neuron holding its incoming weights.
        let mut incoming: Array2<f64> =
            Array::random_using((next, neurons), Uniform::new(-0.5, 0.5), rng);
        for mut row in incoming.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|w| w * beta / norm);
            }
        }
        incoming.reversed_axes()
    }
}

/// Serializable choice of a weight initializer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    #[default]
    NguyenWidrow,
    Uniform,
}

impl Initializer {
    pub fn build(self) -> Box<dyn WeightInitializer> {
        match self {
            Initializer::NguyenWidrow => Box::new(NguyenWidrow::default()),
            Initializer::Uniform => Box::new(UniformRandom),
        }
    }
}

/// Draw a complete synapse matrix, bias row included.
///
/// The initializer must return one row per neuron and one column per neuron of
/// the next layer; anything else is a `ShapeMismatch` for `layer`.
pub fn initialize(
    layer: LayerId,
    initializer: &dyn WeightInitializer,
    shape: SynapseShape,
    bias: Option<f64>,
    rng: &mut dyn RngCore,
) -> Result<Array2<f64>> {
    let drawn = initializer.draw(shape.neurons, shape.next, rng);
    if drawn.dim() != (shape.neurons, shape.next) {
        return Err(Error::shape(
            layer,
            "initialized synapses",
            &[shape.neurons, shape.next],
            drawn.shape(),
        ));
    }
    let bias = bias.unwrap_or_default();
    Ok(Array2::from_shape_fn(shape.dim(), |(row, col)| {
        if row < shape.neurons {
            drawn[[row, col]]
        } else {
            bias
        }
    }))
}

/// Weight matrix together with its correction accumulator.
#[derive(Debug, Clone)]
pub struct Synapses {
    layer: LayerId,
    shape: SynapseShape,
    weights: Array2<f64>,
    corrections: Array2<f64>,
    pending: usize,
    learning_rate: f64,
}

impl Synapses {
    pub fn new(
        layer: LayerId,
        shape: SynapseShape,
        weights: Array2<f64>,
        learning_rate: f64,
    ) -> Result<Self> {
        if weights.dim() != shape.dim() {
            return Err(Error::shape(
                layer,
                "synapses",
                &[shape.rows(), shape.cols()],
                weights.shape(),
            ));
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "{}: learning rate must be finite and > 0, got {}",
                layer, learning_rate
            )));
        }
        Ok(Self {
            layer,
            shape,
            corrections: Array2::zeros(shape.dim()),
            weights,
            pending: 0,
            learning_rate,
        })
    }

    pub fn shape(&self) -> SynapseShape {
        self.shape
    }

    pub fn weights(&self) -> ArrayView2<f64> {
        self.weights.view()
    }

    pub fn corrections(&self) -> ArrayView2<f64> {
        self.corrections.view()
    }

    /// Number of samples accumulated since the last application.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn check_signal(&self, signal: ArrayView1<f64>, what: &'static str) -> Result<()> {
        if signal.len() != self.shape.neurons {
            return Err(Error::shape(
                self.layer,
                what,
                &[self.shape.neurons],
                &[signal.len()],
            ));
        }
        Ok(())
    }

    fn check_errors(&self, errors: ArrayView1<f64>) -> Result<()> {
        if errors.len() != self.shape.next {
            return Err(Error::shape(
                self.layer,
                "propagated errors",
                &[self.shape.next],
                &[errors.len()],
            ));
        }
        Ok(())
    }

    /// `signal` with a trailing `1.0` when the layer carries a bias.
    fn augment(&self, signal: ArrayView1<f64>) -> Array1<f64> {
        let mut augmented = Array1::ones(self.shape.rows());
        augmented
            .slice_mut(s![..self.shape.neurons])
            .assign(&signal);
        augmented
    }

    /// Weighted contribution of every neuron (and the bias) to every next neuron.
    pub(crate) fn contributions(&self, signal: ArrayView1<f64>) -> Result<Array2<f64>> {
        self.check_signal(signal, "forward signal")?;
        Ok(&self.weights.t() * &self.augment(signal))
    }

    /// Outer product of the signal seen in forward with the errors of the next layer.
    /// The bias row receives the errors unmultiplied.
    pub(crate) fn sample_corrections(
        &self,
        signal: ArrayView1<f64>,
        errors: ArrayView1<f64>,
    ) -> Result<Array2<f64>> {
        self.check_signal(signal, "retained signal")?;
        self.check_errors(errors)?;
        let augmented = self.augment(signal).insert_axis(Axis(1));
        Ok(augmented.dot(&errors.insert_axis(Axis(0))))
    }

    /// Weighted sum of the next layer's errors for every neuron, bias excluded.
    pub(crate) fn weighted_errors(&self, errors: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_errors(errors)?;
        Ok(self
            .weights
            .slice(s![..self.shape.neurons, ..])
            .dot(&errors))
    }

    pub(crate) fn accumulate(&mut self, corrections: &Array2<f64>) -> Result<()> {
        if corrections.dim() != self.corrections.dim() {
            return Err(Error::shape(
                self.layer,
                "corrections",
                self.corrections.shape(),
                corrections.shape(),
            ));
        }
        self.corrections += corrections;
        self.pending += 1;
        Ok(())
    }

    /// Accumulate the corrections of one sample.
    pub fn update_corrections(
        &mut self,
        signal: ArrayView1<f64>,
        errors: ArrayView1<f64>,
    ) -> Result<()> {
        let corrections = self.sample_corrections(signal, errors)?;
        self.accumulate(&corrections)
    }

    /// Descend along the averaged corrections and clear the accumulator.
    pub fn apply_corrections(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "{}: batch size must be > 0",
                self.layer
            )));
        }
        if self.pending == 0 {
            return Ok(());
        }
        log::trace!(
            "{}: applying {} accumulated samples over batch of {}",
            self.layer,
            self.pending,
            batch_size
        );
        self.weights
            .scaled_add(-self.learning_rate / batch_size as f64, &self.corrections);
        self.clear_corrections();
        Ok(())
    }

    pub fn clear_corrections(&mut self) {
        self.corrections.fill(0.0);
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_rel_eq_arr2;

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn bias_adds_a_row_never_a_column() {
        let shape = SynapseShape::new(4, true, 3);
        assert_eq!((5, 3), shape.dim());
        assert_eq!((3, 5), shape.contributions_dim());

        let shape = SynapseShape::new(4, false, 3);
        assert_eq!((4, 3), shape.dim());
        assert_eq!((3, 4), shape.contributions_dim());
    }

    #[test]
    fn initialize_appends_constant_bias_row() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = SynapseShape::new(3, true, 2);
        let weights =
            initialize(LayerId::Input, &UniformRandom, shape, Some(0.5), &mut rng).unwrap();
        assert_eq!((4, 2), weights.dim());
        assert_eq!(arr1(&[0.5, 0.5]), weights.row(3));
        assert!(weights
            .slice(s![..3, ..])
            .iter()
            .all(|&w| (-0.5..0.5).contains(&w)));
    }

    #[test]
    fn initialize_without_bias() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = SynapseShape::new(3, false, 2);
        let weights = initialize(LayerId::Input, &UniformRandom, shape, None, &mut rng).unwrap();
        assert_eq!((3, 2), weights.dim());
    }

    /// Returns its draw with the axes swapped.
    struct Transposed;

    impl WeightInitializer for Transposed {
        fn draw(&self, neurons: usize, next: usize, _rng: &mut dyn RngCore) -> Array2<f64> {
            Array2::zeros((next, neurons))
        }
    }

    #[test]
    fn initialize_rejects_misshaped_draw() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = SynapseShape::new(3, true, 2);
        let err = initialize(LayerId::Hidden(1), &Transposed, shape, Some(0.5), &mut rng)
            .unwrap_err();
        match err {
            Error::ShapeMismatch {
                layer,
                expected,
                actual,
                ..
            } => {
                assert_eq!(LayerId::Hidden(1), layer);
                assert_eq!(vec![3, 2], expected);
                assert_eq!(vec![2, 3], actual);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn nguyen_widrow_incoming_vectors_have_beta_norm() {
        let init = NguyenWidrow::default();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shape = SynapseShape::new(5, true, 4);
            let weights = initialize(LayerId::Input, &init, shape, Some(1.0), &mut rng).unwrap();
            let beta = init.beta(5, 4);
            for col in weights.slice(s![..5, ..]).columns() {
                assert_relative_eq!(beta, col.dot(&col).sqrt(), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn nguyen_widrow_beta() {
        let init = NguyenWidrow::default();
        assert_relative_eq!(0.7 * 2f64.sqrt(), init.beta(2, 2));
        assert_relative_eq!(0.7, init.beta(3, 1));
    }

    #[test]
    fn seeded_initialization_is_reproducible() {
        let shape = SynapseShape::new(3, true, 3);
        let first = initialize(
            LayerId::Input,
            &NguyenWidrow::default(),
            shape,
            Some(0.5),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        let second = initialize(
            LayerId::Input,
            &NguyenWidrow::default(),
            shape,
            Some(0.5),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn new_rejects_misshaped_weights() {
        let shape = SynapseShape::new(2, true, 2);
        let err = Synapses::new(LayerId::Input, shape, Array2::zeros((2, 2)), 0.1).unwrap_err();
        match err {
            Error::ShapeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(vec![3, 2], expected);
                assert_eq!(vec![2, 2], actual);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn new_rejects_non_positive_learning_rate() {
        let shape = SynapseShape::new(1, false, 1);
        assert!(Synapses::new(LayerId::Input, shape, Array2::zeros((1, 1)), 0.0).is_err());
        assert!(Synapses::new(LayerId::Input, shape, Array2::zeros((1, 1)), f64::NAN).is_err());
    }

    #[test]
    fn contributions_without_bias() {
        let weights = arr2(&[
            [1.0, 10.0, 100.0, 1000.0],
            [2.0, 20.0, 200.0, 2000.0],
            [3.0, 30.0, 300.0, 3000.0],
        ]);
        let synapses =
            Synapses::new(LayerId::Input, SynapseShape::new(3, false, 4), weights, 1.0).unwrap();
        let out = synapses.contributions(arr1(&[1.0, 2.0, 3.0]).view()).unwrap();
        assert_rel_eq_arr2!(
            out,
            arr2(&[
                [1.0, 4.0, 9.0],
                [10.0, 40.0, 90.0],
                [100.0, 400.0, 900.0],
                [1000.0, 4000.0, 9000.0],
            ])
        );
    }

    #[test]
    fn apply_descends_along_average_correction() {
        let shape = SynapseShape::new(1, true, 2);
        let mut synapses =
            Synapses::new(LayerId::Input, shape, arr2(&[[1.0, 2.0], [3.0, 4.0]]), 0.5).unwrap();
        synapses
            .update_corrections(arr1(&[2.0]).view(), arr1(&[1.0, -1.0]).view())
            .unwrap();
        synapses
            .update_corrections(arr1(&[2.0]).view(), arr1(&[1.0, -1.0]).view())
            .unwrap();
        assert_eq!(2, synapses.pending());
        assert_rel_eq_arr2!(synapses.corrections(), arr2(&[[4.0, -4.0], [2.0, -2.0]]));

        synapses.apply_corrections(2).unwrap();
        assert_rel_eq_arr2!(synapses.weights(), arr2(&[[0.0, 3.0], [2.5, 4.5]]));
        assert_rel_eq_arr2!(synapses.corrections(), Array2::<f64>::zeros((2, 2)));
        assert_eq!(0, synapses.pending());
    }

    #[test]
    fn apply_without_pending_corrections_is_a_no_op() {
        let shape = SynapseShape::new(1, false, 1);
        let mut synapses =
            Synapses::new(LayerId::Input, shape, arr2(&[[1.5]]), 0.5).unwrap();
        synapses.apply_corrections(4).unwrap();
        assert_eq!(arr2(&[[1.5]]), synapses.weights());
        assert!(synapses.apply_corrections(0).is_err());
    }

    #[test]
    fn misshaped_errors_are_rejected() {
        let shape = SynapseShape::new(2, true, 2);
        let mut synapses =
            Synapses::new(LayerId::Hidden(0), shape, Array2::zeros((3, 2)), 0.5).unwrap();
        let err = synapses
            .update_corrections(arr1(&[1.0, 1.0]).view(), arr1(&[1.0]).view())
            .unwrap_err();
        assert_eq!(Some(LayerId::Hidden(0)), err.layer());
        assert_eq!(0, synapses.pending());
    }
}
