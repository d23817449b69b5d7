use ndarray::{Array1, Array2, ArrayView1};
use ndarray_rand::rand::RngCore;

use crate::error::{Error, LayerId, Result};
use crate::synapse::{Synapses, WeightInitializer};

use super::{drawn_synapses, explicit_synapses, Trainable};

/// First layer: passes the features on without activation.
pub struct Input {
    synapses: Synapses,
    features: Option<Array1<f64>>,
}

impl Input {
    pub fn new(
        neurons: usize,
        bias: Option<f64>,
        next: usize,
        learning_rate: f64,
        initializer: &dyn WeightInitializer,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        let synapses = drawn_synapses(
            LayerId::Input,
            neurons,
            bias,
            next,
            learning_rate,
            initializer,
            rng,
        )?;
        Ok(Self {
            synapses,
            features: None,
        })
    }

    /// Layer around explicit synapses. With `bias`, the last row holds the bias weights.
    pub fn with_synapses(weights: Array2<f64>, bias: bool, learning_rate: f64) -> Result<Self> {
        Ok(Self {
            synapses: explicit_synapses(LayerId::Input, weights, bias, learning_rate)?,
            features: None,
        })
    }

    /// Number of features accepted, bias excluded.
    pub fn size(&self) -> usize {
        self.synapses.shape().neurons
    }

    /// Contributions of `features` to the next layer, leaving the layer untouched.
    pub fn contributions(&self, features: ArrayView1<f64>) -> Result<Array2<f64>> {
        self.synapses.contributions(features)
    }

    /// Contributions of `features` to the next layer. Keeps the features for `backward`.
    pub fn forward(&mut self, features: ArrayView1<f64>) -> Result<Array2<f64>> {
        let output = self.contributions(features)?;
        self.features = Some(features.to_owned());
        Ok(output)
    }

    /// Corrections for the errors of the next layer, not yet committed.
    pub fn gradient(&self, errors: ArrayView1<f64>) -> Result<Array2<f64>> {
        let features = self.features.as_ref().ok_or(Error::Uninitialized {
            layer: LayerId::Input,
            what: "retained features",
        })?;
        self.synapses.sample_corrections(features.view(), errors)
    }

    pub fn backward(&mut self, errors: ArrayView1<f64>) -> Result<()> {
        let corrections = self.gradient(errors)?;
        self.accumulate(&corrections)
    }
}

impl Trainable for Input {
    fn id(&self) -> LayerId {
        LayerId::Input
    }

    fn synapses(&self) -> &Synapses {
        &self.synapses
    }

    fn synapses_mut(&mut self) -> &mut Synapses {
        &mut self.synapses
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_rel_eq_arr2;

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};

    use crate::synapse::NguyenWidrow;

    #[test]
    fn forward_without_bias() {
        let weights = arr2(&[
            [1.0, 10.0, 100.0, 1000.0],
            [2.0, 20.0, 200.0, 2000.0],
            [3.0, 30.0, 300.0, 3000.0],
        ]);
        let mut layer = Input::with_synapses(weights, false, 1.0).unwrap();
        let output = layer.forward(arr1(&[1.0, 2.0, 3.0]).view()).unwrap();
        assert_rel_eq_arr2!(
            output,
            arr2(&[
                [1.0, 4.0, 9.0],
                [10.0, 40.0, 90.0],
                [100.0, 400.0, 900.0],
                [1000.0, 4000.0, 9000.0],
            ])
        );
    }

    #[test]
    fn forward_appends_bias_weight() {
        let weights = arr2(&[[1.0, 2.0], [3.0, 4.0], [0.5, -0.5]]);
        let mut layer = Input::with_synapses(weights, true, 1.0).unwrap();
        let output = layer.forward(arr1(&[1.0, 10.0]).view()).unwrap();
        assert_rel_eq_arr2!(output, arr2(&[[1.0, 30.0, 0.5], [2.0, 40.0, -0.5]]));
    }

    #[test]
    fn forward_shape_follows_layer_sizes() {
        let mut rng = StdRng::seed_from_u64(3);
        for &(neurons, bias, next) in &[(1, None, 1), (4, Some(0.5), 3), (7, Some(1.0), 2)] {
            let mut layer =
                Input::new(neurons, bias, next, 0.1, &NguyenWidrow::default(), &mut rng).unwrap();
            let output = layer.forward(Array1::<f64>::ones(neurons).view()).unwrap();
            let shape = layer.synapses().shape();
            assert_eq!(shape.contributions_dim(), output.dim());
            assert_eq!((next, neurons + usize::from(bias.is_some())), output.dim());
        }
    }

    #[test]
    fn forward_rejects_wrong_feature_count() {
        let mut layer = Input::with_synapses(Array2::zeros((3, 2)), true, 1.0).unwrap();
        match layer.forward(arr1(&[1.0, 2.0, 3.0]).view()) {
            Err(Error::ShapeMismatch {
                layer,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(LayerId::Input, layer);
                assert_eq!(vec![2], expected);
                assert_eq!(vec![3], actual);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn backward_accumulates_outer_product_and_raw_bias_errors() {
        let mut layer = Input::with_synapses(Array2::zeros((3, 2)), true, 1.0).unwrap();
        layer.forward(arr1(&[2.0, 3.0]).view()).unwrap();
        layer.backward(arr1(&[1.0, -2.0]).view()).unwrap();
        assert_rel_eq_arr2!(
            layer.synapses().corrections(),
            arr2(&[[2.0, -4.0], [3.0, -6.0], [1.0, -2.0]])
        );
        layer.backward(arr1(&[1.0, -2.0]).view()).unwrap();
        assert_relative_eq!(4.0, layer.synapses().corrections()[[0, 0]]);
        assert_eq!(2, layer.synapses().pending());
    }

    #[test]
    fn backward_before_forward_is_uninitialized() {
        let mut layer = Input::with_synapses(Array2::zeros((2, 2)), false, 1.0).unwrap();
        assert!(matches!(
            layer.backward(arr1(&[1.0, 1.0]).view()),
            Err(Error::Uninitialized {
                layer: LayerId::Input,
                ..
            })
        ));
    }

    #[test]
    fn backward_rejects_wrong_error_count() {
        let mut layer = Input::with_synapses(Array2::zeros((2, 2)), false, 1.0).unwrap();
        layer.forward(arr1(&[1.0, 1.0]).view()).unwrap();
        assert!(matches!(
            layer.backward(arr1(&[1.0, 1.0, 1.0]).view()),
            Err(Error::ShapeMismatch { .. })
        ));
        assert_eq!(0, layer.synapses().pending());
    }

    #[test]
    fn new_rejects_empty_layers() {
        let mut rng = StdRng::seed_from_u64(0);
        let init = NguyenWidrow::default();
        for &(neurons, next) in &[(0, 2), (2, 0)] {
            assert!(matches!(
                Input::new(neurons, Some(0.5), next, 0.1, &init, &mut rng),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    /// Draws with rows and columns swapped.
    struct Transposed;

    impl WeightInitializer for Transposed {
        fn draw(&self, neurons: usize, next: usize, _rng: &mut dyn RngCore) -> Array2<f64> {
            Array2::zeros((next, neurons))
        }
    }

    #[test]
    fn new_rejects_misshaped_initializer() {
        let mut rng = StdRng::seed_from_u64(0);
        match Input::new(3, None, 2, 0.1, &Transposed, &mut rng) {
            Err(Error::ShapeMismatch {
                layer,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(LayerId::Input, layer);
                assert_eq!(vec![3, 2], expected);
                assert_eq!(vec![2, 3], actual);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn with_synapses_needs_a_neuron_besides_bias() {
        assert!(Input::with_synapses(Array2::zeros((1, 2)), true, 1.0).is_err());
    }
}
