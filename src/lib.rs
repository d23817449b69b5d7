//! Multilayer perceptron trained by backpropagation.
//!
//! A [`Perceptron`] chains an [`Input`](layer::Input) layer, any number of
//! [`Hidden`](layer::Hidden) layers and an [`Output`](layer::Output) layer.
//! Samples are fed one at a time; corrections accumulate per layer and are applied
//! once per mini-batch.
//!
//! ```no_run
//! use ndarray::arr2;
//! use perceptron::{NetworkShape, Perceptron};
//!
//! # fn main() -> perceptron::Result<()> {
//! let shape = NetworkShape::load("and_gate.json")?;
//! let mut network = Perceptron::with_seed(&shape, 42)?;
//! let set = arr2(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]);
//! let labels = arr2(&[[0.0], [0.0], [0.0], [1.0]]);
//! let costs = network.learn(set.view(), labels.view(), 2000, 4)?;
//! println!("final cost: {:?}", costs.last());
//! println!("{}", network.recognize(set.view())?);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod cost;
pub mod dataset;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod network;
pub mod synapse;

pub use config::{HiddenShape, InputShape, NetworkShape, OutputShape};
pub use error::{Error, LayerId, Result};
pub use network::Perceptron;

#[macro_export]
macro_rules! assert_rel_eq_arr1 {
    ($actual:expr, $expected:expr) => {
        assert_eq!($actual.shape(), $expected.shape());
        ndarray::Zip::from(&$actual)
            .and(&$expected)
            .for_each(|v, w| {
                assert_relative_eq!(v, w);
            });
    };
}

#[macro_export]
macro_rules! assert_rel_eq_arr2 {
    ($actual:expr, $expected:expr) => {
        assert_eq!($actual.shape(), $expected.shape());
        ndarray::Zip::from(&$actual)
            .and(&$expected)
            .for_each(|v, w| {
                assert_relative_eq!(v, w);
            });
    };
}
