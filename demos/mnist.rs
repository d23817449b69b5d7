//! Train on the MNIST IDX files found in the directory given as first argument
//! (current directory by default).

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use perceptron::{
    dataset::{load_idx_images, load_idx_labels, ImageScale},
    metrics::one_hot_accuracy,
    NetworkShape, Perceptron,
};

const CLASSES: usize = 10;

const SHAPE: &str = r#"{
    "input": { "size": 784, "learning_rate": 0.5, "bias": 0.5 },
    "hidden": [
        { "size": 100, "learning_rate": 0.5, "bias": 0.5, "activation": "sigmoid" }
    ],
    "output": { "size": 10, "activation": "sigmoid", "cost": "quadratic" }
}"#;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let dir = env::args().nth(1).map(PathBuf::from).unwrap_or_default();

    let load = |image_file: &str, label_file: &str| -> anyhow::Result<_> {
        let set = load_idx_images(dir.join(image_file), ImageScale::Unit)
            .with_context(|| format!("loading {}", image_file))?;
        let labels = load_idx_labels(dir.join(label_file), CLASSES)
            .with_context(|| format!("loading {}", label_file))?;
        Ok((set, labels))
    };
    let (set, labels) = load("train-images-idx3-ubyte", "train-labels-idx1-ubyte")?;
    let (test_set, test_labels) = load("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte")?;

    let shape = NetworkShape::from_json(SHAPE)?;
    let mut network = Perceptron::with_seed(&shape, 7)?;
    for epoch in 0..3 {
        let trace = network.learn(set.view(), labels.view(), 1, 32)?;
        let test_cost = network.evaluate(test_set.view(), test_labels.view())?;
        println!(
            "epoch {}: last batch cost = {:?}, test cost = {}",
            epoch,
            trace.last(),
            test_cost
        );
    }

    let recognized = network.recognize(test_set.view())?;
    println!(
        "test accuracy: {}",
        one_hot_accuracy(recognized.view(), test_labels.view())?
    );
    Ok(())
}
