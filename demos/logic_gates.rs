use ndarray::{arr2, Array2};
use perceptron::{NetworkShape, Perceptron};

const SHAPE: &str = r#"{
    "input": { "size": 2, "learning_rate": 2.0, "bias": 0.5 },
    "hidden": [
        { "size": 3, "learning_rate": 2.0, "bias": 0.5, "activation": "sigmoid" }
    ],
    "output": { "size": 1, "activation": "sigmoid", "cost": "quadratic" }
}"#;

fn train(name: &str, shape: &NetworkShape, labels: Array2<f64>) -> anyhow::Result<()> {
    let set = arr2(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]);
    let mut network = Perceptron::with_seed(shape, 42)?;
    let trace = network.learn(set.view(), labels.view(), 5000, 4)?;

    println!(
        "{}: cost {:?} -> {:?}",
        name,
        trace.first(),
        trace.last()
    );
    let predictions = network.recognize(set.view())?;
    for (features, prediction) in set.rows().into_iter().zip(predictions.rows()) {
        println!("  {} -> {:.3}", features, prediction[0]);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let shape = NetworkShape::from_json(SHAPE)?;

    train("AND", &shape, arr2(&[[0.0], [0.0], [0.0], [1.0]]))?;
    train("OR", &shape, arr2(&[[0.0], [1.0], [1.0], [1.0]]))?;
    train("XOR", &shape, arr2(&[[0.0], [1.0], [1.0], [0.0]]))?;
    Ok(())
}
