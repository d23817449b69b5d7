use anyhow::Context;
use csv::Reader;
use ndarray_rand::rand::{rngs::StdRng, SeedableRng};
use perceptron::{
    dataset::{rows_to_array, train_test_split, OneHotEncoder},
    metrics::{accuracy, confusion_matrix, precision_recall_fscore},
    NetworkShape, Perceptron,
};
use std::path::Path;

const SHAPE: &str = r#"{
    "input": { "size": 4, "learning_rate": 0.5, "bias": 0.5 },
    "hidden": [
        { "size": 10, "learning_rate": 0.5, "bias": 0.5, "activation": "sigmoid" }
    ],
    "output": { "size": 3, "activation": "sigmoid", "cost": "cross_entropy" }
}"#;

// Load iris dataset available here: https://www.kaggle.com/arshid/iris-flower-dataset
fn load_iris(file_path: impl AsRef<Path>) -> anyhow::Result<(Vec<Vec<f64>>, Vec<String>)> {
    let mut reader = Reader::from_path(file_path)?;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let y = row
            .get(4)
            .with_context(|| format!("row {} has no species", line))?
            .to_string();
        let features = row
            .iter()
            .take(4)
            .map(|r| r.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("row {} has a bad measurement", line))?;
        xs.push(features);
        ys.push(y);
    }
    Ok((xs, ys))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let (xs, ys) = load_iris("./IRIS.csv")?;
    let labels = vec!["Iris-setosa", "Iris-versicolor", "Iris-virginica"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let encoder = OneHotEncoder::new(&labels);

    let x = rows_to_array(&xs)?;
    let y = encoder.encode(&ys)?;
    let mut rng = StdRng::seed_from_u64(0);
    let (x_train, x_test, y_train, y_test) = train_test_split(x.view(), y.view(), 0.75, &mut rng)?;

    let shape = NetworkShape::from_json(SHAPE)?;
    let mut network = Perceptron::new(&shape, &mut rng)?;

    let epochs = 3000;
    let batch_size = 16;
    let trace = network.learn(x_train.view(), y_train.view(), epochs, batch_size)?;
    let batches_per_epoch = trace.len() / epochs;
    for (epoch, costs) in trace.chunks(batches_per_epoch).enumerate().step_by(100) {
        let total: f64 = costs.iter().sum();
        println!("epoch {}: total cost = {}", epoch, total);
    }

    let y_pred = encoder.decode(network.recognize(x_test.view())?.view())?;
    let y_true = encoder.decode(y_test.view())?;
    let (precision, recall, f1) = precision_recall_fscore(&y_true, &y_pred, &labels)?;

    println!("accuracy: {}", accuracy(&y_true, &y_pred)?);
    println!("precision: {}, recall: {}, f1: {}", precision, recall, f1);
    println!("{}", confusion_matrix(&y_true, &y_pred, &labels)?);
    Ok(())
}
