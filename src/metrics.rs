use ndarray::{Array2, ArrayView2};

use crate::dataset::argmax;
use crate::error::{Error, Result};

fn check_pairs(y_true: usize, y_pred: usize) -> Result<()> {
    if y_true != y_pred {
        return Err(Error::InvalidData(format!(
            "{} true labels but {} predictions",
            y_true, y_pred
        )));
    }
    if y_true == 0 {
        return Err(Error::InvalidData("no labels to compare".to_owned()));
    }
    Ok(())
}

/// Compute accuracy of the predicted labels `y_pred` to the correct labels `y_true`.
pub fn accuracy<Label>(y_true: &[Label], y_pred: &[Label]) -> Result<f64>
where
    Label: Eq,
{
    check_pairs(y_true.len(), y_pred.len())?;
    let n_corrects = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(n_corrects as f64 / y_true.len() as f64)
}

/// Share of rows whose largest prediction sits where the one-hot label is set.
pub fn one_hot_accuracy(predictions: ArrayView2<f64>, labels: ArrayView2<f64>) -> Result<f64> {
    check_pairs(labels.nrows(), predictions.nrows())?;
    if predictions.ncols() != labels.ncols() {
        return Err(Error::InvalidData(format!(
            "{} prediction columns for {} label columns",
            predictions.ncols(),
            labels.ncols()
        )));
    }
    let y_true = labels.rows().into_iter().map(argmax).collect::<Vec<_>>();
    let y_pred = predictions.rows().into_iter().map(argmax).collect::<Vec<_>>();
    accuracy(&y_true, &y_pred)
}

/// Construct confusion matrix from `y_true` and `y_pred`.
/// An item in i-th row and j-th column is the number of predicted j-th label where a true label is
/// i-th one. Labels missing from `label_kinds` are not counted.
pub fn confusion_matrix<Label>(
    y_true: &[Label],
    y_pred: &[Label],
    label_kinds: &[Label],
) -> Result<Array2<usize>>
where
    Label: Eq,
{
    check_pairs(y_true.len(), y_pred.len())?;
    let index_of = |label: &Label| label_kinds.iter().position(|kind| kind == label);
    let mut matrix = Array2::zeros((label_kinds.len(), label_kinds.len()));
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        if let (Some(i), Some(j)) = (index_of(t), index_of(p)) {
            matrix[[i, j]] += 1;
        }
    }
    Ok(matrix)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Macro averaged precision, recall and F1 score.
pub fn precision_recall_fscore<Label>(
    y_true: &[Label],
    y_pred: &[Label],
    label_kinds: &[Label],
) -> Result<(f64, f64, f64)>
where
    Label: Eq,
{
    if label_kinds.is_empty() {
        return Err(Error::InvalidData("no label kinds".to_owned()));
    }
    let matrix = confusion_matrix(y_true, y_pred, label_kinds)?;
    let (precision_sum, recall_sum, f1_sum) = (0..label_kinds.len())
        .map(|label| {
            let true_pos = matrix[[label, label]];
            let predicted = matrix.column(label).sum();
            let actual = matrix.row(label).sum();
            let precision = ratio(true_pos, predicted);
            let recall = ratio(true_pos, actual);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            (precision, recall, f1)
        })
        .fold((0.0, 0.0, 0.0), |(precision, recall, f1), (p, r, f)| {
            (precision + p, recall + r, f1 + f)
        });
    let kinds = label_kinds.len() as f64;
    Ok((precision_sum / kinds, recall_sum / kinds, f1_sum / kinds))
}
