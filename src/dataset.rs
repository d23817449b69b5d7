//! Loading and shaping training data.

use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand::{seq::SliceRandom, RngCore};

use crate::error::{Error, Result};

/// Magic number of an IDX file of unsigned byte images.
pub const IDX_IMAGES_MAGIC: u32 = 2051;
/// Magic number of an IDX file of unsigned byte labels.
pub const IDX_LABELS_MAGIC: u32 = 2049;

/// How pixel bytes become features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScale {
    /// Bytes as they are, `0.0..=255.0`.
    Raw,
    /// Bytes divided by 255, `0.0..=1.0`.
    Unit,
}

impl ImageScale {
    fn apply(self, pixel: u8) -> f64 {
        match self {
            ImageScale::Raw => f64::from(pixel),
            ImageScale::Unit => f64::from(pixel) / 255.0,
        }
    }
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut bytes = [0; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|err| Error::InvalidData(format!("reading {}: {}", what, err)))?;
    Ok(u32::from_be_bytes(bytes))
}

fn check_magic<R: Read>(reader: &mut R, expected: u32) -> Result<()> {
    let magic = read_u32(reader, "magic number")?;
    if magic != expected {
        return Err(Error::InvalidData(format!(
            "wrong magic number {}, expected {}",
            magic, expected
        )));
    }
    Ok(())
}

fn read_body<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.take(len as u64).read_to_end(&mut body)?;
    if body.len() != len {
        return Err(Error::InvalidData(format!(
            "{} truncated: expected {} bytes, got {}",
            what,
            len,
            body.len()
        )));
    }
    Ok(body)
}

/// Read an IDX image file into a `(images, rows * columns)` matrix.
pub fn read_idx_images<R: Read>(mut reader: R, scale: ImageScale) -> Result<Array2<f64>> {
    check_magic(&mut reader, IDX_IMAGES_MAGIC)?;
    let count = read_u32(&mut reader, "image count")? as usize;
    let rows = read_u32(&mut reader, "row count")? as usize;
    let columns = read_u32(&mut reader, "column count")? as usize;
    let (pixels, len) = rows
        .checked_mul(columns)
        .and_then(|pixels| Some((pixels, pixels.checked_mul(count)?)))
        .ok_or_else(|| {
            Error::InvalidData(format!("{} images of {}x{} pixels", count, rows, columns))
        })?;

    let body = read_body(&mut reader, len, "image data")?;
    let features = body.into_iter().map(|pixel| scale.apply(pixel)).collect();
    Array2::from_shape_vec((count, pixels), features)
        .map_err(|err| Error::InvalidData(err.to_string()))
}

/// Read an IDX label file into one-hot rows of `classes` columns.
pub fn read_idx_labels<R: Read>(mut reader: R, classes: usize) -> Result<Array2<f64>> {
    check_magic(&mut reader, IDX_LABELS_MAGIC)?;
    let count = read_u32(&mut reader, "label count")? as usize;
    let body = read_body(&mut reader, count, "label data")?;

    let mut one_hot = Array2::zeros((count, classes));
    for (index, &label) in body.iter().enumerate() {
        let class = usize::from(label);
        if class >= classes {
            return Err(Error::InvalidData(format!(
                "label {} of sample {} is out of {} classes",
                label, index, classes
            )));
        }
        one_hot[[index, class]] = 1.0;
    }
    Ok(one_hot)
}

pub fn load_idx_images(path: impl AsRef<Path>, scale: ImageScale) -> Result<Array2<f64>> {
    let file = File::open(path)?;
    read_idx_images(BufReader::new(file), scale)
}

pub fn load_idx_labels(path: impl AsRef<Path>, classes: usize) -> Result<Array2<f64>> {
    let file = File::open(path)?;
    read_idx_labels(BufReader::new(file), classes)
}

/// Stack equally long rows into a matrix.
pub fn rows_to_array(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    if let Some(index) = rows.iter().position(|row| row.len() != width) {
        return Err(Error::InvalidData(format!(
            "row {} has {} values, expected {}",
            index,
            rows[index].len(),
            width
        )));
    }
    let values = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), width), values)
        .map_err(|err| Error::InvalidData(err.to_string()))
}

/// Index of the largest value. The first one wins ties; `None` for an empty vector.
pub fn argmax(values: ArrayView1<f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (index, &value)| match best {
            Some((_, max)) if value <= max => best,
            _ => Some((index, value)),
        })
        .map(|(index, _)| index)
}

/// Encode labels to one-hot vectors and decode them.
pub struct OneHotEncoder<Label>
where
    Label: Hash + Eq + Clone,
{
    label_to_id: HashMap<Label, usize>,
    id_to_label: Vec<Label>,
}

impl<Label> OneHotEncoder<Label>
where
    Label: Hash + Eq + Clone,
{
    /// Record labels to convert, in column order.
    pub fn new(label_kinds: &[Label]) -> Self {
        let label_to_id = label_kinds
            .iter()
            .cloned()
            .enumerate()
            .map(|(id, label)| (label, id))
            .collect();
        Self {
            label_to_id,
            id_to_label: label_kinds.to_vec(),
        }
    }

    pub fn classes(&self) -> usize {
        self.id_to_label.len()
    }

    /// Encode labels as rows of a `(labels, classes)` matrix.
    pub fn encode(&self, labels: &[Label]) -> Result<Array2<f64>> {
        let mut one_hot = Array2::zeros((labels.len(), self.classes()));
        for (row, label) in labels.iter().enumerate() {
            let id = self.label_to_id.get(label).ok_or_else(|| {
                Error::InvalidData(format!("unknown label at row {}", row))
            })?;
            one_hot[[row, *id]] = 1.0;
        }
        Ok(one_hot)
    }

    /// Decode every row to the label of its largest value.
    pub fn decode(&self, one_hot: ArrayView2<f64>) -> Result<Vec<Label>> {
        if one_hot.ncols() != self.classes() {
            return Err(Error::InvalidData(format!(
                "{} columns to decode {} classes",
                one_hot.ncols(),
                self.classes()
            )));
        }
        one_hot
            .lanes(Axis(1))
            .into_iter()
            .map(|row| {
                argmax(row)
                    .map(|id| self.id_to_label[id].clone())
                    .ok_or_else(|| Error::InvalidData("nothing to decode".to_owned()))
            })
            .collect()
    }
}

/// Shuffle the samples and split them into `(x_train, x_test, y_train, y_test)`.
/// `train_ratio` is the share of samples kept for training.
pub fn train_test_split(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    train_ratio: f64,
    rng: &mut dyn RngCore,
) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>)> {
    if x.nrows() != y.nrows() {
        return Err(Error::InvalidData(format!(
            "{} samples but {} labels",
            x.nrows(),
            y.nrows()
        )));
    }
    if !(0.0 < train_ratio && train_ratio < 1.0) {
        return Err(Error::InvalidConfig(format!(
            "train ratio must be in (0, 1), got {}",
            train_ratio
        )));
    }

    let mut order = (0..x.nrows()).collect::<Vec<_>>();
    order.shuffle(rng);
    let train_size = (x.nrows() as f64 * train_ratio) as usize;
    let (train, test) = order.split_at(train_size);
    Ok((
        x.select(Axis(0), train),
        x.select(Axis(0), test),
        y.select(Axis(0), train),
        y.select(Axis(0), test),
    ))
}

#[cfg(test)]
mod tests {
    use crate::{assert_rel_eq_arr1, assert_rel_eq_arr2};

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array1};
    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};
    use std::io::Cursor;

    fn idx_header(magic: u32, dims: &[u32]) -> Vec<u8> {
        std::iter::once(magic)
            .chain(dims.iter().copied())
            .flat_map(u32::to_be_bytes)
            .collect()
    }

    #[test]
    fn read_images() {
        let mut bytes = idx_header(IDX_IMAGES_MAGIC, &[2, 2, 2]);
        bytes.extend_from_slice(&[0, 255, 51, 102, 1, 2, 3, 4]);

        let unit = read_idx_images(Cursor::new(&bytes), ImageScale::Unit).unwrap();
        assert_rel_eq_arr2!(
            unit,
            arr2(&[
                [0.0, 1.0, 0.2, 0.4],
                [1.0 / 255.0, 2.0 / 255.0, 3.0 / 255.0, 4.0 / 255.0],
            ])
        );

        let raw = read_idx_images(Cursor::new(&bytes), ImageScale::Raw).unwrap();
        assert_relative_eq!(255.0, raw[[0, 1]]);
    }

    #[test]
    fn label_magic_is_not_an_image_file() {
        let mut bytes = idx_header(IDX_LABELS_MAGIC, &[1, 1, 1]);
        bytes.push(0);
        assert!(matches!(
            read_idx_images(Cursor::new(bytes), ImageScale::Raw),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn truncated_images_are_rejected() {
        let mut bytes = idx_header(IDX_IMAGES_MAGIC, &[2, 2, 2]);
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = read_idx_images(Cursor::new(bytes), ImageScale::Raw).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn read_labels_as_one_hot() {
        let mut bytes = idx_header(IDX_LABELS_MAGIC, &[3]);
        bytes.extend_from_slice(&[2, 0, 1]);
        let labels = read_idx_labels(Cursor::new(bytes), 3).unwrap();
        assert_rel_eq_arr2!(
            labels,
            arr2(&[[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
        );
    }

    #[test]
    fn label_out_of_classes_is_rejected() {
        let mut bytes = idx_header(IDX_LABELS_MAGIC, &[1]);
        bytes.push(10);
        assert!(read_idx_labels(Cursor::new(bytes), 10).is_err());
    }

    #[test]
    fn stack_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_rel_eq_arr2!(rows_to_array(&rows).unwrap(), arr2(&[[1.0, 2.0], [3.0, 4.0]]));
        assert!(rows_to_array(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(Some(1), argmax(arr1(&[0.1, 0.7, 0.7]).view()));
        assert_eq!(None, argmax(Array1::<f64>::zeros(0).view()));
    }

    #[test]
    fn encode_labels() {
        let label_kinds = vec!["A", "B", "C"].into_iter().map(String::from).collect::<Vec<_>>();
        let encoder = OneHotEncoder::new(&label_kinds);

        let labels = vec!["A", "A", "C", "B", "C"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let one_hot_vecs = encoder.encode(&labels).unwrap();
        assert_rel_eq_arr2!(
            arr2(&[
                [1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0,],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0,],
            ]),
            one_hot_vecs
        );
        assert!(encoder.encode(&["D".to_owned()]).is_err());
    }

    #[test]
    fn decode_one_hot() {
        let encoder = OneHotEncoder::new(&["A", "B", "C"]);

        let one_hot_vecs = arr2(&[
            [1.0, 0.0, 0.0],
            [0.8, 0.2, 0.0],
            [0.05, 0.05, 0.9],
            [0.0, 1.0, 0.0],
            [0.1, 0.2, 0.7],
        ]);
        let labels = encoder.decode(one_hot_vecs.view()).unwrap();
        assert_eq!(vec!["A", "A", "C", "B", "C"], labels);
    }

    #[test]
    fn split_keeps_samples_paired() {
        let x = arr2(&[[0.0], [1.0], [2.0], [3.0]]);
        let y = arr2(&[[0.0], [10.0], [20.0], [30.0]]);
        let mut rng = StdRng::seed_from_u64(4);
        let (x_train, x_test, y_train, y_test) =
            train_test_split(x.view(), y.view(), 0.75, &mut rng).unwrap();
        assert_eq!(3, x_train.nrows());
        assert_eq!(1, x_test.nrows());
        assert_rel_eq_arr1!(x_train.column(0).mapv(|v| v * 10.0), y_train.column(0));
        assert_rel_eq_arr1!(x_test.column(0).mapv(|v| v * 10.0), y_test.column(0));
    }
}
