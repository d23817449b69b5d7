use std::{fmt, io};

use crate::activation::RangeError;

/// Position of a layer inside a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerId {
    Input,
    Hidden(usize),
    Output,
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerId::Input => write!(f, "input layer"),
            LayerId::Hidden(index) => write!(f, "hidden layer #{}", index),
            LayerId::Output => write!(f, "output layer"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// Input, label, weight or correction dimensions disagree.
    ShapeMismatch {
        layer: LayerId,
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// An activation was fed a value outside of its safe operating range.
    NumericRange {
        layer: LayerId,
        neuron: usize,
        source: RangeError,
    },
    /// State that a previous step should have produced is missing.
    Uninitialized { layer: LayerId, what: &'static str },
    InvalidConfig(String),
    InvalidData(String),
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(
        layer: LayerId,
        what: &'static str,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        Error::ShapeMismatch {
            layer,
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Layer the error is attributed to, if any.
    pub fn layer(&self) -> Option<LayerId> {
        match self {
            Error::ShapeMismatch { layer, .. }
            | Error::NumericRange { layer, .. }
            | Error::Uninitialized { layer, .. } => Some(*layer),
            Error::InvalidConfig(_) | Error::InvalidData(_) | Error::Io(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShapeMismatch {
                layer,
                what,
                expected,
                actual,
            } => write!(
                f,
                "{}: shape mismatch in {}: expected {:?}, got {:?}",
                layer, what, expected, actual
            ),
            Error::NumericRange {
                layer,
                neuron,
                source,
            } => write!(f, "{}: neuron {}: {}", layer, neuron, source),
            Error::Uninitialized { layer, what } => {
                write!(f, "{}: {} is not initialized", layer, what)
            }
            Error::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Error::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Error::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NumericRange { source, .. } => Some(source),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}
