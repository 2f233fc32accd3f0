//! Shape sources available to a command-line host.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use ensemble_core::{Shape, ShapeSource};

use crate::error::{io_err, HostError};

/// Where the host reads its own shape from.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeSpec {
    Fixed(Shape),
    /// A JSON `Shape` file, re-read on every query.
    File(PathBuf),
}

#[derive(Debug)]
pub enum HostShape {
    Fixed(Shape),
    File {
        path: PathBuf,
        last: Cell<Shape>,
        /// Whether the last read succeeded; failures are logged on the transition only.
        readable: Cell<bool>,
    },
}

impl HostShape {
    /// Resolve a shape source; a shape file must be readable up front.
    pub fn open(source: ShapeSpec) -> Result<Self, HostError> {
        match source {
            ShapeSpec::Fixed(shape) => {
                let shape = check_finite(shape, || shape.to_string())?;
                Ok(Self::Fixed(shape))
            }
            ShapeSpec::File(path) => {
                let shape = read_shape_file(&path)?;
                Ok(Self::File {
                    path,
                    last: Cell::new(shape),
                    readable: Cell::new(true),
                })
            }
        }
    }
}

impl ShapeSource for HostShape {
    fn shape(&self) -> Shape {
        match self {
            Self::Fixed(shape) => *shape,
            Self::File {
                path,
                last,
                readable,
            } => match read_shape_file(path) {
                Ok(shape) => {
                    if !readable.replace(true) {
                        tracing::info!(path = %path.display(), "shape file readable again");
                    }
                    last.set(shape);
                    shape
                }
                Err(err) => {
                    // Editors replace files non-atomically; keep the last good shape.
                    if readable.replace(false) {
                        tracing::warn!(error = %err, "shape file unreadable; keeping last shape");
                    }
                    last.get()
                }
            },
        }
    }
}

pub fn read_shape_file(path: &Path) -> Result<Shape, HostError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let shape: Shape = serde_json::from_str(&contents).map_err(|source| HostError::ShapeFile {
        path: path.to_path_buf(),
        source,
    })?;
    check_finite(shape, || contents.trim().to_string())
}

/// Parse `x,y,width,height`.
pub fn parse_shape(raw: &str) -> Result<Shape, HostError> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| HostError::InvalidShape(raw.to_string()))?;
    match parts.as_slice() {
        [x, y, width, height] => {
            check_finite(Shape::new(*x, *y, *width, *height), || raw.to_string())
        }
        _ => Err(HostError::InvalidShape(raw.to_string())),
    }
}

/// NaN and infinities would be stored as JSON `null` and break every reader.
fn check_finite(shape: Shape, raw: impl FnOnce() -> String) -> Result<Shape, HostError> {
    if shape.is_finite() {
        Ok(shape)
    } else {
        Err(HostError::InvalidShape(raw()))
    }
}
