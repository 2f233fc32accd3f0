//! Host shape queries.

use std::sync::{Arc, Mutex};

use crate::types::Shape;

/// Synchronous query for the local instance's current shape.
pub trait ShapeSource {
    fn shape(&self) -> Shape;
}

impl<F> ShapeSource for F
where
    F: Fn() -> Shape,
{
    fn shape(&self) -> Shape {
        self()
    }
}

/// A shape that never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedShape(pub Shape);

impl ShapeSource for FixedShape {
    fn shape(&self) -> Shape {
        self.0
    }
}

/// A shape cell that can be changed from outside between ticks.
#[derive(Debug, Clone, Default)]
pub struct SharedShape(Arc<Mutex<Shape>>);

impl SharedShape {
    pub fn new(shape: Shape) -> Self {
        Self(Arc::new(Mutex::new(shape)))
    }

    pub fn set(&self, shape: Shape) {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = shape;
    }
}

impl ShapeSource for SharedShape {
    fn shape(&self) -> Shape {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
