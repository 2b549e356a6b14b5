use parking_lot::RwLock;

use crate::geometry::CoordinateTransform;

/// The committed stream → real mapping, swapped wholesale on each frame.
#[derive(Debug, Default)]
pub struct SharedTransform {
    inner: RwLock<CoordinateTransform>,
}

impl SharedTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transform.
    pub fn commit(&self, transform: CoordinateTransform) {
        *self.inner.write() = transform;
    }

    /// Copy out the current transform.
    pub fn snapshot(&self) -> CoordinateTransform {
        *self.inner.read()
    }

    /// Convenience: map a stream-space point with the current snapshot.
    pub fn to_real(&self, x: f64, y: f64) -> (i32, i32) {
        self.snapshot().to_real(x, y)
    }
}
