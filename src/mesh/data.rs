//! Data: named per-vertex field storage.
//!
//! A `Data` couples a name and a component count with one contiguous `Vec<f64>`
//! holding `dimensions` values per mesh vertex, in mesh vertex order. The
//! buffer is contiguous so it can be handed to foreign code without copying.

use std::fmt;

/// Identifier of a data field within one mesh.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct DataId(usize);

impl DataId {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        DataId(raw)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage for one per-vertex field.
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
    id: DataId,
    name: String,
    /// Components per vertex: 1 for scalar data.
    dimensions: usize,
    /// `dimensions` values per vertex, vertex-major.
    values: Vec<f64>,
    /// Set by the first allocation; allocated buffers track the vertex count.
    allocated: bool,
}

impl Data {
    pub(crate) fn new(id: DataId, name: String, dimensions: usize) -> Self {
        Data {
            id,
            name,
            dimensions,
            values: Vec::new(),
            allocated: false,
        }
    }

    #[inline]
    pub fn id(&self) -> DataId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Entire read-only buffer.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Entire mutable buffer.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Values stored for the vertex at position `slot` in mesh order.
    ///
    /// Returns `None` if `slot` lies outside the allocated extent.
    pub fn vertex_values(&self, slot: usize) -> Option<&[f64]> {
        let start = slot.checked_mul(self.dimensions)?;
        self.values.get(start..start + self.dimensions)
    }

    /// Mutable view of the values for the vertex at position `slot`.
    pub fn vertex_values_mut(&mut self, slot: usize) -> Option<&mut [f64]> {
        let start = slot.checked_mul(self.dimensions)?;
        self.values.get_mut(start..start + self.dimensions)
    }

    /// Number of vertices the buffer currently covers.
    #[inline]
    pub fn vertex_extent(&self) -> usize {
        self.values.len() / self.dimensions
    }

    /// True once values have been allocated, even for an empty mesh.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Resize to cover `vertex_count` vertices, zero-filling new entries.
    pub(crate) fn resize(&mut self, vertex_count: usize) {
        self.values.resize(vertex_count * self.dimensions, 0.0);
        self.allocated = true;
    }

    /// Replaces the buffer with a copy of itself and leaks the old one.
    ///
    /// Used when foreign code kept a pointer into the buffer past the end of
    /// a call: the pointer stays valid, and later writes through it no longer
    /// reach this field.
    #[cfg(feature = "python")]
    pub(crate) fn detach_values(&mut self) {
        let copy = self.values.clone();
        std::mem::forget(std::mem::replace(&mut self.values, copy));
    }

    /// Drop the entries of the vertex at `slot`, keeping the buffer contiguous.
    pub(crate) fn remove_slot(&mut self, slot: usize) {
        let start = slot * self.dimensions;
        if start + self.dimensions <= self.values.len() {
            self.values.drain(start..start + self.dimensions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data() -> Data {
        let mut d = Data::new(DataId::new(0), "Forces".into(), 2);
        d.resize(3);
        d
    }

    #[test]
    fn resize_zero_fills() {
        let d = make_data();
        assert_eq!(d.values(), &[0.0; 6]);
        assert_eq!(d.vertex_extent(), 3);
    }

    #[test]
    fn vertex_values_window() {
        let mut d = make_data();
        d.vertex_values_mut(1).unwrap().copy_from_slice(&[1.5, 2.5]);
        assert_eq!(d.vertex_values(1), Some(&[1.5, 2.5][..]));
        assert_eq!(d.vertex_values(3), None);
    }

    #[test]
    fn remove_slot_compacts() {
        let mut d = make_data();
        d.values_mut().copy_from_slice(&[0.0, 0.1, 1.0, 1.1, 2.0, 2.1]);
        d.remove_slot(1);
        assert_eq!(d.values(), &[0.0, 0.1, 2.0, 2.1]);
    }

    #[test]
    fn allocation_survives_an_empty_extent() {
        let mut d = Data::new(DataId::new(0), "T".into(), 1);
        assert!(!d.is_allocated());
        d.resize(0);
        assert!(d.is_allocated());
        assert!(d.values().is_empty());
        d.resize(2);
        assert_eq!(d.vertex_extent(), 2);
    }

    #[cfg(feature = "python")]
    #[test]
    fn detached_values_keep_contents() {
        let mut d = make_data();
        d.values_mut()[4] = 9.0;
        let before = d.values().as_ptr();
        d.detach_values();
        assert_ne!(d.values().as_ptr(), before);
        assert_eq!(d.values(), &[0.0, 0.0, 0.0, 0.0, 9.0, 0.0]);
    }
}
