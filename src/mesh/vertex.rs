//! `VertexId` and `Vertex`: identity and geometry of mesh vertices
//!
//! Every vertex of a [`Mesh`](crate::mesh::Mesh) carries an integer id that is
//! unique within the mesh, handed out sequentially from zero and never reused
//! after the vertex is removed. All other entities (edges, triangles, groups,
//! handles) refer to vertices by id only.

use std::fmt;
use std::ops::Deref;

/// Identifier of a vertex within one mesh.
///
/// # Memory layout
/// This type is `repr(transparent)` over `u32`, so slices of ids can be
/// handed to foreign code exactly like `u32` arrays.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct VertexId(u32);

impl VertexId {
    /// Creates a `VertexId` from its raw integer value.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        VertexId(raw)
    }

    /// Returns the raw integer value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VertexId").field(&self.get()).finish()
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl From<VertexId> for u32 {
    fn from(id: VertexId) -> u32 {
        id.0
    }
}

/// Coordinates of one vertex, stored by value.
///
/// Holds two or three components depending on the mesh dimension and derefs
/// to `&[f64]` of exactly that length. Because it is `Copy`, values handed out
/// by the query interface never alias mesh storage.
#[derive(Copy, Clone, PartialEq)]
pub struct Coords {
    len: u8,
    values: [f64; 3],
}

impl Coords {
    /// Copies `values` into a coordinate vector.
    ///
    /// Returns `None` unless `values` has two or three components.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        if !(2..=3).contains(&values.len()) {
            return None;
        }
        let mut out = [0.0; 3];
        out[..values.len()].copy_from_slice(values);
        Some(Coords {
            len: values.len() as u8,
            values: out,
        })
    }

    /// Number of components (the mesh dimension).
    #[inline]
    pub fn dimensions(&self) -> usize {
        self.len as usize
    }

    /// Returns the components as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len as usize]
    }

    /// Components padded with zeros to three dimensions.
    #[inline]
    pub fn padded(&self) -> [f64; 3] {
        self.values
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Coords) -> f64 {
        self.iter()
            .zip(other.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl Deref for Coords {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        self.as_slice()
    }
}

impl fmt::Debug for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// A mesh vertex: id plus coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    id: VertexId,
    coords: Coords,
}

impl Vertex {
    pub(crate) fn new(id: VertexId, coords: Coords) -> Self {
        Vertex { id, coords }
    }

    #[inline]
    pub fn id(&self) -> VertexId {
        self.id
    }

    #[inline]
    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    pub(crate) fn set_coords(&mut self, coords: Coords) {
        self.coords = coords;
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::{assert_eq_align, assert_eq_size};

    // If this fails, our repr(transparent) guarantee is broken!
    assert_eq_size!(VertexId, u32);
    assert_eq_align!(VertexId, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display() {
        let id = VertexId::new(7);
        assert_eq!(format!("{:?}", id), "VertexId(7)");
        assert_eq!(format!("{}", id), "7");
    }

    #[test]
    fn ids_order_by_raw_value() {
        assert!(VertexId::new(1) < VertexId::new(2));
        assert_eq!(u32::from(VertexId::new(9)), 9);
    }

    #[test]
    fn coords_reject_wrong_dimension() {
        assert!(Coords::from_slice(&[1.0]).is_none());
        assert!(Coords::from_slice(&[1.0, 2.0, 3.0, 4.0]).is_none());
        let c = Coords::from_slice(&[1.0, 2.0]).unwrap();
        assert_eq!(c.dimensions(), 2);
        assert_eq!(&*c, &[1.0, 2.0]);
    }

    #[test]
    fn distance_in_plane() {
        let a = Coords::from_slice(&[0.0, 0.0]).unwrap();
        let b = Coords::from_slice(&[3.0, 4.0]).unwrap();
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn json_roundtrip() {
        let id = VertexId::new(123);
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, "123");
        let back: VertexId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }
}
