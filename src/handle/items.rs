//! Value snapshots yielded by the query cursors.

use crate::handle::cursor::Element;
use crate::mesh::{Coords, GroupRef, VertexId};

/// Snapshot of one vertex: id and a copy of its coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertexItem {
    id: VertexId,
    coords: Coords,
}

impl VertexItem {
    #[inline]
    pub fn vertex_id(&self) -> VertexId {
        self.id
    }

    /// Copy of the vertex coordinates at the time the snapshot was taken.
    #[inline]
    pub fn vertex_coords(&self) -> Coords {
        self.coords
    }
}

impl Element for VertexItem {
    #[inline]
    fn count(group: &GroupRef<'_>) -> usize {
        group.vertex_count()
    }

    #[inline]
    fn fetch(group: &GroupRef<'_>, pos: usize) -> Option<Self> {
        group.vertex_at(pos).map(|v| VertexItem {
            id: v.id(),
            coords: *v.coords(),
        })
    }
}

/// Snapshot of an element with `N` corners: ids and coordinates per corner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Corners<const N: usize> {
    ids: [VertexId; N],
    coords: [Coords; N],
}

/// Snapshot of an edge.
pub type EdgeItem = Corners<2>;
/// Snapshot of a triangle.
pub type TriangleItem = Corners<3>;

impl<const N: usize> Corners<N> {
    /// Id of corner `corner`.
    ///
    /// # Panics
    /// Panics if `corner >= N`.
    #[inline]
    pub fn vertex_id(&self, corner: usize) -> VertexId {
        self.ids[corner]
    }

    /// Coordinates of corner `corner`.
    ///
    /// # Panics
    /// Panics if `corner >= N`.
    #[inline]
    pub fn vertex_coords(&self, corner: usize) -> Coords {
        self.coords[corner]
    }

    #[inline]
    pub fn vertex_ids(&self) -> &[VertexId; N] {
        &self.ids
    }

    fn resolve(group: &GroupRef<'_>, ids: [VertexId; N]) -> Option<Self> {
        let mesh = group.mesh();
        let first = *mesh.vertex(*ids.first()?)?.coords();
        let mut coords = [first; N];
        for (slot, id) in coords.iter_mut().zip(ids.iter()).skip(1) {
            *slot = *mesh.vertex(*id)?.coords();
        }
        Some(Corners { ids, coords })
    }
}

impl Corners<2> {
    /// Distance between the two corners.
    pub fn length(&self) -> f64 {
        self.coords[0].distance(&self.coords[1])
    }
}

impl Corners<3> {
    /// Area spanned by the three corners, in 2D or 3D.
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.coords.map(|c| c.padded());
        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let cross = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        0.5 * cross.iter().map(|x| x * x).sum::<f64>().sqrt()
    }
}

impl Element for Corners<2> {
    #[inline]
    fn count(group: &GroupRef<'_>) -> usize {
        group.edge_count()
    }

    fn fetch(group: &GroupRef<'_>, pos: usize) -> Option<Self> {
        let edge = group.edge_at(pos)?;
        Self::resolve(group, *edge.vertices())
    }
}

impl Element for Corners<3> {
    #[inline]
    fn count(group: &GroupRef<'_>) -> usize {
        group.triangle_count()
    }

    fn fetch(group: &GroupRef<'_>, pos: usize) -> Option<Self> {
        let triangle = group.triangle_at(pos)?;
        Self::resolve(group, *triangle.vertices())
    }
}
