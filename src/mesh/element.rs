//! Edges and triangles: ordered tuples of vertex ids.

use crate::mesh::VertexId;

/// An ordered pair of vertex ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    vertices: [VertexId; 2],
}

impl Edge {
    pub(crate) fn new(a: VertexId, b: VertexId) -> Self {
        Edge { vertices: [a, b] }
    }

    /// Returns corner `i` (0 or 1), or `None` when out of range.
    #[inline]
    pub fn vertex(&self, i: usize) -> Option<VertexId> {
        self.vertices.get(i).copied()
    }

    #[inline]
    pub fn vertices(&self) -> &[VertexId; 2] {
        &self.vertices
    }

    pub(crate) fn contains(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }
}

/// An ordered triple of vertex ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Triangle {
    vertices: [VertexId; 3],
}

impl Triangle {
    pub(crate) fn new(a: VertexId, b: VertexId, c: VertexId) -> Self {
        Triangle {
            vertices: [a, b, c],
        }
    }

    /// Returns corner `i` (0, 1 or 2), or `None` when out of range.
    #[inline]
    pub fn vertex(&self, i: usize) -> Option<VertexId> {
        self.vertices.get(i).copied()
    }

    #[inline]
    pub fn vertices(&self) -> &[VertexId; 3] {
        &self.vertices
    }

    pub(crate) fn contains(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }
}
