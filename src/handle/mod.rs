//! Read-only query handles over the vertices, edges and triangles of a group.
//!
//! A [`MeshHandle`] bundles a [`VertexHandle`], an [`EdgeHandle`] and a
//! [`TriangleHandle`] for one [`GroupRef`]. Each handle offers `begin()`,
//! `end()` and `size()`; the cursors it hands out yield value snapshots
//! ([`VertexItem`], [`EdgeItem`], [`TriangleItem`]) rather than references
//! into mesh storage.
//!
//! ```rust
//! # use mesh_coupling::mesh::Mesh;
//! # use mesh_coupling::handle::MeshHandle;
//! let mut mesh = Mesh::new("Interface", 2).unwrap();
//! let a = mesh.create_vertex(&[0.0, 0.0]).unwrap();
//! let b = mesh.create_vertex(&[1.0, 0.0]).unwrap();
//! mesh.create_edge(a, b).unwrap();
//!
//! let handle = MeshHandle::new(mesh.as_group());
//! let ids: Vec<u32> = handle.vertices().iter().map(|v| v.vertex_id().get()).collect();
//! assert_eq!(ids, vec![0, 1]);
//! assert_eq!(handle.edges().size(), 1);
//! ```
//!
//! Handles borrow the mesh: structural mutation (removing vertices, adding
//! groups) is impossible while any handle or cursor is alive.

pub mod cursor;
pub mod items;

use std::fmt;

use crate::mesh::GroupRef;

pub use cursor::{Cursor, Element};
pub use items::{Corners, EdgeItem, TriangleItem, VertexItem};

/// Cursor over vertex snapshots.
pub type VertexIterator<'a> = Cursor<'a, VertexItem>;
/// Cursor over edge snapshots.
pub type EdgeIterator<'a> = Cursor<'a, EdgeItem>;
/// Cursor over triangle snapshots.
pub type TriangleIterator<'a> = Cursor<'a, TriangleItem>;

/// Read-only view over one element kind of a group.
///
/// Construction is O(1) and stores only the group reference.
pub struct Handle<'a, T: Element> {
    group: GroupRef<'a>,
    _kind: std::marker::PhantomData<T>,
}

/// Offers `begin()`/`end()` over the vertices of a group.
pub type VertexHandle<'a> = Handle<'a, VertexItem>;
/// Offers `begin()`/`end()` over the edges of a group.
pub type EdgeHandle<'a> = Handle<'a, EdgeItem>;
/// Offers `begin()`/`end()` over the triangles of a group.
pub type TriangleHandle<'a> = Handle<'a, TriangleItem>;

impl<'a, T: Element> Handle<'a, T> {
    #[inline]
    pub fn new(group: GroupRef<'a>) -> Self {
        Handle {
            group,
            _kind: std::marker::PhantomData,
        }
    }

    /// Cursor at the first element.
    #[inline]
    pub fn begin(&self) -> Cursor<'a, T> {
        Cursor::new(self.group, 0)
    }

    /// Cursor one past the last element.
    #[inline]
    pub fn end(&self) -> Cursor<'a, T> {
        Cursor::new(self.group, T::count(&self.group))
    }

    /// Number of elements, as bookkept by the group.
    #[inline]
    pub fn size(&self) -> usize {
        T::count(&self.group)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Same as [`Handle::begin`], for use with iterator adapters.
    #[inline]
    pub fn iter(&self) -> Cursor<'a, T> {
        self.begin()
    }

    #[inline]
    pub fn group(&self) -> GroupRef<'a> {
        self.group
    }
}

impl<T: Element> Clone for Handle<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Element> Copy for Handle<'_, T> {}

impl<T: Element> fmt::Debug for Handle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("group", &self.group.name())
            .field("size", &self.size())
            .finish()
    }
}

impl<'a, T: Element> IntoIterator for &Handle<'a, T> {
    type Item = T;
    type IntoIter = Cursor<'a, T>;

    fn into_iter(self) -> Cursor<'a, T> {
        self.begin()
    }
}

impl<'a, T: Element> IntoIterator for Handle<'a, T> {
    type Item = T;
    type IntoIter = Cursor<'a, T>;

    fn into_iter(self) -> Cursor<'a, T> {
        self.begin()
    }
}

/// Query access to the vertices, edges and triangles of one group.
///
/// This is what a solver receives to iterate interface geometry, for
/// visualization, boundary setup or custom mapping.
#[derive(Copy, Clone, Debug)]
pub struct MeshHandle<'a> {
    vertices: VertexHandle<'a>,
    edges: EdgeHandle<'a>,
    triangles: TriangleHandle<'a>,
}

impl<'a> MeshHandle<'a> {
    pub fn new(group: GroupRef<'a>) -> Self {
        MeshHandle {
            vertices: Handle::new(group),
            edges: Handle::new(group),
            triangles: Handle::new(group),
        }
    }

    #[inline]
    pub fn vertices(&self) -> &VertexHandle<'a> {
        &self.vertices
    }

    #[inline]
    pub fn edges(&self) -> &EdgeHandle<'a> {
        &self.edges
    }

    #[inline]
    pub fn triangles(&self) -> &TriangleHandle<'a> {
        &self.triangles
    }
}
