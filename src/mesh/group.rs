//! Groups: named selections of mesh entities.
//!
//! A [`Group`] is a filtered subset of one mesh's vertices, edges and
//! triangles. It is owned by its [`Mesh`] and always accessed through a
//! [`GroupRef`], a borrowed view that pairs the selection with the mesh
//! holding the geometry. The whole mesh is itself a group
//! ([`Mesh::as_group`]), so every query works the same way on full meshes and
//! sub-selections.

use hashbrown::HashSet;

use crate::mesh::{Edge, Mesh, Triangle, Vertex, VertexId};

/// Stored selection of a named group.
#[derive(Clone, Debug, Default)]
pub struct Group {
    name: String,
    /// Selected vertices, in selection order.
    vertices: Vec<VertexId>,
    members: HashSet<VertexId>,
    /// Positions in the mesh edge list of edges with both corners selected.
    edges: Vec<usize>,
    /// Positions in the mesh triangle list of triangles with all corners selected.
    triangles: Vec<usize>,
}

impl Group {
    pub(crate) fn new(name: String, vertices: Vec<VertexId>) -> Self {
        let members = vertices.iter().copied().collect();
        Group {
            name,
            vertices,
            members,
            edges: Vec::new(),
            triangles: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn vertex_ids(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.members.contains(&v)
    }

    /// Register a newly created edge if both corners are selected.
    pub(crate) fn offer_edge(&mut self, pos: usize, edge: &Edge) {
        if edge.vertices().iter().all(|v| self.members.contains(v)) {
            self.edges.push(pos);
        }
    }

    /// Register a newly created triangle if all corners are selected.
    pub(crate) fn offer_triangle(&mut self, pos: usize, triangle: &Triangle) {
        if triangle.vertices().iter().all(|v| self.members.contains(v)) {
            self.triangles.push(pos);
        }
    }

    /// Recompute the element selection from the vertex selection.
    ///
    /// Vertices no longer present in the mesh are dropped; element positions
    /// are rebuilt because structural mutation shifts them.
    pub(crate) fn refilter(
        &mut self,
        mesh_vertices: &HashSet<VertexId>,
        edges: &[Edge],
        triangles: &[Triangle],
    ) {
        self.vertices.retain(|v| mesh_vertices.contains(v));
        self.members = self.vertices.iter().copied().collect();
        let selected = &self.members;
        self.edges = edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.vertices().iter().all(|v| selected.contains(v)))
            .map(|(i, _)| i)
            .collect();
        self.triangles = triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.vertices().iter().all(|v| selected.contains(v)))
            .map(|(i, _)| i)
            .collect();
    }
}

/// Borrowed view of a group together with the mesh it belongs to.
///
/// The borrow ties every handle and iterator built from this view to the
/// lifetime of the mesh, so a handle can never outlive its group.
#[derive(Copy, Clone, Debug)]
pub struct GroupRef<'a> {
    mesh: &'a Mesh,
    subset: Option<&'a Group>,
}

impl<'a> GroupRef<'a> {
    pub(crate) fn whole(mesh: &'a Mesh) -> Self {
        GroupRef { mesh, subset: None }
    }

    pub(crate) fn subset(mesh: &'a Mesh, group: &'a Group) -> Self {
        GroupRef {
            mesh,
            subset: Some(group),
        }
    }

    /// Group name; the full-mesh group is named after its mesh.
    pub fn name(&self) -> &'a str {
        match self.subset {
            Some(g) => g.name(),
            None => self.mesh.name(),
        }
    }

    #[inline]
    pub fn mesh(&self) -> &'a Mesh {
        self.mesh
    }

    /// True when this view covers the whole mesh.
    #[inline]
    pub fn is_whole_mesh(&self) -> bool {
        self.subset.is_none()
    }

    pub fn vertex_count(&self) -> usize {
        match self.subset {
            Some(g) => g.vertices.len(),
            None => self.mesh.vertices().len(),
        }
    }

    pub fn edge_count(&self) -> usize {
        match self.subset {
            Some(g) => g.edges.len(),
            None => self.mesh.edges().len(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        match self.subset {
            Some(g) => g.triangles.len(),
            None => self.mesh.triangles().len(),
        }
    }

    /// Vertex at position `pos` in group order.
    pub fn vertex_at(&self, pos: usize) -> Option<&'a Vertex> {
        match self.subset {
            Some(g) => self.mesh.vertex(*g.vertices.get(pos)?),
            None => self.mesh.vertices().get(pos),
        }
    }

    /// Edge at position `pos` in group order.
    pub fn edge_at(&self, pos: usize) -> Option<&'a Edge> {
        match self.subset {
            Some(g) => self.mesh.edges().get(*g.edges.get(pos)?),
            None => self.mesh.edges().get(pos),
        }
    }

    /// Triangle at position `pos` in group order.
    pub fn triangle_at(&self, pos: usize) -> Option<&'a Triangle> {
        match self.subset {
            Some(g) => self.mesh.triangles().get(*g.triangles.get(pos)?),
            None => self.mesh.triangles().get(pos),
        }
    }

    /// True when `self` and `other` view the same group of the same mesh.
    pub fn same_group(&self, other: &GroupRef<'_>) -> bool {
        let same_subset = match (self.subset, other.subset) {
            (None, None) => true,
            (Some(a), Some(b)) => std::ptr::eq(a, b),
            _ => false,
        };
        same_subset && std::ptr::eq(self.mesh, other.mesh)
    }
}
