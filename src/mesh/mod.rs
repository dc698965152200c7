//! Mesh and data model shared by the query interface and the actions.
//!
//! A [`Mesh`] owns its vertices, edges, triangles, per-vertex [`Data`] fields
//! and named [`Group`]s. It is created and mutated by the collaborators that
//! sit outside this crate (mapping, communication, partitioning); this crate
//! only reads geometry through [`crate::handle`] and transforms data through
//! [`crate::action`].

pub mod data;
pub mod element;
pub mod group;
pub mod vertex;

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;

pub use data::{Data, DataId};
pub use element::{Edge, Triangle};
pub use group::{Group, GroupRef};
pub use vertex::{Coords, Vertex, VertexId};

/// A mesh shared between the coupling loop and the actions that transform it.
///
/// Each rank drives its coupling loop from a single thread, so `Rc<RefCell<_>>`
/// is enough; actions take an exclusive borrow only while they run.
pub type SharedMesh = Rc<RefCell<Mesh>>;

/// Geometry plus per-vertex data of one coupling interface.
#[derive(Clone, Debug)]
pub struct Mesh {
    name: String,
    dimensions: usize,
    vertices: Vec<Vertex>,
    /// Position of each live vertex in `vertices`.
    slots: HashMap<VertexId, usize>,
    next_vertex_id: u32,
    edges: Vec<Edge>,
    triangles: Vec<Triangle>,
    data: Vec<Data>,
    groups: Vec<Group>,
}

/// Split borrow of a mesh as seen by an action: geometry read-only, the
/// source field read-only, the target field writable.
#[derive(Debug)]
pub struct ActionFields<'m> {
    pub vertices: &'m [Vertex],
    pub source: Option<&'m Data>,
    pub target: Option<&'m mut Data>,
}

impl Mesh {
    /// Creates an empty mesh of spatial dimension 2 or 3.
    pub fn new(name: impl Into<String>, dimensions: usize) -> Result<Self, MeshError> {
        if !(2..=3).contains(&dimensions) {
            return Err(MeshError::InvalidDimensions(dimensions));
        }
        Ok(Mesh {
            name: name.into(),
            dimensions,
            vertices: Vec::new(),
            slots: HashMap::new(),
            next_vertex_id: 0,
            edges: Vec::new(),
            triangles: Vec::new(),
            data: Vec::new(),
            groups: Vec::new(),
        })
    }

    /// Wraps the mesh for sharing with actions.
    pub fn into_shared(self) -> SharedMesh {
        Rc::new(RefCell::new(self))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    // ---------------------------------------------------------------------
    // Vertices
    // ---------------------------------------------------------------------

    /// Adds a vertex and returns its freshly assigned id.
    ///
    /// Data fields that are already allocated grow by one zero-filled row.
    pub fn create_vertex(&mut self, coords: &[f64]) -> Result<VertexId, MeshError> {
        let coords = self.checked_coords(coords)?;
        let id = VertexId::new(self.next_vertex_id);
        self.next_vertex_id += 1;
        self.slots.insert(id, self.vertices.len());
        self.vertices.push(Vertex::new(id, coords));
        let n = self.vertices.len();
        for data in self.data.iter_mut().filter(|d| d.is_allocated()) {
            data.resize(n);
        }
        Ok(id)
    }

    /// Moves an existing vertex. Not a structural change: ids, groups and
    /// data layout stay as they are.
    pub fn set_vertex_coords(&mut self, id: VertexId, coords: &[f64]) -> Result<(), MeshError> {
        let coords = self.checked_coords(coords)?;
        let slot = self.vertex_slot(id).ok_or(MeshError::UnknownVertex(id))?;
        self.vertices[slot].set_coords(coords);
        Ok(())
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.slots.get(&id).map(|&slot| &self.vertices[slot])
    }

    /// Position of vertex `id` in mesh order, which is also its row in every
    /// data buffer.
    #[inline]
    pub fn vertex_slot(&self, id: VertexId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// All vertices in creation order.
    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Removes a vertex together with its incident edges and triangles.
    ///
    /// This is a structural mutation: data buffers are compacted, groups are
    /// refiltered, and every outstanding iterator position becomes
    /// meaningless. The removed id is never handed out again.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<(), MeshError> {
        let slot = self.slots.remove(&id).ok_or(MeshError::UnknownVertex(id))?;
        self.vertices.remove(slot);
        for v in &self.vertices[slot..] {
            if let Some(s) = self.slots.get_mut(&v.id()) {
                *s -= 1;
            }
        }
        self.edges.retain(|e| !e.contains(id));
        self.triangles.retain(|t| !t.contains(id));
        for data in &mut self.data {
            data.remove_slot(slot);
        }
        let live: HashSet<VertexId> = self.slots.keys().copied().collect();
        for group in &mut self.groups {
            group.refilter(&live, &self.edges, &self.triangles);
        }
        crate::debug_invariants!(
            self.validate_invariants(),
            "mesh `{}` after removing {}",
            self.name,
            id
        );
        Ok(())
    }

    fn checked_coords(&self, coords: &[f64]) -> Result<Coords, MeshError> {
        if coords.len() != self.dimensions {
            return Err(MeshError::CoordinateLength {
                expected: self.dimensions,
                found: coords.len(),
            });
        }
        Coords::from_slice(coords).ok_or(MeshError::CoordinateLength {
            expected: self.dimensions,
            found: coords.len(),
        })
    }

    // ---------------------------------------------------------------------
    // Edges and triangles
    // ---------------------------------------------------------------------

    /// Adds an edge between two existing, distinct vertices.
    pub fn create_edge(&mut self, a: VertexId, b: VertexId) -> Result<usize, MeshError> {
        self.check_corners(&[a, b])?;
        let edge = Edge::new(a, b);
        let pos = self.edges.len();
        self.edges.push(edge);
        for group in &mut self.groups {
            group.offer_edge(pos, &edge);
        }
        Ok(pos)
    }

    /// Adds a triangle over three existing, distinct vertices.
    pub fn create_triangle(
        &mut self,
        a: VertexId,
        b: VertexId,
        c: VertexId,
    ) -> Result<usize, MeshError> {
        self.check_corners(&[a, b, c])?;
        let triangle = Triangle::new(a, b, c);
        let pos = self.triangles.len();
        self.triangles.push(triangle);
        for group in &mut self.groups {
            group.offer_triangle(pos, &triangle);
        }
        Ok(pos)
    }

    fn check_corners(&self, corners: &[VertexId]) -> Result<(), MeshError> {
        for (i, &v) in corners.iter().enumerate() {
            if !self.slots.contains_key(&v) {
                return Err(MeshError::UnknownVertex(v));
            }
            if corners[..i].contains(&v) {
                return Err(MeshError::DegenerateElement(v));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    // ---------------------------------------------------------------------
    // Data
    // ---------------------------------------------------------------------

    /// Declares a new data field; call [`Mesh::allocate_data_values`] to size it.
    pub fn create_data(
        &mut self,
        name: impl Into<String>,
        dimensions: usize,
    ) -> Result<DataId, MeshError> {
        let name = name.into();
        if dimensions == 0 {
            return Err(MeshError::ZeroDataDimensions(name));
        }
        if self.data.iter().any(|d| d.name() == name) {
            return Err(MeshError::DuplicateName {
                mesh: self.name.clone(),
                name,
            });
        }
        let id = DataId::new(self.data.len());
        self.data.push(Data::new(id, name, dimensions));
        Ok(id)
    }

    /// Sizes every data buffer to the current vertex count, zero-filling new
    /// entries and keeping existing ones.
    pub fn allocate_data_values(&mut self) {
        let n = self.vertices.len();
        for data in &mut self.data {
            data.resize(n);
        }
        crate::debug_invariants!(
            self.validate_invariants(),
            "mesh `{}` after data allocation",
            self.name
        );
    }

    pub fn data(&self, id: DataId) -> Result<&Data, MeshError> {
        self.data.get(id.get()).ok_or(MeshError::UnknownData(id))
    }

    pub fn data_mut(&mut self, id: DataId) -> Result<&mut Data, MeshError> {
        self.data.get_mut(id.get()).ok_or(MeshError::UnknownData(id))
    }

    /// Looks up a data field by name.
    pub fn data_id(&self, name: &str) -> Result<DataId, MeshError> {
        self.data
            .iter()
            .find(|d| d.name() == name)
            .map(Data::id)
            .ok_or_else(|| MeshError::UnknownDataName {
                mesh: self.name.clone(),
                name: name.to_string(),
            })
    }

    #[inline]
    pub fn data_fields(&self) -> &[Data] {
        &self.data
    }

    /// Borrows geometry, source and target at once for an action.
    ///
    /// Both fields must belong to this mesh and cover every vertex. A field
    /// cannot be source and target of the same action.
    pub fn action_fields(
        &mut self,
        source: Option<DataId>,
        target: Option<DataId>,
    ) -> Result<ActionFields<'_>, MeshError> {
        for id in source.iter().chain(target.iter()) {
            let data = self.data(*id)?;
            let expected = self.vertices.len() * data.dimensions();
            if data.values().len() != expected {
                return Err(MeshError::DataLength {
                    name: data.name().to_string(),
                    expected,
                    found: data.values().len(),
                });
            }
        }
        if let (Some(s), Some(t)) = (source, target) {
            if s == t {
                return Err(MeshError::AliasedData(s));
            }
        }

        let mut source_ref = None;
        let mut target_ref = None;
        for data in self.data.iter_mut() {
            if Some(data.id()) == target {
                target_ref = Some(data);
            } else if Some(data.id()) == source {
                source_ref = Some(&*data);
            }
        }
        Ok(ActionFields {
            vertices: &self.vertices,
            source: source_ref,
            target: target_ref,
        })
    }

    // ---------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------

    /// Declares a named group over the given vertices.
    ///
    /// Edges and triangles whose corners are all selected join the group,
    /// including ones created later. Duplicate ids keep their first position.
    pub fn create_group<I>(&mut self, name: impl Into<String>, vertices: I) -> Result<(), MeshError>
    where
        I: IntoIterator<Item = VertexId>,
    {
        let name = name.into();
        if name == self.name || self.groups.iter().any(|g| g.name() == name) {
            return Err(MeshError::DuplicateName {
                mesh: self.name.clone(),
                name,
            });
        }
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for v in vertices {
            if !self.slots.contains_key(&v) {
                return Err(MeshError::UnknownVertex(v));
            }
            if seen.insert(v) {
                selected.push(v);
            }
        }
        let mut group = Group::new(name, selected);
        let live: HashSet<VertexId> = self.slots.keys().copied().collect();
        group.refilter(&live, &self.edges, &self.triangles);
        self.groups.push(group);
        self.debug_assert_invariants();
        Ok(())
    }

    /// The whole mesh viewed as a group.
    #[inline]
    pub fn as_group(&self) -> GroupRef<'_> {
        GroupRef::whole(self)
    }

    /// A named group, or the whole mesh when `name` is the mesh name.
    pub fn group(&self, name: &str) -> Result<GroupRef<'_>, MeshError> {
        if name == self.name {
            return Ok(self.as_group());
        }
        self.groups
            .iter()
            .find(|g| g.name() == name)
            .map(|g| GroupRef::subset(self, g))
            .ok_or_else(|| MeshError::UnknownGroup {
                mesh: self.name.clone(),
                name: name.to_string(),
            })
    }

    #[inline]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

impl DebugInvariants for Mesh {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        // 1) ids unique, slot map in sync, ids below the allocation counter
        let mut seen = HashSet::with_capacity(self.vertices.len());
        for (slot, v) in self.vertices.iter().enumerate() {
            if !seen.insert(v.id()) {
                return Err(MeshError::DuplicateVertex(v.id()));
            }
            if self.slots.get(&v.id()) != Some(&slot) || v.id().get() >= self.next_vertex_id {
                return Err(MeshError::StaleVertexIndex(v.id()));
            }
        }
        if self.slots.len() != self.vertices.len() {
            let stale = self.slots.keys().copied().find(|id| !seen.contains(id));
            if let Some(id) = stale {
                return Err(MeshError::StaleVertexIndex(id));
            }
        }

        // 2) elements reference live vertices
        let corners = self
            .edges
            .iter()
            .flat_map(|e| e.vertices().iter())
            .chain(self.triangles.iter().flat_map(|t| t.vertices().iter()));
        for &v in corners {
            if !seen.contains(&v) {
                return Err(MeshError::UnknownVertex(v));
            }
        }

        // 3) allocated buffers cover every vertex, others are empty
        for data in &self.data {
            let expected = if data.is_allocated() {
                self.vertices.len() * data.dimensions()
            } else {
                0
            };
            let found = data.values().len();
            if found != expected {
                return Err(MeshError::DataLength {
                    name: data.name().to_string(),
                    expected,
                    found,
                });
            }
        }

        // 4) group members are live vertices
        for group in &self.groups {
            if let Some(&v) = group.vertex_ids().iter().find(|v| !seen.contains(*v)) {
                return Err(MeshError::UnknownVertex(v));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Mesh {
        let mut mesh = Mesh::new("Square", 2).unwrap();
        for c in [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]] {
            mesh.create_vertex(&c).unwrap();
        }
        mesh
    }

    fn vid(raw: u32) -> VertexId {
        VertexId::new(raw)
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert_eq!(Mesh::new("M", 1).unwrap_err(), MeshError::InvalidDimensions(1));
        assert_eq!(Mesh::new("M", 4).unwrap_err(), MeshError::InvalidDimensions(4));
    }

    #[test]
    fn ids_are_sequential_from_zero() {
        let mesh = unit_square();
        let ids: Vec<u32> = mesh.vertices().iter().map(|v| v.id().get()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        mesh.validate_invariants().unwrap();
    }

    #[test]
    fn coordinate_length_checked() {
        let mut mesh = unit_square();
        let err = mesh.create_vertex(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            MeshError::CoordinateLength {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn degenerate_and_dangling_elements_rejected() {
        let mut mesh = unit_square();
        assert_eq!(
            mesh.create_edge(vid(0), vid(0)).unwrap_err(),
            MeshError::DegenerateElement(vid(0))
        );
        assert_eq!(
            mesh.create_triangle(vid(0), vid(1), vid(9)).unwrap_err(),
            MeshError::UnknownVertex(vid(9))
        );
    }

    #[test]
    fn removed_ids_are_never_reused() {
        let mut mesh = unit_square();
        mesh.remove_vertex(vid(3)).unwrap();
        let fresh = mesh.create_vertex(&[2.0, 2.0]).unwrap();
        assert_eq!(fresh, vid(4));
        assert!(mesh.vertex(vid(3)).is_none());
        mesh.validate_invariants().unwrap();
    }

    #[test]
    fn remove_vertex_compacts_data_and_elements() {
        let mut mesh = unit_square();
        mesh.create_edge(vid(0), vid(1)).unwrap();
        mesh.create_edge(vid(1), vid(2)).unwrap();
        let d = mesh.create_data("Temperature", 1).unwrap();
        mesh.allocate_data_values();
        mesh.data_mut(d).unwrap().values_mut().copy_from_slice(&[10.0, 11.0, 12.0, 13.0]);

        mesh.remove_vertex(vid(1)).unwrap();

        assert_eq!(mesh.data(d).unwrap().values(), &[10.0, 12.0, 13.0]);
        assert!(mesh.edges().is_empty());
        assert_eq!(mesh.vertex_slot(vid(2)), Some(1));
    }

    #[test]
    fn growing_an_allocated_mesh_extends_its_data() {
        let mut mesh = Mesh::new("Growing", 2).unwrap();
        mesh.create_vertex(&[0.0, 0.0]).unwrap();
        let t = mesh.create_data("T", 1).unwrap();
        let v = mesh.create_data("V", 2).unwrap();
        mesh.allocate_data_values();
        mesh.data_mut(t).unwrap().values_mut()[0] = 4.0;
        let late = mesh.create_data("Late", 1).unwrap();

        let b = mesh.create_vertex(&[1.0, 0.0]).unwrap();
        let c = mesh.create_vertex(&[2.0, 0.0]).unwrap();
        assert_eq!(mesh.data(t).unwrap().values(), &[4.0, 0.0, 0.0]);
        assert_eq!(mesh.data(v).unwrap().values().len(), 6);
        assert!(mesh.data(late).unwrap().values().is_empty());
        assert_eq!(mesh.validate_invariants(), Ok(()));

        mesh.create_group("Tail", [b, c]).unwrap();
        mesh.data_mut(t).unwrap().values_mut()[2] = 7.0;
        mesh.remove_vertex(b).unwrap();
        assert_eq!(mesh.data(t).unwrap().values(), &[4.0, 7.0]);
        assert_eq!(mesh.data(v).unwrap().values().len(), 4);
    }

    #[test]
    fn data_allocated_on_an_empty_mesh_follows_later_vertices() {
        let mut mesh = Mesh::new("Empty", 3).unwrap();
        let t = mesh.create_data("T", 1).unwrap();
        mesh.allocate_data_values();
        mesh.create_vertex(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(mesh.data(t).unwrap().values(), &[0.0]);
        mesh.action_fields(None, Some(t)).unwrap();
    }

    #[test]
    fn group_filters_elements_and_follows_new_ones() {
        let mut mesh = unit_square();
        mesh.create_edge(vid(0), vid(1)).unwrap();
        mesh.create_edge(vid(2), vid(3)).unwrap();
        mesh.create_group("Bottom", [vid(0), vid(1)]).unwrap();
        mesh.create_triangle(vid(0), vid(1), vid(2)).unwrap();

        let g = mesh.group("Bottom").unwrap();
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.triangle_count(), 0);
        assert_eq!(g.edge_at(0).unwrap().vertices(), &[vid(0), vid(1)]);
    }

    #[test]
    fn group_names_are_unique() {
        let mut mesh = unit_square();
        mesh.create_group("Inlet", [vid(0)]).unwrap();
        assert!(matches!(
            mesh.create_group("Inlet", [vid(1)]),
            Err(MeshError::DuplicateName { .. })
        ));
        assert!(matches!(
            mesh.group("Outlet"),
            Err(MeshError::UnknownGroup { .. })
        ));
        assert!(mesh.group("Square").unwrap().is_whole_mesh());
    }

    #[test]
    fn action_fields_split_borrow() {
        let mut mesh = unit_square();
        let s = mesh.create_data("S", 1).unwrap();
        let t = mesh.create_data("T", 1).unwrap();
        mesh.allocate_data_values();
        mesh.data_mut(s).unwrap().values_mut().fill(2.0);

        let fields = mesh.action_fields(Some(s), Some(t)).unwrap();
        let source = fields.source.unwrap();
        let target = fields.target.unwrap();
        target.values_mut().copy_from_slice(source.values());
        assert_eq!(fields.vertices.len(), 4);
        assert_eq!(mesh.data(t).unwrap().values(), &[2.0; 4]);
    }

    #[test]
    fn action_fields_reject_aliasing_and_unallocated_data() {
        let mut mesh = unit_square();
        let s = mesh.create_data("S", 1).unwrap();
        assert!(matches!(
            mesh.action_fields(Some(s), None),
            Err(MeshError::DataLength { expected: 4, found: 0, .. })
        ));
        mesh.allocate_data_values();
        assert_eq!(
            mesh.action_fields(Some(s), Some(s)).unwrap_err(),
            MeshError::AliasedData(s)
        );
    }
}
