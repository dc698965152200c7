//! Scales target data by the mesh area associated with each vertex.
//!
//! In 2D every edge contributes half its length to each of its corners; in 3D
//! every triangle contributes a third of its area to each corner. Geometry is
//! read through the query handles, so the action sees exactly what a solver
//! iterating the same mesh would see.

use crate::action::{Action, ActionError, Timing, borrow_mesh};
use crate::handle::MeshHandle;
use crate::mesh::{DataId, Mesh, SharedMesh};

/// Direction of the area scaling.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaScaling {
    DividingByArea,
    MultiplyingByArea,
}

/// Multiplies or divides every vertex entry of the target by its area.
#[derive(Debug)]
pub struct ScaleByAreaAction {
    timing: Timing,
    mesh: SharedMesh,
    target: DataId,
    scaling: AreaScaling,
}

impl ScaleByAreaAction {
    pub fn new(timing: Timing, mesh: SharedMesh, target: DataId, scaling: AreaScaling) -> Self {
        ScaleByAreaAction {
            timing,
            mesh,
            target,
            scaling,
        }
    }
}

/// Area associated with each vertex, indexed by vertex slot.
pub fn vertex_areas(mesh: &Mesh) -> Vec<f64> {
    let mut areas = vec![0.0; mesh.vertices().len()];
    let handle = MeshHandle::new(mesh.as_group());
    let mut add = |id, share: f64| {
        if let Some(slot) = mesh.vertex_slot(id) {
            areas[slot] += share;
        }
    };
    if mesh.dimensions() == 2 {
        for edge in handle.edges() {
            let share = edge.length() / 2.0;
            for &id in edge.vertex_ids() {
                add(id, share);
            }
        }
    } else {
        for triangle in handle.triangles() {
            let share = triangle.area() / 3.0;
            for &id in triangle.vertex_ids() {
                add(id, share);
            }
        }
    }
    areas
}

impl Action for ScaleByAreaAction {
    fn timing(&self) -> Timing {
        self.timing
    }

    fn name(&self) -> &str {
        "scale-by-area"
    }

    fn mesh(&self) -> &SharedMesh {
        &self.mesh
    }

    fn perform_action(
        &mut self,
        _time: f64,
        _dt: f64,
        _computed_part_full_dt: f64,
        _full_dt: f64,
    ) -> Result<(), ActionError> {
        let mut mesh = borrow_mesh(&self.mesh)?;
        let areas = vertex_areas(&mesh);
        let fields = mesh.action_fields(None, Some(self.target))?;
        let Some(target) = fields.target else {
            return Ok(());
        };
        let dims = target.dimensions();
        let mut skipped = 0usize;
        for (values, &area) in target.values_mut().chunks_mut(dims).zip(&areas) {
            match self.scaling {
                AreaScaling::MultiplyingByArea => values.iter_mut().for_each(|v| *v *= area),
                AreaScaling::DividingByArea if area > 0.0 => {
                    values.iter_mut().for_each(|v| *v /= area)
                }
                AreaScaling::DividingByArea => skipped += 1,
            }
        }
        if skipped > 0 {
            log::warn!(
                "scale-by-area: {} vertices of `{}` have no adjacent area, left unscaled",
                skipped,
                target.name()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;

    fn vid(raw: u32) -> VertexId {
        VertexId::new(raw)
    }

    #[test]
    fn planar_edges_split_length() {
        let mut mesh = Mesh::new("Line", 2).unwrap();
        for c in [[0.0, 0.0], [2.0, 0.0], [2.0, 4.0], [9.0, 9.0]] {
            mesh.create_vertex(&c).unwrap();
        }
        mesh.create_edge(vid(0), vid(1)).unwrap();
        mesh.create_edge(vid(1), vid(2)).unwrap();
        assert_eq!(vertex_areas(&mesh), vec![1.0, 3.0, 2.0, 0.0]);
    }

    #[test]
    fn spatial_triangles_split_area() {
        let mut mesh = Mesh::new("Surface", 3).unwrap();
        for c in [[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [0.0, 2.0, 0.0]] {
            mesh.create_vertex(&c).unwrap();
        }
        mesh.create_triangle(vid(0), vid(1), vid(2)).unwrap();
        assert_eq!(vertex_areas(&mesh), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn divides_and_skips_isolated_vertices() {
        let mut mesh = Mesh::new("Line", 2).unwrap();
        for c in [[0.0, 0.0], [4.0, 0.0], [5.0, 5.0]] {
            mesh.create_vertex(&c).unwrap();
        }
        mesh.create_edge(vid(0), vid(1)).unwrap();
        let forces = mesh.create_data("Forces", 2).unwrap();
        mesh.allocate_data_values();
        mesh.data_mut(forces).unwrap().values_mut().fill(8.0);
        let mesh = mesh.into_shared();

        let mut action = ScaleByAreaAction::new(
            Timing::OnExchangePost,
            mesh.clone(),
            forces,
            AreaScaling::DividingByArea,
        );
        action.perform_action(0.0, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(
            mesh.borrow().data(forces).unwrap().values(),
            &[4.0, 4.0, 4.0, 4.0, 8.0, 8.0]
        );
    }
}
