use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use mesh_coupling::handle::MeshHandle;
use mesh_coupling::mesh::{Mesh, VertexId};

/// Triangulated `n x n` grid of unit squares in the z = 0 plane.
fn build_grid(n: u32) -> Mesh {
    let mut mesh = Mesh::new("Grid", 3).expect("valid dimensions");
    for j in 0..=n {
        for i in 0..=n {
            mesh.create_vertex(&[f64::from(i), f64::from(j), 0.0])
                .expect("valid coordinates");
        }
    }
    let id = |i: u32, j: u32| VertexId::new(j * (n + 1) + i);
    for j in 0..n {
        for i in 0..n {
            mesh.create_triangle(id(i, j), id(i + 1, j), id(i + 1, j + 1))
                .expect("live vertices");
            mesh.create_triangle(id(i, j), id(i + 1, j + 1), id(i, j + 1))
                .expect("live vertices");
        }
    }
    mesh
}

fn bench_handle_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_iteration");

    for &n in &[32u32, 128u32] {
        let mut mesh = build_grid(n);
        let half: Vec<VertexId> = mesh
            .vertices()
            .iter()
            .filter(|v| v.coords()[0] <= f64::from(n) / 2.0)
            .map(|v| v.id())
            .collect();
        mesh.create_group("Left", half).expect("fresh group");

        group.bench_with_input(BenchmarkId::new("vertices_whole_mesh", n), &n, |b, _| {
            let handle = MeshHandle::new(mesh.as_group());
            b.iter(|| {
                let sum: f64 = handle.vertices().iter().map(|v| v.vertex_coords()[0]).sum();
                black_box(sum);
            });
        });

        group.bench_with_input(BenchmarkId::new("triangle_area_whole_mesh", n), &n, |b, _| {
            let handle = MeshHandle::new(mesh.as_group());
            b.iter(|| {
                let area: f64 = handle.triangles().iter().map(|t| t.area()).sum();
                black_box(area);
            });
        });

        group.bench_with_input(BenchmarkId::new("triangle_area_subset", n), &n, |b, _| {
            let left = mesh.group("Left").expect("group exists");
            let handle = MeshHandle::new(left);
            b.iter(|| {
                let area: f64 = handle.triangles().iter().map(|t| t.area()).sum();
                black_box(area);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_handle_iteration);
criterion_main!(benches);
