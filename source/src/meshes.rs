use glam::{Vec2, Vec3};

/// Skinned vertex as it leaves the reconstruction, ready for upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct StudioVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Axis aligned box around a set of points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

pub fn extend_bounds(bounds: &mut Option<Bounds>, p: Vec3) {
    match bounds {
        Some(b) => b.extend(p),
        None => *bounds = Some(Bounds::from_point(p)),
    }
}

/// Triangles sharing one material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialGroup {
    pub material: i32,
    pub vertices: Vec<StudioVertex>,
    pub indices: Vec<u32>,
    pub bounds: Option<Bounds>,
}

impl MaterialGroup {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Default)]
pub struct MeshBuilder {
    tris: Vec<u32>,
    verts: Vec<StudioVertex>,
    bounds: Option<Bounds>,
}

impl MeshBuilder {
    pub fn add_vert(&mut self, vertex: StudioVertex) -> u32 {
        extend_bounds(&mut self.bounds, vertex.position);
        self.verts.push(vertex);
        self.verts.len() as u32 - 1
    }

    pub fn add_tri(&mut self, tri: [u32; 3]) {
        self.tris.extend_from_slice(&tri);
    }

    pub fn add_index(&mut self, index: u32) {
        self.tris.push(index);
    }

    pub fn tris_to_lines(&self) -> Vec<u32> {
        let mut lines = Vec::with_capacity(self.tris.len() * 2);

        for tri in self.tris.chunks_exact(3) {
            lines.extend_from_slice(&[tri[0], tri[1], tri[1], tri[2], tri[2], tri[0]]);
        }

        lines
    }

    pub fn tris(&self) -> &[u32] {
        &self.tris
    }

    pub fn verts(&self) -> &[StudioVertex] {
        &self.verts
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn build(self, material: i32) -> MaterialGroup {
        MaterialGroup {
            material,
            vertices: self.verts,
            indices: self.tris,
            bounds: self.bounds,
        }
    }
}
