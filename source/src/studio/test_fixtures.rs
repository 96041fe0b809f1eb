//! Builders for small, valid studio files.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::binaries::{BinArray, BinOffset};

use super::{
    format::{MDL_IDENT, VVD_IDENT},
    mdl_headers::*,
    vtx::{
        StripGroupHeader, StripHeader, VTXBodyPartHeader, VTXFileHeader, VTXMeshHeader,
        VTXModelHeader, VTXModelLODHeader, VTXVertex,
    },
    vvd::{ModelVertex, VertexFileHeader},
};

#[derive(Default)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Append, returning where the value was written.
    pub fn push<T: Pod>(&mut self, value: &T) -> usize {
        let at = self.data.len();
        self.data.extend_from_slice(bytemuck::bytes_of(value));
        at
    }

    pub fn push_str(&mut self, s: &str) -> usize {
        let at = self.data.len();
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        at
    }

    pub fn patch<T: Pod>(&mut self, offset: usize, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read<T: Pod>(&self, offset: usize) -> T {
        bytemuck::pod_read_unaligned(&self.data[offset..offset + size_of::<T>()])
    }

    /// Edit the mdl header at the start of the blob.
    pub fn update_header(&mut self, f: impl FnOnce(&mut MDLHeader)) {
        let mut header: MDLHeader = self.read(0);
        f(&mut header);
        self.patch(0, &header);
    }
}

pub fn mdl_header(checksum: i32) -> MDLHeader {
    let mut header = MDLHeader::zeroed();
    header.id = MDL_IDENT;
    header.version = 48;
    header.checksum = checksum;
    header.name[..5].copy_from_slice(b"crate");
    header
}

pub fn vvd_header(checksum: i32, lod_counts: &[i32]) -> VertexFileHeader {
    let mut header = VertexFileHeader::zeroed();
    header.id = VVD_IDENT;
    header.version = 4;
    header.checksum = checksum;
    header.num_lods = lod_counts.len() as i32;
    let mut counts = [0; 8];
    counts[..lod_counts.len()].copy_from_slice(lod_counts);
    header.num_lod_vertexes = counts;
    header.fixup_table_start = BinOffset::new(size_of::<VertexFileHeader>() as i32);
    header.vertex_data_start = BinOffset::new(size_of::<VertexFileHeader>() as i32);
    header
}

pub struct FixtureTrack {
    pub bone: u8,
    pub flags: u8,
    /// Payload following the track header
    pub data: Vec<u8>,
}

pub struct FixtureAnimation {
    pub flags: i32,
    pub num_frames: i32,
    pub tracks: Vec<FixtureTrack>,
}

/// One body part, one submodel and one mesh, drawn as a single triangle list.
pub struct ModelFixture {
    pub checksum: i32,
    pub bones: Vec<MDLBone>,
    pub vertices: Vec<ModelVertex>,
    /// Indices into the strip group vertices, which map one to one onto mesh vertices
    pub indices: Vec<u16>,
    pub material: i32,
    pub vertex_offset: i32,
    pub strip_flags: u8,
    pub animation: Option<FixtureAnimation>,
}

pub fn root_bone() -> MDLBone {
    let mut bone = MDLBone::zeroed();
    bone.parent = -1;
    bone.quat = [0.0, 0.0, 0.0, 1.0];
    bone.q_alignment = [0.0, 0.0, 0.0, 1.0];
    bone.pose_to_bone = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ];
    bone
}

pub fn weighted_vertex(pos: Vec3, bone: u8) -> ModelVertex {
    ModelVertex {
        bone_weight: Vec3::new(1.0, 0.0, 0.0),
        bone_id: [bone, 0, 0],
        num_bones: 1,
        pos,
        norm: Vec3::Z,
        uv: Vec2::new(pos.x, pos.y),
    }
}

impl ModelFixture {
    pub fn triangle() -> Self {
        Self {
            checksum: 0x1234,
            bones: vec![root_bone()],
            vertices: vec![
                weighted_vertex(Vec3::new(0.0, 0.0, 0.0), 0),
                weighted_vertex(Vec3::new(1.0, 0.0, 0.0), 0),
                weighted_vertex(Vec3::new(0.0, 1.0, 0.0), 0),
            ],
            indices: vec![0, 1, 2],
            material: 0,
            vertex_offset: 0,
            strip_flags: 0x01,
            animation: None,
        }
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.vertices.iter().map(|v| v.pos).collect()
    }

    pub fn mdl(&self) -> Vec<u8> {
        let mut blob = Blob::new();
        let mut header = mdl_header(self.checksum);
        header.root_lod = 0;
        blob.push(&header);

        let bones_at = blob.len();
        for bone in &self.bones {
            blob.push(bone);
        }
        for i in 0..self.bones.len() {
            let at = bones_at + i * size_of::<MDLBone>();
            let name = blob.push_str(&format!("bone{i}"));
            let mut bone: MDLBone = blob.read(at);
            bone.name_offset = BinOffset::new((name - at) as i32);
            blob.patch(at, &bone);
        }
        header.bones = BinArray::new(self.bones.len() as i32, bones_at as i32);

        let part_at = blob.push(&MDLBodyPart::zeroed());
        let submodel_at = blob.push(&MDLSubmodel::zeroed());
        let mesh_at = blob.push(&MDLMesh::zeroed());
        let part_name = blob.push_str("body");

        blob.patch(
            part_at,
            &MDLBodyPart {
                name_offset: BinOffset::new((part_name - part_at) as i32),
                num_submodels: 1,
                base: 1,
                submodel_offset: BinOffset::new((submodel_at - part_at) as i32),
            },
        );
        let mut submodel = MDLSubmodel::zeroed();
        submodel.meshes = BinArray::new(1, (mesh_at - submodel_at) as i32);
        submodel.num_vertices = self.vertices.len() as i32;
        blob.patch(submodel_at, &submodel);
        let mut mesh = MDLMesh::zeroed();
        mesh.material = self.material;
        mesh.num_vertices = self.vertices.len() as i32;
        mesh.vertex_offset = self.vertex_offset;
        mesh.submodel_index = submodel_at as i32 - mesh_at as i32;
        blob.patch(mesh_at, &mesh);
        header.body_parts = BinArray::new(1, part_at as i32);

        // one texture, one skin family
        let texture_at = blob.push(&MDLTexture::zeroed());
        let dir_table = blob.push(&BinOffset::zeroed());
        let skin_at = blob.push(&0i16);
        let dir = blob.push_str("models/");
        let texture_name = blob.push_str("crate");
        let mut texture = MDLTexture::zeroed();
        texture.name_offset = BinOffset::new((texture_name - texture_at) as i32);
        blob.patch(texture_at, &texture);
        blob.patch(dir_table, &BinOffset::new(dir as i32));
        header.textures = BinArray::new(1, texture_at as i32);
        header.cd_textures = BinArray::new(1, dir_table as i32);
        header.num_skin_refs = 1;
        header.num_skin_families = 1;
        header.skin_index = skin_at as i32;

        if let Some(animation) = &self.animation {
            let desc_at = blob.push(&MDLAnimDesc::zeroed());
            let first = blob.len();
            for (i, track) in animation.tracks.iter().enumerate() {
                let last = i + 1 == animation.tracks.len();
                let next = size_of::<MDLAnimation>() + track.data.len();
                blob.push(&MDLAnimation {
                    bone: track.bone,
                    flags: track.flags,
                    next_offset: if last { 0 } else { next as i16 },
                });
                blob.data.extend_from_slice(&track.data);
            }
            let mut desc = MDLAnimDesc::zeroed();
            desc.flags = animation.flags;
            desc.num_frames = animation.num_frames;
            desc.fps = 30.0;
            desc.anim_index = (first - desc_at) as i32;
            blob.patch(desc_at, &desc);
            header.local_anims = BinArray::new(1, desc_at as i32);
        }

        header.data_length = blob.len() as i32;
        blob.patch(0, &header);
        blob.data
    }

    pub fn vvd(&self) -> Vec<u8> {
        let mut blob = Blob::new();
        let mut header = vvd_header(self.checksum, &[self.vertices.len() as i32]);
        blob.push(&header);
        header.vertex_data_start = BinOffset::new(blob.len() as i32);
        for v in &self.vertices {
            blob.push(v);
        }
        header.tangent_data_start = BinOffset::new(blob.len() as i32);
        for _ in &self.vertices {
            blob.push(&[1.0f32, 0.0, 0.0, 1.0]);
        }
        blob.patch(0, &header);
        blob.data
    }

    pub fn vtx(&self) -> Vec<u8> {
        let mut blob = Blob::new();
        let mut header = VTXFileHeader::zeroed();
        header.version = 7;
        header.checksum = self.checksum;
        header.num_lods = 1;
        header.max_bones_per_vert = 3;
        blob.push(&header);

        let part_at = blob.push(&VTXBodyPartHeader::zeroed());
        let model_at = blob.push(&VTXModelHeader::zeroed());
        let lod_at = blob.push(&VTXModelLODHeader::zeroed());
        let mesh_at = blob.push(&VTXMeshHeader::zeroed());
        let group_at = blob.push(&StripGroupHeader::zeroed());
        let verts_at = blob.len();
        for i in 0..self.vertices.len() {
            blob.push(&VTXVertex {
                bone_weight_index: [0, 1, 2],
                num_bones: 1,
                orig_mesh_vert_id: i as u16,
                bone_id: [0, 0, 0],
            });
        }
        let indices_at = blob.len();
        for i in &self.indices {
            blob.push(i);
        }
        let strip_at = blob.push(&StripHeader {
            num_indices: self.indices.len() as i32,
            index_offset: 0,
            num_verts: self.vertices.len() as i32,
            vert_offset: 0,
            num_bones: 1,
            flags: self.strip_flags,
            num_bone_state_changes: 0,
            bone_state_change_offset: 0,
        });

        let rel = |to: usize, from: usize| (to - from) as i32;
        header.body_parts = BinArray::new(1, part_at as i32);
        blob.patch(
            part_at,
            &VTXBodyPartHeader {
                models: BinArray::new(1, rel(model_at, part_at)),
            },
        );
        blob.patch(
            model_at,
            &VTXModelHeader {
                lods: BinArray::new(1, rel(lod_at, model_at)),
            },
        );
        blob.patch(
            lod_at,
            &VTXModelLODHeader {
                meshes: BinArray::new(1, rel(mesh_at, lod_at)),
                switch_point: 0.0,
            },
        );
        blob.patch(
            mesh_at,
            &VTXMeshHeader {
                strip_groups: BinArray::new(1, rel(group_at, mesh_at)),
                flags: 0,
            },
        );
        blob.patch(
            group_at,
            &StripGroupHeader {
                verts: BinArray::new(self.vertices.len() as i32, rel(verts_at, group_at)),
                indices: BinArray::new(self.indices.len() as i32, rel(indices_at, group_at)),
                strips: BinArray::new(1, rel(strip_at, group_at)),
                flags: 0,
            },
        );
        blob.patch(0, &header);
        blob.data
    }
}
