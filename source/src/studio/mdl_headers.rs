// Layouts of the .mdl tables, as found in Valve's public/studio.h.
// Every index is relative to the start of the struct holding it unless noted.
//
// A Vec3 is 12 bytes, three f32 values in a row.

use glam::{Quat, Vec3};

use crate::binaries::{BinArray, BinOffset};

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLHeader {
    pub id: [u8; 4],    // Model format ID, such as "IDST" (0x49 0x44 0x53 0x54)
    pub version: i32,   // Format version number, such as 48 (0x30,0x00,0x00,0x00)
    pub checksum: i32,  // This has to be the same in the vvd and vtx files to load!
    pub name: [u8; 64], // The internal name of the model, padding with null bytes.
    pub data_length: i32,

    pub eye_position: Vec3,
    pub illum_position: Vec3,
    pub hull_min: Vec3,
    pub hull_max: Vec3,
    pub view_bbmin: Vec3,
    pub view_bbmax: Vec3,

    pub flags: i32,

    /*
     * After this point, the header contains many references to offsets
     * within the MDL file and the number of items at those offsets.
     *
     * Offsets are from the very beginning of the file.
     *
     * Note that indexes/counts are not always paired and ordered consistently.
     */
    pub bones: BinArray<MDLBone>,
    pub bone_controllers: [i32; 2],
    pub hitbox_sets: [i32; 2],
    pub local_anims: BinArray<MDLAnimDesc>,
    pub local_seqs: [i32; 2],

    pub activity_list_version: i32,
    pub events_indexed: i32,

    pub textures: BinArray<MDLTexture>,
    // Each entry is an offset from the start of the file to a null-terminated string.
    pub cd_textures: BinArray<BinOffset>,

    // Each skin-family assigns a texture-id to a skin location
    pub num_skin_refs: i32,
    pub num_skin_families: i32,
    pub skin_index: i32,

    pub body_parts: BinArray<MDLBodyPart>,

    pub local_attachments: [i32; 2],
    pub local_nodes: [i32; 2],
    pub local_node_name_index: i32,
    pub flex_descs: [i32; 2],
    pub flex_controllers: [i32; 2],
    pub flex_rules: [i32; 2],
    pub ik_chains: [i32; 2],
    pub mouths: [i32; 2],
    pub local_pose_params: [i32; 2],

    pub surface_prop_index: BinOffset,

    // Unusual: In this one index comes first, then count.
    pub key_value_index: i32,
    pub key_value_size: i32,

    pub local_ik_autoplay_locks: [i32; 2],

    pub mass: f32,
    pub contents: i32,

    pub include_models: [i32; 2],
    pub virtual_model: i32, // Placeholder for mutable-void*

    pub anim_blocks_name_index: i32,
    pub anim_blocks: [i32; 2],
    pub anim_block_model: i32,

    pub bone_table_by_name_index: i32,

    pub vertex_base: i32, // Placeholder for void*
    pub index_base: i32,  // Placeholder for void*

    // Used with $constantdirectionallight from the QC
    pub directional_dot_product: u8,

    pub root_lod: u8, // Preferred rather than clamped

    // 0 means any allowed, N means Lod 0 -> (N-1)
    pub num_allowed_root_lods: u8,

    unused0: u8,
    unused1: i32,

    pub flex_controller_ui: [i32; 2],

    pub vert_anim_fixed_point_scale: f32,
    unused2: i32,

    // Offset for additional header information, zero if not present.
    pub studiohdr2_index: i32,

    unused3: i32,
}

/// bone flag, rotation must be aligned to [`MDLBone::q_alignment`]
pub const BONE_FIXED_ALIGNMENT: i32 = 0x0010_0000;

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLBone {
    pub name_offset: BinOffset,
    pub parent: i32, // parent bone, -1 for a root
    pub bone_controller: [i32; 6],

    // default values
    pub pos: Vec3,
    pub quat: [f32; 4],
    pub rot: Vec3, // radian euler

    // compression scale
    pub pos_scale: Vec3,
    pub rot_scale: Vec3,

    pub pose_to_bone: [f32; 12],
    pub q_alignment: [f32; 4],
    pub flags: i32,
    pub proc_type: i32,
    pub proc_index: i32,
    pub physics_bone: i32,
    pub surface_prop_index: i32,
    pub contents: i32,

    unused: [i32; 8],
}

impl MDLBone {
    pub fn quaternion(&self) -> Quat {
        Quat::from_array(self.quat)
    }

    pub fn alignment(&self) -> Quat {
        Quat::from_array(self.q_alignment)
    }

    pub fn has_fixed_alignment(&self) -> bool {
        self.flags & BONE_FIXED_ALIGNMENT != 0
    }
}

// body part index
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLBodyPart {
    pub name_offset: BinOffset,
    pub num_submodels: i32,
    pub base: i32,
    pub submodel_offset: BinOffset, // index into models array
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLSubmodel {
    pub name: [u8; 64],
    pub kind: i32,
    pub bounding_radius: f32,
    pub meshes: BinArray<MDLMesh>,
    pub num_vertices: i32, // number of unique vertices/normals/texcoords
    pub vertex_index: i32, // byte offset of the first vertex, as if the vvd vertex block were one array
    pub tangents_index: i32,
    pub num_attachments: i32,
    pub attachment_index: i32,
    pub num_eyeballs: i32,
    pub eyeball_index: i32,
    pub vertex_data: [u32; 2], // runtime pointers to vertex and tangent data
    unused: [i32; 8],
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLMesh {
    pub material: i32,
    pub submodel_index: i32, // negative offset back to the owning submodel
    pub num_vertices: i32,
    pub vertex_offset: i32, // relative to the first vertex of the submodel
    pub num_flexes: i32,
    pub flex_index: i32,
    pub material_type: i32,
    pub material_param: i32,
    pub mesh_id: i32,
    pub center: Vec3,
    pub vertex_data: u32,
    pub num_lod_vertexes: [i32; 8],
    unused: [i32; 8],
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLTexture {
    // Number of bytes past the beginning of this structure
    // where the first character of the texture name can be found.
    pub name_offset: BinOffset,
    pub flags: i32,
    pub used: i32,
    unused: i32,
    pub material: i32,        // Placeholder for IMaterial
    pub client_material: i32, // Placeholder for void*
    unused2: [i32; 10],
}

/// description flag, tracks are offsets from the reference pose
pub const STUDIO_DELTA: i32 = 0x0004;
/// description flag, every track is zero and no data was stored
pub const STUDIO_ALLZEROS: i32 = 0x0020;

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLAnimDesc {
    pub base_ptr: i32,
    pub name_offset: BinOffset,
    pub fps: f32,
    pub flags: i32,
    pub num_frames: i32,
    pub num_movements: i32,
    pub movement_index: i32,
    unused1: [i32; 6],
    pub anim_block: i32, // non zero when the data lives in an external .ani block
    pub anim_index: i32,
    pub num_ik_rules: i32,
    pub ik_rule_index: i32,
    pub anim_block_ik_rule_index: i32,
    pub num_local_hierarchy: i32,
    pub local_hierarchy_index: i32,
    pub section_index: i32,
    pub section_frames: i32, // frames per section, 0 if not split
    pub zero_frame_span: i16,
    pub zero_frame_count: i16,
    pub zero_frame_index: i32,
    pub zero_frame_stall_time: f32,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLAnimSection {
    pub anim_block: i32,
    pub anim_index: i32,
}

pub const ANIM_RAWPOS: u8 = 0x01; // Vector48
pub const ANIM_RAWROT: u8 = 0x02; // Quaternion48
pub const ANIM_ANIMPOS: u8 = 0x04; // mstudioanim_valueptr_t
pub const ANIM_ANIMROT: u8 = 0x08; // mstudioanim_valueptr_t
pub const ANIM_DELTA: u8 = 0x10;
pub const ANIM_RAWROT2: u8 = 0x20; // Quaternion64

/// Per bone animation track header, followed by its data.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLAnimation {
    pub bone: u8,
    pub flags: u8,
    pub next_offset: i16, // 0 terminates the chain
}

impl MDLAnimation {
    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// Three offsets to [`MDLAnimValue`] runs, relative to this struct. 0 means no data.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLAnimValuePtr {
    pub offset: [i16; 3],
}

/// Either a run header {valid, total} or a single i16 value.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MDLAnimValue {
    pub raw: [u8; 2],
}

impl MDLAnimValue {
    pub fn valid(&self) -> u8 {
        self.raw[0]
    }

    pub fn total(&self) -> u8 {
        self.raw[1]
    }

    pub fn value(&self) -> i16 {
        i16::from_le_bytes(self.raw)
    }
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Quaternion48 {
    pub x: u16,
    pub y: u16,
    pub zw: u16, // z in the low 15 bits, sign of w in the top bit
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Quaternion64 {
    pub bits: u64, // x:21 y:21 z:21 wneg:1
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Vector48 {
    pub xyz: [u16; 3], // half floats
}

#[cfg(test)]
mod mdl_headers_tests {
    use std::mem::size_of;

    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(size_of::<MDLHeader>(), 408);
        assert_eq!(size_of::<MDLBone>(), 216);
        assert_eq!(size_of::<MDLBodyPart>(), 16);
        assert_eq!(size_of::<MDLSubmodel>(), 148);
        assert_eq!(size_of::<MDLMesh>(), 116);
        assert_eq!(size_of::<MDLTexture>(), 64);
        assert_eq!(size_of::<MDLAnimDesc>(), 100);
        assert_eq!(size_of::<MDLAnimation>(), 4);
        assert_eq!(size_of::<MDLAnimValuePtr>(), 6);
        assert_eq!(size_of::<Quaternion48>(), 6);
        assert_eq!(size_of::<Quaternion64>(), 8);
        assert_eq!(size_of::<Vector48>(), 6);
    }

    #[test]
    fn test_anim_value_views() {
        let v = MDLAnimValue { raw: [3, 5] };
        assert_eq!(v.valid(), 3);
        assert_eq!(v.total(), 5);
        assert_eq!(v.value(), 0x0503);
        assert_eq!(MDLAnimValue { raw: [0xFF, 0xFF] }.value(), -1);
    }
}
