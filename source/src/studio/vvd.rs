use std::{mem::size_of, sync::OnceLock};

use glam::{Vec2, Vec3};

use crate::binaries::{BinOffset, BinaryReader};

use super::{format, mdl_headers::MDLHeader, StudioError};

pub const MAX_NUM_LODS: usize = 8;

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VertexFileHeader {
    pub id: [u8; 4],                   // MODEL_VERTEX_FILE_ID
    pub version: i32,                  // MODEL_VERTEX_FILE_VERSION
    pub checksum: i32,                 // same as studiohdr_t, ensures sync
    pub num_lods: i32,                 // num of valid lods
    pub num_lod_vertexes: [i32; 8],    // num verts for desired root lod
    pub num_fixups: i32,               // num of vertexFileFixup_t
    pub fixup_table_start: BinOffset,  // offset from base to fixup table
    pub vertex_data_start: BinOffset,  // offset from base to vertex block
    pub tangent_data_start: BinOffset, // offset from base to tangent block
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct ModelVertex {
    pub bone_weight: Vec3,
    pub bone_id: [u8; 3],
    pub num_bones: u8,
    pub pos: Vec3,
    pub norm: Vec3,
    pub uv: Vec2,
}

/// Copy `count` vertices from `src` in the vertex block to `dst` in the consolidated list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fixup {
    pub lod: i32,
    pub dst: usize,
    pub src: usize,
    pub count: usize,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VVDFixup {
    pub lod: i32,
    pub src: i32,
    pub count: i32,
}

pub struct VVD {
    data: Vec<u8>,
    pub header: VertexFileHeader,
    fixups: Vec<VVDFixup>,
    lods: [OnceLock<Vec<ModelVertex>>; MAX_NUM_LODS],
}

impl VVD {
    pub fn new(data: Vec<u8>) -> Result<Self, StudioError> {
        let id = format::identify(&data)?;
        if !format::is_vvd(id) {
            return Err(StudioError::Format(format!(
                "bad vvd ident {:?} version {}",
                String::from_utf8_lossy(&id.ident),
                id.version
            )));
        }

        let mut reader = BinaryReader::new(&data);
        let header: VertexFileHeader = reader.read()?;

        let num_lods = header.num_lods;
        if !(0..=MAX_NUM_LODS as i32).contains(&num_lods) {
            return Err(StudioError::Format(format!("vvd has {num_lods} lods")));
        }

        let num_fixups = header.num_fixups;
        if num_fixups < 0 {
            return Err(StudioError::Structure(format!("vvd has {num_fixups} fixups")));
        }
        reader.seek(header.fixup_table_start.resolve(0)?)?;
        let fixups = reader.read_array(num_fixups as usize)?;

        Ok(Self {
            data,
            header,
            fixups,
            lods: Default::default(),
        })
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn num_lods(&self) -> usize {
        self.header.num_lods.max(0) as usize
    }

    pub fn validate(&self, mdl: &MDLHeader) -> Result<(), StudioError> {
        let (ours, theirs) = (self.header.checksum, mdl.checksum);
        if ours != theirs {
            return Err(StudioError::Format(format!(
                "vvd checksum {ours} does not match mdl checksum {theirs}"
            )));
        }
        Ok(())
    }

    /// Fixups that apply to `root_lod`, with their destination in the consolidated list.
    pub fn fixups_for_lod(&self, root_lod: usize) -> Result<(Vec<Fixup>, usize), StudioError> {
        let mut fixups = Vec::new();
        let mut dst = 0;
        for f in &self.fixups {
            let (lod, src, count) = (f.lod, f.src, f.count);
            if lod < root_lod as i32 {
                continue;
            }
            if src < 0 || count < 0 {
                return Err(StudioError::Structure(format!(
                    "vvd fixup with source {src} and count {count}"
                )));
            }
            fixups.push(Fixup {
                lod,
                dst,
                src: src as usize,
                count: count as usize,
            });
            dst += count as usize;
        }
        Ok((fixups, dst))
    }

    fn read_lod(&self, root_lod: usize) -> Result<Vec<ModelVertex>, StudioError> {
        let mut reader = BinaryReader::new(&self.data);
        let start = self.header.vertex_data_start.resolve(0)?;

        if self.fixups.is_empty() {
            let counts = self.header.num_lod_vertexes;
            let count = counts[root_lod];
            if count < 0 {
                return Err(StudioError::Structure(format!(
                    "lod {root_lod} has {count} vertices"
                )));
            }
            reader.seek(start)?;
            return Ok(reader.read_array(count as usize)?);
        }

        let (fixups, total) = self.fixups_for_lod(root_lod)?;
        let mut verts = vec![ModelVertex::default(); total];
        for fixup in fixups {
            reader.seek(start + fixup.src * size_of::<ModelVertex>())?;
            for v in &mut verts[fixup.dst..fixup.dst + fixup.count] {
                *v = reader.read()?;
            }
        }
        Ok(verts)
    }

    /// Vertex list of `root_lod`, with fixups applied. Built once per lod.
    pub fn consolidate_vertices(&self, root_lod: usize) -> Result<&[ModelVertex], StudioError> {
        if root_lod >= self.num_lods() {
            return Err(StudioError::OutOfRange {
                what: "root lod",
                index: root_lod,
                count: self.num_lods(),
            });
        }
        if let Some(verts) = self.lods[root_lod].get() {
            return Ok(verts);
        }
        let verts = self.read_lod(root_lod)?;
        log::debug!("consolidated {} vertices for lod {}", verts.len(), root_lod);
        Ok(self.lods[root_lod].get_or_init(|| verts))
    }
}
