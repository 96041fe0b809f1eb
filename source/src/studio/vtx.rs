// VTX is the extension for Source's proprietary mesh strip format. It stores hardware
// optimized material, skinning and triangle strip/fan information for each LOD of each
// mesh in the MDL.
//
// The file is a tree: body parts > models > lods > meshes > strip groups > strips.
// Every offset is relative to the record that holds it.
// This structure is in <mod folder>/src/public/optimize.h

use flagset::{flags, FlagSet};

use crate::binaries::{BinArray, BinaryReader, MetaItem};

use super::{format, mdl_headers::MDLHeader, StudioError};

/// Triangle index list of one strip, indexing the vertices of the owning mdl mesh.
pub type IndexList = Vec<u16>;

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VTXFileHeader {
    // file version as defined by OPTIMIZED_MODEL_FILE_VERSION (currently 7)
    pub version: i32,

    // hardware params that affect how the model is to be optimized.
    pub vert_cache_size: i32,
    pub max_bones_per_strip: u16,
    pub max_bones_per_tri: u16,
    pub max_bones_per_vert: i32,

    // must match checkSum in the .mdl
    pub checksum: i32,

    pub num_lods: i32, // Also specified in ModelHeader's and should match

    // Offset to materialReplacementList Array. one of these for each LOD, 8 in total
    pub material_replacement_list_offset: i32,

    pub body_parts: BinArray<VTXBodyPartHeader>,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VTXBodyPartHeader {
    pub models: BinArray<VTXModelHeader>,
}

// This maps one to one with models in the mdl file.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VTXModelHeader {
    pub lods: BinArray<VTXModelLODHeader>,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VTXModelLODHeader {
    pub meshes: BinArray<VTXMeshHeader>,
    // The point at which the engine should switch to this LOD mesh
    pub switch_point: f32,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VTXMeshHeader {
    pub strip_groups: BinArray<StripGroupHeader>,
    pub flags: u8,
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct StripGroupHeader {
    // These are the arrays of all verts and indices for this mesh.  strips index into this.
    pub verts: BinArray<VTXVertex>,
    pub indices: BinArray<u16>,
    pub strips: BinArray<StripHeader>,
    pub flags: u8,
}

// A strip is a piece of a stripgroup which is divided by bones
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
pub struct StripHeader {
    // ranges into the strip group index and vertex arrays
    pub num_indices: i32,
    pub index_offset: i32,
    pub num_verts: i32,
    pub vert_offset: i32,

    pub num_bones: i16,
    pub flags: u8,

    pub num_bone_state_changes: i32,
    pub bone_state_change_offset: i32,
}

flags! {
    pub enum StripFlags: u8 {
        IsTriList = 0x01,
        IsTriStrip = 0x02,
    }
}

impl StripHeader {
    pub fn strip_flags(&self) -> FlagSet<StripFlags> {
        FlagSet::new_truncated(self.flags)
    }
}

#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Zeroable, bytemuck::Pod)]
pub struct VTXVertex {
    // these index into the mesh's vert[origMeshVertID]'s bones
    pub bone_weight_index: [u8; 3],
    pub num_bones: u8,

    // index of the vertex in the owning mdl mesh, not an absolute vvd index
    pub orig_mesh_vert_id: u16,

    // for sw skinned verts, these are indices into the global list of bones
    // for hw skinned verts, these are hardware bone indices
    pub bone_id: [i8; 3],
}

pub struct VTX {
    data: Vec<u8>,
    pub header: VTXFileHeader,
}

/// Read item `index` of a table that is relative to `anchor`.
fn read_item<T: bytemuck::Pod>(
    reader: &mut BinaryReader<'_>,
    what: &'static str,
    table: BinArray<T>,
    anchor: usize,
    index: usize,
) -> Result<MetaItem<T>, StudioError> {
    super::check_index(what, index, table.count)?;
    let offset = table.item_offset(anchor, index)?;
    Ok(MetaItem {
        offset,
        index,
        item: reader.read_at(offset)?,
    })
}

impl VTX {
    pub fn new(data: Vec<u8>) -> Result<Self, StudioError> {
        let version = format::identify_vtx(&data)?;
        if !format::is_vtx_version(version) {
            return Err(StudioError::Format(format!("unsupported vtx version {version}")));
        }
        let header = BinaryReader::new(&data).read()?;
        Ok(Self { data, header })
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn validate(&self, mdl: &MDLHeader) -> Result<(), StudioError> {
        let (ours, theirs) = (self.header.checksum, mdl.checksum);
        if ours != theirs {
            return Err(StudioError::Format(format!(
                "vtx checksum {ours} does not match mdl checksum {theirs}"
            )));
        }
        Ok(())
    }

    pub fn read_strip_groups(
        &self,
        body_part: usize,
        submodel: usize,
        lod: usize,
        mesh: usize,
    ) -> Result<Vec<MetaItem<StripGroupHeader>>, StudioError> {
        let mut reader = BinaryReader::new(&self.data);
        let part = read_item(&mut reader, "vtx body part", self.header.body_parts, 0, body_part)?;
        let model = read_item(&mut reader, "vtx model", part.item.models, part.offset, submodel)?;
        let lod = read_item(&mut reader, "vtx lod", model.item.lods, model.offset, lod)?;
        let mesh = read_item(&mut reader, "vtx mesh", lod.item.meshes, lod.offset, mesh)?;
        let groups = mesh.item.strip_groups;
        Ok(groups.read(&mut reader, mesh.offset)?)
    }

    /// Triangle lists of one mesh, as indices into the vertices of the mdl mesh.
    pub fn compute_mdl_vertex_indices(
        &self,
        body_part: usize,
        submodel: usize,
        lod: usize,
        mesh: usize,
    ) -> Result<Vec<IndexList>, StudioError> {
        let mut reader = BinaryReader::new(&self.data);
        let mut lists = Vec::new();

        for group in self.read_strip_groups(body_part, submodel, lod, mesh)? {
            let g = group.item;
            let (verts, indices, strips) = (g.verts, g.indices, g.strips);
            let verts = verts.read_f(&mut reader, group.offset)?;
            let indices = indices.read_f(&mut reader, group.offset)?;
            let strips = strips.read_f(&mut reader, group.offset)?;

            for strip in strips {
                if let Some(list) = strip_indices(&strip, &verts, &indices)? {
                    lists.push(list);
                }
            }
        }
        Ok(lists)
    }
}

/// Map one strip through the strip group vertices to mdl mesh vertex ids.
/// Strips that are empty or fall outside the group arrays are skipped.
fn strip_indices(
    strip: &StripHeader,
    verts: &[VTXVertex],
    indices: &[u16],
) -> Result<Option<IndexList>, StudioError> {
    let (num_indices, index_offset) = (strip.num_indices, strip.index_offset);
    let (num_verts, vert_offset) = (strip.num_verts, strip.vert_offset);

    if num_indices < 1 || num_verts < 1 || index_offset < 0 || vert_offset < 0 {
        return Ok(None);
    }
    let (first, count) = (index_offset as usize, num_indices as usize);
    if first + count > indices.len() || vert_offset as usize + num_verts as usize > verts.len() {
        log::debug!("skipping strip outside its strip group");
        return Ok(None);
    }

    let flags = strip.strip_flags();
    if flags.contains(StripFlags::IsTriStrip) {
        return Err(StudioError::Unsupported("triangle strips"));
    }
    if !flags.contains(StripFlags::IsTriList) {
        return Ok(None);
    }
    if count % 3 != 0 {
        return Err(StudioError::Structure(format!(
            "triangle list of {count} indices"
        )));
    }

    indices[first..first + count]
        .iter()
        .map(|&i| {
            let vert = verts.get(i as usize).ok_or(StudioError::OutOfRange {
                what: "strip group vertex",
                index: i as usize,
                count: verts.len(),
            })?;
            Ok(vert.orig_mesh_vert_id)
        })
        .collect::<Result<IndexList, _>>()
        .map(Some)
}
