use std::mem::size_of;

use common::vfile::{VFile, VFileError, VFileProvider};
use glam::{Mat4, Quat, Vec3};

use crate::binaries::{resolve_offset, BinaryReader, MetaItem, ReadError};

use super::{
    check_index, format,
    math::{
        align_quaternion, decode_quaternion48, decode_quaternion64, decode_vector48,
        euler_to_quaternion, matrix_from_rot_and_pos,
    },
    mdl_headers::*,
    StudioError,
};

/// Longest track chain a description can hold, one track per addressable bone.
const MAX_ANIMATION_CHAIN: usize = u8::MAX as usize + 1;

/// An item selected from a body part.
#[derive(Copy, Clone, Debug)]
pub struct BodyPartItem<T> {
    pub body_part: usize,
    /// Submodel of the body part this belongs to
    pub submodel: usize,
    /// Index in the table the item was read from
    pub index: usize,
    pub offset: usize,
    pub item: T,
}

/// Animation track of one bone, and the frame within its section.
#[derive(Copy, Clone, Debug)]
pub struct AnimationTrack {
    pub anim: MetaItem<MDLAnimation>,
    pub frame: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TexturePaths {
    /// Search directories, never empty
    pub dirs: Vec<String>,
    pub names: Vec<String>,
}

impl TexturePaths {
    /// Material paths to try for texture `index`, in search order.
    pub fn candidates(&self, index: usize) -> Vec<String> {
        let Some(name) = self.names.get(index) else {
            return Vec::new();
        };
        self.dirs
            .iter()
            .map(|dir| format!("materials/{}{}.vmt", dir, name))
            .collect()
    }

    /// Open the first candidate that exists.
    pub fn open(&self, fs: &dyn VFileProvider, index: usize) -> Result<VFile, StudioError> {
        let candidates = self.candidates(index);
        for path in &candidates {
            match fs.open(path) {
                Ok(file) => return Ok(file),
                Err(VFileError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(VFileError::NotFound(
            candidates
                .first()
                .cloned()
                .unwrap_or_else(|| format!("texture {index}")),
        )
        .into())
    }
}

/// Submodel picked by a body index, `(body / base) % num_submodels`.
pub fn submodel_index(body_part: &MDLBodyPart, body_index: usize) -> Result<usize, StudioError> {
    let base = body_part.base;
    let count = body_part.num_submodels;
    if base <= 0 || count <= 0 {
        return Err(StudioError::Structure(format!(
            "body part with base {base} and {count} submodels"
        )));
    }
    Ok((body_index / base as usize) % count as usize)
}

/// Random access view of a .mdl file.
pub struct MDL {
    data: Vec<u8>,
    pub header: MDLHeader,
}

impl MDL {
    pub fn new(data: Vec<u8>) -> Result<Self, StudioError> {
        let id = format::identify(&data)?;
        if !format::is_mdl_ident(id.ident) {
            return Err(StudioError::Format(format!(
                "bad mdl ident {:?}",
                String::from_utf8_lossy(&id.ident)
            )));
        }
        if !format::is_mdl_version(id.version) {
            return Err(StudioError::Format(format!(
                "unsupported mdl version {}",
                id.version
            )));
        }
        let header = BinaryReader::new(&data).read()?;
        Ok(Self { data, header })
    }

    pub fn version_of(data: &[u8]) -> Result<i32, ReadError> {
        Ok(format::identify(data)?.version)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn reader(&self) -> BinaryReader<'_> {
        BinaryReader::new(&self.data)
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn name(&self) -> String {
        let name = self.header.name;
        let end = name.iter().position(|c| *c == 0).unwrap_or(name.len());
        String::from_utf8_lossy(&name[..end]).into_owned()
    }

    pub fn root_lod(&self) -> usize {
        self.header.root_lod as usize
    }

    pub fn read_bones(&self) -> Result<Vec<MetaItem<MDLBone>>, StudioError> {
        let bones = self.header.bones;
        Ok(bones.read(&mut self.reader(), 0)?)
    }

    pub fn read_bone_name(&self, bone: &MetaItem<MDLBone>) -> Result<String, StudioError> {
        Ok(bone.item.name_offset.read_str(&self.reader(), bone.offset)?)
    }

    pub fn read_body_parts(&self) -> Result<Vec<MetaItem<MDLBodyPart>>, StudioError> {
        let body_parts = self.header.body_parts;
        Ok(body_parts.read(&mut self.reader(), 0)?)
    }

    pub fn read_body_part_name(&self, part: &MetaItem<MDLBodyPart>) -> Result<String, StudioError> {
        Ok(part.item.name_offset.read_str(&self.reader(), part.offset)?)
    }

    /// The submodel each body part shows for `body_index`.
    pub fn read_submodels(
        &self,
        body_parts: &[MetaItem<MDLBodyPart>],
        body_index: usize,
    ) -> Result<Vec<BodyPartItem<MDLSubmodel>>, StudioError> {
        let table = self.header.body_parts;
        if body_parts.len() != table.len() {
            return Err(StudioError::Structure(format!(
                "given {} body parts, header has {}",
                body_parts.len(),
                table.len()
            )));
        }
        let mut reader = self.reader();
        body_parts
            .iter()
            .map(|part| {
                let submodel = submodel_index(&part.item, body_index)?;
                let offset = part.item.submodel_offset.resolve(part.offset)?
                    + submodel * size_of::<MDLSubmodel>();
                Ok(BodyPartItem {
                    body_part: part.index,
                    submodel,
                    index: submodel,
                    offset,
                    item: reader.read_at(offset)?,
                })
            })
            .collect()
    }

    pub fn read_meshes(
        &self,
        submodels: &[BodyPartItem<MDLSubmodel>],
    ) -> Result<Vec<BodyPartItem<MDLMesh>>, StudioError> {
        let mut reader = self.reader();
        let mut meshes = Vec::new();
        for submodel in submodels {
            let table = submodel.item.meshes;
            for mesh in table.read(&mut reader, submodel.offset)? {
                meshes.push(BodyPartItem {
                    body_part: submodel.body_part,
                    submodel: submodel.submodel,
                    index: mesh.index,
                    offset: mesh.offset,
                    item: mesh.item,
                });
            }
        }
        Ok(meshes)
    }

    pub fn read_textures(&self) -> Result<Vec<MetaItem<MDLTexture>>, StudioError> {
        let textures = self.header.textures;
        Ok(textures.read(&mut self.reader(), 0)?)
    }

    pub fn read_texture_paths(&self) -> Result<TexturePaths, StudioError> {
        let mut reader = self.reader();

        let cd_textures = self.header.cd_textures;
        let mut dirs = cd_textures
            .read_f(&mut reader, 0)?
            .iter()
            .map(|dir| Ok(dir.read_str(&reader, 0)?.replace('\\', "/")))
            .collect::<Result<Vec<_>, ReadError>>()?;
        if dirs.is_empty() {
            dirs.push(String::new());
        }

        let names = self
            .read_textures()?
            .iter()
            .map(|t| Ok(t.item.name_offset.read_str(&reader, t.offset)?.replace('\\', "/")))
            .collect::<Result<Vec<_>, ReadError>>()?;

        Ok(TexturePaths { dirs, names })
    }

    pub fn num_skin_refs(&self) -> usize {
        self.header.num_skin_refs.max(0) as usize
    }

    pub fn num_skin_families(&self) -> usize {
        self.header.num_skin_families.max(0) as usize
    }

    /// Texture used by `skin_ref` in each skin family.
    pub fn read_texture_indices_for_skin_ref(&self, skin_ref: usize) -> Result<Vec<usize>, StudioError> {
        check_index("skin reference", skin_ref, self.header.num_skin_refs)?;
        let num_textures = self.header.textures.len();
        let skin_index = self.header.skin_index;
        let table = resolve_offset(0, skin_index as i64)?;
        let mut reader = self.reader();

        (0..self.num_skin_families())
            .map(|family| {
                let offset = table + (family * self.num_skin_refs() + skin_ref) * size_of::<i16>();
                let texture = reader.read_at::<i16>(offset)?;
                if texture < 0 || texture as usize >= num_textures {
                    return Err(StudioError::OutOfRange {
                        what: "skin texture",
                        index: texture.max(0) as usize,
                        count: num_textures,
                    });
                }
                Ok(texture as usize)
            })
            .collect()
    }

    pub fn num_local_animations(&self) -> usize {
        self.header.local_anims.len()
    }

    pub fn read_local_animation_description(
        &self,
        index: usize,
    ) -> Result<MetaItem<MDLAnimDesc>, StudioError> {
        let anims = self.header.local_anims;
        check_index("animation description", index, anims.count)?;
        let offset = anims.item_offset(0, index)?;
        Ok(MetaItem {
            offset,
            index,
            item: self.reader().read_at(offset)?,
        })
    }

    pub fn read_local_animation_name(&self, desc: &MetaItem<MDLAnimDesc>) -> Result<String, StudioError> {
        Ok(desc.item.name_offset.read_str(&self.reader(), desc.offset)?)
    }

    /// Track header at an absolute offset. The index is the bone it animates.
    pub fn read_local_animation(&self, offset: usize) -> Result<MetaItem<MDLAnimation>, StudioError> {
        let item: MDLAnimation = self.reader().read_at(offset)?;
        Ok(MetaItem {
            offset,
            index: item.bone as usize,
            item,
        })
    }

    /// Frames in the first local animation, 1 when there is none.
    pub fn frame_count(&self) -> Result<usize, StudioError> {
        if self.num_local_animations() == 0 {
            return Ok(1);
        }
        let desc = self.read_local_animation_description(0)?;
        Ok(desc.item.num_frames.max(1) as usize)
    }

    /// First track of the chain holding `frame`, and the frame relative to that chain.
    fn animation_block(
        &self,
        desc: &MetaItem<MDLAnimDesc>,
        frame: usize,
    ) -> Result<Option<(usize, usize)>, StudioError> {
        let d = desc.item;
        if d.flags & STUDIO_ALLZEROS != 0 {
            return Ok(None);
        }

        let (block, index, frame) = if d.section_frames > 0 {
            let section_frames = d.section_frames as usize;
            let num_frames = d.num_frames.max(0) as usize;
            // the last frame is stored at the start of its own section
            let (section, frame) = if num_frames > section_frames && frame + 1 == num_frames {
                (num_frames / section_frames + 1, 0)
            } else {
                let section = frame / section_frames;
                (section, frame - section * section_frames)
            };
            let section_table = resolve_offset(desc.offset, d.section_index as i64)?;
            let s: MDLAnimSection = self
                .reader()
                .read_at(section_table + section * size_of::<MDLAnimSection>())?;
            (s.anim_block, s.anim_index, frame)
        } else {
            (d.anim_block, d.anim_index, frame)
        };

        if block != 0 {
            log::warn!(
                "animation {} is stored in external block {}, using the reference pose",
                desc.index,
                block
            );
            return Ok(None);
        }
        Ok(Some((resolve_offset(desc.offset, index as i64)?, frame)))
    }

    /// Walk the track chain of `desc` for the track animating `bone`.
    pub fn find_local_animation(
        &self,
        desc: &MetaItem<MDLAnimDesc>,
        bone: usize,
        frame: usize,
    ) -> Result<Option<AnimationTrack>, StudioError> {
        let Some((mut offset, frame)) = self.animation_block(desc, frame)? else {
            return Ok(None);
        };

        for _ in 0..MAX_ANIMATION_CHAIN {
            let anim = self.read_local_animation(offset)?;
            if anim.index == bone {
                return Ok(Some(AnimationTrack { anim, frame }));
            }
            match anim.item.next_offset {
                0 => return Ok(None),
                next => offset = resolve_offset(offset, next as i64)?,
            }
        }
        Err(StudioError::Structure(format!(
            "animation {} track chain does not terminate",
            desc.index
        )))
    }

    /// Decode one axis of a compressed track at `frame`.
    ///
    /// Values are stored as runs of `total` frames, of which only the first `valid`
    /// are stored; the remaining frames repeat the last valid value.
    fn extract_animation_value(&self, offset: usize, frame: usize, scale: f32) -> Result<f32, StudioError> {
        let mut reader = self.reader();
        let mut offset = offset;
        let mut k = frame;
        let mut run: MDLAnimValue = reader.read_at(offset)?;

        while run.total() as usize <= k {
            k -= run.total() as usize;
            offset += (run.valid() as usize + 1) * size_of::<MDLAnimValue>();
            run = reader.read_at(offset)?;
            if run.total() == 0 {
                return Ok(0.0);
            }
        }

        let value_offset = if run.valid() as usize > k {
            offset + (k + 1) * size_of::<MDLAnimValue>()
        } else {
            offset + run.valid() as usize * size_of::<MDLAnimValue>()
        };
        let value: MDLAnimValue = reader.read_at(value_offset)?;
        Ok(value.value() as f32 * scale)
    }

    fn extract_animation_vector(
        &self,
        ptr_offset: usize,
        frame: usize,
        scale: Vec3,
    ) -> Result<Vec3, StudioError> {
        let ptr: MDLAnimValuePtr = self.reader().read_at(ptr_offset)?;
        let offsets = ptr.offset;
        let scale = scale.to_array();
        let mut v = [0.0; 3];
        for axis in 0..3 {
            // no data stored for this axis
            if offsets[axis] == 0 {
                continue;
            }
            let start = resolve_offset(ptr_offset, offsets[axis] as i64)?;
            v[axis] = self.extract_animation_value(start, frame, scale[axis])?;
        }
        Ok(Vec3::from_array(v))
    }

    pub fn read_animation_rotation(
        &self,
        anim: &MetaItem<MDLAnimation>,
        frame: usize,
        bone: &MDLBone,
    ) -> Result<Quat, StudioError> {
        let data = anim.offset + size_of::<MDLAnimation>();
        let a = anim.item;
        let delta = a.has(ANIM_DELTA);

        if a.has(ANIM_RAWROT) {
            return Ok(decode_quaternion48(self.reader().read_at(data)?));
        }
        if a.has(ANIM_RAWROT2) {
            return Ok(decode_quaternion64(self.reader().read_at(data)?));
        }
        if !a.has(ANIM_ANIMROT) {
            return Ok(if delta { Quat::IDENTITY } else { bone.quaternion() });
        }

        let mut angles = self.extract_animation_vector(data, frame, bone.rot_scale)?;
        if !delta {
            angles += bone.rot;
        }
        let q = euler_to_quaternion(angles);
        if !delta && bone.has_fixed_alignment() {
            Ok(align_quaternion(q, bone.alignment()))
        } else {
            Ok(q)
        }
    }

    pub fn read_animation_position(
        &self,
        anim: &MetaItem<MDLAnimation>,
        frame: usize,
        bone: &MDLBone,
    ) -> Result<Vec3, StudioError> {
        let data = anim.offset + size_of::<MDLAnimation>();
        let a = anim.item;
        let delta = a.has(ANIM_DELTA);

        if a.has(ANIM_RAWPOS) {
            let mut offset = data;
            if a.has(ANIM_RAWROT) {
                offset += size_of::<Quaternion48>();
            }
            if a.has(ANIM_RAWROT2) {
                offset += size_of::<Quaternion64>();
            }
            return Ok(decode_vector48(self.reader().read_at(offset)?));
        }
        if !a.has(ANIM_ANIMPOS) {
            return Ok(if delta { Vec3::ZERO } else { bone.pos });
        }

        let mut ptr = data;
        if a.has(ANIM_ANIMROT) {
            ptr += size_of::<MDLAnimValuePtr>();
        }
        let mut pos = self.extract_animation_vector(ptr, frame, bone.pos_scale)?;
        if !delta {
            pos += bone.pos;
        }
        Ok(pos)
    }

    pub fn compute_bone_to_parent_matrix(
        &self,
        anim: &MetaItem<MDLAnimation>,
        frame: usize,
        bone: &MDLBone,
    ) -> Result<Mat4, StudioError> {
        let rot = self.read_animation_rotation(anim, frame, bone)?;
        let pos = self.read_animation_position(anim, frame, bone)?;
        Ok(matrix_from_rot_and_pos(rot, pos))
    }
}

/// Bind pose of a bone relative to its parent.
pub fn reference_bone_to_parent(bone: &MDLBone) -> Mat4 {
    matrix_from_rot_and_pos(bone.quaternion(), bone.pos)
}
