use std::collections::{BTreeMap, HashMap};

use common::{
    vfile::VFileProvider,
    vpath::{VGlobalPath, VPath},
};
use glam::{Mat4, Vec3};

use crate::{
    binaries::MetaItem,
    meshes::{Bounds, MaterialGroup, MeshBuilder, StudioVertex},
    texture::Texture,
    vmt,
};

use super::{
    math::{concatenate_bone_chain, invert_matrices},
    mdl::{reference_bone_to_parent, MDL},
    mdl_headers::{MDLAnimDesc, MDLBone, STUDIO_DELTA},
    vtx::VTX,
    vvd::{ModelVertex, VVD},
    StudioError,
};

/// How a model is loaded and posed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudioOptions {
    pub body: usize,
    pub frame: usize,
    /// Overrides the root lod stored in the mdl header
    pub lod: Option<usize>,
    /// Strip file suffix, `<name>.<vtx_suffix>.vtx`
    pub vtx_suffix: String,
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self {
            body: 0,
            frame: 0,
            lod: None,
            vtx_suffix: "dx90".to_owned(),
        }
    }
}

/// Per bone matrices for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct BoneMatrices {
    /// Inverse of each bone's bind pose
    pub world_to_ref: Vec<Mat4>,
    /// Animated bone to world
    pub anim_to_world: Vec<Mat4>,
    /// `anim_to_world * world_to_ref`, moves a bind pose vertex to the animated pose
    pub skinning: Vec<Mat4>,
}

impl BoneMatrices {
    pub fn len(&self) -> usize {
        self.skinning.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skinning.is_empty()
    }

    /// Blend the vertex through up to three weighted bones. Unweighted vertices are kept as is.
    pub fn skin_vertex(&self, vertex: &ModelVertex) -> Result<StudioVertex, StudioError> {
        let (weights, ids, num_bones) = (vertex.bone_weight, vertex.bone_id, vertex.num_bones);
        let (pos, norm, uv) = (vertex.pos, vertex.norm, vertex.uv);

        if num_bones == 0 {
            return Ok(StudioVertex {
                position: pos,
                normal: norm,
                uv,
            });
        }

        let weights = weights.to_array();
        let mut position = Vec3::ZERO;
        let mut normal = Vec3::ZERO;
        for k in 0..(num_bones as usize).min(3) {
            let bone = ids[k] as usize;
            let m = self.skinning.get(bone).ok_or(StudioError::OutOfRange {
                what: "vertex bone",
                index: bone,
                count: self.skinning.len(),
            })?;
            position += m.transform_point3(pos) * weights[k];
            normal += m.transform_vector3(norm) * weights[k];
        }

        Ok(StudioVertex {
            position,
            normal: normal.normalize_or_zero(),
            uv,
        })
    }
}

/// Triangles of one body configuration, grouped by material in ascending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudioMesh {
    pub groups: Vec<MaterialGroup>,
    pub bounds: Option<Bounds>,
}

impl StudioMesh {
    pub fn group(&self, material: i32) -> Option<&MaterialGroup> {
        self.groups.iter().find(|g| g.material == material)
    }

    pub fn vertex_count(&self) -> usize {
        self.groups.iter().map(|g| g.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(|g| g.triangle_count()).sum()
    }
}

/// A validated mdl, vvd and vtx triple.
pub struct StudioModel {
    pub mdl: MDL,
    pub vvd: VVD,
    pub vtx: VTX,
}

impl StudioModel {
    pub fn from_bytes(mdl: Vec<u8>, vvd: Vec<u8>, vtx: Vec<u8>) -> Result<Self, StudioError> {
        let mdl = MDL::new(mdl)?;
        let vvd = VVD::new(vvd)?;
        let vtx = VTX::new(vtx)?;
        vvd.validate(&mdl.header)?;
        vtx.validate(&mdl.header)?;
        Ok(Self { mdl, vvd, vtx })
    }

    /// Open `path` and its `.vvd` and `.<vtx_suffix>.vtx` companions.
    pub fn load(fs: &dyn VFileProvider, path: &str, vtx_suffix: &str) -> Result<Self, StudioError> {
        let model_path = VGlobalPath::from(path);
        let mdl = fs.open(path)?;
        let vvd = fs.open(&model_path.with_extension("vvd"))?;
        let vtx = fs.open(&model_path.with_suffix_extension(vtx_suffix, "vtx"))?;

        let model = Self::from_bytes(mdl.data, vvd.data, vtx.data)?;
        log::info!(
            "Loaded {} ({:?}) with {} bones",
            path,
            model.mdl.name(),
            model.mdl.header.bones.len()
        );
        Ok(model)
    }

    pub fn frame_count(&self) -> Result<usize, StudioError> {
        self.mdl.frame_count()
    }

    fn animated_bone_to_parent(
        &self,
        desc: Option<&MetaItem<MDLAnimDesc>>,
        bone: &MetaItem<MDLBone>,
        frame: usize,
    ) -> Result<Mat4, StudioError> {
        let Some(desc) = desc else {
            return Ok(reference_bone_to_parent(&bone.item));
        };
        match self.mdl.find_local_animation(desc, bone.index, frame)? {
            Some(track) => self
                .mdl
                .compute_bone_to_parent_matrix(&track.anim, track.frame, &bone.item),
            None if desc.item.flags & STUDIO_DELTA != 0 => Ok(Mat4::IDENTITY),
            None => Ok(reference_bone_to_parent(&bone.item)),
        }
    }

    /// Bind and animated pose matrices of every bone at `frame` of the first animation.
    pub fn bone_matrices(&self, frame: usize) -> Result<BoneMatrices, StudioError> {
        let frame_count = self.mdl.frame_count()?;
        if frame >= frame_count {
            return Err(StudioError::OutOfRange {
                what: "frame",
                index: frame,
                count: frame_count,
            });
        }

        let bones = self.mdl.read_bones()?;
        let parents: Vec<i32> = bones.iter().map(|b| b.item.parent).collect();

        let reference: Vec<Mat4> = bones
            .iter()
            .map(|b| reference_bone_to_parent(&b.item))
            .collect();
        let mut world_to_ref = concatenate_bone_chain(&reference, &parents)?;
        invert_matrices(&mut world_to_ref)?;

        let desc = match self.mdl.num_local_animations() {
            0 => None,
            _ => Some(self.mdl.read_local_animation_description(0)?),
        };
        let animated = bones
            .iter()
            .map(|b| self.animated_bone_to_parent(desc.as_ref(), b, frame))
            .collect::<Result<Vec<_>, _>>()?;
        let anim_to_world = concatenate_bone_chain(&animated, &parents)?;

        let skinning = anim_to_world
            .iter()
            .zip(&world_to_ref)
            .map(|(anim, reference)| *anim * *reference)
            .collect();

        Ok(BoneMatrices {
            world_to_ref,
            anim_to_world,
            skinning,
        })
    }

    /// Reconstruct `body` at `frame`, using the root lod stored in the mdl.
    pub fn reconstruct(&self, body: usize, frame: usize) -> Result<StudioMesh, StudioError> {
        self.reconstruct_lod(body, frame, self.mdl.root_lod())
    }

    pub fn reconstruct_with(&self, options: &StudioOptions) -> Result<StudioMesh, StudioError> {
        let lod = options.lod.unwrap_or_else(|| self.mdl.root_lod());
        self.reconstruct_lod(options.body, options.frame, lod)
    }

    pub fn reconstruct_lod(
        &self,
        body: usize,
        frame: usize,
        root_lod: usize,
    ) -> Result<StudioMesh, StudioError> {
        let matrices = self.bone_matrices(frame)?;
        let vertices = self.vvd.consolidate_vertices(root_lod)?;

        let body_parts = self.mdl.read_body_parts()?;
        let submodels = self.mdl.read_submodels(&body_parts, body)?;
        let meshes = self.mdl.read_meshes(&submodels)?;

        let mut builders = BTreeMap::<i32, MeshBuilder>::new();

        for mesh in &meshes {
            let submodel = submodels
                .iter()
                .find(|s| s.body_part == mesh.body_part)
                .ok_or_else(|| {
                    StudioError::Structure(format!("mesh without submodel in body part {}", mesh.body_part))
                })?;

            let vertex_index = submodel.item.vertex_index;
            let vertex_offset = mesh.item.vertex_offset;
            if vertex_index < 0 || vertex_index as usize % std::mem::size_of::<ModelVertex>() != 0 {
                return Err(StudioError::Structure(format!(
                    "submodel vertex index {vertex_index} is not a vertex offset"
                )));
            }
            let first = vertex_index as i64 / std::mem::size_of::<ModelVertex>() as i64
                + vertex_offset as i64;
            if first < 0 {
                return Err(StudioError::Structure(format!(
                    "mesh vertex offset {vertex_offset} before the first vertex"
                )));
            }
            let first = first as usize;

            let lists =
                self.vtx
                    .compute_mdl_vertex_indices(mesh.body_part, mesh.submodel, root_lod, mesh.index)?;

            let builder = builders.entry(mesh.item.material).or_default();
            // mesh vertex -> builder vertex, shared between the strips of this mesh
            let mut emitted = HashMap::<usize, u32>::new();

            for index in lists.iter().flatten() {
                let vertex = first + *index as usize;
                let out = match emitted.get(&vertex) {
                    Some(out) => *out,
                    None => {
                        let v = vertices.get(vertex).ok_or(StudioError::OutOfRange {
                            what: "vertex",
                            index: vertex,
                            count: vertices.len(),
                        })?;
                        let out = builder.add_vert(matrices.skin_vertex(v)?);
                        emitted.insert(vertex, out);
                        out
                    }
                };
                builder.add_index(out);
            }
        }

        let groups: Vec<MaterialGroup> = builders
            .into_iter()
            .filter(|(_, b)| !b.tris().is_empty())
            .map(|(material, builder)| builder.build(material))
            .collect();
        let bounds = groups.iter().filter_map(|g| g.bounds).reduce(Bounds::union);

        log::debug!(
            "body {} frame {} lod {}: {} groups",
            body,
            frame,
            root_lod,
            groups.len()
        );
        Ok(StudioMesh { groups, bounds })
    }

    /// Textures of every skin reference, one per skin family. Missing textures become placeholders.
    pub fn load_skins(&self, fs: &dyn VFileProvider) -> Result<Vec<Vec<Texture>>, StudioError> {
        let paths = self.mdl.read_texture_paths()?;
        (0..self.mdl.num_skin_refs())
            .map(|skin_ref| {
                Ok(self
                    .mdl
                    .read_texture_indices_for_skin_ref(skin_ref)?
                    .into_iter()
                    .map(|texture| {
                        let name = paths.names.get(texture).ok_or(StudioError::OutOfRange {
                            what: "texture",
                            index: texture,
                            count: paths.names.len(),
                        })?;
                        Ok(match paths.open(fs, texture) {
                            Ok(file) => vmt::load_texture_or_placeholder(fs, &file.path, name),
                            Err(e) => {
                                log::warn!("material for {:?} not found: {}", name, e);
                                Texture::placeholder(name)
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, StudioError>>()?)
            })
            .collect()
    }
}

#[cfg(test)]
mod model_tests {
    use common::vfile::VFileSystem;

    use super::*;
    use crate::studio::{
        mdl_headers::{Vector48, ANIM_DELTA, ANIM_RAWPOS},
        test_fixtures::{FixtureAnimation, FixtureTrack, ModelFixture},
    };

    fn positions(mesh: &StudioMesh) -> Vec<Vec3> {
        mesh.groups[0].vertices.iter().map(|v| v.position).collect()
    }

    fn build(fixture: &ModelFixture) -> StudioModel {
        StudioModel::from_bytes(fixture.mdl(), fixture.vvd(), fixture.vtx()).unwrap()
    }

    #[test]
    fn test_reference_pose_keeps_vertices() {
        let fixture = ModelFixture::triangle();
        let model = build(&fixture);
        let mesh = model.reconstruct(0, 0).unwrap();

        assert_eq!(mesh.groups.len(), 1);
        assert_eq!(mesh.groups[0].material, 0);
        assert_eq!(mesh.groups[0].indices, vec![0, 1, 2]);
        for (got, want) in positions(&mesh).iter().zip(fixture.positions()) {
            assert!(got.abs_diff_eq(want, 1e-5), "{got} != {want}");
        }
        let bounds = mesh.bounds.unwrap();
        assert!(bounds.max.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_delta_animation_keeps_vertices() {
        let mut fixture = ModelFixture::triangle();
        fixture.animation = Some(FixtureAnimation {
            flags: 0,
            num_frames: 2,
            tracks: vec![FixtureTrack {
                bone: 0,
                flags: ANIM_DELTA,
                data: Vec::new(),
            }],
        });
        let model = build(&fixture);
        assert_eq!(model.frame_count().unwrap(), 2);

        let mesh = model.reconstruct(0, 1).unwrap();
        for (got, want) in positions(&mesh).iter().zip(fixture.positions()) {
            assert!(got.abs_diff_eq(want, 1e-5));
        }
        assert!(matches!(
            model.reconstruct(0, 2),
            Err(StudioError::OutOfRange { what: "frame", .. })
        ));
    }

    #[test]
    fn test_animated_translation() {
        let mut fixture = ModelFixture::triangle();
        let mut data = Vec::new();
        data.extend_from_slice(bytemuck::bytes_of(&Vector48 {
            xyz: [0, 0, 0x3C00],
        }));
        fixture.animation = Some(FixtureAnimation {
            flags: 0,
            num_frames: 1,
            tracks: vec![FixtureTrack {
                bone: 0,
                flags: ANIM_RAWPOS,
                data,
            }],
        });
        let model = build(&fixture);
        let mesh = model.reconstruct(0, 0).unwrap();
        for (got, want) in positions(&mesh).iter().zip(fixture.positions()) {
            assert!(got.abs_diff_eq(want + Vec3::Z, 1e-5), "{got}");
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let fixture = ModelFixture::triangle();
        let mut other = ModelFixture::triangle();
        other.checksum += 1;
        assert!(matches!(
            StudioModel::from_bytes(fixture.mdl(), other.vvd(), fixture.vtx()),
            Err(StudioError::Format(_))
        ));
        assert!(matches!(
            StudioModel::from_bytes(fixture.mdl(), fixture.vvd(), other.vtx()),
            Err(StudioError::Format(_))
        ));
    }

    #[test]
    fn test_vertex_bone_out_of_range() {
        let mut fixture = ModelFixture::triangle();
        fixture.vertices[1].bone_id = [4, 0, 0];
        let model = build(&fixture);
        assert!(matches!(
            model.reconstruct(0, 0),
            Err(StudioError::OutOfRange {
                what: "vertex bone",
                ..
            })
        ));
    }

    #[test]
    fn test_vertex_out_of_range() {
        let mut fixture = ModelFixture::triangle();
        fixture.vertex_offset = 1;
        let model = build(&fixture);
        assert!(matches!(
            model.reconstruct(0, 0),
            Err(StudioError::OutOfRange { what: "vertex", .. })
        ));
    }

    #[test]
    fn test_root_lod_out_of_range() {
        let model = build(&ModelFixture::triangle());
        assert!(model.reconstruct_lod(0, 0, 1).is_err());
    }

    #[test]
    fn test_load_companions() {
        let fixture = ModelFixture::triangle();
        let mut fs = VFileSystem::default();
        fs.insert("models/props/crate.mdl", fixture.mdl());
        fs.insert("models/props/crate.vvd", fixture.vvd());
        fs.insert("models/props/crate.dx90.vtx", fixture.vtx());

        let model = StudioModel::load(&fs, "models/props/crate.mdl", "dx90").unwrap();
        let mesh = model.reconstruct_with(&StudioOptions::default()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);

        assert!(StudioModel::load(&fs, "models/props/crate.mdl", "dx80").is_err());
    }

    #[test]
    fn test_skins_fall_back_to_placeholder() {
        let fixture = ModelFixture::triangle();
        let model = build(&fixture);
        let skins = model.load_skins(&VFileSystem::default()).unwrap();
        assert_eq!(skins.len(), 1);
        assert_eq!(skins[0].len(), 1);
        assert_eq!(skins[0][0], Texture::placeholder("crate"));
    }

    #[test]
    fn test_bone_matrices_bind_pose() {
        let model = build(&ModelFixture::triangle());
        let matrices = model.bone_matrices(0).unwrap();
        assert_eq!(matrices.len(), 1);
        assert!(matrices.skinning[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
