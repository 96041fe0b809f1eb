// Valve Material Type

pub mod keyvalues;
pub mod tokenizer;

use common::vfile::{VFileError, VFileProvider};
use thiserror::Error;

use crate::{
    texture::Texture,
    vtf::{VTFError, VTF},
};

use self::{keyvalues::KeyValues, tokenizer::ParseError};

/// Shaders whose base texture is a plain colour map.
const SUPPORTED_SHADERS: &[&str] = &[
    "LightmappedGeneric",
    "LightmappedReflective",
    "WorldTwoTextureBlend",
    "WorldVertexTransition",
    "VertexLitGeneric",
    "Water",
    "UnlitGeneric",
    "Eyes",
    "EyeRefract",
];

/// Parameters meaning the base texture alpha is a mask, not transparency
const ALPHA_MASK_PARAMS: &[&str] = &[
    "$basealphaenvmapmask",
    "$selfillum",
    "$basemapalphaphongmask",
];

#[derive(Debug, Error)]
pub enum VMTError {
    #[error("material parse error at {0}")]
    Parse(#[from] ParseError),
    #[error("material file was empty")]
    Empty,
    #[error("material type {0:?} is not supported")]
    UnsupportedShader(String),
    #[error("no base texture entry in material")]
    MissingBaseTexture,
    #[error("base texture entry was empty")]
    EmptyBaseTexture,
    #[error(transparent)]
    File(#[from] VFileError),
    #[error("texture error: {0}")]
    Texture(#[from] VTFError),
}

/// A parsed material. The first top level node names the shader and holds its parameters.
#[derive(Clone, Debug)]
pub struct VMT {
    pub shader: String,
    material: KeyValues,
    pub source: String,
}

fn is_true(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value.parse::<f32>().is_ok_and(|v| v != 0.0)
}

impl VMT {
    pub fn from_string(source: String) -> Result<Self, VMTError> {
        let root = KeyValues::parse(&source)?;
        let material = root.children().first().cloned().ok_or(VMTError::Empty)?;
        Ok(Self {
            shader: material.key.clone(),
            material,
            source,
        })
    }

    /// Opens and parses `path`. Invalid UTF-8 is replaced.
    pub fn load(fs: &dyn VFileProvider, path: &str) -> Result<Self, VMTError> {
        let file = fs.open(path)?;
        Self::from_string(String::from_utf8_lossy(&file.data).into_owned())
    }

    pub fn shader(&self) -> &str {
        &self.shader
    }

    pub fn material(&self) -> &KeyValues {
        &self.material
    }

    /// Parameter value, keys compared ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.material.child(key).and_then(KeyValues::value)
    }

    /// Every leaf parameter in file order.
    pub fn data(&self) -> impl Iterator<Item = (&str, &str)> {
        self.material
            .children()
            .iter()
            .filter_map(|c| Some((c.key.as_str(), c.value()?)))
    }

    pub fn is_supported_shader(&self) -> bool {
        SUPPORTED_SHADERS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&self.shader))
    }

    /// `$basetexture`, or `$iris` for eyes.
    pub fn base_texture(&self) -> Result<&str, VMTError> {
        if !self.is_supported_shader() {
            return Err(VMTError::UnsupportedShader(self.shader.clone()));
        }
        let texture = self
            .get("$basetexture")
            .or_else(|| self.get("$iris"))
            .ok_or(VMTError::MissingBaseTexture)?;
        if texture.trim().is_empty() {
            return Err(VMTError::EmptyBaseTexture);
        }
        Ok(texture)
    }

    /// `materials/<base texture>.vtf`, with forward slashes.
    pub fn base_texture_path(&self) -> Result<String, VMTError> {
        let texture = self.base_texture()?.trim().replace('\\', "/");
        let texture = texture.trim_start_matches('/');
        let has_ext = texture
            .get(texture.len().saturating_sub(4)..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".vtf"));
        Ok(if has_ext {
            format!("materials/{}", texture)
        } else {
            format!("materials/{}.vtf", texture)
        })
    }

    /// Whether the base texture alpha should be discarded, as it masks something else.
    pub fn ignore_alpha(&self) -> bool {
        ALPHA_MASK_PARAMS
            .iter()
            .any(|key| self.get(key).is_some_and(is_true))
            || self.material.child("$iris").is_some()
    }
}

/// Decode the base texture of the material at `vmt_path`.
pub fn read_material_texture(
    fs: &dyn VFileProvider,
    vmt_path: &str,
    name: &str,
) -> Result<Texture, VMTError> {
    let vmt = VMT::load(fs, vmt_path)?;
    let texture_path = vmt.base_texture_path()?;
    log::debug!("{} uses {}", vmt_path, texture_path);

    let vtf = VTF::read(fs.open(&texture_path)?.data)?;
    let image = vtf.decode_rgba(0, 0, 0)?;
    Ok(Texture::from_rgba(name, image, vmt.ignore_alpha()))
}

/// Like [`read_material_texture`], but any failure gives [`Texture::placeholder`].
pub fn load_texture_or_placeholder(
    fs: &dyn VFileProvider,
    vmt_path: &str,
    name: &str,
) -> Texture {
    match read_material_texture(fs, vmt_path, name) {
        Ok(texture) => texture,
        Err(e) => {
            log::warn!("{}: {}, using placeholder", vmt_path, e);
            Texture::placeholder(name)
        }
    }
}
