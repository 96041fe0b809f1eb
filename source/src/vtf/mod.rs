// Valve Texture File

pub mod consts;
mod dxt;
pub mod header;

use std::fmt;

use flagset::FlagSet;
use num_traits::FromPrimitive;
use thiserror::Error;

use crate::binaries::{BinaryReader, ReadError};

use self::{
    consts::{ImageFormat, VtfFlags},
    header::{
        ResourceEntryInfo, VTFHeader, VTFHeader72, VTFHeader73, RESOURCE_HIGH_RES,
        RESOURCE_LOW_RES, VTF_SIGNATURE,
    },
};
pub use dxt::{decompress_dxt1, decompress_dxt3, decompress_dxt5};

/// First minor version without the extra sphere map face in cube maps
const MIN_NO_SPHERE_MAP: u32 = 5;

#[derive(Debug, Error)]
pub enum VTFError {
    #[error("bad vtf signature {0:?}")]
    Signature([u8; 4]),
    #[error("unsupported vtf version {0}.{1}, expected 7.0 to 7.5")]
    Version(u32, u32),
    #[error("unsupported image format {0}")]
    UnsupportedFormat(String),
    #[error("invalid vtf: {0}")]
    Format(String),
    #[error("{what} {index} out of range of {count}")]
    OutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },
    #[error("no {0} image resource")]
    MissingResource(&'static str),
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Tightly packed RGBA8 pixels, rows top to bottom.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

pub struct VTF {
    data: Vec<u8>,
    pub header: VTFHeader,
    depth: u16,
    resources: Vec<ResourceEntryInfo>,
}

impl fmt::Debug for VTF {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".vtf: {:?}", self.header)?;
        write!(f, " depth {} resources {:?}", self.depth, self.resources)
    }
}

/// Bytes needed for a `width` x `height` x `depth` image in `format`.
pub fn image_size(
    width: usize,
    height: usize,
    depth: usize,
    format: ImageFormat,
) -> Result<usize, VTFError> {
    format
        .image_size(width, height, depth)
        .ok_or_else(|| VTFError::UnsupportedFormat(format!("{:?}", format)))
}

fn image_format(id: i32) -> Result<ImageFormat, VTFError> {
    ImageFormat::from_i32(id).ok_or_else(|| VTFError::UnsupportedFormat(format!("id {id}")))
}

fn expand<const N: usize>(bytes: &[u8], pixel: impl Fn(&[u8]) -> [u8; 4]) -> Vec<u8> {
    bytes.chunks_exact(N).flat_map(pixel).collect()
}

/// Convert one image of `format` to RGBA8.
pub fn convert_to_rgba(
    format: ImageFormat,
    bytes: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<u8>, VTFError> {
    Ok(match format {
        ImageFormat::RGBA8888 => bytes.to_vec(),
        ImageFormat::BGRA8888 => expand::<4>(bytes, |p| [p[2], p[1], p[0], p[3]]),
        ImageFormat::ABGR8888 => expand::<4>(bytes, |p| [p[3], p[2], p[1], p[0]]),
        ImageFormat::ARGB8888 => expand::<4>(bytes, |p| [p[1], p[2], p[3], p[0]]),
        ImageFormat::BGRX8888 => expand::<4>(bytes, |p| [p[2], p[1], p[0], 0xFF]),
        ImageFormat::RGB888 | ImageFormat::RGB888BLUESCREEN => {
            expand::<3>(bytes, |p| [p[0], p[1], p[2], 0xFF])
        }
        ImageFormat::BGR888 | ImageFormat::BGR888BLUESCREEN => {
            expand::<3>(bytes, |p| [p[2], p[1], p[0], 0xFF])
        }
        ImageFormat::I8 => expand::<1>(bytes, |p| [p[0], p[0], p[0], 0xFF]),
        ImageFormat::DXT1 | ImageFormat::DXT1ONEBITALPHA => {
            decompress_dxt1(bytes, width, height)?
        }
        ImageFormat::DXT3 => decompress_dxt3(bytes, width, height)?,
        ImageFormat::DXT5 => decompress_dxt5(bytes, width, height)?,
        other => return Err(VTFError::UnsupportedFormat(format!("{:?}", other))),
    })
}

impl VTF {
    pub fn read(data: Vec<u8>) -> Result<Self, VTFError> {
        let (header, depth, resources) = {
            let mut reader = BinaryReader::new(&data);
            let header: VTFHeader = reader.read()?;

            let signature = header.signature;
            if signature != VTF_SIGNATURE {
                return Err(VTFError::Signature(signature));
            }
            let [major, minor] = header.version;
            if major != 7 || minor > 5 {
                return Err(VTFError::Version(major, minor));
            }

            match minor {
                0 | 1 => (header, 1, Vec::new()),
                2 => (header, reader.read::<VTFHeader72>()?.depth, Vec::new()),
                _ => {
                    let h73: VTFHeader73 = reader.read()?;
                    let resources = reader.read_array(h73.num_resources as usize)?;
                    (header, h73.depth, resources)
                }
            }
        };

        log::trace!("{:?} depth {} resources {:?}", header, depth, resources);

        Ok(Self {
            data,
            header,
            depth,
            resources,
        })
    }

    pub fn version(&self) -> (u32, u32) {
        let [major, minor] = self.header.version;
        (major, minor)
    }

    pub fn width(&self) -> usize {
        self.header.width as usize
    }

    pub fn height(&self) -> usize {
        self.header.height as usize
    }

    /// 1 for 2D textures and anything older than 7.2
    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    pub fn frames(&self) -> usize {
        self.header.frames as usize
    }

    pub fn mip_count(&self) -> usize {
        self.header.mipmap_count as usize
    }

    pub fn flags(&self) -> FlagSet<VtfFlags> {
        FlagSet::new_truncated(self.header.flags)
    }

    pub fn high_res_format(&self) -> Result<ImageFormat, VTFError> {
        image_format(self.header.high_res_image_format)
    }

    pub fn low_res_format(&self) -> Result<ImageFormat, VTFError> {
        image_format(self.header.low_res_image_format)
    }

    pub fn resources(&self) -> &[ResourceEntryInfo] {
        &self.resources
    }

    /// 1 unless this is a cube map. Cube maps before 7.5 carry a seventh sphere map face
    /// unless `first_frame` is 0xFFFF.
    pub fn face_count(&self) -> usize {
        if !self.flags().contains(VtfFlags::ENVMAP) {
            return 1;
        }
        let (_, minor) = self.version();
        if self.header.first_frame != 0xFFFF && minor < MIN_NO_SPHERE_MAP {
            7
        } else {
            6
        }
    }

    /// Width, height and depth of mip `level`, never below 1.
    pub fn mip_dimensions(&self, level: usize) -> (usize, usize, usize) {
        let shrink = |size: usize| size.checked_shr(level as u32).unwrap_or(0).max(1);
        (
            shrink(self.width()),
            shrink(self.height()),
            shrink(self.depth()),
        )
    }

    fn find_resource(&self, tag: [u8; 3]) -> Option<&ResourceEntryInfo> {
        self.resources
            .iter()
            .find(|r| r.tag == tag && r.has_data())
    }

    fn low_res_size(&self) -> Result<usize, VTFError> {
        match self.low_res_format()? {
            ImageFormat::NONE => Ok(0),
            format => image_size(
                self.header.low_res_image_width as usize,
                self.header.low_res_image_height as usize,
                1,
                format,
            ),
        }
    }

    /// File offset of the high resolution image block.
    pub fn high_res_offset(&self) -> Result<usize, VTFError> {
        if self.version() >= (7, 3) {
            self.find_resource(RESOURCE_HIGH_RES)
                .map(|r| r.offset as usize)
                .ok_or(VTFError::MissingResource("high res"))
        } else {
            Ok(self.header.header_size as usize + self.low_res_size()?)
        }
    }

    /// File offset of the thumbnail.
    pub fn low_res_offset(&self) -> Result<usize, VTFError> {
        if self.version() >= (7, 3) {
            self.find_resource(RESOURCE_LOW_RES)
                .map(|r| r.offset as usize)
                .ok_or(VTFError::MissingResource("low res"))
        } else {
            Ok(self.header.header_size as usize)
        }
    }

    /// Offset of one image inside the high resolution block.
    ///
    /// Mips are stored smallest first, each holding every frame, each frame every face,
    /// each face every depth slice.
    pub fn compute_sub_image_offset(
        &self,
        frame: usize,
        face: usize,
        slice: usize,
        mip: usize,
    ) -> Result<usize, VTFError> {
        let frames = self.frames();
        let faces = self.face_count();
        let mips = self.mip_count();
        if frames == 0 || mips == 0 || self.depth() == 0 {
            return Err(VTFError::Format(format!(
                "{frames} frames, {mips} mips and depth {}",
                self.depth()
            )));
        }
        let check = |what, index, count| {
            if index < count {
                Ok(())
            } else {
                Err(VTFError::OutOfRange { what, index, count })
            }
        };
        check("frame", frame, frames)?;
        check("face", face, faces)?;
        check("mip", mip, mips)?;
        let (_, _, mip_depth) = self.mip_dimensions(mip);
        check("depth slice", slice, mip_depth)?;

        let format = self.high_res_format()?;
        let whole_mip = |level| {
            let (w, h, d) = self.mip_dimensions(level);
            image_size(w, h, d, format)
        };

        let mut offset = 0;
        for level in (mip + 1..mips).rev() {
            offset += whole_mip(level)? * frames * faces;
        }
        let (w, h, _) = self.mip_dimensions(mip);
        offset += whole_mip(mip)? * (frame * faces + face);
        offset += image_size(w, h, 1, format)? * slice;
        Ok(offset)
    }

    fn decode_at(
        &self,
        offset: usize,
        width: usize,
        height: usize,
        format: ImageFormat,
    ) -> Result<RgbaImage, VTFError> {
        let len = image_size(width, height, 1, format)?;
        let bytes = offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                VTFError::Format(format!(
                    "{len} bytes of {:?} at {offset} exceed file of {} bytes",
                    format,
                    self.data.len()
                ))
            })?;
        Ok(RgbaImage {
            width,
            height,
            data: convert_to_rgba(format, bytes, width, height)?,
        })
    }

    /// Decode the first depth slice of one frame, face and mip level to RGBA8.
    pub fn decode_rgba(
        &self,
        frame: usize,
        face: usize,
        mip: usize,
    ) -> Result<RgbaImage, VTFError> {
        let format = self.high_res_format()?;
        let offset =
            self.high_res_offset()? + self.compute_sub_image_offset(frame, face, 0, mip)?;
        let (width, height, _) = self.mip_dimensions(mip);
        self.decode_at(offset, width, height, format)
    }

    /// Decode the thumbnail, usually a tiny DXT1 image.
    pub fn decode_low_res(&self) -> Result<RgbaImage, VTFError> {
        let format = self.low_res_format()?;
        if format == ImageFormat::NONE {
            return Err(VTFError::MissingResource("low res"));
        }
        self.decode_at(
            self.low_res_offset()?,
            self.header.low_res_image_width as usize,
            self.header.low_res_image_height as usize,
            format,
        )
    }
}
