use flagset::flags;
use num_derive::FromPrimitive;

#[derive(Copy, Clone, FromPrimitive, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ImageFormat {
    NONE = -1,
    RGBA8888 = 0,
    ABGR8888,
    RGB888,
    BGR888,
    RGB565,
    I8,
    IA88,
    P8,
    A8,
    RGB888BLUESCREEN,
    BGR888BLUESCREEN,
    ARGB8888,
    BGRA8888,
    DXT1,
    DXT3,
    DXT5,
    BGRX8888,
    BGR565,
    BGRX5551,
    BGRA4444,
    DXT1ONEBITALPHA,
    BGRA5551,
    UV88,
    UVWQ8888,
    RGBA16161616F,
    RGBA16161616,
    UVLX8888,
    R32F,
    RGB323232F,
    RGBA32323232F,
    NV_DST16,
    NV_DST24,
    NV_INTZ,
    NV_RAWZ,
    ATI_DST16,
    ATI_DST24,
    NV_NULL,
    ATI2N,
    ATI1N,
}

impl ImageFormat {
    /// Bytes of one 4x4 block, `None` for per-pixel formats.
    pub fn block_size(&self) -> Option<usize> {
        match self {
            ImageFormat::DXT1 | ImageFormat::DXT1ONEBITALPHA | ImageFormat::ATI1N => Some(8),
            ImageFormat::DXT3 | ImageFormat::DXT5 | ImageFormat::ATI2N => Some(16),
            _ => None,
        }
    }

    pub fn is_block_compressed(&self) -> bool {
        self.block_size().is_some()
    }

    /// Zero for block compressed formats and `NONE`.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            ImageFormat::NONE
            | ImageFormat::DXT1
            | ImageFormat::DXT1ONEBITALPHA
            | ImageFormat::DXT3
            | ImageFormat::DXT5
            | ImageFormat::ATI1N
            | ImageFormat::ATI2N => 0,
            ImageFormat::I8 | ImageFormat::P8 | ImageFormat::A8 => 1,
            ImageFormat::RGB565
            | ImageFormat::IA88
            | ImageFormat::BGR565
            | ImageFormat::BGRX5551
            | ImageFormat::BGRA4444
            | ImageFormat::BGRA5551
            | ImageFormat::UV88
            | ImageFormat::NV_DST16
            | ImageFormat::ATI_DST16 => 2,
            ImageFormat::RGB888
            | ImageFormat::BGR888
            | ImageFormat::RGB888BLUESCREEN
            | ImageFormat::BGR888BLUESCREEN
            | ImageFormat::NV_DST24
            | ImageFormat::ATI_DST24 => 3,
            ImageFormat::RGBA8888
            | ImageFormat::ABGR8888
            | ImageFormat::ARGB8888
            | ImageFormat::BGRA8888
            | ImageFormat::BGRX8888
            | ImageFormat::UVWQ8888
            | ImageFormat::UVLX8888
            | ImageFormat::R32F
            | ImageFormat::NV_INTZ
            | ImageFormat::NV_RAWZ
            | ImageFormat::NV_NULL => 4,
            ImageFormat::RGBA16161616F | ImageFormat::RGBA16161616 => 8,
            ImageFormat::RGB323232F => 12,
            ImageFormat::RGBA32323232F => 16,
        }
    }

    /// Bytes needed for a `width` x `height` x `depth` image. Block formats round up to whole blocks.
    pub fn image_size(&self, width: usize, height: usize, depth: usize) -> Option<usize> {
        match self.block_size() {
            Some(block) => Some(width.div_ceil(4) * height.div_ceil(4) * block * depth),
            None => match self.bytes_per_pixel() {
                0 => None,
                bpp => Some(width * height * depth * bpp),
            },
        }
    }
}

flags! {
    #[repr(u32)]
    pub enum VtfFlags: u32 {
        POINTSAMPLE = 0x00000001,
        TRILINEAR = 0x00000002,
        CLAMPS = 0x00000004,
        CLAMPT = 0x00000008,
        ANISOTROPIC = 0x00000010,
        HINTDXT5 = 0x00000020,
        SRGB = 0x00000040,
        NORMAL = 0x00000080,
        NOMIP = 0x00000100,
        NOLOD = 0x00000200,
        ALLMIPS = 0x00000400,
        PROCEDURAL = 0x00000800,
        ONEBITALPHA = 0x00001000,
        EIGHTBITALPHA = 0x00002000,
        // cube map, 6 or 7 faces
        ENVMAP = 0x00004000,
        RENDERTARGET = 0x00008000,
        DEPTHRENDERTARGET = 0x00010000,
        NODEBUGOVERRIDE = 0x00020000,
        SINGLECOPY = 0x00040000,
        PRESRGB = 0x00080000,
        NODEPTHBUFFER = 0x00800000,
        CLAMPU = 0x02000000,
        VERTEXTEXTURE = 0x04000000,
        SSBUMP = 0x08000000,
        BORDER = 0x20000000,
    }
}
