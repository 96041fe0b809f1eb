use bytemuck::{Pod, Zeroable};

pub const VTF_SIGNATURE: [u8; 4] = *b"VTF\0";

/// Fields common to every 7.x header, 63 bytes.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Zeroable, Pod)]
pub struct VTFHeader {
    pub signature: [u8; 4],
    pub version: [u32; 2],
    /// Whole header, including the 7.3+ resource directory
    pub header_size: u32,
    pub width: u16,
    pub height: u16,
    pub flags: u32,
    pub frames: u16,
    /// 0xFFFF in old cube maps that carry no sphere map
    pub first_frame: u16,
    padding0: [u8; 4],
    pub reflectivity: [f32; 3],
    padding1: [u8; 4],
    pub bumpmap_scale: f32,
    pub high_res_image_format: i32,
    pub mipmap_count: u8,
    pub low_res_image_format: i32,
    pub low_res_image_width: u8,
    pub low_res_image_height: u8,
}

/// Follows [`VTFHeader`] from 7.2.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Zeroable, Pod)]
pub struct VTFHeader72 {
    pub depth: u16,
}

/// Follows [`VTFHeader`] from 7.3, the resource directory starts right after it.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Zeroable, Pod)]
pub struct VTFHeader73 {
    pub depth: u16,
    padding2: [u8; 3],
    pub num_resources: u32,
    padding3: [u8; 8],
}

pub const RESOURCE_LOW_RES: [u8; 3] = [0x01, 0, 0];
pub const RESOURCE_HIGH_RES: [u8; 3] = [0x30, 0, 0];
/// The entry has no data chunk, `offset` holds the value itself
pub const RESOURCE_NO_DATA: u8 = 0x2;

/// One entry of the 7.3+ resource directory. Other known tags are
/// `0x10` (particle sheet), `CRC`, `LOD`, `TSO` and `KVD`.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, Zeroable, Pod)]
pub struct ResourceEntryInfo {
    pub tag: [u8; 3],
    pub flags: u8,
    pub offset: u32,
}

impl ResourceEntryInfo {
    pub fn has_data(&self) -> bool {
        self.flags & RESOURCE_NO_DATA == 0
    }
}
