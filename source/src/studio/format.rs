//! Ident and version allow lists for the three studio files.
//! Only versions known to load correctly are accepted.

use crate::binaries::{BinaryReader, ReadError};

pub const MDL_IDENT: [u8; 4] = *b"IDST";
pub const VVD_IDENT: [u8; 4] = *b"IDSV";

pub const MDL_VERSIONS: &[i32] = &[44, 45, 48];
pub const VVD_VERSIONS: &[i32] = &[4];
pub const VTX_VERSIONS: &[i32] = &[7];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FormatId {
    pub ident: [u8; 4],
    pub version: i32,
}

/// Leading ident and version of an mdl or vvd buffer.
pub fn identify(data: &[u8]) -> Result<FormatId, ReadError> {
    let mut reader = BinaryReader::new(data);
    let ident = reader.read::<[u8; 4]>()?;
    let version = reader.read::<i32>()?;
    Ok(FormatId { ident, version })
}

/// Strip files carry no ident, only the leading version.
pub fn identify_vtx(data: &[u8]) -> Result<i32, ReadError> {
    BinaryReader::new(data).read::<i32>()
}

pub fn is_mdl_ident(ident: [u8; 4]) -> bool {
    ident == MDL_IDENT
}

pub fn is_mdl_version(version: i32) -> bool {
    MDL_VERSIONS.contains(&version)
}

pub fn is_vvd_ident(ident: [u8; 4]) -> bool {
    ident == VVD_IDENT
}

pub fn is_vvd_version(version: i32) -> bool {
    VVD_VERSIONS.contains(&version)
}

pub fn is_vtx_version(version: i32) -> bool {
    VTX_VERSIONS.contains(&version)
}

pub fn is_mdl(id: FormatId) -> bool {
    is_mdl_ident(id.ident) && is_mdl_version(id.version)
}

pub fn is_vvd(id: FormatId) -> bool {
    is_vvd_ident(id.ident) && is_vvd_version(id.version)
}
