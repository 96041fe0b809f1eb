pub mod format;
pub mod math;
pub mod mdl;
pub mod mdl_headers;
pub mod model;
pub mod vtx;
pub mod vvd;

#[cfg(test)]
pub(crate) mod test_fixtures;

use common::vfile::VFileError;
use thiserror::Error;

use crate::binaries::ReadError;

pub use mdl::MDL;
pub use model::{StudioMesh, StudioModel, StudioOptions};
pub use vtx::VTX;
pub use vvd::VVD;

#[derive(Debug, Error)]
pub enum StudioError {
    /// Wrong ident, version or cross file checksum. The files are not a usable set.
    #[error("{0}")]
    Format(String),
    #[error("{what} index {index} out of range for {count} entries")]
    OutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },
    #[error("{0}")]
    Structure(String),
    #[error("{0} not yet supported")]
    Unsupported(&'static str),
    #[error("bone {0} matrix is not invertible")]
    SingularMatrix(usize),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    File(#[from] VFileError),
}

pub(crate) fn check_index(what: &'static str, index: usize, count: i32) -> Result<(), StudioError> {
    let count = count.max(0) as usize;
    if index >= count {
        Err(StudioError::OutOfRange { what, index, count })
    } else {
        Ok(())
    }
}
