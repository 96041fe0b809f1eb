pub use crate::vfile::{VDirFileSystem, VFile, VFileError, VFileProvider, VFileSystem, VLayeredFileSystem};
pub use crate::vpath::{VGlobalPath, VPath, VSplitPath};
