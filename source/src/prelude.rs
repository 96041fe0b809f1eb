pub use crate::binaries::{BinaryReader, ReadError};
pub use crate::game_data::{ConfigError, GameData};
pub use crate::meshes::{Bounds, MaterialGroup, StudioVertex};
pub use crate::studio::{StudioError, StudioMesh, StudioModel, StudioOptions, MDL, VTX, VVD};
pub use crate::texture::{Texture, TextureKind};
pub use crate::vmt::{keyvalues::KeyValues, VMTError, VMT};
pub use crate::vtf::{RgbaImage, VTFError, VTF};
