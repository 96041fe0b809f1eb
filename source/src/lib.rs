pub mod binaries;
pub mod game_data;
pub mod meshes;
pub mod prelude;
pub mod studio;
pub mod texture;
pub mod vmt;
pub mod vtf;
