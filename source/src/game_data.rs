use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Instant,
};

use common::vfile::{VDirFileSystem, VLayeredFileSystem};
use ini::{Ini, Properties};
use thiserror::Error;

use crate::{
    studio::{StudioError, StudioMesh, StudioModel, StudioOptions},
    texture::Texture,
    vmt,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing [{0}] section")]
    MissingSection(String),
    #[error("missing {key:?} in [{section}]")]
    MissingKey { section: String, key: &'static str },
    #[error("{key} = {value:?} in [{section}] is not a number")]
    InvalidNumber {
        section: String,
        key: &'static str,
        value: String,
    },
    #[error(transparent)]
    Load(#[from] ini::Error),
}

/// A game install: where its content lives and how its models should be posed.
///
/// ```ini
/// [launch]
/// game = hl2
/// root = C:/Steam/steamapps/common/Half-Life 2
///
/// [hl2]
/// name = hl2
/// search = custom
/// search = .
///
/// [studio]
/// body = 0
/// frame = 0
/// vtx = dx90
/// ```
pub struct GameData {
    path: PathBuf,
    search_paths: Vec<PathBuf>,
    fs: VLayeredFileSystem,
    options: StudioOptions,
}

fn section<'a>(ini: &'a Ini, name: &str) -> Result<&'a Properties, ConfigError> {
    ini.section(Some(name))
        .ok_or_else(|| ConfigError::MissingSection(name.to_owned()))
}

fn key<'a>(props: &'a Properties, section: &str, key: &'static str) -> Result<&'a str, ConfigError> {
    props.get(key).ok_or_else(|| ConfigError::MissingKey {
        section: section.to_owned(),
        key,
    })
}

fn number<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    props
        .get(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                section: section.to_owned(),
                key,
                value: value.to_owned(),
            })
        })
        .transpose()
}

impl GameData {
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let now = Instant::now();

        let launch = section(ini, "launch")?;
        let game_name = key(launch, "launch", "game")?;
        let game = section(ini, game_name)?;

        let mut path = PathBuf::from(key(launch, "launch", "root")?);
        path.push(key(game, game_name, "name")?);

        let mut search_paths: Vec<PathBuf> = game.get_all("search").map(|s| path.join(s)).collect();
        if search_paths.is_empty() {
            search_paths.push(path.clone());
        }

        let mut fs = VLayeredFileSystem::new();
        for dir in &search_paths {
            log::debug!("search path {:?}", dir);
            fs.push(VDirFileSystem::new(dir));
        }

        let mut options = StudioOptions::default();
        if let Some(studio) = ini.section(Some("studio")) {
            options.body = number(studio, "studio", "body")?.unwrap_or(0);
            options.frame = number(studio, "studio", "frame")?.unwrap_or(0);
            options.lod = number(studio, "studio", "lod")?;
            if let Some(vtx) = studio.get("vtx") {
                options.vtx_suffix = vtx.trim().to_owned();
            }
        }

        log::info!(
            "loaded game data for {} with {} search paths in {:?}",
            game_name,
            search_paths.len(),
            now.elapsed()
        );
        Ok(Self {
            path,
            search_paths,
            fs,
            options,
        })
    }

    pub fn load(ini_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_ini(&Ini::load_from_file(ini_path)?)
    }

    /// `<root>/<name>`
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn fs(&self) -> &VLayeredFileSystem {
        &self.fs
    }

    pub fn options(&self) -> &StudioOptions {
        &self.options
    }

    pub fn load_model(&self, path: &str) -> Result<StudioModel, StudioError> {
        StudioModel::load(&self.fs, path, &self.options.vtx_suffix)
    }

    /// Load a model and pose it with the configured body, frame and lod.
    pub fn load_mesh(&self, path: &str) -> Result<StudioMesh, StudioError> {
        self.load_model(path)?.reconstruct_with(&self.options)
    }

    pub fn load_texture(&self, vmt_path: &str, name: &str) -> Texture {
        vmt::load_texture_or_placeholder(&self.fs, vmt_path, name)
    }
}
