use crate::vtf::RgbaImage;

/// How the alpha channel of a [`Texture`] is meant to be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    /// Alpha was a mask (env map, self illumination, ...) and has been forced to 255
    Opaque,
    Masked,
}

/// Decoded RGBA8 texture, ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// Mean colour of all pixels, channels in `0..=1`
    pub average_color: [f32; 4],
    pub data: Vec<u8>,
    pub kind: TextureKind,
}

const MAGENTA: [u8; 4] = [255, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

impl Texture {
    pub fn from_rgba(name: &str, image: RgbaImage, ignore_alpha: bool) -> Self {
        let RgbaImage {
            width,
            height,
            mut data,
        } = image;

        if ignore_alpha {
            for pixel in data.chunks_exact_mut(4) {
                pixel[3] = 0xFF;
            }
        }

        Self {
            name: name.to_owned(),
            width,
            height,
            average_color: average_color(&data),
            data,
            kind: if ignore_alpha {
                TextureKind::Opaque
            } else {
                TextureKind::Masked
            },
        }
    }

    /// 2x2 magenta and black checker, stands in for anything that failed to load.
    pub fn placeholder(name: &str) -> Self {
        let data = [MAGENTA, BLACK, BLACK, MAGENTA].concat();
        Self {
            name: name.to_owned(),
            width: 2,
            height: 2,
            average_color: average_color(&data),
            data,
            kind: TextureKind::Opaque,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        self.data.get(i..i + 4)?.try_into().ok()
    }
}

fn average_color(rgba: &[u8]) -> [f32; 4] {
    let pixels = rgba.len() / 4;
    if pixels == 0 {
        return [0.0; 4];
    }
    let mut sum = [0u64; 4];
    for pixel in rgba.chunks_exact(4) {
        for (total, &c) in sum.iter_mut().zip(pixel) {
            *total += c as u64;
        }
    }
    sum.map(|total| total as f32 / (pixels as f32 * 255.0))
}
