//! 4x4 block decompression for DXT1, DXT3 and DXT5 into RGBA8.

use super::VTFError;

const DXT1_BLOCK: usize = 8;
const DXT35_BLOCK: usize = 16;

fn check_input(
    name: &'static str,
    data: &[u8],
    width: usize,
    height: usize,
    block: usize,
) -> Result<(), VTFError> {
    if width == 0 || height == 0 {
        return Err(VTFError::Format(format!("{name} image of {width}x{height}")));
    }
    let needed = width.div_ceil(4) * height.div_ceil(4) * block;
    if data.len() < needed {
        return Err(VTFError::Format(format!(
            "{name} data of {} bytes is shorter than {needed}",
            data.len()
        )));
    }
    Ok(())
}

fn rgb565(c: u16) -> [u8; 3] {
    [
        ((c >> 11) as u8 & 0x1F) << 3,
        ((c >> 5) as u8 & 0x3F) << 2,
        (c as u8 & 0x1F) << 3,
    ]
}

fn mix(a: [u8; 3], b: [u8; 3], wa: u16, wb: u16, round: u16, div: u16) -> [u8; 3] {
    [0, 1, 2].map(|i| ((wa * a[i] as u16 + wb * b[i] as u16 + round) / div) as u8)
}

/// Palette of a colour block. `three_colour` allows the DXT1 mode with a transparent fourth entry.
fn colour_palette(block: &[u8], three_colour: bool) -> [[u8; 4]; 4] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let (a, b) = (rgb565(c0), rgb565(c1));

    let opaque = |c: [u8; 3]| [c[0], c[1], c[2], 0xFF];
    if c0 > c1 || !three_colour {
        [
            opaque(a),
            opaque(b),
            opaque(mix(a, b, 2, 1, 1, 3)),
            opaque(mix(a, b, 1, 2, 1, 3)),
        ]
    } else {
        [opaque(a), opaque(b), opaque(mix(a, b, 1, 1, 0, 2)), [0, 0, 0, 0]]
    }
}

/// Calls `put(x, y, texel)` for every texel of a block that falls inside the image.
fn for_each_texel(
    width: usize,
    height: usize,
    bx: usize,
    by: usize,
    mut put: impl FnMut(usize, usize, usize),
) {
    for j in 0..4 {
        for i in 0..4 {
            let (x, y) = (bx + i, by + j);
            if x < width && y < height {
                put(x, y, j * 4 + i);
            }
        }
    }
}

fn decode_colour(
    out: &mut [u8],
    block: &[u8],
    three_colour: bool,
    (width, height, bx, by): (usize, usize, usize, usize),
) {
    let palette = colour_palette(block, three_colour);
    let selectors = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    for_each_texel(width, height, bx, by, |x, y, k| {
        let colour = palette[((selectors >> (k * 2)) & 0x3) as usize];
        let o = (y * width + x) * 4;
        out[o..o + 4].copy_from_slice(&colour);
    });
}

fn decompress(
    name: &'static str,
    data: &[u8],
    width: usize,
    height: usize,
    block_size: usize,
    mut decode_block: impl FnMut(&mut [u8], &[u8], (usize, usize, usize, usize)),
) -> Result<Vec<u8>, VTFError> {
    check_input(name, data, width, height, block_size)?;
    let mut out = vec![0; width * height * 4];
    let mut blocks = data.chunks_exact(block_size);
    for by in (0..height).step_by(4) {
        for bx in (0..width).step_by(4) {
            let block = blocks
                .next()
                .ok_or_else(|| VTFError::Format(format!("{name} data ended early")))?;
            decode_block(&mut out, block, (width, height, bx, by));
        }
    }
    Ok(out)
}

pub fn decompress_dxt1(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>, VTFError> {
    decompress("DXT1", data, width, height, DXT1_BLOCK, |out, block, at| {
        decode_colour(out, block, true, at)
    })
}

/// Explicit 4 bit alpha, expanded to 8 bits by `n * 17`.
pub fn decompress_dxt3(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>, VTFError> {
    decompress("DXT3", data, width, height, DXT35_BLOCK, |out, block, at| {
        let (alpha, colour) = block.split_at(8);
        decode_colour(out, colour, false, at);

        let (width, height, bx, by) = at;
        let bits = u64::from_le_bytes([
            alpha[0], alpha[1], alpha[2], alpha[3], alpha[4], alpha[5], alpha[6], alpha[7],
        ]);
        for_each_texel(width, height, bx, by, |x, y, k| {
            let n = ((bits >> (k * 4)) & 0xF) as u8;
            out[(y * width + x) * 4 + 3] = n * 17;
        });
    })
}

fn alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (a, b) = (a0 as u16, a1 as u16);
    let mut palette = [a0, a1, 0, 0, 0, 0, 0, 0];
    if a0 > a1 {
        for i in 1..7 {
            palette[i + 1] = (((7 - i as u16) * a + i as u16 * b + 3) / 7) as u8;
        }
    } else {
        for i in 1..5 {
            palette[i + 1] = (((5 - i as u16) * a + i as u16 * b + 2) / 5) as u8;
        }
        palette[6] = 0x00;
        palette[7] = 0xFF;
    }
    palette
}

/// Interpolated alpha, 3 bit indices into an 8 entry gradient.
pub fn decompress_dxt5(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>, VTFError> {
    decompress("DXT5", data, width, height, DXT35_BLOCK, |out, block, at| {
        let (alpha, colour) = block.split_at(8);
        decode_colour(out, colour, false, at);

        let palette = alpha_palette(alpha[0], alpha[1]);
        let indices = u64::from_le_bytes([
            alpha[2], alpha[3], alpha[4], alpha[5], alpha[6], alpha[7], 0, 0,
        ]);
        let (width, height, bx, by) = at;
        for_each_texel(width, height, bx, by, |x, y, k| {
            out[(y * width + x) * 4 + 3] = palette[((indices >> (k * 3)) & 0x7) as usize];
        });
    })
}

#[cfg(test)]
mod dxt_tests {
    use super::*;

    const RED: u16 = 0xF800;
    const BLUE: u16 = 0x001F;

    fn colour_block(c0: u16, c1: u16, selectors: u32) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&c0.to_le_bytes());
        block.extend_from_slice(&c1.to_le_bytes());
        block.extend_from_slice(&selectors.to_le_bytes());
        block
    }

    fn pixel(out: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
        let o = (y * width + x) * 4;
        [out[o], out[o + 1], out[o + 2], out[o + 3]]
    }

    #[test]
    fn test_dxt1_four_colour_block() {
        // row 0 selects 0,1,2,3, everything else selects 0
        let block = colour_block(RED, BLUE, 0b11_10_01_00);
        let out = decompress_dxt1(&block, 4, 4).unwrap();

        let row: Vec<_> = (0..4).map(|x| pixel(&out, 4, x, 0)).collect();
        assert_eq!(row[0], [248, 0, 0, 255]);
        assert_eq!(row[1], [0, 0, 248, 255]);
        assert_eq!(row[2], [165, 0, 83, 255]);
        assert_eq!(row[3], [83, 0, 165, 255]);
        for a in 0..4 {
            for b in a + 1..4 {
                assert_ne!(row[a], row[b]);
            }
        }
        assert_eq!(pixel(&out, 4, 3, 3), [248, 0, 0, 255]);
    }

    #[test]
    fn test_dxt1_three_colour_block_is_transparent() {
        let block = colour_block(BLUE, RED, 0b11_10_01_00);
        let out = decompress_dxt1(&block, 4, 4).unwrap();

        assert_eq!(pixel(&out, 4, 0, 0)[3], 255);
        assert_eq!(pixel(&out, 4, 1, 0)[3], 255);
        assert_eq!(pixel(&out, 4, 2, 0), [124, 0, 124, 255]);
        assert_eq!(pixel(&out, 4, 3, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_dxt1_clips_partial_blocks() {
        let block = colour_block(RED, BLUE, 0);
        let out = decompress_dxt1(&block, 2, 3).unwrap();
        assert_eq!(out.len(), 2 * 3 * 4);
        assert_eq!(pixel(&out, 2, 1, 2), [248, 0, 0, 255]);
    }

    #[test]
    fn test_short_input_is_rejected() {
        assert!(decompress_dxt1(&[0; 8], 8, 4).is_err());
        assert!(decompress_dxt5(&[0; 8], 4, 4).is_err());
        assert!(decompress_dxt3(&[0; 16], 0, 4).is_err());
    }

    #[test]
    fn test_dxt3_explicit_alpha() {
        let mut block = vec![0u8; 8];
        // texel 0 = 0xF, texel 1 = 0x1, texel 2 = 0x8
        block[0] = 0x1F;
        block[1] = 0x08;
        block.extend(colour_block(RED, BLUE, 0));

        let out = decompress_dxt3(&block, 4, 4).unwrap();
        assert_eq!(pixel(&out, 4, 0, 0), [248, 0, 0, 255]);
        assert_eq!(pixel(&out, 4, 1, 0)[3], 17);
        assert_eq!(pixel(&out, 4, 2, 0)[3], 136);
        assert_eq!(pixel(&out, 4, 3, 0)[3], 0);
    }

    #[test]
    fn test_dxt5_alpha_gradients() {
        assert_eq!(alpha_palette(255, 0), [255, 0, 219, 182, 146, 109, 73, 36]);
        assert_eq!(alpha_palette(0, 255), [0, 255, 51, 102, 153, 204, 0, 255]);

        // texel 0 index 1, texel 1 index 7, rest index 0
        let mut block = vec![200, 100, 0b00_111_001, 0, 0, 0, 0, 0];
        block.extend(colour_block(RED, BLUE, 0));
        let out = decompress_dxt5(&block, 4, 4).unwrap();
        assert_eq!(pixel(&out, 4, 0, 0)[3], 100);
        assert_eq!(pixel(&out, 4, 1, 0)[3], alpha_palette(200, 100)[7]);
        assert_eq!(pixel(&out, 4, 2, 0)[3], 200);
        assert_eq!(pixel(&out, 4, 3, 3)[3], 200);
    }
}
