//! Texture block compression (BC1, aka S3TC DXT1).
//!
//! Only the two-interpolated-color mode is used: `color0` is kept greater
//! than `color1` and the two middle palette entries are derived from the
//! endpoints. The punch-through alpha mode is not supported.

/// One rgba texel of an uncompressed block.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Color8888 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Packed 5-6-5 color endpoint.
pub type Color565 = u16;

/// An uncompressed 4x4 pixel block, row major.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Bc0Block {
    pub colors: [Color8888; 16],
}

impl Default for Bc0Block {
    fn default() -> Self {
        Self {
            colors: [Color8888::default(); 16],
        }
    }
}

/// An encoded BC1 block: two 5-6-5 endpoints plus two index bits per texel.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Bc1Block {
    pub color0: Color565,
    pub color1: Color565,
    pub indices: u32,
}

impl Bc1Block {
    /// Serialized form: endpoints then indices, little-endian.
    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0_u8; 8];
        out[0..2].copy_from_slice(&self.color0.to_le_bytes());
        out[2..4].copy_from_slice(&self.color1.to_le_bytes());
        out[4..8].copy_from_slice(&self.indices.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            color0: u16::from_le_bytes([bytes[0], bytes[1]]),
            color1: u16::from_le_bytes([bytes[2], bytes[3]]),
            indices: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

fn color_to_565(c: Color8888) -> Color565 {
    let r = (((c.r >> 3) & 0x1F) as u16) << 11;
    let g = (((c.g >> 2) & 0x3F) as u16) << 5;
    let b = ((c.b >> 3) & 0x1F) as u16;
    r | g | b
}

fn color_from_565(c: Color565) -> Color8888 {
    Color8888 {
        r: ((c & 0xF800) >> 8) as u8,
        g: ((c & 0x07E0) >> 3) as u8,
        b: ((c & 0x001F) << 3) as u8,
        a: 255,
    }
}

/// Quantize a color the same way converting it to 5-6-5 and back would.
fn color_quantize_565(c: Color8888) -> Color8888 {
    Color8888 {
        r: (c.r & 0xF8) | (c.r >> 5),
        g: (c.g & 0xFC) | (c.g >> 6),
        b: (c.b & 0xF8) | (c.b >> 5),
        a: 255,
    }
}

fn color_distance_sqr(a: Color8888, b: Color8888) -> u32 {
    let dr = i32::from(b.r) - i32::from(a.r);
    let dg = i32::from(b.g) - i32::from(a.g);
    let db = i32::from(b.b) - i32::from(a.b);
    (dr * dr + dg * dg + db * db) as u32
}

/// Pick the reference color that is closest in rgb space.
fn color_pick(refs: &[Color8888; 4], c: Color8888) -> u8 {
    let mut best_dist_sqr = u32::MAX;
    let mut best_index = 0;
    for (i, reference) in refs.iter().enumerate() {
        let dist_sqr = color_distance_sqr(*reference, c);
        if dist_sqr < best_dist_sqr {
            best_dist_sqr = dist_sqr;
            best_index = i as u8;
        }
    }
    best_index
}

/// Slightly inset the endpoint line. More error at the extreme edges of the
/// block, less error in between.
fn line_inset(start: &mut Color8888, end: &mut Color8888) {
    let inset_r = (i32::from(end.r) - i32::from(start.r)) / 16;
    let inset_g = (i32::from(end.g) - i32::from(start.g)) / 16;
    let inset_b = (i32::from(end.b) - i32::from(start.b)) / 16;

    start.r = (i32::from(start.r) + inset_r).clamp(0, 255) as u8;
    start.g = (i32::from(start.g) + inset_g).clamp(0, 255) as u8;
    start.b = (i32::from(start.b) + inset_b).clamp(0, 255) as u8;

    end.r = (i32::from(end.r) - inset_r).clamp(0, 255) as u8;
    end.g = (i32::from(end.g) - inset_g).clamp(0, 255) as u8;
    end.b = (i32::from(end.b) - inset_b).clamp(0, 255) as u8;
}

struct BlockAnalysis {
    min: Color8888,
    max: Color8888,
}

fn block_analyze(block: &Bc0Block) -> BlockAnalysis {
    let mut min = block.colors[0];
    let mut max = block.colors[0];
    for color in &block.colors[1..] {
        min.r = min.r.min(color.r);
        min.g = min.g.min(color.g);
        min.b = min.b.min(color.b);
        max.r = max.r.max(color.r);
        max.g = max.g.max(color.g);
        max.b = max.b.max(color.b);
    }
    BlockAnalysis { min, max }
}

/// Compute the endpoints of a line through rgb space approximating the block.
fn block_line_fit(block: &Bc0Block) -> (Color8888, Color8888) {
    let analysis = block_analyze(block);
    let mut c0 = analysis.max;
    let mut c1 = analysis.min;
    line_inset(&mut c1, &mut c0);
    (c0, c1)
}

/// Compute the two interpolated palette entries between the endpoints.
fn line_interpolate(c0: Color8888, c1: Color8888) -> (Color8888, Color8888) {
    let c2 = Color8888 {
        r: ((u32::from(c0.r) * 2 + u32::from(c1.r)) / 3) as u8,
        g: ((u32::from(c0.g) * 2 + u32::from(c1.g)) / 3) as u8,
        b: ((u32::from(c0.b) * 2 + u32::from(c1.b)) / 3) as u8,
        a: 255,
    };
    let c3 = Color8888 {
        r: ((u32::from(c0.r) + u32::from(c1.r) * 2) / 3) as u8,
        g: ((u32::from(c0.g) + u32::from(c1.g) * 2) / 3) as u8,
        b: ((u32::from(c0.b) + u32::from(c1.b) * 2) / 3) as u8,
        a: 255,
    };
    (c2, c3)
}

/// Extract a single 4x4 block from a wider image, row major.
/// The image width has to be a multiple of 4.
pub fn bc0_extract(pixels: &[Color8888], width: u32, out: &mut Bc0Block) {
    assert!(width % 4 == 0, "width has to be a multiple of 4");
    for y in 0..4 {
        for x in 0..4 {
            out.colors[y * 4 + x] = pixels[y * width as usize + x];
        }
    }
}

/// Write a single 4x4 block back into a wider image, row major.
/// The image width has to be a multiple of 4.
pub fn bc0_scanout(block: &Bc0Block, width: u32, out: &mut [Color8888]) {
    assert!(width % 4 == 0, "width has to be a multiple of 4");
    for y in 0..4 {
        for x in 0..4 {
            out[y * width as usize + x] = block.colors[y * 4 + x];
        }
    }
}

/// Encode a single 4x4 block.
pub fn bc1_encode(block: &Bc0Block) -> Bc1Block {
    let (color0, color1) = block_line_fit(block);

    let mut refs = [Color8888::default(); 4];
    refs[0] = color_quantize_565(color0);
    refs[1] = color_quantize_565(color1);
    (refs[2], refs[3]) = line_interpolate(refs[0], refs[1]);

    let mut out = Bc1Block {
        color0: color_to_565(color0),
        color1: color_to_565(color1),
        indices: 0,
    };
    for (i, color) in block.colors.iter().enumerate() {
        let index = color_pick(&refs, *color);
        out.indices |= u32::from(index) << (i * 2);
    }
    out
}

/// Decode a single 4x4 block. Assumes the two-interpolated-color mode (so
/// `color0 >= color1`); alpha is always opaque.
pub fn bc1_decode(block: &Bc1Block) -> Bc0Block {
    let mut refs = [Color8888::default(); 4];
    refs[0] = color_from_565(block.color0);
    refs[1] = color_from_565(block.color1);
    (refs[2], refs[3]) = line_interpolate(refs[0], refs[1]);

    let mut out = Bc0Block::default();
    for (i, color) in out.colors.iter_mut().enumerate() {
        let index = (block.indices >> (i * 2)) & 0b11;
        *color = refs[index as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: i32 = 15;
    const BLACK: Color8888 = Color8888 {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };
    const WHITE: Color8888 = Color8888 {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    fn block_filled(color: Color8888) -> Bc0Block {
        Bc0Block {
            colors: [color; 16],
        }
    }

    fn block_checker(a: Color8888, b: Color8888) -> Bc0Block {
        let mut block = Bc0Block::default();
        for y in 0..4 {
            for x in 0..4 {
                block.colors[y * 4 + x] = if (x & 1) == (y & 1) { a } else { b };
            }
        }
        block
    }

    fn assert_color_close(a: Color8888, b: Color8888) {
        assert!(
            (i32::from(a.r) - i32::from(b.r)).abs() <= THRESHOLD
                && (i32::from(a.g) - i32::from(b.g)).abs() <= THRESHOLD
                && (i32::from(a.b) - i32::from(b.b)).abs() <= THRESHOLD
                && (i32::from(a.a) - i32::from(b.a)).abs() <= THRESHOLD,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn encodes_a_black_block() {
        let encoded = bc1_encode(&block_filled(BLACK));
        let decoded = bc1_decode(&encoded);
        for color in decoded.colors {
            assert_color_close(color, BLACK);
        }
    }

    #[test]
    fn encodes_a_white_block() {
        let encoded = bc1_encode(&block_filled(WHITE));
        let decoded = bc1_decode(&encoded);
        for color in decoded.colors {
            assert_color_close(color, WHITE);
        }
        // Both endpoints sit at (or within one quantization step of) white.
        assert!(encoded.color0 == 0xFFFF || color_from_565(encoded.color0).r >= 0xF0);
        assert!(encoded.color1 == 0xFFFF || color_from_565(encoded.color1).r >= 0xF0);
    }

    #[test]
    fn encodes_a_checker_block() {
        let block = block_checker(BLACK, WHITE);
        let decoded = bc1_decode(&bc1_encode(&block));
        for (decoded, original) in decoded.colors.iter().zip(block.colors.iter()) {
            assert_color_close(*decoded, *original);
        }
        // Every cell of the same input color decodes to the same palette
        // entry, and the two cell colors stay distinct.
        assert_eq!(decoded.colors[0], decoded.colors[2]);
        assert_eq!(decoded.colors[1], decoded.colors[3]);
        assert_ne!(decoded.colors[0], decoded.colors[1]);
    }

    #[test]
    fn encoded_block_is_eight_bytes() {
        let encoded = bc1_encode(&block_checker(BLACK, WHITE));
        let bytes = encoded.to_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(Bc1Block::from_bytes(bytes), encoded);
    }

    #[test]
    fn endpoints_round_trip_through_quantization() {
        let color = Color8888 {
            r: 0xF8,
            g: 0xFC,
            b: 0xF8,
            a: 255,
        };
        assert_eq!(color_from_565(color_to_565(color)), color);
    }

    #[test]
    fn extract_and_scanout_are_inverses() {
        let mut pixels = vec![Color8888::default(); 8 * 4];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            pixel.r = i as u8;
            pixel.a = 255;
        }
        let mut block = Bc0Block::default();
        bc0_extract(&pixels, 8, &mut block);
        assert_eq!(block.colors[0].r, 0);
        assert_eq!(block.colors[4].r, 8); // Second row starts one image-row in.

        let mut out = vec![Color8888::default(); 8 * 4];
        bc0_scanout(&block, 8, &mut out);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out[y * 8 + x], pixels[y * 8 + x]);
            }
        }
    }
}
