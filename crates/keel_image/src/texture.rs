use bitflags::bitflags;

use keel_asset::{BlobCodec, BlobReader, BlobWriter, CacheError, glob_match};

/// Scalar type of a single texture channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureType {
    U8,
    U16,
    F32,
}

impl TextureType {
    /// Size of one channel value in bytes.
    pub fn size(self) -> usize {
        match self {
            TextureType::U8 => 1,
            TextureType::U16 => 2,
            TextureType::F32 => 4,
        }
    }
}

/// Storage format of a texture: the cross product of the channel scalar types
/// with one / four channels.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureFormat {
    U8R,
    U8Rgba,
    U16R,
    U16Rgba,
    F32R,
    F32Rgba,
}

impl TextureFormat {
    /// Pick the storage format for a channel count: single channel sources
    /// stay single channel, everything else is widened to rgba.
    pub fn pick(ty: TextureType, channels: u32) -> Self {
        match (ty, channels <= 1) {
            (TextureType::U8, true) => TextureFormat::U8R,
            (TextureType::U8, false) => TextureFormat::U8Rgba,
            (TextureType::U16, true) => TextureFormat::U16R,
            (TextureType::U16, false) => TextureFormat::U16Rgba,
            (TextureType::F32, true) => TextureFormat::F32R,
            (TextureType::F32, false) => TextureFormat::F32Rgba,
        }
    }

    pub fn channels(self) -> u32 {
        match self {
            TextureFormat::U8R | TextureFormat::U16R | TextureFormat::F32R => 1,
            TextureFormat::U8Rgba | TextureFormat::U16Rgba | TextureFormat::F32Rgba => 4,
        }
    }

    pub fn pixel_type(self) -> TextureType {
        match self {
            TextureFormat::U8R | TextureFormat::U8Rgba => TextureType::U8,
            TextureFormat::U16R | TextureFormat::U16Rgba => TextureType::U16,
            TextureFormat::F32R | TextureFormat::F32Rgba => TextureType::F32,
        }
    }

    /// Size of one pixel in bytes.
    pub fn stride(self) -> usize {
        self.pixel_type().size() * self.channels() as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureFormat::U8R => "u8-r",
            TextureFormat::U8Rgba => "u8-rgba",
            TextureFormat::U16R => "u16-r",
            TextureFormat::U16Rgba => "u16-rgba",
            TextureFormat::F32R => "f32-r",
            TextureFormat::F32Rgba => "f32-rgba",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureFlags: u32 {
        /// Color channels are stored in srgb encoding and are linearized on
        /// sampling. Requires at least three source channels.
        const SRGB = 1 << 0;
        /// At least one pixel has a non-opaque alpha value; set automatically
        /// during creation.
        const ALPHA = 1 << 1;
        const GENERATE_MIPS = 1 << 2;
        const CUBE_MAP = 1 << 3;
        const NORMAL_MAP = 1 << 4;
        /// Keep the texture uncompressed when packing.
        const LOSSLESS = 1 << 5;
    }
}

/// Linear color value sampled from a texture.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self {
            r: a.r + (b.r - a.r) * t,
            g: a.g + (b.g - a.g) * t,
            b: a.b + (b.b - a.b) * t,
            a: a.a + (b.a - a.a) * t,
        }
    }

    pub fn bilerp(c1: Self, c2: Self, c3: Self, c4: Self, tx: f32, ty: f32) -> Self {
        Self::lerp(Self::lerp(c1, c2, tx), Self::lerp(c3, c4, tx), ty)
    }
}

/// Number of pixels in a single mip level.
pub fn mip_pixel_count(width: u32, height: u32, layers: u32, mip: u32) -> usize {
    let mip_width = (width >> mip).max(1) as usize;
    let mip_height = (height >> mip).max(1) as usize;
    mip_width * mip_height * layers as usize
}

/// Total number of pixels across all mip levels.
pub fn pixel_count(width: u32, height: u32, layers: u32, mips: u32) -> usize {
    (0..mips)
        .map(|mip| mip_pixel_count(width, height, layers, mip))
        .sum()
}

/// A texture in one of the canonical storage formats; the product of every
/// image decoder in the pipeline.
#[derive(Debug, PartialEq)]
pub struct Texture {
    pub format: TextureFormat,
    pub flags: TextureFlags,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub src_mip_levels: u32,
    pixels: Box<[u8]>,
}

impl Texture {
    /// Build a texture from raw pixel data.
    ///
    /// The input is `width * height * layers` pixels per mip level of
    /// `channels` values each (host byte order for u16 / f32), in
    /// mip -> layer -> row order. Channels are normalized to the storage
    /// format following the usual rgba conversion rules: missing color
    /// channels fill with zero, a missing alpha channel fills with the type
    /// maximum.
    ///
    /// Panics when the srgb flag is requested with fewer than three source
    /// channels.
    pub fn create(
        input: &[u8],
        width: u32,
        height: u32,
        channels: u32,
        layers: u32,
        mips: u32,
        ty: TextureType,
        mut flags: TextureFlags,
    ) -> Self {
        assert!(width > 0 && height > 0 && channels > 0 && layers > 0 && mips > 0);
        assert!(
            !flags.contains(TextureFlags::SRGB) || channels >= 3,
            "srgb requires at least 3 channels"
        );
        let count = pixel_count(width, height, layers, mips);
        assert_eq!(input.len(), count * channels as usize * ty.size());

        if channels == 4 && has_alpha(input, count, ty) {
            flags |= TextureFlags::ALPHA;
        }

        let format = TextureFormat::pick(ty, channels);
        let mut pixels = vec![0_u8; count * format.stride()].into_boxed_slice();
        match ty {
            TextureType::U8 => copy_pixels_u8(&mut pixels, input, format.channels(), channels),
            TextureType::U16 => copy_pixels_u16(&mut pixels, input, format.channels(), channels),
            TextureType::F32 => copy_pixels_f32(&mut pixels, input, format.channels(), channels),
        }

        Self {
            format,
            flags,
            width,
            height,
            layers,
            src_mip_levels: mips,
            pixels,
        }
    }

    /// Size in bytes of a single mip level (across all layers).
    pub fn mip_size(&self, mip: u32) -> usize {
        debug_assert!(mip < self.src_mip_levels);
        mip_pixel_count(self.width, self.height, self.layers, mip) * self.format.stride()
    }

    /// Total size of the pixel data in bytes.
    pub fn data_size(&self) -> usize {
        pixel_count(self.width, self.height, self.layers, self.src_mip_levels)
            * self.format.stride()
    }

    /// The raw pixel data.
    pub fn data(&self) -> &[u8] {
        &self.pixels
    }

    /// Lookup the color of the pixel at `index` within mip level zero of the
    /// given layer. Srgb encoded channels are linearized.
    pub fn at(&self, layer: u32, index: usize) -> Color {
        let stride = self.format.stride();
        let layer_size = self.width as usize * self.height as usize * stride;
        let base = layer_size * layer as usize + index * stride;
        let texel = &self.pixels[base..base + stride];

        const U8_MAX_INV: f32 = 1.0 / u8::MAX as f32;
        const U16_MAX_INV: f32 = 1.0 / u16::MAX as f32;

        let u16_at = |i: usize| u16::from_ne_bytes([texel[i * 2], texel[i * 2 + 1]]);
        let f32_at = |i: usize| {
            f32::from_ne_bytes([
                texel[i * 4],
                texel[i * 4 + 1],
                texel[i * 4 + 2],
                texel[i * 4 + 3],
            ])
        };

        match self.format {
            TextureFormat::U8R => {
                let r = if self.flags.contains(TextureFlags::SRGB) {
                    SRGB_TO_FLOAT[texel[0] as usize]
                } else {
                    texel[0] as f32 * U8_MAX_INV
                };
                Color::new(r, 0.0, 0.0, 1.0)
            }
            TextureFormat::U8Rgba => {
                if self.flags.contains(TextureFlags::SRGB) {
                    Color::new(
                        SRGB_TO_FLOAT[texel[0] as usize],
                        SRGB_TO_FLOAT[texel[1] as usize],
                        SRGB_TO_FLOAT[texel[2] as usize],
                        texel[3] as f32 * U8_MAX_INV,
                    )
                } else {
                    Color::new(
                        texel[0] as f32 * U8_MAX_INV,
                        texel[1] as f32 * U8_MAX_INV,
                        texel[2] as f32 * U8_MAX_INV,
                        texel[3] as f32 * U8_MAX_INV,
                    )
                }
            }
            TextureFormat::U16R => Color::new(u16_at(0) as f32 * U16_MAX_INV, 0.0, 0.0, 1.0),
            TextureFormat::U16Rgba => Color::new(
                u16_at(0) as f32 * U16_MAX_INV,
                u16_at(1) as f32 * U16_MAX_INV,
                u16_at(2) as f32 * U16_MAX_INV,
                u16_at(3) as f32 * U16_MAX_INV,
            ),
            TextureFormat::F32R => Color::new(f32_at(0), 0.0, 0.0, 1.0),
            TextureFormat::F32Rgba => Color::new(f32_at(0), f32_at(1), f32_at(2), f32_at(3)),
        }
    }

    /// Bilinear sample at normalized coordinates in `[0, 1]`.
    /// Always samples mip level zero.
    pub fn sample(&self, x: f32, y: f32, layer: u32) -> Color {
        debug_assert!((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
        debug_assert!(layer < self.layers);

        let width = self.width as usize;
        let height = self.height as usize;
        let x = x * (width - 1) as f32;
        let y = y * (height - 1) as f32;

        // Clamp the corners so that corner2 stays within the texture.
        let corner1x = (x.floor() as usize).min(width.saturating_sub(2));
        let corner1y = (y.floor() as usize).min(height.saturating_sub(2));
        let corner2x = (corner1x + 1).min(width - 1);
        let corner2y = (corner1y + 1).min(height - 1);

        let c1 = self.at(layer, corner1y * width + corner1x);
        let c2 = self.at(layer, corner1y * width + corner2x);
        let c3 = self.at(layer, corner2y * width + corner1x);
        let c4 = self.at(layer, corner2y * width + corner2x);

        Color::bilerp(c1, c2, c3, c4, x - corner1x as f32, y - corner1y as f32)
    }

    /// Nearest-neighbor sample at normalized coordinates in `[0, 1]`.
    pub fn sample_nearest(&self, x: f32, y: f32, layer: u32) -> Color {
        debug_assert!((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
        debug_assert!(layer < self.layers);

        let x = (x * (self.width - 1) as f32).round() as usize;
        let y = (y * (self.height - 1) as f32).round() as usize;
        self.at(layer, y * self.width as usize + x)
    }
}

/// Heuristic for detecting normal-map sources from their id.
pub fn is_normalmap(id: &str) -> bool {
    const PATTERNS: &[&str] = &["*_nrm.*", "*_normal.*", "*_nrm_*.*", "*_normal_*.*"];
    PATTERNS
        .iter()
        .any(|pattern| glob_match(pattern, id, true))
}

fn has_alpha(input: &[u8], count: usize, ty: TextureType) -> bool {
    // Alpha threshold below which an f32 texel counts as translucent.
    const F32_OPAQUE: f32 = 1.0 - f32::EPSILON;

    match ty {
        TextureType::U8 => (0..count).any(|i| input[i * 4 + 3] != u8::MAX),
        TextureType::U16 => (0..count).any(|i| {
            u16::from_ne_bytes([input[i * 8 + 6], input[i * 8 + 7]]) != u16::MAX
        }),
        TextureType::F32 => (0..count).any(|i| {
            let offset = i * 16 + 12;
            f32::from_ne_bytes([
                input[offset],
                input[offset + 1],
                input[offset + 2],
                input[offset + 3],
            ]) < F32_OPAQUE
        }),
    }
}

fn copy_pixels_u8(out: &mut [u8], input: &[u8], out_channels: u32, in_channels: u32) {
    let (out_channels, in_channels) = (out_channels as usize, in_channels as usize);
    let count = out.len() / out_channels;
    for i in 0..count {
        let src = &input[i * in_channels..];
        let dst = &mut out[i * out_channels..];
        dst[0] = src[0];
        if out_channels == 4 {
            dst[1] = if in_channels >= 2 { src[1] } else { 0 };
            dst[2] = if in_channels >= 3 { src[2] } else { 0 };
            dst[3] = if in_channels >= 4 { src[3] } else { u8::MAX };
        }
    }
}

fn copy_pixels_u16(out: &mut [u8], input: &[u8], out_channels: u32, in_channels: u32) {
    let (out_channels, in_channels) = (out_channels as usize, in_channels as usize);
    let count = out.len() / (out_channels * 2);
    let read = |i: usize| u16::from_ne_bytes([input[i * 2], input[i * 2 + 1]]);
    let write = |slot: &mut [u8], value: u16| slot[..2].copy_from_slice(&value.to_ne_bytes());
    for i in 0..count {
        let src = i * in_channels;
        let dst = &mut out[i * out_channels * 2..];
        write(&mut dst[0..], read(src));
        if out_channels == 4 {
            let g = if in_channels >= 2 { read(src + 1) } else { 0 };
            let b = if in_channels >= 3 { read(src + 2) } else { 0 };
            let a = if in_channels >= 4 { read(src + 3) } else { u16::MAX };
            write(&mut dst[2..], g);
            write(&mut dst[4..], b);
            write(&mut dst[6..], a);
        }
    }
}

fn copy_pixels_f32(out: &mut [u8], input: &[u8], out_channels: u32, in_channels: u32) {
    let (out_channels, in_channels) = (out_channels as usize, in_channels as usize);
    let count = out.len() / (out_channels * 4);
    let read = |i: usize| {
        f32::from_ne_bytes([
            input[i * 4],
            input[i * 4 + 1],
            input[i * 4 + 2],
            input[i * 4 + 3],
        ])
    };
    let write = |slot: &mut [u8], value: f32| slot[..4].copy_from_slice(&value.to_ne_bytes());
    for i in 0..count {
        let src = i * in_channels;
        let dst = &mut out[i * out_channels * 4..];
        write(&mut dst[0..], read(src));
        if out_channels == 4 {
            let g = if in_channels >= 2 { read(src + 1) } else { 0.0 };
            let b = if in_channels >= 3 { read(src + 2) } else { 0.0 };
            let a = if in_channels >= 4 { read(src + 3) } else { 1.0 };
            write(&mut dst[4..], g);
            write(&mut dst[8..], b);
            write(&mut dst[12..], a);
        }
    }
}

impl BlobCodec for Texture {
    const TYPE_NAME: &'static str = "Texture";
    const LAYOUT: &'static str =
        "Texture{format:enum,flags:u32,width:u32,height:u32,layers:u32,srcMipLevels:u32,pixels:bytes}";

    fn encode(&self, w: &mut BlobWriter) {
        w.enum_tag(self.format as u32);
        w.u32(self.flags.bits());
        w.u32(self.width);
        w.u32(self.height);
        w.u32(self.layers);
        w.u32(self.src_mip_levels);
        w.bytes(&self.pixels);
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let format = match r.enum_tag()? {
            0 => TextureFormat::U8R,
            1 => TextureFormat::U8Rgba,
            2 => TextureFormat::U16R,
            3 => TextureFormat::U16Rgba,
            4 => TextureFormat::F32R,
            5 => TextureFormat::F32Rgba,
            tag => return Err(CacheError::UnionTagUnknown(tag)),
        };
        let flags = TextureFlags::from_bits_truncate(r.u32()?);
        let width = r.u32()?;
        let height = r.u32()?;
        let layers = r.u32()?;
        let src_mip_levels = r.u32()?;
        let pixels: Box<[u8]> = r.bytes()?.to_vec().into_boxed_slice();
        if width == 0 || height == 0 || layers == 0 || src_mip_levels == 0 {
            return Err(CacheError::Malformed);
        }
        let expected = pixel_count(width, height, layers, src_mip_levels) * format.stride();
        if pixels.len() != expected {
            return Err(CacheError::Malformed);
        }
        Ok(Self {
            format,
            flags,
            width,
            height,
            layers,
            src_mip_levels,
            pixels,
        })
    }
}

/// Srgb to linear conversion table for 8 bit channel values.
pub const SRGB_TO_FLOAT: [f32; 256] = [
    0.0, 0.000303527, 0.000607054, 0.00091058103,
    0.001214108, 0.001517635, 0.0018211621, 0.002124689,
    0.002428216, 0.002731743, 0.00303527, 0.0033465356,
    0.003676507, 0.004024717, 0.004391442, 0.0047769533,
    0.005181517, 0.0056053917, 0.0060488326, 0.006512091,
    0.00699541, 0.0074990317, 0.008023192, 0.008568125,
    0.009134057, 0.009721218, 0.010329823, 0.010960094,
    0.011612245, 0.012286487, 0.012983031, 0.013702081,
    0.014443844, 0.015208514, 0.015996292, 0.016807375,
    0.017641952, 0.018500218, 0.019382361, 0.020288562,
    0.02121901, 0.022173883, 0.023153365, 0.02415763,
    0.025186857, 0.026241222, 0.027320892, 0.028426038,
    0.029556843, 0.03071345, 0.03189604, 0.033104774,
    0.03433981, 0.035601325, 0.036889452, 0.038204376,
    0.039546248, 0.04091521, 0.042311423, 0.043735042,
    0.045186214, 0.046665095, 0.048171833, 0.049706575,
    0.051269468, 0.052860655, 0.05448028, 0.056128494,
    0.057805434, 0.05951124, 0.06124607, 0.06301003,
    0.06480328, 0.06662595, 0.06847818, 0.07036011,
    0.07227186, 0.07421358, 0.07618539, 0.07818743,
    0.08021983, 0.082282715, 0.084376216, 0.086500466,
    0.088655606, 0.09084173, 0.09305898, 0.095307484,
    0.09758736, 0.09989874, 0.10224175, 0.10461649,
    0.10702311, 0.10946172, 0.111932434, 0.11443538,
    0.116970696, 0.11953845, 0.12213881, 0.12477186,
    0.12743773, 0.13013652, 0.13286836, 0.13563336,
    0.13843165, 0.14126332, 0.1441285, 0.1470273,
    0.14995982, 0.15292618, 0.1559265, 0.15896086,
    0.16202943, 0.16513224, 0.16826946, 0.17144115,
    0.17464745, 0.17788847, 0.1811643, 0.18447503,
    0.1878208, 0.19120172, 0.19461787, 0.19806935,
    0.2015563, 0.20507877, 0.2086369, 0.21223079,
    0.21586053, 0.21952623, 0.22322798, 0.22696589,
    0.23074007, 0.23455065, 0.23839766, 0.2422812,
    0.2462014, 0.25015837, 0.25415218, 0.2581829,
    0.26225072, 0.26635566, 0.27049786, 0.27467737,
    0.27889434, 0.2831488, 0.2874409, 0.2917707,
    0.29613832, 0.30054384, 0.30498737, 0.30946895,
    0.31398875, 0.31854683, 0.32314324, 0.32777813,
    0.33245158, 0.33716366, 0.34191445, 0.3467041,
    0.3515327, 0.35640025, 0.36130688, 0.3662527,
    0.37123778, 0.37626222, 0.3813261, 0.38642952,
    0.39157256, 0.3967553, 0.40197787, 0.4072403,
    0.4125427, 0.41788515, 0.42326775, 0.42869055,
    0.4341537, 0.43965724, 0.44520125, 0.45078585,
    0.45641106, 0.46207705, 0.46778384, 0.47353154,
    0.47932023, 0.48514998, 0.4910209, 0.49693304,
    0.5028866, 0.50888145, 0.5149178, 0.5209957,
    0.52711535, 0.5332766, 0.5394797, 0.5457247,
    0.5520116, 0.5583406, 0.5647117, 0.57112503,
    0.57758063, 0.5840786, 0.590619, 0.597202,
    0.60382754, 0.61049575, 0.61720675, 0.62396055,
    0.63075733, 0.637597, 0.6444799, 0.6514058,
    0.65837497, 0.66538745, 0.67244333, 0.6795426,
    0.68668544, 0.69387203, 0.70110214, 0.70837605,
    0.7156938, 0.72305536, 0.730461, 0.7379107,
    0.7454045, 0.75294244, 0.76052475, 0.7681514,
    0.77582246, 0.78353804, 0.79129815, 0.79910296,
    0.8069525, 0.8148468, 0.822786, 0.8307701,
    0.83879924, 0.84687346, 0.8549928, 0.8631574,
    0.87136734, 0.8796226, 0.8879232, 0.89626956,
    0.90466136, 0.913099, 0.92158204, 0.93011117,
    0.9386859, 0.9473069, 0.9559735, 0.9646866,
    0.9734455, 0.98225087, 0.9911022, 1.0,];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_arithmetic() {
        assert_eq!(mip_pixel_count(8, 4, 1, 0), 32);
        assert_eq!(mip_pixel_count(8, 4, 1, 1), 8);
        assert_eq!(mip_pixel_count(8, 4, 1, 3), 1); // Height clamps to one.
        assert_eq!(mip_pixel_count(8, 4, 2, 0), 64);
        assert_eq!(pixel_count(8, 4, 1, 4), 32 + 8 + 2 + 1);
    }

    #[test]
    fn create_widens_rgb_to_rgba() {
        let tex = Texture::create(
            &[10, 20, 30, 40, 50, 60],
            2,
            1,
            3,
            1,
            1,
            TextureType::U8,
            TextureFlags::empty(),
        );
        assert_eq!(tex.format, TextureFormat::U8Rgba);
        assert_eq!(tex.data(), &[10, 20, 30, 255, 40, 50, 60, 255]);
        assert!(!tex.flags.contains(TextureFlags::ALPHA));
    }

    #[test]
    fn create_detects_translucent_alpha() {
        let opaque = Texture::create(
            &[1, 2, 3, 255],
            1,
            1,
            4,
            1,
            1,
            TextureType::U8,
            TextureFlags::empty(),
        );
        assert!(!opaque.flags.contains(TextureFlags::ALPHA));

        let translucent = Texture::create(
            &[1, 2, 3, 254],
            1,
            1,
            4,
            1,
            1,
            TextureType::U8,
            TextureFlags::empty(),
        );
        assert!(translucent.flags.contains(TextureFlags::ALPHA));
    }

    #[test]
    #[should_panic(expected = "srgb requires at least 3 channels")]
    fn srgb_requires_three_channels() {
        Texture::create(
            &[1, 2],
            2,
            1,
            1,
            1,
            1,
            TextureType::U8,
            TextureFlags::SRGB,
        );
    }

    #[test]
    fn at_linearizes_srgb_via_lut() {
        let tex = Texture::create(
            &[128, 64, 255],
            1,
            1,
            3,
            1,
            1,
            TextureType::U8,
            TextureFlags::SRGB,
        );
        let color = tex.at(0, 0);
        assert_eq!(color.r, SRGB_TO_FLOAT[128]);
        assert_eq!(color.g, SRGB_TO_FLOAT[64]);
        assert_eq!(color.b, SRGB_TO_FLOAT[255]);
        assert_eq!(color.a, 1.0);
    }

    #[test]
    fn sample_corners_match_at() {
        let pixels: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        let tex = Texture::create(
            &pixels,
            4,
            4,
            4,
            1,
            1,
            TextureType::U8,
            TextureFlags::empty(),
        );

        let eps = 1.0e-6_f32;
        let c00 = tex.sample(0.0, 0.0, 0);
        let a00 = tex.at(0, 0);
        assert!((c00.r - a00.r).abs() < eps && (c00.a - a00.a).abs() < eps);

        let c11 = tex.sample(1.0, 1.0, 0);
        let a11 = tex.at(0, 4 * 4 - 1);
        assert!((c11.r - a11.r).abs() < eps && (c11.g - a11.g).abs() < eps);

        let n = tex.sample_nearest(1.0, 0.0, 0);
        let a = tex.at(0, 3);
        assert_eq!(n, a);
    }

    #[test]
    fn f32_values_pass_through() {
        let input: Vec<u8> = [0.25_f32, 0.5, 0.75, 0.5]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let tex = Texture::create(
            &input,
            1,
            1,
            4,
            1,
            1,
            TextureType::F32,
            TextureFlags::empty(),
        );
        assert!(tex.flags.contains(TextureFlags::ALPHA));
        let color = tex.at(0, 0);
        assert_eq!((color.r, color.g, color.b, color.a), (0.25, 0.5, 0.75, 0.5));
    }

    #[test]
    fn normalmap_heuristic() {
        assert!(is_normalmap("wall_nrm.tga"));
        assert!(is_normalmap("wall_NORMAL.tga"));
        assert!(is_normalmap("wall_nrm_2k.tga"));
        assert!(!is_normalmap("wall_color.tga"));
        assert!(!is_normalmap("nrm.tga"));
    }

    #[test]
    fn codec_round_trips() {
        let tex = Texture::create(
            &[1, 2, 3, 200, 5, 6, 7, 255],
            2,
            1,
            4,
            1,
            1,
            TextureType::U8,
            TextureFlags::GENERATE_MIPS,
        );
        let blob = keel_asset::write_blob(&tex);
        let decoded: Texture = keel_asset::read_blob(&blob).unwrap();
        assert_eq!(decoded, tex);
    }
}
