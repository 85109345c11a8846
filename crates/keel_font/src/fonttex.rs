//! Font texture generation: a signed-distance-field glyph atlas plus a
//! character table, generated from one or more font assets and a json
//! definition.
//!
//! Atlas texel values encode the distance to the glyph border:
//! 0 is well into the glyph, 127/128 is exactly on the border and 255 is well
//! outside.

use glam::Vec2;
use serde::Deserialize;
use thiserror::Error;

use keel_asset::{
    AssetBlob, AssetId, AssetLoader, BlobCodec, BlobReader, BlobWriter, CacheError, Load,
    LoadContext, LoadError, LoadTask, TaskState, read_blob,
};
use keel_image::{Texture, TextureFlags, TextureType};

use crate::font::{Font, FontGlyph};

const FONTTEX_MAX_CHARS: usize = 1024;
const FONTTEX_MAX_SIZE: u32 = 1024 * 16;
const FONTTEX_MAX_FONTS: usize = 100;

/// Glyph index used for characters without an outline (such as spaces).
pub const FONTTEX_GLYPH_NONE: u16 = u16::MAX;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontTexError {
    #[error("font texture specifies an invalid font")]
    FontInvalid,
    #[error("source font is missing a glyph for the requested characters")]
    FontGlyphMissing,
    #[error("font texture specifies a non power-of-two size")]
    SizeNonPow2,
    #[error("font texture specifies a size larger than is supported")]
    SizeTooBig,
    #[error("font texture specifies a non power-of-two glyph size")]
    GlyphSizeNonPow2,
    #[error("font texture specifies more fonts than are supported")]
    TooManyFonts,
    #[error("font texture specifies more characters than are supported")]
    TooManyCharacters,
    #[error("font texture requires more glyphs than fit at the requested size")]
    TooManyGlyphs,
    #[error("font texture specifies invalid characters")]
    InvalidCharacters,
}

/// One font referenced by a font-texture definition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FontTexDefFont {
    pub id: String,
    #[serde(default)]
    pub variation: u8,
    #[serde(default)]
    pub y_offset: f32,
    #[serde(default)]
    pub spacing: f32,
    pub characters: String,
}

/// Parsed font-texture definition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FontTexDef {
    pub size: u32,
    pub glyph_size: u32,
    #[serde(default)]
    pub border: u32,
    #[serde(default)]
    pub line_spacing: f32,
    #[serde(default)]
    pub baseline: f32,
    #[serde(default)]
    pub lossless: bool,
    pub fonts: Vec<FontTexDefFont>,
}

/// One character of the atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontTexChar {
    pub cp: u32,
    pub variation: u8,
    /// Atlas cell of the glyph, or [`FONTTEX_GLYPH_NONE`] when the character
    /// has no outline.
    pub glyph_index: u16,
    pub size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub advance: f32,
    /// Size of the sdf border in glyph space.
    pub border: f32,
}

/// The character table of a generated atlas. Characters are sorted on
/// `(codepoint, variation)`; index zero is always the missing-glyph
/// character.
#[derive(Debug, PartialEq)]
pub struct FontTex {
    pub glyphs_per_dim: u32,
    pub line_spacing: f32,
    pub baseline: f32,
    pub characters: Vec<FontTexChar>,
}

impl FontTex {
    /// Find the character for a codepoint: prefers an exact variation match,
    /// falls back to variation zero of the codepoint, and yields the
    /// missing-glyph character for unmapped codepoints.
    pub fn lookup(&self, cp: u32, variation: u8) -> &FontTexChar {
        let mut begin = 0_usize;
        let mut end = self.characters.len();
        let mut matching_cp = None;
        while begin < end {
            let middle = begin + (end - begin) / 2;
            let entry = &self.characters[middle];
            if entry.cp == cp {
                if entry.variation == variation {
                    return entry;
                }
                matching_cp = Some(middle);
            }
            if entry.cp > cp || (entry.cp == cp && entry.variation > variation) {
                end = middle;
            } else {
                begin = middle + 1;
            }
        }
        if let Some(mut index) = matching_cp {
            // The preferred variation is absent; walk back to variation zero.
            while self.characters[index].variation != 0 {
                index -= 1;
            }
            return &self.characters[index];
        }
        // The missing character, guaranteed to exist at index zero.
        &self.characters[0]
    }
}

/// A generated atlas: the character table plus the sdf texture.
#[derive(Debug, PartialEq)]
pub struct FontTexBundle {
    pub fonttex: FontTex,
    pub texture: Texture,
}

impl BlobCodec for FontTexBundle {
    const TYPE_NAME: &'static str = "FontTexBundle";
    const LAYOUT: &'static str = "FontTexBundle{fonttex:{glyphsPerDim:u32,lineSpacing:f32,\
         baseline:f32,chars:[{cp:u32,variation:u8,glyphIndex:u16,size:f32,offsetX:f32,\
         offsetY:f32,advance:f32,border:f32}]},texture:Texture}";

    fn encode(&self, w: &mut BlobWriter) {
        w.u32(self.fonttex.glyphs_per_dim);
        w.f32(self.fonttex.line_spacing);
        w.f32(self.fonttex.baseline);
        w.array(&self.fonttex.characters, |w, c| {
            w.u32(c.cp);
            w.u8(c.variation);
            w.u16(c.glyph_index);
            w.f32(c.size);
            w.f32(c.offset_x);
            w.f32(c.offset_y);
            w.f32(c.advance);
            w.f32(c.border);
        });
        self.texture.encode(w);
    }

    fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
        let glyphs_per_dim = r.u32()?;
        let line_spacing = r.f32()?;
        let baseline = r.f32()?;
        let characters = r.array(|r| {
            Ok(FontTexChar {
                cp: r.u32()?,
                variation: r.u8()?,
                glyph_index: r.u16()?,
                size: r.f32()?,
                offset_x: r.f32()?,
                offset_y: r.f32()?,
                advance: r.f32()?,
                border: r.f32()?,
            })
        })?;
        if characters.is_empty() {
            return Err(CacheError::Malformed);
        }
        Ok(Self {
            fonttex: FontTex {
                glyphs_per_dim,
                line_spacing,
                baseline,
                characters,
            },
            texture: Texture::decode(r)?,
        })
    }
}

/// A definition font resolved to its loaded asset.
struct ResolvedFont<'a> {
    font: &'a Font,
    variation: u8,
    y_offset: f32,
    spacing: f32,
    characters: &'a str,
}

struct InputChar<'a> {
    cp: u32,
    glyph: &'a FontGlyph,
}

fn lookup_chars<'a>(
    font: &'a Font,
    include_missing: bool,
    characters: &str,
) -> Result<Vec<InputChar<'a>>, FontTexError> {
    let mut out = Vec::with_capacity(characters.chars().count() + 1);
    if include_missing {
        out.push(InputChar {
            cp: 0,
            glyph: font.missing(),
        });
    }
    for ch in characters.chars() {
        if out.len() >= FONTTEX_MAX_CHARS {
            return Err(FontTexError::TooManyCharacters);
        }
        if ch == '\0' {
            return Err(FontTexError::InvalidCharacters);
        }
        let glyph = font.lookup(ch as u32);
        if std::ptr::eq(glyph, font.missing()) {
            return Err(FontTexError::FontGlyphMissing);
        }
        out.push(InputChar {
            cp: ch as u32,
            glyph,
        });
    }
    Ok(out)
}

/// Rasterize one glyph into its atlas cell as 8 bit signed distances.
fn generate_glyph(def: &FontTexDef, font: &Font, glyph: &FontGlyph, index: u16, out: &mut [u8]) {
    let glyph_size = def.glyph_size;
    let tex_y = (u32::from(index) * glyph_size / def.size * glyph_size) as usize;
    let tex_x = (u32::from(index) * glyph_size % def.size) as usize;
    debug_assert!(tex_y + glyph_size as usize <= def.size as usize);

    let inv_glyph_size = 1.0 / glyph_size as f32;
    let border = def.border as f32 * inv_glyph_size / glyph.size;
    let inv_border = 1.0 / border;
    let scale = 1.0 + border * 2.0;

    for pixel_y in 0..glyph_size as usize {
        for pixel_x in 0..glyph_size as usize {
            // Map the cell pixel to glyph space, extended by the border on
            // all sides.
            let point = Vec2::new(
                (pixel_x as f32 + 0.5) * inv_glyph_size * scale - border,
                (pixel_y as f32 + 0.5) * inv_glyph_size * scale - border,
            );
            let dist = font.glyph_dist(glyph, point);
            let border_frac = (dist * inv_border).clamp(-1.0, 1.0);
            let value = ((border_frac * 0.5 + 0.5) * 255.999) as u8;

            out[(tex_y + pixel_y) * def.size as usize + tex_x + pixel_x] = value;
        }
    }
}

fn generate_font(
    def: &FontTexDef,
    font: &ResolvedFont,
    include_missing: bool,
    max_glyphs: u32,
    next_glyph_index: &mut u16,
    out_chars: &mut Vec<FontTexChar>,
    out_pixels: &mut [u8],
) -> Result<(), FontTexError> {
    let input_chars = lookup_chars(font.font, include_missing, font.characters)?;

    for input in &input_chars {
        let has_outline = input.glyph.segment_count > 0;
        out_chars.push(FontTexChar {
            cp: input.cp,
            variation: font.variation,
            glyph_index: if has_outline {
                *next_glyph_index
            } else {
                FONTTEX_GLYPH_NONE
            },
            size: input.glyph.size,
            offset_x: input.glyph.offset_x,
            offset_y: input.glyph.offset_y + font.y_offset,
            advance: input.glyph.advance + font.spacing,
            border: def.border as f32 / def.glyph_size as f32,
        });
        if has_outline {
            if u32::from(*next_glyph_index) >= max_glyphs || *next_glyph_index == u16::MAX {
                return Err(FontTexError::TooManyGlyphs);
            }
            generate_glyph(def, font.font, input.glyph, *next_glyph_index, out_pixels);
            *next_glyph_index += 1;
        }
    }
    Ok(())
}

fn generate(def: &FontTexDef, fonts: &[ResolvedFont]) -> Result<FontTexBundle, FontTexError> {
    let size = def.size as usize;
    // Initialize to the maximum distance away from any glyph.
    let mut pixels = vec![0xFF_u8; size * size];
    let mut chars: Vec<FontTexChar> = Vec::with_capacity(128);

    let glyphs_per_dim = def.size / def.glyph_size;
    let max_glyphs = glyphs_per_dim * glyphs_per_dim;
    if max_glyphs == 0 {
        return Err(FontTexError::TooManyGlyphs);
    }

    let mut next_glyph_index: u16 = 0;
    for (i, font) in fonts.iter().enumerate() {
        // The first font also carries the missing-glyph fallback character.
        generate_font(
            def,
            font,
            i == 0,
            max_glyphs,
            &mut next_glyph_index,
            &mut chars,
            &mut pixels,
        )?;
    }

    chars.sort_by_key(|c| (c.cp, c.variation));

    let mut tex_flags = TextureFlags::empty();
    if def.lossless {
        tex_flags |= TextureFlags::LOSSLESS;
    }
    Ok(FontTexBundle {
        fonttex: FontTex {
            glyphs_per_dim,
            line_spacing: def.line_spacing,
            baseline: def.baseline,
            characters: chars,
        },
        texture: Texture::create(
            &pixels,
            def.size,
            def.size,
            1,
            1,
            1,
            TextureType::U8,
            tex_flags,
        ),
    })
}

fn validate_def(def: &FontTexDef) -> Result<(), FontTexError> {
    if !def.size.is_power_of_two() {
        return Err(FontTexError::SizeNonPow2);
    }
    if def.size > FONTTEX_MAX_SIZE {
        return Err(FontTexError::SizeTooBig);
    }
    if !def.glyph_size.is_power_of_two() {
        return Err(FontTexError::GlyphSizeNonPow2);
    }
    if def.fonts.len() > FONTTEX_MAX_FONTS {
        return Err(FontTexError::TooManyFonts);
    }
    Ok(())
}

/// Multi-frame load: font dependencies are acquired one by one and the atlas
/// is generated once every one of them is resident.
struct FontTexLoadTask {
    def: FontTexDef,
    fonts: Vec<Option<AssetId>>,
}

impl FontTexLoadTask {
    fn release_fonts(&self, ctx: &LoadContext) {
        for asset in self.fonts.iter().flatten() {
            ctx.release(*asset);
        }
    }
}

impl LoadTask for FontTexLoadTask {
    fn poll(&mut self, ctx: &mut LoadContext) -> Result<TaskState, LoadError> {
        for i in 0..self.def.fonts.len() {
            if self.fonts[i].is_none() {
                let asset = ctx.lookup(&self.def.fonts[i].id);
                ctx.acquire(asset);
                ctx.register_dep(asset);
                self.fonts[i] = Some(asset);
                return Ok(TaskState::Pending); // Wait for the acquire to take effect.
            }
        }

        let mut failed = false;
        for asset in self.fonts.iter().flatten() {
            if ctx.is_failed(*asset) {
                failed = true;
                break;
            }
            if !ctx.is_loaded(*asset) {
                return Ok(TaskState::Pending);
            }
        }

        let result = if failed {
            Err(FontTexError::FontInvalid)
        } else {
            let mut resolved = Vec::with_capacity(self.fonts.len());
            for (def_font, asset) in self.def.fonts.iter().zip(self.fonts.iter().flatten()) {
                match ctx.get::<Font>(*asset) {
                    Some(font) => resolved.push(ResolvedFont {
                        font,
                        variation: def_font.variation,
                        y_offset: def_font.y_offset,
                        spacing: def_font.spacing,
                        characters: &def_font.characters,
                    }),
                    None => {
                        resolved.clear();
                        break;
                    }
                }
            }
            if resolved.len() == self.fonts.len() {
                generate(&self.def, &resolved)
            } else {
                Err(FontTexError::FontInvalid)
            }
        };

        self.release_fonts(ctx);
        match result {
            Ok(bundle) => {
                ctx.cache(&bundle);
                Ok(TaskState::Done(Box::new(bundle)))
            }
            Err(err) => Err(LoadError::loader(err)),
        }
    }
}

/// Loader for font-texture definitions.
pub struct FontTexLoader;

impl AssetLoader for FontTexLoader {
    fn load(&self, _ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let def: FontTexDef =
            serde_json::from_slice(&blob.data).map_err(LoadError::loader)?;
        validate_def(&def).map_err(LoadError::loader)?;
        Ok(Load::Pending(Box::new(FontTexLoadTask {
            fonts: vec![None; def.fonts.len()],
            def,
        })))
    }
}

/// Loader for binary cached font-texture bundles.
pub struct FontTexBinLoader;

impl AssetLoader for FontTexBinLoader {
    fn load(&self, _ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let bundle: FontTexBundle = read_blob(&blob.data)?;
        Ok(Load::Done(Box::new(bundle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontCodepoint, FontSegment, SegmentKind};

    fn triangle_font() -> Font {
        Font {
            codepoints: vec![
                FontCodepoint {
                    unicode: ' ' as u32,
                    glyph_index: 2,
                },
                FontCodepoint {
                    unicode: 'A' as u32,
                    glyph_index: 1,
                },
            ],
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(0.0, 0.0),
            ],
            segments: vec![
                FontSegment {
                    kind: SegmentKind::Line,
                    point_index: 0,
                },
                FontSegment {
                    kind: SegmentKind::Line,
                    point_index: 1,
                },
                FontSegment {
                    kind: SegmentKind::Line,
                    point_index: 2,
                },
            ],
            glyphs: vec![
                // The missing glyph shares the triangle outline so that it
                // occupies an atlas cell.
                FontGlyph {
                    segment_index: 0,
                    segment_count: 3,
                    size: 1.0,
                    advance: 0.5,
                    ..FontGlyph::default()
                },
                FontGlyph {
                    segment_index: 0,
                    segment_count: 3,
                    size: 1.0,
                    advance: 0.6,
                    ..FontGlyph::default()
                },
                // A space: no outline.
                FontGlyph {
                    advance: 0.25,
                    ..FontGlyph::default()
                },
            ],
        }
    }

    fn def(size: u32, glyph_size: u32, characters: &str) -> (FontTexDef, Font) {
        (
            FontTexDef {
                size,
                glyph_size,
                border: 2,
                line_spacing: 0.1,
                baseline: 0.2,
                lossless: false,
                fonts: vec![FontTexDefFont {
                    id: "font.ttf".into(),
                    variation: 0,
                    y_offset: 0.0,
                    spacing: 0.0,
                    characters: characters.to_owned(),
                }],
            },
            triangle_font(),
        )
    }

    fn resolved<'a>(def: &'a FontTexDef, font: &'a Font) -> Vec<ResolvedFont<'a>> {
        def.fonts
            .iter()
            .map(|f| ResolvedFont {
                font,
                variation: f.variation,
                y_offset: f.y_offset,
                spacing: f.spacing,
                characters: &f.characters,
            })
            .collect()
    }

    #[test]
    fn atlas_layout_and_untouched_cells() {
        let (def, font) = def(64, 32, "A");
        let bundle = generate(&def, &resolved(&def, &font)).unwrap();

        assert_eq!(bundle.fonttex.glyphs_per_dim, 2);
        // The missing glyph plus 'A'.
        assert_eq!(bundle.fonttex.characters.len(), 2);
        assert_eq!(bundle.fonttex.characters[0].cp, 0);
        assert_eq!(bundle.fonttex.characters[0].glyph_index, 0);
        let a = bundle.fonttex.lookup('A' as u32, 0);
        assert_eq!(a.glyph_index, 1);

        // Cells 0 and 1 occupy the top-left and top-right of the bottom cell
        // row; cells 2 and 3 were never written and stay at the maximum
        // distance.
        let data = bundle.texture.data();
        assert!(data[32 * 64..].iter().all(|&texel| texel == 0xFF));
        // Inside cell 0 some texels are well into the glyph.
        assert!(data[..32 * 64].iter().any(|&texel| texel < 0x40));
    }

    #[test]
    fn whitespace_has_no_atlas_cell() {
        let (def, font) = def(64, 32, "A ");
        let bundle = generate(&def, &resolved(&def, &font)).unwrap();
        let space = bundle.fonttex.lookup(' ' as u32, 0);
        assert_eq!(space.glyph_index, FONTTEX_GLYPH_NONE);
        assert!((space.advance - 0.25).abs() < 1.0e-6);
    }

    #[test]
    fn lookup_prefers_exact_variation_then_falls_back() {
        let mut characters = vec![
            FontTexChar {
                cp: 0,
                variation: 0,
                glyph_index: 0,
                size: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
                advance: 0.0,
                border: 0.0,
            },
            FontTexChar {
                cp: 'x' as u32,
                variation: 0,
                glyph_index: 1,
                size: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
                advance: 0.0,
                border: 0.0,
            },
            FontTexChar {
                cp: 'x' as u32,
                variation: 2,
                glyph_index: 2,
                size: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
                advance: 0.0,
                border: 0.0,
            },
        ];
        characters.sort_by_key(|c| (c.cp, c.variation));
        let fonttex = FontTex {
            glyphs_per_dim: 2,
            line_spacing: 0.0,
            baseline: 0.0,
            characters,
        };

        assert_eq!(fonttex.lookup('x' as u32, 2).glyph_index, 2);
        assert_eq!(fonttex.lookup('x' as u32, 7).variation, 0);
        assert_eq!(fonttex.lookup('x' as u32, 7).glyph_index, 1);
        // Unknown codepoints yield the missing character.
        assert_eq!(fonttex.lookup('z' as u32, 0).cp, 0);
    }

    #[test]
    fn too_many_glyphs_for_the_atlas_is_an_error() {
        let (def, font) = def(32, 32, "AA");
        // Missing glyph + two 'A' outlines need three cells; one fits.
        assert_eq!(
            generate(&def, &resolved(&def, &font)),
            Err(FontTexError::TooManyGlyphs)
        );
    }

    #[test]
    fn unmapped_characters_are_an_error() {
        let (def, font) = def(64, 32, "B");
        assert_eq!(
            generate(&def, &resolved(&def, &font)),
            Err(FontTexError::FontGlyphMissing)
        );
    }

    #[test]
    fn def_validation_rejects_bad_sizes() {
        let (mut d, _) = def(64, 32, "A");
        d.size = 48;
        assert_eq!(validate_def(&d), Err(FontTexError::SizeNonPow2));
        d.size = 32 * 1024;
        assert_eq!(validate_def(&d), Err(FontTexError::SizeTooBig));
        d.size = 64;
        d.glyph_size = 20;
        assert_eq!(validate_def(&d), Err(FontTexError::GlyphSizeNonPow2));
    }

    #[test]
    fn def_parses_from_json() {
        let json = br#"{
            "size": 256,
            "glyphSize": 64,
            "border": 4,
            "lineSpacing": 0.3,
            "baseline": 0.1,
            "fonts": [
                {"id": "fonts/mono.ttf", "characters": "abc", "yOffset": -0.05}
            ]
        }"#;
        let def: FontTexDef = serde_json::from_slice(json).unwrap();
        assert_eq!(def.size, 256);
        assert_eq!(def.glyph_size, 64);
        assert_eq!(def.fonts.len(), 1);
        assert_eq!(def.fonts[0].characters, "abc");
        assert!((def.fonts[0].y_offset + 0.05).abs() < 1.0e-6);
        assert!(!def.lossless);
    }

    #[test]
    fn bundle_codec_round_trips() {
        let (def, font) = def(64, 32, "A");
        let bundle = generate(&def, &resolved(&def, &font)).unwrap();
        let blob = keel_asset::write_blob(&bundle);
        let decoded: FontTexBundle = keel_asset::read_blob(&blob).unwrap();
        assert_eq!(decoded, bundle);
    }
}
