//! The runtime font value: filled glyph outlines built from lines and
//! quadratic bezier curves, plus the codepoint to glyph mapping.

use glam::Vec2;

/// Mapping from a unicode scalar to a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontCodepoint {
    pub unicode: u32,
    pub glyph_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Two points: begin and end.
    Line,
    /// Three points: begin, control and end.
    QuadraticBezier,
}

/// One outline segment; the number of points is implied by the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSegment {
    pub kind: SegmentKind,
    /// Index of the segment's first point in the font's point array.
    pub point_index: u32,
}

/// A glyph: a span of segments plus its placement metrics (in em units).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FontGlyph {
    pub segment_index: u32,
    pub segment_count: u32,
    pub size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub advance: f32,
}

/// A parsed font. Points are normalized to the glyph grid (`[0, 1]` covers
/// the glyph's bounding square); codepoints are sorted on the unicode value.
pub struct Font {
    pub codepoints: Vec<FontCodepoint>,
    pub points: Vec<Vec2>,
    pub segments: Vec<FontSegment>,
    pub glyphs: Vec<FontGlyph>,
}

/// Subdivision steps used to flatten bezier segments for distance and
/// coverage evaluation.
const BEZIER_STEPS: u32 = 16;

impl Font {
    /// The missing-glyph (aka '.notdef'), guaranteed to be glyph zero.
    pub fn missing(&self) -> &FontGlyph {
        &self.glyphs[0]
    }

    /// Lookup the glyph for a unicode scalar; unmapped codepoints yield the
    /// missing glyph.
    pub fn lookup(&self, unicode: u32) -> &FontGlyph {
        match self
            .codepoints
            .binary_search_by_key(&unicode, |entry| entry.unicode)
        {
            Ok(index) => {
                let glyph_index = self.codepoints[index].glyph_index as usize;
                self.glyphs.get(glyph_index).unwrap_or_else(|| self.missing())
            }
            Err(_) => self.missing(),
        }
    }

    /// The segments forming a glyph's outline.
    pub fn glyph_segments(&self, glyph: &FontGlyph) -> &[FontSegment] {
        let begin = glyph.segment_index as usize;
        let end = begin + glyph.segment_count as usize;
        &self.segments[begin..end]
    }

    /// Signed distance from a point (in normalized glyph space) to the
    /// glyph's outline: positive outside the glyph, negative inside.
    ///
    /// Inside-ness follows the even-odd fill rule over the glyph's contours;
    /// bezier segments are evaluated as flattened polylines.
    pub fn glyph_dist(&self, glyph: &FontGlyph, point: Vec2) -> f32 {
        let mut min_dist_sqr = f32::MAX;
        let mut inside = false;

        let mut edge = |a: Vec2, b: Vec2| {
            min_dist_sqr = min_dist_sqr.min(dist_sqr_to_edge(a, b, point));
            // Horizontal ray towards +x; every crossing flips the parity.
            if (a.y > point.y) != (b.y > point.y) {
                let t = (point.y - a.y) / (b.y - a.y);
                if a.x + t * (b.x - a.x) > point.x {
                    inside = !inside;
                }
            }
        };

        for segment in self.glyph_segments(glyph) {
            let index = segment.point_index as usize;
            match segment.kind {
                SegmentKind::Line => edge(self.points[index], self.points[index + 1]),
                SegmentKind::QuadraticBezier => {
                    let start = self.points[index];
                    let control = self.points[index + 1];
                    let end = self.points[index + 2];
                    let mut prev = start;
                    for step in 1..=BEZIER_STEPS {
                        let t = step as f32 / BEZIER_STEPS as f32;
                        let next = bezier_point(start, control, end, t);
                        edge(prev, next);
                        prev = next;
                    }
                }
            }
        }

        let dist = min_dist_sqr.sqrt();
        if inside { -dist } else { dist }
    }
}

fn bezier_point(start: Vec2, control: Vec2, end: Vec2, t: f32) -> Vec2 {
    let inv = 1.0 - t;
    start * (inv * inv) + control * (2.0 * inv * t) + end * (t * t)
}

fn dist_sqr_to_edge(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    let ab = b - a;
    let len_sqr = ab.length_squared();
    let t = if len_sqr > f32::EPSILON {
        ((point - a).dot(ab) / len_sqr).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (a + ab * t - point).length_squared()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A font with glyph 0 empty and glyph 1 a filled unit-square triangle
    /// (0,0) (1,0) (0,1), mapped from 'A'.
    fn triangle_font() -> Font {
        Font {
            codepoints: vec![FontCodepoint {
                unicode: 'A' as u32,
                glyph_index: 1,
            }],
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
                FontGlyph::default(),
                FontGlyph {
                    segment_index: 0,
                    segment_count: 3,
                    size: 1.0,
                    advance: 1.0,
                    ..FontGlyph::default()
                },
            ],
        }
    }

    #[test]
    fn lookup_falls_back_to_the_missing_glyph() {
        let font = triangle_font();
        assert_eq!(font.lookup('A' as u32).segment_count, 3);
        assert_eq!(font.lookup('B' as u32).segment_count, 0);
        assert!(std::ptr::eq(font.lookup('B' as u32), font.missing()));
    }

    #[test]
    fn distance_sign_is_positive_outside() {
        let font = triangle_font();
        let glyph = font.lookup('A' as u32);

        // Well inside the triangle.
        let inside = font.glyph_dist(glyph, Vec2::new(0.2, 0.2));
        assert!(inside < 0.0, "{inside}");

        // Well outside.
        let outside = font.glyph_dist(glyph, Vec2::new(0.9, 0.9));
        assert!(outside > 0.0, "{outside}");

        // Near the hypotenuse from the outside.
        let near = font.glyph_dist(glyph, Vec2::new(0.6, 0.6));
        assert!(near > 0.0 && near < 0.2, "{near}");
    }

    #[test]
    fn distance_magnitude_matches_geometry() {
        let font = triangle_font();
        let glyph = font.lookup('A' as u32);

        // Directly left of the vertical edge.
        let d = font.glyph_dist(glyph, Vec2::new(-0.25, 0.5));
        assert!((d - 0.25).abs() < 1.0e-4, "{d}");
    }

    #[test]
    fn bezier_segments_flatten_for_coverage() {
        // A half-moon: a line across the bottom and a bezier arcing over the
        // top.
        let font = Font {
            codepoints: vec![FontCodepoint {
                unicode: 'o' as u32,
                glyph_index: 1,
            }],
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.5, 1.0),
                Vec2::new(0.0, 0.0),
            ],
            segments: vec![
                FontSegment {
                    kind: SegmentKind::Line,
                    point_index: 0,
                },
                FontSegment {
                    kind: SegmentKind::QuadraticBezier,
                    point_index: 1,
                },
            ],
            glyphs: vec![
                FontGlyph::default(),
                FontGlyph {
                    segment_index: 0,
                    segment_count: 2,
                    size: 1.0,
                    advance: 1.0,
                    ..FontGlyph::default()
                },
            ],
        };
        let glyph = font.lookup('o' as u32);
        assert!(font.glyph_dist(glyph, Vec2::new(0.5, 0.2)) < 0.0);
        assert!(font.glyph_dist(glyph, Vec2::new(0.05, 0.9)) > 0.0);
    }
}
