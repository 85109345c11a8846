//! Height texture decoding: a raw buffer of 16 bit unsigned or 32 bit float
//! height values without any meta-data, as produced by common terrain
//! authoring tools.
//!
//! Because there is no meta-data the pixel count is required to form a
//! square. Values are assumed to be written in host byte order.

use thiserror::Error;

use crate::texture::TextureType;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightError {
    #[error("corrupt height texture data")]
    Corrupt,
    #[error("missing height texture data")]
    Empty,
    #[error("non-square size")]
    NonSquare,
}

/// A decoded height grid: single channel pixels, rows bottom-up.
pub struct HeightImage {
    pub pixels: Vec<u8>,
    pub size: u32,
    pub ty: TextureType,
}

/// Decode a height value buffer of the given scalar type (u16 or f32).
pub fn decode(input: &[u8], ty: TextureType) -> Result<HeightImage, HeightError> {
    let stride = ty.size();
    if input.len() % stride != 0 {
        return Err(HeightError::Corrupt);
    }
    let pixel_count = input.len() / stride;
    if pixel_count == 0 {
        return Err(HeightError::Empty);
    }
    let size = (pixel_count as f64).sqrt() as usize;
    if size * size != pixel_count {
        return Err(HeightError::NonSquare);
    }

    // Authoring tools use the top row as row zero while the engine uses the
    // bottom row, so rows are written in reverse.
    let row_stride = size * stride;
    let mut pixels = vec![0_u8; input.len()];
    for (src_row, dst_row) in (0..size).rev().enumerate() {
        let src = src_row * row_stride;
        let dst = dst_row * row_stride;
        pixels[dst..dst + row_stride].copy_from_slice(&input[src..src + row_stride]);
    }

    Ok(HeightImage {
        pixels,
        size: size as u32,
        ty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_u16_grids_with_flipped_rows() {
        let input: Vec<u8> = [1_u16, 2, 3, 4]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let image = decode(&input, TextureType::U16).unwrap();
        assert_eq!(image.size, 2);
        let values: Vec<u16> = image
            .pixels
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(values, [3, 4, 1, 2]);
    }

    #[test]
    fn decodes_f32_grids() {
        let input: Vec<u8> = [0.5_f32].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let image = decode(&input, TextureType::F32).unwrap();
        assert_eq!(image.size, 1);
        assert_eq!(image.ty, TextureType::F32);
    }

    #[test]
    fn rejects_bad_buffers() {
        assert!(matches!(
            decode(&[1, 2, 3], TextureType::U16),
            Err(HeightError::Corrupt)
        ));
        assert!(matches!(decode(&[], TextureType::U16), Err(HeightError::Empty)));
        // Three elements cannot form a square.
        assert!(matches!(
            decode(&[0; 6], TextureType::U16),
            Err(HeightError::NonSquare)
        ));
    }
}
