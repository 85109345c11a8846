//! Texture asset loaders: decode a source image, normalize it through
//! [`Texture::create`] and queue the result for caching.

use keel_asset::{AssetBlob, AssetLoader, Load, LoadContext, LoadError, read_blob};

use crate::{
    height, png, ppm, tga,
    texture::{Texture, TextureFlags, TextureType, is_normalmap},
};

fn texture_flags(id: &str) -> TextureFlags {
    let mut flags = TextureFlags::GENERATE_MIPS;
    if is_normalmap(id) {
        flags |= TextureFlags::NORMAL_MAP;
    }
    flags
}

/// Loader for Truevision TGA images.
pub struct TgaLoader;

impl AssetLoader for TgaLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let image = tga::decode(&blob.data).map_err(LoadError::loader)?;
        let tex = Texture::create(
            &image.pixels,
            image.width,
            image.height,
            image.channels,
            1,
            1,
            TextureType::U8,
            texture_flags(ctx.id()),
        );
        ctx.cache(&tex);
        Ok(Load::Done(Box::new(tex)))
    }
}

/// Loader for portable pixmaps.
pub struct PpmLoader;

impl AssetLoader for PpmLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let image = ppm::decode(&blob.data).map_err(LoadError::loader)?;
        let tex = Texture::create(
            &image.pixels,
            image.width,
            image.height,
            3,
            1,
            1,
            TextureType::U8,
            texture_flags(ctx.id()),
        );
        ctx.cache(&tex);
        Ok(Load::Done(Box::new(tex)))
    }
}

/// Loader for portable network graphics.
pub struct PngLoader;

impl AssetLoader for PngLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let image = png::decode(&blob.data).map_err(LoadError::loader)?;
        let tex = Texture::create(
            &image.pixels,
            image.width,
            image.height,
            image.channels,
            1,
            1,
            TextureType::U8,
            texture_flags(ctx.id()),
        );
        ctx.cache(&tex);
        Ok(Load::Done(Box::new(tex)))
    }
}

/// Loader for raw height grids (16 bit unsigned or 32 bit float).
pub struct HeightLoader {
    ty: TextureType,
}

impl HeightLoader {
    pub fn r16() -> Self {
        Self {
            ty: TextureType::U16,
        }
    }

    pub fn r32() -> Self {
        Self {
            ty: TextureType::F32,
        }
    }
}

impl AssetLoader for HeightLoader {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let image = height::decode(&blob.data, self.ty).map_err(LoadError::loader)?;
        let tex = Texture::create(
            &image.pixels,
            image.size,
            image.size,
            1,
            1,
            1,
            image.ty,
            TextureFlags::empty(),
        );
        ctx.cache(&tex);
        Ok(Load::Done(Box::new(tex)))
    }
}

/// Loader for binary cached textures.
pub struct TexBinLoader;

impl AssetLoader for TexBinLoader {
    fn load(&self, _ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        let tex: Texture = read_blob(&blob.data)?;
        Ok(Load::Done(Box::new(tex)))
    }
}
