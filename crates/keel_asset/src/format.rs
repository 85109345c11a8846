use crate::{bin::BlobMeta, id::hash_bytes};

/// Closed set of source formats understood by the loader table.
///
/// The format of a source blob is derived from its file extension, or for
/// binary cache blobs from the type identifier embedded in the blob header
/// (the `*Bin` variants).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AssetFormat {
    Cursor,
    Decal,
    FontTtf,
    Graphic,
    Icon,
    IconBin,
    Inputs,
    InputsBin,
    Level,
    LevelBin,
    MeshBin,
    MeshGlb,
    MeshGltf,
    MeshObj,
    MeshProc,
    Prefabs,
    PrefabsBin,
    Products,
    ProductsBin,
    Raw,
    Script,
    ScriptBin,
    ShaderBin,
    ShaderGlsl,
    ShaderGlslFrag,
    ShaderGlslVert,
    ShaderSpv,
    SoundBin,
    SoundWav,
    Terrain,
    TexArray,
    TexAtlas,
    TexAtlasBin,
    TexBin,
    TexFont,
    TexFontBin,
    TexHeight16,
    TexHeight32,
    TexPng,
    TexPpm,
    TexProc,
    TexTga,
    Vfx,
    Weapons,
    WeaponsBin,
}

/// Extension to format mapping, lower-case extensions without the leading dot.
const EXTENSIONS: &[(&str, AssetFormat)] = &[
    ("arraytex", AssetFormat::TexArray),
    ("atlas", AssetFormat::TexAtlas),
    ("cursor", AssetFormat::Cursor),
    ("decal", AssetFormat::Decal),
    ("fonttex", AssetFormat::TexFont),
    ("frag", AssetFormat::ShaderGlslFrag),
    ("glb", AssetFormat::MeshGlb),
    ("glsl", AssetFormat::ShaderGlsl),
    ("gltf", AssetFormat::MeshGltf),
    ("graphic", AssetFormat::Graphic),
    ("icon", AssetFormat::Icon),
    ("inputs", AssetFormat::Inputs),
    ("level", AssetFormat::Level),
    ("obj", AssetFormat::MeshObj),
    ("png", AssetFormat::TexPng),
    ("ppm", AssetFormat::TexPpm),
    ("prefabs", AssetFormat::Prefabs),
    ("procmesh", AssetFormat::MeshProc),
    ("proctex", AssetFormat::TexProc),
    ("products", AssetFormat::Products),
    ("r16", AssetFormat::TexHeight16),
    ("r32", AssetFormat::TexHeight32),
    ("script", AssetFormat::Script),
    ("spv", AssetFormat::ShaderSpv),
    ("terrain", AssetFormat::Terrain),
    ("tga", AssetFormat::TexTga),
    ("ttf", AssetFormat::FontTtf),
    ("vert", AssetFormat::ShaderGlslVert),
    ("vfx", AssetFormat::Vfx),
    ("wav", AssetFormat::SoundWav),
    ("weapons", AssetFormat::Weapons),
];

/// Blob type names as they appear in cache blob headers, paired with the
/// binary format that consumes them. Names have to match the `TYPE_NAME` of
/// the corresponding [`BlobCodec`](crate::BlobCodec) implementation.
const BIN_BLOB_NAMES: &[(&str, AssetFormat)] = &[
    ("Icon", AssetFormat::IconBin),
    ("InputMap", AssetFormat::InputsBin),
    ("Level", AssetFormat::LevelBin),
    ("Mesh", AssetFormat::MeshBin),
    ("PrefabMap", AssetFormat::PrefabsBin),
    ("ProductMap", AssetFormat::ProductsBin),
    ("Script", AssetFormat::ScriptBin),
    ("Shader", AssetFormat::ShaderBin),
    ("Sound", AssetFormat::SoundBin),
    ("TexAtlas", AssetFormat::TexAtlasBin),
    ("Texture", AssetFormat::TexBin),
    ("FontTexBundle", AssetFormat::TexFontBin),
    ("WeaponMap", AssetFormat::WeaponsBin),
];

impl AssetFormat {
    /// Map a file extension (without the leading dot) to a format.
    /// Unknown extensions fall back to [`AssetFormat::Raw`].
    pub fn from_ext(ext: &str) -> Self {
        EXTENSIONS
            .iter()
            .find(|(e, _)| ext.eq_ignore_ascii_case(e))
            .map_or(AssetFormat::Raw, |(_, format)| *format)
    }

    /// Map the extension of an id (the part after the last `.`) to a format.
    pub fn from_id(id: &str) -> Self {
        match id.rsplit_once('.') {
            Some((_, ext)) => Self::from_ext(ext),
            None => AssetFormat::Raw,
        }
    }

    /// Map the type identifier of a binary cache blob back to the binary
    /// format tag that can consume it.
    pub fn from_bin_meta(meta: BlobMeta) -> Option<Self> {
        BIN_BLOB_NAMES
            .iter()
            .find(|(name, _)| hash_bytes(name.as_bytes()) == meta.type_name_hash)
            .map(|(_, format)| *format)
    }

    /// Display name of the format.
    pub fn name(self) -> &'static str {
        match self {
            AssetFormat::Cursor => "cursor",
            AssetFormat::Decal => "decal",
            AssetFormat::FontTtf => "font-ttf",
            AssetFormat::Graphic => "graphic",
            AssetFormat::Icon => "icon",
            AssetFormat::IconBin => "icon-bin",
            AssetFormat::Inputs => "inputs",
            AssetFormat::InputsBin => "inputs-bin",
            AssetFormat::Level => "level",
            AssetFormat::LevelBin => "level-bin",
            AssetFormat::MeshBin => "mesh-bin",
            AssetFormat::MeshGlb => "mesh-glb",
            AssetFormat::MeshGltf => "mesh-gltf",
            AssetFormat::MeshObj => "mesh-obj",
            AssetFormat::MeshProc => "mesh-proc",
            AssetFormat::Prefabs => "prefabs",
            AssetFormat::PrefabsBin => "prefabs-bin",
            AssetFormat::Products => "products",
            AssetFormat::ProductsBin => "products-bin",
            AssetFormat::Raw => "raw",
            AssetFormat::Script => "script",
            AssetFormat::ScriptBin => "script-bin",
            AssetFormat::ShaderBin => "shader-bin",
            AssetFormat::ShaderGlsl => "shader-glsl",
            AssetFormat::ShaderGlslFrag => "shader-glsl-frag",
            AssetFormat::ShaderGlslVert => "shader-glsl-vert",
            AssetFormat::ShaderSpv => "shader-spv",
            AssetFormat::SoundBin => "sound-bin",
            AssetFormat::SoundWav => "sound-wav",
            AssetFormat::Terrain => "terrain",
            AssetFormat::TexArray => "tex-array",
            AssetFormat::TexAtlas => "tex-atlas",
            AssetFormat::TexAtlasBin => "tex-atlas-bin",
            AssetFormat::TexBin => "tex-bin",
            AssetFormat::TexFont => "tex-font",
            AssetFormat::TexFontBin => "tex-font-bin",
            AssetFormat::TexHeight16 => "tex-height16",
            AssetFormat::TexHeight32 => "tex-height32",
            AssetFormat::TexPng => "tex-png",
            AssetFormat::TexPpm => "tex-ppm",
            AssetFormat::TexProc => "tex-proc",
            AssetFormat::TexTga => "tex-tga",
            AssetFormat::Vfx => "vfx",
            AssetFormat::Weapons => "weapons",
            AssetFormat::WeaponsBin => "weapons-bin",
        }
    }

    /// Dense index for loader table storage.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) const COUNT: usize = AssetFormat::WeaponsBin as usize + 1;
}

impl core::fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(AssetFormat::from_ext("ttf"), AssetFormat::FontTtf);
        assert_eq!(AssetFormat::from_ext("TGA"), AssetFormat::TexTga);
        assert_eq!(AssetFormat::from_ext("ppm"), AssetFormat::TexPpm);
        assert_eq!(AssetFormat::from_ext("r32"), AssetFormat::TexHeight32);
        assert_eq!(AssetFormat::from_ext("weapons"), AssetFormat::Weapons);
    }

    #[test]
    fn unknown_extension_falls_back_to_raw() {
        assert_eq!(AssetFormat::from_ext("bananas"), AssetFormat::Raw);
        assert_eq!(AssetFormat::from_id("no-extension"), AssetFormat::Raw);
    }

    #[test]
    fn id_extension_resolves() {
        assert_eq!(AssetFormat::from_id("fonts/mono.ttf"), AssetFormat::FontTtf);
        assert_eq!(AssetFormat::from_id("a.b.ppm"), AssetFormat::TexPpm);
    }

    #[test]
    fn bin_meta_resolves_to_bin_format() {
        let meta = BlobMeta {
            type_name_hash: hash_bytes(b"Texture"),
            struct_hash: 0,
        };
        assert_eq!(AssetFormat::from_bin_meta(meta), Some(AssetFormat::TexBin));
    }
}
