//! Shader kinds and the shader-model catalog.

use std::fmt;

/// The pipeline stage a function is compiled for.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ShaderKind {
    Pixel,
    Vertex,
    Geometry,
    Hull,
    Domain,
    Compute,
    /// An unresolved library of functions. Never a valid link target.
    Library,
    /// Not a shader at all. Never a valid link target.
    Invalid,
}

impl ShaderKind {
    /// The profile prefix for this kind (`ps` in `ps_6_0`).
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Pixel => "ps",
            Self::Vertex => "vs",
            Self::Geometry => "gs",
            Self::Hull => "hs",
            Self::Domain => "ds",
            Self::Compute => "cs",
            Self::Library => "lib",
            Self::Invalid => "invalid",
        }
    }

    /// Human-readable kind name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::Vertex => "vertex",
            Self::Geometry => "geometry",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Compute => "compute",
            Self::Library => "library",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A versioned shader capability tier, e.g. `ps_6_0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderModel {
    /// The stage this model targets.
    pub kind: ShaderKind,
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Canonical profile name.
    pub name: &'static str,
}

macro_rules! models {
    ($($name:literal => $kind:ident, $major:literal, $minor:literal;)*) => {
        &[$(ShaderModel {
            kind: ShaderKind::$kind,
            major: $major,
            minor: $minor,
            name: $name,
        }),*]
    };
}

/// Every shader model this linker can target.
pub const SHADER_MODELS: &[ShaderModel] = models! {
    "ps_6_0" => Pixel, 6, 0;    "ps_6_1" => Pixel, 6, 1;
    "ps_6_2" => Pixel, 6, 2;    "ps_6_3" => Pixel, 6, 3;
    "vs_6_0" => Vertex, 6, 0;   "vs_6_1" => Vertex, 6, 1;
    "vs_6_2" => Vertex, 6, 2;   "vs_6_3" => Vertex, 6, 3;
    "gs_6_0" => Geometry, 6, 0; "gs_6_1" => Geometry, 6, 1;
    "gs_6_2" => Geometry, 6, 2; "gs_6_3" => Geometry, 6, 3;
    "hs_6_0" => Hull, 6, 0;     "hs_6_1" => Hull, 6, 1;
    "hs_6_2" => Hull, 6, 2;     "hs_6_3" => Hull, 6, 3;
    "ds_6_0" => Domain, 6, 0;   "ds_6_1" => Domain, 6, 1;
    "ds_6_2" => Domain, 6, 2;   "ds_6_3" => Domain, 6, 3;
    "cs_6_0" => Compute, 6, 0;  "cs_6_1" => Compute, 6, 1;
    "cs_6_2" => Compute, 6, 2;  "cs_6_3" => Compute, 6, 3;
    "lib_6_1" => Library, 6, 1; "lib_6_2" => Library, 6, 2;
    "lib_6_3" => Library, 6, 3;
};

impl ShaderModel {
    /// Looks up a model by its canonical profile name.
    pub fn get_by_name(name: &str) -> Option<&'static ShaderModel> {
        SHADER_MODELS.iter().find(|sm| sm.name == name)
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
