pub mod backends;
mod context;
mod driver;
mod error;
mod locations;
pub mod sprite;
#[cfg(test)]
pub(crate) mod testing;
pub mod vertices;

pub use context::{Binding, Context};
pub use driver::Driver;
pub use error::Error;
pub use locations::{LocationCache, ProgramId};
pub use vertices::{GeoM, QuadRequest, VertexSlab, quad_vertices};

use std::{fmt, str::FromStr};

// --- Driver-facing enums ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Fragment,
}

impl ShaderType {
    pub const fn gl_enum(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferType {
    Array,
    ElementArray,
}

impl BufferType {
    pub const fn gl_enum(self) -> u32 {
        match self {
            Self::Array => glow::ARRAY_BUFFER,
            Self::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Triangles,
    Lines,
}

impl DrawMode {
    pub const fn gl_enum(self) -> u32 {
        match self {
            Self::Triangles => glow::TRIANGLES,
            Self::Lines => glow::LINES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Short,
    Float,
}

impl DataType {
    pub const fn gl_enum(self) -> u32 {
        match self {
            Self::Short => glow::SHORT,
            Self::Float => glow::FLOAT,
        }
    }

    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Float => 4,
        }
    }
}

// --- Composite modes ---

/// Porter-Duff operators over premultiplied alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeMode {
    Clear,
    Copy,
    SourceOver,
    DestinationOver,
    SourceIn,
    DestinationIn,
    SourceOut,
    DestinationOut,
    SourceAtop,
    DestinationAtop,
    Xor,
    Lighter,
}

impl CompositeMode {
    pub const ALL: [Self; 12] = [
        Self::Clear,
        Self::Copy,
        Self::SourceOver,
        Self::DestinationOver,
        Self::SourceIn,
        Self::DestinationIn,
        Self::SourceOut,
        Self::DestinationOut,
        Self::SourceAtop,
        Self::DestinationAtop,
        Self::Xor,
        Self::Lighter,
    ];

    /// `(source factor, destination factor)` for `glBlendFunc`.
    pub const fn blend_factors(self) -> (u32, u32) {
        match self {
            Self::Clear => (glow::ZERO, glow::ZERO),
            Self::Copy => (glow::ONE, glow::ZERO),
            Self::SourceOver => (glow::ONE, glow::ONE_MINUS_SRC_ALPHA),
            Self::DestinationOver => (glow::ONE_MINUS_DST_ALPHA, glow::ONE),
            Self::SourceIn => (glow::DST_ALPHA, glow::ZERO),
            Self::DestinationIn => (glow::ZERO, glow::SRC_ALPHA),
            Self::SourceOut => (glow::ONE_MINUS_DST_ALPHA, glow::ZERO),
            Self::DestinationOut => (glow::ZERO, glow::ONE_MINUS_SRC_ALPHA),
            Self::SourceAtop => (glow::DST_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
            Self::DestinationAtop => (glow::ONE_MINUS_DST_ALPHA, glow::SRC_ALPHA),
            Self::Xor => (glow::ONE_MINUS_DST_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
            Self::Lighter => (glow::ONE, glow::ONE),
        }
    }

    const fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Copy => "Copy",
            Self::SourceOver => "SourceOver",
            Self::DestinationOver => "DestinationOver",
            Self::SourceIn => "SourceIn",
            Self::DestinationIn => "DestinationIn",
            Self::SourceOut => "SourceOut",
            Self::DestinationOut => "DestinationOut",
            Self::SourceAtop => "SourceAtop",
            Self::DestinationAtop => "DestinationAtop",
            Self::Xor => "Xor",
            Self::Lighter => "Lighter",
        }
    }
}

impl Default for CompositeMode {
    fn default() -> Self {
        Self::SourceOver
    }
}

// -- Boilerplate impls --
impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompositeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| Error::UnsupportedCompositeMode(s.to_string()))
    }
}

impl TryFrom<i32> for CompositeMode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| Error::UnsupportedCompositeMode(value.to_string()))
    }
}
