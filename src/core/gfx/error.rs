use crate::core::gfx::ShaderType;

/// Failures surfaced by the GPU layer.
///
/// Driver refusals are never swallowed; the only silent paths are deletes of
/// stale handles and binds that match the cached state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("opengl: creating {resource} failed: {reason}")]
    ResourceCreation {
        resource: &'static str,
        reason: String,
        /// Driver status code, when the driver reported one (framebuffer completeness).
        status: Option<u32>,
    },
    #[error("opengl: {kind} shader compile failed: {log}")]
    ShaderCompile { kind: ShaderType, log: String },
    #[error("opengl: program link failed: {log}")]
    ProgramLink { log: String },
    #[error("opengl: reading pixels failed: error 0x{code:04x}")]
    Readback { code: u32 },
    #[error("opengl: texture upload of {width}x{height} needs {expected} bytes, got {actual}")]
    UploadSize {
        width: i32,
        height: i32,
        expected: usize,
        actual: usize,
    },
    #[error("opengl: unsupported composite mode '{0}'")]
    UnsupportedCompositeMode(String),
    #[error("opengl: uniform '{name}' cannot take {len} floats")]
    UnsupportedUniformLength { name: String, len: usize },
    #[error("opengl: no usable context: {0}")]
    ContextUnavailable(String),
}

impl Error {
    pub(crate) fn creation(resource: &'static str, reason: impl Into<String>) -> Self {
        Self::ResourceCreation {
            resource,
            reason: reason.into(),
            status: None,
        }
    }

    pub(crate) fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::ContextUnavailable(reason.to_string())
    }
}
