//! Image formats and layouts.

/// Image formats understood by the scene.
///
/// Only the formats needed for presentable images, offscreen attachments and
/// storage images are listed. Conversion to API formats is the backend's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 32-bit red channel, float.
    R32Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth24PlusStencil8 | Self::Depth32Float | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }
}

/// Layout an image is in when a command accesses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents are undefined.
    #[default]
    Undefined,
    /// General access (storage images written by compute or ray tracing).
    General,
    /// Color attachment output.
    ColorAttachment,
    /// Depth/stencil attachment output.
    DepthStencilAttachment,
    /// Read-only sampling from shaders.
    ShaderReadOnly,
    /// Source of a copy or blit.
    TransferSrc,
    /// Destination of a copy or blit.
    TransferDst,
    /// Ready for presentation.
    PresentSrc,
}
