use std::path::Path;

use image::DynamicImage;
use vista_render::{CompressedFormat, TextureUpload};

use crate::dds::{self, BlockFormat};
use crate::error::TextureError;

/// Pixel layout of a decoded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8 bits per channel, 1 to 4 channels
    Uncompressed { channels: u8 },
    /// Block-compressed mip chain
    Compressed { format: BlockFormat, mip_levels: u32 },
}

/// A decoded texture with its pixel data in CPU memory.
#[derive(Debug, Clone)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl DecodedTexture {
    pub fn upload(&self, srgb: bool, bindless: bool) -> TextureUpload<'_> {
        let (channels, compressed) = match self.format {
            TextureFormat::Uncompressed { channels } => (channels, None),
            TextureFormat::Compressed { format, mip_levels } => (
                4,
                Some(CompressedFormat {
                    internal_format: format.gl_internal_format(srgb),
                    block_bytes: format.block_bytes(),
                    mip_levels,
                }),
            ),
        };
        TextureUpload {
            pixels: &self.data,
            width: self.width,
            height: self.height,
            channels,
            srgb,
            compressed,
            bindless,
        }
    }
}

/// Decode texture file contents. DDS containers pass their compressed blocks
/// through (and ignore `flip_vertically`), everything else goes to
/// [`decode_image`].
pub fn decode_texture(path: &Path, bytes: &[u8], flip_vertically: bool) -> Result<DecodedTexture, TextureError> {
    if !dds::is_dds(path, bytes) {
        return decode_image(path, bytes, flip_vertically);
    }
    let image = dds::decode(path, bytes)?;
    Ok(DecodedTexture {
        width: image.width,
        height: image.height,
        format: TextureFormat::Compressed {
            format: image.format,
            mip_levels: image.mip_levels,
        },
        data: image.data,
    })
}

/// Decode a PNG, JPEG or other `image`-supported file, keeping its channel
/// count. Formats wider than 8 bits per channel are narrowed.
pub fn decode_image(path: &Path, bytes: &[u8], flip_vertically: bool) -> Result<DecodedTexture, TextureError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| TextureError::Decode(path.to_path_buf(), e.to_string()))?;
    let img = if flip_vertically { img.flipv() } else { img };
    let (width, height) = (img.width(), img.height());

    let (channels, data) = match img {
        DynamicImage::ImageLuma8(i) => (1, i.into_raw()),
        DynamicImage::ImageLumaA8(i) => (2, i.into_raw()),
        DynamicImage::ImageRgb8(i) => (3, i.into_raw()),
        DynamicImage::ImageRgba8(i) => (4, i.into_raw()),
        // wider formats are narrowed to 8 bits, keeping the channel count
        other => match other.color().channel_count() {
            1 => (1, other.into_luma8().into_raw()),
            2 => (2, other.into_luma_alpha8().into_raw()),
            3 => (3, other.into_rgb8().into_raw()),
            _ => (4, other.into_rgba8().into_raw()),
        },
    };

    Ok(DecodedTexture {
        width,
        height,
        format: TextureFormat::Uncompressed { channels },
        data,
    })
}

#[cfg(test)]
pub(crate) fn png_bytes(img: DynamicImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}
