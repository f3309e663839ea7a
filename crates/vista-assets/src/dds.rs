//! DirectDraw Surface container reader
//!
//! Block-compressed data is passed through untouched for the backend to
//! upload directly. Only 2D textures are supported (no cube maps or arrays).

use std::path::Path;

use tracing::debug;

use crate::error::TextureError;

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: usize = 124;
const DX10_HEADER_SIZE: usize = 20;

/// Largest edge accepted, matching common GPU texture limits
pub const MAX_DIMENSION: u32 = 16384;

const DDPF_FOURCC: u32 = 0x4;
const DDSCAPS2_CUBEMAP: u32 = 0x200;

/// Block-compressed formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6hUnsigned,
    Bc6hSigned,
    Bc7,
}

impl BlockFormat {
    pub fn block_bytes(self) -> u32 {
        match self {
            BlockFormat::Bc1 | BlockFormat::Bc4 => 8,
            _ => 16,
        }
    }

    /// GL internal format enum, picking the sRGB variant where one exists.
    pub fn gl_internal_format(self, srgb: bool) -> u32 {
        match (self, srgb) {
            (BlockFormat::Bc1, false) => 0x83F1, // COMPRESSED_RGBA_S3TC_DXT1_EXT
            (BlockFormat::Bc1, true) => 0x8C4D,
            (BlockFormat::Bc2, false) => 0x83F2,
            (BlockFormat::Bc2, true) => 0x8C4E,
            (BlockFormat::Bc3, false) => 0x83F3,
            (BlockFormat::Bc3, true) => 0x8C4F,
            (BlockFormat::Bc4, _) => 0x8DBB, // COMPRESSED_RED_RGTC1
            (BlockFormat::Bc5, _) => 0x8DBD, // COMPRESSED_RG_RGTC2
            (BlockFormat::Bc6hUnsigned, _) => 0x8E8F,
            (BlockFormat::Bc6hSigned, _) => 0x8E8E,
            (BlockFormat::Bc7, false) => 0x8E8C,
            (BlockFormat::Bc7, true) => 0x8E8D,
        }
    }

    fn from_four_cc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"DXT1" => Some(BlockFormat::Bc1),
            b"DXT2" | b"DXT3" => Some(BlockFormat::Bc2),
            b"DXT4" | b"DXT5" => Some(BlockFormat::Bc3),
            b"ATI1" | b"BC4U" => Some(BlockFormat::Bc4),
            b"ATI2" | b"BC5U" => Some(BlockFormat::Bc5),
            _ => None,
        }
    }

    fn from_dxgi(format: u32) -> Option<Self> {
        match format {
            70..=72 => Some(BlockFormat::Bc1),
            73..=75 => Some(BlockFormat::Bc2),
            76..=78 => Some(BlockFormat::Bc3),
            79..=81 => Some(BlockFormat::Bc4),
            82..=84 => Some(BlockFormat::Bc5),
            95 => Some(BlockFormat::Bc6hUnsigned),
            96 => Some(BlockFormat::Bc6hSigned),
            97..=99 => Some(BlockFormat::Bc7),
            _ => None,
        }
    }

    /// Byte size of one mip level, `None` if it does not fit in `usize`.
    pub fn level_size(self, width: u32, height: u32) -> Option<usize> {
        let blocks_x = width.div_ceil(4).max(1) as usize;
        let blocks_y = height.div_ceil(4).max(1) as usize;
        blocks_x
            .checked_mul(blocks_y)?
            .checked_mul(self.block_bytes() as usize)
    }
}

/// A parsed DDS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsImage {
    pub width: u32,
    pub height: u32,
    pub format: BlockFormat,
    /// Mip levels present in `data`, at least 1
    pub mip_levels: u32,
    /// All mip levels back to back, largest first
    pub data: Vec<u8>,
}

/// Whether the bytes look like a DDS file, by extension or magic.
pub fn is_dds(path: &Path, bytes: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dds"));
    by_extension || bytes.starts_with(MAGIC)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let chunk = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// Parse a DDS file holding a block-compressed 2D texture.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<DdsImage, TextureError> {
    let unsupported = |reason: &str| TextureError::UnsupportedDds(path.to_path_buf(), reason.to_string());

    if !bytes.starts_with(MAGIC) {
        return Err(unsupported("missing DDS magic"));
    }
    let header = 4;
    if read_u32(bytes, header) != Some(HEADER_SIZE as u32) {
        return Err(unsupported("bad header size"));
    }

    let field = |offset: usize| read_u32(bytes, header + offset).ok_or_else(|| unsupported("truncated header"));
    let height = field(8)?;
    let width = field(12)?;
    let mip_count = field(24)?.max(1);
    let pf_flags = field(76)?;
    let caps2 = field(108)?;

    if caps2 & DDSCAPS2_CUBEMAP != 0 {
        return Err(unsupported("cube maps are not supported"));
    }
    if pf_flags & DDPF_FOURCC == 0 {
        return Err(unsupported("uncompressed pixel formats are not supported"));
    }

    let four_cc: [u8; 4] = bytes
        .get(header + 80..header + 84)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| unsupported("truncated header"))?;

    let mut data_start = header + HEADER_SIZE;
    let format = if &four_cc == b"DX10" {
        let dxgi = read_u32(bytes, data_start).ok_or_else(|| unsupported("truncated DX10 header"))?;
        data_start += DX10_HEADER_SIZE;
        BlockFormat::from_dxgi(dxgi)
            .ok_or_else(|| unsupported(&format!("DXGI format {dxgi}")))?
    } else {
        BlockFormat::from_four_cc(&four_cc).ok_or_else(|| {
            unsupported(&format!("FourCC {}", String::from_utf8_lossy(&four_cc)))
        })?
    };

    if width == 0 || height == 0 {
        return Err(unsupported("zero-sized texture"));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(unsupported(&format!(
            "{width}x{height} exceeds the {MAX_DIMENSION} pixel limit"
        )));
    }
    // a full chain ends at 1x1
    let mip_count = mip_count.min(width.max(height).ilog2() + 1);

    let payload = &bytes[data_start.min(bytes.len())..];
    let mut size: usize = 0;
    let mut levels = 0;
    let (mut w, mut h) = (width, height);
    while levels < mip_count {
        let end = format
            .level_size(w, h)
            .and_then(|level| size.checked_add(level))
            .ok_or_else(|| unsupported("mip level size overflows"))?;
        if end > payload.len() {
            break;
        }
        size = end;
        levels += 1;
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }

    if levels == 0 {
        return Err(unsupported("truncated pixel data"));
    }
    if levels < mip_count {
        debug!(
            "DDS '{}' declares {} mips but holds {}",
            path.display(),
            mip_count,
            levels
        );
    }

    Ok(DdsImage {
        width,
        height,
        format,
        mip_levels: levels,
        data: payload[..size].to_vec(),
    })
}

#[cfg(test)]
pub(crate) fn build(width: u32, height: u32, four_cc: &[u8; 4], mips: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    let mut header = [0u32; HEADER_SIZE / 4];
    header[0] = HEADER_SIZE as u32;
    header[2] = height;
    header[3] = width;
    header[6] = mips;
    header[18] = 32; // pixel format size
    header[19] = DDPF_FOURCC;
    header[20] = u32::from_le_bytes(*four_cc);
    for word in header {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}
