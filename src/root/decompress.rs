//! ROOT compression blocks.
//!
//! Compressed payloads are a sequence of blocks with a 9-byte header:
//! ```text
//! bytes 0-1:  algorithm tag ("ZL" zlib, "L4" LZ4)
//! byte  2:    method (ignored)
//! bytes 3-5:  compressed size   (3-byte little-endian)
//! bytes 6-8:  uncompressed size (3-byte little-endian)
//! ```

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::error::{Result, RootError};

const HEADER_LEN: usize = 9;

/// Decompress ROOT block data into exactly `expected_len` bytes.
pub fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut offset = 0;

    while out.len() < expected_len && offset + HEADER_LEN <= src.len() {
        let tag = &src[offset..offset + 2];
        let c_size = read_le24(&src[offset + 3..offset + 6]);
        let u_size = read_le24(&src[offset + 6..offset + 9]);
        offset += HEADER_LEN;

        let end = offset + c_size;
        if end > src.len() {
            return Err(RootError::Decompression(format!(
                "block claims {c_size} bytes but only {} remain",
                src.len() - offset
            )));
        }
        let block = &src[offset..end];

        let decoded = match tag {
            b"ZL" => decompress_zlib(block, u_size)?,
            b"L4" => decompress_lz4(block, u_size)?,
            _ => {
                return Err(RootError::Decompression(format!(
                    "unsupported compression algorithm {:?}",
                    String::from_utf8_lossy(tag)
                )));
            }
        };
        if decoded.len() != u_size {
            return Err(RootError::Decompression(format!(
                "block expanded to {} bytes, header says {u_size}",
                decoded.len()
            )));
        }

        out.extend_from_slice(&decoded);
        offset = end;
    }

    if out.len() != expected_len {
        return Err(RootError::Decompression(format!(
            "decompressed {} bytes, expected {expected_len}",
            out.len()
        )));
    }
    Ok(out)
}

fn decompress_zlib(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| RootError::Decompression(format!("zlib: {e}")))?;
    Ok(out)
}

fn decompress_lz4(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    // An 8-byte xxhash64 checksum precedes the LZ4 payload; it is not verified.
    if data.len() < 8 {
        return Err(RootError::Decompression("LZ4 block shorter than its checksum".into()));
    }
    lz4_flex::block::decompress(&data[8..], expected)
        .map_err(|e| RootError::Decompression(format!("lz4: {e}")))
}

fn read_le24(b: &[u8]) -> usize {
    b[0] as usize | ((b[1] as usize) << 8) | ((b[2] as usize) << 16)
}

#[cfg(test)]
pub(crate) fn zlib_block(original: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(original).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut block = Vec::with_capacity(HEADER_LEN + compressed.len());
    block.extend_from_slice(b"ZL");
    block.push(0x08);
    block.extend_from_slice(&(compressed.len() as u32).to_le_bytes()[..3]);
    block.extend_from_slice(&(original.len() as u32).to_le_bytes()[..3]);
    block.extend_from_slice(&compressed);
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le24() {
        assert_eq!(read_le24(&[0x10, 0x00, 0x00]), 16);
        assert_eq!(read_le24(&[0x00, 0x01, 0x00]), 256);
        assert_eq!(read_le24(&[0xff, 0xff, 0xff]), 0xFF_FFFF);
    }

    #[test]
    fn zlib_block_decodes() {
        let original = b"fake rate numerator, fake rate denominator, AAAAAAAAAAAA";
        let block = zlib_block(original);
        assert_eq!(decompress(&block, original.len()).unwrap(), original);
    }

    #[test]
    fn lz4_block_decodes() {
        let original = b"jet pt jet pt jet pt jet pt jet pt jet pt";
        let compressed = lz4_flex::block::compress(original);
        let mut block = Vec::new();
        block.extend_from_slice(b"L4");
        block.push(0x01);
        block.extend_from_slice(&((compressed.len() + 8) as u32).to_le_bytes()[..3]);
        block.extend_from_slice(&(original.len() as u32).to_le_bytes()[..3]);
        block.extend_from_slice(&[0u8; 8]);
        block.extend_from_slice(&compressed);
        assert_eq!(decompress(&block, original.len()).unwrap(), original);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let mut block = b"QQ\x00".to_vec();
        block.extend_from_slice(&[1, 0, 0, 1, 0, 0, 0]);
        assert!(matches!(decompress(&block, 1), Err(RootError::Decompression(_))));
    }
}
