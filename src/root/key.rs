//! TKey records: the headers ROOT uses to locate stored objects.

use super::decompress::decompress;
use super::error::{Result, RootError};
use super::rbuffer::RBuffer;

#[derive(Debug, Clone)]
pub struct Key {
    /// Compressed object size plus key header.
    pub n_bytes: u32,
    /// Uncompressed object size.
    pub obj_len: u32,
    pub key_len: u16,
    pub cycle: u16,
    pub seek_key: u64,
    pub class_name: String,
    pub name: String,
}

impl Key {
    /// Read a TKey header at the buffer's current position.
    pub fn read(r: &mut RBuffer, is_large: bool) -> Result<Self> {
        let n_bytes = r.read_u32()?;
        let version = r.read_u16()?;
        let obj_len = r.read_u32()?;
        let _datime = r.read_u32()?;
        let key_len = r.read_u16()?;
        let cycle = r.read_u16()?;

        let (seek_key, _seek_pdir) = if version > 1000 || is_large {
            (r.read_u64()?, r.read_u64()?)
        } else {
            (r.read_u32()? as u64, r.read_u32()? as u64)
        };

        let class_name = r.read_string()?;
        let name = r.read_string()?;
        let _title = r.read_string()?;

        Ok(Key {
            n_bytes,
            obj_len,
            key_len,
            cycle,
            seek_key,
            class_name,
            name,
        })
    }

    /// Read the object bytes this key points to, decompressing when needed.
    pub fn payload(&self, file_data: &[u8]) -> Result<Vec<u8>> {
        let start = self.seek_key as usize;
        let end = start + self.n_bytes as usize;
        if end > file_data.len() || (self.key_len as u32) > self.n_bytes {
            return Err(RootError::BufferUnderflow {
                offset: start,
                need: self.n_bytes as usize,
                have: file_data.len().saturating_sub(start),
            });
        }

        let stored = &file_data[start + self.key_len as usize..end];
        if stored.len() == self.obj_len as usize {
            Ok(stored.to_vec())
        } else {
            decompress(stored, self.obj_len as usize)
        }
    }
}
