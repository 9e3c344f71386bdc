//! TDirectory key lists.

use super::error::Result;
use super::key::Key;
use super::rbuffer::RBuffer;

#[derive(Debug, Clone)]
pub struct Directory {
    keys: Vec<Key>,
}

impl Directory {
    /// Read the key list stored at `seek_keys`: a TKey header for the list
    /// itself, a u32 key count, then that many TKey records.
    pub fn read_key_list(file_data: &[u8], seek_keys: usize, is_large: bool) -> Result<Self> {
        let mut r = RBuffer::new(file_data);
        r.set_pos(seek_keys);

        let _list_key = Key::read(&mut r, is_large)?;
        let n_keys = r.read_u32()? as usize;

        let mut keys = Vec::with_capacity(n_keys);
        for _ in 0..n_keys {
            keys.push(Key::read(&mut r, is_large)?);
        }
        Ok(Directory { keys })
    }

    /// Read a sub-directory from the payload of its TDirectoryFile key.
    pub fn read_from_payload(payload: &[u8], file_data: &[u8], is_large: bool) -> Result<Self> {
        let mut r = RBuffer::new(payload);
        let seek_keys = read_directory_streamer(&mut r)?;
        if seek_keys == 0 {
            return Ok(Directory { keys: Vec::new() });
        }
        Self::read_key_list(file_data, seek_keys as usize, is_large)
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Find a key by name, preferring the highest cycle.
    pub fn find_key(&self, name: &str) -> Option<&Key> {
        self.keys
            .iter()
            .filter(|k| k.name == name)
            .max_by_key(|k| k.cycle)
    }
}

/// Parse a TDirectory streamer and return its `seek_keys`.
pub fn read_directory_streamer(r: &mut RBuffer) -> Result<u64> {
    let version = r.read_u16()?;
    let _datime_c = r.read_u32()?;
    let _datime_m = r.read_u32()?;
    let _nbytes_keys = r.read_u32()?;
    let _nbytes_name = r.read_u32()?;

    let seek_keys = if version > 1000 {
        let _seek_dir = r.read_u64()?;
        let _seek_parent = r.read_u64()?;
        r.read_u64()?
    } else {
        let _seek_dir = r.read_u32()?;
        let _seek_parent = r.read_u32()?;
        r.read_u32()? as u64
    };
    Ok(seek_keys)
}
