use std::fs;
use std::path::{Path, PathBuf};

use super::directory::{Directory, read_directory_streamer};
use super::error::{Result, RootError};
use super::key::Key;
use super::rbuffer::RBuffer;
use super::th1::read_histogram;
use crate::hist::Histogram;

const ROOT_MAGIC: &[u8; 4] = b"root";

/// Files with a format version at or above this use 64-bit seek pointers.
const LARGE_FILE_VERSION: u32 = 1_000_000;

/// A ROOT file read fully into memory.
pub struct RootFile {
    data: Vec<u8>,
    is_large: bool,
    seek_keys: u64,
    path: PathBuf,
}

/// Name and class of a top-level key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub class_name: String,
    pub cycle: u16,
}

impl RootFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        Self::from_bytes(data, path)
    }

    /// Parse an in-memory file image.
    pub fn from_bytes(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        if data.len() < 64 || &data[0..4] != ROOT_MAGIC {
            return Err(RootError::BadMagic);
        }

        // File header:
        //   magic, fVersion, fBEGIN, fEND, fSeekFree, fNbytesFree, nfree,
        //   fNbytesName, fUnits, fCompress, fSeekInfo, fNbytesInfo, fUUID
        // fEND/fSeekFree/fSeekInfo widen to 64 bits in large files.
        let mut r = RBuffer::new(&data);
        r.skip(4)?;
        let version = r.read_u32()?;
        let is_large = version >= LARGE_FILE_VERSION;
        let begin = r.read_u32()? as usize;
        if is_large {
            r.skip(16)?;
        } else {
            r.skip(8)?;
        }
        let _nbytes_free = r.read_u32()?;
        let _nfree = r.read_u32()?;
        let nbytes_name = r.read_u32()? as usize;

        // The top directory streamer follows the file's own key and name.
        let dir_offset = begin + nbytes_name;
        if dir_offset >= data.len() {
            return Err(RootError::Deserialization(
                "top directory offset past end of file".into(),
            ));
        }
        r.set_pos(dir_offset);
        let seek_keys = read_directory_streamer(&mut r)?;

        Ok(Self {
            data,
            is_large,
            seek_keys,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List the keys of the top-level directory.
    pub fn list_keys(&self) -> Result<Vec<KeyInfo>> {
        let dir = self.top_directory()?;
        Ok(dir
            .keys()
            .iter()
            .map(|k| KeyInfo {
                name: k.name.clone(),
                class_name: k.class_name.clone(),
                cycle: k.cycle,
            })
            .collect())
    }

    /// Read a histogram by path, e.g. `"2011AB_mu_data_num"` or `"dir/name"`.
    pub fn get_histogram(&self, path: &str) -> Result<Histogram> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((leaf, dirs)) = parts.split_last() else {
            return Err(RootError::KeyNotFound(path.to_string()));
        };

        let mut dir = self.top_directory()?;
        for part in dirs {
            let key = dir
                .find_key(part)
                .ok_or_else(|| RootError::KeyNotFound(format!("{part} (in path {path})")))?;
            if key.class_name != "TDirectoryFile" && key.class_name != "TDirectory" {
                return Err(RootError::Deserialization(format!(
                    "'{part}' is not a directory (class {})",
                    key.class_name
                )));
            }
            dir = self.subdirectory(key)?;
        }

        let key = dir
            .find_key(leaf)
            .ok_or_else(|| RootError::KeyNotFound(path.to_string()))?;
        let payload = key.payload(&self.data)?;
        read_histogram(&payload, &key.class_name)
    }

    fn top_directory(&self) -> Result<Directory> {
        Directory::read_key_list(&self.data, self.seek_keys as usize, self.is_large)
    }

    fn subdirectory(&self, key: &Key) -> Result<Directory> {
        let payload = key.payload(&self.data)?;
        Directory::read_from_payload(&payload, &self.data, self.is_large)
    }
}
