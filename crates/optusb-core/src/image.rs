//! Program image loading

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::ImageError;
use crate::protocol::{word_count, MAX_IMAGE_SIZE, WORD_SIZE};

/// An immutable multiboot program, 1 to [`MAX_IMAGE_SIZE`] bytes long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    data: Vec<u8>,
}

impl ProgramImage {
    /// Wrap an in-memory image, validating its length
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ImageError> {
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        if data.len() > MAX_IMAGE_SIZE {
            return Err(ImageError::TooLarge { len: data.len() });
        }
        Ok(Self { data })
    }

    /// Read an image from a file
    ///
    /// At most one byte past the buffer capacity is read, which is enough to
    /// tell an oversized file apart from one that fits exactly.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut data = Vec::with_capacity(MAX_IMAGE_SIZE);
        file.take(MAX_IMAGE_SIZE as u64 + 1)
            .read_to_end(&mut data)
            .map_err(|source| ImageError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        log::debug!("Read {} bytes from {}", data.len(), path.display());
        Self::from_bytes(data)
    }

    /// Image bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Image length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; an empty image cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of 4-byte words the padded image occupies
    pub fn word_count(&self) -> usize {
        word_count(self.data.len())
    }

    /// The image followed by zero padding up to the next word boundary
    pub fn padded(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.word_count() * WORD_SIZE);
        buf.extend_from_slice(&self.data);
        buf.resize(self.word_count() * WORD_SIZE, 0);
        buf
    }
}
