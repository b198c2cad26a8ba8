//! Fixed-capacity byte buffers, one per copy direction

use std::io;

/// A byte buffer whose capacity is fixed at construction.
///
/// The fill length never exceeds the capacity. Once full, further
/// appends in the same iteration read nothing.
#[derive(Debug)]
pub struct DirectionBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl DirectionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Discard the contents and fill from `read`, which gets the whole
    /// buffer and returns how many bytes it wrote.
    pub fn replace_with<F>(&mut self, read: F) -> io::Result<usize>
    where
        F: FnOnce(&mut [u8]) -> io::Result<usize>,
    {
        self.len = 0;
        let n = read(&mut self.data[..])?.min(self.data.len());
        self.len = n;
        Ok(n)
    }

    /// Append into the spare capacity. `read` is not called when the
    /// buffer is already full.
    pub fn append_with<F>(&mut self, read: F) -> io::Result<usize>
    where
        F: FnOnce(&mut [u8]) -> io::Result<usize>,
    {
        if self.is_full() {
            return Ok(0);
        }
        let spare = &mut self.data[self.len..];
        let n = read(spare)?.min(spare.len());
        self.len += n;
        Ok(n)
    }
}
