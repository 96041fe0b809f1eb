use std::{marker::PhantomData, mem};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("read of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfRange {
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("string offset {offset} exceeded data length of {size} bytes")]
    StringOffset { offset: usize, size: usize },
    #[error("string at offset {0} was unterminated")]
    UnterminatedString(usize),
    #[error("offset {anchor} + {relative} is negative")]
    NegativeOffset { anchor: usize, relative: i64 },
}

/// Bounds checked cursor over a little endian byte buffer.
#[derive(Clone, Copy, Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), ReadError> {
        if offset > self.data.len() {
            return Err(ReadError::OutOfRange {
                offset,
                len: 0,
                size: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], ReadError> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(ReadError::OutOfRange {
                offset: self.pos,
                len: count,
                size: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read<T: bytemuck::Pod>(&mut self) -> Result<T, ReadError> {
        let bytes = self.read_bytes(mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_at<T: bytemuck::Pod>(&mut self, offset: usize) -> Result<T, ReadError> {
        self.seek(offset)?;
        self.read()
    }

    pub fn read_array<T: BinaryData>(&mut self, count: usize) -> Result<Vec<T>, ReadError> {
        // Guard the allocation against absurd counts from corrupt headers.
        let mut v = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            v.push(T::read(self)?);
        }
        Ok(v)
    }

    /// NUL terminated string starting at `offset`. Invalid UTF-8 is replaced.
    pub fn read_cstr(&self, offset: usize) -> Result<String, ReadError> {
        if offset >= self.data.len() {
            return Err(ReadError::StringOffset {
                offset,
                size: self.data.len(),
            });
        }
        let tail = &self.data[offset..];
        match tail.iter().position(|b| *b == 0) {
            Some(end) => Ok(String::from_utf8_lossy(&tail[..end]).into_owned()),
            None => Err(ReadError::UnterminatedString(offset)),
        }
    }
}

pub trait BinaryData: Sized {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self, ReadError>;
}

impl<T: bytemuck::Pod> BinaryData for T {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self, ReadError> {
        reader.read()
    }
}

/// Item read from a table, tagged with where it came from.
/// The file offset is the anchor for any offsets stored inside the item.
#[derive(Copy, Clone, Debug)]
pub struct MetaItem<T> {
    pub offset: usize,
    pub index: usize,
    pub item: T,
}

/// Signed displacement from some anchor (file start, or the record holding it).
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Zeroable, bytemuck::Pod)]
pub struct BinOffset {
    pub index: i32,
}

impl BinOffset {
    pub fn new(index: i32) -> Self {
        Self { index }
    }

    pub fn resolve(&self, anchor: usize) -> Result<usize, ReadError> {
        resolve_offset(anchor, self.index as i64)
    }

    pub fn read_str(&self, reader: &BinaryReader<'_>, anchor: usize) -> Result<String, ReadError> {
        reader.read_cstr(self.resolve(anchor)?)
    }
}

pub fn resolve_offset(anchor: usize, relative: i64) -> Result<usize, ReadError> {
    let absolute = anchor as i64 + relative;
    if absolute < 0 {
        Err(ReadError::NegativeOffset { anchor, relative })
    } else {
        Ok(absolute as usize)
    }
}

/// Struct of (count, offset) for reading an array of items
#[repr(C, packed)]
pub struct BinArray<T> {
    pub count: i32,
    pub offset: BinOffset,
    _p: PhantomData<T>,
}

impl<T> BinArray<T> {
    pub fn new(count: i32, offset: i32) -> Self {
        Self {
            count,
            offset: BinOffset::new(offset),
            _p: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.count.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: BinaryData> BinArray<T> {
    /// Absolute offset of item `index`, without reading it.
    pub fn item_offset(&self, anchor: usize, index: usize) -> Result<usize, ReadError> {
        Ok(self.offset.resolve(anchor)? + index * mem::size_of::<T>())
    }

    pub fn read(
        &self,
        reader: &mut BinaryReader<'_>,
        anchor: usize,
    ) -> Result<Vec<MetaItem<T>>, ReadError> {
        let start = self.offset.resolve(anchor)?;
        reader.seek(start)?;
        let mut v = Vec::with_capacity(self.len().min(reader.remaining()));
        for index in 0..self.len() {
            let offset = reader.position();
            v.push(MetaItem {
                offset,
                index,
                item: T::read(reader)?,
            });
        }
        Ok(v)
    }

    pub fn read_f(&self, reader: &mut BinaryReader<'_>, anchor: usize) -> Result<Vec<T>, ReadError> {
        reader.seek(self.offset.resolve(anchor)?)?;
        reader.read_array(self.len())
    }
}

// Derives would put bounds on T, which only ever appears as a marker.
impl<T> Clone for BinArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for BinArray<T> {}
unsafe impl<T> bytemuck::Zeroable for BinArray<T> {}
unsafe impl<T: 'static> bytemuck::Pod for BinArray<T> {}

impl<T> std::fmt::Debug for BinArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.count;
        let offset = self.offset.index;
        f.debug_struct("BinArray")
            .field("count", &count)
            .field("offset", &offset)
            .finish()
    }
}
