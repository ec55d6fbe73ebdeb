use std::{any::type_name, fmt::Debug, io::ErrorKind};

use crate::codec::{DecodeByteSource, DecodeValue, EncodeBytesSink, EncodeValue};

fn length_overflow<L>(size: usize) -> std::io::Error {
    std::io::Error::new(
        ErrorKind::InvalidInput,
        format!("{size} bytes does not fit in a {} length", type_name::<L>()),
    )
}

/// Opaque bytes whose size is prefixed on the wire as `L`.
///
/// Convenience wrapper for `PrefixedList<u8, L>`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrefixedBlob<L>(pub PrefixedList<u8, L>);

impl<L: TryFrom<usize>> PrefixedBlob<L> {
    pub fn new(inner_blob: Vec<u8>) -> std::io::Result<Self> {
        let size = inner_blob.len();
        let length: L = size.try_into().map_err(|_| length_overflow::<L>(size))?;
        Ok(Self(PrefixedList {
            length,
            items: inner_blob,
        }))
    }
}

impl<L> PrefixedBlob<L> {
    pub fn blob(&self) -> &[u8] {
        &self.0.items
    }
}

impl<L> Debug for PrefixedBlob<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // certificates and key shares are noise in logs, the size is enough
        f.debug_tuple("PrefixedBlob")
            .field(&self.blob().len())
            .finish()
    }
}

impl<L> DecodeValue for PrefixedBlob<L>
where
    L: Copy + Into<usize> + DecodeValue,
{
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let (inner, remaining) = buffer.decode_value()?;
        Ok((Self(inner), remaining))
    }
}

impl<L> EncodeValue for PrefixedBlob<L>
where
    L: EncodeValue,
{
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        buffer.encode_value(&self.0)?;
        Ok(())
    }
}

/// A list of `T` whose size in bytes (not its count) is prefixed on the wire
/// as `L`. A list of 100 u16's has count 100 and size 200.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixedList<T, L> {
    length: L,
    items: Vec<T>,
}

impl<T, L> PrefixedList<T, L>
where
    L: Copy + Into<usize>,
{
    /// Number of bytes written after the length header.
    pub fn size(&self) -> usize {
        self.length.into()
    }

    pub fn list(&self) -> &[T] {
        &self.items
    }
}

impl<T, L> PrefixedList<T, L>
where
    L: TryFrom<usize>,
    T: EncodeValue,
{
    /// Build a list, computing the byte length from the encoded items.
    ///
    /// Unlike a fixed-width shortcut this handles items whose encodings differ
    /// in size, e.g. extensions.
    pub fn new(items: Vec<T>) -> std::io::Result<Self> {
        let mut size = 0;
        for item in &items {
            size += item.encode_to_vec()?.len();
        }
        let length: L = size.try_into().map_err(|_| length_overflow::<L>(size))?;
        Ok(Self { length, items })
    }
}

impl<T, L> DecodeValue for PrefixedList<T, L>
where
    L: Copy + Into<usize> + DecodeValue,
    T: DecodeValue,
{
    fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
        let (length, buffer): (L, &[u8]) = buffer.decode_value()?;
        let length_usize: usize = length.into();

        if buffer.len() < length_usize {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "{} bytes available for PrefixedList of {} with {} length {}",
                    buffer.len(),
                    type_name::<T>(),
                    type_name::<L>(),
                    length_usize,
                ),
            ));
        }

        // items must decode out of exactly `length` bytes, never past them
        let (mut list_buffer, remaining) = buffer.split_at(length_usize);
        let mut items: Vec<T> = Vec::new();
        while !list_buffer.is_empty() {
            let (item, rest) = list_buffer.decode_value().map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    std::io::Error::new(ErrorKind::InvalidData, "corrupted list length")
                } else {
                    e
                }
            })?;
            items.push(item);
            list_buffer = rest;
        }

        Ok((Self { length, items }, remaining))
    }
}

impl<T, L> EncodeValue for PrefixedList<T, L>
where
    T: EncodeValue,
    L: EncodeValue,
{
    fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
        buffer.encode_value(&self.length)?;
        for item in &self.items {
            buffer.encode_value(item)?;
        }
        Ok(())
    }
}
