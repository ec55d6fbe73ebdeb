//! Serialization traits for the TLS wire types.
//!
//! Values decode from a plain `&[u8]` and hand back whatever bytes they did not
//! consume, and encode by appending to a `Vec<u8>`. The probe builds messages
//! that are intentionally split and reordered after encoding, so everything
//! works on owned byte vectors rather than on a streaming writer.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, ErrorKind, Read, Write};

/// A source that values can be decoded from.
pub trait DecodeByteSource<T: DecodeValue>: Sized {
    fn decode_value(&self) -> io::Result<(T, Self)>;
    fn decode_value_exact(&self) -> io::Result<T>;
}

/// A sink that values can be encoded to. Only implemented for `Vec<u8>`.
pub trait EncodeBytesSink<T: EncodeValue>: Sized {
    fn encode_value(&mut self, value: &T) -> io::Result<()>;
}

/// A type that can be decoded from bytes.
pub trait DecodeValue: Sized {
    /// Decode the value from `buffer`, returning any remaining bytes.
    fn decode_from(buffer: &[u8]) -> io::Result<(Self, &[u8])>;

    /// Decode the value from `buffer`, which must be consumed entirely.
    fn decode_from_exact(buffer: &[u8]) -> io::Result<Self> {
        let (value, remaining) = Self::decode_from(buffer)?;
        if remaining.is_empty() {
            Ok(value)
        } else {
            Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "{} trailing bytes after {}",
                    remaining.len(),
                    std::any::type_name::<Self>()
                ),
            ))
        }
    }
}

/// A type that can only be decoded with information from earlier in the
/// handshake.
///
/// - ServerKeyExchange: the layout depends on the key exchange of the cipher
///   the server picked in its ServerHello.
/// - Finished: `verify_data` is not length prefixed, its size is fixed by the
///   negotiated protocol.
pub trait DecodeValueWithContext: Sized {
    type Context;

    fn decode_from_with_context(
        buffer: &[u8],
        context: Self::Context,
    ) -> io::Result<(Self, &[u8])>;
}

/// A type that can be encoded into bytes.
pub trait EncodeValue: Sized {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()>;

    fn encode_to_vec(&self) -> io::Result<Vec<u8>> {
        // a ClientHello with the default parameters lands a bit under this
        const AVERAGE_LENGTH_GUESS: usize = 128;

        let mut buffer = Vec::with_capacity(AVERAGE_LENGTH_GUESS);
        self.encode_to(&mut buffer)?;
        Ok(buffer)
    }
}

impl<T: DecodeValue> DecodeByteSource<T> for &[u8] {
    fn decode_value(&self) -> io::Result<(T, Self)> {
        T::decode_from(self)
    }

    fn decode_value_exact(&self) -> io::Result<T> {
        T::decode_from_exact(self)
    }
}

impl<T: EncodeValue> EncodeBytesSink<T> for Vec<u8> {
    fn encode_value(&mut self, value: &T) -> io::Result<()> {
        value.encode_to(self)
    }
}

impl DecodeValue for u8 {
    fn decode_from(mut buffer: &[u8]) -> io::Result<(Self, &[u8])> {
        let value = buffer.read_u8()?;
        Ok((value, buffer))
    }
}

impl DecodeValue for u16 {
    fn decode_from(mut buffer: &[u8]) -> io::Result<(Self, &[u8])> {
        let value = buffer.read_u16::<BigEndian>()?;
        Ok((value, buffer))
    }
}

impl DecodeValue for u32 {
    fn decode_from(mut buffer: &[u8]) -> io::Result<(Self, &[u8])> {
        let value = buffer.read_u32::<BigEndian>()?;
        Ok((value, buffer))
    }
}

impl EncodeValue for u8 {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        buffer.write_all(&[*self])?;
        Ok(())
    }
}

impl EncodeValue for u16 {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        buffer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

impl EncodeValue for u32 {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        buffer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

/// Used for the record sequence number in MAC and AEAD inputs.
impl EncodeValue for u64 {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        buffer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

impl<const L: usize> DecodeValue for [u8; L] {
    fn decode_from(mut buffer: &[u8]) -> io::Result<(Self, &[u8])> {
        let mut value = [0; L];
        buffer.read_exact(&mut value)?;
        Ok((value, buffer))
    }
}

impl<const L: usize> EncodeValue for [u8; L] {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        buffer.write_all(self)?;
        Ok(())
    }
}

// Decoding an Option<T> needs message specific knowledge, so only encode is
// provided. `None` writes nothing.
impl<T: EncodeValue> EncodeValue for Option<T> {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        if let Some(v) = self {
            v.encode_to(buffer)?
        }
        Ok(())
    }
}

impl<T: EncodeValue> EncodeValue for Vec<T> {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        for item in self {
            item.encode_to(buffer)?;
        }
        Ok(())
    }
}

/// Three byte big endian integer, used for handshake message and certificate
/// list lengths.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct U24(pub u32);

impl U24 {
    pub const MAX: u32 = 0x00FF_FFFF;
}

impl DecodeValue for U24 {
    fn decode_from(mut buffer: &[u8]) -> io::Result<(Self, &[u8])> {
        let u24 = buffer.read_u24::<BigEndian>()?;
        Ok((U24(u24), buffer))
    }
}

impl EncodeValue for U24 {
    fn encode_to(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        if self.0 > Self::MAX {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} does not fit in a u24", self.0),
            ));
        }
        buffer.write_all(&self.0.to_be_bytes()[1..])?;
        Ok(())
    }
}

impl TryFrom<usize> for U24 {
    type Error = io::Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match u32::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{value} does not fit in a u24"),
            )),
        }
    }
}

impl From<U24> for usize {
    fn from(val: U24) -> Self {
        val.0 as _
    }
}
