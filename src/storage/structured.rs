//! Structured binary I/O for index files.
//!
//! Every index file has the same frame:
//!
//! ```text
//! magic (4 bytes) | version (u16 LE) | body ... | crc32 (u32 LE, over everything before it)
//! ```
//!
//! [`StructWriter`] produces that frame while the body is written field by
//! field; [`verify_frame`] checks it on load and hands back the body, which
//! [`StructReader`] then decodes.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, SatchelError};
use crate::util::varint::{encode_u64_into, encoded_len, read_u64};

/// Size of the magic + version header.
pub const HEADER_LEN: usize = 6;
/// Size of the CRC32 trailer.
pub const TRAILER_LEN: usize = 4;

/// A structured writer for binary data.
///
/// A running CRC32 covers every byte written; [`StructWriter::finish`]
/// appends it as the trailer.
pub struct StructWriter<W: Write> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
    scratch: Vec<u8>,
}

impl<W: Write> StructWriter<W> {
    /// Create a new structured writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
            scratch: Vec::with_capacity(10),
        }
    }

    /// Write the file header.
    pub fn write_header(&mut self, magic: &[u8; 4], version: u16) -> Result<()> {
        self.write_raw(magic)?;
        self.write_u16(version)
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    /// Write a u16 value (little-endian).
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write an i64 value (little-endian).
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        encode_u64_into(value, &mut scratch);
        let result = self.write_raw(&scratch);
        self.scratch = scratch;
        result
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes with length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.write_raw(value)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.hasher.update(value);
        self.position += value.len() as u64;
        Ok(())
    }

    /// Write a sorted integer array using delta encoding.
    pub fn write_delta_compressed_u32s(&mut self, values: &[u32]) -> Result<()> {
        self.write_varint(values.len() as u64)?;

        let mut previous = 0u32;
        for &value in values {
            self.write_varint(value.wrapping_sub(previous) as u64)?;
            previous = value;
        }

        Ok(())
    }

    /// Get current position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append the CRC32 trailer and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let checksum = self.hasher.clone().finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Check the frame of a loaded file and return its body.
///
/// `what` names the file in error messages.
pub fn verify_frame<'a>(data: &'a [u8], magic: &[u8; 4], version: u16, what: &str) -> Result<&'a [u8]> {
    if data.len() < HEADER_LEN + TRAILER_LEN {
        return Err(SatchelError::corrupt(format!(
            "{what}: file too short ({} bytes)",
            data.len()
        )));
    }

    if &data[..4] != magic {
        return Err(SatchelError::corrupt(format!("{what}: bad magic")));
    }

    let found_version = u16::from_le_bytes([data[4], data[5]]);
    if found_version != version {
        return Err(SatchelError::corrupt(format!(
            "{what}: unsupported format version {found_version} (expected {version})"
        )));
    }

    let (content, trailer) = data.split_at(data.len() - TRAILER_LEN);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32fast::hash(content);
    if stored != actual {
        return Err(SatchelError::corrupt(format!(
            "{what}: checksum mismatch (stored {stored:08x}, computed {actual:08x})"
        )));
    }

    Ok(&content[HEADER_LEN..])
}

/// CRC32 of a whole file, as recorded in the manifest.
pub fn file_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Map a premature end of data to a corruption error.
fn truncated(err: io::Error) -> SatchelError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SatchelError::corrupt("unexpected end of data")
    } else {
        SatchelError::Io(err)
    }
}

/// A structured reader for binary data written by [`StructWriter`].
pub struct StructReader<R: Read> {
    reader: R,
    position: u64,
}

impl<R: Read> StructReader<R> {
    /// Create a new structured reader.
    pub fn new(reader: R) -> Self {
        StructReader {
            reader,
            position: 0,
        }
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.reader.read_u8().map_err(truncated)?;
        self.position += 1;
        Ok(value)
    }

    /// Read a u16 value (little-endian).
    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.reader.read_u16::<LittleEndian>().map_err(truncated)?;
        self.position += 2;
        Ok(value)
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>().map_err(truncated)?;
        self.position += 4;
        Ok(value)
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.reader.read_u64::<LittleEndian>().map_err(truncated)?;
        self.position += 8;
        Ok(value)
    }

    /// Read an i64 value (little-endian).
    pub fn read_i64(&mut self) -> Result<i64> {
        let value = self.reader.read_i64::<LittleEndian>().map_err(truncated)?;
        self.position += 8;
        Ok(value)
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let value = read_u64(&mut self.reader).map_err(|e| match e {
            SatchelError::Io(io_err) => truncated(io_err),
            other => other,
        })?;
        self.position += encoded_len(value) as u64;
        Ok(value)
    }

    /// Read a variable-length integer that must fit in a u32.
    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| SatchelError::corrupt(format!("value {value} out of range")))
    }

    /// Read a string with length prefix.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| SatchelError::corrupt(format!("invalid UTF-8: {e}")))
    }

    /// Read bytes with length prefix.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let length = self.read_varint()?;
        self.read_raw(length)
    }

    /// Read an exact number of raw bytes.
    ///
    /// The length is never trusted for allocation; a bogus length on a short
    /// input fails as corruption instead of reserving gigabytes.
    pub fn read_raw(&mut self, length: u64) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        (&mut self.reader).take(length).read_to_end(&mut bytes)?;

        if bytes.len() as u64 != length {
            return Err(SatchelError::corrupt("unexpected end of data"));
        }

        self.position += length;
        Ok(bytes)
    }

    /// Read a delta-compressed integer array.
    pub fn read_delta_compressed_u32s(&mut self) -> Result<Vec<u32>> {
        let length = self.read_varint()? as usize;

        let mut values = Vec::new();
        let mut previous = 0u32;

        for _ in 0..length {
            let delta = self.read_varint_u32()?;
            let value = previous.wrapping_add(delta);
            values.push(value);
            previous = value;
        }

        Ok(values)
    }

    /// Get current position.
    pub fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    fn framed_sample() -> Vec<u8> {
        let mut writer = StructWriter::new(Vec::new());
        writer.write_header(b"TEST", 3).unwrap();
        writer.write_u8(42).unwrap();
        writer.write_u16(1234).unwrap();
        writer.write_u32(5678).unwrap();
        writer.write_u64(9876543210).unwrap();
        writer.write_i64(-17).unwrap();
        writer.write_varint(12345).unwrap();
        writer.write_string("Hello, World!").unwrap();
        writer.write_bytes(b"binary data").unwrap();
        writer.write_delta_compressed_u32s(&[1, 5, 10, 15, 25]).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_struct_writer_reader() {
        let data = framed_sample();
        let body = verify_frame(&data, b"TEST", 3, "sample").unwrap();
        let mut reader = StructReader::new(Cursor::new(body));

        assert_eq!(reader.read_u8().unwrap(), 42);
        assert_eq!(reader.read_u16().unwrap(), 1234);
        assert_eq!(reader.read_u32().unwrap(), 5678);
        assert_eq!(reader.read_u64().unwrap(), 9876543210);
        assert_eq!(reader.read_i64().unwrap(), -17);
        assert_eq!(reader.read_varint().unwrap(), 12345);
        assert_eq!(reader.read_string().unwrap(), "Hello, World!");
        assert_eq!(reader.read_bytes().unwrap(), b"binary data");
        assert_eq!(
            reader.read_delta_compressed_u32s().unwrap(),
            vec![1, 5, 10, 15, 25]
        );
        assert_eq!(reader.position(), body.len() as u64);
    }

    #[test]
    fn test_checksum_accumulates_over_whole_file() {
        let mut data = framed_sample();
        // Flip a byte early in the body; a checksum over only the last write
        // would miss this.
        data[HEADER_LEN] ^= 0xFF;

        let err = verify_frame(&data, b"TEST", 3, "sample").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_frame_rejects_magic_and_version() {
        let data = framed_sample();

        let err = verify_frame(&data, b"NOPE", 3, "sample").unwrap_err();
        assert!(err.to_string().contains("bad magic"));

        let err = verify_frame(&data, b"TEST", 4, "sample").unwrap_err();
        assert!(err.to_string().contains("unsupported format version 3"));

        let err = verify_frame(&data[..5], b"TEST", 3, "sample").unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_truncated_body_is_corrupt() {
        let mut writer = StructWriter::new(Vec::new());
        writer.write_varint(1_000_000).unwrap();
        let data = writer.finish().unwrap();

        // A length prefix claiming far more than remains.
        let mut reader = StructReader::new(Cursor::new(&data[..3]));
        let err = reader.read_bytes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptIndex);

        let mut reader = StructReader::new(Cursor::new(&[][..]));
        assert_eq!(reader.read_u32().unwrap_err().kind(), ErrorKind::CorruptIndex);
    }
}
