//! Storage abstraction layer for Satchel.
//!
//! The index never touches the filesystem directly: every file it reads or
//! writes goes through a [`Storage`] backend. [`file::FileStorage`] keeps an
//! index in a directory on device; [`memory::MemoryStorage`] keeps it in RAM
//! for tests and throwaway indexes.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//!
//! use satchel::storage::memory::MemoryStorage;
//! use satchel::storage::{Storage, StorageOutput, read_file};
//!
//! # fn main() -> satchel::error::Result<()> {
//! let storage = MemoryStorage::new();
//! let mut output = storage.create_output("hello.bin")?;
//! output.write_all(b"hello")?;
//! output.flush_and_sync()?;
//!
//! assert_eq!(read_file(&storage, "hello.bin")?, b"hello");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod structured;

/// A trait for storage backends that can store and retrieve named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Atomically rename a file, replacing `new_name` if it exists.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make renames and deletions durable.
    fn sync(&self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Number of bytes written so far.
    fn position(&self) -> u64;
}

/// Read a whole file into memory.
pub fn read_file(storage: &dyn Storage, name: &str) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name)?;
    let size = input.size()? as usize;

    let mut data = Vec::new();
    data.try_reserve_exact(size)?;
    input.read_to_end(&mut data)?;

    Ok(data)
}

/// Write `data` to a file and sync it, returning the number of bytes written.
pub fn write_file(storage: &dyn Storage, name: &str, data: &[u8]) -> Result<u64> {
    let mut output = storage.create_output(name)?;
    output.write_all(data)?;
    output.flush_and_sync()?;

    Ok(output.position())
}
