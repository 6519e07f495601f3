//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, SatchelError};
use crate::storage::{Storage, StorageInput, StorageOutput};

const BUFFER_SIZE: usize = 64 * 1024;
const PROBE_FILE: &str = ".satchel.probe";

/// Lock file held exclusively for the lifetime of a [`FileStorage`].
pub const LOCK_FILE: &str = "satchel.lock";

/// A storage backend rooted at a directory on the local filesystem.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
    /// Whether outputs are fsynced when finished.
    sync_writes: bool,
    /// Open handle on the lock file; the OS lock is released when it closes.
    lock: File,
}

impl FileStorage {
    /// Open (creating if needed) a file storage in the given directory.
    ///
    /// Fails with `InvalidPath` when the path is an existing non-directory,
    /// cannot be created or written, or is already held by another open
    /// storage (in this or any other process).
    pub fn new<P: AsRef<Path>>(directory: P, sync_writes: bool) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if directory.exists() && !directory.is_dir() {
            return Err(SatchelError::invalid_path(format!(
                "path is not a directory: {}",
                directory.display()
            )));
        }

        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|e| {
                SatchelError::invalid_path(format!(
                    "failed to create directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        // Probe for write access up front so a read-only location fails at open
        // rather than at the first commit.
        let probe = directory.join(PROBE_FILE);
        File::create(&probe)
            .and_then(|_| std::fs::remove_file(&probe))
            .map_err(|e| {
                SatchelError::invalid_path(format!(
                    "directory is not writable {}: {e}",
                    directory.display()
                ))
            })?;

        let lock = acquire_lock(&directory)?;

        Ok(FileStorage {
            directory,
            sync_writes,
            lock,
        })
    }

    /// The root directory of this storage.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the full path for a file name.
    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.file_path(name))?;
        Ok(Box::new(FileInput::new(file)?))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.file_path(name))?;

        Ok(Box::new(FileOutput::new(file, self.sync_writes)))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();

            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name != LOCK_FILE {
                        files.push(name.to_string());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        Ok(self.file_path(name).metadata()?.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name))?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        if !self.sync_writes {
            return Ok(());
        }

        // Directory fsync persists renames on POSIX; other platforms do not
        // support opening a directory as a file.
        #[cfg(unix)]
        File::open(&self.directory)?.sync_all()?;

        Ok(())
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}

/// Take the exclusive directory lock, failing at once if it is held.
fn acquire_lock(directory: &Path) -> Result<File> {
    let path = directory.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| {
            SatchelError::invalid_path(format!("failed to open lock file {}: {e}", path.display()))
        })?;

    file.try_lock_exclusive().map_err(|e| {
        SatchelError::invalid_path(format!(
            "index directory {} is in use by another open index: {e}",
            directory.display()
        ))
    })?;

    Ok(file)
}

/// A file input implementation.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl FileInput {
    fn new(file: File) -> Result<Self> {
        let size = file.metadata()?.len();
        let reader = BufReader::with_capacity(BUFFER_SIZE, file);

        Ok(FileInput { reader, size })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A file output implementation.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    sync_writes: bool,
    position: u64,
}

impl FileOutput {
    fn new(file: File, sync_writes: bool) -> Self {
        FileOutput {
            writer: BufWriter::with_capacity(BUFFER_SIZE, file),
            sync_writes,
            position: 0,
        }
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.position += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer.flush()?;

        if self.sync_writes {
            self.writer.get_ref().sync_all()?;
        }

        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}
