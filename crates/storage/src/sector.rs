//! Sector-addressed block devices
//!
//! The persistence layer talks to storage through [`SectorDevice`]: whole
//! 512-byte sectors, no partial transfers. [`MemDisk`] backs tests and
//! embedding without a filesystem; [`FileDisk`] maps the device onto a
//! regular file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tephra_core::limits::SECTOR_SIZE;
use tephra_core::{Result, TephraError};

/// A sector-addressed storage device
///
/// Buffer lengths must be whole multiples of the sector size; transfers
/// outside the device's range fail `Invalid`.
pub trait SectorDevice {
    /// Total sectors on the device
    fn sector_count(&self) -> u64;

    /// Read whole sectors starting at `start` into `buf`
    fn read_sectors(&mut self, start: u64, buf: &mut [u8]) -> Result<()>;

    /// Write whole sectors starting at `start` from `buf`
    fn write_sectors(&mut self, start: u64, buf: &[u8]) -> Result<()>;

    /// Flush pending writes to stable storage
    fn flush(&mut self) -> Result<()>;
}

fn check_range(device_sectors: u64, start: u64, len: usize) -> Result<u64> {
    if len % SECTOR_SIZE != 0 {
        return Err(TephraError::invalid(format!(
            "transfer length {} is not a sector multiple",
            len
        )));
    }
    let count = (len / SECTOR_SIZE) as u64;
    match start.checked_add(count) {
        Some(end) if end <= device_sectors => Ok(count),
        _ => Err(TephraError::invalid(format!(
            "sectors {}+{} out of range (device has {})",
            start, count, device_sectors
        ))),
    }
}

// =============================================================================
// MemDisk
// =============================================================================

/// In-memory sector device
#[derive(Debug)]
pub struct MemDisk {
    data: Vec<u8>,
}

impl MemDisk {
    /// Create a zeroed device with `sectors` sectors
    pub fn new(sectors: u64) -> MemDisk {
        MemDisk {
            data: vec![0u8; sectors as usize * SECTOR_SIZE],
        }
    }
}

impl SectorDevice for MemDisk {
    fn sector_count(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }

    fn read_sectors(&mut self, start: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.sector_count(), start, buf.len())?;
        let base = start as usize * SECTOR_SIZE;
        buf.copy_from_slice(&self.data[base..base + buf.len()]);
        Ok(())
    }

    fn write_sectors(&mut self, start: u64, buf: &[u8]) -> Result<()> {
        check_range(self.sector_count(), start, buf.len())?;
        let base = start as usize * SECTOR_SIZE;
        self.data[base..base + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// FileDisk
// =============================================================================

/// Sector device backed by a regular file
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    sectors: u64,
}

impl FileDisk {
    /// Create (or truncate) a file sized to `sectors` sectors
    pub fn create(path: &Path, sectors: u64) -> Result<FileDisk> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(sectors * SECTOR_SIZE as u64)?;
        Ok(FileDisk { file, sectors })
    }

    /// Open an existing file as a device
    ///
    /// The file length must be a whole number of sectors.
    pub fn open(path: &Path) -> Result<FileDisk> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len % SECTOR_SIZE as u64 != 0 {
            return Err(TephraError::invalid(format!(
                "file length {} is not a sector multiple",
                len
            )));
        }
        Ok(FileDisk {
            file,
            sectors: len / SECTOR_SIZE as u64,
        })
    }
}

impl SectorDevice for FileDisk {
    fn sector_count(&self) -> u64 {
        self.sectors
    }

    fn read_sectors(&mut self, start: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.sectors, start, buf.len())?;
        self.file
            .seek(SeekFrom::Start(start * SECTOR_SIZE as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_sectors(&mut self, start: u64, buf: &[u8]) -> Result<()> {
        check_range(self.sectors, start, buf.len())?;
        self.file
            .seek(SeekFrom::Start(start * SECTOR_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
