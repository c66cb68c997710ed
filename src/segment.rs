use std::{
    borrow::Cow,
    io::{Read, Seek, SeekFrom, Write},
};

use tracing::trace;

use crate::{
    helpers::fixed_name,
    macho::{MachOErr, MachOResult},
};

/// Verbatim on-disk bytes of one segment. Offsets are relative to the start
/// of the owning object, which is not the file start inside a fat slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub segname: [u8; 16],
    pub fileoff: u64,
    pub filesize: u64,
    pub bytes: Vec<u8>,
}

impl DataSegment {
    pub fn read<T: Read + Seek>(
        buf: &mut T,
        start: u64,
        segname: [u8; 16],
        fileoff: u64,
        filesize: u64,
    ) -> MachOResult<Self> {
        let mut bytes = Vec::new();
        if filesize > 0 {
            buf.seek(SeekFrom::Start(start + fileoff))?;
            buf.by_ref().take(filesize).read_to_end(&mut bytes)?;
            if bytes.len() as u64 != filesize {
                return Err(MachOErr::ParsingError(format!(
                    "segment {} truncated: expected {:#x} bytes at {:#x}, got {:#x}",
                    fixed_name(&segname),
                    filesize,
                    fileoff,
                    bytes.len()
                )));
            }
        }
        trace!(segment = %fixed_name(&segname), fileoff, filesize, "read segment data");

        Ok(DataSegment {
            segname,
            fileoff,
            filesize,
            bytes,
        })
    }

    pub fn name(&self) -> Cow<'_, str> {
        fixed_name(&self.segname)
    }

    pub fn end(&self) -> u64 {
        self.fileoff + self.filesize
    }

    /// Writes the segment relative to `start`. Bytes below `data_begins`
    /// were already emitted as the header and command table and are skipped.
    /// Bytes in `[data_begins, stale_end)` held the previous, longer command
    /// table and are written as zeros.
    pub fn write<W: Write + Seek>(
        &self,
        out: &mut W,
        start: u64,
        data_begins: u64,
        stale_end: u64,
    ) -> MachOResult<()> {
        if self.filesize == 0 || self.end() <= data_begins {
            return Ok(());
        }

        if self.fileoff >= data_begins {
            out.seek(SeekFrom::Start(start + self.fileoff))?;
            out.write_all(&self.bytes)?;
            return Ok(());
        }

        let tail = &self.bytes[(data_begins - self.fileoff) as usize..];
        let stale = (stale_end.saturating_sub(data_begins) as usize).min(tail.len());
        out.seek(SeekFrom::Start(start + data_begins))?;
        out.write_all(&vec![0u8; stale])?;
        out.write_all(&tail[stale..])?;
        trace!(
            segment = %self.name(),
            skipped = data_begins - self.fileoff,
            zeroed = stale,
            "wrote header segment tail"
        );
        Ok(())
    }
}
