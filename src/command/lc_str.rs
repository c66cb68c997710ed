use std::borrow::Cow;

use nom::IResult;
use tracing::{trace, warn};

use crate::{
    endian::Endian,
    helpers::{align_up, string_upto_null_terminator},
    macho::{MachOErr, MachOResult},
};

use super::{CommandCtx, LoadCommand, LoadCommandBase};

/// A string embedded in a load command, addressed by its offset from the
/// start of the command (prefix included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcStr {
    pub offset: u32,
}

impl LcStr {
    pub fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], LcStr> {
        let (bytes, offset) = endian.u32(bytes)?;
        Ok((bytes, LcStr { offset }))
    }

    /// Index of the string inside the command payload.
    fn payload_index(&self, payload: &[u8]) -> MachOResult<usize> {
        self.offset
            .checked_sub(LoadCommandBase::SIZE)
            .map(|start| start as usize)
            .filter(|&start| start <= payload.len())
            .ok_or_else(|| {
                MachOErr::InvalidValue(format!(
                    "string offset {} outside command of {} bytes",
                    self.offset,
                    payload.len() + LoadCommandBase::SIZE as usize
                ))
            })
    }

    pub fn resolve<'a>(&self, payload: &'a [u8]) -> MachOResult<Cow<'a, str>> {
        let start = self.payload_index(payload)?;
        let (_, value) = string_upto_null_terminator(&payload[start..])?;
        if let Cow::Owned(_) = value {
            warn!(
                offset = self.offset,
                value = %value,
                "string is not valid UTF-8, replaced lossily"
            );
        }
        Ok(value)
    }

    /// Replaces the string, resizing the command to the smallest aligned
    /// size that holds the value plus a NUL. Bytes before the string are kept
    /// and everything after it is zero.
    pub fn rewrite(
        &self,
        ldcmd: &mut LoadCommand,
        value: &str,
        ctx: CommandCtx,
    ) -> MachOResult<()> {
        if value.as_bytes().contains(&0) {
            return Err(MachOErr::InvalidValue(format!(
                "string {:?} contains a NUL byte",
                value
            )));
        }

        let start = self.payload_index(&ldcmd.payload)?;
        let cmdsize = align_up(
            self.offset as u64 + value.len() as u64 + 1,
            ctx.alignment() as u64,
        );
        let cmdsize = u32::try_from(cmdsize).map_err(|_| {
            MachOErr::InvalidValue(format!("string of {} bytes is too long", value.len()))
        })?;

        let mut payload = vec![0u8; (cmdsize - LoadCommandBase::SIZE) as usize];
        payload[..start].copy_from_slice(&ldcmd.payload[..start]);
        payload[start..start + value.len()].copy_from_slice(value.as_bytes());

        trace!(
            cmd = %ldcmd.name(),
            old_size = ldcmd.cmdsize,
            new_size = cmdsize,
            "rewrote embedded string"
        );
        ldcmd.set_payload(payload);
        Ok(())
    }
}
