use std::borrow::Cow;

use crate::macho::{MachOErr, MachOResult};

use super::{CommandCtx, LcStr, LoadCommand, LoadCommandBase, LoadCommandParser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreboundDylibCommand<'a> {
    pub name: Cow<'a, str>,
    pub nmodules: u32,
    /// One bit per module, least significant bit first.
    pub linked_modules: &'a [u8],
}

impl PreboundDylibCommand<'_> {
    pub fn is_linked(&self, module: u32) -> bool {
        module < self.nmodules
            && self
                .linked_modules
                .get((module / 8) as usize)
                .is_some_and(|byte| (byte >> (module % 8)) & 1 == 1)
    }
}

impl<'a> LoadCommandParser<'a> for PreboundDylibCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let endian = ctx.endian;
        let (cursor, name_offset) = LcStr::parse(&ldcmd.payload, endian)?;
        let (cursor, nmodules) = endian.u32(cursor)?;
        let (_, linked_offset) = LcStr::parse(cursor, endian)?;

        let start = linked_offset
            .offset
            .checked_sub(LoadCommandBase::SIZE)
            .map(|start| start as usize)
            .unwrap_or(usize::MAX);
        let end = start.saturating_add(nmodules.div_ceil(8) as usize);
        let linked_modules = ldcmd.payload.get(start..end).ok_or_else(|| {
            MachOErr::InvalidValue(format!(
                "linked module bits at {} overrun command of {} bytes",
                linked_offset.offset, ldcmd.cmdsize
            ))
        })?;

        Ok(PreboundDylibCommand {
            name: name_offset.resolve(&ldcmd.payload)?,
            nmodules,
            linked_modules,
        })
    }
}
