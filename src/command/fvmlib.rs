use std::borrow::Cow;

use crate::macho::MachOResult;

use super::{CommandCtx, LcStr, LoadCommand, LoadCommandParser};

/// `LC_LOADFVMLIB` / `LC_IDFVMLIB`, fixed virtual memory shared libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FvmlibCommand<'a> {
    pub name: Cow<'a, str>,
    pub minor_version: u32,
    pub header_addr: u32,
}

impl<'a> LoadCommandParser<'a> for FvmlibCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let endian = ctx.endian;
        let (cursor, name_offset) = LcStr::parse(&ldcmd.payload, endian)?;
        let (cursor, minor_version) = endian.u32(cursor)?;
        let (_, header_addr) = endian.u32(cursor)?;

        Ok(FvmlibCommand {
            name: name_offset.resolve(&ldcmd.payload)?,
            minor_version,
            header_addr,
        })
    }
}

/// `LC_FVMFILE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FvmfileCommand<'a> {
    pub name: Cow<'a, str>,
    pub header_addr: u32,
}

impl<'a> LoadCommandParser<'a> for FvmfileCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (cursor, name_offset) = LcStr::parse(&ldcmd.payload, ctx.endian)?;
        let (_, header_addr) = ctx.endian.u32(cursor)?;

        Ok(FvmfileCommand {
            name: name_offset.resolve(&ldcmd.payload)?,
            header_addr,
        })
    }
}
