use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_SYMTAB`. The symbol and string tables themselves live in
/// `__LINKEDIT` and are carried as segment bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymtabCommand {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

impl<'a> LoadCommandParser<'a> for SymtabCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let endian = ctx.endian;
        let (cursor, symoff) = endian.u32(&ldcmd.payload)?;
        let (cursor, nsyms) = endian.u32(cursor)?;
        let (cursor, stroff) = endian.u32(cursor)?;
        let (_, strsize) = endian.u32(cursor)?;

        Ok(SymtabCommand {
            symoff,
            nsyms,
            stroff,
            strsize,
        })
    }
}
