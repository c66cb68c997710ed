use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// Pointer into `__LINKEDIT` used by code signature, function starts, data in
/// code, chained fixups, exports trie and friends. The blob is not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkeditDataCommand {
    pub dataoff: u32,
    pub datasize: u32,
}

impl<'a> LoadCommandParser<'a> for LinkeditDataCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (cursor, dataoff) = ctx.endian.u32(&ldcmd.payload)?;
        let (_, datasize) = ctx.endian.u32(cursor)?;
        Ok(LinkeditDataCommand { dataoff, datasize })
    }
}
