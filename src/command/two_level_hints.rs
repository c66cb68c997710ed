use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_TWOLEVEL_HINTS`. The hint table is in `__LINKEDIT` at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoLevelHintsCommand {
    pub offset: u32,
    pub nhints: u32,
}

impl<'a> LoadCommandParser<'a> for TwoLevelHintsCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (cursor, offset) = ctx.endian.u32(&ldcmd.payload)?;
        let (_, nhints) = ctx.endian.u32(cursor)?;
        Ok(TwoLevelHintsCommand { offset, nhints })
    }
}
