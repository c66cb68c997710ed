use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrebindCksumCommand {
    pub cksum: u32,
}

impl<'a> LoadCommandParser<'a> for PrebindCksumCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (_, cksum) = ctx.endian.u32(&ldcmd.payload)?;
        Ok(PrebindCksumCommand { cksum })
    }
}
