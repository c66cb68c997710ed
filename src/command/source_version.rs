use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_SOURCE_VERSION`, A.B.C.D.E packed as a24.b10.c10.d10.e10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceVersionCommand {
    pub version: u64,
}

impl<'a> LoadCommandParser<'a> for SourceVersionCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (_, version) = ctx.endian.u64(&ldcmd.payload)?;
        Ok(SourceVersionCommand { version })
    }
}
