use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_VERSION_MIN_*`, versions packed as xxxx.yy.zz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMinCommand {
    pub version: u32,
    pub sdk: u32,
}

impl<'a> LoadCommandParser<'a> for VersionMinCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (cursor, version) = ctx.endian.u32(&ldcmd.payload)?;
        let (_, sdk) = ctx.endian.u32(cursor)?;
        Ok(VersionMinCommand { version, sdk })
    }
}
