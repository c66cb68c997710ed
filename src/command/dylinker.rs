use std::borrow::Cow;

use crate::macho::MachOResult;

use super::{CommandCtx, LcStr, LoadCommand, LoadCommandParser};

/// `LC_LOAD_DYLINKER`, `LC_ID_DYLINKER` and `LC_DYLD_ENVIRONMENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DylinkerCommand<'a> {
    pub name_offset: LcStr,
    pub name: Cow<'a, str>,
}

impl<'a> LoadCommandParser<'a> for DylinkerCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (_, name_offset) = LcStr::parse(&ldcmd.payload, ctx.endian)?;
        let name = name_offset.resolve(&ldcmd.payload)?;

        Ok(DylinkerCommand { name_offset, name })
    }
}
