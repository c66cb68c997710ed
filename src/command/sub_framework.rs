use std::borrow::Cow;

use crate::macho::MachOResult;

use super::{CommandCtx, LcStr, LoadCommand, LoadCommandParser};

/// Umbrella relationships: `LC_SUB_FRAMEWORK`, `LC_SUB_UMBRELLA`,
/// `LC_SUB_CLIENT` and `LC_SUB_LIBRARY` all carry a single name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommand<'a> {
    pub name_offset: LcStr,
    pub name: Cow<'a, str>,
}

impl<'a> LoadCommandParser<'a> for SubCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (_, name_offset) = LcStr::parse(&ldcmd.payload, ctx.endian)?;
        let name = name_offset.resolve(&ldcmd.payload)?;

        Ok(SubCommand { name_offset, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::LCLoadCommand, endian::Endian, testutil::string_command};

    #[test]
    fn test_sub_umbrella() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let ldcmd = string_command(ctx, LCLoadCommand::LcSubUmbrella, &[], "CoreServices");
        assert_eq!(SubCommand::parse(&ldcmd, ctx).unwrap().name, "CoreServices");
    }
}
