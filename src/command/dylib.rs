use std::borrow::Cow;

use crate::macho::MachOResult;

use super::{CommandCtx, LcStr, LoadCommand, LoadCommandParser};

/// `dylib_command`, shared by the id, load, weak, reexport, lazy and upward
/// dylib kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DylibCommand<'a> {
    pub name_offset: LcStr,
    pub name: Cow<'a, str>,
    pub timestamp: u32,
    pub current_version: u32,
    pub compatibility_version: u32,
}

impl<'a> LoadCommandParser<'a> for DylibCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let endian = ctx.endian;
        let (cursor, name_offset) = LcStr::parse(&ldcmd.payload, endian)?;
        let (cursor, timestamp) = endian.u32(cursor)?;
        let (cursor, current_version) = endian.u32(cursor)?;
        let (_, compatibility_version) = endian.u32(cursor)?;
        let name = name_offset.resolve(&ldcmd.payload)?;

        Ok(DylibCommand {
            name_offset,
            name,
            timestamp,
            current_version,
            compatibility_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::LCLoadCommand, endian::Endian, helpers::version_string, testutil::dylib_command,
    };

    #[test]
    fn test_dylib() {
        for ctx in [
            CommandCtx::new(Endian::Little, true),
            CommandCtx::new(Endian::Big, false),
        ] {
            let ldcmd =
                dylib_command(ctx, LCLoadCommand::LcLoadDylib, "/usr/lib/libSystem.B.dylib");
            assert_eq!(ldcmd.cmdsize % ctx.alignment(), 0);

            let dylib = DylibCommand::parse(&ldcmd, ctx).unwrap();
            assert_eq!(dylib.name, "/usr/lib/libSystem.B.dylib");
            assert_eq!(dylib.name_offset.offset, 24);
            assert_eq!(dylib.timestamp, 2);
            assert_eq!(version_string(dylib.current_version), "1.2.3");
            assert_eq!(version_string(dylib.compatibility_version), "1.0.0");
        }
    }

    #[test]
    fn test_truncated_dylib() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let ldcmd = LoadCommand::new(LCLoadCommand::LcIdDylib as u32, vec![24, 0, 0, 0, 2, 0]);
        assert!(DylibCommand::parse(&ldcmd, ctx).is_err());
    }
}
