use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_ENCRYPTION_INFO` and `LC_ENCRYPTION_INFO_64`; the latter adds `pad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInfoCommand {
    pub cryptoff: u32,
    pub cryptsize: u32,
    pub cryptid: u32,
    pub pad: Option<u32>,
}

impl<'a> LoadCommandParser<'a> for EncryptionInfoCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let endian = ctx.endian;
        let (cursor, cryptoff) = endian.u32(&ldcmd.payload)?;
        let (cursor, cryptsize) = endian.u32(cursor)?;
        let (cursor, cryptid) = endian.u32(cursor)?;
        let pad = if ldcmd.is(super::LCLoadCommand::LcEncryptionInfo64) {
            Some(endian.u32(cursor)?.1)
        } else {
            None
        };

        Ok(EncryptionInfoCommand {
            cryptoff,
            cryptsize,
            cryptid,
            pad,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::LCLoadCommand, endian::Endian, testutil::words_command};

    #[test]
    fn test_encryption_info() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let ldcmd = words_command(ctx, LCLoadCommand::LcEncryptionInfo64, &[0x4000, 0x8000, 0, 0]);
        let info = EncryptionInfoCommand::parse(&ldcmd, ctx).unwrap();
        assert_eq!(info.cryptoff, 0x4000);
        assert_eq!(info.cryptid, 0);
        assert_eq!(info.pad, Some(0));

        let ctx = CommandCtx::new(Endian::Little, false);
        let ldcmd = words_command(ctx, LCLoadCommand::LcEncryptionInfo, &[0x1000, 0x2000, 1]);
        let info = EncryptionInfoCommand::parse(&ldcmd, ctx).unwrap();
        assert_eq!(info.cryptid, 1);
        assert_eq!(info.pad, None);
    }
}
