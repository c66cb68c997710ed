use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_MAIN`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPointCommand {
    pub entryoff: u64,
    pub stacksize: u64,
}

impl<'a> LoadCommandParser<'a> for EntryPointCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (cursor, entryoff) = ctx.endian.u64(&ldcmd.payload)?;
        let (_, stacksize) = ctx.endian.u64(cursor)?;
        Ok(EntryPointCommand {
            entryoff,
            stacksize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::LCLoadCommand, endian::Endian};

    #[test]
    fn test_entry_point() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let mut payload = 0x3f40u64.to_le_bytes().to_vec();
        payload.extend(0u64.to_le_bytes());
        let ldcmd = LoadCommand::new(LCLoadCommand::LcMain as u32, payload);
        let main = EntryPointCommand::parse(&ldcmd, ctx).unwrap();
        assert_eq!(main.entryoff, 0x3f40);
        assert_eq!(main.stacksize, 0);
    }
}
