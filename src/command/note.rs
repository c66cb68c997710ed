use std::borrow::Cow;

use crate::{
    helpers::{fixed_bytes, fixed_name},
    macho::MachOResult,
};

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_NOTE`. The owner is a fixed 16 byte name, not an offset string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteCommand<'a> {
    pub data_owner: Cow<'a, str>,
    pub offset: u64,
    pub size: u64,
}

impl<'a> LoadCommandParser<'a> for NoteCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (cursor, _) = fixed_bytes::<16>(&ldcmd.payload)?;
        let (cursor, offset) = ctx.endian.u64(cursor)?;
        let (_, size) = ctx.endian.u64(cursor)?;

        Ok(NoteCommand {
            data_owner: fixed_name(&ldcmd.payload[..16]),
            offset,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::LCLoadCommand, endian::Endian};

    #[test]
    fn test_note() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let mut payload = b"com.apple.dt.X\0\0".to_vec();
        payload.extend(0x4000u64.to_le_bytes());
        payload.extend(0x20u64.to_le_bytes());
        let ldcmd = LoadCommand::new(LCLoadCommand::LcNote as u32, payload);

        let note = NoteCommand::parse(&ldcmd, ctx).unwrap();
        assert_eq!(note.data_owner, "com.apple.dt.X");
        assert_eq!(note.offset, 0x4000);
        assert_eq!(note.size, 0x20);
    }
}
