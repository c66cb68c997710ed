use uuid::Uuid;

use crate::{helpers::fixed_bytes, macho::MachOResult};

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_UUID`. The 16 bytes are stored as-is regardless of object byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UuidCommand {
    pub uuid: Uuid,
}

impl<'a> LoadCommandParser<'a> for UuidCommand {
    fn parse(ldcmd: &'a LoadCommand, _: CommandCtx) -> MachOResult<Self> {
        let (_, bytes) = fixed_bytes::<16>(&ldcmd.payload)?;
        Ok(UuidCommand {
            uuid: Uuid::from_bytes(bytes),
        })
    }
}
