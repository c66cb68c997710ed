use crate::macho::MachOResult;

use super::{segment::Word, CommandCtx, LoadCommand, LoadCommandParser};

/// `routines_command` / `routines_command_64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutinesCommand<W: Word> {
    pub init_address: W,
    pub init_module: W,
    pub reserved: [W; 6],
}

pub type RoutinesCommand32 = RoutinesCommand<u32>;
pub type RoutinesCommand64 = RoutinesCommand<u64>;

impl<'a, W: Word> LoadCommandParser<'a> for RoutinesCommand<W> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (mut cursor, init_address) = W::parse(&ldcmd.payload, ctx.endian)?;
        let (rest, init_module) = W::parse(cursor, ctx.endian)?;
        cursor = rest;

        let mut reserved = [init_module; 6];
        for slot in reserved.iter_mut() {
            let (rest, value) = W::parse(cursor, ctx.endian)?;
            *slot = value;
            cursor = rest;
        }

        Ok(RoutinesCommand {
            init_address,
            init_module,
            reserved,
        })
    }
}
