use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_DYLD_INFO` / `LC_DYLD_INFO_ONLY`. Only the offsets into `__LINKEDIT`
/// are decoded; rebase and bind opcodes stay opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DyldInfoCommand {
    pub rebase_off: u32,
    pub rebase_size: u32,
    pub bind_off: u32,
    pub bind_size: u32,
    pub weak_bind_off: u32,
    pub weak_bind_size: u32,
    pub lazy_bind_off: u32,
    pub lazy_bind_size: u32,
    pub export_off: u32,
    pub export_size: u32,
}

impl DyldInfoCommand {
    pub fn fields(&self) -> [(&'static str, u32); 10] {
        [
            ("rebase_off", self.rebase_off),
            ("rebase_size", self.rebase_size),
            ("bind_off", self.bind_off),
            ("bind_size", self.bind_size),
            ("weak_bind_off", self.weak_bind_off),
            ("weak_bind_size", self.weak_bind_size),
            ("lazy_bind_off", self.lazy_bind_off),
            ("lazy_bind_size", self.lazy_bind_size),
            ("export_off", self.export_off),
            ("export_size", self.export_size),
        ]
    }
}

impl<'a> LoadCommandParser<'a> for DyldInfoCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let mut words = [0u32; 10];
        let mut cursor = &ldcmd.payload[..];
        for word in words.iter_mut() {
            let (rest, value) = ctx.endian.u32(cursor)?;
            *word = value;
            cursor = rest;
        }
        let [
            rebase_off,
            rebase_size,
            bind_off,
            bind_size,
            weak_bind_off,
            weak_bind_size,
            lazy_bind_off,
            lazy_bind_size,
            export_off,
            export_size,
        ] = words;

        Ok(DyldInfoCommand {
            rebase_off,
            rebase_size,
            bind_off,
            bind_size,
            weak_bind_off,
            weak_bind_size,
            lazy_bind_off,
            lazy_bind_size,
            export_off,
            export_size,
        })
    }
}
