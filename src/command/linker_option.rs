use std::borrow::Cow;

use crate::{helpers::string_upto_null_terminator, macho::MachOResult};

use super::{CommandCtx, LoadCommand, LoadCommandParser};

/// `LC_LINKER_OPTION`: `count` NUL terminated strings, zero padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerOptionCommand<'a> {
    pub count: u32,
    strings: &'a [u8],
}

impl<'a> LinkerOptionCommand<'a> {
    pub fn strings(&self) -> impl Iterator<Item = Cow<'a, str>> + 'a {
        let mut cursor = self.strings;
        (0..self.count).map_while(move |_| {
            if cursor.is_empty() {
                return None;
            }
            let (rest, option) = string_upto_null_terminator(cursor).ok()?;
            cursor = rest;
            Some(option)
        })
    }
}

impl<'a> LoadCommandParser<'a> for LinkerOptionCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (strings, count) = ctx.endian.u32(&ldcmd.payload)?;
        Ok(LinkerOptionCommand { count, strings })
    }
}
