use crate::macho::MachOResult;

use super::{CommandCtx, LoadCommand, LoadCommandParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DysymtabCommand {
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
    pub tocoff: u32,
    pub ntoc: u32,
    pub modtaboff: u32,
    pub nmodtab: u32,
    pub extrefsymoff: u32,
    pub nextrefsyms: u32,
    pub indirectsymoff: u32,
    pub nindirectsyms: u32,
    pub extreloff: u32,
    pub nextrel: u32,
    pub locreloff: u32,
    pub nlocrel: u32,
}

impl DysymtabCommand {
    pub const INDIRECT_SYMBOL_LOCAL: u32 = 0x80000000;
    pub const INDIRECT_SYMBOL_ABS: u32 = 0x40000000;

    /// Field names and values in on-disk order.
    pub fn fields(&self) -> [(&'static str, u32); 18] {
        [
            ("ilocalsym", self.ilocalsym),
            ("nlocalsym", self.nlocalsym),
            ("iextdefsym", self.iextdefsym),
            ("nextdefsym", self.nextdefsym),
            ("iundefsym", self.iundefsym),
            ("nundefsym", self.nundefsym),
            ("tocoff", self.tocoff),
            ("ntoc", self.ntoc),
            ("modtaboff", self.modtaboff),
            ("nmodtab", self.nmodtab),
            ("extrefsymoff", self.extrefsymoff),
            ("nextrefsyms", self.nextrefsyms),
            ("indirectsymoff", self.indirectsymoff),
            ("nindirectsyms", self.nindirectsyms),
            ("extreloff", self.extreloff),
            ("nextrel", self.nextrel),
            ("locreloff", self.locreloff),
            ("nlocrel", self.nlocrel),
        ]
    }
}

impl<'a> LoadCommandParser<'a> for DysymtabCommand {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let mut words = [0u32; 18];
        let mut cursor = &ldcmd.payload[..];
        for word in words.iter_mut() {
            let (rest, value) = ctx.endian.u32(cursor)?;
            *word = value;
            cursor = rest;
        }
        let [
            ilocalsym,
            nlocalsym,
            iextdefsym,
            nextdefsym,
            iundefsym,
            nundefsym,
            tocoff,
            ntoc,
            modtaboff,
            nmodtab,
            extrefsymoff,
            nextrefsyms,
            indirectsymoff,
            nindirectsyms,
            extreloff,
            nextrel,
            locreloff,
            nlocrel,
        ] = words;

        Ok(DysymtabCommand {
            ilocalsym,
            nlocalsym,
            iextdefsym,
            nextdefsym,
            iundefsym,
            nundefsym,
            tocoff,
            ntoc,
            modtaboff,
            nmodtab,
            extrefsymoff,
            nextrefsyms,
            indirectsymoff,
            nindirectsyms,
            extreloff,
            nextrel,
            locreloff,
            nlocrel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::LCLoadCommand, endian::Endian, testutil::words_command};

    #[test]
    fn test_dysymtab() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let words: Vec<u32> = (1..=18).collect();
        let ldcmd = words_command(ctx, LCLoadCommand::LcDysymtab, &words);
        assert_eq!(ldcmd.cmdsize, 80);

        let dysymtab = DysymtabCommand::parse(&ldcmd, ctx).unwrap();
        assert_eq!(dysymtab.ilocalsym, 1);
        assert_eq!(dysymtab.nindirectsyms, 14);
        assert_eq!(dysymtab.nlocrel, 18);
        assert_eq!(dysymtab.fields()[9], ("nmodtab", 10));
    }

    #[test]
    fn test_dysymtab_truncated() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let ldcmd = words_command(ctx, LCLoadCommand::LcDysymtab, &[0; 10]);
        assert!(DysymtabCommand::parse(&ldcmd, ctx).is_err());
    }
}
