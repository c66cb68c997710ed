use std::borrow::Cow;

use crate::{helpers::align_up, macho::MachOResult};

use super::{CommandCtx, LCLoadCommand, LcStr, LoadCommand, LoadCommandBase, LoadCommandParser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpathCommand<'a> {
    pub path_offset: LcStr,
    pub path: Cow<'a, str>,
}

impl RpathCommand<'_> {
    /// The path sits right after the prefix and its own offset field.
    pub const PATH_OFFSET: u32 = LoadCommandBase::SIZE + 4;

    /// Builds a fresh `LC_RPATH` command for `path`, zero padded to the
    /// alignment of `ctx`.
    pub fn build(path: &str, ctx: CommandCtx) -> LoadCommand {
        let cmdsize = align_up(
            Self::PATH_OFFSET as u64 + path.len() as u64 + 1,
            ctx.alignment() as u64,
        ) as usize;
        let mut payload = Vec::with_capacity(cmdsize - LoadCommandBase::SIZE as usize);
        payload.extend(ctx.endian.u32_bytes(Self::PATH_OFFSET));
        payload.extend(path.as_bytes());
        payload.resize(cmdsize - LoadCommandBase::SIZE as usize, 0);
        LoadCommand::new(LCLoadCommand::LcRpath as u32, payload)
    }
}

impl<'a> LoadCommandParser<'a> for RpathCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let (_, path_offset) = LcStr::parse(&ldcmd.payload, ctx.endian)?;
        let path = path_offset.resolve(&ldcmd.payload)?;

        Ok(RpathCommand { path_offset, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::Endian;

    #[test]
    fn test_build_and_parse() {
        let ctx = CommandCtx::new(Endian::Little, true);
        let ldcmd = RpathCommand::build("@loader_path/../Frameworks", ctx);
        // 12 + 26 + 1 = 39, rounded to 8
        assert_eq!(ldcmd.cmdsize, 40);
        assert_eq!(ldcmd.payload.len(), 32);
        assert!(ldcmd.payload[30..].iter().all(|&b| b == 0));

        let rpath = RpathCommand::parse(&ldcmd, ctx).unwrap();
        assert_eq!(rpath.path_offset.offset, 12);
        assert_eq!(rpath.path, "@loader_path/../Frameworks");
    }

    #[test]
    fn test_build_32bit_big_endian() {
        let ctx = CommandCtx::new(Endian::Big, false);
        let ldcmd = RpathCommand::build("/opt", ctx);
        assert_eq!(ldcmd.cmdsize, 20);
        assert_eq!(&ldcmd.payload[..4], &[0, 0, 0, 12]);
        assert_eq!(RpathCommand::parse(&ldcmd, ctx).unwrap().path, "/opt");
    }
}
