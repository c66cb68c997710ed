pub mod build_version;
pub mod dyld_info;
pub mod dylib;
pub mod dylinker;
pub mod dysymtab;
pub mod encryption_info;
pub mod entry_point;
pub mod fvmlib;
pub mod lc_str;
pub mod linkedit_data;
pub mod linker_option;
pub mod note;
pub mod prebind_cksum;
pub mod prebound_dylib;
pub mod routines;
pub mod rpath;
pub mod segment;
pub mod source_version;
pub mod sub_framework;
pub mod symtab;
pub mod two_level_hints;
pub mod uuid;
pub mod version_min;

use nom::IResult;
use num_derive::FromPrimitive;
use strum_macros::Display;
use tracing::warn;

use crate::{endian::Endian, macho::MachOResult};

pub use build_version::{BuildToolVersion, BuildVersionCommand, Platform, Tool};
pub use dyld_info::DyldInfoCommand;
pub use dylib::DylibCommand;
pub use dylinker::DylinkerCommand;
pub use dysymtab::DysymtabCommand;
pub use encryption_info::EncryptionInfoCommand;
pub use entry_point::EntryPointCommand;
pub use fvmlib::{FvmfileCommand, FvmlibCommand};
pub use lc_str::LcStr;
pub use linkedit_data::LinkeditDataCommand;
pub use linker_option::LinkerOptionCommand;
pub use note::NoteCommand;
pub use prebind_cksum::PrebindCksumCommand;
pub use prebound_dylib::PreboundDylibCommand;
pub use routines::{RoutinesCommand32, RoutinesCommand64};
pub use rpath::RpathCommand;
pub use segment::{Section, SegmentCommand, SegmentCommand32, SegmentCommand64};
pub use source_version::SourceVersionCommand;
pub use sub_framework::SubCommand;
pub use symtab::SymtabCommand;
pub use two_level_hints::TwoLevelHintsCommand;
pub use uuid::UuidCommand;
pub use version_min::VersionMinCommand;

/// The `(cmd, cmdsize)` prefix every load command starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCommandBase {
    pub cmd: u32,
    pub cmdsize: u32,
}

impl LoadCommandBase {
    pub const SIZE: u32 = 8;

    pub fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], LoadCommandBase> {
        let (bytes, cmd) = endian.u32(bytes)?;
        let (bytes, cmdsize) = endian.u32(bytes)?;

        Ok((bytes, LoadCommandBase { cmd, cmdsize }))
    }

    pub fn serialize(&self, endian: Endian) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE as usize);
        buf.extend(endian.u32_bytes(self.cmd));
        buf.extend(endian.u32_bytes(self.cmdsize));
        buf
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Display)]
pub enum LCLoadCommand {
    #[strum(serialize = "LC_SEGMENT")]
    LcSegment = 0x1,
    #[strum(serialize = "LC_SYMTAB")]
    LcSymtab = 0x2,
    #[strum(serialize = "LC_SYMSEG")]
    LcSymseg = 0x3,
    #[strum(serialize = "LC_THREAD")]
    LcThread = 0x4,
    #[strum(serialize = "LC_UNIXTHREAD")]
    LcUnixThread = 0x5,
    #[strum(serialize = "LC_LOADFVMLIB")]
    LcLoadFvmlib = 0x6,
    #[strum(serialize = "LC_IDFVMLIB")]
    LcIdFvmlib = 0x7,
    #[strum(serialize = "LC_IDENT")]
    LcIdent = 0x8,
    #[strum(serialize = "LC_FVMFILE")]
    LcFvmfile = 0x9,
    #[strum(serialize = "LC_PREPAGE")]
    LcPrepage = 0xa,
    #[strum(serialize = "LC_DYSYMTAB")]
    LcDysymtab = 0xb,
    #[strum(serialize = "LC_LOAD_DYLIB")]
    LcLoadDylib = 0xc,
    #[strum(serialize = "LC_ID_DYLIB")]
    LcIdDylib = 0xd,
    #[strum(serialize = "LC_LOAD_DYLINKER")]
    LcLoadDylinker = 0xe,
    #[strum(serialize = "LC_ID_DYLINKER")]
    LcIdDylinker = 0xf,
    #[strum(serialize = "LC_PREBOUND_DYLIB")]
    LcPreboundDylib = 0x10,
    #[strum(serialize = "LC_ROUTINES")]
    LcRoutines = 0x11,
    #[strum(serialize = "LC_SUB_FRAMEWORK")]
    LcSubFramework = 0x12,
    #[strum(serialize = "LC_SUB_UMBRELLA")]
    LcSubUmbrella = 0x13,
    #[strum(serialize = "LC_SUB_CLIENT")]
    LcSubClient = 0x14,
    #[strum(serialize = "LC_SUB_LIBRARY")]
    LcSubLibrary = 0x15,
    #[strum(serialize = "LC_TWOLEVEL_HINTS")]
    LcTwolevelHints = 0x16,
    #[strum(serialize = "LC_PREBIND_CKSUM")]
    LcPrebindCksum = 0x17,
    #[strum(serialize = "LC_LOAD_WEAK_DYLIB")]
    LcLoadWeakDylib = 0x18 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_SEGMENT_64")]
    LcSegment64 = 0x19,
    #[strum(serialize = "LC_ROUTINES_64")]
    LcRoutines64 = 0x1a,
    #[strum(serialize = "LC_UUID")]
    LcUuid = 0x1b,
    #[strum(serialize = "LC_RPATH")]
    LcRpath = 0x1c | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_CODE_SIGNATURE")]
    LcCodeSignature = 0x1d,
    #[strum(serialize = "LC_SEGMENT_SPLIT_INFO")]
    LcSegmentSplitInfo = 0x1e,
    #[strum(serialize = "LC_REEXPORT_DYLIB")]
    LcReexportDylib = 0x1f | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_LAZY_LOAD_DYLIB")]
    LcLazyLoadDylib = 0x20,
    #[strum(serialize = "LC_ENCRYPTION_INFO")]
    LcEncryptionInfo = 0x21,
    #[strum(serialize = "LC_DYLD_INFO")]
    LcDyldInfo = 0x22,
    #[strum(serialize = "LC_DYLD_INFO_ONLY")]
    LcDyldInfoOnly = 0x22 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_LOAD_UPWARD_DYLIB")]
    LcLoadUpwardDylib = 0x23 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_VERSION_MIN_MACOSX")]
    LcVersionMinMacosx = 0x24,
    #[strum(serialize = "LC_VERSION_MIN_IPHONEOS")]
    LcVersionMinIphoneos = 0x25,
    #[strum(serialize = "LC_FUNCTION_STARTS")]
    LcFunctionStarts = 0x26,
    #[strum(serialize = "LC_DYLD_ENVIRONMENT")]
    LcDyldEnvironment = 0x27,
    #[strum(serialize = "LC_MAIN")]
    LcMain = 0x28 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_DATA_IN_CODE")]
    LcDataInCode = 0x29,
    #[strum(serialize = "LC_SOURCE_VERSION")]
    LcSourceVersion = 0x2A,
    #[strum(serialize = "LC_DYLIB_CODE_SIGN_DRS")]
    LcDylibCodeSignDrs = 0x2B,
    #[strum(serialize = "LC_ENCRYPTION_INFO_64")]
    LcEncryptionInfo64 = 0x2C,
    #[strum(serialize = "LC_LINKER_OPTION")]
    LcLinkerOption = 0x2D,
    #[strum(serialize = "LC_LINKER_OPTIMIZATION_HINT")]
    LcLinkerOptimizationHint = 0x2E,
    #[strum(serialize = "LC_VERSION_MIN_TVOS")]
    LcVersionMinTvos = 0x2F,
    #[strum(serialize = "LC_VERSION_MIN_WATCHOS")]
    LcVersionMinWatchos = 0x30,
    #[strum(serialize = "LC_NOTE")]
    LcNote = 0x31,
    #[strum(serialize = "LC_BUILD_VERSION")]
    LcBuildVersion = 0x32,
    #[strum(serialize = "LC_DYLD_EXPORTS_TRIE")]
    LcDyldExportsTrie = 0x33 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_DYLD_CHAINED_FIXUPS")]
    LcDyldChainedFixups = 0x34 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_FILESET_ENTRY")]
    LcFilesetEntry = 0x35 | Self::LC_REQ_DYLD,
    #[strum(serialize = "LC_ATOM_INFO")]
    LcAtomInfo = 0x36,
}

impl LCLoadCommand {
    pub const LC_REQ_DYLD: u32 = 0x80000000;

    pub fn from_raw(cmd: u32) -> Option<LCLoadCommand> {
        num::FromPrimitive::from_u32(cmd)
    }

    pub fn describe(cmd: u32) -> String {
        match Self::from_raw(cmd) {
            Some(kind) => kind.to_string(),
            None => format!("LC_UNKNOWN ({:#x})", cmd),
        }
    }

    pub fn is_segment(self) -> bool {
        matches!(self, LCLoadCommand::LcSegment | LCLoadCommand::LcSegment64)
    }
}

/// Byte order and word width of the object owning a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCtx {
    pub endian: Endian,
    pub is_64: bool,
}

impl CommandCtx {
    pub fn new(endian: Endian, is_64: bool) -> Self {
        CommandCtx { endian, is_64 }
    }

    /// Required `cmdsize` alignment.
    pub fn alignment(&self) -> u32 {
        if self.is_64 {
            8
        } else {
            4
        }
    }
}

/// One entry of the command table. `payload` is everything after the
/// `(cmd, cmdsize)` prefix and is kept verbatim, so unknown kinds round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub payload: Vec<u8>,
}

impl LoadCommand {
    pub fn new(cmd: u32, payload: Vec<u8>) -> Self {
        let cmdsize = LoadCommandBase::SIZE + payload.len() as u32;
        LoadCommand {
            cmd,
            cmdsize,
            payload,
        }
    }

    pub fn kind(&self) -> Option<LCLoadCommand> {
        LCLoadCommand::from_raw(self.cmd)
    }

    pub fn is(&self, kind: LCLoadCommand) -> bool {
        self.cmd == kind as u32
    }

    pub fn name(&self) -> String {
        LCLoadCommand::describe(self.cmd)
    }

    /// Replaces the payload and keeps `cmdsize` in step with it.
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.cmdsize = LoadCommandBase::SIZE + payload.len() as u32;
        self.payload = payload;
    }

    pub fn serialize(&self, endian: Endian) -> Vec<u8> {
        let mut buf = LoadCommandBase {
            cmd: self.cmd,
            cmdsize: self.cmdsize,
        }
        .serialize(endian);
        buf.extend(&self.payload);
        buf
    }

    pub fn view(&self, ctx: CommandCtx) -> MachOResult<LoadCommandView<'_>> {
        LoadCommandView::parse(self, ctx)
    }
}

/// Typed, read-only decoding of a command payload.
pub trait LoadCommandParser<'a>: Sized {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCommandView<'a> {
    Segment32(SegmentCommand32<'a>),
    Segment64(SegmentCommand64<'a>),
    Dylib(DylibCommand<'a>),
    Rpath(RpathCommand<'a>),
    Dylinker(DylinkerCommand<'a>),
    Sub(SubCommand<'a>),
    Fvmlib(FvmlibCommand<'a>),
    Fvmfile(FvmfileCommand<'a>),
    PreboundDylib(PreboundDylibCommand<'a>),
    Routines32(RoutinesCommand32),
    Routines64(RoutinesCommand64),
    Symtab(SymtabCommand),
    Dysymtab(DysymtabCommand),
    TwoLevelHints(TwoLevelHintsCommand),
    PrebindCksum(PrebindCksumCommand),
    Uuid(UuidCommand),
    LinkeditData(LinkeditDataCommand),
    EncryptionInfo(EncryptionInfoCommand),
    DyldInfo(DyldInfoCommand),
    VersionMin(VersionMinCommand),
    BuildVersion(BuildVersionCommand<'a>),
    EntryPoint(EntryPointCommand),
    SourceVersion(SourceVersionCommand),
    LinkerOption(LinkerOptionCommand<'a>),
    Note(NoteCommand<'a>),
    /// Thread state, ident and unknown kinds.
    Raw(&'a [u8]),
}

impl<'a> LoadCommandView<'a> {
    pub fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let kind = match ldcmd.kind() {
            Some(kind) => kind,
            None => {
                warn!(cmd = ldcmd.cmd, "unknown load command kind");
                return Ok(LoadCommandView::Raw(&ldcmd.payload));
            }
        };

        let view = match kind {
            LCLoadCommand::LcSegment => {
                LoadCommandView::Segment32(SegmentCommand32::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcSegment64 => {
                LoadCommandView::Segment64(SegmentCommand64::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcLoadDylib
            | LCLoadCommand::LcIdDylib
            | LCLoadCommand::LcLoadWeakDylib
            | LCLoadCommand::LcReexportDylib
            | LCLoadCommand::LcLazyLoadDylib
            | LCLoadCommand::LcLoadUpwardDylib => {
                LoadCommandView::Dylib(DylibCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcRpath => LoadCommandView::Rpath(RpathCommand::parse(ldcmd, ctx)?),
            LCLoadCommand::LcLoadDylinker
            | LCLoadCommand::LcIdDylinker
            | LCLoadCommand::LcDyldEnvironment => {
                LoadCommandView::Dylinker(DylinkerCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcSubFramework
            | LCLoadCommand::LcSubUmbrella
            | LCLoadCommand::LcSubClient
            | LCLoadCommand::LcSubLibrary => LoadCommandView::Sub(SubCommand::parse(ldcmd, ctx)?),
            LCLoadCommand::LcLoadFvmlib | LCLoadCommand::LcIdFvmlib => {
                LoadCommandView::Fvmlib(FvmlibCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcFvmfile => {
                LoadCommandView::Fvmfile(FvmfileCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcPreboundDylib => {
                LoadCommandView::PreboundDylib(PreboundDylibCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcRoutines => {
                LoadCommandView::Routines32(RoutinesCommand32::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcRoutines64 => {
                LoadCommandView::Routines64(RoutinesCommand64::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcSymtab => LoadCommandView::Symtab(SymtabCommand::parse(ldcmd, ctx)?),
            LCLoadCommand::LcDysymtab => {
                LoadCommandView::Dysymtab(DysymtabCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcTwolevelHints => {
                LoadCommandView::TwoLevelHints(TwoLevelHintsCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcPrebindCksum => {
                LoadCommandView::PrebindCksum(PrebindCksumCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcUuid => LoadCommandView::Uuid(UuidCommand::parse(ldcmd, ctx)?),
            LCLoadCommand::LcCodeSignature
            | LCLoadCommand::LcSegmentSplitInfo
            | LCLoadCommand::LcFunctionStarts
            | LCLoadCommand::LcDataInCode
            | LCLoadCommand::LcDylibCodeSignDrs
            | LCLoadCommand::LcLinkerOptimizationHint
            | LCLoadCommand::LcDyldExportsTrie
            | LCLoadCommand::LcDyldChainedFixups
            | LCLoadCommand::LcAtomInfo => {
                LoadCommandView::LinkeditData(LinkeditDataCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcEncryptionInfo | LCLoadCommand::LcEncryptionInfo64 => {
                LoadCommandView::EncryptionInfo(EncryptionInfoCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcDyldInfo | LCLoadCommand::LcDyldInfoOnly => {
                LoadCommandView::DyldInfo(DyldInfoCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcVersionMinMacosx
            | LCLoadCommand::LcVersionMinIphoneos
            | LCLoadCommand::LcVersionMinTvos
            | LCLoadCommand::LcVersionMinWatchos => {
                LoadCommandView::VersionMin(VersionMinCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcBuildVersion => {
                LoadCommandView::BuildVersion(BuildVersionCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcMain => {
                LoadCommandView::EntryPoint(EntryPointCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcSourceVersion => {
                LoadCommandView::SourceVersion(SourceVersionCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcLinkerOption => {
                LoadCommandView::LinkerOption(LinkerOptionCommand::parse(ldcmd, ctx)?)
            }
            LCLoadCommand::LcNote => LoadCommandView::Note(NoteCommand::parse(ldcmd, ctx)?),
            LCLoadCommand::LcSymseg
            | LCLoadCommand::LcThread
            | LCLoadCommand::LcUnixThread
            | LCLoadCommand::LcIdent
            | LCLoadCommand::LcPrepage
            | LCLoadCommand::LcFilesetEntry => LoadCommandView::Raw(&ldcmd.payload),
        };

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_command_names() {
        assert_eq!(LCLoadCommand::LcSegment64.to_string(), "LC_SEGMENT_64");
        assert_eq!(LCLoadCommand::describe(0x8000001c), "LC_RPATH");
        assert_eq!(LCLoadCommand::describe(0x7f), "LC_UNKNOWN (0x7f)");
    }

    #[test]
    fn test_base_round_trip() {
        let cmd = LoadCommand::new(LCLoadCommand::LcUuid as u32, vec![0xab; 16]);
        assert_eq!(cmd.cmdsize, 24);

        for endian in [Endian::Little, Endian::Big] {
            let bytes = cmd.serialize(endian);
            let (rest, base) = LoadCommandBase::parse(&bytes, endian).unwrap();
            assert_eq!(base.cmd, 0x1b);
            assert_eq!(base.cmdsize, 24);
            assert_eq!(rest, &cmd.payload[..]);
        }
    }

    #[test]
    fn test_unknown_kind_is_raw() {
        let cmd = LoadCommand::new(0x1234, vec![1, 2, 3, 4]);
        let ctx = CommandCtx::new(Endian::Little, false);
        assert_eq!(cmd.view(ctx).unwrap(), LoadCommandView::Raw(&[1, 2, 3, 4]));
        assert_eq!(cmd.name(), "LC_UNKNOWN (0x1234)");
    }
}
