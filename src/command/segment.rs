use std::{borrow::Cow, fmt};

use nom::IResult;
use num_derive::FromPrimitive;
use strum_macros::Display;

use crate::{
    endian::Endian,
    helpers::{fixed_bytes, fixed_name},
    macho::{MachOErr, MachOResult},
};

use super::{CommandCtx, LCLoadCommand, LoadCommand, LoadCommandBase, LoadCommandParser};

/// Address sized field: `u32` in `LC_SEGMENT`, `u64` in `LC_SEGMENT_64`.
pub trait Word: Copy + Eq + fmt::Debug + fmt::LowerHex + Into<u64> {
    const SIZE: usize;
    const KIND: LCLoadCommand;

    fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], Self>;
}

impl Word for u32 {
    const SIZE: usize = 4;
    const KIND: LCLoadCommand = LCLoadCommand::LcSegment;

    fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], Self> {
        endian.u32(bytes)
    }
}

impl Word for u64 {
    const SIZE: usize = 8;
    const KIND: LCLoadCommand = LCLoadCommand::LcSegment64;

    fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], Self> {
        endian.u64(bytes)
    }
}

bitflags::bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u32 {
        const READ = 0x01;
        const WRITE = 0x02;
        const EXECUTE = 0x04;
    }
}

impl Protection {
    pub fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], Protection> {
        let (bytes, prot) = endian.u32(bytes)?;
        Ok((bytes, Protection::from_bits_retain(prot)))
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |p: Protection, c: char| if self.contains(p) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Protection::READ, 'r'),
            flag(Protection::WRITE, 'w'),
            flag(Protection::EXECUTE, 'x')
        )
    }
}

bitflags::bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SGFlags: u32 {
        const HIGHVM = 0x1;
        const FVMLIB = 0x2;
        const NORELOC = 0x4;
        const PROTECTED_VERSION_1 = 0x8;
        const READ_ONLY = 0x10;
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Display)]
pub enum SectionType {
    #[strum(serialize = "S_REGULAR")]
    SRegular = 0x0,
    #[strum(serialize = "S_ZEROFILL")]
    SZeroFill = 0x1,
    #[strum(serialize = "S_CSTRING_LITERALS")]
    SCstringLiterals = 0x2,
    #[strum(serialize = "S_4BYTE_LITERALS")]
    S4ByteLiterals = 0x3,
    #[strum(serialize = "S_8BYTE_LITERALS")]
    S8ByteLiterals = 0x4,
    #[strum(serialize = "S_LITERAL_POINTERS")]
    SLiteralPointers = 0x5,
    #[strum(serialize = "S_NON_LAZY_SYMBOL_POINTERS")]
    SNonLazySymbolPointers = 0x6,
    #[strum(serialize = "S_LAZY_SYMBOL_POINTERS")]
    SLazySymbolPointers = 0x7,
    #[strum(serialize = "S_SYMBOL_STUBS")]
    SSymbolStubs = 0x8,
    #[strum(serialize = "S_MOD_INIT_FUNC_POINTERS")]
    SModInitFuncPointers = 0x9,
    #[strum(serialize = "S_MOD_TERM_FUNC_POINTERS")]
    SModTermFuncPointers = 0xa,
    #[strum(serialize = "S_COALESCED")]
    SCoalesced = 0xb,
    #[strum(serialize = "S_GB_ZEROFILL")]
    SGbZeroFill = 0xc,
    #[strum(serialize = "S_INTERPOSING")]
    SInterposing = 0xd,
    #[strum(serialize = "S_16BYTE_LITERALS")]
    S16ByteLiterals = 0xe,
    #[strum(serialize = "S_DTRACE_DOF")]
    SDtraceDof = 0xf,
    #[strum(serialize = "S_LAZY_DYLIB_SYMBOL_POINTERS")]
    SLazyDylibSymbolPointers = 0x10,
    #[strum(serialize = "S_THREAD_LOCAL_REGULAR")]
    SThreadLocalRegular = 0x11,
    #[strum(serialize = "S_THREAD_LOCAL_ZEROFILL")]
    SThreadLocalZeroFill = 0x12,
    #[strum(serialize = "S_THREAD_LOCAL_VARIABLES")]
    SThreadLocalVariables = 0x13,
    #[strum(serialize = "S_THREAD_LOCAL_VARIABLE_POINTERS")]
    SThreadLocalVariablePointers = 0x14,
    #[strum(serialize = "S_THREAD_LOCAL_INIT_FUNCTION_POINTERS")]
    SThreadLocalInitFunctionPointers = 0x15,
    #[strum(serialize = "S_INIT_FUNC_OFFSETS")]
    SInitFuncOffsets = 0x16,
}

impl SectionType {
    pub const SECTION_TYPE_MASK: u32 = 0x000000ff;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<W: Word> {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: W,
    pub size: W,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    /// Only present in `section_64`.
    pub reserved3: Option<u32>,
}

impl<W: Word> Section<W> {
    /// 68 bytes for `section`, 80 for `section_64`.
    pub const SIZE: usize = 32 + 2 * W::SIZE + 7 * 4 + (W::SIZE - 4);

    pub fn parse(bytes: &[u8], endian: Endian) -> IResult<&[u8], Self> {
        let (bytes, sectname) = fixed_bytes::<16>(bytes)?;
        let (bytes, segname) = fixed_bytes::<16>(bytes)?;
        let (bytes, addr) = W::parse(bytes, endian)?;
        let (bytes, size) = W::parse(bytes, endian)?;
        let (bytes, offset) = endian.u32(bytes)?;
        let (bytes, align) = endian.u32(bytes)?;
        let (bytes, reloff) = endian.u32(bytes)?;
        let (bytes, nreloc) = endian.u32(bytes)?;
        let (bytes, flags) = endian.u32(bytes)?;
        let (bytes, reserved1) = endian.u32(bytes)?;
        let (mut bytes, reserved2) = endian.u32(bytes)?;
        let mut reserved3 = None;
        if W::SIZE == 8 {
            let (rest, value) = endian.u32(bytes)?;
            bytes = rest;
            reserved3 = Some(value);
        }

        Ok((
            bytes,
            Section {
                sectname,
                segname,
                addr,
                size,
                offset,
                align,
                reloff,
                nreloc,
                flags,
                reserved1,
                reserved2,
                reserved3,
            },
        ))
    }

    pub fn name(&self) -> Cow<'_, str> {
        fixed_name(&self.sectname)
    }

    pub fn segment_name(&self) -> Cow<'_, str> {
        fixed_name(&self.segname)
    }

    pub fn section_type(&self) -> Option<SectionType> {
        num::FromPrimitive::from_u32(self.flags & SectionType::SECTION_TYPE_MASK)
    }

    pub fn is_zerofill(&self) -> bool {
        matches!(
            self.section_type(),
            Some(
                SectionType::SZeroFill
                    | SectionType::SGbZeroFill
                    | SectionType::SThreadLocalZeroFill
            )
        )
    }
}

/// `segment_command` / `segment_command_64`. Section records stay borrowed
/// and are decoded on demand through [`SegmentCommand::sections`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCommand<'a, W: Word> {
    pub segname: [u8; 16],
    pub vmaddr: W,
    pub vmsize: W,
    pub fileoff: W,
    pub filesize: W,
    pub maxprot: Protection,
    pub initprot: Protection,
    pub nsects: u32,
    pub flags: SGFlags,
    sections: &'a [u8],
    endian: Endian,
}

pub type SegmentCommand32<'a> = SegmentCommand<'a, u32>;
pub type SegmentCommand64<'a> = SegmentCommand<'a, u64>;

impl<'a, W: Word> SegmentCommand<'a, W> {
    pub fn name(&self) -> Cow<'_, str> {
        fixed_name(&self.segname)
    }

    pub fn sections(&self) -> impl Iterator<Item = MachOResult<Section<W>>> + '_ {
        self.sections
            .chunks_exact(Section::<W>::SIZE)
            .take(self.nsects as usize)
            .map(move |bytes| {
                let (_, section) = Section::<W>::parse(bytes, self.endian)?;
                Ok(section)
            })
    }

    pub fn fileoff(&self) -> u64 {
        self.fileoff.into()
    }

    pub fn filesize(&self) -> u64 {
        self.filesize.into()
    }
}

impl<'a, W: Word> LoadCommandParser<'a> for SegmentCommand<'a, W> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        if !ldcmd.is(W::KIND) {
            return Err(MachOErr::InvalidValue(format!(
                "{} is not {}",
                ldcmd.name(),
                W::KIND
            )));
        }

        let endian = ctx.endian;
        let (cursor, segname) = fixed_bytes::<16>(&ldcmd.payload)?;
        let (cursor, vmaddr) = W::parse(cursor, endian)?;
        let (cursor, vmsize) = W::parse(cursor, endian)?;
        let (cursor, fileoff) = W::parse(cursor, endian)?;
        let (cursor, filesize) = W::parse(cursor, endian)?;
        let (cursor, maxprot) = Protection::parse(cursor, endian)?;
        let (cursor, initprot) = Protection::parse(cursor, endian)?;
        let (cursor, nsects) = endian.u32(cursor)?;
        let (cursor, flags) = endian.u32(cursor)?;

        let needed = nsects as usize * Section::<W>::SIZE;
        if cursor.len() < needed {
            return Err(MachOErr::InvalidValue(format!(
                "segment {} declares {} sections but cmdsize {} only holds {} bytes of them",
                fixed_name(&segname),
                nsects,
                ldcmd.cmdsize,
                cursor.len()
            )));
        }

        Ok(SegmentCommand {
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            nsects,
            flags: SGFlags::from_bits_retain(flags),
            sections: &cursor[..needed],
            endian,
        })
    }
}

/// Fixed part of a segment command, prefix included.
pub fn segment_command_size(is_64: bool) -> u32 {
    if is_64 {
        LoadCommandBase::SIZE + 16 + 4 * 8 + 4 * 4
    } else {
        LoadCommandBase::SIZE + 16 + 4 * 4 + 4 * 4
    }
}
