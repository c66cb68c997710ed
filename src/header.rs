use std::io::Read;

use nom::{number::complete::be_u32, IResult};
use num_derive::FromPrimitive;
use strum_macros::Display;
use tracing::debug;

use crate::{
    endian::Endian,
    machine::{CpuSubType, CpuType},
    macho::{read_exact, MachOErr, MachOResult},
};

/// Magic values as they read when the first four bytes are taken big-endian.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Display)]
pub enum Magic {
    #[strum(serialize = "MH_MAGIC")]
    MhMagic = 0xfeedface,
    #[strum(serialize = "MH_CIGAM")]
    MhCigam = 0xcefaedfe,
    #[strum(serialize = "MH_MAGIC_64")]
    MhMagic64 = 0xfeedfacf,
    #[strum(serialize = "MH_CIGAM_64")]
    MhCigam64 = 0xcffaedfe,
    #[strum(serialize = "FAT_MAGIC")]
    FatMagic = 0xcafebabe,
    #[strum(serialize = "FAT_CIGAM")]
    FatCigam = 0xbebafeca,
}

impl Magic {
    pub const SIZE: usize = 4;

    pub fn parse(bytes: &[u8]) -> MachOResult<Magic> {
        let (_, magic) = be_u32::<_, nom::error::Error<&[u8]>>(bytes)?;
        num::FromPrimitive::from_u32(magic).ok_or(MachOErr::BadMagic(magic))
    }

    pub fn is_fat(self) -> bool {
        matches!(self, Magic::FatMagic | Magic::FatCigam)
    }

    pub fn is_64(self) -> bool {
        matches!(self, Magic::MhMagic64 | Magic::MhCigam64)
    }

    /// Byte order of the fields that follow the magic.
    pub fn endian(self) -> Endian {
        match self {
            Magic::MhMagic | Magic::MhMagic64 | Magic::FatMagic => Endian::Big,
            Magic::MhCigam | Magic::MhCigam64 | Magic::FatCigam => Endian::Little,
        }
    }

    pub fn serialize(self) -> [u8; 4] {
        (self as u32).to_be_bytes()
    }
}

bitflags::bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MHFlags: u32 {
        const MH_NOUNDEFS = 0x1;
        const MH_INCRLINK = 0x2;
        const MH_DYLDLINK = 0x4;
        const MH_BINDATLOAD = 0x8;
        const MH_PREBOUND = 0x10;
        const MH_SPLIT_SEGS = 0x20;
        const MH_LAZY_INIT = 0x40;
        const MH_TWOLEVEL = 0x80;
        const MH_FORCE_FLAT = 0x100;
        const MH_NOMULTIDEFS = 0x200;
        const MH_NOFIXPREBINDING = 0x400;
        const MH_PREBINDABLE = 0x800;
        const MH_ALLMODSBOUND = 0x1000;
        const MH_SUBSECTIONS_VIA_SYMBOLS = 0x2000;
        const MH_CANONICAL = 0x4000;
        const MH_WEAK_DEFINES = 0x8000;
        const MH_BINDS_TO_WEAK = 0x10000;
        const MH_ALLOW_STACK_EXECUTION = 0x20000;
        const MH_ROOT_SAFE = 0x40000;
        const MH_SETUID_SAFE = 0x80000;
        const MH_NO_REEXPORTED_DYLIBS = 0x100000;
        const MH_PIE = 0x200000;
        const MH_DEAD_STRIPPABLE_DYLIB = 0x400000;
        const MH_HAS_TLV_DESCRIPTORS = 0x800000;
        const MH_NO_HEAP_EXECUTION = 0x1000000;
        const MH_APP_EXTENSION_SAFE = 0x02000000;
        const MH_NLIST_OUTOFSYNC_WITH_DYLDINFO = 0x04000000;
        const MH_SIM_SUPPORT = 0x08000000;
        const MH_IMPLICIT_PAGEZERO = 0x10000000;
        const MH_DYLIB_IN_CACHE = 0x80000000;
    }
}

impl MHFlags {
    /// Flag names joined with `|`, unknown bits in hex.
    pub fn describe(bits: u32) -> String {
        let flags = MHFlags::from_bits_retain(bits);
        let mut names: Vec<String> = flags.iter_names().map(|(name, _)| name.to_string()).collect();
        let unknown = bits & !MHFlags::all().bits();
        if unknown != 0 {
            names.push(format!("{:#x}", unknown));
        }
        if names.is_empty() {
            "0".to_string()
        } else {
            names.join(" | ")
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Display)]
pub enum MHFileType {
    #[strum(serialize = "MH_OBJECT")]
    MhObject = 0x1,
    #[strum(serialize = "MH_EXECUTE")]
    MhExecute = 0x2,
    #[strum(serialize = "MH_FVMLIB")]
    MhFvmlib = 0x3,
    #[strum(serialize = "MH_CORE")]
    MhCore = 0x4,
    #[strum(serialize = "MH_PRELOAD")]
    MhPreload = 0x5,
    #[strum(serialize = "MH_DYLIB")]
    MhDylib = 0x6,
    #[strum(serialize = "MH_DYLINKER")]
    MhDylinker = 0x7,
    #[strum(serialize = "MH_BUNDLE")]
    MhBundle = 0x8,
    #[strum(serialize = "MH_DYLIB_STUB")]
    MhDylibStub = 0x9,
    #[strum(serialize = "MH_DSYM")]
    MhDsym = 0xa,
    #[strum(serialize = "MH_KEXT_BUNDLE")]
    MhKextBundle = 0xb,
    #[strum(serialize = "MH_FILESET")]
    MhFileset = 0xc,
}

impl MHFileType {
    pub fn describe(filetype: u32) -> String {
        match num::FromPrimitive::from_u32(filetype) {
            Some(ft) => MHFileType::to_string(&ft),
            None => format!("MH_UNKNOWN ({:#x})", filetype),
        }
    }
}

/// Fields shared by both header widths. Values are host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader32 {
    pub magic: Magic,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
}

impl MachHeader32 {
    pub const SIZE: u32 = 28;

    pub fn parse(bytes: &[u8], magic: Magic) -> IResult<&[u8], MachHeader32> {
        let endian = magic.endian();
        let (bytes, _) = be_u32(bytes)?;
        let (bytes, cputype) = endian.u32(bytes)?;
        let (bytes, cpusubtype) = endian.u32(bytes)?;
        let (bytes, filetype) = endian.u32(bytes)?;
        let (bytes, ncmds) = endian.u32(bytes)?;
        let (bytes, sizeofcmds) = endian.u32(bytes)?;
        let (bytes, flags) = endian.u32(bytes)?;

        Ok((
            bytes,
            MachHeader32 {
                magic,
                cputype,
                cpusubtype,
                filetype,
                ncmds,
                sizeofcmds,
                flags,
            },
        ))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let endian = self.magic.endian();
        let mut buf = Vec::with_capacity(Self::SIZE as usize);
        buf.extend(self.magic.serialize());
        for field in [
            self.cputype,
            self.cpusubtype,
            self.filetype,
            self.ncmds,
            self.sizeofcmds,
            self.flags,
        ] {
            buf.extend(endian.u32_bytes(field));
        }
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader64 {
    pub header: MachHeader32,
    pub reserved: u32,
}

impl MachHeader64 {
    pub const SIZE: u32 = 32;

    pub fn parse(bytes: &[u8], magic: Magic) -> IResult<&[u8], MachHeader64> {
        let (bytes, header) = MachHeader32::parse(bytes, magic)?;
        let (bytes, reserved) = magic.endian().u32(bytes)?;
        Ok((bytes, MachHeader64 { header, reserved }))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.header.serialize();
        buf.extend(self.header.magic.endian().u32_bytes(self.reserved));
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachHeader {
    Header32(MachHeader32),
    Header64(MachHeader64),
}

impl MachHeader {
    /// Reads a thin header from the current position of `buf`.
    pub fn read<T: Read>(buf: &mut T) -> MachOResult<MachHeader> {
        let mut magic_bytes = [0u8; Magic::SIZE];
        read_exact(buf, &mut magic_bytes, "mach header")?;
        let magic = Magic::parse(&magic_bytes)?;
        if magic.is_fat() {
            return Err(MachOErr::BadMagic(magic as u32));
        }

        let size = if magic.is_64() {
            MachHeader64::SIZE
        } else {
            MachHeader32::SIZE
        } as usize;
        let mut bytes = vec![0u8; size];
        bytes[..Magic::SIZE].copy_from_slice(&magic_bytes);
        read_exact(buf, &mut bytes[Magic::SIZE..], "mach header")?;

        let header = MachHeader::parse(&bytes, magic)?;
        debug!(
            magic = %magic,
            cputype = %CpuType::describe(header.cputype()),
            ncmds = header.ncmds(),
            sizeofcmds = header.sizeofcmds(),
            "parsed mach header"
        );
        Ok(header)
    }

    pub fn parse(bytes: &[u8], magic: Magic) -> MachOResult<MachHeader> {
        if magic.is_64() {
            let (_, header) = MachHeader64::parse(bytes, magic)?;
            Ok(MachHeader::Header64(header))
        } else {
            let (_, header) = MachHeader32::parse(bytes, magic)?;
            Ok(MachHeader::Header32(header))
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            MachHeader::Header32(h) => h.serialize(),
            MachHeader::Header64(h) => h.serialize(),
        }
    }

    fn common(&self) -> &MachHeader32 {
        match self {
            MachHeader::Header32(h) => h,
            MachHeader::Header64(h) => &h.header,
        }
    }

    fn common_mut(&mut self) -> &mut MachHeader32 {
        match self {
            MachHeader::Header32(h) => h,
            MachHeader::Header64(h) => &mut h.header,
        }
    }

    pub fn magic(&self) -> Magic {
        self.common().magic
    }

    pub fn endian(&self) -> Endian {
        self.magic().endian()
    }

    pub fn is_64(&self) -> bool {
        matches!(self, MachHeader::Header64(_))
    }

    pub fn cputype(&self) -> u32 {
        self.common().cputype
    }

    pub fn cpu_type(&self) -> Option<CpuType> {
        CpuType::from_raw(self.cputype())
    }

    pub fn cpusubtype(&self) -> u32 {
        self.common().cpusubtype
    }

    pub fn filetype(&self) -> u32 {
        self.common().filetype
    }

    pub fn file_type(&self) -> Option<MHFileType> {
        num::FromPrimitive::from_u32(self.filetype())
    }

    pub fn ncmds(&self) -> u32 {
        self.common().ncmds
    }

    pub fn sizeofcmds(&self) -> u32 {
        self.common().sizeofcmds
    }

    pub fn flags(&self) -> MHFlags {
        MHFlags::from_bits_retain(self.common().flags)
    }

    pub fn reserved(&self) -> Option<u32> {
        match self {
            MachHeader::Header32(_) => None,
            MachHeader::Header64(h) => Some(h.reserved),
        }
    }

    pub fn set_ncmds(&mut self, ncmds: u32) {
        self.common_mut().ncmds = ncmds;
    }

    pub fn set_sizeofcmds(&mut self, sizeofcmds: u32) {
        self.common_mut().sizeofcmds = sizeofcmds;
    }

    pub fn size(&self) -> u32 {
        match self {
            MachHeader::Header32(_) => MachHeader32::SIZE,
            MachHeader::Header64(_) => MachHeader64::SIZE,
        }
    }

    pub fn describe_cpu(&self) -> String {
        format!(
            "{} ({})",
            CpuType::describe(self.cputype()),
            CpuSubType::describe(self.cputype(), self.cpusubtype())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_magic_detection() {
        assert_eq!(Magic::parse(&[0xcf, 0xfa, 0xed, 0xfe]).unwrap(), Magic::MhCigam64);
        assert_eq!(Magic::MhCigam64.endian(), Endian::Little);
        assert_eq!(Magic::parse(&[0xfe, 0xed, 0xfa, 0xce]).unwrap(), Magic::MhMagic);
        assert_eq!(Magic::MhMagic.endian(), Endian::Big);
        assert!(Magic::parse(&[0xca, 0xfe, 0xba, 0xbe]).unwrap().is_fat());

        match Magic::parse(&[0x7f, b'E', b'L', b'F']) {
            Err(MachOErr::BadMagic(magic)) => assert_eq!(magic, 0x7f454c46),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_header64_little_endian() {
        let mut bytes = vec![0xcf, 0xfa, 0xed, 0xfe];
        for field in [0x0100000cu32, 0, 6, 13, 1208, 0x00100085, 0] {
            bytes.extend(field.to_le_bytes());
        }

        let header = MachHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(header.is_64());
        assert_eq!(header.endian(), Endian::Little);
        assert_eq!(header.cpu_type(), Some(CpuType::Arm64));
        assert_eq!(header.file_type(), Some(MHFileType::MhDylib));
        assert_eq!(header.ncmds(), 13);
        assert_eq!(header.sizeofcmds(), 1208);
        assert!(header.flags().contains(MHFlags::MH_TWOLEVEL));
        assert_eq!(header.reserved(), Some(0));
        assert_eq!(header.serialize(), bytes);
    }

    #[test]
    fn test_header32_big_endian() {
        let mut bytes = vec![0xfe, 0xed, 0xfa, 0xce];
        for field in [18u32, 0, 2, 4, 300, 0x85] {
            bytes.extend(field.to_be_bytes());
        }

        let header = MachHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(!header.is_64());
        assert_eq!(header.endian(), Endian::Big);
        assert_eq!(header.cpu_type(), Some(CpuType::PowerPC));
        assert_eq!(header.ncmds(), 4);
        assert_eq!(header.size(), 28);
        assert_eq!(header.serialize(), bytes);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = [0xcf, 0xfa, 0xed, 0xfe, 7, 0, 0, 1];
        assert!(matches!(
            MachHeader::read(&mut Cursor::new(&bytes)),
            Err(MachOErr::ParsingError(_))
        ));
    }

    #[test]
    fn test_fat_magic_is_not_a_thin_header() {
        let bytes = [0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 1];
        assert!(matches!(
            MachHeader::read(&mut Cursor::new(&bytes)),
            Err(MachOErr::BadMagic(0xcafebabe))
        ));
    }

    #[test]
    fn test_describe_flags() {
        assert_eq!(MHFlags::describe(0x85), "MH_NOUNDEFS | MH_DYLDLINK | MH_TWOLEVEL");
        assert_eq!(MHFlags::describe(0), "0");
        assert_eq!(MHFileType::describe(0x6), "MH_DYLIB");
        assert_eq!(MHFileType::describe(0x99), "MH_UNKNOWN (0x99)");
    }
}
