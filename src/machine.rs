use num_derive::FromPrimitive;
use strum_macros::{Display, EnumString};

#[repr(u32)]
#[derive(Debug, Copy, Clone, FromPrimitive)]
pub enum CpuABI {
    ABI64 = 0x01000000,
    ABI64_32 = 0x02000000,
}
impl CpuABI {
    pub const MASK: u32 = 0xff000000;
}

/// Known CPU types. The string forms are the names accepted by `--arch`.
#[repr(u32)]
#[derive(Debug, Copy, Clone, FromPrimitive, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum CpuType {
    #[strum(serialize = "any")]
    Any = 0,
    #[strum(serialize = "vax")]
    Vax = 1,
    #[strum(serialize = "mc680x0")]
    Mc680x0 = 6,
    #[strum(serialize = "x86", serialize = "i386")]
    I386 = 7,
    #[strum(serialize = "x86_64")]
    X86_64 = 7 | CpuABI::ABI64 as u32,
    #[strum(serialize = "mc98000")]
    Mc98000 = 10,
    #[strum(serialize = "hppa")]
    Hppa = 11,
    #[strum(serialize = "arm")]
    Arm = 12,
    #[strum(serialize = "arm64")]
    Arm64 = 12 | CpuABI::ABI64 as u32,
    #[strum(serialize = "arm64_32")]
    Arm64_32 = 12 | CpuABI::ABI64_32 as u32,
    #[strum(serialize = "mc88000")]
    Mc88000 = 13,
    #[strum(serialize = "sparc")]
    Sparc = 14,
    #[strum(serialize = "i860")]
    I860 = 15,
    #[strum(serialize = "ppc", serialize = "powerpc")]
    PowerPC = 18,
    #[strum(serialize = "ppc64", serialize = "powerpc64")]
    PowerPC64 = 18 | CpuABI::ABI64 as u32,
}

impl CpuType {
    pub fn from_raw(cputype: u32) -> Option<CpuType> {
        num::FromPrimitive::from_u32(cputype)
    }

    /// Human readable name for a raw header value, unknown values in hex.
    pub fn describe(cputype: u32) -> String {
        match CpuType::from_raw(cputype) {
            Some(cpu) => cpu.to_string(),
            None => format!("unknown ({:#x})", cputype),
        }
    }
}

pub struct CpuSubType;

impl CpuSubType {
    pub const CPU_SUBTYPE_MASK: u32 = 0xff000000;
    pub const CPU_SUBTYPE_LIB64: u32 = 0x80000000;
    pub const CPU_SUBTYPE_PTRAUTH_ABI: u32 = 0x80000000;

    /// Subtype name for the families the tool knows, capability bits masked off.
    pub fn describe(cputype: u32, cpusubtype: u32) -> String {
        let subtype = cpusubtype & !Self::CPU_SUBTYPE_MASK;
        let name = match (CpuType::from_raw(cputype), subtype) {
            (Some(CpuType::I386 | CpuType::X86_64), 3) => Some("all"),
            (Some(CpuType::I386 | CpuType::X86_64), 4) => Some("arch1"),
            (Some(CpuType::X86_64), 8) => Some("haswell"),
            (Some(CpuType::Arm64), 0) => Some("all"),
            (Some(CpuType::Arm64), 1) => Some("v8"),
            (Some(CpuType::Arm64), 2) => Some("arm64e"),
            (Some(CpuType::Arm), 0) => Some("all"),
            (Some(CpuType::Arm), 6) => Some("v6"),
            (Some(CpuType::Arm), 9) => Some("v7"),
            (Some(CpuType::Arm), 11) => Some("v7s"),
            (Some(CpuType::Arm), 12) => Some("v7k"),
            (Some(CpuType::PowerPC | CpuType::PowerPC64), 0) => Some("all"),
            _ => None,
        };
        match name {
            Some(name) => name.to_string(),
            None => format!("{:#x}", cpusubtype),
        }
    }
}
