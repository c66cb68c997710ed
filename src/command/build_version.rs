use num_derive::FromPrimitive;
use strum_macros::{Display, EnumString};

use crate::{
    endian::Endian,
    macho::{MachOErr, MachOResult},
};

use super::{CommandCtx, LoadCommand, LoadCommandParser};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, EnumString, Display)]
pub enum Tool {
    #[strum(serialize = "clang")]
    Clang = 1,
    #[strum(serialize = "swift")]
    Swift = 2,
    #[strum(serialize = "ld")]
    Ld = 3,
    #[strum(serialize = "lld")]
    Lld = 4,
    #[strum(serialize = "metal")]
    Metal = 1024,
    #[strum(serialize = "airlld")]
    Airlld = 1025,
    #[strum(serialize = "airnt")]
    Airnt = 1026,
    #[strum(serialize = "airnt-plugin")]
    AirntPlugin = 1027,
    #[strum(serialize = "airpack")]
    Airpack = 1028,
    #[strum(serialize = "gpuarchiver")]
    Gpuarchiver = 1031,
    #[strum(serialize = "metal-framework")]
    MetalFramework = 1032,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, EnumString, Display)]
pub enum Platform {
    #[strum(serialize = "unknown")]
    Unknown = 0,
    #[strum(serialize = "any")]
    Any = 0xFFFFFFFF,
    #[strum(serialize = "macOS")]
    MacOS = 1,
    #[strum(serialize = "iOS")]
    IOS = 2,
    #[strum(serialize = "tvOS")]
    TvOS = 3,
    #[strum(serialize = "watchOS")]
    WatchOS = 4,
    #[strum(serialize = "bridgeOS")]
    BridgeOS = 5,
    #[strum(serialize = "macCatalyst")]
    MacCatalyst = 6,
    #[strum(serialize = "iOSSimulator")]
    IOSSimulator = 7,
    #[strum(serialize = "tvOSSimulator")]
    TvOSSimulator = 8,
    #[strum(serialize = "watchOSSimulator")]
    WatchOSSimulator = 9,
    #[strum(serialize = "driverKit")]
    DriverKit = 10,
    #[strum(serialize = "visionOS")]
    VisionOS = 11,
    #[strum(serialize = "visionOSSimulator")]
    VisionOSSimulator = 12,
    #[strum(serialize = "firmware")]
    Firmware = 13,
    #[strum(serialize = "sepOS")]
    SepOS = 14,
}

impl Platform {
    pub fn describe(platform: u32) -> String {
        match num::FromPrimitive::from_u32(platform) {
            Some(p) => Platform::to_string(&p),
            None => format!("PLATFORM_UNKNOWN ({:#x})", platform),
        }
    }
}

impl Tool {
    pub fn describe(tool: u32) -> String {
        match num::FromPrimitive::from_u32(tool) {
            Some(t) => Tool::to_string(&t),
            None => format!("TOOL_UNKNOWN ({:#x})", tool),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildToolVersion {
    pub tool: u32,
    pub version: u32,
}

impl BuildToolVersion {
    pub const SIZE: usize = 8;
}

/// `LC_BUILD_VERSION`. The tool records follow the fixed fields inside the
/// same command and are decoded lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersionCommand<'a> {
    pub platform: u32,
    pub minos: u32,
    pub sdk: u32,
    pub ntools: u32,
    tools: &'a [u8],
    endian: Endian,
}

impl<'a> BuildVersionCommand<'a> {
    pub fn tools(&self) -> impl Iterator<Item = MachOResult<BuildToolVersion>> + 'a {
        let endian = self.endian;
        self.tools
            .chunks_exact(BuildToolVersion::SIZE)
            .take(self.ntools as usize)
            .map(move |bytes| {
                let (bytes, tool) = endian.u32(bytes)?;
                let (_, version) = endian.u32(bytes)?;
                Ok(BuildToolVersion { tool, version })
            })
    }
}

impl<'a> LoadCommandParser<'a> for BuildVersionCommand<'a> {
    fn parse(ldcmd: &'a LoadCommand, ctx: CommandCtx) -> MachOResult<Self> {
        let endian = ctx.endian;
        let (cursor, platform) = endian.u32(&ldcmd.payload)?;
        let (cursor, minos) = endian.u32(cursor)?;
        let (cursor, sdk) = endian.u32(cursor)?;
        let (cursor, ntools) = endian.u32(cursor)?;

        let needed = ntools as usize * BuildToolVersion::SIZE;
        let tools = cursor.get(..needed).ok_or_else(|| {
            MachOErr::InvalidValue(format!(
                "build version declares {} tools but cmdsize is {}",
                ntools, ldcmd.cmdsize
            ))
        })?;

        Ok(BuildVersionCommand {
            platform,
            minos,
            sdk,
            ntools,
            tools,
            endian,
        })
    }
}
