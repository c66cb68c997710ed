use std::{
    fmt::Display,
    time::{Duration, UNIX_EPOCH},
};

use uuid::Uuid;

use crate::{
    command::{
        build_version::{Platform, Tool},
        segment::Word,
        BuildVersionCommand, LCLoadCommand, LoadCommand, LoadCommandParser, LoadCommandView,
        SegmentCommand,
    },
    header::{MHFileType, MHFlags},
    helpers::{source_version_string, version_string},
    macho::{MachOResult, MachObject},
};

const SEPARATOR: &str = "-----------------------------------------------\n";

fn field(out: &mut String, name: &str, value: impl Display) {
    out.push_str(&format!("  {} {}\n", name, value));
}

pub fn version_str(version: u32) -> String {
    version_string(version)
}

pub fn source_version_str(version: u64) -> String {
    source_version_string(version)
}

/// Seconds since the epoch as an RFC 3339 UTC date.
pub fn timestamp_str(timestamp: u32) -> String {
    let time = UNIX_EPOCH + Duration::from_secs(timestamp as u64);
    humantime::format_rfc3339_seconds(time).to_string()
}

pub fn uuid_str(uuid: &Uuid) -> String {
    format!("{:X}", uuid)
}

pub fn checksum_str(cksum: u32) -> String {
    format!("{:08X}", cksum)
}

/// 16 bytes per row: offset, hex bytes, then printable ASCII.
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::from("  bits:\n");
    for (row, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("  {:08x}", row * 16));
        for byte in chunk {
            out.push_str(&format!(" {:02x}", byte));
        }
        out.push_str(&"   ".repeat(16 - chunk.len()));
        out.push_str("  ");
        for &byte in chunk {
            out.push(if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

/// Read-only, human readable dump of a parsed object.
pub struct IntrospectObject<'a> {
    object: &'a MachObject,
}

impl<'a> IntrospectObject<'a> {
    pub fn new(object: &'a MachObject) -> Self {
        IntrospectObject { object }
    }

    pub fn header_info(&self) -> String {
        let header = self.object.header();
        let mut out = String::new();
        field(&mut out, "magic", header.magic());
        field(&mut out, "cputype", header.describe_cpu());
        field(&mut out, "filetype", MHFileType::describe(header.filetype()));
        field(&mut out, "ncmds", header.ncmds());
        field(&mut out, "sizeofcmds", header.sizeofcmds());
        field(&mut out, "flags", MHFlags::describe(header.flags().bits()));
        out
    }

    pub fn load_cmds(&self) -> MachOResult<String> {
        let mut out = String::new();
        for (index, ldcmd) in self.object.load_commands().iter().enumerate() {
            out.push_str(&format!("Load command {}\n", index));
            out.push_str(&format!("      cmd {}\n", ldcmd.name()));
            out.push_str(&format!("  cmdsize {}\n", ldcmd.cmdsize));
            out.push_str(&self.command_str(ldcmd)?);
            out.push_str(SEPARATOR);
        }
        Ok(out)
    }

    /// The `LC_BUILD_VERSION` block, if the object has one.
    pub fn target_info(&self) -> MachOResult<String> {
        match self
            .object
            .filter_cmds(&[LCLoadCommand::LcBuildVersion])
            .next()
        {
            Some(ldcmd) => {
                let build = BuildVersionCommand::parse(ldcmd, self.object.ctx())?;
                build_version_str(&build)
            }
            None => Ok("Target info not found!\n".to_string()),
        }
    }

    fn command_str(&self, ldcmd: &LoadCommand) -> MachOResult<String> {
        let mut out = String::new();
        match ldcmd.view(self.object.ctx())? {
            LoadCommandView::Segment32(seg) => out.push_str(&segment_str(&seg)?),
            LoadCommandView::Segment64(seg) => out.push_str(&segment_str(&seg)?),
            LoadCommandView::Dylib(dylib) => {
                field(&mut out, "name", dylib.name);
                field(&mut out, "timestamp", timestamp_str(dylib.timestamp));
                field(&mut out, "current_version", version_str(dylib.current_version));
                field(
                    &mut out,
                    "compatibility_version",
                    version_str(dylib.compatibility_version),
                );
            }
            LoadCommandView::Rpath(rpath) => field(&mut out, "path", rpath.path),
            LoadCommandView::Dylinker(dylinker) => field(&mut out, "name", dylinker.name),
            LoadCommandView::Sub(sub) => {
                let label = match ldcmd.kind() {
                    Some(LCLoadCommand::LcSubFramework) => "umbrella",
                    Some(LCLoadCommand::LcSubUmbrella) => "sub_umbrella",
                    Some(LCLoadCommand::LcSubClient) => "client",
                    _ => "sub_library",
                };
                field(&mut out, label, sub.name);
            }
            LoadCommandView::Fvmlib(fvmlib) => {
                field(&mut out, "name", fvmlib.name);
                field(&mut out, "minor_version", fvmlib.minor_version);
                field(&mut out, "header_addr", format!("{:#010x}", fvmlib.header_addr));
            }
            LoadCommandView::Fvmfile(fvmfile) => {
                field(&mut out, "name", fvmfile.name);
                field(&mut out, "header_addr", format!("{:#010x}", fvmfile.header_addr));
            }
            LoadCommandView::PreboundDylib(prebound) => {
                let linked: String = (0..prebound.nmodules)
                    .map(|module| if prebound.is_linked(module) { '1' } else { '0' })
                    .collect();
                field(&mut out, "name", prebound.name);
                field(&mut out, "nmodules", prebound.nmodules);
                field(&mut out, "linked_modules", linked);
            }
            LoadCommandView::Routines32(routines) => {
                field(&mut out, "init_address", format!("{:#x}", routines.init_address));
                field(&mut out, "init_module", routines.init_module);
                for (i, reserved) in routines.reserved.iter().enumerate() {
                    field(&mut out, &format!("reserved{}", i + 1), reserved);
                }
            }
            LoadCommandView::Routines64(routines) => {
                field(&mut out, "init_address", format!("{:#x}", routines.init_address));
                field(&mut out, "init_module", routines.init_module);
                for (i, reserved) in routines.reserved.iter().enumerate() {
                    field(&mut out, &format!("reserved{}", i + 1), reserved);
                }
            }
            LoadCommandView::Symtab(symtab) => {
                field(&mut out, "symoff", symtab.symoff);
                field(&mut out, "nsyms", symtab.nsyms);
                field(&mut out, "stroff", symtab.stroff);
                field(&mut out, "strsize", symtab.strsize);
            }
            LoadCommandView::Dysymtab(dysymtab) => {
                for (name, value) in dysymtab.fields() {
                    field(&mut out, name, value);
                }
            }
            LoadCommandView::DyldInfo(dyld_info) => {
                for (name, value) in dyld_info.fields() {
                    field(&mut out, name, value);
                }
            }
            LoadCommandView::TwoLevelHints(hints) => {
                field(&mut out, "offset", hints.offset);
                field(&mut out, "nhints", hints.nhints);
            }
            LoadCommandView::PrebindCksum(cksum) => {
                field(&mut out, "cksum", checksum_str(cksum.cksum))
            }
            LoadCommandView::Uuid(uuid) => field(&mut out, "uuid", uuid_str(&uuid.uuid)),
            LoadCommandView::LinkeditData(data) => {
                field(&mut out, "dataoff", data.dataoff);
                field(&mut out, "datasize", data.datasize);
            }
            LoadCommandView::EncryptionInfo(info) => {
                field(&mut out, "cryptoff", info.cryptoff);
                field(&mut out, "cryptsize", info.cryptsize);
                field(&mut out, "cryptid", info.cryptid);
                if let Some(pad) = info.pad {
                    field(&mut out, "pad", pad);
                }
            }
            LoadCommandView::VersionMin(version) => {
                field(&mut out, "version", version_str(version.version));
                field(&mut out, "sdk", version_str(version.sdk));
            }
            LoadCommandView::BuildVersion(build) => out.push_str(&build_version_str(&build)?),
            LoadCommandView::EntryPoint(entry) => {
                field(&mut out, "entryoff", entry.entryoff);
                field(&mut out, "stacksize", entry.stacksize);
            }
            LoadCommandView::SourceVersion(source) => {
                field(&mut out, "version", source_version_str(source.version))
            }
            LoadCommandView::LinkerOption(option) => {
                field(&mut out, "count", option.count);
                if option.count > 0 {
                    out.push_str("Options ---------------------------\n");
                }
                for string in option.strings() {
                    out.push_str(&format!("    {}\n", string));
                }
            }
            LoadCommandView::Note(note) => {
                field(&mut out, "data_owner", note.data_owner);
                field(&mut out, "offset", note.offset);
                field(&mut out, "size", note.size);
            }
            LoadCommandView::Raw(payload) => out.push_str(&hexdump(payload)),
        }
        Ok(out)
    }
}

fn build_version_str(build: &BuildVersionCommand<'_>) -> MachOResult<String> {
    let mut out = String::new();
    field(&mut out, "platform", Platform::describe(build.platform));
    field(&mut out, "minos", version_str(build.minos));
    field(&mut out, "sdk", version_str(build.sdk));
    field(&mut out, "ntools", build.ntools);
    if build.ntools > 0 {
        out.push_str("Tools ------------------------------\n");
    }
    for tool in build.tools() {
        let tool = tool?;
        out.push_str(&format!("    tool {}\n", Tool::describe(tool.tool)));
        out.push_str(&format!("    version {}\n", version_str(tool.version)));
    }
    Ok(out)
}

fn segment_str<W: Word>(seg: &SegmentCommand<'_, W>) -> MachOResult<String> {
    let mut out = String::new();
    field(&mut out, "segname", seg.name());
    field(&mut out, "vmaddr", format!("{:#018x}", seg.vmaddr));
    field(&mut out, "vmsize", format!("{:#018x}", seg.vmsize));
    field(&mut out, "fileoff", seg.fileoff());
    field(&mut out, "filesize", seg.filesize());
    field(&mut out, "maxprot", seg.maxprot);
    field(&mut out, "initprot", seg.initprot);
    field(&mut out, "nsects", seg.nsects);
    field(&mut out, "flags", format!("{:#x}", seg.flags.bits()));

    for section in seg.sections() {
        let section = section?;
        out.push_str("Section\n");
        field(&mut out, "sectname", section.name());
        field(&mut out, "segname", section.segment_name());
        field(&mut out, "addr", format!("{:#018x}", section.addr));
        field(&mut out, "size", format!("{:#018x}", section.size));
        field(&mut out, "offset", section.offset);
        let align = 1u64 << section.align.min(63);
        field(&mut out, "align", format!("2^{} ({})", section.align, align));
        field(&mut out, "reloff", section.reloff);
        field(&mut out, "nreloc", section.nreloc);
        match section.section_type() {
            Some(kind) => field(&mut out, "type", kind),
            None => field(&mut out, "type", format!("{:#x}", section.flags & 0xff)),
        }
        field(&mut out, "flags", format!("{:#010x}", section.flags));
        field(&mut out, "reserved1", section.reserved1);
        field(&mut out, "reserved2", section.reserved2);
        if let Some(reserved3) = section.reserved3 {
            field(&mut out, "reserved3", reserved3);
        }
    }
    Ok(out)
}
