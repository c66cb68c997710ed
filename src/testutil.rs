//! In-memory Mach-O images for tests.

use crate::{
    command::{segment::segment_command_size, CommandCtx, LCLoadCommand, LoadCommand},
    endian::Endian,
    header::{MachHeader, MachHeader32, MachHeader64, Magic},
    helpers::align_up,
    machine::CpuType,
};

pub(crate) const DYLIB_ID: &str = "@rpath/libexample.1.dylib";
pub(crate) const DEFAULT_RPATH: &str = "@loader_path/../Frameworks";
pub(crate) const WEAK_DYLIB: &str = "/usr/lib/libweak.dylib";
pub(crate) const REEXPORT_DYLIB: &str = "@rpath/libreexported.dylib";
pub(crate) const LOAD_DYLIBS: [&str; 5] = [
    "@executable_path/../libs/libicuuc.73.dylib",
    "@executable_path/../libs/libicudata.73.dylib",
    "@executable_path/../libs/libicui18n.73.dylib",
    "/usr/lib/libSystem.B.dylib",
    "/usr/lib/libc++.1.dylib",
];
pub(crate) const UUID_BYTES: [u8; 16] = [
    0x3f, 0x2a, 0x9c, 0x01, 0x5b, 0x7e, 0x4d, 0x12, 0x8a, 0x60, 0xc4, 0x11, 0x02, 0xee, 0x90, 0x7d,
];

fn pad(ctx: CommandCtx, mut payload: Vec<u8>) -> Vec<u8> {
    let cmdsize = align_up(payload.len() as u64 + 8, ctx.alignment() as u64) as usize;
    payload.resize(cmdsize - 8, 0);
    payload
}

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

fn word(ctx: CommandCtx, buf: &mut Vec<u8>, value: u64) {
    if ctx.is_64 {
        buf.extend(ctx.endian.u64_bytes(value));
    } else {
        buf.extend(ctx.endian.u32_bytes(value as u32));
    }
}

pub(crate) fn words_command(ctx: CommandCtx, kind: LCLoadCommand, words: &[u32]) -> LoadCommand {
    let mut payload = Vec::new();
    for w in words {
        payload.extend(ctx.endian.u32_bytes(*w));
    }
    LoadCommand::new(kind as u32, pad(ctx, payload))
}

/// A command whose payload is an lc_str offset, `fixed` words, then the string.
pub(crate) fn string_command(
    ctx: CommandCtx,
    kind: LCLoadCommand,
    fixed: &[u32],
    value: &str,
) -> LoadCommand {
    let offset = 8 + 4 + 4 * fixed.len() as u32;
    let mut payload = ctx.endian.u32_bytes(offset).to_vec();
    for w in fixed {
        payload.extend(ctx.endian.u32_bytes(*w));
    }
    payload.extend(value.as_bytes());
    payload.push(0);
    LoadCommand::new(kind as u32, pad(ctx, payload))
}

pub(crate) fn dylib_command(ctx: CommandCtx, kind: LCLoadCommand, name: &str) -> LoadCommand {
    string_command(ctx, kind, &[2, 0x0001_0203, 0x0001_0000], name)
}

pub(crate) fn section_bytes(
    ctx: CommandCtx,
    sectname: &str,
    segname: &str,
    offset: u64,
    size: u64,
    flags: u32,
) -> Vec<u8> {
    let endian = ctx.endian;
    let mut buf = Vec::new();
    buf.extend(name16(sectname));
    buf.extend(name16(segname));
    word(ctx, &mut buf, offset);
    word(ctx, &mut buf, size);
    buf.extend(endian.u32_bytes(offset as u32));
    buf.extend(endian.u32_bytes(4));
    buf.extend(endian.u32_bytes(0));
    buf.extend(endian.u32_bytes(0));
    buf.extend(endian.u32_bytes(flags));
    buf.extend(endian.u32_bytes(0));
    buf.extend(endian.u32_bytes(0));
    if ctx.is_64 {
        buf.extend(endian.u32_bytes(0));
    }
    buf
}

/// Segment command with vmaddr equal to the file offset.
pub(crate) fn segment_command(
    ctx: CommandCtx,
    name: &str,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    sections: &[Vec<u8>],
) -> LoadCommand {
    let endian = ctx.endian;
    let prot = match name {
        "__PAGEZERO" => 0,
        "__TEXT" => 5,
        _ => 3,
    };
    let mut payload = name16(name).to_vec();
    word(ctx, &mut payload, fileoff);
    word(ctx, &mut payload, vmsize);
    word(ctx, &mut payload, fileoff);
    word(ctx, &mut payload, filesize);
    payload.extend(endian.u32_bytes(prot));
    payload.extend(endian.u32_bytes(prot));
    payload.extend(endian.u32_bytes(sections.len() as u32));
    payload.extend(endian.u32_bytes(0));
    assert_eq!(payload.len() as u32 + 8, segment_command_size(ctx.is_64));
    for section in sections {
        payload.extend(section);
    }
    let kind = if ctx.is_64 {
        LCLoadCommand::LcSegment64
    } else {
        LCLoadCommand::LcSegment
    };
    LoadCommand::new(kind as u32, payload)
}

/// Deterministic filler so segment bytes differ from zero padding.
pub(crate) fn pattern(offset: usize) -> u8 {
    ((offset * 31 + 7) % 251) as u8
}

pub(crate) struct ImageBuilder {
    ctx: CommandCtx,
    cputype: u32,
    cpusubtype: u32,
    filetype: u32,
    flags: u32,
    code_start: u64,
    cmds: Vec<LoadCommand>,
    regions: Vec<(u64, u64)>,
}

impl ImageBuilder {
    /// Bytes between the command table and `code_start` stay zero.
    pub(crate) fn new(
        ctx: CommandCtx,
        cputype: u32,
        cpusubtype: u32,
        filetype: u32,
        code_start: u64,
    ) -> Self {
        ImageBuilder {
            ctx,
            cputype,
            cpusubtype,
            filetype,
            flags: 0x0010_0085,
            code_start,
            cmds: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub(crate) fn command(mut self, cmd: LoadCommand) -> Self {
        self.cmds.push(cmd);
        self
    }

    pub(crate) fn segment(
        mut self,
        name: &str,
        vmsize: u64,
        fileoff: u64,
        filesize: u64,
        sections: &[(&str, u64, u64)],
    ) -> Self {
        let sections: Vec<Vec<u8>> = sections
            .iter()
            .map(|(sectname, offset, size)| {
                section_bytes(self.ctx, sectname, name, *offset, *size, 0)
            })
            .collect();
        self.cmds
            .push(segment_command(self.ctx, name, vmsize, fileoff, filesize, &sections));
        self.regions.push((fileoff, filesize));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let magic = match (self.ctx.endian, self.ctx.is_64) {
            (Endian::Little, true) => Magic::MhCigam64,
            (Endian::Little, false) => Magic::MhCigam,
            (Endian::Big, true) => Magic::MhMagic64,
            (Endian::Big, false) => Magic::MhMagic,
        };
        let common = MachHeader32 {
            magic,
            cputype: self.cputype,
            cpusubtype: self.cpusubtype,
            filetype: self.filetype,
            ncmds: self.cmds.len() as u32,
            sizeofcmds: self.cmds.iter().map(|c| c.cmdsize).sum(),
            flags: self.flags,
        };
        let header = if self.ctx.is_64 {
            MachHeader::Header64(MachHeader64 {
                header: common,
                reserved: 0,
            })
        } else {
            MachHeader::Header32(common)
        };

        let mut table = header.serialize();
        for cmd in &self.cmds {
            table.extend(cmd.serialize(self.ctx.endian));
        }
        assert!(table.len() as u64 <= self.code_start);

        let size = self
            .regions
            .iter()
            .map(|(off, size)| off + size)
            .max()
            .unwrap_or(0)
            .max(table.len() as u64) as usize;
        let mut image = vec![0u8; size];
        for (fileoff, filesize) in &self.regions {
            let start = (*fileoff).max(self.code_start) as usize;
            let end = (fileoff + filesize) as usize;
            for (i, byte) in image.iter_mut().enumerate().take(end).skip(start) {
                *byte = pattern(i);
            }
        }
        image[..table.len()].copy_from_slice(&table);
        image
    }
}

/// 64-bit little-endian dylib: three segments, an id, five load dylibs, one
/// weak and one reexported dylib, one rpath and assorted linkedit commands.
pub(crate) fn dylib_image(cputype: u32, cpusubtype: u32, rpath: &str) -> Vec<u8> {
    let ctx = CommandCtx::new(Endian::Little, true);
    let mut image = ImageBuilder::new(ctx, cputype, cpusubtype, 0x6, 0xf00)
        .segment("__TEXT", 0x1000, 0, 0x1000, &[("__text", 0xf00, 0x100)])
        .segment("__DATA", 0x1000, 0x1000, 0x1000, &[("__data", 0x1000, 0x40)])
        .segment("__LINKEDIT", 0x1000, 0x2000, 0x800, &[])
        .command(dylib_command(ctx, LCLoadCommand::LcIdDylib, DYLIB_ID));
    for path in LOAD_DYLIBS {
        image = image.command(dylib_command(ctx, LCLoadCommand::LcLoadDylib, path));
    }
    image
        .command(dylib_command(ctx, LCLoadCommand::LcLoadWeakDylib, WEAK_DYLIB))
        .command(dylib_command(ctx, LCLoadCommand::LcReexportDylib, REEXPORT_DYLIB))
        .command(string_command(ctx, LCLoadCommand::LcRpath, &[], rpath))
        .command(LoadCommand::new(LCLoadCommand::LcUuid as u32, UUID_BYTES.to_vec()))
        .command(words_command(
            ctx,
            LCLoadCommand::LcBuildVersion,
            &[1, 0x000b_0000, 0x000e_0200, 1, 3, 0x0387_0100],
        ))
        .command(LoadCommand::new(
            LCLoadCommand::LcSourceVersion as u32,
            ctx.endian.u64_bytes((1205 << 40) | (3 << 30) | (2 << 10) | 1).to_vec(),
        ))
        .command(words_command(ctx, LCLoadCommand::LcSymtab, &[0x2000, 4, 0x2040, 0x40]))
        .command(words_command(ctx, LCLoadCommand::LcFunctionStarts, &[0x2080, 0x10]))
        .build()
}

pub(crate) fn x86_64_dylib() -> Vec<u8> {
    dylib_image(CpuType::X86_64 as u32, 3, DEFAULT_RPATH)
}

pub(crate) fn arm64_dylib() -> Vec<u8> {
    dylib_image(CpuType::Arm64 as u32, 0, DEFAULT_RPATH)
}

/// 32-bit big-endian PowerPC executable with `__PAGEZERO` and an rpath of
/// `/old/path`.
pub(crate) fn ppc_executable() -> Vec<u8> {
    let ctx = CommandCtx::new(Endian::Big, false);
    ImageBuilder::new(ctx, CpuType::PowerPC as u32, 0, 0x2, 0x800)
        .segment("__PAGEZERO", 0x1000, 0, 0, &[])
        .segment("__TEXT", 0x1000, 0, 0x1000, &[("__text", 0x800, 0x200)])
        .segment("__LINKEDIT", 0x1000, 0x1000, 0x400, &[])
        .command(string_command(ctx, LCLoadCommand::LcLoadDylinker, &[], "/usr/lib/dyld"))
        .command(dylib_command(ctx, LCLoadCommand::LcLoadDylib, "/usr/lib/libSystem.B.dylib"))
        .command(string_command(ctx, LCLoadCommand::LcRpath, &[], "/old/path"))
        .command(words_command(ctx, LCLoadCommand::LcUnixThread, &[1, 2, 0xdead_beef, 0x4242_4242]))
        .command(words_command(ctx, LCLoadCommand::LcSymtab, &[0x1000, 2, 0x1020, 0x20]))
        .build()
}

/// Wraps thin images in a big-endian fat container, slices page aligned.
pub(crate) fn fat_image(slices: &[(u32, u32, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(0xcafebabeu32.to_be_bytes());
    out.extend((slices.len() as u32).to_be_bytes());

    let mut offset = align_up(8 + 20 * slices.len() as u64, 0x1000);
    let mut placed = Vec::new();
    for (cputype, cpusubtype, image) in slices {
        for field in [*cputype, *cpusubtype, offset as u32, image.len() as u32, 12] {
            out.extend(field.to_be_bytes());
        }
        placed.push((offset, image));
        offset = align_up(offset + image.len() as u64, 0x1000);
    }
    for (offset, image) in placed {
        out.resize(offset as usize, 0);
        out.extend(image.iter());
    }
    out
}

pub(crate) fn universal_dylib() -> Vec<u8> {
    fat_image(&[
        (CpuType::X86_64 as u32, 3, x86_64_dylib()),
        (CpuType::Arm64 as u32, 0, arm64_dylib()),
    ])
}
