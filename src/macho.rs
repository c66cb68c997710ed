use std::io::{self, Read, Seek, SeekFrom, Write};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    command::{
        segment::Word, CommandCtx, LCLoadCommand, LcStr, LoadCommand, LoadCommandBase,
        LoadCommandParser, RpathCommand, SegmentCommand, SegmentCommand32, SegmentCommand64,
    },
    header::{MachHeader, Magic},
    segment::DataSegment,
};

#[derive(Debug, Error)]
pub enum MachOErr {
    #[error("not a Mach-O object (magic {0:#010x})")]
    BadMagic(u32),
    #[error("parsing error: {0}")]
    ParsingError(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("fat slice {index} declares {declared:#x} bytes but {consumed:#x} were consumed")]
    FatSliceMismatch {
        index: usize,
        declared: u64,
        consumed: u64,
    },
    #[error("load commands need {needed:#x} bytes but the first section starts at {available:#x}")]
    HeaderPadding { needed: u64, available: u64 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("architecture {0} not found")]
    ArchNotFound(String),
    #[error(transparent)]
    IOError(#[from] io::Error),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for MachOErr {
    fn from(err: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(needed) => {
                MachOErr::ParsingError(format!("incomplete input: {:?}", needed))
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => MachOErr::ParsingError(format!(
                "{:?} with {} bytes left",
                e.code,
                e.input.len()
            )),
        }
    }
}

pub type MachOResult<T> = Result<T, MachOErr>;

/// `read_exact` that reports a short read as a truncated object.
pub(crate) fn read_exact<T: Read>(buf: &mut T, bytes: &mut [u8], what: &str) -> MachOResult<()> {
    buf.read_exact(bytes).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => MachOErr::ParsingError(format!("truncated {}", what)),
        _ => MachOErr::IOError(e),
    })
}

struct SegmentInfo {
    segname: [u8; 16],
    fileoff: u64,
    filesize: u64,
    /// Lowest file offset of content that follows the command table.
    content_start: Option<u64>,
}

impl SegmentInfo {
    fn of<W: Word>(seg: &SegmentCommand<'_, W>) -> MachOResult<Self> {
        let mut content_start = None;
        if seg.fileoff() > 0 && seg.filesize() > 0 {
            content_start = Some(seg.fileoff());
        }
        for section in seg.sections() {
            let section = section?;
            if section.offset != 0 && !section.is_zerofill() {
                let offset = section.offset as u64;
                content_start = Some(content_start.map_or(offset, |start: u64| start.min(offset)));
            }
        }

        Ok(SegmentInfo {
            segname: seg.segname,
            fileoff: seg.fileoff(),
            filesize: seg.filesize(),
            content_start,
        })
    }

    fn parse(ldcmd: &LoadCommand, ctx: CommandCtx) -> MachOResult<Option<Self>> {
        match ldcmd.kind() {
            Some(LCLoadCommand::LcSegment) => {
                Ok(Some(Self::of(&SegmentCommand32::parse(ldcmd, ctx)?)?))
            }
            Some(LCLoadCommand::LcSegment64) => {
                Ok(Some(Self::of(&SegmentCommand64::parse(ldcmd, ctx)?)?))
            }
            _ => Ok(None),
        }
    }
}

/// A single architecture Mach-O image held fully in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachObject {
    header: MachHeader,
    load_commands: Vec<LoadCommand>,
    data_segments: Vec<DataSegment>,
    start: u64,
    original_data_begins: u64,
}

impl MachObject {
    /// Checks for a thin magic at the current position without consuming it.
    pub fn is_macho_magic<T: Read + Seek>(buf: &mut T) -> MachOResult<bool> {
        let pos = buf.stream_position()?;
        let mut magic = [0u8; Magic::SIZE];
        let read = buf.read_exact(&mut magic);
        buf.seek(SeekFrom::Start(pos))?;
        match read {
            Ok(()) => Ok(matches!(Magic::parse(&magic), Ok(m) if !m.is_fat())),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses the object that starts at the current stream position. All file
    /// offsets inside it are taken relative to that position.
    pub fn parse<T: Read + Seek>(buf: &mut T) -> MachOResult<Self> {
        let start = buf.stream_position()?;
        let header = MachHeader::read(buf)?;
        let ctx = CommandCtx::new(header.endian(), header.is_64());
        let load_commands = Self::read_load_commands(buf, &header)?;

        let mut data_segments = Vec::new();
        for ldcmd in &load_commands {
            if let Some(info) = SegmentInfo::parse(ldcmd, ctx)? {
                data_segments.push(DataSegment::read(
                    buf,
                    start,
                    info.segname,
                    info.fileoff,
                    info.filesize,
                )?);
            }
        }

        let original_data_begins = header.size() as u64 + header.sizeofcmds() as u64;
        debug!(
            start,
            ncmds = load_commands.len(),
            segments = data_segments.len(),
            data_begins = original_data_begins,
            "parsed mach object"
        );

        Ok(MachObject {
            header,
            load_commands,
            data_segments,
            start,
            original_data_begins,
        })
    }

    fn read_load_commands<T: Read>(
        buf: &mut T,
        header: &MachHeader,
    ) -> MachOResult<Vec<LoadCommand>> {
        let endian = header.endian();
        let align = if header.is_64() { 8 } else { 4 };
        let table_size = header.sizeofcmds() as u64;

        let mut consumed = 0u64;
        let mut load_commands = Vec::new();
        for index in 0..header.ncmds() {
            if consumed + LoadCommandBase::SIZE as u64 > table_size {
                return Err(MachOErr::InvalidValue(format!(
                    "load command {} starts beyond sizeofcmds {:#x}",
                    index, table_size
                )));
            }

            let mut prefix = [0u8; LoadCommandBase::SIZE as usize];
            read_exact(buf, &mut prefix, "load command prefix")?;
            let (_, base) = LoadCommandBase::parse(&prefix, endian)?;

            if base.cmdsize < LoadCommandBase::SIZE {
                return Err(MachOErr::InvalidValue(format!(
                    "load command {} has cmdsize {}",
                    index, base.cmdsize
                )));
            }
            if base.cmdsize % align != 0 {
                return Err(MachOErr::InvalidValue(format!(
                    "load command {} ({}) cmdsize {} is not a multiple of {}",
                    index,
                    LCLoadCommand::describe(base.cmd),
                    base.cmdsize,
                    align
                )));
            }
            if consumed + base.cmdsize as u64 > table_size {
                return Err(MachOErr::InvalidValue(format!(
                    "load command {} overruns sizeofcmds {:#x}",
                    index, table_size
                )));
            }

            let mut payload = vec![0u8; (base.cmdsize - LoadCommandBase::SIZE) as usize];
            read_exact(buf, &mut payload, "load command")?;
            consumed += base.cmdsize as u64;

            trace!(
                index,
                cmd = %LCLoadCommand::describe(base.cmd),
                cmdsize = base.cmdsize,
                "read load command"
            );
            load_commands.push(LoadCommand {
                cmd: base.cmd,
                cmdsize: base.cmdsize,
                payload,
            });
        }

        if consumed != table_size {
            warn!(consumed, sizeofcmds = table_size, "command table is shorter than sizeofcmds");
        }
        Ok(load_commands)
    }

    pub fn header(&self) -> &MachHeader {
        &self.header
    }

    pub fn ctx(&self) -> CommandCtx {
        CommandCtx::new(self.header.endian(), self.header.is_64())
    }

    pub fn is_64bits(&self) -> bool {
        self.header.is_64()
    }

    pub fn is_big_endian(&self) -> bool {
        self.header.endian().is_big()
    }

    /// Where the object began in the stream it was parsed from.
    pub fn start_offset(&self) -> u64 {
        self.start
    }

    /// End of the current command table, relative to the object start.
    pub fn data_begins(&self) -> u64 {
        self.header.size() as u64 + self.load_commands.iter().map(|c| c.cmdsize as u64).sum::<u64>()
    }

    /// Bytes the object spans: the furthest segment end or the command table.
    pub fn size(&self) -> u64 {
        self.data_segments
            .iter()
            .map(DataSegment::end)
            .fold(self.data_begins(), u64::max)
    }

    pub fn load_commands(&self) -> &[LoadCommand] {
        &self.load_commands
    }

    pub fn data_segments(&self) -> &[DataSegment] {
        &self.data_segments
    }

    pub fn filter_cmds<'a>(
        &'a self,
        kinds: &'a [LCLoadCommand],
    ) -> impl Iterator<Item = &'a LoadCommand> + 'a {
        self.load_commands
            .iter()
            .filter(move |ldcmd| kinds.iter().any(|kind| ldcmd.is(*kind)))
    }

    pub fn has_been_signed(&self) -> bool {
        self.filter_cmds(&[LCLoadCommand::LcCodeSignature]).next().is_some()
    }

    /// Strings of every command of `kinds`. All of them keep their lc_str in
    /// the first payload word.
    fn strings_of(&self, kinds: &[LCLoadCommand]) -> MachOResult<Vec<String>> {
        let endian = self.header.endian();
        self.filter_cmds(kinds)
            .map(|ldcmd| {
                let (_, lc_str) = LcStr::parse(&ldcmd.payload, endian)?;
                Ok(lc_str.resolve(&ldcmd.payload)?.into_owned())
            })
            .collect()
    }

    fn find_string(
        &self,
        kinds: &[LCLoadCommand],
        value: &str,
    ) -> MachOResult<Option<(usize, LcStr)>> {
        let endian = self.header.endian();
        for (index, ldcmd) in self.load_commands.iter().enumerate() {
            if !kinds.iter().any(|kind| ldcmd.is(*kind)) {
                continue;
            }
            let (_, lc_str) = LcStr::parse(&ldcmd.payload, endian)?;
            if lc_str.resolve(&ldcmd.payload)? == value {
                return Ok(Some((index, lc_str)));
            }
        }
        Ok(None)
    }

    fn first_of(&self, kinds: &[LCLoadCommand]) -> Option<usize> {
        self.load_commands
            .iter()
            .position(|ldcmd| kinds.iter().any(|kind| ldcmd.is(*kind)))
    }

    fn last_of(&self, kinds: &[LCLoadCommand]) -> Option<usize> {
        self.load_commands
            .iter()
            .rposition(|ldcmd| kinds.iter().any(|kind| ldcmd.is(*kind)))
    }

    pub fn rpaths(&self) -> MachOResult<Vec<String>> {
        self.strings_of(&[LCLoadCommand::LcRpath])
    }

    pub fn load_dylib_paths(&self) -> MachOResult<Vec<String>> {
        self.strings_of(&[LCLoadCommand::LcLoadDylib])
    }

    pub fn weak_load_dylib_paths(&self) -> MachOResult<Vec<String>> {
        self.strings_of(&[LCLoadCommand::LcLoadWeakDylib])
    }

    pub fn reexport_dylib_paths(&self) -> MachOResult<Vec<String>> {
        self.strings_of(&[LCLoadCommand::LcReexportDylib])
    }

    pub fn id(&self) -> MachOResult<Option<String>> {
        Ok(self.strings_of(&[LCLoadCommand::LcIdDylib])?.into_iter().next())
    }

    pub fn change_id(&mut self, id: &str) -> MachOResult<()> {
        let ctx = self.ctx();
        let index = self
            .first_of(&[LCLoadCommand::LcIdDylib])
            .ok_or_else(|| MachOErr::NotFound("LC_ID_DYLIB".to_string()))?;
        let ldcmd = &mut self.load_commands[index];
        let (_, lc_str) = LcStr::parse(&ldcmd.payload, ctx.endian)?;
        lc_str.rewrite(ldcmd, id, ctx)?;
        debug!(id, "changed dylib id");
        Ok(())
    }

    pub fn change_dylib_path(&mut self, old: &str, new: &str) -> MachOResult<()> {
        let kinds = [
            LCLoadCommand::LcLoadDylib,
            LCLoadCommand::LcLoadWeakDylib,
            LCLoadCommand::LcReexportDylib,
        ];
        self.replace_string(&kinds, "dylib", old, new)
    }

    pub fn change_rpath(&mut self, old: &str, new: &str) -> MachOResult<()> {
        self.replace_string(&[LCLoadCommand::LcRpath], "rpath", old, new)
    }

    fn replace_string(
        &mut self,
        kinds: &[LCLoadCommand],
        what: &str,
        old: &str,
        new: &str,
    ) -> MachOResult<()> {
        let ctx = self.ctx();
        let (index, lc_str) = self
            .find_string(kinds, old)?
            .ok_or_else(|| MachOErr::NotFound(format!("{} {}", what, old)))?;
        lc_str.rewrite(&mut self.load_commands[index], new, ctx)?;
        debug!(old, new, "replaced load command string");
        Ok(())
    }

    /// Inserts a new `LC_RPATH` after the last rpath, else after the last
    /// `LC_LOAD_DYLIB`, else after the last segment.
    pub fn add_rpath(&mut self, path: &str) -> MachOResult<()> {
        if path.as_bytes().contains(&0) {
            return Err(MachOErr::InvalidValue(format!("rpath {:?} contains a NUL byte", path)));
        }
        if self.find_string(&[LCLoadCommand::LcRpath], path)?.is_some() {
            return Err(MachOErr::InvalidValue(format!("rpath {} already present", path)));
        }

        let anchor = self
            .last_of(&[LCLoadCommand::LcRpath])
            .or_else(|| self.last_of(&[LCLoadCommand::LcLoadDylib]))
            .or_else(|| self.last_of(&[LCLoadCommand::LcSegment64, LCLoadCommand::LcSegment]))
            .ok_or_else(|| MachOErr::NotFound("insertion point for LC_RPATH".to_string()))?;

        let ldcmd = RpathCommand::build(path, self.ctx());
        debug!(path, index = anchor + 1, cmdsize = ldcmd.cmdsize, "adding rpath");
        self.load_commands.insert(anchor + 1, ldcmd);
        Ok(())
    }

    pub fn remove_rpath(&mut self, path: &str) -> MachOResult<()> {
        let (index, _) = self
            .find_string(&[LCLoadCommand::LcRpath], path)?
            .ok_or_else(|| MachOErr::NotFound(format!("rpath {}", path)))?;
        self.load_commands.remove(index);
        debug!(path, index, "removed rpath");
        Ok(())
    }

    /// Lowest offset of segment content that lies after the command table.
    fn content_start(&self) -> MachOResult<Option<u64>> {
        let ctx = self.ctx();
        let mut start: Option<u64> = None;
        for ldcmd in &self.load_commands {
            if let Some(info) = SegmentInfo::parse(ldcmd, ctx)? {
                if let Some(offset) = info.content_start {
                    start = Some(start.map_or(offset, |s| s.min(offset)));
                }
            }
        }
        Ok(start)
    }

    /// Fails with `HeaderPadding` when the current command table would run
    /// into segment content.
    pub fn check_layout(&self) -> MachOResult<()> {
        let data_begins = self.data_begins();
        match self.content_start()? {
            Some(available) if data_begins > available => Err(MachOErr::HeaderPadding {
                needed: data_begins,
                available,
            }),
            _ => Ok(()),
        }
    }

    /// Writes the object at the current position of `out`, recomputing
    /// `ncmds` and `sizeofcmds` first.
    pub fn write<W: Write + Seek>(&mut self, out: &mut W) -> MachOResult<()> {
        self.check_layout()?;
        let start = out.stream_position()?;
        let data_begins = self.data_begins();

        let sizeofcmds = u32::try_from(data_begins - self.header.size() as u64)
            .map_err(|_| MachOErr::InvalidValue("command table exceeds 4GiB".to_string()))?;
        self.header.set_sizeofcmds(sizeofcmds);
        self.header.set_ncmds(self.load_commands.len() as u32);

        let endian = self.header.endian();
        let ctx = self.ctx();
        out.write_all(&self.header.serialize())?;

        let mut first_segment: Option<u64> = None;
        for ldcmd in &self.load_commands {
            out.write_all(&ldcmd.serialize(endian))?;
            if let Some(info) = SegmentInfo::parse(ldcmd, ctx)? {
                first_segment = Some(first_segment.map_or(info.fileoff, |f| f.min(info.fileoff)));
            }
        }
        debug!(
            start,
            ncmds = self.load_commands.len(),
            sizeofcmds,
            first_segment,
            "wrote header and load commands"
        );

        for segment in &self.data_segments {
            segment.write(out, start, data_begins, self.original_data_begins)?;
        }
        out.flush()?;

        debug!(start, size = self.size(), "wrote mach object");
        Ok(())
    }
}
