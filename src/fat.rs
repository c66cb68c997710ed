use std::io::{Read, Seek, SeekFrom, Write};

use nom::{multi::count, number::complete::be_u32, IResult};
use nom_derive::{Nom, Parse};
use tracing::{debug, error};

use crate::{
    header::Magic,
    helpers::align_up,
    machine::{CpuSubType, CpuType},
    macho::{read_exact, MachOErr, MachOResult, MachObject},
};

/// The fat header. Always stored big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatHeader {
    pub magic: Magic,
    pub nfat_arch: u32,
}

impl FatHeader {
    pub const SIZE: u64 = 8;

    pub fn parse(bytes: &[u8]) -> MachOResult<FatHeader> {
        let magic = Magic::parse(bytes)?;
        match magic {
            Magic::FatMagic => {}
            Magic::FatCigam => {
                return Err(MachOErr::InvalidValue(
                    "byte-swapped fat header".to_string(),
                ))
            }
            _ => return Err(MachOErr::BadMagic(magic as u32)),
        }
        let (_, nfat_arch) = be_u32::<_, nom::error::Error<&[u8]>>(&bytes[Magic::SIZE..])?;

        Ok(FatHeader { magic, nfat_arch })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.magic.serialize().to_vec();
        buf.extend(self.nfat_arch.to_be_bytes());
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Nom)]
pub struct FatArch {
    pub cputype: u32,
    pub cpusubtype: u32,
    pub offset: u32,
    pub size: u32,
    pub align: u32,
}

impl FatArch {
    pub const SIZE: u64 = 20;

    fn parse_table(bytes: &[u8], nfat_arch: usize) -> IResult<&[u8], Vec<FatArch>> {
        count(FatArch::parse_be, nfat_arch)(bytes)
    }

    pub fn serialize(&self) -> Vec<u8> {
        [
            self.cputype,
            self.cpusubtype,
            self.offset,
            self.size,
            self.align,
        ]
        .iter()
        .flat_map(|field| field.to_be_bytes())
        .collect()
    }

    pub fn cpu_type(&self) -> Option<CpuType> {
        CpuType::from_raw(self.cputype)
    }

    pub fn describe_cpu(&self) -> String {
        format!(
            "{} ({})",
            CpuType::describe(self.cputype),
            CpuSubType::describe(self.cputype, self.cpusubtype)
        )
    }
}

/// A universal binary: one complete Mach-O object per architecture, in the
/// order of the arch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatObject {
    header: FatHeader,
    archs: Vec<FatArch>,
    objects: Vec<MachObject>,
}

impl FatObject {
    /// Checks for a fat magic at the current position without consuming it.
    pub fn is_fat_magic<T: Read + Seek>(buf: &mut T) -> MachOResult<bool> {
        let pos = buf.stream_position()?;
        let mut magic = [0u8; Magic::SIZE];
        let read = buf.read_exact(&mut magic);
        buf.seek(SeekFrom::Start(pos))?;
        match read {
            Ok(()) => Ok(matches!(Magic::parse(&magic), Ok(m) if m.is_fat())),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse<T: Read + Seek>(buf: &mut T) -> MachOResult<Self> {
        buf.seek(SeekFrom::Start(0))?;
        let mut header_bytes = [0u8; FatHeader::SIZE as usize];
        read_exact(buf, &mut header_bytes, "fat header")?;
        let header = FatHeader::parse(&header_bytes)?;

        let table_size = header.nfat_arch as u64 * FatArch::SIZE;
        let mut table = Vec::new();
        buf.by_ref().take(table_size).read_to_end(&mut table)?;
        if table.len() as u64 != table_size {
            return Err(MachOErr::ParsingError(format!(
                "truncated fat arch table: {} entries declared",
                header.nfat_arch
            )));
        }
        let (_, archs) = FatArch::parse_table(&table, header.nfat_arch as usize)?;

        let mut objects = Vec::with_capacity(archs.len());
        for (index, arch) in archs.iter().enumerate() {
            buf.seek(SeekFrom::Start(arch.offset as u64))?;
            let object = MachObject::parse(buf)?;

            let consumed = object.size();
            if consumed != arch.size as u64 {
                error!(
                    index,
                    cpu = %arch.describe_cpu(),
                    declared = arch.size,
                    consumed,
                    "fat slice size does not match its object"
                );
                return Err(MachOErr::FatSliceMismatch {
                    index,
                    declared: arch.size as u64,
                    consumed,
                });
            }
            debug!(
                index,
                cpu = %arch.describe_cpu(),
                offset = arch.offset,
                size = arch.size,
                "parsed fat slice"
            );
            objects.push(object);
        }

        Ok(FatObject {
            header,
            archs,
            objects,
        })
    }

    pub fn check_layout(&self) -> MachOResult<()> {
        self.objects.iter().try_for_each(MachObject::check_layout)
    }

    /// Writes the header, the arch table, then every object at the offset
    /// its arch entry records.
    pub fn write<W: Write + Seek>(&mut self, out: &mut W) -> MachOResult<()> {
        self.check_layout()?;
        let start = out.stream_position()?;
        self.header.nfat_arch = self.archs.len() as u32;
        out.write_all(&self.header.serialize())?;
        for arch in &self.archs {
            out.write_all(&arch.serialize())?;
        }

        let table_end = FatHeader::SIZE + self.archs.len() as u64 * FatArch::SIZE;
        out.write_all(&vec![0u8; (align_up(table_end, 8) - table_end) as usize])?;

        for (arch, object) in self.archs.iter().zip(self.objects.iter_mut()) {
            out.seek(SeekFrom::Start(start + arch.offset as u64))?;
            object.write(out)?;
        }
        out.flush()?;

        debug!(narchs = self.archs.len(), "wrote fat object");
        Ok(())
    }

    pub fn header(&self) -> &FatHeader {
        &self.header
    }

    pub fn architectures(&self) -> &[FatArch] {
        &self.archs
    }

    pub fn objects(&self) -> &[MachObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [MachObject] {
        &mut self.objects
    }

    fn index_of(&self, cpu: CpuType) -> Option<usize> {
        self.archs.iter().position(|arch| arch.cputype == cpu as u32)
    }

    pub fn object_for(&self, cpu: CpuType) -> Option<&MachObject> {
        self.index_of(cpu).map(|index| &self.objects[index])
    }

    pub fn object_for_mut(&mut self, cpu: CpuType) -> Option<&mut MachObject> {
        self.index_of(cpu).map(move |index| &mut self.objects[index])
    }

    /// Detaches the slice for `cpu` as a thin object.
    pub fn into_object(mut self, cpu: CpuType) -> MachOResult<MachObject> {
        let index = self
            .index_of(cpu)
            .ok_or_else(|| MachOErr::ArchNotFound(cpu.to_string()))?;
        Ok(self.objects.swap_remove(index))
    }
}
