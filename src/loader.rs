use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Seek, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{
    fat::FatObject,
    macho::{MachOResult, MachObject},
};

/// Either kind of file a Mach-O path can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachFile {
    Fat(FatObject),
    Object(MachObject),
}

impl MachFile {
    pub fn read<T: Read + Seek>(buf: &mut T) -> MachOResult<MachFile> {
        if FatObject::is_fat_magic(buf)? {
            Ok(MachFile::Fat(FatObject::parse(buf)?))
        } else {
            Ok(MachFile::Object(MachObject::parse(buf)?))
        }
    }

    pub fn write<W: Write + Seek>(&mut self, out: &mut W) -> MachOResult<()> {
        match self {
            MachFile::Fat(fat) => fat.write(out),
            MachFile::Object(object) => object.write(out),
        }
    }

    pub fn check_layout(&self) -> MachOResult<()> {
        match self {
            MachFile::Fat(fat) => fat.check_layout(),
            MachFile::Object(object) => object.check_layout(),
        }
    }

    /// Writes to `path`. An existing file is only replaced when `overwrite`
    /// is set; otherwise the call fails with `AlreadyExists`.
    pub fn write_to_path<P: AsRef<Path>>(&mut self, path: P, overwrite: bool) -> MachOResult<()> {
        self.persist(path.as_ref(), overwrite, None)
    }

    /// Writes into a temporary file beside `path` and renames it over `path`
    /// only once the whole file has been written. The result takes the
    /// permissions of the file it replaces, else those of `template`.
    fn persist(
        &mut self,
        path: &Path,
        overwrite: bool,
        template: Option<&Path>,
    ) -> MachOResult<()> {
        self.check_layout()?;
        if !overwrite && path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )
            .into());
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut out = BufWriter::new(&mut tmp);
            self.write(&mut out)?;
            out.flush()?;
        }

        let permissions = fs::metadata(path)
            .ok()
            .or_else(|| template.and_then(|t| fs::metadata(t).ok()))
            .map(|meta| meta.permissions());
        if let Some(permissions) = permissions {
            tmp.as_file().set_permissions(permissions)?;
        }

        if overwrite {
            tmp.persist(path).map_err(|e| e.error)?;
        } else {
            tmp.persist_noclobber(path).map_err(|e| e.error)?;
        }
        debug!(path = %path.display(), "wrote file");
        Ok(())
    }

    pub fn is_fat(&self) -> bool {
        matches!(self, MachFile::Fat(_))
    }

    pub fn objects(&self) -> Vec<&MachObject> {
        match self {
            MachFile::Fat(fat) => fat.objects().iter().collect(),
            MachFile::Object(object) => vec![object],
        }
    }

    pub fn objects_mut(&mut self) -> Vec<&mut MachObject> {
        match self {
            MachFile::Fat(fat) => fat.objects_mut().iter_mut().collect(),
            MachFile::Object(object) => vec![object],
        }
    }
}

pub struct MachOLoader {
    path: PathBuf,
    file: MachFile,
}

impl MachOLoader {
    pub fn open<P: AsRef<Path>>(path: P) -> MachOResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut buf = BufReader::new(File::open(&path)?);
        let file = MachFile::read(&mut buf)?;
        debug!(path = %path.display(), fat = file.is_fat(), "loaded file");

        Ok(MachOLoader { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &MachFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut MachFile {
        &mut self.file
    }

    pub fn into_file(self) -> MachFile {
        self.file
    }

    /// Writes the file to `path`. A new file gets the permissions of the one
    /// it was loaded from.
    pub fn write<P: AsRef<Path>>(&mut self, path: P, overwrite: bool) -> MachOResult<()> {
        self.file.persist(path.as_ref(), overwrite, Some(&self.path))
    }
}
