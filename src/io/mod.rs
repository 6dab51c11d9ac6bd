use std::{
    fs::File,
    io,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::{read::DiscStream, Error, ErrorContext, Result};

/// A [`DiscStream`] backed by a file on disk.
///
/// The file handle is opened lazily, so clones are cheap: a clone starts with
/// no open handle and a cursor at the beginning of the file.
#[derive(Debug)]
pub struct FileStream {
    path: PathBuf,
    file: Option<File>,
}

impl FileStream {
    pub fn new(path: &Path) -> Result<Self> {
        let meta = match path.metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.context(format!("Failed to open {}", path.display()))),
        };
        if !meta.is_file() {
            return Err(Error::NotFound(format!("Input is not a file: {}", path.display())));
        }
        let file =
            File::open(path).map_err(|e| e.context(format!("Failed to open {}", path.display())))?;
        Ok(Self { path: path.to_path_buf(), file: Some(file) })
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
        }
        Ok(self.file.as_mut().unwrap())
    }
}

impl Clone for FileStream {
    fn clone(&self) -> Self { Self { path: self.path.clone(), file: None } }
}

impl Read for FileStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.file()?.read(buf) }
}

impl Seek for FileStream {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> { self.file()?.seek(pos) }
}

/// Opens a file as a [`DiscStream`].
pub fn open(path: &Path) -> Result<Box<dyn DiscStream>> {
    Ok(Box::new(FileStream::new(path)?))
}
