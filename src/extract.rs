//! Extraction of a partition's file system to a directory tree.

use std::{
    fs,
    fs::File,
    io,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use tracing::debug;

use crate::{
    disc::{fst::Fst, SECTOR_SIZE},
    read::Partition,
    Error, Result, ResultContext,
};

/// Progress and cancellation sink consumed during extraction.
///
/// The callback is invoked synchronously after every copied chunk and is never
/// retained beyond the extraction call.
pub trait ExtractCallback {
    /// Reports the file being copied and the aggregated fraction of all
    /// partition file bytes copied so far. Return `false` to cancel.
    fn on_progress(&mut self, path: &str, fraction: f32) -> bool;
}

impl<F> ExtractCallback for F
where F: FnMut(&str, f32) -> bool
{
    fn on_progress(&mut self, path: &str, fraction: f32) -> bool { self(path, fraction) }
}

fn cancelled() -> Error {
    Error::Io("extraction cancelled".to_string(), io::Error::from(io::ErrorKind::Interrupted))
}

impl Partition {
    /// Extracts every file in the partition to the given directory, creating
    /// parent directories as needed.
    ///
    /// The copy is fail-fast: the first file that cannot be created or read
    /// aborts the remaining files. Partially written destination files are
    /// not removed.
    pub fn extract_to(
        &mut self,
        dir: impl AsRef<Path>,
        callback: &mut dyn ExtractCallback,
    ) -> Result<()> {
        let dir = dir.as_ref();
        let fst = Fst::new(&self.meta.raw_fst)?;
        let is_wii = self.reader.is_wii();
        let total = fst
            .nodes
            .iter()
            .filter(|n| n.is_file())
            .map(|n| n.length() as u64)
            .sum::<u64>()
            .max(1);
        debug!("Extracting {} files ({} bytes) to {}", fst.num_files(), total, dir.display());

        fs::create_dir_all(dir)
            .with_context(|| format!("Creating directory {}", dir.display()))?;
        let mut buf = vec![0u8; SECTOR_SIZE];
        let mut copied = 0u64;
        for (_, node, path) in fst.iter() {
            let out_path = dir.join(&path);
            if node.is_dir() {
                fs::create_dir_all(&out_path)
                    .with_context(|| format!("Creating directory {}", out_path.display()))?;
                continue;
            }
            let mut out = File::create(&out_path)
                .with_context(|| format!("Creating file {}", out_path.display()))?;
            self.reader
                .seek(SeekFrom::Start(node.offset(is_wii)))
                .with_context(|| format!("Seeking to file {path}"))?;
            let mut remaining = node.length() as u64;
            if remaining == 0 {
                // Zero-length files still get created and reported
                if !callback.on_progress(&path, copied as f32 / total as f32) {
                    return Err(cancelled());
                }
                continue;
            }
            while remaining > 0 {
                let chunk = remaining.min(buf.len() as u64) as usize;
                self.reader
                    .read_exact(&mut buf[..chunk])
                    .with_context(|| format!("Reading file {path}"))?;
                out.write_all(&buf[..chunk])
                    .with_context(|| format!("Writing file {}", out_path.display()))?;
                copied += chunk as u64;
                remaining -= chunk as u64;
                if !callback.on_progress(&path, copied as f32 / total as f32) {
                    return Err(cancelled());
                }
            }
        }
        Ok(())
    }
}
