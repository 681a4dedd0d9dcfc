//! File-side collaborators of the protocol engines.
//!
//! The engines touch files through three small pieces: [`FileChunker`]
//! yields a file's content as payload-sized chunks in order, [`OutputSink`]
//! assembles an incoming transfer in a scratch file and renames it once the
//! negotiated name is known, and free functions cover collision-free naming
//! and the throughput figure.  All I/O here is blocking `std::fs`; chunks
//! are small and nothing runs concurrently with a transfer.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::packet::MAX_PAYLOAD;

/// Name of the scratch file a transfer is assembled into before the
/// negotiated name is known.
pub const SCRATCH_NAME: &str = "new_file";

/// Reads a file as successive payloads of at most [`MAX_PAYLOAD`] bytes.
#[derive(Debug)]
pub struct FileChunker {
    reader: BufReader<File>,
}

impl FileChunker {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }

    /// The next chunk, or `None` at end of file.  Every chunk except
    /// possibly the last is exactly [`MAX_PAYLOAD`] bytes.
    pub fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }

    /// Reposition at the start of the file so the chunk sequence can be
    /// produced again from the beginning.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

/// Accumulates in-order payloads for one incoming transfer.
///
/// Bytes land in a scratch file named [`SCRATCH_NAME`]; [`OutputSink::finalize`]
/// renames it to a collision-free variant of the negotiated name and returns
/// the final path.
#[derive(Debug)]
pub struct OutputSink {
    file: File,
    scratch: PathBuf,
    dir: PathBuf,
    written: u64,
}

impl OutputSink {
    /// Create the scratch file inside `dir`, truncating any leftover one.
    pub fn create(dir: &Path) -> io::Result<Self> {
        let scratch = dir.join(SCRATCH_NAME);
        Ok(Self {
            file: File::create(&scratch)?,
            scratch,
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    /// Append one accepted payload.
    pub fn append(&mut self, payload: &[u8]) -> io::Result<()> {
        self.file.write_all(payload)?;
        self.written += payload.len() as u64;
        Ok(())
    }

    /// Content bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush and rename the scratch file to `name`, or to a counter-suffixed
    /// variant when `name` is already taken.  With no negotiated name the
    /// artifact keeps the scratch name.
    pub fn finalize(self, name: Option<&str>) -> io::Result<PathBuf> {
        let OutputSink {
            mut file,
            scratch,
            dir,
            written: _,
        } = self;
        file.flush()?;
        drop(file);

        let name = match name {
            Some(name) => name,
            None => return Ok(scratch),
        };
        let dest = unique_destination(&dir, name);
        fs::rename(&scratch, &dest)?;
        Ok(dest)
    }
}

/// First non-existing destination for `name` inside `dir`: `name` itself,
/// then `base(0).ext`, `base(1).ext`, and so on.  Only the last dot starts
/// the extension; a leading dot is part of the base name.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, Some(ext)),
        _ => (name, None),
    };
    let mut copy = 0u32;
    loop {
        let numbered = match ext {
            Some(ext) => format!("{base}({copy}).{ext}"),
            None => format!("{base}({copy})"),
        };
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        copy += 1;
    }
}

/// Throughput of a transfer in megabits per second.
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    (bytes as f64 * 8.0 / 1_000_000.0) / elapsed.as_secs_f64()
}

/// The base name a file is announced under on the wire.
///
/// `None` when the path ends in `..` or the name is not valid UTF-8.
pub fn base_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn chunker_splits_at_payload_boundary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src.bin");
        fs::write(&path, vec![9u8; MAX_PAYLOAD * 2 + 10]).unwrap();

        let mut chunker = FileChunker::open(&path).unwrap();
        assert_eq!(chunker.next_chunk().unwrap().unwrap().len(), MAX_PAYLOAD);
        assert_eq!(chunker.next_chunk().unwrap().unwrap().len(), MAX_PAYLOAD);
        assert_eq!(chunker.next_chunk().unwrap().unwrap().len(), 10);
        assert!(chunker.next_chunk().unwrap().is_none());
    }

    #[test]
    fn chunker_empty_file_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let mut chunker = FileChunker::open(&path).unwrap();
        assert!(chunker.next_chunk().unwrap().is_none());
    }

    #[test]
    fn chunker_rewind_replays_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.txt");
        fs::write(&path, b"abcdef").unwrap();

        let mut chunker = FileChunker::open(&path).unwrap();
        assert_eq!(chunker.next_chunk().unwrap().unwrap(), b"abcdef");
        assert!(chunker.next_chunk().unwrap().is_none());
        chunker.rewind().unwrap();
        assert_eq!(chunker.next_chunk().unwrap().unwrap(), b"abcdef");
    }

    #[test]
    fn sink_appends_and_finalizes_under_negotiated_name() {
        let dir = TempDir::new().unwrap();
        let mut sink = OutputSink::create(dir.path()).unwrap();
        sink.append(b"hello ").unwrap();
        sink.append(b"world").unwrap();
        assert_eq!(sink.bytes_written(), 11);

        let path = sink.finalize(Some("greeting.txt")).unwrap();
        assert_eq!(path.file_name().unwrap(), "greeting.txt");
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert!(!dir.path().join(SCRATCH_NAME).exists());
    }

    #[test]
    fn sink_without_name_keeps_the_scratch_file() {
        let dir = TempDir::new().unwrap();
        let mut sink = OutputSink::create(dir.path()).unwrap();
        sink.append(b"partial").unwrap();

        let path = sink.finalize(None).unwrap();
        assert_eq!(path.file_name().unwrap(), SCRATCH_NAME);
        assert_eq!(fs::read(&path).unwrap(), b"partial");
    }

    #[test]
    fn destination_without_collision_is_untouched() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            unique_destination(dir.path(), "fresh.txt"),
            dir.path().join("fresh.txt")
        );
    }

    #[test]
    fn destination_collision_appends_a_counter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.pdf"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "report.pdf").file_name().unwrap(),
            "report(0).pdf"
        );
        fs::write(dir.path().join("report(0).pdf"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "report.pdf").file_name().unwrap(),
            "report(1).pdf"
        );
    }

    #[test]
    fn destination_counter_without_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("LICENSE"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "LICENSE").file_name().unwrap(),
            "LICENSE(0)"
        );
    }

    #[test]
    fn dotted_base_names_keep_their_interior_dots() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("archive.tar.gz"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "archive.tar.gz").file_name().unwrap(),
            "archive.tar(0).gz"
        );
    }

    #[test]
    fn hidden_files_count_the_dot_as_base() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".bashrc"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), ".bashrc").file_name().unwrap(),
            ".bashrc(0)"
        );
    }

    #[test]
    fn throughput_converts_bytes_and_seconds_to_mbps() {
        let got = throughput_mbps(1_000_000, Duration::from_secs(2));
        assert!((got - 4.0).abs() < 1e-9, "got {got}");
        assert_eq!(
            format!("{:.2}", throughput_mbps(125_000, Duration::from_secs(1))),
            "1.00"
        );
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name(Path::new("/tmp/dir/file.txt")), Some("file.txt"));
        assert_eq!(base_name(Path::new("file.txt")), Some("file.txt"));
        assert_eq!(base_name(Path::new("/tmp/dir/..")), None);
    }
}
