//! Generic buffered reader, with seamless .gz decompression.
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// [BufferedReader] is an input abstraction to stream plain or
/// gzip compressed acquisition files transparently.
#[derive(Debug)]
pub enum BufferedReader {
    /// Plain readable stream
    Plain(BufReader<File>),
    /// Gzip compressed stream
    Gz(BufReader<GzDecoder<File>>),
}

impl BufferedReader {
    /// Opens `path`, decompressing on the fly when the file
    /// carries a ".gz" extension.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let f = File::open(path)?;
        if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false)
        {
            Ok(Self::Gz(BufReader::new(GzDecoder::new(f))))
        } else {
            Ok(Self::Plain(BufReader::new(f)))
        }
    }
}

impl Read for BufferedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Gz(r) => r.read(buf),
        }
    }
}
