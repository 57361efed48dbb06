//! Generic buffered writer, with integrated optional .gz compression.
use flate2::{write::GzEncoder, Compression};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// [BufferedWriter] is an output abstraction to stream plain or
/// gzip encoded content.
#[derive(Debug)]
pub enum BufferedWriter {
    /// Plain stream
    Plain(BufWriter<File>),
    /// Gzip compressed stream
    Gz(BufWriter<GzEncoder<File>>),
}

impl BufferedWriter {
    /// Creates `path`, gzip encoding the stream when the file
    /// carries a ".gz" extension.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let f = File::create(path)?;
        if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false)
        {
            Ok(Self::Gz(BufWriter::new(GzEncoder::new(
                f,
                Compression::default(),
            ))))
        } else {
            Ok(Self::Plain(BufWriter::new(f)))
        }
    }
}

impl Write for BufferedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gz(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gz(w) => w.flush(),
        }
    }
}
