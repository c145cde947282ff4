use camino::{Utf8Path, Utf8PathBuf};
use hop_extract::Tagged;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::error::{Error, Result};

/// Where hop addresses go besides the console.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Only the console.
    #[default]
    Console,
    /// The console and a file.
    File(Utf8PathBuf),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::File(path) => write!(f, "{}", path),
            Destination::Console => write!(f, "<stdout>"),
        }
    }
}

impl Destination {
    /// Create a new Destination from a path.
    ///
    /// If the path is "-", the console is used.
    pub fn from_path(path: Utf8PathBuf) -> Self {
        if path.as_str() == "-" {
            Destination::Console
        } else {
            Destination::File(path)
        }
    }
}

/// Writes each hop to the console and, when configured, mirrors it to a file.
///
/// Every line is flushed as soon as it is written so that progressive output
/// is visible before the trace finishes. The file is closed when the writer is
/// dropped, on success and error paths alike; [`HopWriter::finish`] flushes
/// and surfaces any final write error.
pub struct HopWriter<C: Write> {
    console: C,
    file: Option<BufWriter<File>>,
    written: usize,
}

impl<C: Write> HopWriter<C> {
    /// Open the destination. Nothing is written yet.
    pub fn open(console: C, destination: &Destination) -> Result<HopWriter<C>> {
        let file = match destination {
            Destination::Console => None,
            Destination::File(path) => {
                let file = File::create(path).map_err(|err| open_error(path, err))?;
                tracing::debug!(%path, "opened output file");
                Some(BufWriter::new(file))
            }
        };

        Ok(HopWriter {
            console,
            file,
            written: 0,
        })
    }

    /// Write one address as a line.
    #[inline]
    pub fn write_hop(&mut self, ip: &str) -> Result<()> {
        self.write_line(ip.as_bytes())
    }

    /// Write one tagged tool line as a JSON line.
    pub fn write_tagged(&mut self, tagged: &Tagged) -> Result<()> {
        let mut json = Vec::with_capacity(128);
        tagged.write_json(&mut json)?;
        self.write_line(&json)
    }

    // The file is written first: once a hop shows on the console it is already on disk.
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(line)?;
            file.write_all(b"\n")?;
            file.flush()?;
        }

        self.console.write_all(line)?;
        self.console.write_all(b"\n")?;
        self.console.flush()?;

        self.written += 1;
        Ok(())
    }

    /// Number of lines written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and close the file, handing back the console writer.
    pub fn finish(mut self) -> Result<C> {
        self.console.flush()?;
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(self.console)
    }
}

fn open_error(path: &Utf8Path, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::PermissionDenied {
        Error::PermissionDenied {
            path: path.to_owned(),
        }
    } else {
        Error::OpenOutput {
            path: path.to_owned(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_console() {
        assert_eq!(
            Destination::from_path(Utf8PathBuf::from("-")),
            Destination::Console
        );
        assert_eq!(
            Destination::from_path(Utf8PathBuf::from("hops.txt")),
            Destination::File(Utf8PathBuf::from("hops.txt"))
        );
    }

    #[test]
    fn console_only_writes_once() {
        let mut out = HopWriter::open(Vec::new(), &Destination::Console).unwrap();
        out.write_hop("10.0.0.1").unwrap();
        out.write_hop("10.0.0.2").unwrap();
        assert_eq!(out.written(), 2);
        let console = out.finish().unwrap();
        assert_eq!(console, b"10.0.0.1\n10.0.0.2\n");
    }

    #[test]
    fn permission_denied_is_distinguished() {
        let path = Utf8Path::new("/root/hops.txt");
        let err = open_error(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::PermissionDenied { path } if path == "/root/hops.txt"));

        let err = open_error(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::OpenOutput { .. }));
    }
}
