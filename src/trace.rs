//! Running the trace tool and turning its output into hop addresses.
//!
//! An invocation moves through `launching`, then either `streaming`
//! (progressive) or `waiting` (buffered), then `draining`, and ends
//! `completed` or failed. Nothing is retried.
//!
//! There is no timeout on the child. An unresponsive target blocks the
//! caller until the tool itself gives up or the process is interrupted.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{ExitStatus, Stdio};
use std::thread;

use hop_extract::{Extractor, Tagged};
use tracing::debug;

use crate::error::{Error, Result};
use crate::platform::{TextDecoder, TraceTool};
use crate::sink::{Destination, HopWriter};

/// How the tool's output is collected.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Wait for the tool to exit, then parse everything it printed.
    #[default]
    Buffered,
    /// Parse and emit each line as the tool prints it.
    Progressive,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Buffered => write!(f, "buffered"),
            Mode::Progressive => write!(f, "progressive"),
        }
    }
}

/// How each hop is written.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One address per line.
    #[default]
    Lines,
    /// One JSON object per tool line that contains addresses.
    Tagged,
}

/// A single resolved trace invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRequest {
    target: String,
    mode: Mode,
    destination: Destination,
    format: OutputFormat,
    strict: bool,
}

impl TraceRequest {
    /// Create a buffered, console-only request. The target must not be empty
    /// and is passed to the tool as given.
    pub fn new<S: Into<String>>(target: S) -> Result<TraceRequest> {
        let target = target.into();
        if target.is_empty() {
            return Err(Error::EmptyTarget);
        }
        Ok(TraceRequest {
            target,
            mode: Mode::default(),
            destination: Destination::default(),
            format: OutputFormat::default(),
            strict: false,
        })
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// In progressive mode, treat a non-zero exit as a failure.
    ///
    /// Off by default: a progressive trace that dies mid-stream simply stops
    /// producing addresses. Buffered mode always checks the exit status.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

/// What a completed trace produced.
#[derive(Copy, Clone, Debug)]
pub struct TraceSummary {
    /// Number of addresses written.
    pub hops: usize,
    /// Exit status of the reaped tool.
    pub status: ExitStatus,
}

/// Runs a [`TraceTool`] and feeds its output through the hop extractor.
#[derive(Clone, Debug)]
pub struct Tracer {
    tool: TraceTool,
    decoder: TextDecoder,
}

impl Tracer {
    pub fn new(tool: TraceTool) -> Tracer {
        let decoder = tool.encoding().decoder();
        Tracer { tool, decoder }
    }

    pub fn tool(&self) -> &TraceTool {
        &self.tool
    }

    /// Open the request's destination, run the trace, and close the destination.
    ///
    /// The destination is opened before the tool is launched, so an unwritable
    /// output file fails without starting a trace.
    pub fn execute<C: Write>(&self, request: &TraceRequest, console: C) -> Result<TraceSummary> {
        let mut out = HopWriter::open(console, request.destination())?;
        let summary = self.run(request, &mut out)?;
        out.finish()?;
        debug!(hops = summary.hops, "completed");
        Ok(summary)
    }

    /// Run the trace, writing every extracted address to `out`.
    pub fn run<C: Write>(&self, request: &TraceRequest, out: &mut HopWriter<C>) -> Result<TraceSummary> {
        debug!(
            program = self.tool.program(),
            target = request.target(),
            mode = %request.mode(),
            encoding = self.decoder.name(),
            "launching"
        );
        match request.mode() {
            Mode::Progressive => self.run_progressive(request, out),
            Mode::Buffered => self.run_buffered(request, out),
        }
    }

    fn run_progressive<C: Write>(
        &self,
        request: &TraceRequest,
        out: &mut HopWriter<C>,
    ) -> Result<TraceSummary> {
        let mut child = self
            .tool
            .command(request.target())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;
        debug!(pid = child.id(), "streaming");

        // Drain stderr on the side so a chatty tool never stalls on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let streamed = match child.stdout.take() {
            Some(pipe) => self.stream_lines(BufReader::new(pipe), request.format(), out),
            None => Ok(0),
        };
        if streamed.is_err() {
            // stop the tool rather than wait out the rest of the trace
            let _ = child.kill();
        }

        debug!("draining");
        let status = child.wait();

        // Joining waits on every process holding the stderr pipe, grandchildren
        // included, so only join when the text is actually reported.
        let hops = streamed?;
        let status = status?;
        debug!(%status, hops, "reaped");

        if !status.success() {
            if request.is_strict() {
                let stderr = stderr
                    .and_then(|handle| handle.join().ok())
                    .unwrap_or_default();
                return Err(self.tool_failed(&stderr));
            }
            debug!(%status, "ignoring exit status of progressive trace");
        }

        Ok(TraceSummary { hops, status })
    }

    /// Read `reader` one line at a time until end of stream, emitting hops as they appear.
    fn stream_lines<R: BufRead, C: Write>(
        &self,
        mut reader: R,
        format: OutputFormat,
        out: &mut HopWriter<C>,
    ) -> Result<usize> {
        let mut buf = Vec::with_capacity(256);
        let mut hops = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = self.decoder.decode(&buf);
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            hops += emit(line, format, out)?;
        }
        Ok(hops)
    }

    fn run_buffered<C: Write>(
        &self,
        request: &TraceRequest,
        out: &mut HopWriter<C>,
    ) -> Result<TraceSummary> {
        debug!("waiting");
        let output = self
            .tool
            .command(request.target())
            .stdin(Stdio::null())
            .output()
            .map_err(|err| self.spawn_error(err))?;
        debug!(status = %output.status, bytes = output.stdout.len(), "draining");

        // A failed tool makes no promises about its output format; don't parse it.
        if !output.status.success() {
            return Err(self.tool_failed(&output.stderr));
        }

        let text = self.decoder.decode(&output.stdout);
        let hops = match request.format() {
            OutputFormat::Lines => {
                let mut hops = 0;
                for ip in Extractor::global().extract(&text) {
                    out.write_hop(ip)?;
                    hops += 1;
                }
                hops
            }
            OutputFormat::Tagged => {
                let mut hops = 0;
                for line in text.lines() {
                    hops += emit(line.trim_end(), OutputFormat::Tagged, out)?;
                }
                hops
            }
        };

        Ok(TraceSummary {
            hops,
            status: output.status,
        })
    }

    fn spawn_error(&self, err: io::Error) -> Error {
        let program = self.tool.program().to_string();
        if err.kind() == io::ErrorKind::NotFound {
            Error::ToolNotFound { program }
        } else {
            Error::Spawn {
                program,
                source: err,
            }
        }
    }

    fn tool_failed(&self, stderr: &[u8]) -> Error {
        Error::ToolFailed {
            stderr: self.decoder.decode(stderr).trim().to_string(),
        }
    }
}

/// Write the hops found in one chunk of tool output. Returns how many were found.
fn emit<C: Write>(text: &str, format: OutputFormat, out: &mut HopWriter<C>) -> Result<usize> {
    let extractor = Extractor::global();
    match format {
        OutputFormat::Lines => {
            let mut hops = 0;
            for ip in extractor.extract(text) {
                out.write_hop(ip)?;
                hops += 1;
            }
            Ok(hops)
        }
        OutputFormat::Tagged => {
            let tagged = Tagged::scan(text.as_bytes(), extractor);
            let hops = tagged.tags().len();
            if hops > 0 {
                out.write_tagged(&tagged)?;
            }
            Ok(hops)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracer() -> Tracer {
        Tracer::new(TraceTool::for_os(false))
    }

    #[test]
    fn empty_target_rejected() {
        assert!(matches!(TraceRequest::new(""), Err(Error::EmptyTarget)));
    }

    #[test]
    fn target_kept_verbatim() {
        assert_eq!(TraceRequest::new(" example.com").unwrap().target(), " example.com");
        assert_eq!(TraceRequest::new("   ").unwrap().target(), "   ");
    }

    #[test]
    fn request_defaults() {
        let request = TraceRequest::new("example.com").unwrap();
        assert_eq!(request.mode(), Mode::Buffered);
        assert_eq!(request.destination(), &Destination::Console);
        assert_eq!(request.format(), OutputFormat::Lines);
        assert!(!request.is_strict());
    }

    #[test]
    fn stream_lines_skips_blank_and_keeps_duplicates() {
        let input = "traceroute to x (10.9.9.9)\n\n   \n 1  10.0.0.1 (10.0.0.1)  0.3 ms\n 2  * * *\n";
        let mut out = HopWriter::open(Vec::new(), &Destination::Console).unwrap();
        let hops = tracer()
            .stream_lines(input.as_bytes(), OutputFormat::Lines, &mut out)
            .unwrap();
        assert_eq!(hops, 3);
        assert_eq!(out.finish().unwrap(), b"10.9.9.9\n10.0.0.1\n10.0.0.1\n");
    }

    #[test]
    fn stream_lines_handles_missing_final_newline() {
        let mut out = HopWriter::open(Vec::new(), &Destination::Console).unwrap();
        let hops = tracer()
            .stream_lines(&b" 1  192.0.2.1"[..], OutputFormat::Lines, &mut out)
            .unwrap();
        assert_eq!(hops, 1);
        assert_eq!(out.finish().unwrap(), b"192.0.2.1\n");
    }

    #[test]
    fn tagged_emit_skips_lines_without_hops() {
        let mut out = HopWriter::open(Vec::new(), &Destination::Console).unwrap();
        assert_eq!(emit(" 3  * * *", OutputFormat::Tagged, &mut out).unwrap(), 0);
        assert_eq!(emit(" 4  8.8.8.8", OutputFormat::Tagged, &mut out).unwrap(), 1);
        assert_eq!(out.written(), 1);
    }

    #[test]
    fn missing_program_maps_to_not_found() {
        let err = tracer().spawn_error(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::ToolNotFound { program } if program == "traceroute"));
    }
}
