//! The traceips library: run the system route tracer and keep only the hop addresses.
//!
//! `traceips` launches `traceroute` (or `tracert` on Windows) for a target,
//! extracts every dotted-quad IPv4 address from its output, and writes one
//! address per line to the console and, optionally, to a file.
//!
//! # Examples
//!
//! Streaming hops to stdout as the tool reports them:
//!
//! ```rust,no_run
//! use traceips::{Mode, TraceRequest, TraceTool, Tracer};
//!
//! # fn main() -> traceips::Result<()> {
//! let request = TraceRequest::new("example.com")?.with_mode(Mode::Progressive);
//! let summary = Tracer::new(TraceTool::for_host()).execute(&request, std::io::stdout())?;
//! eprintln!("{} hops", summary.hops);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod platform;
pub mod prompt;
pub mod sink;
pub mod trace;

pub use crate::error::{Error, Result};
pub use crate::platform::{TextDecoder, TextEncoding, TraceTool};
pub use crate::sink::{Destination, HopWriter};
pub use crate::trace::{Mode, OutputFormat, TraceRequest, TraceSummary, Tracer};
pub use hop_extract::{extract_addresses, Extractor, Tag, Tagged};
