use anyhow::{Error, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use traceips::{prompt, Destination, Mode, OutputFormat, TraceRequest, TraceTool, Tracer};

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    for cause in err.chain() {
        let io_err = match cause.downcast_ref::<traceips::Error>() {
            Some(traceips::Error::Io(io_err)) => Some(io_err),
            _ => cause.downcast_ref::<io::Error>(),
        };
        if io_err.is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe) {
            return true;
        }
    }
    false
}

/// Trace the route to a target and display intermediate IP addresses.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Display IPs progressively, as the trace tool reports each hop
    #[clap(short, long)]
    progressive: bool,

    /// File to save the traceroute result to, in addition to stdout
    #[clap(short, long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    output_file: Option<Utf8PathBuf>,

    /// Run the program in interactive mode
    #[clap(short, long)]
    interactive: bool,

    /// In progressive mode, fail when the trace tool exits with an error
    #[clap(long)]
    strict: bool,

    /// Output each tool line containing hops as JSON with tag information
    #[clap(long)]
    tag: bool,

    /// Trace executable to run instead of traceroute/tracert
    #[clap(
        long,
        value_name = "PATH",
        value_hint = clap::ValueHint::CommandName,
        env = "TRACEIPS_TOOL"
    )]
    tool: Option<String>,

    /// Log each step of the trace to stderr
    #[clap(short, long)]
    verbose: bool,

    /// The target URL or IP address. Prompted for when omitted
    #[clap(value_name = "TARGET")]
    target: Option<String>,
}

fn main() -> ExitCode {
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    // Handle broken pipe errors gracefully
    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    tracing::debug!(error = ?err, "trace failed");
    if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        let _ = writeln!(&mut io::stderr(), "Error: {:?}", err);
    } else {
        let _ = writeln!(&mut io::stderr(), "Error: {:#}", err);
    }

    ExitCode::FAILURE
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut tool = TraceTool::for_host();
    if let Some(program) = args.tool.as_deref() {
        tool = tool.with_program(program);
    }

    let request = match args.target.as_deref() {
        Some(target) if !args.interactive => {
            let mode = if args.progressive {
                Mode::Progressive
            } else {
                Mode::Buffered
            };
            let destination = args
                .output_file
                .clone()
                .map(Destination::from_path)
                .unwrap_or_default();
            TraceRequest::new(target)?
                .with_mode(mode)
                .with_destination(destination)
        }
        _ => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            match prompt::prompt_request(&mut input, &mut io::stdout())? {
                Some(request) => request,
                None => {
                    let _ = writeln!(&mut io::stderr(), "\nOperation cancelled by user.");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    };

    let format = if args.tag {
        OutputFormat::Tagged
    } else {
        OutputFormat::Lines
    };
    let request = request.with_format(format).with_strict(args.strict);

    tracing::info!(
        target = request.target(),
        mode = %request.mode(),
        destination = %request.destination(),
        "starting trace"
    );
    Tracer::new(tool).execute(&request, io::stdout())?;

    Ok(ExitCode::SUCCESS)
}
