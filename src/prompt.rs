//! Question-and-answer flow for building a [`TraceRequest`] when no target is
//! given on the command line.

use camino::Utf8PathBuf;
use std::io::{BufRead, Write};

use crate::error::Result;
use crate::sink::Destination;
use crate::trace::{Mode, TraceRequest};

/// Ask for the target, mode and output file.
///
/// An empty target is asked for again. End of input at any question returns
/// `Ok(None)`, which callers treat as a cancellation.
pub fn prompt_request<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<Option<TraceRequest>> {
    writeln!(output, "Welcome to the Traceroute Tool!")?;

    let target = loop {
        let Some(answer) = ask(input, output, "Enter the target URL or IP address: ")? else {
            return Ok(None);
        };
        if !answer.is_empty() {
            break answer;
        }
        writeln!(output, "Target cannot be empty.")?;
    };

    let Some(progressive) = ask(input, output, "Enable progressive mode? (yes/no) [no]: ")? else {
        return Ok(None);
    };
    let mode = if progressive.eq_ignore_ascii_case("yes") {
        Mode::Progressive
    } else {
        Mode::Buffered
    };

    let Some(file) = ask(
        input,
        output,
        "Enter the output file name (or leave empty for no file): ",
    )?
    else {
        return Ok(None);
    };
    let destination = if file.is_empty() {
        Destination::Console
    } else {
        Destination::from_path(Utf8PathBuf::from(file))
    };

    writeln!(output, "\nStarting traceroute...")?;
    output.flush()?;

    let request = TraceRequest::new(target)?
        .with_mode(mode)
        .with_destination(destination);
    Ok(Some(request))
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<Option<String>> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(None);
    }
    Ok(Some(answer.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(answers: &str) -> (Option<TraceRequest>, String) {
        let mut input = answers.as_bytes();
        let mut output = Vec::new();
        let request = prompt_request(&mut input, &mut output).unwrap();
        (request, String::from_utf8(output).unwrap())
    }

    #[test]
    fn reprompts_until_target_given() {
        let (request, transcript) = run("\n   \nexample.com\nno\n\n");
        let request = request.unwrap();
        assert_eq!(request.target(), "example.com");
        assert_eq!(request.mode(), Mode::Buffered);
        assert_eq!(request.destination(), &Destination::Console);
        assert_eq!(transcript.matches("Target cannot be empty.").count(), 2);
        assert!(transcript.starts_with("Welcome to the Traceroute Tool!\n"));
        assert!(transcript.ends_with("\nStarting traceroute...\n"));
    }

    #[test]
    fn only_yes_enables_progressive() {
        let (request, _) = run("host\nYES\nhops.txt\n");
        let request = request.unwrap();
        assert_eq!(request.mode(), Mode::Progressive);
        assert_eq!(
            request.destination(),
            &Destination::File(Utf8PathBuf::from("hops.txt"))
        );

        let (request, _) = run("host\ny\n\n");
        assert_eq!(request.unwrap().mode(), Mode::Buffered);
    }

    #[test]
    fn end_of_input_cancels() {
        assert!(run("").0.is_none());
        assert!(run("\n\n").0.is_none());
        assert!(run("host\nyes\n").0.is_none());
    }
}
