//! Per-platform selection of the trace executable and its output encoding.
//!
//! `tracert` on Windows prints in the ANSI code page of the current locale,
//! while `traceroute` elsewhere prints UTF-8. The choice is made once, up
//! front, by [`TraceTool::for_host`].

use std::borrow::Cow;
use std::process::Command;

use encoding_rs::{Encoding, UTF_8};

/// How the trace tool's output bytes should be decoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    /// Fixed UTF-8.
    Utf8,
    /// The locale's preferred encoding (the ANSI code page on Windows).
    LocalePreferred,
}

impl TextEncoding {
    /// Resolve to a concrete decoder for this process.
    pub fn decoder(self) -> TextDecoder {
        let encoding = match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::LocalePreferred => locale_encoding(),
        };
        TextDecoder { encoding }
    }
}

#[cfg(windows)]
fn locale_encoding() -> &'static Encoding {
    // SAFETY: GetACP has no arguments and only reads process locale state.
    let code_page = unsafe { windows_sys::Win32::Globalization::GetACP() };
    match u16::try_from(code_page).ok().and_then(codepage::to_encoding) {
        Some(encoding) => encoding,
        None => {
            tracing::warn!(code_page, "unsupported ANSI code page, decoding as UTF-8");
            UTF_8
        }
    }
}

#[cfg(not(windows))]
fn locale_encoding() -> &'static Encoding {
    UTF_8
}

/// Decodes raw tool output with a resolved encoding.
///
/// Malformed sequences are replaced rather than rejected; a stray byte in a
/// hostname should not abort the trace.
#[derive(Copy, Clone, Debug)]
pub struct TextDecoder {
    encoding: &'static Encoding,
}

impl TextDecoder {
    #[inline]
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _) = self.encoding.decode_without_bom_handling(bytes);
        text
    }

    /// The WHATWG name of the encoding in use.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

/// The trace executable to run and how to read what it prints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceTool {
    program: String,
    encoding: TextEncoding,
}

impl TraceTool {
    /// Select the tool for an OS family.
    pub fn for_os(is_windows: bool) -> TraceTool {
        if is_windows {
            TraceTool {
                program: "tracert".to_string(),
                encoding: TextEncoding::LocalePreferred,
            }
        } else {
            TraceTool {
                program: "traceroute".to_string(),
                encoding: TextEncoding::Utf8,
            }
        }
    }

    /// Select the tool for the OS this process is running on.
    pub fn for_host() -> TraceTool {
        TraceTool::for_os(std::env::consts::FAMILY == "windows")
    }

    /// Run a different executable, keeping the platform's encoding.
    #[must_use]
    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Build the command line `<program> <target>`.
    pub fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(target);
        cmd
    }
}
