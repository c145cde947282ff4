use camino::Utf8PathBuf;

/// Error types for the traceips library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The trace executable is not installed or not on the search path.
    #[error("the traceroute/tracert command is not available on your system ({program})")]
    ToolNotFound { program: String },

    /// The output file cannot be opened for writing.
    #[error("permission denied while accessing the file '{path}'")]
    PermissionDenied { path: Utf8PathBuf },

    /// The output file could not be opened for another reason.
    #[error("failed to open output file '{path}'")]
    OpenOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The trace executable exited with a non-zero status.
    #[error("traceroute command failed: {stderr}")]
    ToolFailed { stderr: String },

    /// The trace executable could not be started.
    #[error("failed to launch {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// No target host was given.
    #[error("target cannot be empty")]
    EmptyTarget,

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
