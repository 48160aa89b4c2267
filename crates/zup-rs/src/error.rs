use std::{collections::TryReserveError, fmt, io, path::PathBuf};

use thiserror::Error;

/// Exit code reserved for failures of the dispatcher itself.
pub const FAILURE_EXIT_CODE: i32 = 255;

/// Error type for every failure the dispatcher can hit before or while running zig.
#[derive(Debug, Error)]
pub enum ZupError {
    #[error("cannot open {}: {source}", .path.display())]
    SelectionUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    SelectionRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("you need to select a zig version ({} contains no version)", .path.display())]
    NoVersionSelected { path: PathBuf },
    #[error("could not determine the zupgrade install root, set ZUPGRADE_PATH")]
    InstallRootUnknown,
    #[error("memory allocation failed while composing {what}")]
    ResourceExhausted {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },
    #[error("failed to launch {command_line}: {source}")]
    Launch {
        command_line: String,
        #[source]
        source: io::Error,
    },
    #[error("could not retrieve the exit status of {command_line}: {reason}")]
    StatusUnavailable {
        command_line: String,
        reason: String,
    },
}

/// Coarse classification of [`ZupError`] variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceExhaustion,
    Launch,
    StatusQuery,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::ResourceExhaustion => "resource exhaustion",
            ErrorKind::Launch => "launch",
            ErrorKind::StatusQuery => "status query",
        };
        f.write_str(name)
    }
}

impl ZupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZupError::SelectionUnreadable { .. }
            | ZupError::SelectionRead { .. }
            | ZupError::NoVersionSelected { .. }
            | ZupError::InstallRootUnknown => ErrorKind::Configuration,
            ZupError::ResourceExhausted { .. } => ErrorKind::ResourceExhaustion,
            ZupError::Launch { .. } => ErrorKind::Launch,
            ZupError::StatusUnavailable { .. } => ErrorKind::StatusQuery,
        }
    }

    /// Every error is terminal and reported with the same exit code.
    pub fn exit_code(&self) -> i32 {
        FAILURE_EXIT_CODE
    }
}
