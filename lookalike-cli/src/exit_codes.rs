//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts a way to tell failure modes apart. Finding no
//! match is not a failure and exits with [`SUCCESS`].

use lookalike_core::LookalikeError;

/// Successful execution, with or without a match.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Input image could not be decoded.
/// Maps to EX_DATAERR from sysexits.h.
pub const IMAGE_ERROR: i32 = 65;

/// Cannot open input file or folder.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error while reading or writing.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        Self {
            code: classify(err, &message),
            message: Some(message),
        }
    }
}

fn classify(err: &anyhow::Error, message: &str) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<LookalikeError>() {
            match e {
                LookalikeError::InvalidImage(_) => return IMAGE_ERROR,
                LookalikeError::Io(io) => return io_code(io),
                _ => {}
            }
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return io_code(io);
        }
    }

    if message.contains("not found") {
        INPUT_ERROR
    } else {
        GENERAL_ERROR
    }
}

fn io_code(err: &std::io::Error) -> i32 {
    match err.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => INPUT_ERROR,
        _ => IO_ERROR,
    }
}
