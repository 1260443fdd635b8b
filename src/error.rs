use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering everything the container parser, the metadata reader and
/// the probing collaborators can report.
///
/// A [`crate::probe::ModuleProber`] never hands these out directly: it classifies them into a
/// [`crate::probe::ErrorLevel`] at the probe boundary (see
/// [`crate::probe::ErrorLevel::from`]).
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - Not a managed module, or a feature that is not handled
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// ## Probe Errors
/// - [`Error::InvalidArgument`] - Missing, blank or unparsable input
/// - [`Error::NotFound`] - No candidate module exists for an identity
/// - [`Error::VersionMismatch`] - A module with the right name but different identity exists
/// - [`Error::Isolation`] - The isolation context could not run the probe
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error carries the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type is not supported.
    ///
    /// Raised for valid PE images without a CLR runtime header (native binaries), and for
    /// managed modules without an assembly manifest.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// The probe input was missing, blank, or not a valid path or assembly identity.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// No module could be located for the requested identity.
    #[error("Could not locate '{0}'")]
    NotFound(String),

    /// A module with the requested simple name exists, but its identity does not match the
    /// requested one.
    #[error("Found '{found}' while looking for '{requested}'")]
    VersionMismatch {
        /// The identity that was asked for
        requested: String,
        /// The identity of the closest candidate
        found: String,
    },

    /// The isolation context failed to set up, run or tear down a probe.
    #[error("Isolation failure - {0}")]
    Isolation(String),
}

impl Error {
    /// Returns true if this error means "nothing was there" rather than "something was
    /// there but could not be read".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::FileError(error) => error.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns true if the input itself was malformed, e.g. a path containing a NUL byte.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            Error::InvalidArgument(_) => true,
            Error::FileError(error) => error.kind() == std::io::ErrorKind::InvalidInput,
            _ => false,
        }
    }
}
