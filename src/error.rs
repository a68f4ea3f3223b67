use thiserror::Error;

use crate::metadata::token::Token;

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

/// The generic Error type, which covers every error this library can return.
///
/// The traversal itself is forgiving: a call that cannot be resolved simply ends
/// that branch of the call graph and never shows up here. What remains are the
/// conditions that make a run meaningless, like a missing root type, and the
/// failures of reading a debug-symbol companion file.
///
/// # Error Categories
///
/// ## Lookup Errors
/// - [`Error::TypeNotFound`] - The requested root type does not exist in the module
/// - [`Error::MethodNotFound`] - The root type exists but declares no such method
/// - [`Error::TokenNotFound`] - A token handed to the model refers to nothing
/// - [`Error::DuplicateToken`] - Two definitions were registered under one token
///
/// ## Symbol File Errors
/// - [`Error::Malformed`] - Corrupted or invalid Portable PDB structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - The file is not a Portable PDB
/// - [`Error::Empty`] - An empty file was provided
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust
/// use allocscope::{Error, ModuleBuilder, ScanConfig, Worklist};
///
/// let module = ModuleBuilder::new("Empty").build();
/// match Worklist::new(&module, ScanConfig::default()).run("Program", "Main") {
///     Err(Error::TypeNotFound(name)) => assert_eq!(name, "Program"),
///     other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The root type could not be found in the loaded module.
    ///
    /// A name containing a `.` is looked up by its full name, otherwise by its
    /// simple name. Raised before any method is scanned.
    #[error("Could not find the type `{0}`")]
    TypeNotFound(String),

    /// The root type does not declare a method with the requested name.
    #[error("Could not find method `{method}` in type `{type_name}`")]
    MethodNotFound {
        /// The method name that was requested
        method: String,
        /// Full name of the type that was searched
        type_name: String,
    },

    /// A token does not refer to any definition of the module.
    ///
    /// Raised by the module builder when a method is attached to an unknown
    /// declaring type, or a body is set on an unknown method.
    #[error("Token {0} does not refer to a known definition")]
    TokenNotFound(Token),

    /// A definition was registered twice under the same token.
    #[error("Token {0} is already defined")]
    DuplicateToken(Token),

    /// The file is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type is not supported.
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
}
