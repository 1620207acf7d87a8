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

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Resolution and lookup misses are *not* errors: operations such as
/// [`crate::Module::lookup_token`] or [`crate::Module::resolve_type`] report absence as
/// `Ok(None)`. The variants below describe failures of the call itself.
///
/// # Error Categories
///
/// ## Decoding
/// - [`Error::Malformed`] - The image is corrupt or internally inconsistent
/// - [`Error::OutOfBounds`] - A row or cursor position outside of a table was requested
///
/// ## Usage
/// - [`Error::InvalidArgument`] - Rejected at the call boundary (empty names, wrong-owner contexts, ...)
/// - [`Error::InvalidOperation`] - The module is in a state that does not permit the call
/// - [`Error::NotSupported`] - A required collaborator was not configured
/// - [`Error::Disposed`] - The module was disposed and can no longer load lazily
///
/// ## Runtime
/// - [`Error::LockError`] - A lock was poisoned by a panicking thread
/// - [`Error::RecursionLimit`] - A base-type or forwarder chain exceeded the configured depth
///
/// # Examples
///
/// ```rust
/// use dotlink::{Error, Module, ModuleParameters};
///
/// match Module::create("", ModuleParameters::default()) {
///     Err(Error::InvalidArgument(message)) => println!("rejected: {message}"),
///     Err(other) => println!("unexpected: {other}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged and could not be decoded.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding a table.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The operation needs a capability that was not configured.
    ///
    /// Raised for example when a reference into a foreign assembly is resolved
    /// on a module without any assembly resolver.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// An argument was rejected at the call boundary.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// The module is not in a state that allows this operation.
    #[error("Invalid operation - {0}")]
    InvalidOperation(String),

    /// The module has been disposed; lazy loads are no longer possible.
    #[error("The module has been disposed")]
    Disposed,

    /// Failed to lock target.
    ///
    /// Another thread panicked while holding the lock, leaving the protected
    /// state unusable.
    #[error("Failed to lock target")]
    LockError,

    /// Recursion limit reached.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
