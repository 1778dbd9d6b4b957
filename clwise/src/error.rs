use std::fmt::Display;

/// Enumeration representing the various errors that can occur within clwise.
#[derive(Debug)]
pub enum ClwiseError {
    /// No platforms were found or platform/device enumeration failed
    Discovery(Box<str>),
    /// Context or command queue could not be created
    ResourceAcquisition(BackendError),
    /// Buffer access mode does not permit requested use
    Permission(Box<str>),
    /// Operand lengths disagree
    ShapeMismatch(Box<str>),
    /// Device code failed to build, carries the build log
    Compilation {
        /// Name of the kernel entry point
        kernel: Box<str>,
        /// Build log reported by the platform
        log: Box<str>,
    },
    /// Kernel argument could not be bound
    ArgumentBinding {
        /// Position of the argument
        index: u32,
        /// Error returned by backend
        error: BackendError,
    },
    /// Host storage does not match buffer length
    SizeMismatch {
        /// Number of elements in the device buffer
        expected: usize,
        /// Number of elements in the host storage
        found: usize,
    },
    /// Buffer used with a session it does not belong to
    InvalidSession(Box<str>),
    /// Any other failure returned by backends
    Backend(BackendError),
}

impl ClwiseError {
    /// Permission error
    #[track_caller]
    pub fn permission_error(e: impl Into<String>) -> Self {
        Self::Permission(with_location(e.into()))
    }

    /// Shape error
    #[track_caller]
    pub fn shape_error(e: impl Into<String>) -> Self {
        Self::ShapeMismatch(with_location(e.into()))
    }

    /// Discovery error
    pub fn discovery_error(e: impl Into<String>) -> Self {
        Self::Discovery(e.into().into())
    }
}

#[track_caller]
fn with_location(mut e: String) -> Box<str> {
    use std::fmt::Write;
    let location = std::panic::Location::caller();
    let _ = write!(e, ", {}:{}:{}", location.file(), location.line(), location.column());
    e.into()
}

impl Display for ClwiseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClwiseError::Discovery(e) => f.write_fmt(format_args!("Discovery {e}")),
            ClwiseError::ResourceAcquisition(e) => {
                f.write_fmt(format_args!("Resource acquisition {e}"))
            }
            ClwiseError::Permission(e) => f.write_fmt(format_args!("Permission {e}")),
            ClwiseError::ShapeMismatch(e) => f.write_str(e),
            ClwiseError::Compilation { kernel, log } => {
                f.write_fmt(format_args!("Compilation of {kernel} failed:\n{log}"))
            }
            ClwiseError::ArgumentBinding { index, error } => {
                f.write_fmt(format_args!("Binding of kernel argument {index} failed, {error}"))
            }
            ClwiseError::SizeMismatch { expected, found } => f.write_fmt(format_args!(
                "Read target has {found} elements, buffer has {expected}"
            )),
            ClwiseError::InvalidSession(e) => f.write_fmt(format_args!("Invalid session {e}")),
            ClwiseError::Backend(e) => f.write_fmt(format_args!("Backend {e}")),
        }
    }
}

impl std::error::Error for ClwiseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClwiseError::ResourceAcquisition(e)
            | ClwiseError::ArgumentBinding { error: e, .. }
            | ClwiseError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

/// Error returned by a backend primitive
#[derive(Debug)]
pub struct BackendError {
    /// Class of the failing primitive
    pub status: ErrorStatus,
    /// Platform status code or diagnostic text
    pub context: Box<str>,
}

impl BackendError {
    pub(crate) fn new(status: ErrorStatus, context: impl Into<Box<str>>) -> Self {
        BackendError { status, context: context.into() }
    }
}

impl From<BackendError> for ClwiseError {
    fn from(value: BackendError) -> Self {
        ClwiseError::Backend(value)
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:?}: {}", self.status, self.context))
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// Dynamic library was not found on the disk
    DyLibNotFound,
    /// Backend initialization failure
    Initialization,
    /// Backend deinitialization failure
    Deinitialization,
    /// Failed to enumerate platforms or devices
    DeviceEnumeration,
    /// Failed to query platform or device for information
    DeviceQuery,
    /// Failed to create context
    ContextCreation,
    /// Failed to create command queue
    QueueCreation,
    /// Failed to allocate memory
    MemoryAllocation,
    /// Failed to copy memory to host
    MemoryCopyP2H,
    /// Kernel argument was not correct
    IncorrectKernelArg,
    /// Failed to compile kernel
    KernelCompilation,
    /// Failed to launch kernel
    KernelLaunch,
    /// Failed to synchronize queue
    KernelSync,
}

#[test]
fn shape_error_records_caller() {
    let e = ClwiseError::shape_error("all buffers must have the same length");
    let ClwiseError::ShapeMismatch(msg) = &e else { panic!() };
    assert!(msg.starts_with("all buffers must have the same length, "));
    assert!(msg.contains("error.rs"));
}
