//! Backend agnostic API to compute platforms.
//! Backends expose only the primitive capabilities sessions need:
//! enumeration, context and queue creation, buffers, program builds,
//! kernel arguments, launches and blocking reads.
//! Every handle a backend returns is owned by exactly one `Owned` wrapper.

use crate::{
    buffer::AccessMode,
    error::{BackendError, ClwiseError},
};
use std::{fmt::Debug, sync::Arc};

pub use dummy::{DummyBackend, DummyConfig, DummyDevice, DummyPlatform, Fault, LiveResources};
pub use opencl::{OpenCLBackend, OpenCLConfig};

mod dummy;
mod opencl;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                $name(value)
            }
        }

        impl From<$name> for usize {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    )*};
}

handle!(
    /// Platform handle, not owned
    PlatformId,
    /// Device handle, not owned
    DeviceId,
    /// Context handle
    ContextId,
    /// Command queue handle
    QueueId,
    /// Device memory handle
    MemId,
    /// Compiled program handle
    ProgramId,
    /// Kernel entry point handle
    KernelId,
);

/// Descriptive attributes of a platform
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub profile: String,
}

/// Descriptive attributes of a device
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    /// Raw device type bitmask
    pub device_type: u64,
    pub compute_units: u32,
    /// Global memory size in bytes
    pub global_mem_size: u64,
}

/// Positional kernel argument
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    /// Device buffer
    Mem(MemId),
    /// Scalar passed by value, as native endian bytes
    Scalar(&'a [u8]),
}

/// Primitive capabilities of a compute platform.
///
/// Create functions return handles that must be released exactly once
/// with the matching release function.
pub trait Backend: Send + Sync + Debug {
    /// Enumerate platforms, no platforms is an empty list
    fn platforms(&self) -> Result<Vec<PlatformId>, BackendError>;

    fn platform_info(&self, platform: PlatformId) -> Result<PlatformInfo, BackendError>;

    /// Enumerate devices of platform, no devices is an empty list
    fn devices(&self, platform: PlatformId) -> Result<Vec<DeviceId>, BackendError>;

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, BackendError>;

    /// Create context bound to exactly one device
    fn create_context(&self, device: DeviceId) -> Result<ContextId, BackendError>;

    fn release_context(&self, context: ContextId) -> Result<(), BackendError>;

    /// Create in order command queue with default properties
    fn create_queue(&self, context: ContextId, device: DeviceId) -> Result<QueueId, BackendError>;

    fn release_queue(&self, queue: QueueId) -> Result<(), BackendError>;

    /// Allocate device memory, copying `host` into it if given.
    /// `host` must be exactly `bytes` long.
    fn allocate(
        &self,
        context: ContextId,
        access: AccessMode,
        bytes: usize,
        host: Option<&[u8]>,
    ) -> Result<MemId, BackendError>;

    fn release_mem(&self, mem: MemId) -> Result<(), BackendError>;

    /// Compile program for device. On failure the returned error carries
    /// the build log and no program is left alive.
    fn build_program(
        &self,
        context: ContextId,
        device: DeviceId,
        source: &str,
        options: &str,
    ) -> Result<ProgramId, BackendError>;

    fn release_program(&self, program: ProgramId) -> Result<(), BackendError>;

    fn create_kernel(&self, program: ProgramId, name: &str) -> Result<KernelId, BackendError>;

    fn release_kernel(&self, kernel: KernelId) -> Result<(), BackendError>;

    fn set_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Result<(), BackendError>;

    /// Enqueue one dimensional launch, work group size is left to the device
    fn enqueue(
        &self,
        queue: QueueId,
        kernel: KernelId,
        global_work_size: usize,
    ) -> Result<(), BackendError>;

    /// Blocking read of whole buffer into `dst`
    fn read(&self, queue: QueueId, mem: MemId, dst: &mut [u8]) -> Result<(), BackendError>;

    /// Block until all work enqueued on queue is finished
    fn finish(&self, queue: QueueId) -> Result<(), BackendError>;
}

/// Handles that can be released through a backend
pub(crate) trait Release: Copy + Debug {
    fn release(self, backend: &dyn Backend) -> Result<(), BackendError>;
}

impl Release for ContextId {
    fn release(self, backend: &dyn Backend) -> Result<(), BackendError> {
        backend.release_context(self)
    }
}

impl Release for QueueId {
    fn release(self, backend: &dyn Backend) -> Result<(), BackendError> {
        backend.release_queue(self)
    }
}

impl Release for MemId {
    fn release(self, backend: &dyn Backend) -> Result<(), BackendError> {
        backend.release_mem(self)
    }
}

impl Release for ProgramId {
    fn release(self, backend: &dyn Backend) -> Result<(), BackendError> {
        backend.release_program(self)
    }
}

impl Release for KernelId {
    fn release(self, backend: &dyn Backend) -> Result<(), BackendError> {
        backend.release_kernel(self)
    }
}

/// Sole owner of one backend handle, releases it on drop.
#[derive(Debug)]
pub(crate) struct Owned<H: Release> {
    backend: Arc<dyn Backend>,
    handle: H,
    released: bool,
}

impl<H: Release> Owned<H> {
    pub(crate) fn new(backend: Arc<dyn Backend>, handle: H) -> Self {
        Owned { backend, handle, released: false }
    }

    pub(crate) fn id(&self) -> H {
        self.handle
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Release now, reporting failure instead of logging it
    pub(crate) fn release(mut self) -> Result<(), BackendError> {
        self.released = true;
        self.handle.release(&*self.backend)
    }
}

impl<H: Release> Drop for Owned<H> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.handle.release(&*self.backend) {
            log::warn!("Failed to release {:?}, {err}", self.handle);
        }
    }
}

/// Which backend the configuration selects
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    OpenCL,
    Dummy,
}

/// Initialize backend selected by config
pub fn initialize_backend(config: &crate::Config) -> Result<Arc<dyn Backend>, ClwiseError> {
    match config.backend {
        BackendKind::OpenCL => {
            let backend = OpenCLBackend::load(&config.opencl).map_err(|err| {
                ClwiseError::discovery_error(format!("OpenCL runtime failed to load, {err}"))
            })?;
            Ok(Arc::new(backend))
        }
        BackendKind::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(DummyBackend::new(DummyConfig::default())))
        }
    }
}
