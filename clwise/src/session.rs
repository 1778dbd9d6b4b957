//! Context and command queue bound to one device

use crate::{
    backend::{Backend, ContextId, DeviceId, Owned, PlatformId, QueueId},
    buffer::{AccessMode, DeviceBuffer},
    config::SessionConfig,
    directory::DeviceDescriptor,
    error::{BackendError, ClwiseError, ErrorStatus},
    kernel_cache::{BuildTarget, KernelCache, OperationKey},
    scalar::Scalar,
};
use std::{
    cell::{RefCell, RefMut},
    sync::Arc,
};

/// Lifecycle state of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No operation compiled yet
    Open,
    /// At least one compiled operation is cached
    Populated,
}

/// Owns a context and an in order command queue on one device,
/// together with operations compiled for it.
///
/// Dropping the session releases cached operations, then the queue,
/// then the context. Use [`DeviceSession::close`] to observe release errors.
#[derive(Debug)]
pub struct DeviceSession {
    // Fields are dropped in declaration order
    cache: RefCell<KernelCache>,
    queue: Owned<QueueId>,
    context: Owned<ContextId>,
    platform: PlatformId,
    device: DeviceId,
    config: SessionConfig,
}

impl DeviceSession {
    /// Create context and command queue for `device` of `platform`.
    ///
    /// # Errors
    /// Returns [`ClwiseError::ResourceAcquisition`] if device is not part of platform,
    /// or if context or queue creation fails. Nothing stays allocated on failure.
    pub fn open(
        backend: Arc<dyn Backend>,
        platform: PlatformId,
        device: DeviceId,
        config: SessionConfig,
    ) -> Result<DeviceSession, ClwiseError> {
        let devices = backend.devices(platform).map_err(ClwiseError::ResourceAcquisition)?;
        if !devices.contains(&device) {
            return Err(ClwiseError::ResourceAcquisition(BackendError::new(
                ErrorStatus::ContextCreation,
                format!("{device:?} does not belong to {platform:?}"),
            )));
        }
        let context = backend.create_context(device).map_err(ClwiseError::ResourceAcquisition)?;
        let context = Owned::new(backend.clone(), context);
        // On failure context is dropped and released here
        let queue = backend
            .create_queue(context.id(), device)
            .map_err(ClwiseError::ResourceAcquisition)?;
        let queue = Owned::new(backend, queue);
        log::info!("Opened session on {device:?} of {platform:?}");
        Ok(DeviceSession {
            cache: RefCell::new(KernelCache::new()),
            queue,
            context,
            platform,
            device,
            config,
        })
    }

    /// Open session on a discovered device
    ///
    /// # Errors
    /// Same as [`DeviceSession::open`].
    pub fn on_device(
        backend: Arc<dyn Backend>,
        device: &DeviceDescriptor,
        config: SessionConfig,
    ) -> Result<DeviceSession, ClwiseError> {
        log::info!("Using {} [{}]", device.name, device.class);
        DeviceSession::open(backend, device.platform, device.id, config)
    }

    /// Release cached operations, queue and context, in that order.
    /// Everything is released even if some release fails.
    ///
    /// # Errors
    /// Returns first release failure.
    pub fn close(self) -> Result<(), ClwiseError> {
        let DeviceSession { cache, queue, context, device, .. } = self;
        let results = [cache.into_inner().release(), queue.release(), context.release()];
        log::info!("Closed session on {device:?}");
        results.into_iter().collect::<Result<(), BackendError>>()?;
        Ok(())
    }

    /// Block until all enqueued work is finished
    ///
    /// # Errors
    /// Returns synchronization failure.
    pub fn finish(&self) -> Result<(), ClwiseError> {
        self.backend().finish(self.queue())?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.cache.borrow().is_empty() {
            SessionState::Open
        } else {
            SessionState::Populated
        }
    }

    /// Keys of all cached operations, in key order
    #[must_use]
    pub fn cached_operations(&self) -> Vec<OperationKey> {
        self.cache.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn is_cached(&self, key: &OperationKey) -> bool {
        self.cache.borrow().contains(key)
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn platform(&self) -> PlatformId {
        self.platform
    }

    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    /// Upload `data` into new buffer, see [`DeviceBuffer::new`]
    ///
    /// # Errors
    /// Returns device memory allocation failure.
    pub fn buffer<T: Scalar>(
        &self,
        access: AccessMode,
        data: &[T],
    ) -> Result<DeviceBuffer<'_, T>, ClwiseError> {
        DeviceBuffer::new(self, access, data)
    }

    /// New uninitialized buffer, see [`DeviceBuffer::uninit`]
    ///
    /// # Errors
    /// Returns device memory allocation failure.
    pub fn uninit_buffer<T: Scalar>(
        &self,
        access: AccessMode,
        len: usize,
    ) -> Result<DeviceBuffer<'_, T>, ClwiseError> {
        DeviceBuffer::uninit(self, access, len)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        self.context.backend()
    }

    pub(crate) fn context(&self) -> ContextId {
        self.context.id()
    }

    pub(crate) fn queue(&self) -> QueueId {
        self.queue.id()
    }

    pub(crate) fn build_target(&self) -> BuildTarget<'_> {
        BuildTarget {
            backend: self.backend(),
            context: self.context(),
            device: self.device,
            options: &self.config.build_options,
        }
    }

    pub(crate) fn cache(&self) -> RefMut<'_, KernelCache> {
        self.cache.borrow_mut()
    }
}
