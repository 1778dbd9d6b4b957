//! Device memory owned by a session

use crate::{
    backend::{MemId, Owned},
    error::{BackendError, ClwiseError, ErrorStatus},
    scalar::Scalar,
    session::DeviceSession,
};
use std::marker::PhantomData;

/// How kernels may use a buffer, fixed at buffer creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    /// Can kernels read from buffer
    #[must_use]
    pub const fn can_read(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    /// Can kernels write into buffer
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AccessMode::ReadOnly => "read only",
            AccessMode::WriteOnly => "write only",
            AccessMode::ReadWrite => "read write",
        })
    }
}

/// Typed device allocation of `len` elements.
///
/// Buffer borrows its session, so it can not outlive it.
/// Empty buffers do not allocate device memory.
#[derive(Debug)]
pub struct DeviceBuffer<'s, T: Scalar> {
    session: &'s DeviceSession,
    mem: Option<Owned<MemId>>,
    len: usize,
    access: AccessMode,
    _dtype: PhantomData<T>,
}

impl<'s, T: Scalar> DeviceBuffer<'s, T> {
    /// Allocate buffer with the length of `source`.
    /// Readable buffers are initialized with `source`,
    /// write only buffers are left uninitialized.
    ///
    /// # Errors
    /// Returns device memory allocation failure.
    pub fn new(
        session: &'s DeviceSession,
        access: AccessMode,
        source: &[T],
    ) -> Result<Self, ClwiseError> {
        let host = access.can_read().then(|| T::slice_as_bytes(source));
        Self::allocate(session, access, source.len(), host)
    }

    /// Allocate buffer of `len` elements without initializing it
    ///
    /// # Errors
    /// Returns device memory allocation failure.
    pub fn uninit(
        session: &'s DeviceSession,
        access: AccessMode,
        len: usize,
    ) -> Result<Self, ClwiseError> {
        Self::allocate(session, access, len, None)
    }

    fn allocate(
        session: &'s DeviceSession,
        access: AccessMode,
        len: usize,
        host: Option<&[u8]>,
    ) -> Result<Self, ClwiseError> {
        let mem = if len == 0 {
            None
        } else {
            let bytes = len.checked_mul(T::dtype().byte_size()).ok_or_else(|| {
                BackendError::new(
                    ErrorStatus::MemoryAllocation,
                    format!("{len} elements of {} overflow", T::dtype()),
                )
            })?;
            let backend = session.backend();
            let mem = backend.allocate(session.context(), access, bytes, host)?;
            log::trace!("Allocated {bytes} B {access} buffer {mem:?}");
            Some(Owned::new(backend.clone(), mem))
        };
        Ok(DeviceBuffer { session, mem, len, access, _dtype: PhantomData })
    }

    /// Blocking copy of buffer contents into `dst`
    ///
    /// # Errors
    /// Returns [`ClwiseError::SizeMismatch`] if `dst` is not exactly `len` elements long,
    /// or transfer failure.
    pub fn read(&self, dst: &mut [T]) -> Result<(), ClwiseError> {
        if dst.len() != self.len {
            return Err(ClwiseError::SizeMismatch { expected: self.len, found: dst.len() });
        }
        let Some(mem) = &self.mem else {
            return Ok(());
        };
        self.session.backend().read(self.session.queue(), mem.id(), T::slice_as_bytes_mut(dst))?;
        Ok(())
    }

    /// Blocking copy of buffer contents into new vector
    ///
    /// # Errors
    /// Returns transfer failure.
    pub fn to_vec(&self) -> Result<Vec<T>, ClwiseError> {
        let mut data = vec![T::zero(); self.len];
        self.read(&mut data)?;
        Ok(data)
    }

    /// Number of elements
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn access(&self) -> AccessMode {
        self.access
    }

    /// Session owning this buffer
    #[must_use]
    pub const fn session(&self) -> &'s DeviceSession {
        self.session
    }

    pub(crate) fn mem(&self) -> Option<MemId> {
        self.mem.as_ref().map(Owned::id)
    }
}

#[test]
fn read_write_satisfies_both() {
    assert!(AccessMode::ReadWrite.can_read() && AccessMode::ReadWrite.can_write());
    assert!(AccessMode::ReadOnly.can_read() && !AccessMode::ReadOnly.can_write());
    assert!(!AccessMode::WriteOnly.can_read() && AccessMode::WriteOnly.can_write());
}
