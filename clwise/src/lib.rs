//! Elementwise binary operations on `OpenCL` devices.
//!
//! clwise manages device resources of one host thread: it discovers platforms and devices,
//! opens sessions owning a context and command queue, allocates typed device buffers
//! and dispatches `add`, `sub`, `mul` and `div` over any supported element type.
//! Programs are generated from one template and compiled once per operation
//! and element type for each session.
//!
//! Every resource is released exactly once when its owner is dropped.
//! Buffers borrow their session, so they can not outlive it.
//!
//! ```rust
//! use clwise::{
//!     list_platforms, AccessMode, DeviceSession, DummyBackend, DummyConfig, SessionConfig,
//! };
//! use std::sync::Arc;
//!
//! let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
//! let platforms = list_platforms(&*backend)?;
//! let device = &platforms[0].devices[0];
//! let session = DeviceSession::on_device(backend, device, SessionConfig::default())?;
//! let a = session.buffer(AccessMode::ReadOnly, &[1i32, 2, 3])?;
//! let b = session.buffer(AccessMode::ReadOnly, &[4i32, 5, 6])?;
//! let c = session.uninit_buffer::<i32>(AccessMode::WriteOnly, 3)?;
//! session.add(&a, &b, &c)?;
//! assert_eq!(c.to_vec()?, [5, 7, 9]);
//! # Ok::<(), clwise::ClwiseError>(())
//! ```
//!
//! Backend and session options are read with [`Config::load`] from `clwise/config.json`
//! in the XDG config directories and from `CLWISE_*` environment variables.

#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::redundant_explicit_links)]

mod backend;
mod buffer;
mod config;
mod directory;
mod dispatch;
mod dtype;
mod error;
mod generator;
mod kernel_cache;
mod scalar;
mod session;

pub use backend::{
    initialize_backend, Backend, BackendKind, ContextId, DeviceId, DeviceInfo, DummyBackend,
    DummyConfig, DummyDevice, DummyPlatform, Fault, KernelArg, KernelId, LiveResources, MemId,
    OpenCLBackend, OpenCLConfig, PlatformId, PlatformInfo, ProgramId, QueueId,
};
pub use buffer::{AccessMode, DeviceBuffer};
pub use config::{Config, SessionConfig};
pub use directory::{find_device, list_platforms, DeviceClass, DeviceDescriptor, PlatformDescriptor};
pub use dispatch::BinaryOp;
pub use dtype::DType;
pub use error::{BackendError, ClwiseError, ErrorStatus};
pub use generator::generate;
pub use kernel_cache::OperationKey;
pub use scalar::Scalar;
pub use session::{DeviceSession, SessionState};
