use clwise::{
    list_platforms, AccessMode, ClwiseError, DeviceBuffer, DeviceSession, DummyBackend, DummyConfig,
    ErrorStatus, Fault, SessionConfig,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::sync::Arc;

fn open(backend: &Arc<DummyBackend>) -> Result<DeviceSession, ClwiseError> {
    let platforms = list_platforms(&**backend)?;
    DeviceSession::on_device(backend.clone(), &platforms[0].devices[0], SessionConfig::default())
}

#[test]
fn upload_read_back() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let mut rng = SmallRng::seed_from_u64(69420);
    let data: Vec<f64> = (0..1000).map(|_| rng.gen_range(-1e6..1e6)).collect();
    let buffer = DeviceBuffer::new(&session, AccessMode::ReadOnly, &data)?;
    assert_eq!(buffer.len(), 1000);
    assert_eq!(buffer.access(), AccessMode::ReadOnly);
    assert_eq!(buffer.to_vec()?, data);
    let data: Vec<u16> = (0..77).map(|_| rng.gen()).collect();
    let buffer = session.buffer(AccessMode::ReadWrite, &data)?;
    let mut back = vec![0u16; 77];
    buffer.read(&mut back)?;
    assert_eq!(back, data);
    Ok(())
}

#[test]
fn read_with_wrong_length() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let buffer = session.buffer(AccessMode::ReadOnly, &[1i64, 2, 3])?;
    let mut dst = [0i64; 2];
    assert!(matches!(
        buffer.read(&mut dst),
        Err(ClwiseError::SizeMismatch { expected: 3, found: 2 })
    ));
    assert_eq!(dst, [0, 0]);
    Ok(())
}

#[test]
fn write_only_is_not_uploaded() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let buffer = session.buffer(AccessMode::WriteOnly, &[5u8, 6, 7])?;
    assert_eq!(buffer.len(), 3);
    assert_ne!(buffer.to_vec()?, [5, 6, 7]);
    Ok(())
}

#[test]
fn empty_buffer_does_not_allocate() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let buffer = session.buffer::<i32>(AccessMode::ReadOnly, &[])?;
    assert!(buffer.is_empty());
    assert_eq!(backend.live().buffers, 0);
    assert_eq!(buffer.to_vec()?, Vec::<i32>::new());
    Ok(())
}

#[test]
fn drop_releases_allocation() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1u32; 16])?;
    let b = session.uninit_buffer::<u32>(AccessMode::WriteOnly, 16)?;
    assert_eq!(backend.live().buffers, 2);
    drop(a);
    assert_eq!(backend.live().buffers, 1);
    let moved = b;
    assert!(std::ptr::eq(moved.session(), &session));
    drop(moved);
    assert_eq!(backend.live().buffers, 0);
    Ok(())
}

#[test]
fn allocation_failure() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    backend.set_fault(Some(Fault::Allocate));
    let err = session.buffer(AccessMode::ReadOnly, &[1f32]).unwrap_err();
    let err = match err {
        ClwiseError::Backend(err) => err,
        err => panic!("{err}"),
    };
    assert_eq!(err.status, ErrorStatus::MemoryAllocation);
    assert_eq!(backend.live().buffers, 0);
    Ok(())
}

#[test]
fn read_failure() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let buffer = session.buffer(AccessMode::ReadOnly, &[1f32, 2.])?;
    backend.set_fault(Some(Fault::Read));
    assert!(matches!(buffer.to_vec(), Err(ClwiseError::Backend(_))));
    Ok(())
}
