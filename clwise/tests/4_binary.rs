use clwise::{
    list_platforms, AccessMode, BinaryOp, ClwiseError, DeviceSession, DummyBackend, DummyConfig,
    ErrorStatus, Fault, Scalar, SessionConfig,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::sync::Arc;

fn open(backend: &Arc<DummyBackend>) -> Result<DeviceSession, ClwiseError> {
    let platforms = list_platforms(&**backend)?;
    DeviceSession::on_device(backend.clone(), &platforms[0].devices[0], SessionConfig::default())
}

#[test]
fn add_int32() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1i32, 2, 3])?;
    let b = session.buffer(AccessMode::ReadOnly, &[4i32, 5, 6])?;
    let c = session.uninit_buffer::<i32>(AccessMode::WriteOnly, 3)?;
    session.add(&a, &b, &c)?;
    assert_eq!(c.to_vec()?, [5, 7, 9]);
    Ok(())
}

#[test]
fn add_hundred() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let x: Vec<i32> = (1..=100).collect();
    let y: Vec<i32> = (1..=100).rev().collect();
    let a = session.buffer(AccessMode::ReadOnly, &x)?;
    let b = session.buffer(AccessMode::ReadOnly, &y)?;
    let c = session.uninit_buffer::<i32>(AccessMode::WriteOnly, 100)?;
    session.add(&a, &b, &c)?;
    assert_eq!(c.to_vec()?, [101; 100]);

    let x: Vec<f32> = x.into_iter().map(|i| i as f32).collect();
    let y: Vec<f32> = y.into_iter().map(|i| i as f32).collect();
    let a = session.buffer(AccessMode::ReadOnly, &x)?;
    let b = session.buffer(AccessMode::ReadOnly, &y)?;
    let c = session.uninit_buffer::<f32>(AccessMode::WriteOnly, 100)?;
    session.add(&a, &b, &c)?;
    assert!(c.to_vec()?.into_iter().all(|v| v == 101.));
    Ok(())
}

fn check<T: Scalar>(session: &DeviceSession, x: &[T], y: &[T]) -> Result<(), ClwiseError> {
    let a = session.buffer(AccessMode::ReadOnly, x)?;
    let b = session.buffer(AccessMode::ReadOnly, y)?;
    let c = session.uninit_buffer::<T>(AccessMode::WriteOnly, x.len())?;
    for op in BinaryOp::ALL {
        session.binary(op, &a, &b, &c)?;
        let expected: Vec<T> = x.iter().zip(y).map(|(&x, &y)| x.binary(op, y)).collect();
        assert_eq!(c.to_vec()?, expected, "{op:?} {}", T::dtype());
    }
    Ok(())
}

macro_rules! ints {
    ($session:expr, $rng:expr, $($t:ty),*) => {$(
        let x: Vec<$t> = (0..64).map(|_| $rng.gen()).collect();
        let y: Vec<$t> = (0..64).map(|_| $rng.gen()).collect();
        check::<$t>(&$session, &x, &y)?;
    )*};
}

#[test]
fn all_types_all_ops() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let mut rng = SmallRng::seed_from_u64(69420);
    ints!(session, rng, i8, i16, i32, i64, u8, u16, u32, u64);
    let x: Vec<f32> = (0..64).map(|_| rng.gen_range(-100.0..100.0)).collect();
    let y: Vec<f32> = (0..64).map(|_| rng.gen_range(1.0..100.0)).collect();
    check(&session, &x, &y)?;
    let x: Vec<f64> = (0..64).map(|_| rng.gen_range(-100.0..100.0)).collect();
    let y: Vec<f64> = (0..64).map(|_| rng.gen_range(1.0..100.0)).collect();
    check(&session, &x, &y)?;
    assert_eq!(session.cached_operations().len(), 40);
    assert_eq!(backend.compilations(), 40);
    Ok(())
}

#[test]
fn shape_mismatch_leaves_output() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1u8, 2, 3])?;
    let b = session.buffer(AccessMode::ReadOnly, &[1u8, 2])?;
    let c = session.buffer(AccessMode::ReadWrite, &[7u8, 7])?;
    assert!(matches!(session.sub(&a, &b, &c), Err(ClwiseError::ShapeMismatch(_))));
    assert!(matches!(session.sub(&b, &a, &c), Err(ClwiseError::ShapeMismatch(_))));
    assert_eq!(c.to_vec()?, [7, 7]);
    assert_eq!(backend.compilations(), 0);
    Ok(())
}

#[test]
fn read_only_output() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1i16, 2])?;
    let c = session.buffer(AccessMode::ReadOnly, &[0i16, 0])?;
    let err = session.mul(&a, &a, &c).unwrap_err();
    let msg = match err {
        ClwiseError::Permission(msg) => msg,
        err => panic!("{err}"),
    };
    assert!(msg.contains("4_binary.rs"), "{msg}");
    assert_eq!(backend.compilations(), 0);
    Ok(())
}

#[test]
fn write_only_input() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1i16, 2])?;
    let b = session.uninit_buffer::<i16>(AccessMode::WriteOnly, 2)?;
    let c = session.uninit_buffer::<i16>(AccessMode::WriteOnly, 2)?;
    assert!(matches!(session.div(&a, &b, &c), Err(ClwiseError::Permission(_))));
    assert_eq!(backend.compilations(), 0);
    Ok(())
}

#[test]
fn in_place() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadWrite, &[1i64, 2, 3])?;
    let b = session.buffer(AccessMode::ReadOnly, &[10i64, 20, 30])?;
    session.add(&a, &b, &a)?;
    session.mul(&a, &b, &a)?;
    assert_eq!(a.to_vec()?, [110, 440, 990]);
    Ok(())
}

#[test]
fn buffer_of_other_session() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let first = open(&backend)?;
    let second = open(&backend)?;
    let a = first.buffer(AccessMode::ReadOnly, &[1f32])?;
    let b = second.buffer(AccessMode::ReadOnly, &[1f32])?;
    let c = first.uninit_buffer::<f32>(AccessMode::WriteOnly, 1)?;
    assert!(matches!(first.add(&a, &b, &c), Err(ClwiseError::InvalidSession(_))));
    assert!(matches!(second.add(&a, &b, &c), Err(ClwiseError::InvalidSession(_))));
    assert_eq!(backend.compilations(), 0);
    Ok(())
}

#[test]
fn empty_operands() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer::<u32>(AccessMode::ReadOnly, &[])?;
    let c = session.uninit_buffer::<u32>(AccessMode::WriteOnly, 0)?;
    session.add(&a, &a, &c)?;
    assert_eq!(backend.compilations(), 1);
    assert_eq!(backend.launches(), 0);
    assert!(c.to_vec()?.is_empty());
    Ok(())
}

#[test]
fn custom_operation_name() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[6u32, 9])?;
    let b = session.buffer(AccessMode::ReadOnly, &[3u32, 3])?;
    let c = session.uninit_buffer::<u32>(AccessMode::WriteOnly, 2)?;
    session.apply("quotient", '/', &a, &b, &c)?;
    assert_eq!(c.to_vec()?, [2, 3]);
    let keys = session.cached_operations();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].kernel_name(), "quotient_uint32");
    Ok(())
}

#[test]
fn argument_binding_failure() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1i8])?;
    let c = session.uninit_buffer::<i8>(AccessMode::WriteOnly, 1)?;
    backend.set_fault(Some(Fault::SetArg(2)));
    let err = session.add(&a, &a, &c).unwrap_err();
    assert!(matches!(err, ClwiseError::ArgumentBinding { index: 2, .. }), "{err}");
    assert_eq!(backend.launches(), 0);
    Ok(())
}

#[test]
fn launch_failure() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend)?;
    let a = session.buffer(AccessMode::ReadOnly, &[1i8])?;
    let c = session.uninit_buffer::<i8>(AccessMode::WriteOnly, 1)?;
    backend.set_fault(Some(Fault::Launch));
    let err = session.add(&a, &a, &c).unwrap_err();
    let err = match err {
        ClwiseError::Backend(err) => err,
        err => panic!("{err}"),
    };
    assert_eq!(err.status, ErrorStatus::KernelLaunch);
    Ok(())
}
