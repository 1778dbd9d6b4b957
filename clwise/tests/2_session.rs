use clwise::{
    list_platforms, AccessMode, ClwiseError, DeviceSession, DummyBackend, DummyConfig, DummyDevice,
    DummyPlatform, ErrorStatus, Fault, SessionConfig, SessionState,
};
use std::sync::Arc;

fn open(backend: &Arc<DummyBackend>, device_index: usize) -> Result<DeviceSession, ClwiseError> {
    let platforms = list_platforms(&**backend)?;
    let device = &platforms[0].devices[device_index];
    DeviceSession::on_device(backend.clone(), device, SessionConfig::default())
}

#[test]
fn close_releases_everything() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend, 0)?;
    let live = backend.live();
    assert_eq!((live.contexts, live.queues), (1, 1));
    assert_eq!(session.state(), SessionState::Open);
    session.close()?;
    assert_eq!(backend.live().total(), 0);
    Ok(())
}

#[test]
fn close_after_dispatch_releases_in_order() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let session = open(&backend, 0)?;
    {
        let a = session.buffer(AccessMode::ReadOnly, &[3u32, 4])?;
        let c = session.uninit_buffer::<u32>(AccessMode::ReadWrite, 2)?;
        session.add(&a, &a, &c)?;
        session.mul(&c, &a, &c)?;
        session.div(&c, &a, &c)?;
        assert_eq!(c.to_vec()?, [6, 8]);
    }
    let live = backend.live();
    assert_eq!((live.programs, live.kernels, live.buffers), (3, 3, 0));
    // Backend refuses to release a context or program whose dependents are alive
    session.close()?;
    assert_eq!(backend.live().total(), 0);
    Ok(())
}

#[test]
fn drop_releases_everything() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    {
        let session = open(&backend, 1)?;
        let a = session.buffer(AccessMode::ReadOnly, &[1f32, 2.])?;
        let c = session.uninit_buffer::<f32>(AccessMode::WriteOnly, 2)?;
        session.add(&a, &a, &c)?;
        assert_eq!(session.state(), SessionState::Populated);
        assert_eq!(backend.live().total(), 6);
    }
    assert_eq!(backend.live().total(), 0);
    Ok(())
}

#[test]
fn queue_failure_releases_context() {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    backend.set_fault(Some(Fault::CreateQueue));
    let err = open(&backend, 0).unwrap_err();
    let err = match err {
        ClwiseError::ResourceAcquisition(err) => err,
        err => panic!("{err}"),
    };
    assert_eq!(err.status, ErrorStatus::QueueCreation);
    assert_eq!(backend.live().total(), 0);
}

#[test]
fn context_failure() {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    backend.set_fault(Some(Fault::CreateContext));
    assert!(matches!(open(&backend, 0), Err(ClwiseError::ResourceAcquisition(_))));
    assert_eq!(backend.live().total(), 0);
}

#[test]
fn device_of_other_platform() -> Result<(), ClwiseError> {
    let dev = |name: &str| DummyDevice {
        name: name.into(),
        device_type: 4,
        compute_units: 1,
        global_mem_size: 1024,
    };
    let backend = Arc::new(DummyBackend::new(DummyConfig {
        platforms: vec![
            DummyPlatform { name: "A".into(), devices: vec![dev("a0")] },
            DummyPlatform { name: "B".into(), devices: vec![dev("b0")] },
        ],
    }));
    let platforms = list_platforms(&*backend)?;
    let result = DeviceSession::open(
        backend.clone(),
        platforms[0].id,
        platforms[1].devices[0].id,
        SessionConfig::default(),
    );
    assert!(matches!(result, Err(ClwiseError::ResourceAcquisition(_))));
    assert_eq!(backend.live().total(), 0);
    Ok(())
}

#[test]
fn reassignment_releases_old_session() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let mut session = open(&backend, 0)?;
    let first = session.device();
    session = open(&backend, 1)?;
    assert_ne!(session.device(), first);
    assert_eq!(backend.live().contexts, 1);
    assert_eq!(backend.live().queues, 1);
    let moved = session;
    moved.finish()?;
    drop(moved);
    assert_eq!(backend.live().total(), 0);
    Ok(())
}

#[test]
fn session_accessors() -> Result<(), ClwiseError> {
    let backend = Arc::new(DummyBackend::new(DummyConfig::default()));
    let platforms = list_platforms(&*backend)?;
    let config = SessionConfig::default().with_caching(false).with_build_options("-cl-mad-enable");
    let device = platforms[0].devices[1].id;
    let session = DeviceSession::open(backend.clone(), platforms[0].id, device, config.clone())?;
    assert_eq!(session.config(), &config);
    assert_eq!(session.platform(), platforms[0].id);
    assert_eq!(session.device(), platforms[0].devices[1].id);
    assert!(session.cached_operations().is_empty());
    Ok(())
}
