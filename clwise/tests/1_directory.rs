use clwise::{
    find_device, list_platforms, ClwiseError, DeviceClass, DummyBackend, DummyConfig, DummyDevice,
    DummyPlatform, Fault,
};

fn device(name: &str, device_type: u64) -> DummyDevice {
    DummyDevice { name: name.into(), device_type, compute_units: 4, global_mem_size: 1 << 30 }
}

#[test]
fn default_topology() -> Result<(), ClwiseError> {
    let backend = DummyBackend::new(DummyConfig::default());
    let platforms = list_platforms(&backend)?;
    assert_eq!(platforms.len(), 1);
    assert_eq!(platforms[0].name, "Dummy Platform");
    let devices = &platforms[0].devices;
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].class, DeviceClass::Gpu);
    assert_eq!(devices[1].class, DeviceClass::Cpu);
    assert!(devices.iter().all(|d| d.platform == platforms[0].id));
    assert_eq!(devices[0].compute_units, 32);
    Ok(())
}

#[test]
fn no_platforms() {
    let backend = DummyBackend::empty();
    assert!(matches!(list_platforms(&backend), Err(ClwiseError::Discovery(_))));
}

#[test]
fn enumeration_failure() {
    let backend = DummyBackend::new(DummyConfig::default());
    backend.set_fault(Some(Fault::EnumeratePlatforms));
    assert!(matches!(list_platforms(&backend), Err(ClwiseError::Discovery(_))));
    backend.set_fault(Some(Fault::EnumerateDevices));
    assert!(matches!(list_platforms(&backend), Err(ClwiseError::Discovery(_))));
    backend.set_fault(None);
    assert!(list_platforms(&backend).is_ok());
}

#[test]
fn platform_without_devices() -> Result<(), ClwiseError> {
    let backend = DummyBackend::new(DummyConfig {
        platforms: vec![
            DummyPlatform { name: "Empty".into(), devices: Vec::new() },
            DummyPlatform {
                name: "Accel".into(),
                devices: vec![device("FPGA", 8), device("Custom", 16)],
            },
        ],
    });
    let platforms = list_platforms(&backend)?;
    assert_eq!(platforms.len(), 2);
    assert!(platforms[0].devices.is_empty());
    assert_eq!(platforms[1].devices[0].class, DeviceClass::Accelerator);
    assert_eq!(platforms[1].devices[1].class, DeviceClass::Unknown);
    Ok(())
}

#[test]
fn select_by_index() -> Result<(), ClwiseError> {
    let backend = DummyBackend::new(DummyConfig::default());
    let platforms = list_platforms(&backend)?;
    assert_eq!(find_device(&platforms, 0, 1)?.name, "Dummy CPU");
    assert!(matches!(find_device(&platforms, 0, 2), Err(ClwiseError::Discovery(_))));
    assert!(matches!(find_device(&platforms, 1, 0), Err(ClwiseError::Discovery(_))));
    Ok(())
}
