//! Discovery of platforms and their devices

use crate::{
    backend::{Backend, DeviceId, PlatformId},
    error::{BackendError, ClwiseError},
};

/// Kind of device, derived from the device type bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Default,
    Cpu,
    Gpu,
    Accelerator,
    Unknown,
}

impl DeviceClass {
    const DEFAULT: u64 = 1;
    const CPU: u64 = 2;
    const GPU: u64 = 4;
    const ACCELERATOR: u64 = 8;

    /// Most specific known class set in `bits`, GPU first, then accelerator, CPU and default
    #[must_use]
    pub const fn from_bits(bits: u64) -> DeviceClass {
        if bits & Self::GPU != 0 {
            DeviceClass::Gpu
        } else if bits & Self::ACCELERATOR != 0 {
            DeviceClass::Accelerator
        } else if bits & Self::CPU != 0 {
            DeviceClass::Cpu
        } else if bits & Self::DEFAULT != 0 {
            DeviceClass::Default
        } else {
            DeviceClass::Unknown
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DeviceClass::Default => "default",
            DeviceClass::Cpu => "CPU",
            DeviceClass::Gpu => "GPU",
            DeviceClass::Accelerator => "accelerator",
            DeviceClass::Unknown => "unknown",
        })
    }
}

/// Snapshot of device attributes taken at discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    /// Platform this device belongs to
    pub platform: PlatformId,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub class: DeviceClass,
    pub compute_units: u32,
    /// Global memory size in bytes
    pub global_mem_size: u64,
}

/// Snapshot of platform attributes and its devices taken at discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub id: PlatformId,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub profile: String,
    /// Devices in enumeration order, possibly empty
    pub devices: Vec<DeviceDescriptor>,
}

/// Enumerate all platforms together with their devices.
///
/// # Errors
/// Returns [`ClwiseError::Discovery`] if there are no platforms
/// or enumeration fails.
pub fn list_platforms(backend: &dyn Backend) -> Result<Vec<PlatformDescriptor>, ClwiseError> {
    let enumeration_error =
        |e: BackendError| ClwiseError::discovery_error(format!("Enumeration failed, {e}"));
    let ids = backend.platforms().map_err(enumeration_error)?;
    if ids.is_empty() {
        return Err(ClwiseError::discovery_error("No platforms found"));
    }
    let mut platforms = Vec::with_capacity(ids.len());
    for (i, id) in ids.into_iter().enumerate() {
        let info = backend.platform_info(id).map_err(enumeration_error)?;
        log::info!("Platform {i}: {} ({}, {})", info.name, info.vendor, info.version);
        let mut devices = Vec::new();
        for (j, device) in backend.devices(id).map_err(enumeration_error)?.into_iter().enumerate() {
            let dev = backend.device_info(device).map_err(enumeration_error)?;
            let class = DeviceClass::from_bits(dev.device_type);
            log::info!("  Device {j}: {} [{class}], {} compute units", dev.name, dev.compute_units);
            devices.push(DeviceDescriptor {
                id: device,
                platform: id,
                name: dev.name,
                vendor: dev.vendor,
                version: dev.version,
                class,
                compute_units: dev.compute_units,
                global_mem_size: dev.global_mem_size,
            });
        }
        platforms.push(PlatformDescriptor {
            id,
            name: info.name,
            vendor: info.vendor,
            version: info.version,
            profile: info.profile,
            devices,
        });
    }
    Ok(platforms)
}

/// Select device by platform index and device index
///
/// # Errors
/// Returns [`ClwiseError::Discovery`] if either index is out of range.
pub fn find_device(
    platforms: &[PlatformDescriptor],
    platform_index: usize,
    device_index: usize,
) -> Result<&DeviceDescriptor, ClwiseError> {
    let platform = platforms.get(platform_index).ok_or_else(|| {
        ClwiseError::discovery_error(format!(
            "Platform {platform_index} does not exist, found {} platforms",
            platforms.len()
        ))
    })?;
    platform.devices.get(device_index).ok_or_else(|| {
        ClwiseError::discovery_error(format!(
            "Device {device_index} does not exist on platform {}, it has {} devices",
            platform.name,
            platform.devices.len()
        ))
    })
}
