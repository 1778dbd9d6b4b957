//! `OpenCL` backend

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use super::{
    Backend, ContextId, DeviceId, DeviceInfo, KernelArg, KernelId, MemId, PlatformId, PlatformInfo,
    ProgramId, QueueId,
};
use crate::{
    buffer::AccessMode,
    error::{BackendError, ErrorStatus},
};
use libloading::Library;
use nanoserde::DeJson;
use std::{
    ffi::{c_char, c_void, CString},
    ptr,
};

#[derive(Debug, Default, Clone, DeJson)]
pub struct OpenCLConfig {
    /// Path to the `OpenCL` loader library.
    /// If set to None, well known system locations are searched.
    /// default = None
    pub library_path: Option<String>,
}

type cl_int = i32;
type cl_uint = u32;
type cl_bitfield = u64;

/// Runtime loaded `OpenCL` entry points
pub struct OpenCLBackend {
    clGetPlatformIDs: unsafe extern "C" fn(cl_uint, *mut *mut c_void, *mut cl_uint) -> cl_int,
    clGetPlatformInfo:
        unsafe extern "C" fn(*mut c_void, cl_uint, usize, *mut c_void, *mut usize) -> cl_int,
    clGetDeviceIDs: unsafe extern "C" fn(
        *mut c_void,
        cl_bitfield,
        cl_uint,
        *mut *mut c_void,
        *mut cl_uint,
    ) -> cl_int,
    clGetDeviceInfo:
        unsafe extern "C" fn(*mut c_void, cl_uint, usize, *mut c_void, *mut usize) -> cl_int,
    clCreateContext: unsafe extern "C" fn(
        *const isize,
        cl_uint,
        *const *mut c_void,
        Option<unsafe extern "C" fn(*const c_char, *const c_void, usize, *mut c_void)>,
        *mut c_void,
        *mut cl_int,
    ) -> *mut c_void,
    clReleaseContext: unsafe extern "C" fn(*mut c_void) -> cl_int,
    clCreateCommandQueue:
        unsafe extern "C" fn(*mut c_void, *mut c_void, cl_bitfield, *mut cl_int) -> *mut c_void,
    clReleaseCommandQueue: unsafe extern "C" fn(*mut c_void) -> cl_int,
    clCreateBuffer: unsafe extern "C" fn(
        *mut c_void,
        cl_bitfield,
        usize,
        *mut c_void,
        *mut cl_int,
    ) -> *mut c_void,
    clReleaseMemObject: unsafe extern "C" fn(*mut c_void) -> cl_int,
    clCreateProgramWithSource: unsafe extern "C" fn(
        *mut c_void,
        cl_uint,
        *const *const c_char,
        *const usize,
        *mut cl_int,
    ) -> *mut c_void,
    clBuildProgram: unsafe extern "C" fn(
        *mut c_void,
        cl_uint,
        *const *mut c_void,
        *const c_char,
        Option<unsafe extern "C" fn(*mut c_void, *mut c_void)>,
        *mut c_void,
    ) -> cl_int,
    clGetProgramBuildInfo: unsafe extern "C" fn(
        *mut c_void,
        *mut c_void,
        cl_uint,
        usize,
        *mut c_void,
        *mut usize,
    ) -> cl_int,
    clReleaseProgram: unsafe extern "C" fn(*mut c_void) -> cl_int,
    clCreateKernel: unsafe extern "C" fn(*mut c_void, *const c_char, *mut cl_int) -> *mut c_void,
    clReleaseKernel: unsafe extern "C" fn(*mut c_void) -> cl_int,
    clSetKernelArg: unsafe extern "C" fn(*mut c_void, cl_uint, usize, *const c_void) -> cl_int,
    clEnqueueNDRangeKernel: unsafe extern "C" fn(
        *mut c_void,
        *mut c_void,
        cl_uint,
        *const usize,
        *const usize,
        *const usize,
        cl_uint,
        *const *mut c_void,
        *mut *mut c_void,
    ) -> cl_int,
    clEnqueueReadBuffer: unsafe extern "C" fn(
        *mut c_void,
        *mut c_void,
        cl_uint,
        usize,
        usize,
        *mut c_void,
        cl_uint,
        *const *mut c_void,
        *mut *mut c_void,
    ) -> cl_int,
    clFinish: unsafe extern "C" fn(*mut c_void) -> cl_int,
    // Entry points above are valid only while the library is loaded
    library: Library,
}

impl core::fmt::Debug for OpenCLBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpenCLBackend").field("library", &self.library).finish_non_exhaustive()
    }
}

// Configured library path, on failure well known paths are searched instead
fn load_configured(path: &str) -> Option<Library> {
    match unsafe { Library::new(path) } {
        Ok(library) => {
            log::debug!("Loaded OpenCL runtime from configured path {path}");
            Some(library)
        }
        Err(err) => {
            log::warn!(
                "Failed to load OpenCL runtime from configured path {path}, {err}, \
                 searching system paths"
            );
            None
        }
    }
}

const OPENCL_PATHS: [&str; 12] = [
    "/lib/libOpenCL.so",
    "/lib64/libOpenCL.so",
    "/lib/x86_64-linux-gnu/libOpenCL.so",
    "/lib64/x86_64-linux-gnu/libOpenCL.so",
    "/usr/lib/libOpenCL.so",
    "/usr/lib64/libOpenCL.so",
    "/usr/lib/x86_64-linux-gnu/libOpenCL.so",
    "/usr/lib64/x86_64-linux-gnu/libOpenCL.so",
    "libOpenCL.so.1",
    "libOpenCL.so",
    "/System/Library/Frameworks/OpenCL.framework/OpenCL",
    "OpenCL.dll",
];

unsafe fn sym<T: Copy>(library: &Library, name: &str) -> Result<T, BackendError> {
    let symbol = format!("{name}\0");
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|f| *f)
        .map_err(|e| {
            BackendError::new(ErrorStatus::Initialization, format!("{name} not found, {e}"))
        })
}

impl OpenCLBackend {
    /// Load `OpenCL` loader library and resolve all entry points.
    pub fn load(config: &OpenCLConfig) -> Result<OpenCLBackend, BackendError> {
        let library = config.library_path.as_deref().and_then(load_configured).or_else(|| {
            OPENCL_PATHS.into_iter().find_map(|path| {
                let library = unsafe { Library::new(path) }.ok()?;
                log::debug!("Loaded OpenCL runtime from {path}");
                Some(library)
            })
        });
        let Some(library) = library else {
            return Err(BackendError::new(ErrorStatus::DyLibNotFound, "OpenCL runtime not found."));
        };
        unsafe {
            Ok(OpenCLBackend {
                clGetPlatformIDs: sym(&library, "clGetPlatformIDs")?,
                clGetPlatformInfo: sym(&library, "clGetPlatformInfo")?,
                clGetDeviceIDs: sym(&library, "clGetDeviceIDs")?,
                clGetDeviceInfo: sym(&library, "clGetDeviceInfo")?,
                clCreateContext: sym(&library, "clCreateContext")?,
                clReleaseContext: sym(&library, "clReleaseContext")?,
                clCreateCommandQueue: sym(&library, "clCreateCommandQueue")?,
                clReleaseCommandQueue: sym(&library, "clReleaseCommandQueue")?,
                clCreateBuffer: sym(&library, "clCreateBuffer")?,
                clReleaseMemObject: sym(&library, "clReleaseMemObject")?,
                clCreateProgramWithSource: sym(&library, "clCreateProgramWithSource")?,
                clBuildProgram: sym(&library, "clBuildProgram")?,
                clGetProgramBuildInfo: sym(&library, "clGetProgramBuildInfo")?,
                clReleaseProgram: sym(&library, "clReleaseProgram")?,
                clCreateKernel: sym(&library, "clCreateKernel")?,
                clReleaseKernel: sym(&library, "clReleaseKernel")?,
                clSetKernelArg: sym(&library, "clSetKernelArg")?,
                clEnqueueNDRangeKernel: sym(&library, "clEnqueueNDRangeKernel")?,
                clEnqueueReadBuffer: sym(&library, "clEnqueueReadBuffer")?,
                clFinish: sym(&library, "clFinish")?,
                library,
            })
        }
    }

    fn get_platform_data(
        &self,
        platform: PlatformId,
        param_name: cl_uint,
    ) -> Result<Vec<u8>, BackendError> {
        let object = ptr_of(platform.0);
        let mut size: usize = 0;
        OpenCLStatus::from(unsafe {
            (self.clGetPlatformInfo)(object, param_name, 0, ptr::null_mut(), &mut size)
        })
        .check(ErrorStatus::DeviceQuery)?;
        let mut data: Vec<u8> = vec![0; size];
        if size > 0 {
            OpenCLStatus::from(unsafe {
                (self.clGetPlatformInfo)(
                    object,
                    param_name,
                    size,
                    data.as_mut_ptr().cast(),
                    ptr::null_mut(),
                )
            })
            .check(ErrorStatus::DeviceQuery)?;
        }
        Ok(data)
    }

    fn get_device_data(
        &self,
        device: DeviceId,
        param_name: cl_uint,
    ) -> Result<Vec<u8>, BackendError> {
        let object = ptr_of(device.0);
        let mut size: usize = 0;
        let status = OpenCLStatus::from(unsafe {
            (self.clGetDeviceInfo)(object, param_name, 0, ptr::null_mut(), &mut size)
        });
        if status != OpenCLStatus::CL_SUCCESS {
            return Err(BackendError::new(
                ErrorStatus::DeviceQuery,
                format!("Failed to get device info {param_name}, {status:?}"),
            ));
        }
        let mut data: Vec<u8> = vec![0; size];
        if size > 0 {
            OpenCLStatus::from(unsafe {
                (self.clGetDeviceInfo)(
                    object,
                    param_name,
                    size,
                    data.as_mut_ptr().cast(),
                    ptr::null_mut(),
                )
            })
            .check(ErrorStatus::DeviceQuery)?;
        }
        Ok(data)
    }

    fn get_program_build_log(&self, program: *mut c_void, device: DeviceId) -> String {
        let device = ptr_of(device.0);
        let mut size: usize = 0;
        let status = OpenCLStatus::from(unsafe {
            (self.clGetProgramBuildInfo)(
                program,
                device,
                CL_PROGRAM_BUILD_LOG,
                0,
                ptr::null_mut(),
                &mut size,
            )
        });
        if status != OpenCLStatus::CL_SUCCESS {
            return format!("Build log unavailable, {status:?}");
        }
        let mut data: Vec<u8> = vec![0; size];
        let status = OpenCLStatus::from(unsafe {
            (self.clGetProgramBuildInfo)(
                program,
                device,
                CL_PROGRAM_BUILD_LOG,
                size,
                data.as_mut_ptr().cast(),
                ptr::null_mut(),
            )
        });
        if status != OpenCLStatus::CL_SUCCESS {
            return format!("Build log unavailable, {status:?}");
        }
        info_string(data)
    }
}

fn ptr_of(id: usize) -> *mut c_void {
    id as *mut c_void
}

fn info_string(data: Vec<u8>) -> String {
    String::from_utf8_lossy(&data).trim_end_matches('\0').to_string()
}

fn info_u32(data: &[u8]) -> u32 {
    data.get(..4).and_then(|b| b.try_into().ok()).map_or(0, u32::from_ne_bytes)
}

fn info_u64(data: &[u8]) -> u64 {
    data.get(..8).and_then(|b| b.try_into().ok()).map_or(0, u64::from_ne_bytes)
}

impl Backend for OpenCLBackend {
    fn platforms(&self) -> Result<Vec<PlatformId>, BackendError> {
        let mut count: cl_uint = 0;
        let status =
            OpenCLStatus::from(unsafe { (self.clGetPlatformIDs)(0, ptr::null_mut(), &mut count) });
        if status == OpenCLStatus::CL_PLATFORM_NOT_FOUND_KHR {
            return Ok(Vec::new());
        }
        status.check(ErrorStatus::DeviceEnumeration)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut ids: Vec<*mut c_void> = vec![ptr::null_mut(); count as usize];
        OpenCLStatus::from(unsafe {
            (self.clGetPlatformIDs)(count, ids.as_mut_ptr(), ptr::null_mut())
        })
        .check(ErrorStatus::DeviceEnumeration)?;
        Ok(ids.into_iter().map(|id| PlatformId(id as usize)).collect())
    }

    fn platform_info(&self, platform: PlatformId) -> Result<PlatformInfo, BackendError> {
        Ok(PlatformInfo {
            name: info_string(self.get_platform_data(platform, CL_PLATFORM_NAME)?),
            vendor: info_string(self.get_platform_data(platform, CL_PLATFORM_VENDOR)?),
            version: info_string(self.get_platform_data(platform, CL_PLATFORM_VERSION)?),
            profile: info_string(self.get_platform_data(platform, CL_PLATFORM_PROFILE)?),
        })
    }

    fn devices(&self, platform: PlatformId) -> Result<Vec<DeviceId>, BackendError> {
        let platform = ptr_of(platform.0);
        let mut count: cl_uint = 0;
        let status = OpenCLStatus::from(unsafe {
            (self.clGetDeviceIDs)(platform, CL_DEVICE_TYPE_ALL, 0, ptr::null_mut(), &mut count)
        });
        if status == OpenCLStatus::CL_DEVICE_NOT_FOUND {
            return Ok(Vec::new());
        }
        status.check(ErrorStatus::DeviceEnumeration)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut ids: Vec<*mut c_void> = vec![ptr::null_mut(); count as usize];
        OpenCLStatus::from(unsafe {
            (self.clGetDeviceIDs)(
                platform,
                CL_DEVICE_TYPE_ALL,
                count,
                ids.as_mut_ptr(),
                ptr::null_mut(),
            )
        })
        .check(ErrorStatus::DeviceEnumeration)?;
        Ok(ids.into_iter().map(|id| DeviceId(id as usize)).collect())
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, BackendError> {
        Ok(DeviceInfo {
            name: info_string(self.get_device_data(device, CL_DEVICE_NAME)?),
            vendor: info_string(self.get_device_data(device, CL_DEVICE_VENDOR)?),
            version: info_string(self.get_device_data(device, CL_DEVICE_VERSION)?),
            device_type: info_u64(&self.get_device_data(device, CL_DEVICE_TYPE)?),
            compute_units: info_u32(&self.get_device_data(device, CL_DEVICE_MAX_COMPUTE_UNITS)?),
            global_mem_size: info_u64(&self.get_device_data(device, CL_DEVICE_GLOBAL_MEM_SIZE)?),
        })
    }

    fn create_context(&self, device: DeviceId) -> Result<ContextId, BackendError> {
        let devices = [ptr_of(device.0)];
        let mut status: cl_int = 0;
        let context = unsafe {
            (self.clCreateContext)(
                ptr::null(),
                1,
                devices.as_ptr(),
                None,
                ptr::null_mut(),
                &mut status,
            )
        };
        OpenCLStatus::from(status).check(ErrorStatus::ContextCreation)?;
        Ok(ContextId(context as usize))
    }

    fn release_context(&self, context: ContextId) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe { (self.clReleaseContext)(ptr_of(context.0)) })
            .check(ErrorStatus::Deinitialization)
    }

    fn create_queue(&self, context: ContextId, device: DeviceId) -> Result<QueueId, BackendError> {
        let mut status: cl_int = 0;
        let queue = unsafe {
            (self.clCreateCommandQueue)(ptr_of(context.0), ptr_of(device.0), 0, &mut status)
        };
        OpenCLStatus::from(status).check(ErrorStatus::QueueCreation)?;
        Ok(QueueId(queue as usize))
    }

    fn release_queue(&self, queue: QueueId) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe { (self.clReleaseCommandQueue)(ptr_of(queue.0)) })
            .check(ErrorStatus::Deinitialization)
    }

    fn allocate(
        &self,
        context: ContextId,
        access: AccessMode,
        bytes: usize,
        host: Option<&[u8]>,
    ) -> Result<MemId, BackendError> {
        let mut flags = match access {
            AccessMode::ReadWrite => CL_MEM_READ_WRITE,
            AccessMode::WriteOnly => CL_MEM_WRITE_ONLY,
            AccessMode::ReadOnly => CL_MEM_READ_ONLY,
        };
        let mut host_ptr: *mut c_void = ptr::null_mut();
        if let Some(host) = host {
            if host.len() != bytes {
                return Err(BackendError::new(
                    ErrorStatus::MemoryAllocation,
                    format!("Host data has {} bytes, allocation has {bytes}", host.len()),
                ));
            }
            flags |= CL_MEM_COPY_HOST_PTR;
            // Only read because of CL_MEM_COPY_HOST_PTR
            host_ptr = host.as_ptr().cast_mut().cast();
        }
        let mut status: cl_int = 0;
        let mem = unsafe {
            (self.clCreateBuffer)(ptr_of(context.0), flags, bytes, host_ptr, &mut status)
        };
        OpenCLStatus::from(status).check(ErrorStatus::MemoryAllocation)?;
        Ok(MemId(mem as usize))
    }

    fn release_mem(&self, mem: MemId) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe { (self.clReleaseMemObject)(ptr_of(mem.0)) })
            .check(ErrorStatus::Deinitialization)
    }

    fn build_program(
        &self,
        context: ContextId,
        device: DeviceId,
        source: &str,
        options: &str,
    ) -> Result<ProgramId, BackendError> {
        let sources: [*const c_char; 1] = [source.as_ptr().cast()];
        let lengths = [source.len()];
        let mut status: cl_int = 0;
        let program = unsafe {
            (self.clCreateProgramWithSource)(
                ptr_of(context.0),
                1,
                sources.as_ptr(),
                lengths.as_ptr(),
                &mut status,
            )
        };
        OpenCLStatus::from(status).check(ErrorStatus::KernelCompilation)?;
        let options = CString::new(options).map_err(|e| {
            BackendError::new(ErrorStatus::KernelCompilation, format!("Invalid build options, {e}"))
        });
        let options = match options {
            Ok(options) => options,
            Err(e) => {
                unsafe { (self.clReleaseProgram)(program) };
                return Err(e);
            }
        };
        let devices = [ptr_of(device.0)];
        let status = OpenCLStatus::from(unsafe {
            (self.clBuildProgram)(
                program,
                1,
                devices.as_ptr(),
                options.as_ptr(),
                None,
                ptr::null_mut(),
            )
        });
        if status != OpenCLStatus::CL_SUCCESS {
            let build_log = self.get_program_build_log(program, device);
            let release = OpenCLStatus::from(unsafe { (self.clReleaseProgram)(program) });
            if release != OpenCLStatus::CL_SUCCESS {
                log::warn!("Failed to release program after failed build, {release:?}");
            }
            return Err(BackendError::new(
                ErrorStatus::KernelCompilation,
                format!("{status:?}\n{build_log}"),
            ));
        }
        Ok(ProgramId(program as usize))
    }

    fn release_program(&self, program: ProgramId) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe { (self.clReleaseProgram)(ptr_of(program.0)) })
            .check(ErrorStatus::Deinitialization)
    }

    fn create_kernel(&self, program: ProgramId, name: &str) -> Result<KernelId, BackendError> {
        let name = CString::new(name).map_err(|e| {
            BackendError::new(ErrorStatus::KernelCompilation, format!("Invalid kernel name, {e}"))
        })?;
        let mut status: cl_int = 0;
        let kernel =
            unsafe { (self.clCreateKernel)(ptr_of(program.0), name.as_ptr(), &mut status) };
        OpenCLStatus::from(status).check(ErrorStatus::KernelCompilation)?;
        Ok(KernelId(kernel as usize))
    }

    fn release_kernel(&self, kernel: KernelId) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe { (self.clReleaseKernel)(ptr_of(kernel.0)) })
            .check(ErrorStatus::Deinitialization)
    }

    fn set_arg(
        &self,
        kernel: KernelId,
        index: u32,
        arg: KernelArg<'_>,
    ) -> Result<(), BackendError> {
        let status = match arg {
            KernelArg::Mem(mem) => {
                let mem = ptr_of(mem.0);
                unsafe {
                    (self.clSetKernelArg)(
                        ptr_of(kernel.0),
                        index,
                        core::mem::size_of::<*mut c_void>(),
                        ptr::from_ref(&mem).cast(),
                    )
                }
            }
            KernelArg::Scalar(bytes) => unsafe {
                (self.clSetKernelArg)(ptr_of(kernel.0), index, bytes.len(), bytes.as_ptr().cast())
            },
        };
        OpenCLStatus::from(status).check(ErrorStatus::IncorrectKernelArg)
    }

    fn enqueue(
        &self,
        queue: QueueId,
        kernel: KernelId,
        global_work_size: usize,
    ) -> Result<(), BackendError> {
        let global_work_size = [global_work_size];
        OpenCLStatus::from(unsafe {
            (self.clEnqueueNDRangeKernel)(
                ptr_of(queue.0),
                ptr_of(kernel.0),
                1,
                ptr::null(),
                global_work_size.as_ptr(),
                ptr::null(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })
        .check(ErrorStatus::KernelLaunch)
    }

    fn read(&self, queue: QueueId, mem: MemId, dst: &mut [u8]) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe {
            (self.clEnqueueReadBuffer)(
                ptr_of(queue.0),
                ptr_of(mem.0),
                CL_BLOCKING,
                0,
                dst.len(),
                dst.as_mut_ptr().cast(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        })
        .check(ErrorStatus::MemoryCopyP2H)
    }

    fn finish(&self, queue: QueueId) -> Result<(), BackendError> {
        OpenCLStatus::from(unsafe { (self.clFinish)(ptr_of(queue.0)) })
            .check(ErrorStatus::KernelSync)
    }
}

const CL_PLATFORM_PROFILE: cl_uint = 0x0900; // 2304
const CL_PLATFORM_VERSION: cl_uint = 0x0901; // 2305
const CL_PLATFORM_NAME: cl_uint = 0x0902; // 2306
const CL_PLATFORM_VENDOR: cl_uint = 0x0903; // 2307
const CL_DEVICE_TYPE: cl_uint = 0x1000; // 4096
const CL_DEVICE_MAX_COMPUTE_UNITS: cl_uint = 0x1002; // 4098
const CL_DEVICE_GLOBAL_MEM_SIZE: cl_uint = 0x101F; // 4127
const CL_DEVICE_NAME: cl_uint = 0x102B; // 4139
const CL_DEVICE_VENDOR: cl_uint = 0x102C; // 4140
const CL_DEVICE_VERSION: cl_uint = 0x102F; // 4143
const CL_DEVICE_TYPE_ALL: cl_bitfield = 0xFFFF_FFFF;
const CL_MEM_READ_WRITE: cl_bitfield = 1;
const CL_MEM_WRITE_ONLY: cl_bitfield = 2;
const CL_MEM_READ_ONLY: cl_bitfield = 4;
const CL_MEM_COPY_HOST_PTR: cl_bitfield = 32;
const CL_BLOCKING: cl_uint = 1;
const CL_PROGRAM_BUILD_LOG: cl_uint = 0x1183; // 4483

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum OpenCLStatus {
    CL_SUCCESS,
    CL_DEVICE_NOT_FOUND,
    CL_DEVICE_NOT_AVAILABLE,
    CL_COMPILER_NOT_AVAILABLE,
    CL_MEM_OBJECT_ALLOCATION_FAILURE,
    CL_OUT_OF_RESOURCES,
    CL_OUT_OF_HOST_MEMORY,
    CL_BUILD_PROGRAM_FAILURE,
    CL_INVALID_VALUE,
    CL_INVALID_DEVICE_TYPE,
    CL_INVALID_PLATFORM,
    CL_INVALID_DEVICE,
    CL_INVALID_CONTEXT,
    CL_INVALID_QUEUE_PROPERTIES,
    CL_INVALID_COMMAND_QUEUE,
    CL_INVALID_HOST_PTR,
    CL_INVALID_MEM_OBJECT,
    CL_INVALID_BUILD_OPTIONS,
    CL_INVALID_PROGRAM,
    CL_INVALID_PROGRAM_EXECUTABLE,
    CL_INVALID_KERNEL_NAME,
    CL_INVALID_KERNEL_DEFINITION,
    CL_INVALID_KERNEL,
    CL_INVALID_ARG_INDEX,
    CL_INVALID_ARG_VALUE,
    CL_INVALID_ARG_SIZE,
    CL_INVALID_KERNEL_ARGS,
    CL_INVALID_WORK_DIMENSION,
    CL_INVALID_WORK_GROUP_SIZE,
    CL_INVALID_WORK_ITEM_SIZE,
    CL_INVALID_GLOBAL_OFFSET,
    CL_INVALID_EVENT_WAIT_LIST,
    CL_INVALID_OPERATION,
    CL_INVALID_BUFFER_SIZE,
    CL_INVALID_GLOBAL_WORK_SIZE,
    CL_PLATFORM_NOT_FOUND_KHR,
    UNKNOWN(cl_int),
}

impl From<cl_int> for OpenCLStatus {
    fn from(status: cl_int) -> Self {
        match status {
            0 => Self::CL_SUCCESS,
            -1 => Self::CL_DEVICE_NOT_FOUND,
            -2 => Self::CL_DEVICE_NOT_AVAILABLE,
            -3 => Self::CL_COMPILER_NOT_AVAILABLE,
            -4 => Self::CL_MEM_OBJECT_ALLOCATION_FAILURE,
            -5 => Self::CL_OUT_OF_RESOURCES,
            -6 => Self::CL_OUT_OF_HOST_MEMORY,
            -11 => Self::CL_BUILD_PROGRAM_FAILURE,
            -30 => Self::CL_INVALID_VALUE,
            -31 => Self::CL_INVALID_DEVICE_TYPE,
            -32 => Self::CL_INVALID_PLATFORM,
            -33 => Self::CL_INVALID_DEVICE,
            -34 => Self::CL_INVALID_CONTEXT,
            -35 => Self::CL_INVALID_QUEUE_PROPERTIES,
            -36 => Self::CL_INVALID_COMMAND_QUEUE,
            -37 => Self::CL_INVALID_HOST_PTR,
            -38 => Self::CL_INVALID_MEM_OBJECT,
            -43 => Self::CL_INVALID_BUILD_OPTIONS,
            -44 => Self::CL_INVALID_PROGRAM,
            -45 => Self::CL_INVALID_PROGRAM_EXECUTABLE,
            -46 => Self::CL_INVALID_KERNEL_NAME,
            -47 => Self::CL_INVALID_KERNEL_DEFINITION,
            -48 => Self::CL_INVALID_KERNEL,
            -49 => Self::CL_INVALID_ARG_INDEX,
            -50 => Self::CL_INVALID_ARG_VALUE,
            -51 => Self::CL_INVALID_ARG_SIZE,
            -52 => Self::CL_INVALID_KERNEL_ARGS,
            -53 => Self::CL_INVALID_WORK_DIMENSION,
            -54 => Self::CL_INVALID_WORK_GROUP_SIZE,
            -55 => Self::CL_INVALID_WORK_ITEM_SIZE,
            -56 => Self::CL_INVALID_GLOBAL_OFFSET,
            -57 => Self::CL_INVALID_EVENT_WAIT_LIST,
            -59 => Self::CL_INVALID_OPERATION,
            -61 => Self::CL_INVALID_BUFFER_SIZE,
            -63 => Self::CL_INVALID_GLOBAL_WORK_SIZE,
            -1001 => Self::CL_PLATFORM_NOT_FOUND_KHR,
            status => Self::UNKNOWN(status),
        }
    }
}

impl OpenCLStatus {
    fn check(self, status: ErrorStatus) -> Result<(), BackendError> {
        if self == Self::CL_SUCCESS {
            Ok(())
        } else {
            Err(BackendError::new(status, format!("{self:?}")))
        }
    }
}

#[test]
fn status_codes_map_to_names() {
    assert_eq!(OpenCLStatus::from(0), OpenCLStatus::CL_SUCCESS);
    assert_eq!(OpenCLStatus::from(-11), OpenCLStatus::CL_BUILD_PROGRAM_FAILURE);
    assert_eq!(OpenCLStatus::from(-1001), OpenCLStatus::CL_PLATFORM_NOT_FOUND_KHR);
    assert_eq!(OpenCLStatus::from(-9999), OpenCLStatus::UNKNOWN(-9999));
    let err = OpenCLStatus::from(-5).check(ErrorStatus::KernelLaunch).unwrap_err();
    assert_eq!(err.status, ErrorStatus::KernelLaunch);
    assert_eq!(&*err.context, "CL_OUT_OF_RESOURCES");
}

#[test]
fn missing_configured_library_falls_back() {
    let path = "/nonexistent/clwise/libOpenCL.so";
    assert!(load_configured(path).is_none());
    let config = OpenCLConfig { library_path: Some(path.into()) };
    // System paths are still searched, a host without OpenCL reports a missing library
    if let Err(err) = OpenCLBackend::load(&config) {
        assert!(
            matches!(err.status, ErrorStatus::DyLibNotFound | ErrorStatus::Initialization),
            "{err}"
        );
    }
}
