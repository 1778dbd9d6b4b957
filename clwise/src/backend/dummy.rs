//! Host side backend used for testing.
//! Keeps account of every live handle, counts builds and launches,
//! can be told to fail any primitive and executes generated
//! elementwise kernels on the host.
//!
//! Contexts can not be released while their queues, buffers or programs
//! are alive, programs can not be released while their kernels are alive.

use super::{
    Backend, ContextId, DeviceId, DeviceInfo, KernelArg, KernelId, MemId, PlatformId, PlatformInfo,
    ProgramId, QueueId,
};
use crate::{
    buffer::AccessMode,
    dispatch::BinaryOp,
    dtype::DType,
    error::{BackendError, ErrorStatus},
    scalar::Scalar,
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Device exposed by [`DummyBackend`]
#[derive(Debug, Clone)]
pub struct DummyDevice {
    pub name: String,
    /// Raw device type bitmask
    pub device_type: u64,
    pub compute_units: u32,
    pub global_mem_size: u64,
}

/// Platform exposed by [`DummyBackend`]
#[derive(Debug, Clone)]
pub struct DummyPlatform {
    pub name: String,
    pub devices: Vec<DummyDevice>,
}

/// Topology of [`DummyBackend`]
#[derive(Debug, Clone)]
pub struct DummyConfig {
    pub platforms: Vec<DummyPlatform>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        DummyConfig {
            platforms: vec![DummyPlatform {
                name: "Dummy Platform".into(),
                devices: vec![
                    DummyDevice {
                        name: "Dummy GPU".into(),
                        device_type: 4,
                        compute_units: 32,
                        global_mem_size: 8 * 1024 * 1024 * 1024,
                    },
                    DummyDevice {
                        name: "Dummy CPU".into(),
                        device_type: 2,
                        compute_units: 8,
                        global_mem_size: 16 * 1024 * 1024 * 1024,
                    },
                ],
            }],
        }
    }
}

/// Primitive that [`DummyBackend`] should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    EnumeratePlatforms,
    EnumerateDevices,
    CreateContext,
    CreateQueue,
    Allocate,
    Build,
    CreateKernel,
    /// Binding of argument at this index
    SetArg(u32),
    Launch,
    Read,
}

/// Number of live handles of each kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiveResources {
    pub contexts: usize,
    pub queues: usize,
    pub buffers: usize,
    pub programs: usize,
    pub kernels: usize,
}

impl LiveResources {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.contexts + self.queues + self.buffers + self.programs + self.kernels
    }
}

#[derive(Debug)]
struct Topology {
    platform: PlatformId,
    info: PlatformInfo,
    devices: Vec<(DeviceId, DeviceInfo)>,
}

#[derive(Debug)]
struct DummyProgram {
    context: ContextId,
    name: String,
    dtype: DType,
    op: BinaryOp,
}

#[derive(Debug, Clone)]
enum BoundArg {
    Mem(MemId),
    Scalar(Vec<u8>),
}

#[derive(Debug)]
struct DummyKernel {
    program: ProgramId,
    dtype: DType,
    op: BinaryOp,
    args: [Option<BoundArg>; 4],
}

#[derive(Debug)]
struct DummyBuffer {
    context: ContextId,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: usize,
    contexts: BTreeMap<ContextId, DeviceId>,
    queues: BTreeMap<QueueId, ContextId>,
    buffers: BTreeMap<MemId, DummyBuffer>,
    programs: BTreeMap<ProgramId, DummyProgram>,
    kernels: BTreeMap<KernelId, DummyKernel>,
    fault: Option<Fault>,
    compilations: usize,
    launches: usize,
}

impl DummyState {
    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    // Handles created from context that are still alive
    fn context_dependents(&self, context: ContextId) -> usize {
        self.queues.values().filter(|c| **c == context).count()
            + self.buffers.values().filter(|b| b.context == context).count()
            + self.programs.values().filter(|p| p.context == context).count()
    }

    fn check(&self, fault: Fault, status: ErrorStatus) -> Result<(), BackendError> {
        if self.fault == Some(fault) {
            return Err(BackendError::new(status, format!("Injected fault {fault:?}")));
        }
        Ok(())
    }
}

/// Backend executing kernels on the host
#[derive(Debug)]
pub struct DummyBackend {
    topology: Vec<Topology>,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Backend with given topology
    #[must_use]
    pub fn new(config: DummyConfig) -> DummyBackend {
        let mut state = DummyState::default();
        let topology = config
            .platforms
            .into_iter()
            .map(|platform| Topology {
                platform: PlatformId(state.next_id()),
                info: PlatformInfo {
                    name: platform.name,
                    vendor: "clwise".into(),
                    version: "OpenCL 1.2 dummy".into(),
                    profile: "FULL_PROFILE".into(),
                },
                devices: platform
                    .devices
                    .into_iter()
                    .map(|device| {
                        (
                            DeviceId(state.next_id()),
                            DeviceInfo {
                                name: device.name,
                                vendor: "clwise".into(),
                                version: "OpenCL 1.2".into(),
                                device_type: device.device_type,
                                compute_units: device.compute_units,
                                global_mem_size: device.global_mem_size,
                            },
                        )
                    })
                    .collect(),
            })
            .collect();
        DummyBackend { topology, state: Mutex::new(state) }
    }

    /// Backend without any platforms
    #[must_use]
    pub fn empty() -> DummyBackend {
        DummyBackend::new(DummyConfig { platforms: Vec::new() })
    }

    /// Make the given primitive fail until the fault is cleared with `None`
    pub fn set_fault(&self, fault: Option<Fault>) {
        self.state().fault = fault;
    }

    #[must_use]
    pub fn live(&self) -> LiveResources {
        let state = self.state();
        LiveResources {
            contexts: state.contexts.len(),
            queues: state.queues.len(),
            buffers: state.buffers.len(),
            programs: state.programs.len(),
            kernels: state.kernels.len(),
        }
    }

    /// Number of program builds attempted, including failed ones
    #[must_use]
    pub fn compilations(&self) -> usize {
        self.state().compilations
    }

    /// Number of kernels launched
    #[must_use]
    pub fn launches(&self) -> usize {
        self.state().launches
    }

    fn state(&self) -> MutexGuard<'_, DummyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_device(&self, device: DeviceId) -> Option<&DeviceInfo> {
        self.topology
            .iter()
            .flat_map(|p| p.devices.iter())
            .find_map(|(id, info)| (*id == device).then_some(info))
    }
}

fn invalid(status: ErrorStatus, what: &str) -> BackendError {
    BackendError::new(status, what)
}

/// Recover kernel name, element type and operator from generated source.
fn parse_entry(source: &str) -> Result<(String, DType, BinaryOp), String> {
    let body: String = source
        .lines()
        .filter(|line| !line.trim_start().starts_with("#pragma"))
        .collect::<Vec<_>>()
        .join("\n");
    let (_, rest) = body
        .split_once("__kernel void ")
        .ok_or("error: no __kernel function found")?;
    let (name, rest) = rest.split_once('(').ok_or("error: expected '(' after kernel name")?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("error: invalid kernel name '{name}'"));
    }
    let (_, rest) = rest
        .split_once("__global const ")
        .ok_or("error: expected __global const argument")?;
    let (type_name, rest) = rest.split_once('*').ok_or("error: expected pointer argument")?;
    let type_name = type_name.trim();
    let dtype = DType::from_ocl(type_name)
        .ok_or_else(|| format!("error: unknown type name '{type_name}'"))?;
    if dtype == DType::F64 && !source.contains("cl_khr_fp64") {
        return Err(
            "error: use of type 'double' requires cl_khr_fp64 extension to be enabled".into()
        );
    }
    let (_, rest) = rest.split_once("a[gid] ").ok_or("error: expected elementwise expression")?;
    let symbol = rest.chars().next().ok_or("error: expected operator")?;
    let op = BinaryOp::from_symbol(symbol)
        .ok_or_else(|| format!("error: unknown operator '{symbol}'"))?;
    Ok((name.to_string(), dtype, op))
}

fn elementwise<T: Scalar>(op: BinaryOp, a: &[u8], b: &[u8], c: &mut [u8], count: usize) {
    let size = core::mem::size_of::<T>();
    let operands = a.chunks_exact(size).zip(b.chunks_exact(size));
    for ((a, b), c) in operands.zip(c.chunks_exact_mut(size)).take(count) {
        let x = T::from_ne_bytes(a).binary(op, T::from_ne_bytes(b));
        c.copy_from_slice(T::slice_as_bytes(&[x]));
    }
}

impl Backend for DummyBackend {
    fn platforms(&self) -> Result<Vec<PlatformId>, BackendError> {
        self.state().check(Fault::EnumeratePlatforms, ErrorStatus::DeviceEnumeration)?;
        Ok(self.topology.iter().map(|p| p.platform).collect())
    }

    fn platform_info(&self, platform: PlatformId) -> Result<PlatformInfo, BackendError> {
        self.topology
            .iter()
            .find(|p| p.platform == platform)
            .map(|p| p.info.clone())
            .ok_or_else(|| invalid(ErrorStatus::DeviceQuery, "CL_INVALID_PLATFORM"))
    }

    fn devices(&self, platform: PlatformId) -> Result<Vec<DeviceId>, BackendError> {
        self.state().check(Fault::EnumerateDevices, ErrorStatus::DeviceEnumeration)?;
        self.topology
            .iter()
            .find(|p| p.platform == platform)
            .map(|p| p.devices.iter().map(|(id, _)| *id).collect())
            .ok_or_else(|| invalid(ErrorStatus::DeviceEnumeration, "CL_INVALID_PLATFORM"))
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, BackendError> {
        self.find_device(device)
            .cloned()
            .ok_or_else(|| invalid(ErrorStatus::DeviceQuery, "CL_INVALID_DEVICE"))
    }

    fn create_context(&self, device: DeviceId) -> Result<ContextId, BackendError> {
        let mut state = self.state();
        state.check(Fault::CreateContext, ErrorStatus::ContextCreation)?;
        if self.find_device(device).is_none() {
            return Err(invalid(ErrorStatus::ContextCreation, "CL_INVALID_DEVICE"));
        }
        let context = ContextId(state.next_id());
        state.contexts.insert(context, device);
        Ok(context)
    }

    fn release_context(&self, context: ContextId) -> Result<(), BackendError> {
        let mut state = self.state();
        if !state.contexts.contains_key(&context) {
            return Err(invalid(ErrorStatus::Deinitialization, "CL_INVALID_CONTEXT"));
        }
        let dependents = state.context_dependents(context);
        if dependents > 0 {
            return Err(BackendError::new(
                ErrorStatus::Deinitialization,
                format!("CL_INVALID_CONTEXT, {context:?} still has {dependents} dependents"),
            ));
        }
        state.contexts.remove(&context);
        Ok(())
    }

    fn create_queue(&self, context: ContextId, device: DeviceId) -> Result<QueueId, BackendError> {
        let mut state = self.state();
        state.check(Fault::CreateQueue, ErrorStatus::QueueCreation)?;
        match state.contexts.get(&context) {
            None => return Err(invalid(ErrorStatus::QueueCreation, "CL_INVALID_CONTEXT")),
            Some(d) if *d != device => {
                return Err(invalid(ErrorStatus::QueueCreation, "CL_INVALID_DEVICE"))
            }
            Some(_) => {}
        }
        let queue = QueueId(state.next_id());
        state.queues.insert(queue, context);
        Ok(queue)
    }

    fn release_queue(&self, queue: QueueId) -> Result<(), BackendError> {
        self.state()
            .queues
            .remove(&queue)
            .map(|_| ())
            .ok_or_else(|| invalid(ErrorStatus::Deinitialization, "CL_INVALID_COMMAND_QUEUE"))
    }

    fn allocate(
        &self,
        context: ContextId,
        access: AccessMode,
        bytes: usize,
        host: Option<&[u8]>,
    ) -> Result<MemId, BackendError> {
        let _ = access;
        let mut state = self.state();
        state.check(Fault::Allocate, ErrorStatus::MemoryAllocation)?;
        if !state.contexts.contains_key(&context) {
            return Err(invalid(ErrorStatus::MemoryAllocation, "CL_INVALID_CONTEXT"));
        }
        if bytes == 0 {
            return Err(invalid(ErrorStatus::MemoryAllocation, "CL_INVALID_BUFFER_SIZE"));
        }
        let data = match host {
            Some(host) if host.len() != bytes => {
                return Err(invalid(ErrorStatus::MemoryAllocation, "CL_INVALID_HOST_PTR"))
            }
            Some(host) => host.to_vec(),
            None => vec![0; bytes],
        };
        let mem = MemId(state.next_id());
        state.buffers.insert(mem, DummyBuffer { context, data });
        Ok(mem)
    }

    fn release_mem(&self, mem: MemId) -> Result<(), BackendError> {
        self.state()
            .buffers
            .remove(&mem)
            .map(|_| ())
            .ok_or_else(|| invalid(ErrorStatus::Deinitialization, "CL_INVALID_MEM_OBJECT"))
    }

    fn build_program(
        &self,
        context: ContextId,
        device: DeviceId,
        source: &str,
        options: &str,
    ) -> Result<ProgramId, BackendError> {
        let mut state = self.state();
        state.compilations += 1;
        state.check(Fault::Build, ErrorStatus::KernelCompilation)?;
        if state.contexts.get(&context) != Some(&device) {
            return Err(invalid(ErrorStatus::KernelCompilation, "CL_INVALID_DEVICE"));
        }
        let (name, dtype, op) = parse_entry(source).map_err(|log| {
            BackendError::new(
                ErrorStatus::KernelCompilation,
                format!("CL_BUILD_PROGRAM_FAILURE\n{log}"),
            )
        })?;
        log::trace!("Dummy build of {name} with options {options:?}");
        let program = ProgramId(state.next_id());
        state.programs.insert(program, DummyProgram { context, name, dtype, op });
        Ok(program)
    }

    fn release_program(&self, program: ProgramId) -> Result<(), BackendError> {
        let mut state = self.state();
        if !state.programs.contains_key(&program) {
            return Err(invalid(ErrorStatus::Deinitialization, "CL_INVALID_PROGRAM"));
        }
        let kernels = state.kernels.values().filter(|k| k.program == program).count();
        if kernels > 0 {
            return Err(BackendError::new(
                ErrorStatus::Deinitialization,
                format!("CL_INVALID_PROGRAM, {kernels} kernels of {program:?} are still alive"),
            ));
        }
        state.programs.remove(&program);
        Ok(())
    }

    fn create_kernel(&self, program: ProgramId, name: &str) -> Result<KernelId, BackendError> {
        let mut state = self.state();
        state.check(Fault::CreateKernel, ErrorStatus::KernelCompilation)?;
        let Some(entry) = state.programs.get(&program) else {
            return Err(invalid(ErrorStatus::KernelCompilation, "CL_INVALID_PROGRAM"));
        };
        if entry.name != name {
            return Err(invalid(ErrorStatus::KernelCompilation, "CL_INVALID_KERNEL_NAME"));
        }
        let kernel = DummyKernel {
            program,
            dtype: entry.dtype,
            op: entry.op,
            args: [None, None, None, None],
        };
        let id = KernelId(state.next_id());
        state.kernels.insert(id, kernel);
        Ok(id)
    }

    fn release_kernel(&self, kernel: KernelId) -> Result<(), BackendError> {
        self.state()
            .kernels
            .remove(&kernel)
            .map(|_| ())
            .ok_or_else(|| invalid(ErrorStatus::Deinitialization, "CL_INVALID_KERNEL"))
    }

    fn set_arg(
        &self,
        kernel: KernelId,
        index: u32,
        arg: KernelArg<'_>,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.check(Fault::SetArg(index), ErrorStatus::IncorrectKernelArg)?;
        let arg = match arg {
            KernelArg::Mem(mem) if index < 3 => {
                if !state.buffers.contains_key(&mem) {
                    return Err(invalid(ErrorStatus::IncorrectKernelArg, "CL_INVALID_MEM_OBJECT"));
                }
                BoundArg::Mem(mem)
            }
            KernelArg::Scalar(bytes) if index == 3 => {
                if bytes.len() != core::mem::size_of::<u64>() {
                    return Err(invalid(ErrorStatus::IncorrectKernelArg, "CL_INVALID_ARG_SIZE"));
                }
                BoundArg::Scalar(bytes.to_vec())
            }
            _ if index > 3 => {
                return Err(invalid(ErrorStatus::IncorrectKernelArg, "CL_INVALID_ARG_INDEX"))
            }
            _ => return Err(invalid(ErrorStatus::IncorrectKernelArg, "CL_INVALID_ARG_VALUE")),
        };
        let Some(kernel) = state.kernels.get_mut(&kernel) else {
            return Err(invalid(ErrorStatus::IncorrectKernelArg, "CL_INVALID_KERNEL"));
        };
        kernel.args[index as usize] = Some(arg);
        Ok(())
    }

    fn enqueue(
        &self,
        queue: QueueId,
        kernel: KernelId,
        global_work_size: usize,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.check(Fault::Launch, ErrorStatus::KernelLaunch)?;
        if !state.queues.contains_key(&queue) {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_INVALID_COMMAND_QUEUE"));
        }
        if global_work_size == 0 {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_INVALID_GLOBAL_WORK_SIZE"));
        }
        let Some(kernel) = state.kernels.get(&kernel) else {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_INVALID_KERNEL"));
        };
        let (dtype, op) = (kernel.dtype, kernel.op);
        let [
            Some(BoundArg::Mem(a)),
            Some(BoundArg::Mem(b)),
            Some(BoundArg::Mem(c)),
            Some(BoundArg::Scalar(n)),
        ] = kernel.args.clone()
        else {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_INVALID_KERNEL_ARGS"));
        };
        let n = n.try_into().map_or(0, u64::from_ne_bytes);
        let count = usize::try_from(n).unwrap_or(usize::MAX).min(global_work_size);
        let (Some(a), Some(b)) = (state.buffers.get(&a), state.buffers.get(&b)) else {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_INVALID_MEM_OBJECT"));
        };
        let (a, b) = (a.data.clone(), b.data.clone());
        let Some(c) = state.buffers.get_mut(&c) else {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_INVALID_MEM_OBJECT"));
        };
        let bytes = count * dtype.byte_size();
        if a.len() < bytes || b.len() < bytes || c.data.len() < bytes {
            return Err(invalid(ErrorStatus::KernelLaunch, "CL_OUT_OF_RESOURCES"));
        }
        let c = &mut c.data;
        match dtype {
            DType::I8 => elementwise::<i8>(op, &a, &b, c, count),
            DType::I16 => elementwise::<i16>(op, &a, &b, c, count),
            DType::I32 => elementwise::<i32>(op, &a, &b, c, count),
            DType::I64 => elementwise::<i64>(op, &a, &b, c, count),
            DType::U8 => elementwise::<u8>(op, &a, &b, c, count),
            DType::U16 => elementwise::<u16>(op, &a, &b, c, count),
            DType::U32 => elementwise::<u32>(op, &a, &b, c, count),
            DType::U64 => elementwise::<u64>(op, &a, &b, c, count),
            DType::F32 => elementwise::<f32>(op, &a, &b, c, count),
            DType::F64 => elementwise::<f64>(op, &a, &b, c, count),
        }
        state.launches += 1;
        Ok(())
    }

    fn read(&self, queue: QueueId, mem: MemId, dst: &mut [u8]) -> Result<(), BackendError> {
        let state = self.state();
        state.check(Fault::Read, ErrorStatus::MemoryCopyP2H)?;
        if !state.queues.contains_key(&queue) {
            return Err(invalid(ErrorStatus::MemoryCopyP2H, "CL_INVALID_COMMAND_QUEUE"));
        }
        let Some(buffer) = state.buffers.get(&mem) else {
            return Err(invalid(ErrorStatus::MemoryCopyP2H, "CL_INVALID_MEM_OBJECT"));
        };
        let Some(src) = buffer.data.get(..dst.len()) else {
            return Err(invalid(ErrorStatus::MemoryCopyP2H, "CL_INVALID_VALUE"));
        };
        dst.copy_from_slice(src);
        Ok(())
    }

    fn finish(&self, queue: QueueId) -> Result<(), BackendError> {
        if !self.state().queues.contains_key(&queue) {
            return Err(invalid(ErrorStatus::KernelSync, "CL_INVALID_COMMAND_QUEUE"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;

    #[test]
    fn parses_generated_source() {
        let source = generate("mul_float64", "double", '*');
        let (name, dtype, op) = parse_entry(&source).unwrap();
        assert_eq!(name, "mul_float64");
        assert_eq!(dtype, DType::F64);
        assert_eq!(op, BinaryOp::Mul);
    }

    #[test]
    fn rejects_unknown_type() {
        let source = generate("add_half", "half", '+');
        let log = parse_entry(&source).unwrap_err();
        assert!(log.contains("half"));
    }

    #[test]
    fn double_release_fails() {
        let backend = DummyBackend::new(DummyConfig::default());
        let platform = backend.platforms().unwrap()[0];
        let device = backend.devices(platform).unwrap()[0];
        let context = backend.create_context(device).unwrap();
        backend.release_context(context).unwrap();
        assert!(backend.release_context(context).is_err());
        assert_eq!(backend.live().total(), 0);
    }

    #[test]
    fn context_outlives_its_queues_buffers_and_programs() {
        let backend = DummyBackend::new(DummyConfig::default());
        let platform = backend.platforms().unwrap()[0];
        let device = backend.devices(platform).unwrap()[0];
        let context = backend.create_context(device).unwrap();
        let queue = backend.create_queue(context, device).unwrap();
        let mem = backend.allocate(context, AccessMode::ReadWrite, 4, None).unwrap();
        let source = generate("add_int32", "int", '+');
        let program = backend.build_program(context, device, &source, "").unwrap();
        assert!(backend.release_context(context).is_err());
        backend.release_queue(queue).unwrap();
        assert!(backend.release_context(context).is_err());
        backend.release_mem(mem).unwrap();
        assert!(backend.release_context(context).is_err());
        backend.release_program(program).unwrap();
        backend.release_context(context).unwrap();
        assert_eq!(backend.live().total(), 0);
    }

    #[test]
    fn program_outlives_its_kernels() {
        let backend = DummyBackend::new(DummyConfig::default());
        let platform = backend.platforms().unwrap()[0];
        let device = backend.devices(platform).unwrap()[0];
        let context = backend.create_context(device).unwrap();
        let source = generate("sub_float32", "float", '-');
        let program = backend.build_program(context, device, &source, "").unwrap();
        let kernel = backend.create_kernel(program, "sub_float32").unwrap();
        let err = backend.release_program(program).unwrap_err();
        assert_eq!(err.status, ErrorStatus::Deinitialization);
        assert_eq!(backend.live().programs, 1);
        backend.release_kernel(kernel).unwrap();
        backend.release_program(program).unwrap();
        backend.release_context(context).unwrap();
        assert_eq!(backend.live().total(), 0);
    }
}
