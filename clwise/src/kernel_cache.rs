//! Compiled operations of one session

use crate::{
    backend::{Backend, ContextId, DeviceId, KernelId, Owned, ProgramId},
    dtype::DType,
    error::{BackendError, ClwiseError},
};
use std::{collections::BTreeMap, sync::Arc};

/// Identifies compiled operation by operation name and element type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationKey {
    name: Box<str>,
    dtype: DType,
}

impl OperationKey {
    #[must_use]
    pub fn new(name: &str, dtype: DType) -> OperationKey {
        OperationKey { name: name.into(), dtype }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.dtype
    }

    /// Name of the device entry point, e.g. `add_int32`
    #[must_use]
    pub fn kernel_name(&self) -> String {
        format!("{}_{}", self.name, self.dtype.tag())
    }
}

impl std::fmt::Display for OperationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}<{}>", self.name, self.dtype))
    }
}

/// Where and how programs get built
#[derive(Debug)]
pub(crate) struct BuildTarget<'a> {
    pub(crate) backend: &'a Arc<dyn Backend>,
    pub(crate) context: ContextId,
    pub(crate) device: DeviceId,
    pub(crate) options: &'a str,
}

/// Program and its kernel entry point
#[derive(Debug)]
pub(crate) struct CompiledOperation {
    // Declared first, kernel must be released before its program
    kernel: Owned<KernelId>,
    program: Owned<ProgramId>,
    // Operator the program was generated with
    symbol: char,
}

impl CompiledOperation {
    pub(crate) fn compile(
        target: &BuildTarget<'_>,
        kernel_name: &str,
        symbol: char,
        source: &str,
    ) -> Result<CompiledOperation, ClwiseError> {
        let compilation_error = |e: BackendError| ClwiseError::Compilation {
            kernel: kernel_name.into(),
            log: e.context,
        };
        let program = target
            .backend
            .build_program(target.context, target.device, source, target.options)
            .map_err(compilation_error)?;
        let program = Owned::new(target.backend.clone(), program);
        let kernel = target
            .backend
            .create_kernel(program.id(), kernel_name)
            .map_err(compilation_error)?;
        let kernel = Owned::new(target.backend.clone(), kernel);
        Ok(CompiledOperation { kernel, program, symbol })
    }

    pub(crate) fn kernel(&self) -> KernelId {
        self.kernel.id()
    }

    /// Release kernel, then program. Both are released even if the first fails.
    pub(crate) fn release(self) -> Result<(), BackendError> {
        let CompiledOperation { kernel, program, .. } = self;
        let kernel = kernel.release();
        let program = program.release();
        kernel.and(program)
    }
}

#[derive(Debug, Default)]
pub(crate) struct KernelCache {
    operations: BTreeMap<OperationKey, CompiledOperation>,
}

impl KernelCache {
    pub(crate) const fn new() -> KernelCache {
        KernelCache { operations: BTreeMap::new() }
    }

    /// Return cached operation, compiling it from `source` on miss.
    /// Failed compilations are not stored.
    ///
    /// A hit compiled with another operator than `symbol` is an error,
    /// the cached program is kept.
    pub(crate) fn get_or_build(
        &mut self,
        target: &BuildTarget<'_>,
        key: OperationKey,
        symbol: char,
        source: impl FnOnce() -> String,
    ) -> Result<&CompiledOperation, ClwiseError> {
        use std::collections::btree_map::Entry;
        match self.operations.entry(key) {
            Entry::Occupied(entry) => {
                let cached = entry.get().symbol;
                if cached != symbol {
                    return Err(ClwiseError::Compilation {
                        kernel: entry.key().kernel_name().into(),
                        log: format!(
                            "{} is cached with operator '{cached}', \
                             it can not be dispatched with '{symbol}'",
                            entry.key()
                        )
                        .into(),
                    });
                }
                log::debug!("Cache hit for {}", entry.key());
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                log::debug!("Cache miss for {}, compiling", entry.key());
                let source = source();
                log::debug!("Generated source:\n{source}");
                let kernel_name = entry.key().kernel_name();
                let operation = CompiledOperation::compile(target, &kernel_name, symbol, &source)?;
                Ok(entry.insert(operation))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.operations.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn contains(&self, key: &OperationKey) -> bool {
        self.operations.contains_key(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &OperationKey> {
        self.operations.keys()
    }

    /// Release every entry, returns first failure
    pub(crate) fn release(&mut self) -> Result<(), BackendError> {
        let mut result = Ok(());
        while let Some((_, operation)) = self.operations.pop_last() {
            if let Err(e) = operation.release() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}
