//! Elementwise binary operations on device buffers

use crate::{
    backend::{KernelArg, KernelId},
    buffer::DeviceBuffer,
    error::ClwiseError,
    generator::generate,
    kernel_cache::{CompiledOperation, OperationKey},
    scalar::Scalar,
    session::DeviceSession,
};

/// Binary operations with their names and device operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div];

    /// Operation name, used in cache keys and kernel names
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }

    /// Infix operator in device code
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<BinaryOp> {
        BinaryOp::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl DeviceSession {
    /// Enqueue `c[i] = a[i] symbol b[i]` for every element.
    ///
    /// Program is looked up in the session cache under `(name, T::dtype())`
    /// and compiled on miss. Work runs asynchronously until a read
    /// or [`finish`](DeviceSession::finish). `c` may be the same buffer
    /// as `a` or `b` if it is [`ReadWrite`](crate::AccessMode::ReadWrite).
    ///
    /// # Errors
    /// - [`ClwiseError::InvalidSession`] if any buffer belongs to another session
    /// - [`ClwiseError::Permission`] if `a` or `b` is not readable or `c` is not writable
    /// - [`ClwiseError::ShapeMismatch`] if lengths differ
    /// - [`ClwiseError::Compilation`] if program fails to build, or if `name` is cached
    ///   for this element type with another `symbol`
    /// - [`ClwiseError::ArgumentBinding`] if argument can not be set
    /// - [`ClwiseError::Backend`] if launch fails
    #[track_caller]
    pub fn apply<T: Scalar>(
        &self,
        name: &str,
        symbol: char,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        for (arg, buffer) in [("a", a), ("b", b), ("c", c)] {
            if !core::ptr::eq(buffer.session(), self) {
                return Err(ClwiseError::InvalidSession(
                    format!("buffer {arg} of {name} belongs to another session").into(),
                ));
            }
        }
        for (arg, buffer) in [("a", a), ("b", b)] {
            if !buffer.access().can_read() {
                return Err(ClwiseError::permission_error(format!(
                    "input {arg} of {name} is {}, it must be readable",
                    buffer.access()
                )));
            }
        }
        if !c.access().can_write() {
            return Err(ClwiseError::permission_error(format!(
                "output c of {name} is {}, it must be writable",
                c.access()
            )));
        }
        if a.len() != c.len() || b.len() != c.len() {
            return Err(ClwiseError::shape_error(format!(
                "{name} operands have lengths {}, {} and {}, they must be equal",
                a.len(),
                b.len(),
                c.len()
            )));
        }
        let key = OperationKey::new(name, T::dtype());
        let source = || generate(&key.kernel_name(), T::dtype().ocl(), symbol);
        log::trace!("Dispatch {key} on {} elements", c.len());
        if self.config().caching_enabled {
            let mut cache = self.cache();
            let operation = cache.get_or_build(&self.build_target(), key.clone(), symbol, source)?;
            self.launch(operation.kernel(), a, b, c)
        } else {
            let kernel_name = key.kernel_name();
            let operation =
                CompiledOperation::compile(&self.build_target(), &kernel_name, symbol, &source())?;
            self.launch(operation.kernel(), a, b, c)?;
            operation.release()?;
            Ok(())
        }
    }

    /// Enqueue table driven binary operation, see [`DeviceSession::apply`]
    ///
    /// # Errors
    /// Same as [`DeviceSession::apply`].
    #[track_caller]
    pub fn binary<T: Scalar>(
        &self,
        op: BinaryOp,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        self.apply(op.name(), op.symbol(), a, b, c)
    }

    /// `c = a + b`
    ///
    /// # Errors
    /// Same as [`DeviceSession::apply`].
    #[track_caller]
    pub fn add<T: Scalar>(
        &self,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        self.binary(BinaryOp::Add, a, b, c)
    }

    /// `c = a - b`
    ///
    /// # Errors
    /// Same as [`DeviceSession::apply`].
    #[track_caller]
    pub fn sub<T: Scalar>(
        &self,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        self.binary(BinaryOp::Sub, a, b, c)
    }

    /// `c = a * b`
    ///
    /// # Errors
    /// Same as [`DeviceSession::apply`].
    #[track_caller]
    pub fn mul<T: Scalar>(
        &self,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        self.binary(BinaryOp::Mul, a, b, c)
    }

    /// `c = a / b`, integer division by zero is left to the device
    ///
    /// # Errors
    /// Same as [`DeviceSession::apply`].
    #[track_caller]
    pub fn div<T: Scalar>(
        &self,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        self.binary(BinaryOp::Div, a, b, c)
    }

    // Bind a, b, c and element count, then launch one work item per element
    fn launch<T: Scalar>(
        &self,
        kernel: KernelId,
        a: &DeviceBuffer<'_, T>,
        b: &DeviceBuffer<'_, T>,
        c: &DeviceBuffer<'_, T>,
    ) -> Result<(), ClwiseError> {
        // Empty buffers have no memory, there is nothing to launch
        let (Some(a), Some(b), Some(c_mem)) = (a.mem(), b.mem(), c.mem()) else {
            return Ok(());
        };
        let backend = self.backend();
        let count = c.len() as u64;
        let count = count.to_ne_bytes();
        let args = [
            KernelArg::Mem(a),
            KernelArg::Mem(b),
            KernelArg::Mem(c_mem),
            KernelArg::Scalar(&count),
        ];
        for (index, arg) in (0u32..).zip(args) {
            backend
                .set_arg(kernel, index, arg)
                .map_err(|error| ClwiseError::ArgumentBinding { index, error })?;
        }
        backend.enqueue(self.queue(), kernel, c.len())?;
        Ok(())
    }
}

#[test]
fn symbols_round_trip() {
    for op in BinaryOp::ALL {
        assert_eq!(BinaryOp::from_symbol(op.symbol()), Some(op));
    }
    assert_eq!(BinaryOp::from_symbol('%'), None);
}
