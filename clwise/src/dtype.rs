use core::fmt::Display;

/// Element types supported by device kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl DType {
    /// All dtypes, in the order they are tagged
    pub const ALL: [DType; 10] = [
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::F32,
        DType::F64,
    ];

    /// Size of one element in bytes
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 => 8,
        }
    }

    /// Type tag used in operation keys and kernel names
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }

    /// Canonical `OpenCL` C type name
    #[must_use]
    pub const fn ocl(self) -> &'static str {
        match self {
            DType::I8 => "char",
            DType::I16 => "short",
            DType::I32 => "int",
            DType::I64 => "long",
            DType::U8 => "unsigned char",
            DType::U16 => "unsigned short",
            DType::U32 => "unsigned int",
            DType::U64 => "unsigned long",
            DType::F32 => "float",
            DType::F64 => "double",
        }
    }

    /// Inverse of [`DType::ocl`]
    #[must_use]
    pub fn from_ocl(name: &str) -> Option<DType> {
        DType::ALL.into_iter().find(|dtype| dtype.ocl() == name)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            DType::I8 => "I8",
            DType::I16 => "I16",
            DType::I32 => "I32",
            DType::I64 => "I64",
            DType::U8 => "U8",
            DType::U16 => "U16",
            DType::U32 => "U32",
            DType::U64 => "U64",
            DType::F32 => "F32",
            DType::F64 => "F64",
        })
    }
}

#[test]
fn ocl_names_round_trip() {
    for dtype in DType::ALL {
        assert_eq!(DType::from_ocl(dtype.ocl()), Some(dtype));
    }
    assert_eq!(DType::from_ocl("long long int"), None);
}

#[test]
fn tags_are_unique() {
    let mut tags: Vec<&str> = DType::ALL.iter().map(|d| d.tag()).collect();
    tags.sort_unstable();
    tags.dedup();
    assert_eq!(tags.len(), DType::ALL.len());
}
