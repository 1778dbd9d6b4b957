//! Source of elementwise device programs

use std::fmt::Write;

/// Generate program with one entry point `name` computing
/// `c[i] = a[i] symbol b[i]` for every `i < n`.
#[must_use]
pub fn generate(name: &str, type_name: &str, symbol: char) -> String {
    let mut source = String::new();
    if type_name == "double" {
        source += "#pragma OPENCL EXTENSION cl_khr_fp64 : enable\n";
    }
    let t = type_name;
    let _ = writeln!(
        source,
        "__kernel void {name}(__global const {t}* a, __global const {t}* b, \
         __global {t}* c, const ulong n) {{"
    );
    source += "    size_t gid = get_global_id(0);\n";
    source += "    if (gid < n) {\n";
    let _ = writeln!(source, "        c[gid] = a[gid] {symbol} b[gid];");
    source += "    }\n}\n";
    source
}

#[cfg(test)]
mod tests {
    use super::generate;

    #[test]
    fn add_int() {
        let source = generate("add_int32", "int", '+');
        assert_eq!(
            source,
            "__kernel void add_int32(__global const int* a, __global const int* b, \
             __global int* c, const ulong n) {\n    \
             size_t gid = get_global_id(0);\n    \
             if (gid < n) {\n        \
             c[gid] = a[gid] + b[gid];\n    \
             }\n\
             }\n"
        );
    }

    #[test]
    fn double_enables_fp64() {
        let source = generate("div_float64", "double", '/');
        assert!(source.starts_with("#pragma OPENCL EXTENSION cl_khr_fp64 : enable\n"));
        assert!(source.contains("c[gid] = a[gid] / b[gid];"));
        assert!(!generate("div_float32", "float", '/').contains("pragma"));
    }

    #[test]
    fn multi_word_type_names() {
        let source = generate("sub_uint64", "unsigned long", '-');
        assert!(source.contains("__global const unsigned long* a"));
        assert!(source.contains("__global unsigned long* c"));
    }
}
