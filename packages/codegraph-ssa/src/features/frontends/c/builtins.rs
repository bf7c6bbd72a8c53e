//! libc functions and constants known to the C front-end
//!
//! Each function carries the argument positions it writes through
//! (`strcpy` writes its destination, `scanf` every argument after the
//! format). After a call to one of these, the variable passed at such a
//! position is rebound to a `SideEffect` of the call.

use ahash::AHashMap;
use once_cell::sync::Lazy;

use crate::features::ssa::domain::{Constant, FunctionType, Type};

#[derive(Debug, Clone)]
pub(super) struct LibcFunction {
    pub name: &'static str,
    pub signature: FunctionType,
    /// Positions of output arguments
    pub out: &'static [usize],
    /// Every argument from this position on is an output (`scanf` family)
    pub out_from: Option<usize>,
}

impl LibcFunction {
    pub fn writes(&self, index: usize) -> bool {
        self.out.contains(&index) || self.out_from.is_some_and(|from| index >= from)
    }
}

/// Functions whose call is modeled as a fresh pointer container
pub(super) const ALLOCATORS: &[&str] = &["malloc", "calloc", "realloc"];

pub(super) static CONSTANTS: Lazy<Vec<(&'static str, Constant)>> = Lazy::new(|| {
    vec![
        ("NULL", Constant::Nil),
        ("EOF", Constant::Int(-1)),
        ("BUFSIZ", Constant::Int(8192)),
        ("FOPEN_MAX", Constant::Int(16)),
        ("FILENAME_MAX", Constant::Int(256)),
        ("SEEK_SET", Constant::Int(0)),
        ("SEEK_CUR", Constant::Int(1)),
        ("SEEK_END", Constant::Int(2)),
        ("TMP_MAX", Constant::Int(238328)),
    ]
});

pub(super) static LIBC: Lazy<Vec<LibcFunction>> = Lazy::new(|| {
    let num = || Type::Number;
    let str_ = || Type::pointer(Type::Number);
    let ptr = || Type::pointer(Type::Any);
    let f = |name: &'static str,
             params: Vec<Type>,
             returns: Vec<Type>,
             variadic: bool,
             out: &'static [usize],
             out_from: Option<usize>| LibcFunction {
        name,
        signature: FunctionType {
            params,
            returns,
            variadic,
        },
        out,
        out_from,
    };
    vec![
        // stdio
        f("printf", vec![str_()], vec![num()], true, &[], None),
        f("sprintf", vec![str_(), str_()], vec![num()], true, &[0], None),
        f("snprintf", vec![str_(), num(), str_()], vec![num()], true, &[0], None),
        f("scanf", vec![str_()], vec![num()], true, &[], Some(1)),
        f("sscanf", vec![str_(), str_()], vec![num()], true, &[], Some(2)),
        f("fprintf", vec![ptr(), str_()], vec![num()], true, &[], None),
        f("fscanf", vec![ptr(), str_()], vec![num()], true, &[], Some(2)),
        f("puts", vec![str_()], vec![num()], false, &[], None),
        f("gets", vec![str_()], vec![str_()], false, &[0], None),
        f("fgets", vec![str_(), num(), ptr()], vec![str_()], false, &[0], None),
        f("fputs", vec![str_(), ptr()], vec![num()], false, &[], None),
        f("fread", vec![ptr(), num(), num(), ptr()], vec![num()], false, &[0], None),
        f("fwrite", vec![ptr(), num(), num(), ptr()], vec![num()], false, &[], None),
        f("fopen", vec![str_(), str_()], vec![ptr()], false, &[], None),
        f("fclose", vec![ptr()], vec![num()], false, &[], None),
        f("getchar", vec![], vec![num()], false, &[], None),
        f("putchar", vec![num()], vec![num()], false, &[], None),
        f("perror", vec![str_()], vec![], false, &[], None),
        // string.h
        f("strlen", vec![str_()], vec![num()], false, &[], None),
        f("strcpy", vec![str_(), str_()], vec![str_()], false, &[0], None),
        f("strncpy", vec![str_(), str_(), num()], vec![str_()], false, &[0], None),
        f("strcat", vec![str_(), str_()], vec![str_()], false, &[0], None),
        f("strncat", vec![str_(), str_(), num()], vec![str_()], false, &[0], None),
        f("strcmp", vec![str_(), str_()], vec![num()], false, &[], None),
        f("strncmp", vec![str_(), str_(), num()], vec![num()], false, &[], None),
        f("strchr", vec![str_(), num()], vec![str_()], false, &[], None),
        f("strrchr", vec![str_(), num()], vec![str_()], false, &[], None),
        f("strstr", vec![str_(), str_()], vec![str_()], false, &[], None),
        f("strtok", vec![str_(), str_()], vec![str_()], false, &[], None),
        f("strdup", vec![str_()], vec![str_()], false, &[], None),
        f("memcpy", vec![ptr(), ptr(), num()], vec![ptr()], false, &[0], None),
        f("memmove", vec![ptr(), ptr(), num()], vec![ptr()], false, &[0], None),
        f("memcmp", vec![ptr(), ptr(), num()], vec![num()], false, &[], None),
        f("memset", vec![ptr(), num(), num()], vec![ptr()], false, &[0], None),
        // stdlib.h
        f("malloc", vec![num()], vec![ptr()], false, &[], None),
        f("calloc", vec![num(), num()], vec![ptr()], false, &[], None),
        f("realloc", vec![ptr(), num()], vec![ptr()], false, &[], None),
        f("free", vec![ptr()], vec![], false, &[], None),
        f("abs", vec![num()], vec![num()], false, &[], None),
        f("atoi", vec![str_()], vec![num()], false, &[], None),
        f("atol", vec![str_()], vec![num()], false, &[], None),
        f("atof", vec![str_()], vec![num()], false, &[], None),
        f("strtol", vec![str_(), ptr(), num()], vec![num()], false, &[1], None),
        f("strtod", vec![str_(), ptr()], vec![num()], false, &[1], None),
        f("rand", vec![], vec![num()], false, &[], None),
        f("srand", vec![num()], vec![], false, &[], None),
        f("qsort", vec![ptr(), num(), num(), ptr()], vec![], false, &[0], None),
        f("exit", vec![num()], vec![], false, &[], None),
        f("abort", vec![], vec![], false, &[], None),
        f("getenv", vec![str_()], vec![str_()], false, &[], None),
        f("system", vec![str_()], vec![num()], false, &[], None),
        // POSIX
        f("open", vec![str_(), num()], vec![num()], true, &[], None),
        f("close", vec![num()], vec![num()], false, &[], None),
        f("read", vec![num(), ptr(), num()], vec![num()], false, &[1], None),
        f("write", vec![num(), ptr(), num()], vec![num()], false, &[], None),
        f("pipe", vec![ptr()], vec![num()], false, &[0], None),
        f("stat", vec![str_(), ptr()], vec![num()], false, &[1], None),
        f("fstat", vec![num(), ptr()], vec![num()], false, &[1], None),
        f("time", vec![ptr()], vec![num()], false, &[0], None),
        f("strftime", vec![str_(), num(), str_(), ptr()], vec![num()], false, &[0], None),
        f("sleep", vec![num()], vec![num()], false, &[], None),
    ]
});

static BY_NAME: Lazy<AHashMap<&'static str, &'static LibcFunction>> =
    Lazy::new(|| LIBC.iter().map(|f| (f.name, f)).collect());

pub(super) fn libc(name: &str) -> Option<&'static LibcFunction> {
    BY_NAME.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_positions() {
        let strcpy = libc("strcpy").expect("strcpy");
        assert!(strcpy.writes(0));
        assert!(!strcpy.writes(1));

        let scanf = libc("scanf").expect("scanf");
        assert!(!scanf.writes(0));
        assert!(scanf.writes(1));
        assert!(scanf.writes(4));
    }

    #[test]
    fn test_table_names_are_unique() {
        assert_eq!(BY_NAME.len(), LIBC.len());
        assert!(libc("no_such_function").is_none());
    }
}
