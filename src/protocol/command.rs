//! Command definitions
//!
//! A command name plus its flattened argument list.

use bytes::Bytes;

/// A command ready to be encoded
///
/// The name is upper-cased. Keyword arguments are flattened into the
/// argument list as `KEY value`, in the order they were added relative to
/// positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_uppercase(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl IntoArg) -> Self {
        self.args.push(value.into_arg());
        self
    }

    /// Append several positional arguments
    pub fn args<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoArg,
    {
        self.args.extend(values.into_iter().map(IntoArg::into_arg));
        self
    }

    /// Append a keyword argument as `KEY value`
    pub fn kwarg(mut self, key: impl AsRef<str>, value: impl IntoArg) -> Self {
        self.args.push(Bytes::from(key.as_ref().to_uppercase()));
        self.args.push(value.into_arg());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments after the name
    pub fn arguments(&self) -> &[Bytes] {
        &self.args
    }

    /// Number of bulk strings on the wire, the name included
    pub fn argc(&self) -> usize {
        self.args.len() + 1
    }
}

/// Conversion into the raw bytes of one argument
pub trait IntoArg {
    fn into_arg(self) -> Bytes;
}

impl IntoArg for Bytes {
    fn into_arg(self) -> Bytes {
        self
    }
}

impl IntoArg for Vec<u8> {
    fn into_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

impl IntoArg for &[u8] {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl<const N: usize> IntoArg for &[u8; N] {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl IntoArg for String {
    fn into_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

impl IntoArg for &str {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl IntoArg for &String {
    fn into_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

macro_rules! display_arg {
    ($($ty:ty),*) => {
        $(
            impl IntoArg for $ty {
                fn into_arg(self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

display_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
