use crate::value::Value;

/// Validate a native function's argument count before touching the
/// arguments, returning early with `LoamError::Arity` on mismatch.
///
/// Takes an exact count, an open minimum, or an inclusive range:
///
/// ```ignore
/// check_arity!("put", args, 2);
/// check_arity!("max", args, 1..);
/// check_arity!("slice", args, 2..=3);
/// ```
#[macro_export]
macro_rules! check_arity {
    ($name:expr, $args:expr, $count:literal) => {
        if $args.len() != $count {
            return Err($crate::LoamError::arity(
                $name,
                format!("exactly {}", $count),
                $args.len(),
            ));
        }
    };
    ($name:expr, $args:expr, $min:literal ..) => {
        if $args.len() < $min {
            return Err($crate::LoamError::arity(
                $name,
                format!("at least {}", $min),
                $args.len(),
            ));
        }
    };
    ($name:expr, $args:expr, $min:literal ..= $max:literal) => {
        if !($min..=$max).contains(&$args.len()) {
            return Err($crate::LoamError::arity(
                $name,
                format!("{} to {}", $min, $max),
                $args.len(),
            ));
        }
    };
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LoamError {
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("No overload of {name} accepts ({arguments})")]
    NoOverloadFound { name: String, arguments: String },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Arity error: {name} expects {expected} args, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Cyclic initialization: {0}")]
    Cycle(String),

    #[error("Unhandled effect: {0}")]
    UnhandledEffect(Value),
}

impl LoamError {
    pub fn compile(msg: impl Into<String>) -> Self {
        LoamError::Compile(msg.into())
    }

    pub fn no_overload(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        LoamError::NoOverloadFound {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        LoamError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        LoamError::Domain(msg.into())
    }

    pub fn arity(name: impl Into<String>, expected: impl Into<String>, got: usize) -> Self {
        LoamError::Arity {
            name: name.into(),
            expected: expected.into(),
            got,
        }
    }

    pub fn cycle(msg: impl Into<String>) -> Self {
        LoamError::Cycle(msg.into())
    }
}
