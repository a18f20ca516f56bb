mod compile;
mod lower;

pub use compile::{compile, Compiler};
pub use lower::lower;

#[cfg(test)]
mod tests;
