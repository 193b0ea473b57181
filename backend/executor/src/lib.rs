//! Subprocess-backed `ScriptExecutor`.

pub mod executor;

pub use executor::{ProcessExecutor, DEFAULT_INTERPRETER};
