#![forbid(unsafe_code)]

//! Library half of `jsc-rs`: deserializes legacy V8 `.jsc` compiled-code
//! caches, decodes the embedded `SharedFunctionInfo`/`ScopeInfo`/bytecode
//! object graph, disassembles Ignition bytecode, and reconstructs
//! approximate JavaScript source. See `src/cli/cli.rs` for the binary.

pub mod deser;
pub mod disasm;
pub mod error;
pub mod heap;
pub mod metadata;
pub mod objects;
pub mod output;
pub mod reader;
pub mod reconstruct;
pub mod scope_flags;
pub mod version;
