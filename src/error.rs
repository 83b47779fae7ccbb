//! Typed errors surfaced at the CLI boundary. Everything upstream of the
//! CLI (deserializer, object decoders, disassembler, reconstructor) returns
//! `anyhow::Result` and raises these variants via `anyhow::Error::from` so
//! `main` can still match on error kind to pick a message/exit code without
//! threading a bespoke error type through every call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JscError {
    #[error("file too small to be a JSC snapshot ({len} bytes)")]
    Truncated { len: usize },

    #[error("Invalid JSC magic: 0x{0:08X}")]
    BadMagic(u32),

    #[error(
        "This file uses the V8 12.x / Node.js 22+ compiled-code-cache format \
         (magic 0x{0:08X}), which this tool does not support.\n\
         Only the legacy V8 5.x-8.x format (magic 0xC0DE0BEE / 0xC0DE03BE) can \
         be decoded."
    )]
    ModernFormatUnsupported(u32),

    #[error("Wrong JSC byte data: 0x{byte:02X} at pos 0x{pos:X}")]
    BadOpcode { byte: u8, pos: usize },
}
