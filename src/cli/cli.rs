//! `jsc-decompile` binary entry point. Argument surface and pipeline order
//! ported from `jsc_decompiler.py`'s `main`/`_run_legacy_pipeline`.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

use jsc_rs::deser::{peek_magic, peek_version_hash, Deserializer};
use jsc_rs::error::JscError;
use jsc_rs::heap::Bitness;
use jsc_rs::metadata::Metadata;
use jsc_rs::objects::{ScopeCache, SharedFunctionInfo};
use jsc_rs::output::{format_js_output, format_json_output, format_output};
use jsc_rs::version::VersionCatalog;

/// V8 JSC bytecode disassembler (supports legacy V8 5.x-8.x snapshots).
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to .jsc file
    file: PathBuf,

    /// Show constant pools and handler tables
    #[arg(short, long)]
    verbose: bool,

    /// Output in JSON format
    #[arg(short = 'j', long)]
    json: bool,

    /// Output raw disassembly instead of reconstructed JavaScript
    #[arg(long)]
    disasm: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let js_mode = !(args.json || args.disasm);

    let data = fs::read(&args.file).map_err(|e| anyhow!("failed to read {}: {e}", args.file.display()))?;
    if data.len() < 8 {
        return Err(JscError::Truncated { len: data.len() }.into());
    }

    let magic = peek_magic(&data)?;
    if jsc_rs::deser::MAGIC_MODERN == magic {
        return Err(JscError::ModernFormatUnsupported(magic).into());
    }
    if !jsc_rs::deser::MAGIC_LEGACY.contains(&magic) {
        return Err(JscError::BadMagic(magic).into());
    }

    let version_hash = peek_version_hash(&data)?;
    let catalog = VersionCatalog::load();
    let version = catalog.detect_version(version_hash);
    let is_32bit = catalog.detect_bitness(version_hash).unwrap_or_else(|| {
        if !args.quiet {
            eprintln!("Warning: Unknown version hash 0x{version_hash:08X}, assuming 64-bit");
        }
        false
    });
    let bitness = if is_32bit { Bitness::Bits32 } else { Bitness::Bits64 };

    let filename = args.file.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();

    if !args.quiet && !args.json {
        eprintln!("Parsing {filename}...");
        eprintln!("V8 Version: {version} ({})", if is_32bit { "32-bit" } else { "64-bit" });
    }

    let metadata = Metadata::load();
    let mut deserializer = Deserializer::new(&data, bitness, &metadata);
    let func_objects = deserializer.parse().map_err(|e| {
        eprintln!("Error parsing JSC file: {e}");
        e
    })?;

    if func_objects.is_empty() {
        if !args.quiet {
            eprintln!("No functions found in JSC file.");
        }
        return Ok(());
    }

    if !args.quiet && !args.json {
        eprintln!("Converting {} function objects...", func_objects.len());
    }

    let ps = bitness.pointer_size();
    let mut scope_cache: ScopeCache = ScopeCache::new();
    let functions: Vec<SharedFunctionInfo> = func_objects
        .iter()
        .map(|obj| SharedFunctionInfo::new(obj, ps, &mut scope_cache))
        .collect();

    if !args.quiet && !args.json && !js_mode {
        eprintln!("Extracted {} functions.", functions.len());
    }

    if args.json {
        println!("{}", format_json_output(version, is_32bit, &functions));
    } else if js_mode {
        println!("{}", format_js_output(version, is_32bit, &functions, &filename, &metadata));
    } else {
        println!("{}", format_output(version, is_32bit, &functions, args.verbose));
    }

    Ok(())
}
