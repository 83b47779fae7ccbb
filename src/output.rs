//! Text, JSON, and pseudo-JS output formatters. Ported from
//! `output_formatter.py`.

use serde::Serialize;

use crate::disasm::disassemble_bytecode;
use crate::objects::{ConstantPool, ConstantPoolItem, HandlerTable, SharedFunctionInfo};
use crate::reconstruct::reconstruct_js;
use crate::metadata::Metadata;
use crate::scope_flags::ScopeType;

fn format_scope_info(scope: &crate::objects::ScopeInfo, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let scope_type = scope.flags.scope().map(|s| s.name()).unwrap_or("UNKNOWN");
    let lang = match scope.flags.lang_mode() {
        Some(crate::scope_flags::LangMode::Sloppy) => "Sloppy",
        Some(crate::scope_flags::LangMode::Strict) => "Strict",
        None => "?",
    };
    lines.push(format!("{indent}Scope: {scope_type} ({lang})"));

    if !scope.params.is_empty() {
        lines.push(format!("{indent}Parameters ({}): {}", scope.params.len(), scope.params.join(", ")));
    }
    if !scope.stack_locals.is_empty() {
        lines.push(format!(
            "{indent}Stack locals ({}, first_slot={}): {}",
            scope.stack_locals.len(),
            scope.stack_locals_first_slot,
            scope.stack_locals.join(", ")
        ));
    }
    if !scope.context_locals.is_empty() {
        lines.push(format!(
            "{indent}Context locals ({}): {}",
            scope.context_locals.len(),
            scope.context_locals.join(", ")
        ));
    }
    lines
}

fn cp_item_text(item: &Option<ConstantPoolItem>, idx: usize, indent: &str) -> String {
    match item {
        Some(ConstantPoolItem::Str(s)) => format!("{indent}  [{idx}] \"{}\"", &s.chars().take(80).collect::<String>()),
        Some(ConstantPoolItem::Float(f)) => format!("{indent}  [{idx}] {f}"),
        Some(ConstantPoolItem::Int(v)) => format!("{indent}  [{idx}] Smi({v})"),
        Some(ConstantPoolItem::Root(name)) => format!("{indent}  [{idx}] {name}"),
        Some(ConstantPoolItem::Ref(r)) => format!("{indent}  [{idx}] {}", r.name),
        Some(ConstantPoolItem::IntArray(v)) => format!("{indent}  [{idx}] {v:?}"),
        None => format!("{indent}  [{idx}] Unknown"),
    }
}

fn format_constant_pool(cp: &ConstantPool, indent: &str) -> Vec<String> {
    let mut lines = vec![format!("{indent}Constant Pool ({} entries):", cp.items.len())];
    for (i, item) in cp.items.iter().enumerate() {
        lines.push(cp_item_text(item, i, indent));
    }
    lines
}

const HANDLER_PREDICTION_NAMES: &[&str] =
    &["CAUGHT", "UNCAUGHT", "PROMISE", "DESUGARING", "ASYNC_AWAIT", "??", "??", "??"];

fn format_handler_table(ht: &HandlerTable, indent: &str) -> Vec<String> {
    if ht.entries.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("{indent}Handler Table ({} entries):", ht.entries.len())];
    for (i, entry) in ht.entries.iter().enumerate() {
        let pred_name = HANDLER_PREDICTION_NAMES.get(entry.prediction as usize).copied().unwrap_or("?");
        lines.push(format!(
            "{indent}  [{i}] range=[{}, {}) handler=@{:04X} prediction={pred_name} data={}",
            entry.start, entry.end, entry.handler_offset, entry.data
        ));
    }
    lines
}

fn format_bytecode(bc: &crate::objects::BytecodeData, indent: &str) -> Vec<String> {
    let instructions = disassemble_bytecode(&bc.bytecode, bc.constant_pool.as_ref());
    instructions
        .iter()
        .map(|inst| {
            let hex_bytes: String = inst.raw_bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
            let mnemonic_operands = if inst.operands_str.is_empty() {
                inst.mnemonic.clone()
            } else {
                format!("{} {}", inst.mnemonic, inst.operands_str)
            };
            format!("{indent}{:04X}: {:<24} {:<30} {}", inst.offset, hex_bytes, mnemonic_operands, inst.comment)
                .trim_end()
                .to_string()
        })
        .collect()
}

pub fn format_function(sfi: &SharedFunctionInfo, verbose: bool) -> String {
    let mut lines = Vec::new();
    lines.push("=".repeat(70));
    lines.push(format!("Function: {} (id={})", sfi.name, sfi.function_literal_id));
    lines.push("-".repeat(70));
    lines.push(format!("  Formal parameters: {}", sfi.formal_parameter_count));
    lines.push(format!("  Function length: {}", sfi.function_length));
    lines.push(format!("  Start position: {}", sfi.start_position_and_type >> 2));
    lines.push(format!("  End position: {}", sfi.end_position));

    if let Some(bc) = &sfi.bytecode {
        lines.push(format!("  Bytecode length: {}", bc.length));
        lines.push(format!("  Frame size: {}", bc.frame_size));
    }

    if let Some(scope) = &sfi.scope_info {
        lines.extend(format_scope_info(scope, "  "));
    }

    if verbose {
        if let Some(cp) = sfi.bytecode.as_ref().and_then(|b| b.constant_pool.as_ref()) {
            lines.push(String::new());
            lines.extend(format_constant_pool(cp, "  "));
        }
        if let Some(ht) = sfi.bytecode.as_ref().and_then(|b| b.handler_table.as_ref()) {
            lines.push(String::new());
            lines.extend(format_handler_table(ht, "  "));
        }
    }

    if let Some(bc) = &sfi.bytecode {
        lines.push(String::new());
        lines.push("  Bytecode:".to_string());
        lines.extend(format_bytecode(bc, "    "));
    }

    lines.push(String::new());
    lines.join("\n")
}

pub fn format_output(version: &str, bits32: bool, functions: &[SharedFunctionInfo], verbose: bool) -> String {
    let mut lines = vec![
        "V8 JSC Decompiler Output".to_string(),
        "=".repeat(70),
        format!("V8 Version: {version}"),
        format!("Architecture: {}", if bits32 { "32-bit" } else { "64-bit" }),
        format!("Functions found: {}", functions.len()),
        String::new(),
    ];
    for sfi in functions {
        lines.push(format_function(sfi, verbose));
    }
    lines.join("\n")
}

/// `_is_wrapper_function`: filters out the V8/Node.js-internal wrapper
/// functions a `.jsc` snapshot always carries (the top-level script scope,
/// and Node's CommonJS module wrapper) so `--js` output only shows
/// user code.
fn is_wrapper_function(sfi: &SharedFunctionInfo) -> bool {
    if let Some(scope) = &sfi.scope_info {
        if scope.flags.scope() == Some(ScopeType::ScriptScope) {
            return true;
        }
        if scope.params == ["exports", "require", "module", "__filename", "__dirname"] {
            return true;
        }
    }
    false
}

pub fn format_js_output(version: &str, bits32: bool, functions: &[SharedFunctionInfo], filename: &str, metadata: &Metadata) -> String {
    let user_functions: Vec<&SharedFunctionInfo> = functions.iter().filter(|sfi| !is_wrapper_function(sfi)).collect();

    let mut lines = vec![format!("// V8 Version: {version} ({})", if bits32 { "32-bit" } else { "64-bit" })];
    if !filename.is_empty() {
        lines.push(format!("// Decompiled from: {filename}"));
    }
    lines.push(format!("// Functions: {}", user_functions.len()));
    lines.push(String::new());

    for sfi in user_functions {
        let params: Vec<String> = sfi.scope_info.as_ref().map(|s| s.params.clone()).unwrap_or_default();
        lines.push(format!("function {}({}) {{", sfi.name, params.join(", ")));

        if let Some(scope) = &sfi.scope_info {
            let mut locals_list: Vec<String> = Vec::new();
            for l in &scope.stack_locals {
                if !l.is_empty() && l != "empty_string" && !params.contains(l) {
                    let clean = l.replace('.', "_").replace(' ', "_");
                    if !clean.is_empty() && !locals_list.contains(&clean) {
                        locals_list.push(clean);
                    }
                }
            }
            if !locals_list.is_empty() {
                lines.push(format!("    var {};", locals_list.join(", ")));
            }
        }

        let body = reconstruct_js(sfi, metadata);
        if !body.trim().is_empty() {
            lines.push(body);
        }
        lines.push("}".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct JsonCpItem {
    #[serde(rename = "type")]
    kind: &'static str,
    value: serde_json::Value,
}

fn cp_item_json(item: &Option<ConstantPoolItem>) -> JsonCpItem {
    match item {
        Some(ConstantPoolItem::Str(s)) => JsonCpItem { kind: "string", value: serde_json::Value::String(s.clone()) },
        Some(ConstantPoolItem::Float(f)) => JsonCpItem {
            kind: "number",
            value: serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        },
        Some(ConstantPoolItem::Int(v)) => JsonCpItem { kind: "smi", value: serde_json::Value::from(*v) },
        Some(ConstantPoolItem::Root(name)) => JsonCpItem { kind: "object", value: serde_json::Value::String(name.clone()) },
        Some(ConstantPoolItem::Ref(r)) => JsonCpItem { kind: "object", value: serde_json::Value::String(r.name.clone()) },
        Some(ConstantPoolItem::IntArray(v)) => JsonCpItem {
            kind: "object",
            value: serde_json::Value::String(format!("{v:?}")),
        },
        None => JsonCpItem { kind: "unknown", value: serde_json::Value::String("Unknown".to_string()) },
    }
}

#[derive(Debug, Serialize)]
struct JsonBytecodeInst {
    offset: usize,
    mnemonic: String,
    operands: String,
    hex: String,
}

#[derive(Debug, Serialize, Default)]
struct JsonScope {
    #[serde(rename = "type")]
    kind: String,
    params: Vec<String>,
    stack_locals: Vec<String>,
    context_locals: Vec<String>,
}

#[derive(Debug, Serialize, Default)]
struct JsonFunction {
    name: String,
    id: u64,
    formal_parameters: u64,
    function_length: u64,
    start_position: u64,
    end_position: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytecode_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constant_pool: Option<Vec<JsonCpItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytecode: Option<Vec<JsonBytecodeInst>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<JsonScope>,
}

#[derive(Debug, Serialize)]
struct JsonOutput {
    version: String,
    architecture: &'static str,
    functions: Vec<JsonFunction>,
}

pub fn format_json_output(version: &str, bits32: bool, functions: &[SharedFunctionInfo]) -> String {
    let mut out = JsonOutput {
        version: version.to_string(),
        architecture: if bits32 { "32-bit" } else { "64-bit" },
        functions: Vec::new(),
    };

    for sfi in functions {
        let mut func = JsonFunction {
            name: sfi.name.clone(),
            id: sfi.function_literal_id,
            formal_parameters: sfi.formal_parameter_count,
            function_length: sfi.function_length,
            start_position: sfi.start_position_and_type >> 2,
            end_position: sfi.end_position,
            ..Default::default()
        };

        if let Some(bc) = &sfi.bytecode {
            func.bytecode_length = Some(bc.length);
            func.frame_size = Some(bc.frame_size);

            if let Some(cp) = &bc.constant_pool {
                func.constant_pool = Some(cp.items.iter().map(cp_item_json).collect());
            }

            let instructions = disassemble_bytecode(&bc.bytecode, bc.constant_pool.as_ref());
            func.bytecode = Some(
                instructions
                    .iter()
                    .map(|inst| JsonBytecodeInst {
                        offset: inst.offset,
                        mnemonic: inst.mnemonic.clone(),
                        operands: inst.operands_str.clone(),
                        hex: inst.raw_bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" "),
                    })
                    .collect(),
            );
        }

        if let Some(scope) = &sfi.scope_info {
            func.scope = Some(JsonScope {
                kind: scope.flags.scope().map(|s| s.name().to_string()).unwrap_or_else(|| "UNKNOWN".to_string()),
                params: scope.params.clone(),
                stack_locals: scope.stack_locals.clone(),
                context_locals: scope.context_locals.clone(),
            });
        }

        out.functions.push(func);
    }

    serde_json::to_string_pretty(&out).expect("output JSON never fails to serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::SharedFunctionInfo;

    fn empty_sfi(name: &str) -> SharedFunctionInfo {
        SharedFunctionInfo {
            name: name.to_string(),
            identifier: String::new(),
            function_literal_id: 1,
            function_length: 0,
            formal_parameter_count: 0,
            expected_nof_properties: 0,
            start_position_and_type: 0,
            end_position: 0,
            function_token_position: 0,
            compiler_hints: 0,
            scope_info: None,
            outer_scope_info: None,
            bytecode: None,
        }
    }

    #[test]
    fn format_function_includes_name_and_id() {
        let sfi = empty_sfi("foo");
        let out = format_function(&sfi, false);
        assert!(out.contains("Function: foo (id=1)"));
    }

    #[test]
    fn json_output_is_valid_json() {
        let sfi = empty_sfi("bar");
        let out = format_json_output("1.2.3", false, std::slice::from_ref(&sfi));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["functions"][0]["name"], "bar");
    }
}
