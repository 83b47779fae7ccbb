//! Pseudo-JavaScript reconstructor: walks disassembled bytecode and
//! produces approximate JS source using a symbolic accumulator/register
//! simulator. Ported from `reconstructor.py`.
//!
//! `reconstructor.py` calls several operand-extraction helpers
//! (`_parse_operands`, `_get_imm`, `_get_idx`, `_get_reg`, `_get_two_regs`,
//! `_get_second_reg`, `_get_flag8`, `_is_valid_identifier`,
//! `_jump_condition`) that are referenced but never defined anywhere in
//! the retrieved source. They're reconstructed here from call-site usage
//! (operand order, bracket/hash token shapes in the disassembler's
//! rendered operand strings).

use std::collections::{HashMap, HashSet};

use crate::disasm::{disassemble_bytecode, Instruction};
use crate::metadata::Metadata;
use crate::objects::{ConstantPool, ConstantPoolItem, SharedFunctionInfo};

const P_COND: i32 = 4;
const P_OR: i32 = 6;
const P_XOR: i32 = 7;
const P_AND: i32 = 8;
const P_EQ: i32 = 9;
const P_REL: i32 = 10;
const P_SHIFT: i32 = 11;
const P_ADD: i32 = 12;
const P_MUL: i32 = 13;
const P_EXP: i32 = 14;
const P_ATOM: i32 = 100;

fn right_assoc_safe(op: &str) -> bool {
    matches!(op, "+" | "*" | "|" | "&" | "^")
}

/// V8 12.4 renamed several opcodes; map the new name back to the old
/// handler name so a single dispatch chain understands both bytecode
/// vintages.
fn opcode_alias(base: &str) -> &str {
    match base {
        "GetNamedProperty" => "LdaNamedProperty",
        "GetKeyedProperty" => "LdaKeyedProperty",
        "GetNamedPropertyFromSuper" => "LdaNamedProperty",
        "GetEnumeratedKeyedProperty" => "LdaKeyedProperty",
        "SetNamedProperty" => "StaNamedPropertySloppy",
        "DefineNamedOwnProperty" => "StaNamedOwnProperty",
        "SetKeyedProperty" => "StaKeyedPropertySloppy",
        "DefineKeyedOwnProperty" => "StaKeyedPropertySloppy",
        "DefineKeyedOwnPropertyInLiteral" => "StaDataPropertyInLiteral",
        "StaGlobal" => "StaGlobalSloppy",
        other => other,
    }
}

const CALL_OPCODES: &[&str] = &[
    "CallProperty0",
    "CallProperty1",
    "CallProperty2",
    "CallProperty",
    "CallAnyReceiver",
    "CallUndefinedReceiver0",
    "CallUndefinedReceiver1",
    "CallUndefinedReceiver2",
    "CallUndefinedReceiver",
    "CallWithSpread",
    "CallRuntime",
    "CallJSRuntime",
    "InvokeIntrinsic",
    "Construct",
    "ConstructWithSpread",
];

fn wrap_left(acc: &str, acc_prec: i32, op_prec: i32) -> String {
    if acc_prec < op_prec {
        format!("({acc})")
    } else {
        acc.to_string()
    }
}

fn wrap_right(acc: &str, acc_prec: i32, op_prec: i32, op_str: &str) -> String {
    if acc_prec < op_prec {
        format!("({acc})")
    } else if acc_prec == op_prec && !right_assoc_safe(op_str) {
        format!("({acc})")
    } else {
        acc.to_string()
    }
}

fn is_register_token(tok: &str) -> bool {
    if tok == "_closure" || tok == "_context" {
        return true;
    }
    let mut chars = tok.chars();
    match chars.next() {
        Some('a') | Some('r') => chars.as_str().chars().all(|c| c.is_ascii_digit()) && !chars.as_str().is_empty(),
        _ => false,
    }
}

fn bracket_value(tok: &str) -> Option<i64> {
    let inner = tok.strip_prefix('[')?.strip_suffix(']')?;
    inner.parse().ok()
}

fn hash_value(tok: &str) -> Option<i64> {
    tok.strip_prefix('#')?.parse().ok()
}

fn parse_operands(operands_str: &str) -> Vec<String> {
    operands_str.split_whitespace().map(|s| s.to_string()).collect()
}

fn get_reg(ops: &[String]) -> String {
    ops.iter().find(|t| is_register_token(t)).cloned().unwrap_or_else(|| "?".to_string())
}

fn get_two_regs(ops: &[String]) -> (String, String) {
    let mut it = ops.iter().filter(|t| is_register_token(t));
    let a = it.next().cloned().unwrap_or_else(|| "?".to_string());
    let b = it.next().cloned().unwrap_or_else(|| "?".to_string());
    (a, b)
}

fn get_second_reg(ops: &[String]) -> String {
    let mut it = ops.iter().filter(|t| is_register_token(t));
    it.next();
    it.next().cloned().unwrap_or_else(|| "?".to_string())
}

fn get_idx(ops: &[String]) -> i64 {
    ops.iter().find_map(|t| bracket_value(t)).unwrap_or(0)
}

fn get_imm(ops: &[String]) -> i64 {
    get_idx(ops)
}

fn get_flag8(ops: &[String]) -> i64 {
    ops.iter().find_map(|t| hash_value(t)).unwrap_or(0)
}

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    !s.is_empty() && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn jump_condition(base: &str, acc: &str) -> String {
    match base {
        "JumpIfTrue" | "JumpIfToBooleanTrue" => acc.to_string(),
        "JumpIfFalse" | "JumpIfToBooleanFalse" => format!("!{acc}"),
        "JumpIfNull" => format!("{acc} === null"),
        "JumpIfNotNull" => format!("{acc} !== null"),
        "JumpIfUndefined" => format!("{acc} === undefined"),
        "JumpIfNotUndefined" => format!("{acc} !== undefined"),
        "JumpIfJSReceiver" => format!("typeof {acc} === \"object\""),
        _ => acc.to_string(),
    }
}

fn jump_target(comment: &str) -> Option<usize> {
    let rest = comment.split("-> @").nth(1)?;
    usize::from_str_radix(&rest[..4.min(rest.len())], 16).ok()
}

fn cp_value_str(idx: i64, cp: Option<&ConstantPool>) -> String {
    let idx = idx.max(0) as usize;
    let Some(cp) = cp else {
        return format!("cp[{idx}]");
    };
    match cp.items.get(idx).and_then(|i| i.as_ref()) {
        Some(ConstantPoolItem::Str(s)) => format!("\"{}\"", s.replace('"', "\\\"")),
        Some(ConstantPoolItem::Float(f)) => f.to_string(),
        Some(ConstantPoolItem::Int(v)) => v.to_string(),
        Some(ConstantPoolItem::Root(name)) => {
            if name == "empty_string" {
                "\"\"".to_string()
            } else {
                name.clone()
            }
        }
        Some(ConstantPoolItem::Ref(r)) => {
            if r.name.contains("closure") {
                r.name.clone()
            } else {
                r.type_name.clone()
            }
        }
        Some(ConstantPoolItem::IntArray(v)) => format!("{v:?}"),
        None => format!("cp[{idx}]"),
    }
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches('"').to_string()
}

/// `_reg_to_name`: resolves `a0`/`r0`-style register names to a source
/// variable name when scope info names the slot, honoring V8's reversed
/// parameter-register order.
fn reg_to_name(reg: &str, params: &[String], stack_locals: &[String], stack_first_slot: i64) -> String {
    if reg == "<this>" {
        return "this".to_string();
    }
    if reg == "<closure>" || reg == "<context>" {
        return reg.to_string();
    }
    if let Some(rest) = reg.strip_prefix('a') {
        if let Ok(idx) = rest.parse::<i64>() {
            let rev_idx = params.len() as i64 - 1 - idx;
            if rev_idx >= 0 && (rev_idx as usize) < params.len() {
                return params[rev_idx as usize].clone();
            }
        }
    } else if let Some(rest) = reg.strip_prefix('r') {
        if let Ok(idx) = rest.parse::<i64>() {
            let slot = idx - stack_first_slot;
            if slot >= 0 && (slot as usize) < stack_locals.len() {
                let name = &stack_locals[slot as usize];
                if !name.is_empty() && name != "empty_string" {
                    return name.replace('.', "_").replace(' ', "_");
                }
            }
        }
    }
    reg.to_string()
}

/// `_parse_reg_range_args`: expands a rendered register-range operand
/// (`r0-_context(3)` or `r1-r4`) into the symbolic value of each register
/// in the range.
fn parse_reg_range_args(range_str: &str, get_reg: &mut dyn FnMut(&str) -> String) -> Vec<String> {
    let range_str = range_str.trim_end_matches(',');
    let prefix_start = {
        let mut chars = range_str.chars();
        match chars.next() {
            Some(p @ ('a' | 'r')) => {
                let digits: String = chars.take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<i64>().ok().map(|n| (p, n))
            }
            _ => None,
        }
    };
    let Some((prefix, start_idx)) = prefix_start else {
        return Vec::new();
    };

    if let Some(dash) = range_str.find('-') {
        let tail = &range_str[dash + 1..];
        let mut tail_chars = tail.chars();
        if let Some(p2) = tail_chars.next() {
            if p2 == 'a' || p2 == 'r' {
                let digits: String = tail_chars.take_while(|c| c.is_ascii_digit()).collect();
                let after = &tail[1 + digits.len()..];
                if after.is_empty() {
                    if let Ok(end_idx) = digits.parse::<i64>() {
                        let count = end_idx - start_idx + 1;
                        return (0..count).map(|i| get_reg(&format!("{prefix}{}", start_idx + i))).collect();
                    }
                }
            }
        }
    }

    if let Some(open) = range_str.find('(') {
        if let Some(close) = range_str[open..].find(')') {
            if let Ok(count) = range_str[open + 1..open + close].parse::<i64>() {
                return (0..count).map(|i| get_reg(&format!("{prefix}{}", start_idx + i))).collect();
            }
        }
    }

    vec![get_reg(&format!("{prefix}{start_idx}"))]
}

/// `reconstruct_js`: produces an approximate JavaScript rendering of a
/// `SharedFunctionInfo`'s bytecode.
pub fn reconstruct_js(sfi: &SharedFunctionInfo, metadata: &Metadata) -> String {
    let Some(bc) = &sfi.bytecode else {
        return format!("// No bytecode available for {}\n", sfi.name);
    };
    let cp = bc.constant_pool.as_ref();
    let ht = bc.handler_table.as_ref();

    let (params, stack_locals, stack_first_slot, context_locals) = match &sfi.scope_info {
        Some(scope) => (
            scope.params.clone(),
            scope.stack_locals.clone(),
            scope.stack_locals_first_slot as i64,
            scope.context_locals.clone(),
        ),
        None => (Vec::new(), Vec::new(), 0, Vec::new()),
    };

    let instructions = disassemble_bytecode(&bc.bytecode, cp);

    let mut jump_targets = HashSet::new();
    for inst in &instructions {
        if inst.comment.contains("-> @") {
            if let Some(t) = jump_target(&inst.comment) {
                jump_targets.insert(t);
            }
        }
    }

    let mut acc = "undefined".to_string();
    let mut acc_prec = P_ATOM;
    let mut regs: HashMap<String, String> = HashMap::new();

    let mut lines: Vec<String> = Vec::new();
    let mut indent = "    ".to_string();

    let mut try_starts = HashSet::new();
    let mut try_ends = HashSet::new();
    let mut handler_offsets = HashSet::new();
    if let Some(ht) = ht {
        for entry in &ht.entries {
            try_starts.insert(entry.start);
            try_ends.insert(entry.end);
            handler_offsets.insert(entry.handler_offset);
        }
    }

    for (inst_idx, inst) in instructions.iter().enumerate() {
        let Instruction { offset, mnemonic, operands_str, comment, .. } = inst;
        let comment = comment.clone();
        let base_owned = mnemonic.rsplit('.').next().unwrap_or(mnemonic).to_string();
        let mut base: &str = &base_owned;

        if base.starts_with("Star") && base.len() > 4 && base[4..].chars().all(|c| c.is_ascii_digit()) {
            let reg_num: i64 = base[4..].parse().unwrap_or(0);
            let reg = format!("r{reg_num}");
            let name = reg_to_name(&reg, &params, &stack_locals, stack_first_slot);
            let is_raw = is_register_token(&name);
            let val = if is_raw && acc_prec < P_ATOM { format!("({acc})") } else { acc.clone() };
            regs.insert(name.clone(), val);
            if !is_raw {
                lines.push(format!("{indent}{name} = {acc};"));
                regs.insert(name.clone(), name.clone());
            }
            acc = name;
            acc_prec = P_ATOM;
            continue;
        }

        let aliased = opcode_alias(base).to_string();
        base = &aliased;

        let ops = parse_operands(operands_str);

        if jump_targets.contains(offset) {
            lines.push(String::new());
        }
        if try_starts.contains(offset) {
            lines.push(format!("{indent}try {{"));
            indent = "        ".to_string();
        }
        if try_ends.contains(offset) {
            indent = "    ".to_string();
            lines.push(format!("{indent}}} catch (e) {{"));
            indent = "        ".to_string();
        }
        if handler_offsets.contains(offset) {
            indent = "    ".to_string();
            lines.push(format!("{indent}}}"));
        }

        if base == "StackCheck" {
            continue;
        }

        let mut get_reg_val = |r: &str, regs: &HashMap<String, String>| -> String {
            let name = reg_to_name(r, &params, &stack_locals, stack_first_slot);
            regs.get(&name).cloned().unwrap_or(name)
        };

        match base {
            "LdaZero" => {
                acc = "0".to_string();
                acc_prec = P_ATOM;
            }
            "LdaSmi" => {
                acc = get_imm(&ops).to_string();
                acc_prec = P_ATOM;
            }
            "LdaUndefined" => {
                acc = "undefined".to_string();
                acc_prec = P_ATOM;
            }
            "LdaNull" => {
                acc = "null".to_string();
                acc_prec = P_ATOM;
            }
            "LdaTheHole" => {
                acc = "undefined /* TheHole */".to_string();
                acc_prec = P_ATOM;
            }
            "LdaTrue" => {
                acc = "true".to_string();
                acc_prec = P_ATOM;
            }
            "LdaFalse" => {
                acc = "false".to_string();
                acc_prec = P_ATOM;
            }
            "LdaConstant" => {
                acc = cp_value_str(get_idx(&ops), cp);
                acc_prec = P_ATOM;
            }
            "Ldar" => {
                let reg = get_reg(&ops);
                acc = get_reg_val(&reg, &regs);
                acc_prec = P_ATOM;
            }
            "Star" => {
                let reg = get_reg(&ops);
                let name = reg_to_name(&reg, &params, &stack_locals, stack_first_slot);
                let is_raw = is_register_token(&name);
                if is_raw && acc_prec < P_ATOM {
                    regs.insert(name.clone(), format!("({acc})"));
                } else {
                    regs.insert(name.clone(), acc.clone());
                }
                if !is_raw {
                    lines.push(format!("{indent}{name} = {acc};"));
                    regs.insert(name.clone(), name.clone());
                }
                acc = name;
                acc_prec = P_ATOM;
            }
            "Mov" => {
                let (src_r, dst_r) = get_two_regs(&ops);
                let val = get_reg_val(&src_r, &regs);
                let name = reg_to_name(&dst_r, &params, &stack_locals, stack_first_slot);
                regs.insert(name.clone(), val.clone());
                if !is_register_token(&name) {
                    lines.push(format!("{indent}{name} = {val};"));
                    regs.insert(name.clone(), name.clone());
                }
            }
            "LdaGlobal" | "LdaGlobalInsideTypeof" => {
                acc = strip_quotes(&cp_value_str(get_idx(&ops), cp));
                acc_prec = P_ATOM;
            }
            "StaGlobalSloppy" | "StaGlobalStrict" => {
                let gname = strip_quotes(&cp_value_str(get_idx(&ops), cp));
                lines.push(format!("{indent}{gname} = {acc};"));
            }
            "LdaContextSlot" | "LdaImmutableContextSlot" | "LdaCurrentContextSlot" | "LdaImmutableCurrentContextSlot" => {
                let idx = get_idx(&ops) as usize;
                acc = match context_locals.get(idx) {
                    Some(n) if !n.is_empty() => n.clone(),
                    _ => format!("ctx[{idx}]"),
                };
                acc_prec = P_ATOM;
            }
            "StaContextSlot" | "StaCurrentContextSlot" | "StaScriptContextSlot" | "StaCurrentScriptContextSlot" => {
                let idx = get_idx(&ops) as usize;
                match context_locals.get(idx) {
                    Some(n) if !n.is_empty() => lines.push(format!("{indent}{n} = {acc};")),
                    _ => lines.push(format!("{indent}ctx[{idx}] = {acc};")),
                }
            }
            "Add" => {
                let reg = get_reg(&ops);
                acc = format!("{} + {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_ADD, "+"));
                acc_prec = P_ADD;
            }
            "Sub" => {
                let reg = get_reg(&ops);
                acc = format!("{} - {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_ADD, "-"));
                acc_prec = P_ADD;
            }
            "Mul" => {
                let reg = get_reg(&ops);
                acc = format!("{} * {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_MUL, "*"));
                acc_prec = P_MUL;
            }
            "Div" => {
                let reg = get_reg(&ops);
                acc = format!("{} / {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_MUL, "/"));
                acc_prec = P_MUL;
            }
            "Mod" => {
                let reg = get_reg(&ops);
                acc = format!("{} % {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_MUL, "%"));
                acc_prec = P_MUL;
            }
            "Exp" => {
                let reg = get_reg(&ops);
                acc = format!("{} ** {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_EXP, "**"));
                acc_prec = P_EXP;
            }
            "AddSmi" => {
                acc = format!("{} + {}", wrap_left(&acc, acc_prec, P_ADD), get_imm(&ops));
                acc_prec = P_ADD;
            }
            "SubSmi" => {
                acc = format!("{} - {}", wrap_left(&acc, acc_prec, P_ADD), get_imm(&ops));
                acc_prec = P_ADD;
            }
            "MulSmi" => {
                acc = format!("{} * {}", wrap_left(&acc, acc_prec, P_MUL), get_imm(&ops));
                acc_prec = P_MUL;
            }
            "DivSmi" => {
                acc = format!("{} / {}", wrap_left(&acc, acc_prec, P_MUL), get_imm(&ops));
                acc_prec = P_MUL;
            }
            "ModSmi" => {
                acc = format!("{} % {}", wrap_left(&acc, acc_prec, P_MUL), get_imm(&ops));
                acc_prec = P_MUL;
            }
            "ExpSmi" => {
                acc = format!("{} ** {}", wrap_left(&acc, acc_prec, P_EXP), get_imm(&ops));
                acc_prec = P_EXP;
            }
            "BitwiseOr" => {
                let reg = get_reg(&ops);
                acc = format!("{} | {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_OR, "|"));
                acc_prec = P_OR;
            }
            "BitwiseXor" => {
                let reg = get_reg(&ops);
                acc = format!("{} ^ {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_XOR, "^"));
                acc_prec = P_XOR;
            }
            "BitwiseAnd" => {
                let reg = get_reg(&ops);
                acc = format!("{} & {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_AND, "&"));
                acc_prec = P_AND;
            }
            "ShiftLeft" => {
                let reg = get_reg(&ops);
                acc = format!("{} << {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_SHIFT, "<<"));
                acc_prec = P_SHIFT;
            }
            "ShiftRight" => {
                let reg = get_reg(&ops);
                acc = format!("{} >> {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_SHIFT, ">>"));
                acc_prec = P_SHIFT;
            }
            "ShiftRightLogical" => {
                let reg = get_reg(&ops);
                acc = format!("{} >>> {}", get_reg_val(&reg, &regs), wrap_right(&acc, acc_prec, P_SHIFT, ">>>"));
                acc_prec = P_SHIFT;
            }
            "BitwiseOrSmi" => {
                acc = format!("{} | {}", wrap_left(&acc, acc_prec, P_OR), get_imm(&ops));
                acc_prec = P_OR;
            }
            "BitwiseXorSmi" => {
                acc = format!("{} ^ {}", wrap_left(&acc, acc_prec, P_XOR), get_imm(&ops));
                acc_prec = P_XOR;
            }
            "BitwiseAndSmi" => {
                acc = format!("{} & {}", wrap_left(&acc, acc_prec, P_AND), get_imm(&ops));
                acc_prec = P_AND;
            }
            "ShiftLeftSmi" => {
                acc = format!("{} << {}", wrap_left(&acc, acc_prec, P_SHIFT), get_imm(&ops));
                acc_prec = P_SHIFT;
            }
            "ShiftRightSmi" => {
                acc = format!("{} >> {}", wrap_left(&acc, acc_prec, P_SHIFT), get_imm(&ops));
                acc_prec = P_SHIFT;
            }
            "ShiftRightLogicalSmi" => {
                acc = format!("{} >>> {}", wrap_left(&acc, acc_prec, P_SHIFT), get_imm(&ops));
                acc_prec = P_SHIFT;
            }
            "Inc" => {
                acc = format!("{} + 1", wrap_left(&acc, acc_prec, P_ADD));
                acc_prec = P_ADD;
            }
            "Dec" => {
                acc = format!("{} - 1", wrap_left(&acc, acc_prec, P_ADD));
                acc_prec = P_ADD;
            }
            "ToBooleanLogicalNot" | "LogicalNot" => {
                acc = if acc_prec < P_ATOM { format!("!({acc})") } else { format!("!{acc}") };
                acc_prec = P_ATOM;
            }
            "TypeOf" => {
                acc = format!("typeof {acc}");
                acc_prec = P_ATOM;
            }
            "Negate" => {
                acc = format!("-{}", wrap_left(&acc, acc_prec, P_ATOM));
                acc_prec = P_ATOM;
            }
            "BitwiseNot" => {
                acc = format!("~{}", wrap_left(&acc, acc_prec, P_ATOM));
                acc_prec = P_ATOM;
            }
            "DeletePropertyStrict" | "DeletePropertySloppy" => {
                let reg = get_reg(&ops);
                let key = acc.clone();
                let obj = get_reg_val(&reg, &regs);
                if key.starts_with('"') && key.ends_with('"') && is_valid_identifier(key.trim_matches('"')) {
                    acc = format!("delete {obj}.{}", key.trim_matches('"'));
                } else {
                    acc = format!("delete {obj}[{key}]");
                }
                acc_prec = P_ATOM;
                lines.push(format!("{indent}{acc};"));
            }
            "TestEqual" => {
                let reg = get_reg(&ops);
                acc = format!("{} == {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_EQ;
            }
            "TestEqualStrict" | "TestEqualStrictNoFeedback" => {
                let reg = get_reg(&ops);
                acc = format!("{} === {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_EQ;
            }
            "TestLessThan" => {
                let reg = get_reg(&ops);
                acc = format!("{} < {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_REL;
            }
            "TestGreaterThan" => {
                let reg = get_reg(&ops);
                acc = format!("{} > {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_REL;
            }
            "TestLessThanOrEqual" => {
                let reg = get_reg(&ops);
                acc = format!("{} <= {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_REL;
            }
            "TestGreaterThanOrEqual" => {
                let reg = get_reg(&ops);
                acc = format!("{} >= {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_REL;
            }
            "TestInstanceOf" => {
                let reg = get_reg(&ops);
                acc = format!("{} instanceof {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_REL;
            }
            "TestIn" => {
                let reg = get_reg(&ops);
                acc = format!("{} in {}", get_reg_val(&reg, &regs), acc);
                acc_prec = P_REL;
            }
            "TestUndetectable" => {
                acc = format!("{acc} == null");
                acc_prec = P_EQ;
            }
            "TestNull" => {
                acc = format!("{acc} === null");
                acc_prec = P_EQ;
            }
            "TestUndefined" => {
                acc = format!("{acc} === undefined");
                acc_prec = P_EQ;
            }
            "TestTypeOf" => {
                let flag = get_flag8(&ops) as usize;
                acc = match crate::disasm::TYPEOF_LITERALS.get(flag) {
                    Some(lit) => format!("typeof {acc} === \"{lit}\""),
                    None => format!("typeof {acc} === ?"),
                };
                acc_prec = P_EQ;
            }
            "LdaNamedProperty" => {
                let reg = get_reg(&ops);
                let prop = strip_quotes(&cp_value_str(get_idx(&ops), cp));
                let obj_name = get_reg_val(&reg, &regs);
                acc = if is_valid_identifier(&prop) {
                    format!("{obj_name}.{prop}")
                } else {
                    format!("{obj_name}[\"{prop}\"]")
                };
                acc_prec = P_ATOM;
            }
            "LdaKeyedProperty" => {
                let reg = get_reg(&ops);
                acc = format!("{}[{}]", get_reg_val(&reg, &regs), acc);
                acc_prec = P_ATOM;
            }
            "StaNamedPropertySloppy" | "StaNamedPropertyStrict" | "StaNamedOwnProperty" => {
                let reg = get_reg(&ops);
                let prop = strip_quotes(&cp_value_str(get_idx(&ops), cp));
                let obj_name = get_reg_val(&reg, &regs);
                if is_valid_identifier(&prop) {
                    lines.push(format!("{indent}{obj_name}.{prop} = {acc};"));
                } else {
                    lines.push(format!("{indent}{obj_name}[\"{prop}\"] = {acc};"));
                }
            }
            "StaKeyedPropertySloppy" | "StaKeyedPropertyStrict" => {
                let reg = get_reg(&ops);
                let key_reg = get_second_reg(&ops);
                lines.push(format!(
                    "{indent}{}[{}] = {acc};",
                    get_reg_val(&reg, &regs),
                    get_reg_val(&key_reg, &regs)
                ));
            }
            "CallProperty0" | "CallUndefinedReceiver0" => {
                let reg = get_reg(&ops);
                acc = format!("{}()", get_reg_val(&reg, &regs));
                acc_prec = P_ATOM;
            }
            "CallProperty1" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let callable_r = parts.first().copied().unwrap_or("?");
                let arg1_r = parts.get(2).copied().unwrap_or("?");
                acc = format!("{}({})", get_reg_val(callable_r, &regs), get_reg_val(arg1_r, &regs));
                acc_prec = P_ATOM;
            }
            "CallProperty2" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let callable_r = parts.first().copied().unwrap_or("?");
                let arg1_r = parts.get(2).copied().unwrap_or("?");
                let arg2_r = parts.get(3).copied().unwrap_or("?");
                acc = format!(
                    "{}({}, {})",
                    get_reg_val(callable_r, &regs),
                    get_reg_val(arg1_r, &regs),
                    get_reg_val(arg2_r, &regs)
                );
                acc_prec = P_ATOM;
            }
            "CallUndefinedReceiver1" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let callable_r = parts.first().copied().unwrap_or("?");
                let arg1_r = parts.get(1).copied().unwrap_or("?");
                acc = format!("{}({})", get_reg_val(callable_r, &regs), get_reg_val(arg1_r, &regs));
                acc_prec = P_ATOM;
            }
            "CallUndefinedReceiver2" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let callable_r = parts.first().copied().unwrap_or("?");
                let arg1_r = parts.get(1).copied().unwrap_or("?");
                let arg2_r = parts.get(2).copied().unwrap_or("?");
                acc = format!(
                    "{}({}, {})",
                    get_reg_val(callable_r, &regs),
                    get_reg_val(arg1_r, &regs),
                    get_reg_val(arg2_r, &regs)
                );
                acc_prec = P_ATOM;
            }
            "CallProperty" | "CallAnyReceiver" | "CallWithSpread" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let callable_r = parts.first().copied().unwrap_or("?").to_string();
                let range_str = parts.get(1).copied().unwrap_or("").to_string();
                let mut cl = |r: &str| get_reg_val(r, &regs);
                let range_args = parse_reg_range_args(&range_str, &mut cl);
                let call_args = if range_args.len() > 1 { &range_args[1..] } else { &[][..] };
                acc = format!("{}({})", get_reg_val(&callable_r, &regs), call_args.join(", "));
                acc_prec = P_ATOM;
            }
            "CallUndefinedReceiver" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let callable_r = parts.first().copied().unwrap_or("?").to_string();
                let range_str = parts.get(1).copied().unwrap_or("").to_string();
                let mut cl = |r: &str| get_reg_val(r, &regs);
                let range_args = parse_reg_range_args(&range_str, &mut cl);
                acc = format!("{}({})", get_reg_val(&callable_r, &regs), range_args.join(", "));
                acc_prec = P_ATOM;
            }
            "CallRuntime" => {
                acc = format!("/* CallRuntime({operands_str}) */");
                acc_prec = P_ATOM;
            }
            "CallJSRuntime" => {
                let idx = get_idx(&ops);
                let range_str = ops.get(1).cloned().unwrap_or_default();
                let mut cl = |r: &str| get_reg_val(r, &regs);
                let range_args = parse_reg_range_args(&range_str, &mut cl);
                let rt_name = metadata.jsruntime_raw_name(idx as usize);
                acc = if let Some(rt_name) = rt_name {
                    if let Some(js_static) = metadata.jsruntime_static(&rt_name) {
                        let arg_strs = if range_args.len() > 1 { &range_args[1..] } else { &[][..] };
                        format!("{js_static}({})", arg_strs.join(", "))
                    } else if let Some(js_method) = metadata.jsruntime_method(&rt_name) {
                        if let Some((receiver, rest)) = range_args.split_first() {
                            format!("{receiver}.{js_method}({})", rest.join(", "))
                        } else {
                            format!("{js_method}()")
                        }
                    } else {
                        let arg_strs = if range_args.len() > 1 { &range_args[1..] } else { &range_args[..] };
                        format!("{rt_name}({})", arg_strs.join(", "))
                    }
                } else {
                    format!("/* JSRuntime[{idx}](...) */")
                };
                acc_prec = P_ATOM;
            }
            "InvokeIntrinsic" => {
                acc = format!("/* InvokeIntrinsic({operands_str}) */");
                acc_prec = P_ATOM;
            }
            "ConstructForwardAllArgs" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let ctor_r = parts.first().copied().unwrap_or("?");
                acc = format!("new {}(...args)", get_reg_val(ctor_r, &regs));
                acc_prec = P_ATOM;
            }
            "Construct" | "ConstructWithSpread" => {
                let parts: Vec<&str> = operands_str.split_whitespace().collect();
                let ctor_r = parts.first().copied().unwrap_or("?").to_string();
                let range_str = parts.get(1).copied().unwrap_or("").to_string();
                let mut cl = |r: &str| get_reg_val(r, &regs);
                let range_args = parse_reg_range_args(&range_str, &mut cl);
                let call_args = if range_args.len() > 1 { &range_args[..range_args.len() - 1] } else { &range_args[..] };
                acc = format!("new {}({})", get_reg_val(&ctor_r, &regs), call_args.join(", "));
                acc_prec = P_ATOM;
            }
            "CreateClosure" => {
                acc = cp_value_str(get_idx(&ops), cp);
                acc_prec = P_ATOM;
            }
            "CreateArrayLiteral" => {
                let raw = cp_value_str(get_idx(&ops), cp);
                acc = if raw.starts_with('[') { raw } else { "[]".to_string() };
                acc_prec = P_ATOM;
            }
            "CreateEmptyArrayLiteral" => {
                acc = "[]".to_string();
                acc_prec = P_ATOM;
            }
            "CreateObjectLiteral" | "CreateEmptyObjectLiteral" => {
                acc = "{}".to_string();
                acc_prec = P_ATOM;
            }
            "CloneObject" => {
                let reg = get_reg(&ops);
                acc = format!("{{...{}}}", get_reg_val(&reg, &regs));
                acc_prec = P_ATOM;
            }
            "CreateArrayFromIterable" => {
                acc = format!("[...{acc}]");
                acc_prec = P_ATOM;
            }
            "GetTemplateObject" => {
                acc = "/* template object */".to_string();
                acc_prec = P_ATOM;
            }
            "CreateRegExpLiteral" => {
                acc = format!("/{}/", strip_quotes(&cp_value_str(get_idx(&ops), cp)));
                acc_prec = P_ATOM;
            }
            "CreateFunctionContext" | "CreateBlockContext" | "CreateCatchContext" | "PushContext" | "PopContext" => {}
            "Return" => {
                lines.push(format!("{indent}return {acc};"));
            }
            "JumpLoop" => {
                if let Some(target) = jump_target(&comment) {
                    lines.push(format!("{indent}/* loop back to @{target:04X} */"));
                } else {
                    lines.push(format!("{indent}/* loop */"));
                }
            }
            "Jump" => {
                if let Some(target) = jump_target(&comment) {
                    lines.push(format!("{indent}/* goto @{target:04X} */"));
                }
            }
            b if b.starts_with("JumpIf") => {
                let cond = jump_condition(b, &acc);
                if let Some(target) = jump_target(&comment) {
                    lines.push(format!("{indent}if ({cond}) {{ /* goto @{target:04X} */ }}"));
                } else {
                    lines.push(format!("{indent}if ({cond}) {{ ... }}"));
                }
            }
            "Throw" => {
                lines.push(format!("{indent}throw {acc};"));
            }
            "ReThrow" => {
                lines.push(format!("{indent}throw {acc}; /* rethrow */"));
            }
            "ThrowReferenceErrorIfHole" => {
                lines.push(format!("{indent}/* ThrowReferenceErrorIfHole {} */", cp_value_str(get_idx(&ops), cp)));
            }
            "ForInPrepare" => {
                let reg = get_reg(&ops);
                lines.push(format!("{indent}/* for (... in {}) prepare */", get_reg_val(&reg, &regs)));
            }
            "ForInNext" => {
                let reg = get_reg(&ops);
                acc = format!("/* ForInNext({}) */", get_reg_val(&reg, &regs));
                acc_prec = P_ATOM;
            }
            "ForInStep" => {
                let reg = get_reg(&ops);
                acc = format!("{} + 1", get_reg_val(&reg, &regs));
                acc_prec = P_ADD;
            }
            "ForInContinue" => {
                let reg = get_reg(&ops);
                let second = get_second_reg(&ops);
                acc = format!("{} < {}", get_reg_val(&reg, &regs), get_reg_val(&second, &regs));
                acc_prec = P_REL;
            }
            "SuspendGenerator" | "ResumeGenerator" | "RestoreGeneratorState" | "RestoreGeneratorRegisters" | "SwitchOnGeneratorState" => {
                lines.push(format!("{indent}/* {base} {operands_str} */"));
            }
            b if b.starts_with("LdaLookup") => {
                acc = strip_quotes(&cp_value_str(get_idx(&ops), cp));
                acc_prec = P_ATOM;
            }
            "StaLookupSlot" => {
                let name = strip_quotes(&cp_value_str(get_idx(&ops), cp));
                lines.push(format!("{indent}{name} = {acc};"));
            }
            "LdaModuleVariable" => {
                acc = "/* module_var */".to_string();
                acc_prec = P_ATOM;
            }
            "StaModuleVariable" => {
                lines.push(format!("{indent}/* StaModuleVariable = {acc} */"));
            }
            "Nop" | "Illegal" | "DebugBreakWide" | "DebugBreakExtraWide" | "SetPendingMessage" | "Wide" | "ExtraWide" => {}
            b if b.starts_with("DebugBreak") || b == "Debugger" => {
                lines.push(format!("{indent}debugger;"));
            }
            "SwitchOnSmiNoFeedback" => {
                lines.push(format!("{indent}/* switch ({acc}) {{ ... }} */"));
            }
            "ToNumber" => {
                let reg = get_reg(&ops);
                if reg != "?" {
                    let name = reg_to_name(&reg, &params, &stack_locals, stack_first_slot);
                    regs.insert(name, acc.clone());
                }
            }
            "ToName" | "ToObject" | "ToBoolean" | "ToNumeric" | "ToString" => {}
            "GetSuperConstructor" => {
                let reg = get_reg(&ops);
                let name = reg_to_name(&reg, &params, &stack_locals, stack_first_slot);
                lines.push(format!("{indent}{name} = super.constructor;"));
            }
            "CreateMappedArguments" | "CreateUnmappedArguments" => {
                acc = "arguments".to_string();
                acc_prec = P_ATOM;
            }
            "CreateRestParameter" => {
                acc = "[...rest]".to_string();
                acc_prec = P_ATOM;
            }
            "ThrowSuperNotCalledIfHole" | "ThrowSuperAlreadyCalledIfNotHole" | "ThrowIfNotSuperConstructor"
            | "FindNonDefaultConstructorOrConstruct" | "IncBlockCounter" | "CollectTypeProfile"
            | "StaDataPropertyInLiteral" | "StaInArrayLiteral" | "GetIterator" | "Abort" => {}
            "CreateWithContext" | "CreateEvalContext" => {}
            other => {
                lines.push(format!("{indent}/* {mnemonic} {operands_str} */"));
                let _ = other;
            }
        }

        if CALL_OPCODES.contains(&base) {
            let next_base = instructions
                .get(inst_idx + 1)
                .map(|n| n.mnemonic.rsplit('.').next().unwrap_or(&n.mnemonic).to_string())
                .unwrap_or_default();
            let consumed = matches!(
                next_base.as_str(),
                "Star" | "Return" | "LogicalNot" | "ToBooleanLogicalNot" | "TypeOf" | "ToNumber" | "ToName"
                    | "ToObject" | "ToBoolean" | "ToNumeric" | "ToString" | "Throw" | "ReThrow" | "Add" | "Sub"
                    | "Mul" | "Div" | "Mod" | "Exp" | "AddSmi" | "SubSmi" | "MulSmi" | "DivSmi" | "ModSmi"
                    | "ExpSmi" | "BitwiseOr" | "BitwiseXor" | "BitwiseAnd" | "BitwiseOrSmi" | "BitwiseXorSmi"
                    | "BitwiseAndSmi" | "ShiftLeft" | "ShiftRight" | "ShiftRightLogical" | "ShiftLeftSmi"
                    | "ShiftRightSmi" | "Inc" | "Dec" | "Negate" | "BitwiseNot" | "Construct" | "ConstructWithSpread"
            ) || next_base.starts_with("JumpIf")
                || next_base.starts_with("Sta")
                || next_base.starts_with("Star")
                || next_base.starts_with("Test");
            if !consumed {
                lines.push(format!("{indent}{acc};"));
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_check() {
        assert!(is_valid_identifier("foo_bar"));
        assert!(!is_valid_identifier("3foo"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn reg_range_dash_format() {
        let mut cl = |r: &str| r.to_string();
        let args = parse_reg_range_args("r1-r4", &mut cl);
        assert_eq!(args, vec!["r1", "r2", "r3", "r4"]);
    }

    #[test]
    fn reg_range_count_format() {
        let mut cl = |r: &str| r.to_string();
        let args = parse_reg_range_args("r0-_context(3)", &mut cl);
        assert_eq!(args, vec!["r0", "r1", "r2"]);
    }

    #[test]
    fn no_bytecode_yields_comment() {
        let sfi = SharedFunctionInfo {
            name: "foo".into(),
            identifier: String::new(),
            function_literal_id: 0,
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
        };
        let md = Metadata::load();
        assert!(reconstruct_js(&sfi, &md).contains("No bytecode available"));
    }
}
