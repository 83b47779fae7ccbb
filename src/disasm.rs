//! Ignition bytecode disassembler. Ported from `v6/disasm.py`'s opcode
//! table and decode loop.

use crate::objects::{ConstantPool, ConstantPoolItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    Reg,
    Imm,
    Idx,
    UImm,
    Flag8,
    IntrinsicId,
    RuntimeId,
    RegRange,
    RegPair,
    RegTriple,
}

use OperandType as Op;

macro_rules! ops {
    ($($t:ident),* $(,)?) => { &[$(Op::$t),*] };
}

/// `(mnemonic, operand_types)` indexed by opcode, 0x00-0xA8 inclusive —
/// 169 entries, matching the reference table exactly.
pub const OPCODES: &[(&str, &[OperandType])] = &[
    ("Wide", ops![]),
    ("ExtraWide", ops![]),
    ("LdaZero", ops![]),
    ("LdaSmi", ops![Imm]),
    ("LdaUndefined", ops![]),
    ("LdaNull", ops![]),
    ("LdaTheHole", ops![]),
    ("LdaTrue", ops![]),
    ("LdaFalse", ops![]),
    ("LdaConstant", ops![Idx]),
    ("LdaGlobal", ops![Idx, Idx]),
    ("LdaGlobalInsideTypeof", ops![Idx, Idx]),
    ("StaGlobalSloppy", ops![Idx, Idx]),
    ("StaGlobalStrict", ops![Idx, Idx]),
    ("PushContext", ops![Reg]),
    ("PopContext", ops![Reg]),
    ("LdaContextSlot", ops![Reg, Idx, UImm]),
    ("LdaImmutableContextSlot", ops![Reg, Idx, UImm]),
    ("LdaCurrentContextSlot", ops![Idx]),
    ("LdaImmutableCurrentContextSlot", ops![Idx]),
    ("StaContextSlot", ops![Reg, Idx, UImm]),
    ("StaCurrentContextSlot", ops![Idx]),
    ("LdaLookupSlot", ops![Idx]),
    ("LdaLookupContextSlot", ops![Idx, Idx, UImm]),
    ("LdaLookupGlobalSlot", ops![Idx, Idx, UImm]),
    ("LdaLookupSlotInsideTypeof", ops![Idx]),
    ("LdaLookupContextSlotInsideTypeof", ops![Idx, Idx, UImm]),
    ("LdaLookupGlobalSlotInsideTypeof", ops![Idx, Idx, UImm]),
    ("StaLookupSlot", ops![Idx, Flag8]),
    ("Ldar", ops![Reg]),
    ("Star", ops![Reg]),
    ("Mov", ops![Reg, Reg]),
    ("LdaNamedProperty", ops![Reg, Idx, Idx]),
    ("LdaKeyedProperty", ops![Reg, Idx]),
    ("LdaModuleVariable", ops![Imm, UImm]),
    ("StaModuleVariable", ops![Imm, UImm]),
    ("StaNamedPropertySloppy", ops![Reg, Idx, Idx]),
    ("StaNamedPropertyStrict", ops![Reg, Idx, Idx]),
    ("StaNamedOwnProperty", ops![Reg, Idx, Idx]),
    ("StaKeyedPropertySloppy", ops![Reg, Reg, Idx]),
    ("StaKeyedPropertyStrict", ops![Reg, Reg, Idx]),
    ("StaDataPropertyInLiteral", ops![Reg, Reg, Flag8, Idx]),
    ("CollectTypeProfile", ops![Imm]),
    ("Add", ops![Reg, Idx]),
    ("Sub", ops![Reg, Idx]),
    ("Mul", ops![Reg, Idx]),
    ("Div", ops![Reg, Idx]),
    ("Mod", ops![Reg, Idx]),
    ("BitwiseOr", ops![Reg, Idx]),
    ("BitwiseXor", ops![Reg, Idx]),
    ("BitwiseAnd", ops![Reg, Idx]),
    ("ShiftLeft", ops![Reg, Idx]),
    ("ShiftRight", ops![Reg, Idx]),
    ("ShiftRightLogical", ops![Reg, Idx]),
    ("AddSmi", ops![Imm, Idx]),
    ("SubSmi", ops![Imm, Idx]),
    ("MulSmi", ops![Imm, Idx]),
    ("DivSmi", ops![Imm, Idx]),
    ("ModSmi", ops![Imm, Idx]),
    ("BitwiseOrSmi", ops![Imm, Idx]),
    ("BitwiseXorSmi", ops![Imm, Idx]),
    ("BitwiseAndSmi", ops![Imm, Idx]),
    ("ShiftLeftSmi", ops![Imm, Idx]),
    ("ShiftRightSmi", ops![Imm, Idx]),
    ("ShiftRightLogicalSmi", ops![Imm, Idx]),
    ("Inc", ops![Idx]),
    ("Dec", ops![Idx]),
    ("ToBooleanLogicalNot", ops![]),
    ("LogicalNot", ops![]),
    ("TypeOf", ops![]),
    ("DeletePropertyStrict", ops![Reg]),
    ("DeletePropertySloppy", ops![Reg]),
    ("GetSuperConstructor", ops![Reg]),
    ("CallAnyReceiver", ops![Reg, RegRange, Idx]),
    ("CallProperty", ops![Reg, RegRange, Idx]),
    ("CallProperty0", ops![Reg, Reg, Idx]),
    ("CallProperty1", ops![Reg, Reg, Reg, Idx]),
    ("CallProperty2", ops![Reg, Reg, Reg, Reg, Idx]),
    ("CallUndefinedReceiver", ops![Reg, RegRange, Idx]),
    ("CallUndefinedReceiver0", ops![Reg, Idx]),
    ("CallUndefinedReceiver1", ops![Reg, Reg, Idx]),
    ("CallUndefinedReceiver2", ops![Reg, Reg, Reg, Idx]),
    ("CallWithSpread", ops![Reg, RegRange, Idx]),
    ("CallRuntime", ops![RuntimeId, RegRange]),
    ("CallRuntimeForPair", ops![RuntimeId, RegRange, RegPair]),
    ("CallJSRuntime", ops![Idx, RegRange]),
    ("InvokeIntrinsic", ops![IntrinsicId, RegRange]),
    ("Construct", ops![Reg, RegRange, Idx]),
    ("ConstructWithSpread", ops![Reg, RegRange, Idx]),
    ("TestEqual", ops![Reg, Idx]),
    ("TestEqualStrict", ops![Reg, Idx]),
    ("TestLessThan", ops![Reg, Idx]),
    ("TestGreaterThan", ops![Reg, Idx]),
    ("TestLessThanOrEqual", ops![Reg, Idx]),
    ("TestGreaterThanOrEqual", ops![Reg, Idx]),
    ("TestEqualStrictNoFeedback", ops![Reg]),
    ("TestInstanceOf", ops![Reg]),
    ("TestIn", ops![Reg]),
    ("TestUndetectable", ops![]),
    ("TestNull", ops![]),
    ("TestUndefined", ops![]),
    ("TestTypeOf", ops![Flag8]),
    ("ToName", ops![Reg]),
    ("ToNumber", ops![Reg, Idx]),
    ("ToObject", ops![Reg]),
    ("CreateRegExpLiteral", ops![Idx, Idx, Flag8]),
    ("CreateArrayLiteral", ops![Idx, Idx, Flag8]),
    ("CreateEmptyArrayLiteral", ops![Idx]),
    ("CreateObjectLiteral", ops![Idx, Idx, Flag8, Reg]),
    ("CreateEmptyObjectLiteral", ops![]),
    ("CreateClosure", ops![Idx, Idx, Flag8]),
    ("CreateBlockContext", ops![Idx]),
    ("CreateCatchContext", ops![Reg, Idx, Idx]),
    ("CreateFunctionContext", ops![UImm]),
    ("CreateEvalContext", ops![UImm]),
    ("CreateWithContext", ops![Reg, Idx]),
    ("CreateMappedArguments", ops![]),
    ("CreateUnmappedArguments", ops![]),
    ("CreateRestParameter", ops![]),
    ("JumpLoop", ops![UImm, Imm]),
    ("Jump", ops![UImm]),
    ("JumpConstant", ops![Idx]),
    ("JumpIfNullConstant", ops![Idx]),
    ("JumpIfNotNullConstant", ops![Idx]),
    ("JumpIfUndefinedConstant", ops![Idx]),
    ("JumpIfNotUndefinedConstant", ops![Idx]),
    ("JumpIfTrueConstant", ops![Idx]),
    ("JumpIfFalseConstant", ops![Idx]),
    ("JumpIfJSReceiverConstant", ops![Idx]),
    ("JumpIfToBooleanTrueConstant", ops![Idx]),
    ("JumpIfToBooleanFalseConstant", ops![Idx]),
    ("JumpIfToBooleanTrue", ops![UImm]),
    ("JumpIfToBooleanFalse", ops![UImm]),
    ("JumpIfTrue", ops![UImm]),
    ("JumpIfFalse", ops![UImm]),
    ("JumpIfNull", ops![UImm]),
    ("JumpIfNotNull", ops![UImm]),
    ("JumpIfUndefined", ops![UImm]),
    ("JumpIfNotUndefined", ops![UImm]),
    ("JumpIfJSReceiver", ops![UImm]),
    ("SwitchOnSmiNoFeedback", ops![Idx, UImm, Imm]),
    ("ForInPrepare", ops![Reg, RegTriple]),
    ("ForInContinue", ops![Reg, Reg]),
    ("ForInNext", ops![Reg, Reg, RegPair, Idx]),
    ("ForInStep", ops![Reg]),
    ("StackCheck", ops![]),
    ("SetPendingMessage", ops![]),
    ("Throw", ops![]),
    ("ReThrow", ops![]),
    ("Return", ops![]),
    ("ThrowReferenceErrorIfHole", ops![Idx]),
    ("ThrowSuperNotCalledIfHole", ops![]),
    ("ThrowSuperAlreadyCalledIfNotHole", ops![]),
    ("RestoreGeneratorState", ops![Reg]),
    ("SuspendGenerator", ops![Reg, RegRange, UImm]),
    ("RestoreGeneratorRegisters", ops![Reg, RegRange]),
    ("Debugger", ops![]),
    ("DebugBreak0", ops![]),
    ("DebugBreak1", ops![Reg]),
    ("DebugBreak2", ops![Reg, Reg]),
    ("DebugBreak3", ops![Reg, Reg, Reg]),
    ("DebugBreak4", ops![Reg, Reg, Reg, Reg]),
    ("DebugBreak5", ops![RuntimeId, Reg, Reg]),
    ("DebugBreak6", ops![RuntimeId, Reg, Reg, Reg]),
    ("DebugBreakWide", ops![]),
    ("DebugBreakExtraWide", ops![]),
    ("IncBlockCounter", ops![Idx]),
    ("Illegal", ops![]),
    ("Nop", ops![]),
];

pub const FORWARD_JUMPS: &[&str] = &[
    "Jump",
    "JumpIfToBooleanTrue",
    "JumpIfToBooleanFalse",
    "JumpIfTrue",
    "JumpIfFalse",
    "JumpIfNull",
    "JumpIfNotNull",
    "JumpIfUndefined",
    "JumpIfNotUndefined",
    "JumpIfJSReceiver",
];

pub const BACKWARD_JUMPS: &[&str] = &["JumpLoop"];

pub const TYPEOF_LITERALS: &[&str] = &[
    "number", "string", "symbol", "boolean", "undefined", "function", "object", "other",
];

/// `_byte_to_register`: maps a raw register byte to `a0`-`a125` (params),
/// `r123`-`r0` (locals, descending), or the reserved `_closure`/`_context`
/// slots.
pub fn byte_to_register(val: u32) -> String {
    match val {
        0 => "Wide".to_string(),
        1 => "ExtraWide".to_string(),
        2..=127 => format!("a{}", val - 2),
        128..=251 => format!("r{}", 251 - val),
        252 => "_closure".to_string(),
        253 => "_context".to_string(),
        other => format!("??({other})"),
    }
}

#[derive(Debug, Clone)]
pub struct DecodedOperand {
    pub op_type: OperandType,
    pub value: i64,
    pub extra: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub offset: usize,
    pub mnemonic: String,
    pub operands_str: String,
    pub raw_bytes: Vec<u8>,
    pub comment: String,
    pub operands: Vec<DecodedOperand>,
}

fn read_sized(bytecode: &[u8], pos: &mut usize, operand_size: usize) -> u32 {
    let length = bytecode.len();
    match operand_size {
        1 => {
            if *pos >= length {
                *pos = length;
                0
            } else {
                let v = bytecode[*pos] as u32;
                *pos += 1;
                v
            }
        }
        2 => {
            if *pos + 2 > length {
                *pos = length;
                0
            } else {
                let v = u16::from_le_bytes([bytecode[*pos], bytecode[*pos + 1]]) as u32;
                *pos += 2;
                v
            }
        }
        _ => {
            if *pos + 4 > length {
                *pos = length;
                0
            } else {
                let v = u32::from_le_bytes([
                    bytecode[*pos],
                    bytecode[*pos + 1],
                    bytecode[*pos + 2],
                    bytecode[*pos + 3],
                ]);
                *pos += 4;
                v
            }
        }
    }
}

fn cp_item_comment(cp: &ConstantPool, idx: usize) -> Option<String> {
    let item = cp.items.get(idx)?.as_ref()?;
    match item {
        ConstantPoolItem::Str(s) => Some(format!(" ; \"{}\"", &s.chars().take(60).collect::<String>())),
        ConstantPoolItem::Int(v) => Some(format!(" ; {v}")),
        ConstantPoolItem::Float(v) => Some(format!(" ; {v}")),
        ConstantPoolItem::Root(name) => Some(format!(" ; {name}")),
        ConstantPoolItem::Ref(r) => Some(format!(" ; {}", r.name)),
        ConstantPoolItem::IntArray(_) => None,
    }
}

/// `disassemble_bytecode`: decodes a bytecode byte string into a flat
/// instruction list, annotating jump targets and constant pool references.
pub fn disassemble_bytecode(bytecode: &[u8], constant_pool: Option<&ConstantPool>) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let length = bytecode.len();
    let mut pos = 0usize;

    while pos < length {
        let inst_start = pos;
        let mut opcode = bytecode[pos] as usize;
        pos += 1;

        let mut operand_size = 1usize;
        let mut prefix_name: Option<&str> = None;

        if opcode == 0x00 {
            if pos >= length {
                break;
            }
            prefix_name = Some("Wide");
            operand_size = 2;
            opcode = bytecode[pos] as usize;
            pos += 1;
        } else if opcode == 0x01 {
            if pos >= length {
                break;
            }
            prefix_name = Some("ExtraWide");
            operand_size = 4;
            opcode = bytecode[pos] as usize;
            pos += 1;
        }

        let Some(&(name, operand_types)) = OPCODES.get(opcode) else {
            instructions.push(Instruction {
                offset: inst_start,
                mnemonic: "UNKNOWN".to_string(),
                operands_str: format!("0x{opcode:02X}"),
                raw_bytes: bytecode[inst_start..pos].to_vec(),
                comment: String::new(),
                operands: Vec::new(),
            });
            continue;
        };

        let mnemonic = match prefix_name {
            Some(p) => format!("{p}.{name}"),
            None => name.to_string(),
        };

        let mut operands = Vec::new();
        let mut operand_strs = Vec::new();
        let mut comment = String::new();

        for &op_type in operand_types {
            match op_type {
                Op::RuntimeId => {
                    let val = if pos + 2 <= length {
                        let v = u16::from_le_bytes([bytecode[pos], bytecode[pos + 1]]) as u32;
                        pos += 2;
                        v
                    } else {
                        pos = length;
                        0
                    };
                    operands.push(DecodedOperand { op_type, value: val as i64, extra: None });
                    operand_strs.push(format!("[{val}]"));
                }
                Op::RegRange => {
                    let (reg_byte, count) = read_pair(bytecode, &mut pos, operand_size);
                    let reg_name = byte_to_register(reg_byte & 0xFF);
                    let end_name = if count > 0 {
                        byte_to_register((reg_byte + count - 1) & 0xFF)
                    } else {
                        reg_name.clone()
                    };
                    operands.push(DecodedOperand { op_type, value: reg_byte as i64, extra: Some(count as i64) });
                    operand_strs.push(format!("{reg_name}-{end_name}({count})"));
                }
                Op::RegPair => {
                    let reg_byte = read_sized(bytecode, &mut pos, operand_size);
                    let reg_name = byte_to_register(reg_byte & 0xFF);
                    operands.push(DecodedOperand { op_type, value: reg_byte as i64, extra: None });
                    operand_strs.push(format!("{reg_name}(pair)"));
                }
                Op::RegTriple => {
                    let reg_byte = read_sized(bytecode, &mut pos, operand_size);
                    let reg_name = byte_to_register(reg_byte & 0xFF);
                    operands.push(DecodedOperand { op_type, value: reg_byte as i64, extra: None });
                    operand_strs.push(format!("{reg_name}(triple)"));
                }
                _ => {
                    let raw = read_sized(bytecode, &mut pos, operand_size);
                    let mut val = raw as i64;
                    match op_type {
                        Op::Reg => operand_strs.push(byte_to_register(raw & 0xFF)),
                        Op::Imm => {
                            if operand_size == 1 && raw > 127 {
                                val = raw as i64 - 256;
                            } else if operand_size == 2 && raw > 32767 {
                                val = raw as i64 - 65536;
                            }
                            operand_strs.push(format!("[{val}]"));
                        }
                        Op::Idx | Op::UImm | Op::IntrinsicId => operand_strs.push(format!("[{val}]")),
                        Op::Flag8 => operand_strs.push(format!("#{val}")),
                        _ => {}
                    }
                    operands.push(DecodedOperand { op_type, value: val, extra: None });
                }
            }
        }

        let base_mnemonic = mnemonic.rsplit('.').next().unwrap_or(&mnemonic);

        if FORWARD_JUMPS.contains(&base_mnemonic) {
            if let Some(op) = operands.iter().find(|o| o.op_type == Op::UImm) {
                let target = inst_start as i64 + op.value;
                comment = format!("-> @{target:04X}");
            }
        } else if BACKWARD_JUMPS.contains(&base_mnemonic) {
            if let Some(op) = operands.iter().find(|o| o.op_type == Op::UImm) {
                let target = inst_start as i64 - op.value;
                comment = format!("-> @{target:04X}");
            }
        }

        if let Some(cp) = constant_pool {
            let in_range_idx = operands
                .iter()
                .find(|o| o.op_type == Op::Idx && (o.value as usize) < cp.items.len());
            if let Some(op) = in_range_idx {
                if let Some(c) = cp_item_comment(cp, op.value as usize) {
                    comment.push_str(&c);
                }
            }
        }

        if base_mnemonic == "TestTypeOf" {
            if let Some(op) = operands.iter().find(|o| o.op_type == Op::Flag8) {
                if let Some(lit) = TYPEOF_LITERALS.get(op.value as usize) {
                    comment = format!("; {lit}");
                }
            }
        }

        instructions.push(Instruction {
            offset: inst_start,
            mnemonic,
            operands_str: operand_strs.join(" "),
            raw_bytes: bytecode[inst_start..pos].to_vec(),
            comment,
            operands,
        });
    }

    instructions
}

fn read_pair(bytecode: &[u8], pos: &mut usize, operand_size: usize) -> (u32, u32) {
    let a = read_sized(bytecode, pos, operand_size);
    let b = read_sized(bytecode, pos, operand_size);
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_return() {
        let insts = disassemble_bytecode(&[0x95], None);
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].mnemonic, "Return");
    }

    #[test]
    fn wide_prefix_doubles_operand_width() {
        // Wide Ldar a10 -> operand byte 0x0C (10 + 2), read as 2 bytes.
        let insts = disassemble_bytecode(&[0x00, 0x1d, 0x0c, 0x00], None);
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].mnemonic, "Wide.Ldar");
        assert_eq!(insts[0].operands_str, "a10");
    }

    #[test]
    fn forward_jump_annotates_target() {
        let insts = disassemble_bytecode(&[0x78, 0x02], None);
        assert_eq!(insts[0].comment, "-> @0002");
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let insts = disassemble_bytecode(&[0xFF], None);
        assert_eq!(insts[0].mnemonic, "UNKNOWN");
    }
}
