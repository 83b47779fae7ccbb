//! Object layout decoders: interprets the raw tagged heap built by
//! [`crate::deser`] as `SharedFunctionInfo`, `ScopeInfo`, `BytecodeData`,
//! `ConstantPool` and `HandlerTable` structures. Ported from
//! `v6/structs.py` and `v6/object_converter.py`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::heap::{heap_ref_ptr_id, Bitness, HeapRef, Slot};

const K_META_MAP: usize = 0;

pub fn get_array_length_offset(ps: usize) -> usize {
    K_META_MAP + ps
}

pub fn get_array_header_size(ps: usize) -> usize {
    get_array_length_offset(ps) + ps
}

/// `SharedFunctionInfo::function_data`'s pointer-field offset, one past
/// which the enclosing `Script` lives.
pub fn get_script_offset(ps: usize) -> usize {
    let k_code_offset = K_META_MAP + ps;
    let k_name_offset = k_code_offset + ps;
    let k_scope_info_offset = k_name_offset + ps;
    let k_outer_scope_info_offset = k_scope_info_offset + ps;
    let k_construct_stub_offset = k_outer_scope_info_offset + ps;
    let k_instance_class_name_offset = k_construct_stub_offset + ps;
    let k_function_data_offset = k_instance_class_name_offset + ps;
    k_function_data_offset + ps
}

fn root_name_at(obj: &HeapRef, offset: usize, bitness: Bitness) -> Option<String> {
    match obj.borrow().get_aligned_object(offset, bitness)? {
        Slot::Root(r) => Some(r.name),
        _ => None,
    }
}

fn type_name(obj: &HeapRef, bitness: Bitness) -> Option<String> {
    root_name_at(obj, 0, bitness)
}

/// `two_ints_to_double`: reinterprets two little-endian 32-bit words as an
/// IEEE-754 double.
pub fn two_ints_to_double(lo: u32, hi: u32) -> f64 {
    let bytes = [lo.to_le_bytes(), hi.to_le_bytes()].concat();
    f64::from_le_bytes(bytes.try_into().unwrap())
}

/// `reserv_object_to_bytes`: a length-prefixed byte string embedded in an
/// object's own slots (used for one-byte and UTF-16 string heap objects).
fn reserv_object_to_bytes(obj: &HeapRef, len_dword_index: usize, is_16le: bool, ps: usize) -> Vec<u8> {
    let obj = obj.borrow();
    let length = obj.get_smi_int(len_dword_index * ps, bitness_hint(ps)) as usize
        * if is_16le { 2 } else { 1 };
    let mut result = vec![0u8; length];
    let mut i = 0;
    while i < length {
        let dword = obj.get_int((len_dword_index + 1) * ps + i) as u32;
        let tmp = dword.to_le_bytes();
        for j in 0..4 {
            if i + j < length {
                result[i + j] = tmp[j];
            }
        }
        i += 4;
    }
    result
}

/// `get_smi_int`/`get_int` only need to know whether the snapshot is
/// 32-bit or 64-bit to scale offsets correctly; this crate threads
/// [`Bitness`] explicitly everywhere else, but the free functions ported
/// directly from `object_converter.py` take a bare pointer size the way
/// the reference does, so this derives `Bitness` back from it at the
/// decoder boundary.
fn bitness_hint(pointer_size: usize) -> Bitness {
    if pointer_size == 4 {
        Bitness::Bits32
    } else {
        Bitness::Bits64
    }
}

/// `convert_cons_one_byte_string`: flattens a (possibly nested)
/// `ConsOneByteString` rope into a single `String`.
pub fn convert_cons_one_byte_string(slot: Option<&Slot>, ps: usize) -> String {
    let bitness = bitness_hint(ps);
    match slot {
        None => String::new(),
        Some(Slot::Root(r)) => r.name.clone(),
        Some(Slot::Object(obj)) => {
            let Some(tn) = type_name(obj, bitness) else {
                return String::new();
            };
            match tn.as_str() {
                "OneByteInternalizedString" | "OneByteString" => {
                    convert_reserv_object(obj, ps).map(|v| v.to_display_string()).unwrap_or_default()
                }
                "ConsOneByteString" => {
                    let left = obj.borrow().get_aligned_object(3 * ps, bitness);
                    let right = obj.borrow().get_aligned_object(4 * ps, bitness);
                    let left = convert_cons_one_byte_string(left.as_ref(), ps);
                    let right = convert_cons_one_byte_string(right.as_ref(), ps);
                    left + &right
                }
                _ => String::new(),
            }
        }
        _ => String::new(),
    }
}

/// Result of decoding a heap object's value into a display-friendly form.
#[derive(Debug, Clone)]
pub enum ConvertedValue {
    Str(String),
    IntArray(Vec<u32>),
    Number(f64),
}

impl ConvertedValue {
    pub fn to_display_string(&self) -> String {
        match self {
            ConvertedValue::Str(s) => s.clone(),
            ConvertedValue::IntArray(v) => format!("{v:?}"),
            ConvertedValue::Number(n) => n.to_string(),
        }
    }
}

/// `convert_reserv_object`: decodes a heap object by its meta-map/type tag
/// into a string, int array, or number, for the handful of concrete heap
/// layouts the reference understands.
pub fn convert_reserv_object(obj: &HeapRef, ps: usize) -> Option<ConvertedValue> {
    let bitness = bitness_hint(ps);
    let tn = type_name(obj, bitness)?;
    match tn.as_str() {
        "OneByteInternalizedString" | "OneByteString" => {
            let raw = reserv_object_to_bytes(obj, 2, false, ps);
            Some(ConvertedValue::Str(String::from_utf8_lossy(&raw).into_owned()))
        }
        "InternalizedString" => {
            let raw = reserv_object_to_bytes(obj, 2, true, ps);
            let units: Vec<u16> = raw
                .chunks(2)
                .map(|c| u16::from_le_bytes([c[0], *c.get(1).unwrap_or(&0)]))
                .collect();
            Some(ConvertedValue::Str(String::from_utf16_lossy(&units)))
        }
        "ConsOneByteString" => Some(ConvertedValue::Str(convert_cons_one_byte_string(
            Some(&Slot::Object(obj.clone())),
            ps,
        ))),
        "FixedCOWArray" => {
            let o = obj.borrow();
            let count = (o.get_size().saturating_sub(ps)) / 4;
            let items = (0..count).map(|i| o.get_int(ps + i * 4) as u32).collect();
            Some(ConvertedValue::IntArray(items))
        }
        "HeapNumber" => {
            let o = obj.borrow();
            Some(ConvertedValue::Number(two_ints_to_double(
                o.get_int(ps) as u32,
                o.get_int(ps + 4) as u32,
            )))
        }
        _ => None,
    }
}

/// Lightweight wrapper for constant pool items too complex to flatten,
/// e.g. a nested closure or scope.
#[derive(Debug, Clone)]
pub struct ConstantPoolRef {
    pub type_name: String,
    pub name: String,
}

impl ConstantPoolRef {
    fn new(type_name: &str, name: Option<String>) -> Self {
        let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| type_name.to_string());
        Self {
            type_name: type_name.to_string(),
            name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConstantPoolItem {
    Int(u64),
    Float(f64),
    Root(String),
    Str(String),
    IntArray(Vec<u32>),
    Ref(ConstantPoolRef),
}

/// `_extract_sfi_name`: recovers a display name for a nested
/// `SharedFunctionInfo` referenced from a constant pool, falling back to a
/// synthesized `func_NNNN` name using the function's literal id.
fn extract_sfi_name(obj: &HeapRef, ps: usize) -> String {
    let bitness = bitness_hint(ps);
    let name_offset = ps + ps;
    let name_slot = obj.borrow().get_aligned_object(name_offset, bitness);
    let mut name = match name_slot {
        Some(Slot::Root(r)) => r.name,
        Some(Slot::Object(o)) => convert_reserv_object(&o, ps).map(|v| v.to_display_string()).unwrap_or_default(),
        _ => String::new(),
    };
    name = name.replace("empty_string", "");
    if name.is_empty() {
        let script_offset = get_script_offset(ps);
        let debug_info_offset = script_offset + ps;
        let function_identifier_offset = debug_info_offset + ps;
        let feedback_metadata_offset = function_identifier_offset + ps;
        let pre_parsed_scope_data_offset = feedback_metadata_offset + ps;
        let function_literal_id_offset = pre_parsed_scope_data_offset + ps;
        let func_id = obj.borrow().get_int(function_literal_id_offset);
        name = format!("func_{func_id:04}");
    }
    name
}

/// `prepare_for_alloc`: the constant-pool value normalizer. Ported
/// branch-for-branch from `object_converter.py`.
pub fn prepare_for_alloc(slot: Option<Slot>, ps: usize) -> Option<ConstantPoolItem> {
    let bitness = bitness_hint(ps);
    match slot {
        None => None,
        Some(Slot::Int(v)) => Some(ConstantPoolItem::Int(v)),
        Some(Slot::Root(r)) => Some(ConstantPoolItem::Root(r.name)),
        Some(Slot::Builtin(name)) => Some(ConstantPoolItem::Ref(ConstantPoolRef::new("Builtin", Some(name)))),
        Some(Slot::Attached(name)) => Some(ConstantPoolItem::Ref(ConstantPoolRef::new("Attached", Some(name)))),
        Some(Slot::Object(obj)) => {
            let Some(tn) = type_name(&obj, bitness) else {
                return Some(ConstantPoolItem::Ref(ConstantPoolRef::new("Unknown", None)));
            };
            match tn.as_str() {
                "OneByteInternalizedString" | "OneByteString" | "InternalizedString" => {
                    match convert_reserv_object(&obj, ps) {
                        Some(ConvertedValue::Str(s)) => Some(ConstantPoolItem::Str(s)),
                        _ => Some(ConstantPoolItem::Str(String::new())),
                    }
                }
                "ConsOneByteString" => Some(ConstantPoolItem::Str(convert_cons_one_byte_string(
                    Some(&Slot::Object(obj.clone())),
                    ps,
                ))),
                "HeapNumber" => {
                    let o = obj.borrow();
                    Some(ConstantPoolItem::Float(two_ints_to_double(
                        o.get_int(ps) as u32,
                        o.get_int(ps + 4) as u32,
                    )))
                }
                "FixedArray" | "FixedCOWArray" => match convert_reserv_object(&obj, ps) {
                    Some(ConvertedValue::IntArray(v)) => Some(ConstantPoolItem::IntArray(v)),
                    _ => Some(ConstantPoolItem::Ref(ConstantPoolRef::new("FixedArray", None))),
                },
                "Tuple2" | "Tuple3" => Some(ConstantPoolItem::Ref(ConstantPoolRef::new(&tn, None))),
                "SharedFunctionInfo" => {
                    let name = extract_sfi_name(&obj, ps);
                    Some(ConstantPoolItem::Ref(ConstantPoolRef::new(
                        "SharedFunctionInfo",
                        Some(format!("<closure: {name}>")),
                    )))
                }
                "ScopeInfo" => Some(ConstantPoolItem::Ref(ConstantPoolRef::new("ScopeInfo", None))),
                other => Some(ConstantPoolItem::Ref(ConstantPoolRef::new(other, None))),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandlerTableEntry {
    pub start: u64,
    pub end: u64,
    pub prediction: u64,
    pub handler_offset: u64,
    pub data: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    pub entries: Vec<HandlerTableEntry>,
}

impl HandlerTable {
    pub fn new(obj: &HeapRef, ps: usize) -> Self {
        let bitness = bitness_hint(ps);
        let arr_len_off = get_array_length_offset(ps);
        let arr_hdr_size = get_array_header_size(ps);
        let o = obj.borrow();
        let count = (o.get_smi_int(arr_len_off, bitness) / 4) as usize;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let start = o.get_smi_int(arr_hdr_size + (4 * i) * ps, bitness);
            let end = o.get_smi_int(arr_hdr_size + (4 * i + 1) * ps, bitness);
            let handler = o.get_smi_int(arr_hdr_size + (4 * i + 2) * ps, bitness);
            let data = o.get_smi_int(arr_hdr_size + (4 * i + 3) * ps, bitness);
            entries.push(HandlerTableEntry {
                start,
                end,
                prediction: handler & 7,
                handler_offset: handler >> 3,
                data,
            });
        }
        Self { entries }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    pub items: Vec<Option<ConstantPoolItem>>,
}

impl ConstantPool {
    pub fn new(obj: &HeapRef, ps: usize) -> Self {
        let bitness = bitness_hint(ps);
        let arr_len_off = get_array_length_offset(ps);
        let arr_hdr_size = get_array_header_size(ps);
        let count = obj.borrow().get_smi_int(arr_len_off, bitness) as usize;
        let items = (0..count)
            .map(|i| {
                let raw = obj.borrow().get_aligned_object(arr_hdr_size + i * ps, bitness);
                prepare_for_alloc(raw, ps)
            })
            .collect();
        Self { items }
    }
}

#[derive(Debug, Clone)]
pub struct BytecodeData {
    pub length: u64,
    pub frame_size: u64,
    pub parameter_size: u64,
    pub constant_pool: Option<ConstantPool>,
    pub handler_table: Option<HandlerTable>,
    pub bytecode: Vec<u8>,
}

impl BytecodeData {
    pub fn new(obj: &HeapRef, ps: usize) -> Self {
        let bitness = bitness_hint(ps);
        let arr_len_off = get_array_length_offset(ps);
        let arr_hdr_size = get_array_header_size(ps);

        let k_constant_pool_offset = arr_hdr_size;
        let k_handler_table_offset = k_constant_pool_offset + ps;
        let k_source_position_table_offset = k_handler_table_offset + ps;
        let k_frame_size_offset = k_source_position_table_offset + ps;
        let k_parameter_size_offset = k_frame_size_offset + 4;
        let k_incoming_new_target_offset = k_parameter_size_offset + 4;
        let k_interrupt_budget_offset = k_incoming_new_target_offset + 4;
        let k_osr_nesting_level_offset = k_interrupt_budget_offset + 4;
        let k_bytecode_age_offset = k_osr_nesting_level_offset + 1;
        let k_header_size = k_bytecode_age_offset + 1 + 2;

        let o = obj.borrow();
        let length = o.get_smi_int(arr_len_off, bitness);
        let frame_size = o.get_int(k_frame_size_offset);
        let parameter_size = o.get_int(k_parameter_size_offset) / ps as u64;

        let constant_pool = match o.get_aligned_object(k_constant_pool_offset, bitness) {
            Some(Slot::Object(cp)) => Some(ConstantPool::new(&cp, ps)),
            _ => None,
        };
        let handler_table = match o.get_aligned_object(k_handler_table_offset, bitness) {
            Some(Slot::Object(ht)) => Some(HandlerTable::new(&ht, ps)),
            _ => None,
        };

        let tmp = o.get_int(k_osr_nesting_level_offset);
        let mut bytecode = vec![((tmp >> 16) & 0xFF) as u8, ((tmp >> 24) & 0xFF) as u8];
        let remaining = length.saturating_sub(2);
        let mut i = 0u64;
        while i < remaining {
            let dw = o.get_int(k_header_size + i as usize) as u32;
            bytecode.extend_from_slice(&dw.to_le_bytes());
            i += 4;
        }
        bytecode.truncate(length as usize);

        Self {
            length,
            frame_size,
            parameter_size,
            constant_pool,
            handler_table,
            bytecode,
        }
    }
}

/// Shared-across-the-whole-decode-pass identity cache for `ScopeInfo`
/// objects, keyed by the source heap object's pointer identity (mirrors
/// `id(obj)`-keyed `scope_cache` in the reference, since `ScopeInfo` graphs
/// can be cyclic via `outer_scope`).
pub type ScopeCache = HashMap<usize, Rc<ScopeInfo>>;

#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub flags_raw: u64,
    pub flags: crate::scope_flags::ScopeInfoFlags,
    pub params_count: u64,
    pub stack_locals_count: u64,
    pub context_locals_count: u64,
    pub params: Vec<String>,
    pub stack_locals_first_slot: u64,
    pub stack_locals: Vec<String>,
    pub context_locals: Vec<String>,
    pub receiver: Option<u64>,
    pub func_var: Option<u64>,
    pub outer_scope: Option<Rc<ScopeInfo>>,
}

fn name_or_convert(slot: Option<Slot>, ps: usize) -> String {
    match slot {
        Some(Slot::Root(r)) => r.name,
        Some(Slot::Object(o)) => convert_reserv_object(&o, ps).map(|v| v.to_display_string()).unwrap_or_default(),
        _ => String::new(),
    }
}

impl ScopeInfo {
    pub fn new(obj: &HeapRef, ps: usize, cache: &mut ScopeCache) -> Rc<ScopeInfo> {
        let bitness = bitness_hint(ps);
        let k_flags_offset = ps + ps;
        let k_parameter_count = k_flags_offset + ps;
        let k_stack_local_count = k_parameter_count + ps;
        let k_context_local_count = k_stack_local_count + ps;
        let k_params_offset = k_context_local_count + ps;

        let o = obj.borrow();
        let flags_raw = o.get_smi_int(k_flags_offset, bitness);
        let flags = crate::scope_flags::ScopeInfoFlags::from_raw(flags_raw);
        let params_count = o.get_smi_int(k_parameter_count, bitness);
        let stack_locals_count = o.get_smi_int(k_stack_local_count, bitness);
        let context_locals_count = o.get_smi_int(k_context_local_count, bitness);
        drop(o);

        let mut offset = k_params_offset;

        let mut params = Vec::new();
        for _ in 0..params_count {
            let slot = obj.borrow().get_aligned_object(offset, bitness);
            params.push(name_or_convert(slot, ps));
            offset += ps;
        }

        let stack_locals_first_slot = obj.borrow().get_smi_int(offset, bitness);
        offset += ps;

        let mut stack_locals = Vec::new();
        for _ in 0..stack_locals_count {
            let slot = obj.borrow().get_aligned_object(offset, bitness);
            stack_locals.push(name_or_convert(slot, ps));
            offset += ps;
        }

        let mut context_locals = Vec::new();
        if context_locals_count > 0 {
            for _ in 0..context_locals_count {
                let slot = obj.borrow().get_aligned_object(offset, bitness);
                context_locals.push(name_or_convert(slot, ps));
                offset += ps;
            }
            // Skip the parallel var-info Smi for each context local.
            offset += context_locals_count as usize * ps;
        }

        let receiver = if flags.has_receiver() {
            let v = obj.borrow().get_int(offset);
            offset += ps;
            Some(v)
        } else {
            None
        };

        let func_var = if flags.has_function_var() {
            let v = obj.borrow().get_int(offset);
            offset += ps; // mode
            offset += ps; // name
            Some(v)
        } else {
            None
        };

        let outer_scope = if flags.has_outer_scope() {
            let outer = obj.borrow().get_aligned_object(offset, bitness);
            let result = match outer {
                Some(Slot::Object(outer_obj)) => {
                    let id = heap_ref_ptr_id(&outer_obj);
                    if let Some(existing) = cache.get(&id) {
                        Some(existing.clone())
                    } else {
                        let scope = ScopeInfo::new(&outer_obj, ps, cache);
                        cache.insert(id, scope.clone());
                        Some(scope)
                    }
                }
                _ => None,
            };
            offset += ps;
            result
        } else {
            None
        };

        Rc::new(ScopeInfo {
            flags_raw,
            flags,
            params_count,
            stack_locals_count,
            context_locals_count,
            params,
            stack_locals_first_slot,
            stack_locals,
            context_locals,
            receiver,
            func_var,
            outer_scope,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SharedFunctionInfo {
    pub name: String,
    pub identifier: String,
    pub function_literal_id: u64,
    pub function_length: u64,
    pub formal_parameter_count: u64,
    pub expected_nof_properties: u64,
    pub start_position_and_type: u64,
    pub end_position: u64,
    pub function_token_position: u64,
    pub compiler_hints: u64,
    pub scope_info: Option<Rc<ScopeInfo>>,
    pub outer_scope_info: Option<Rc<ScopeInfo>>,
    pub bytecode: Option<BytecodeData>,
}

impl SharedFunctionInfo {
    pub fn new(obj: &HeapRef, ps: usize, cache: &mut ScopeCache) -> Self {
        let bitness = bitness_hint(ps);

        let k_code_offset = K_META_MAP + ps;
        let k_name_offset = k_code_offset + ps;
        let k_scope_info_offset = k_name_offset + ps;
        let k_outer_scope_info_offset = k_scope_info_offset + ps;
        let k_construct_stub_offset = k_outer_scope_info_offset + ps;
        let k_instance_class_name_offset = k_construct_stub_offset + ps;
        let k_function_data_offset = k_instance_class_name_offset + ps;
        let k_script_offset = k_function_data_offset + ps;
        let k_debug_info_offset = k_script_offset + ps;
        let k_function_identifier_offset = k_debug_info_offset + ps;
        let k_feedback_metadata_offset = k_function_identifier_offset + ps;
        let k_pre_parsed_scope_data_offset = k_feedback_metadata_offset + ps;
        let k_function_literal_id_offset = k_pre_parsed_scope_data_offset + ps;
        let k_length_offset = k_function_literal_id_offset + 4;
        let k_formal_parameter_count_offset = k_length_offset + 4;
        let k_expected_nof_properties_offset = k_formal_parameter_count_offset + 4;
        let k_start_position_and_type_offset = k_expected_nof_properties_offset + 4;
        let k_end_position_offset = k_start_position_and_type_offset + 4;
        let k_function_token_position_offset = k_end_position_offset + 4;
        let k_compiler_hints_offset = k_function_token_position_offset + 4;

        let o = obj.borrow();
        let function_literal_id = o.get_int(k_function_literal_id_offset);
        let function_length = o.get_int(k_length_offset);
        let formal_parameter_count = o.get_int(k_formal_parameter_count_offset);
        let expected_nof_properties = o.get_int(k_expected_nof_properties_offset);
        let start_position_and_type = o.get_int(k_start_position_and_type_offset);
        let end_position = o.get_int(k_end_position_offset);
        let function_token_position = o.get_int(k_function_token_position_offset);
        let compiler_hints = o.get_int(k_compiler_hints_offset);

        let name_slot = o.get_aligned_object(k_name_offset, bitness);
        let ident_slot = o.get_aligned_object(k_function_identifier_offset, bitness);
        let scope_slot = o.get_aligned_object(k_scope_info_offset, bitness);
        let outer_scope_slot = o.get_aligned_object(k_outer_scope_info_offset, bitness);
        let bc_slot = o.get_aligned_object(k_function_data_offset, bitness);
        drop(o);

        let mut name = match &name_slot {
            Some(Slot::Root(r)) => r.name.clone(),
            Some(Slot::Object(n)) => convert_reserv_object(n, ps).map(|v| v.to_display_string()).unwrap_or_default(),
            Some(Slot::Int(0)) => "empty_string".to_string(),
            _ => String::new(),
        };
        name = name.replace(' ', "_").replace("empty_string", "");
        if name.is_empty() {
            name = format!("func_{function_literal_id:04}");
        }

        let identifier = match &ident_slot {
            Some(Slot::Root(r)) => r.name.clone(),
            Some(Slot::Object(n)) => convert_reserv_object(n, ps).map(|v| v.to_display_string()).unwrap_or_default(),
            _ => String::new(),
        };

        let scope_info = match scope_slot {
            Some(Slot::Object(scope_obj)) => {
                let id = heap_ref_ptr_id(&scope_obj);
                if let Some(existing) = cache.get(&id) {
                    Some(existing.clone())
                } else {
                    let s = ScopeInfo::new(&scope_obj, ps, cache);
                    cache.insert(id, s.clone());
                    Some(s)
                }
            }
            _ => None,
        };

        let outer_scope_info = match outer_scope_slot {
            Some(Slot::Object(scope_obj)) => {
                let id = heap_ref_ptr_id(&scope_obj);
                if let Some(existing) = cache.get(&id) {
                    Some(existing.clone())
                } else {
                    let s = ScopeInfo::new(&scope_obj, ps, cache);
                    cache.insert(id, s.clone());
                    Some(s)
                }
            }
            _ => None,
        };

        let bytecode = match bc_slot {
            Some(Slot::Object(bc)) => Some(BytecodeData::new(&bc, ps)),
            _ => None,
        };

        Self {
            name,
            identifier,
            function_literal_id,
            function_length,
            formal_parameter_count,
            expected_nof_properties,
            start_position_and_type,
            end_position,
            function_token_position,
            compiler_hints,
            scope_info,
            outer_scope_info,
            bytecode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapObject;

    #[test]
    fn cons_string_flattens_left_and_right() {
        let ps = 8usize;
        let bitness = bitness_hint(ps);
        let left = HeapObject::new(32);
        left.borrow_mut().add_object(
            0,
            Some(Slot::Root(crate::heap::RootRef {
                name: "OneByteInternalizedString".into(),
                kind: "Map".into(),
            })),
        );
        // length smi at offset 2*ps (32-bit style raw, low dword holds value<<1)
        left.borrow_mut().add_object(2 * ps, Some(Slot::Int(2 << 1)));
        left.borrow_mut().add_object(3 * ps, Some(Slot::Int(u32::from_le_bytes(*b"He\0\0") as u64)));

        let cons = HeapObject::new(5 * ps);
        cons.borrow_mut().add_object(
            0,
            Some(Slot::Root(crate::heap::RootRef {
                name: "ConsOneByteString".into(),
                kind: "Map".into(),
            })),
        );
        cons.borrow_mut().add_object(3 * ps, Some(Slot::Object(left.clone())));
        cons.borrow_mut().add_object(4 * ps, Some(Slot::Object(left)));

        let s = convert_cons_one_byte_string(Some(&Slot::Object(cons)), ps);
        assert_eq!(s, "HeHe");
        let _ = bitness;
    }
}
