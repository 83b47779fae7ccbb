//! Bundled lookup tables consulted while naming heap references: root-array
//! slots, builtin entry points, and well-known JS runtime function ids.
//! Embedded at compile time via `include_str!` so the binary needs no
//! external data directory, unlike the reference tool's `data/*.json` files.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RootEntry {
    pub index: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuiltinEntry {
    pub index: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsRunEntry {
    name: String,
}

/// Maps a `CallJSRuntime` name to its JS static-function rendering
/// (receiver argument is dropped). Hardcoded in the reference's
/// reconstructor rather than data-driven, so it lives as Rust consts here
/// rather than in an embedded JSON table.
const JSRUNTIME_STATIC: &[(&str, &str)] = &[
    ("math_pow", "Math.pow"),
    ("math_floor", "Math.floor"),
    ("object_create", "Object.create"),
    ("object_define_property", "Object.defineProperty"),
    ("object_define_properties", "Object.defineProperties"),
    ("object_freeze", "Object.freeze"),
    ("object_get_prototype_of", "Object.getPrototypeOf"),
    ("object_is_extensible", "Object.isExtensible"),
    ("object_is_frozen", "Object.isFrozen"),
    ("object_is_sealed", "Object.isSealed"),
    ("object_keys", "Object.keys"),
    ("reflect_apply", "Reflect.apply"),
    ("reflect_construct", "Reflect.construct"),
    ("reflect_define_property", "Reflect.defineProperty"),
    ("reflect_delete_property", "Reflect.deleteProperty"),
    ("global_eval_fun", "eval"),
    ("spread_arguments", "...args"),
    ("spread_iterable", "...iterable"),
];

/// Maps a `CallJSRuntime` name to a method rendered on its receiver
/// (first range register).
const JSRUNTIME_METHOD: &[(&str, &str)] = &[
    ("array_pop", "pop"),
    ("array_push", "push"),
    ("array_shift", "shift"),
    ("array_unshift", "unshift"),
    ("array_splice", "splice"),
    ("array_slice", "slice"),
    ("array_concat", "concat"),
    ("map_get", "get"),
    ("map_set", "set"),
    ("map_has", "has"),
    ("map_delete", "delete"),
    ("set_add", "add"),
    ("set_delete", "delete"),
    ("set_has", "has"),
    ("promise_then", "then"),
    ("promise_catch", "catch"),
    ("promise_resolve", "resolve"),
];

pub struct Metadata {
    roots: HashMap<u32, RootEntry>,
    builtins: HashMap<u32, BuiltinEntry>,
    jsrun_names: Vec<String>,
    /// Loaded, unreferenced elsewhere: `v8_funcs.json` is read by the
    /// reference parser's `load_metadata` but never consulted by any
    /// downstream pass. Kept for fidelity with the reference's behavior.
    #[allow(dead_code)]
    funcs_data: serde_json::Value,
}

impl Metadata {
    pub fn load() -> Self {
        let roots: Vec<RootEntry> =
            serde_json::from_str(include_str!("../data/v8_roots.json"))
                .expect("embedded v8_roots.json must parse");
        let builtins: Vec<BuiltinEntry> =
            serde_json::from_str(include_str!("../data/v8_builtins.json"))
                .expect("embedded v8_builtins.json must parse");
        let jsruns: Vec<JsRunEntry> =
            serde_json::from_str(include_str!("../data/v8_jsruns.json"))
                .expect("embedded v8_jsruns.json must parse");
        let funcs_data: serde_json::Value =
            serde_json::from_str(include_str!("../data/v8_funcs.json"))
                .expect("embedded v8_funcs.json must parse");

        Self {
            roots: roots.into_iter().map(|r| (r.index, r)).collect(),
            builtins: builtins.into_iter().map(|b| (b.index, b)).collect(),
            jsrun_names: jsruns.into_iter().map(|j| j.name).collect(),
            funcs_data,
        }
    }

    pub fn root(&self, index: u32) -> Option<&RootEntry> {
        self.roots.get(&index)
    }

    pub fn builtin(&self, index: u32) -> Option<&BuiltinEntry> {
        self.builtins.get(&index)
    }

    /// Resolve a runtime/builtin numeric id to a display name when no
    /// better name is available from the heap itself.
    pub fn jsruntime_name(&self, id: u32) -> String {
        if let Some(entry) = self.builtin(id) {
            return entry.name.clone();
        }
        format!("Runtime_{id}")
    }

    /// `_get_jsruntime_name`: the context-relative JSRuntime function name
    /// for a `CallJSRuntime` index.
    pub fn jsruntime_raw_name(&self, idx: usize) -> Option<String> {
        self.jsrun_names.get(idx).cloned()
    }

    pub fn jsruntime_static(&self, name: &str) -> Option<&'static str> {
        JSRUNTIME_STATIC.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }

    pub fn jsruntime_method(&self, name: &str) -> Option<&'static str> {
        JSRUNTIME_METHOD.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_embedded_tables() {
        let md = Metadata::load();
        assert!(md.root(4).is_some());
        assert!(md.builtin(0).is_some());
    }

    #[test]
    fn jsruntime_name_falls_back() {
        let md = Metadata::load();
        assert_eq!(md.jsruntime_name(999_999), "Runtime_999999");
    }
}
