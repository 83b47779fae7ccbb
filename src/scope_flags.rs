//! `ScopeInfoFlags`: the packed flag word stored in every `ScopeInfo`'s
//! `Flags` slot. Field layout and enum values ported exactly from
//! `ScopeInfoFlags`/`ScopeInfoFlagsScope`/`ScopeInfoFlagsReceiver`/
//! `ScopeInfoFlagsFuncVar`/`ScopeInfoFlagsLang`/`ScopeInfoFlagsFuncKind`
//! in `common/enums.py`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeType {
    EvalScope,
    FunctionScope,
    ModuleScope,
    ScriptScope,
    CatchScope,
    BlockScope,
    WithScope,
}

impl ScopeType {
    fn from_raw(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::EvalScope),
            1 => Some(Self::FunctionScope),
            2 => Some(Self::ModuleScope),
            3 => Some(Self::ScriptScope),
            4 => Some(Self::CatchScope),
            5 => Some(Self::BlockScope),
            6 => Some(Self::WithScope),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EvalScope => "EVAL_SCOPE",
            Self::FunctionScope => "FUNCTION_SCOPE",
            Self::ModuleScope => "MODULE_SCOPE",
            Self::ScriptScope => "SCRIPT_SCOPE",
            Self::CatchScope => "CATCH_SCOPE",
            Self::BlockScope => "BLOCK_SCOPE",
            Self::WithScope => "WITH_SCOPE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    None,
    Stack,
    Context,
    Unused,
}

impl Receiver {
    fn from_raw(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Stack),
            2 => Some(Self::Context),
            3 => Some(Self::Unused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncVar {
    None,
    Stack,
    Context,
    Unused,
}

impl FuncVar {
    fn from_raw(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Stack),
            2 => Some(Self::Context),
            3 => Some(Self::Unused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangMode {
    Sloppy,
    Strict,
}

impl LangMode {
    fn from_raw(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::Sloppy),
            1 => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Not a contiguous range — these are composite bitflags (e.g.
/// `AsyncArrowFunction = AsyncFunction | ArrowFunction`), so lookup is a
/// literal value match rather than an arithmetic decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    NormalFunction,
    ArrowFunction,
    GeneratorFunction,
    ConciseMethod,
    ConciseGeneratorMethod,
    DefaultConstructor,
    DerivedConstructor,
    BaseConstructor,
    GetterFunction,
    SetterFunction,
    AsyncFunction,
    Module,
    AccessorFunction,
    DefaultBaseConstructor,
    DefaultDerivedConstructor,
    ClassConstructor,
    AsyncArrowFunction,
    AsyncConciseMethod,
    AsyncConciseGeneratorMethod,
    AsyncGeneratorFunction,
}

impl FuncKind {
    fn from_raw(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::NormalFunction),
            1 => Some(Self::ArrowFunction),
            2 => Some(Self::GeneratorFunction),
            4 => Some(Self::ConciseMethod),
            6 => Some(Self::ConciseGeneratorMethod),
            8 => Some(Self::DefaultConstructor),
            16 => Some(Self::DerivedConstructor),
            32 => Some(Self::BaseConstructor),
            64 => Some(Self::GetterFunction),
            128 => Some(Self::SetterFunction),
            256 => Some(Self::AsyncFunction),
            512 => Some(Self::Module),
            192 => Some(Self::AccessorFunction),
            40 => Some(Self::DefaultBaseConstructor),
            24 => Some(Self::DefaultDerivedConstructor),
            56 => Some(Self::ClassConstructor),
            257 => Some(Self::AsyncArrowFunction),
            260 => Some(Self::AsyncConciseMethod),
            262 => Some(Self::AsyncConciseGeneratorMethod),
            258 => Some(Self::AsyncGeneratorFunction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScopeInfoFlags(u64);

impl ScopeInfoFlags {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    fn bits(&self, shift: u32, width: u32) -> u64 {
        (self.0 >> shift) & ((1 << width) - 1)
    }

    pub fn scope(&self) -> Option<ScopeType> {
        ScopeType::from_raw(self.bits(0, 4))
    }

    pub fn calls_sloppy_eval(&self) -> bool {
        self.bits(4, 1) != 0
    }

    pub fn lang_mode(&self) -> Option<LangMode> {
        LangMode::from_raw(self.bits(5, 1))
    }

    pub fn is_declaration_scope(&self) -> bool {
        self.bits(6, 1) != 0
    }

    pub fn recv(&self) -> Option<Receiver> {
        Receiver::from_raw(self.bits(7, 2))
    }

    pub fn has_new_target(&self) -> bool {
        self.bits(9, 1) != 0
    }

    pub fn func_var(&self) -> Option<FuncVar> {
        FuncVar::from_raw(self.bits(10, 2))
    }

    pub fn is_asm_module(&self) -> bool {
        self.bits(12, 1) != 0
    }

    pub fn has_simple_parameters(&self) -> bool {
        self.bits(13, 1) != 0
    }

    pub fn func_kind(&self) -> Option<FuncKind> {
        FuncKind::from_raw(self.bits(14, 10))
    }

    pub fn has_outer_scope(&self) -> bool {
        self.bits(24, 1) != 0
    }

    pub fn is_debug_evaluate_scope(&self) -> bool {
        self.bits(25, 1) != 0
    }

    /// `has_receiver`: true unless the receiver slot is absent or marked
    /// unused — not a plain "non-zero" test, since `Unused` (3) is also a
    /// non-slot state.
    pub fn has_receiver(&self) -> bool {
        !matches!(self.recv(), None | Some(Receiver::None) | Some(Receiver::Unused))
    }

    pub fn has_function_var(&self) -> bool {
        !matches!(self.func_var(), None | Some(FuncVar::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_independent_bitfields() {
        let raw = (1 << 4) | (1 << 9) | (1 << 24);
        let flags = ScopeInfoFlags::from_raw(raw);
        assert!(flags.calls_sloppy_eval());
        assert!(flags.has_new_target());
        assert!(flags.has_outer_scope());
        assert!(!flags.has_receiver());
        assert!(!flags.has_function_var());
    }

    #[test]
    fn receiver_unused_is_not_has_receiver() {
        let raw = 3u64 << 7; // Receiver::Unused
        assert!(!ScopeInfoFlags::from_raw(raw).has_receiver());
        let raw = 1u64 << 7; // Receiver::Stack
        assert!(ScopeInfoFlags::from_raw(raw).has_receiver());
    }

    #[test]
    fn func_kind_decodes_composite_values() {
        let raw = 256u64 << 14;
        assert_eq!(ScopeInfoFlags::from_raw(raw).func_kind(), Some(FuncKind::AsyncFunction));
        let raw = 257u64 << 14;
        assert_eq!(ScopeInfoFlags::from_raw(raw).func_kind(), Some(FuncKind::AsyncArrowFunction));
    }

    #[test]
    fn scope_type_names_script_scope() {
        let flags = ScopeInfoFlags::from_raw(3);
        assert_eq!(flags.scope().unwrap().name(), "SCRIPT_SCOPE");
    }
}
