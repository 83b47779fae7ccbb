//! Reservation objects and the tagged slot values the deserializer writes
//! into them. Mirrors `common/reserv_object.py` and the `AllocSpace`/
//! `AllocWhere`/`AllocHow`/`AllocPoint`/`AllocationAlignment` enums in
//! `common/enums.py`.

use std::cell::RefCell;
use std::rc::Rc;

/// Pointer width for a snapshot. Carried as a small value type rather than
/// the teacher's const-generic `IDAKind` marker-trait pattern, since here
/// bitness is resolved only after the version hash is read — it's runtime
/// state, not a type parameter fixed at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitness {
    Bits32,
    Bits64,
}

impl Bitness {
    pub fn pointer_size(self) -> usize {
        match self {
            Bitness::Bits32 => 4,
            Bitness::Bits64 => 8,
        }
    }

    pub fn pointer_size_log2(self) -> u32 {
        match self {
            Bitness::Bits32 => 2,
            Bitness::Bits64 => 3,
        }
    }
}

/// `smi_to_int`: unwraps a tagged small-integer word. On 32-bit snapshots
/// the tag bit lives in bit 0; on 64-bit snapshots the payload occupies the
/// high 32 bits of a 64-bit word.
pub fn smi_to_int(value: u64, bitness: Bitness) -> u64 {
    match bitness {
        Bitness::Bits32 => (value & 0xFFFF_FFFF) >> 1,
        Bitness::Bits64 => value >> 32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AllocSpace {
    New = 0,
    Old = 1,
    Code = 2,
    Map = 3,
    Lo = 4,
}

impl AllocSpace {
    pub fn from_u8(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::New),
            1 => Some(Self::Old),
            2 => Some(Self::Code),
            3 => Some(Self::Map),
            4 => Some(Self::Lo),
            _ => None,
        }
    }

    pub fn all() -> [AllocSpace; 5] {
        [Self::New, Self::Old, Self::Code, Self::Map, Self::Lo]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocWhere {
    NewObject = 0x00,
    RootArray = 0x05,
    PartialSnapshotCache = 0x06,
    ExternalReference = 0x07,
    Backref = 0x08,
    BackrefWithSkip = 0x10,
    AttachedReference = 0x0D,
    Builtin = 0x0E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocHow {
    Plain = 0x00,
    FromCode = 0x20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocPoint {
    StartOfObject = 0x00,
    InnerPointer = 0x40,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationAlignment {
    WordAligned = 0,
    DoubleAligned = 1,
    DoubleUnaligned = 2,
}

impl AllocationAlignment {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::WordAligned),
            1 => Some(Self::DoubleAligned),
            2 => Some(Self::DoubleUnaligned),
            _ => None,
        }
    }
}

/// `case_statement`: the composite dispatch key a `(where, how, within)`
/// combination subtracts from the control byte to recover the candidate
/// space index.
pub fn case_statement(where_: AllocWhere, how: AllocHow, within: AllocPoint) -> u32 {
    where_ as u32 + how as u32 + within as u32
}

/// A well-known heap root, e.g. `UndefinedValue` or `EmptyFixedArray`.
/// Equality/hash are by `(name, kind)`, matching `RootObject.__eq__`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootRef {
    pub name: String,
    pub kind: String,
}

/// A single tagged-heap slot value. The reference parser stores plain
/// Python ints, nested `ReservObject`s, `RootObject`s, or decoded strings
/// interchangeably in the same dict; this enum makes that dynamism
/// explicit.
#[derive(Debug, Clone)]
pub enum Slot {
    Int(u64),
    Object(HeapRef),
    Root(RootRef),
    Builtin(String),
    Attached(String),
}

impl Slot {
    pub fn as_object(&self) -> Option<&HeapRef> {
        match self {
            Slot::Object(o) => Some(o),
            _ => None,
        }
    }
}

/// Shared handle to a heap object, cloneable the way the Python parser
/// passes `ReservObject` instances around by reference. Pointer identity is
/// used for `ScopeInfo` memoization — see [`heap_ref_ptr_id`].
pub type HeapRef = Rc<RefCell<HeapObject>>;

/// `ReservObject`: a fixed-size, lazily-filled object reservation. Slots
/// are addressed by byte offset from the object's own base. `offset` is the
/// chunk's own bump-allocation cursor, used only for the chunks that back
/// an `AllocSpace` directly (top-level reservations), not for objects
/// nested inside another object's slots.
#[derive(Debug)]
pub struct HeapObject {
    pub size: usize,
    pub offset: usize,
    slots: std::collections::BTreeMap<usize, Slot>,
    last_add_address: Option<usize>,
}

impl HeapObject {
    pub fn new(size: usize) -> HeapRef {
        Rc::new(RefCell::new(Self {
            size,
            offset: 0,
            slots: Default::default(),
            last_add_address: None,
        }))
    }

    pub fn get_size(&self) -> usize {
        self.size
    }

    pub fn get_last_object(&self) -> Option<Slot> {
        self.last_add_address.and_then(|a| self.slots.get(&a).cloned())
    }

    /// `add_object` with a raw-byte payload: split into little-endian
    /// 4-byte int chunks, matching how the reference always stores heap
    /// words as 32-bit ints regardless of pointer size. A trailing
    /// 1-3 byte remainder is dropped rather than padded, matching
    /// `_bytes_to_ints`'s `len(data) // 4` truncating division — no slot
    /// is written for it.
    pub fn add_object_bytes(&mut self, address: usize, bytes: &[u8]) {
        self.last_add_address = Some(address);
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            let buf: [u8; 4] = chunk.try_into().unwrap();
            self.slots
                .insert(address + i * 4, Slot::Int(u32::from_le_bytes(buf) as u64));
        }
    }

    pub fn add_object(&mut self, address: usize, value: Option<Slot>) {
        self.last_add_address = Some(address);
        match value {
            Some(v) => {
                self.slots.insert(address, v);
            }
            None => {
                self.slots.remove(&address);
            }
        }
    }

    /// `get_int`: a slot's low 32 bits, or 0 if unfilled / non-integer.
    pub fn get_int(&self, offset: usize) -> u64 {
        match self.slots.get(&offset) {
            Some(Slot::Int(v)) => v & 0xFFFF_FFFF,
            _ => 0,
        }
    }

    /// `get_smi_int`: unwrap a tagged small integer at `offset`. On 64-bit
    /// snapshots the payload lives in the *next* dword (`offset + 4`).
    pub fn get_smi_int(&self, offset: usize, bitness: Bitness) -> u64 {
        match bitness {
            Bitness::Bits32 => smi_to_int(self.get_int(offset), bitness),
            Bitness::Bits64 => smi_to_int(self.get_int(offset + 4) << 32, bitness),
        }
    }

    /// `get_aligned_object`: on 32-bit snapshots, the slot at `offset`
    /// directly. On 64-bit snapshots, if both the low (`offset`) and high
    /// (`offset + 4`) dwords hold plain ints, compose them with the high
    /// dword as the upper 32 bits (nested-object/root references occupy
    /// the low slot alone and are returned as-is otherwise).
    pub fn get_aligned_object(&self, offset: usize, bitness: Bitness) -> Option<Slot> {
        match bitness {
            Bitness::Bits32 => self.slots.get(&offset).cloned(),
            Bitness::Bits64 => {
                let low = self.slots.get(&offset);
                let high = self.slots.get(&(offset + 4));
                match (low, high) {
                    (Some(Slot::Int(_)), Some(Slot::Int(hi))) => Some(Slot::Int(hi << 32)),
                    _ => low.cloned(),
                }
            }
        }
    }
}

pub fn heap_ref_ptr_id(r: &HeapRef) -> usize {
    Rc::as_ptr(r) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smi_unwraps_32_and_64() {
        assert_eq!(smi_to_int(0x0000_000A, Bitness::Bits32), 5);
        assert_eq!(smi_to_int(5u64 << 32, Bitness::Bits64), 5);
    }

    #[test]
    fn add_object_bytes_splits_into_dwords() {
        let obj = HeapObject::new(16);
        obj.borrow_mut().add_object_bytes(0, &[1, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(obj.borrow().get_int(0), 1);
        assert_eq!(obj.borrow().get_int(4), 2);
    }

    #[test]
    fn aligned_object_composes_high_dword_on_64bit() {
        let obj = HeapObject::new(16);
        obj.borrow_mut().add_object(0, Some(Slot::Int(0)));
        obj.borrow_mut().add_object(4, Some(Slot::Int(7)));
        match obj.borrow().get_aligned_object(0, Bitness::Bits64) {
            Some(Slot::Int(v)) => assert_eq!(v, 7u64 << 32),
            other => panic!("unexpected {other:?}"),
        }
    }
}
