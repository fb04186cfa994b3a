//! Heap-object layout.
//!
//! Struct and tuple values live on the heap behind an i32 pointer. Every
//! object carries a 4-byte refcount header at offset 0. `Int` fields are
//! 8 bytes and 8-aligned; every other runtime value (i32, bool, string,
//! raw pointer, struct, tuple) is a 4-byte slot.

use rill_ast::Ty;

/// Bytes reserved for the refcount header
pub const HEADER_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub size: u32,
    pub align: u32,
    pub field_offsets: Vec<u32>,
}

/// Size and alignment of one field slot
pub fn scalar_layout(ty: &Ty) -> (u32, u32) {
    match ty {
        Ty::Int => (8, 8),
        Ty::Unit | Ty::Never => (0, 1),
        _ => (4, 4),
    }
}

/// Layout of a heap object with the given field types, in order
pub fn layout_of(field_tys: &[Ty]) -> Layout {
    let mut offset = HEADER_SIZE;
    let mut align = 4;
    let mut field_offsets = Vec::with_capacity(field_tys.len());
    for ty in field_tys {
        let (size, field_align) = scalar_layout(ty);
        offset = round_up(offset, field_align.max(1));
        align = align.max(field_align);
        field_offsets.push(offset);
        offset += size;
    }
    Layout {
        size: round_up(offset, align),
        align,
        field_offsets,
    }
}

pub fn round_up(n: u32, to: u32) -> u32 {
    (n + to - 1) / to * to
}
