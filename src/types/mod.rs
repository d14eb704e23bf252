//! The C type graph (spec §3, §4.4): void, numeric types, pointers, arrays,
//! functions, struct/union, enum. Types live in a single [`TypeCtx`] arena
//! per translation unit and are referenced everywhere else by [`TypeId`],
//! following the same dense-index-into-an-arena discipline as every other
//! "back reference" in this crate (spec §9) rather than the teacher's
//! hash-consed [`TypeContext`]/`TypeId` of `hir_datatypes.rs` — C types
//! nest unboundedly through pointer/array/function constructors, so real
//! structural equality (`are_equal`) has to recurse instead of falling out
//! of interning for free.

use crate::ast::AstId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// Every scalar "numeric" type: the C integer ladder plus `_Bool`, plus the
/// three floating types. Modelled as one factory (`t_num`, spec §4.4) rather
/// than splitting `Int`/`Float` the way the teacher's value-type system
/// does, since C treats them as one promotion/conversion family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumKind {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
}

impl NumKind {
    pub fn size(self) -> u64 {
        use NumKind::*;
        match self {
            Bool | Char | SChar | UChar => 1,
            Short | UShort => 2,
            Int | UInt | Float => 4,
            Long | ULong | LongLong | ULongLong | Double => 8,
            LongDouble => 16,
        }
    }

    pub fn align(self) -> u64 {
        // x86-64 System V: every scalar is naturally aligned, long double
        // at 16 despite its 80-bit payload.
        self.size()
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumKind::Float | NumKind::Double | NumKind::LongDouble)
    }

    pub fn is_signed(self) -> bool {
        use NumKind::*;
        matches!(self, Char | SChar | Short | Int | Long | LongLong)
    }

    pub fn is_unsigned(self) -> bool {
        use NumKind::*;
        matches!(self, Bool | UChar | UShort | UInt | ULong | ULongLong)
    }

    /// The unsigned counterpart used by the usual arithmetic conversions
    /// when an unsigned operand outranks a same-size signed one (spec §4.5).
    pub fn to_unsigned(self) -> NumKind {
        use NumKind::*;
        match self {
            Char | SChar => UChar,
            Short => UShort,
            Int => UInt,
            Long => ULong,
            LongLong => ULongLong,
            other => other,
        }
    }

    /// Rank used by the usual arithmetic conversions; higher wins.
    pub fn rank(self) -> u32 {
        use NumKind::*;
        match self {
            Bool => 0,
            Char | SChar | UChar => 1,
            Short | UShort => 2,
            Int | UInt => 3,
            Long | ULong => 4,
            LongLong | ULongLong => 5,
            Float => 6,
            Double => 7,
            LongDouble => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayLen {
    Fixed(u64),
    /// Length is a runtime expression; allocation is supported, indexing is
    /// not (spec §1 non-goals, §9 open questions).
    Vla(AstId),
    /// No length at all yet (e.g. `int a[]` before its initialiser
    /// completes it); this, not `Vla`, is what makes an array incomplete.
    Incomplete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub offset: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    pub tag: Option<String>,
    /// `None` exactly when the aggregate is incomplete (spec §4.4).
    pub fields: Option<Vec<Field>>,
    pub size: u64,
    pub align: u64,
}

impl Aggregate {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.as_ref()?.iter().find(|f| f.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub tag: Option<String>,
    pub consts: Vec<(String, i64)>,
    pub underlying: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,
    Num(NumKind),
    Pointer { elem: TypeId },
    Array { elem: TypeId, len: ArrayLen },
    Function { ret: TypeId, params: Vec<TypeId>, vararg: bool },
    Struct(Aggregate),
    Union(Aggregate),
    Enum(EnumType),
}

fn round_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

/// Per-translation-unit type arena. Types are never deduplicated by
/// structure (two calls to `t_num(Int)` yield distinct [`TypeId`]s), so
/// `are_equal` always recurses structurally rather than relying on identity.
#[derive(Default)]
pub struct TypeCtx {
    types: Vec<Type>,
}

impl TypeCtx {
    pub fn new() -> Self {
        TypeCtx::default()
    }

    fn insert(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn t_void(&mut self) -> TypeId {
        self.insert(Type::Void)
    }

    pub fn t_num(&mut self, kind: NumKind) -> TypeId {
        self.insert(Type::Num(kind))
    }

    pub fn t_ptr(&mut self, elem: TypeId) -> TypeId {
        self.insert(Type::Pointer { elem })
    }

    pub fn t_arr(&mut self, elem: TypeId, len: ArrayLen) -> TypeId {
        self.insert(Type::Array { elem, len })
    }

    pub fn t_fn(&mut self, ret: TypeId, params: Vec<TypeId>, vararg: bool) -> TypeId {
        self.insert(Type::Function { ret, params, vararg })
    }

    /// Reserves a slot for a type whose shape isn't known yet and returns
    /// its stable [`TypeId`] so it can be embedded inside a pointer/array
    /// built around it before [`Self::patch`] fills it in. Used by the
    /// declarator parser to resolve parenthesised sub-declarators (e.g.
    /// `int (*fp)(int)`) without a second parsing pass over buffered
    /// tokens: the pointer is built pointing at the reservation, and the
    /// function type it actually points to is patched in once the
    /// enclosing `)` and its suffix have been parsed.
    pub fn reserve(&mut self) -> TypeId {
        self.insert(Type::Void)
    }

    pub fn patch(&mut self, id: TypeId, ty: Type) {
        self.types[id.0 as usize] = ty;
    }

    fn layout_struct_fields(&self, fields: &[(String, TypeId)]) -> (Vec<Field>, u64, u64) {
        let mut offset = 0u64;
        let mut max_align = 1u64;
        let mut out = Vec::with_capacity(fields.len());
        for (name, ty) in fields {
            let align = self.align_of(*ty).max(1);
            let size = self.size_of(*ty);
            offset = round_up(offset, align);
            out.push(Field {
                name: name.clone(),
                ty: *ty,
                offset,
            });
            offset += size;
            max_align = max_align.max(align);
        }
        (out, round_up(offset, max_align), max_align)
    }

    fn layout_union_fields(&self, fields: &[(String, TypeId)]) -> (Vec<Field>, u64, u64) {
        let mut max_size = 0u64;
        let mut max_align = 1u64;
        let mut out = Vec::with_capacity(fields.len());
        for (name, ty) in fields {
            let size = self.size_of(*ty);
            let align = self.align_of(*ty).max(1);
            out.push(Field {
                name: name.clone(),
                ty: *ty,
                offset: 0,
            });
            max_size = max_size.max(size);
            max_align = max_align.max(align);
        }
        (out, round_up(max_size, max_align), max_align)
    }

    pub fn t_struct(&mut self, tag: Option<String>, fields: Option<Vec<(String, TypeId)>>) -> TypeId {
        let (fields, size, align) = match fields {
            Some(f) => {
                let (laid, size, align) = self.layout_struct_fields(&f);
                (Some(laid), size, align)
            }
            None => (None, 0, 1),
        };
        self.insert(Type::Struct(Aggregate { tag, fields, size, align }))
    }

    pub fn t_union(&mut self, tag: Option<String>, fields: Option<Vec<(String, TypeId)>>) -> TypeId {
        let (fields, size, align) = match fields {
            Some(f) => {
                let (laid, size, align) = self.layout_union_fields(&f);
                (Some(laid), size, align)
            }
            None => (None, 0, 1),
        };
        self.insert(Type::Union(Aggregate { tag, fields, size, align }))
    }

    /// Underlying-type rule (DESIGN.md, resolving spec §9's open question):
    /// the narrowest *signed* candidate in `{int, long long}` that can
    /// represent every declared constant; only if none can, fall back to
    /// the narrowest *unsigned* candidate in `{unsigned int, unsigned long
    /// long}`.
    pub fn t_enum(&mut self, tag: Option<String>, consts: Vec<(String, i64)>) -> TypeId {
        let min = consts.iter().map(|(_, v)| *v).min().unwrap_or(0);
        let max = consts.iter().map(|(_, v)| *v).max().unwrap_or(0);

        let fits_signed = |bits: u32| {
            let lo = -(1i64 << (bits - 1));
            let hi = (1i64 << (bits - 1)) - 1;
            min >= lo && max <= hi
        };
        let fits_unsigned = |bits: u32| {
            min >= 0 && (bits >= 64 || (max as u64) <= (1u64 << bits) - 1)
        };

        let underlying_kind = if fits_signed(32) {
            NumKind::Int
        } else if fits_signed(64) {
            NumKind::LongLong
        } else if fits_unsigned(32) {
            NumKind::UInt
        } else {
            NumKind::ULongLong
        };

        let underlying = self.t_num(underlying_kind);
        self.insert(Type::Enum(EnumType { tag, consts, underlying }))
    }

    pub fn size_of(&self, id: TypeId) -> u64 {
        match self.get(id) {
            Type::Void => 0,
            Type::Num(k) => k.size(),
            Type::Pointer { .. } => 8,
            Type::Array { elem, len: ArrayLen::Fixed(n) } => n * self.size_of(*elem),
            Type::Array { .. } => 0,
            Type::Function { .. } => 0,
            Type::Struct(a) | Type::Union(a) => a.size,
            Type::Enum(e) => self.size_of(e.underlying),
        }
    }

    pub fn align_of(&self, id: TypeId) -> u64 {
        match self.get(id) {
            Type::Void => 1,
            Type::Num(k) => k.align(),
            Type::Pointer { .. } => 8,
            Type::Array { elem, .. } => self.align_of(*elem),
            Type::Function { .. } => 1,
            Type::Struct(a) | Type::Union(a) => a.align,
            Type::Enum(e) => self.align_of(e.underlying),
        }
    }

    /// Structural equality (spec §4.4). Identical [`TypeId`]s always match;
    /// otherwise two named aggregates/enums are equal iff they share a tag
    /// (the tag-scope assumption: identical tags resolve to the same type
    /// object through the scope chain, so this is the fallback for types
    /// that were independently synthesised with the same shape, e.g. two
    /// `t_num(Int)` calls).
    pub fn are_equal(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Type::Void, Type::Void) => true,
            (Type::Num(x), Type::Num(y)) => x == y,
            (Type::Pointer { elem: x }, Type::Pointer { elem: y }) => self.are_equal(*x, *y),
            (Type::Array { elem: x, len: lx }, Type::Array { elem: y, len: ly }) => {
                self.are_equal(*x, *y) && lx == ly
            }
            (
                Type::Function { ret: rx, params: px, vararg: vx },
                Type::Function { ret: ry, params: py, vararg: vy },
            ) => {
                vx == vy
                    && self.are_equal(*rx, *ry)
                    && px.len() == py.len()
                    && px.iter().zip(py.iter()).all(|(p, q)| self.are_equal(*p, *q))
            }
            (Type::Struct(sx), Type::Struct(sy)) => tags_equal(&sx.tag, &sy.tag),
            (Type::Union(ux), Type::Union(uy)) => tags_equal(&ux.tag, &uy.tag),
            (Type::Enum(ex), Type::Enum(ey)) => tags_equal(&ex.tag, &ey.tag),
            _ => false,
        }
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Num(k) if !k.is_float()) || matches!(self.get(id), Type::Enum(_))
    }

    pub fn is_fp(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Num(k) if k.is_float())
    }

    pub fn is_arith(&self, id: TypeId) -> bool {
        self.is_int(id) || self.is_fp(id)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Pointer { .. })
    }

    pub fn is_void_ptr(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Pointer { elem } if matches!(self.get(*elem), Type::Void))
    }

    pub fn is_vla(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Array { len: ArrayLen::Vla(_), .. })
    }

    pub fn is_incomplete(&self, id: TypeId) -> bool {
        match self.get(id) {
            Type::Void => true,
            Type::Array { len: ArrayLen::Incomplete, .. } => true,
            Type::Struct(a) | Type::Union(a) => a.fields.is_none(),
            _ => false,
        }
    }

    /// Array of `char`/`unsigned short`/`unsigned int` — the element widths
    /// the parser's string-literal initialisation accepts for UTF-8/16/32
    /// text (spec §4.4, §4.5).
    pub fn is_string_type(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::Array { elem, .. }
                if matches!(
                    self.get(*elem),
                    Type::Num(NumKind::Char | NumKind::UChar | NumKind::SChar | NumKind::UShort | NumKind::UInt)
                )
        )
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Pointer { elem } => Some(*elem),
            _ => None,
        }
    }

    pub fn element_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Array { elem, .. } => Some(*elem),
            _ => None,
        }
    }
}

fn tags_equal(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn are_equal_is_structural_for_distinct_ids() {
        let mut ctx = TypeCtx::new();
        let a = ctx.t_num(NumKind::Int);
        let b = ctx.t_num(NumKind::Int);
        assert_ne!(a, b);
        assert!(ctx.are_equal(a, b));
    }

    #[test]
    fn are_equal_recurses_through_pointer() {
        let mut ctx = TypeCtx::new();
        let x = ctx.t_num(NumKind::Int);
        let y = ctx.t_num(NumKind::Int);
        let px = ctx.t_ptr(x);
        let py = ctx.t_ptr(y);
        assert!(ctx.are_equal(px, py));

        let z = ctx.t_num(NumKind::UInt);
        let pz = ctx.t_ptr(z);
        assert!(!ctx.are_equal(px, pz));
    }

    #[test]
    fn struct_field_offsets_respect_alignment() {
        let mut ctx = TypeCtx::new();
        let c = ctx.t_num(NumKind::Char);
        let i = ctx.t_num(NumKind::Int);
        let s = ctx.t_struct(Some("s".into()), Some(vec![("a".into(), c), ("b".into(), i)]));
        let Type::Struct(agg) = ctx.get(s) else { panic!() };
        assert_eq!(agg.field("a").unwrap().offset, 0);
        assert_eq!(agg.field("b").unwrap().offset, 4);
        assert_eq!(agg.size, 8);
        assert_eq!(agg.align, 4);
    }

    #[test]
    fn union_size_is_max_field_with_zero_offsets() {
        let mut ctx = TypeCtx::new();
        let c = ctx.t_num(NumKind::Char);
        let d = ctx.t_num(NumKind::Double);
        let u = ctx.t_union(Some("u".into()), Some(vec![("a".into(), c), ("b".into(), d)]));
        let Type::Union(agg) = ctx.get(u) else { panic!() };
        assert_eq!(agg.size, 8);
        assert_eq!(agg.field("a").unwrap().offset, 0);
        assert_eq!(agg.field("b").unwrap().offset, 0);
    }

    #[test]
    fn enum_underlying_picks_narrowest_signed() {
        let mut ctx = TypeCtx::new();
        let e = ctx.t_enum(None, vec![("A".into(), -1), ("B".into(), 1)]);
        let Type::Enum(en) = ctx.get(e) else { panic!() };
        assert!(matches!(ctx.get(en.underlying), Type::Num(NumKind::Int)));
    }

    #[test]
    fn incomplete_array_and_void_are_incomplete() {
        let mut ctx = TypeCtx::new();
        let v = ctx.t_void();
        assert!(ctx.is_incomplete(v));
        let i = ctx.t_num(NumKind::Int);
        let arr = ctx.t_arr(i, ArrayLen::Incomplete);
        assert!(ctx.is_incomplete(arr));
        let complete = ctx.t_arr(i, ArrayLen::Fixed(3));
        assert!(!ctx.is_incomplete(complete));
    }
}
