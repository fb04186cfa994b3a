//! Phase-indexed AST nodes.
//!
//! Nodes of phase `P` are the structural payload plus the elaboration slots
//! `P` declares. The same shapes serve all four phases; a pass from one
//! phase to the next is a fold (see [`crate::fold`]).

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use rill_lexer::Span;
use rill_session::ErrorToken;

use crate::ty::Ty;

/// Declares which elaboration slots a phase carries
pub trait Phase: Sized + 'static {
    /// Item identifier, assigned by the builder
    type ItemId: Clone + fmt::Debug;
    /// Loop identifier, assigned by the builder
    type LoopId: Clone + fmt::Debug;
    /// Resolution on identifier occurrences, assigned by the resolver
    type Res: Clone + fmt::Debug;
    /// Definition path on items, assigned by the resolver
    type DefPath: Clone + fmt::Debug;
    /// Type on expressions, assigned by the type checker
    type Ty: Clone + fmt::Debug;
    /// Per-package results, filled by the type checker
    type Tables: fmt::Debug + Default;
}

/// Freshly parsed; structure only
#[derive(Debug, Clone, Copy)]
pub struct Parsed;

/// Items and loops have stable identifiers
#[derive(Debug, Clone, Copy)]
pub struct Built;

/// Every identifier occurrence carries a resolution
#[derive(Debug, Clone, Copy)]
pub struct Resolved;

/// Fully typed
#[derive(Debug, Clone, Copy)]
pub struct Typecked;

/// The last phase; codegen input
pub type Final = Typecked;

impl Phase for Parsed {
    type ItemId = ();
    type LoopId = ();
    type Res = ();
    type DefPath = ();
    type Ty = ();
    type Tables = ();
}

impl Phase for Built {
    type ItemId = ItemId;
    type LoopId = LoopId;
    type Res = ();
    type DefPath = ();
    type Ty = ();
    type Tables = ();
}

impl Phase for Resolved {
    type ItemId = ItemId;
    type LoopId = LoopId;
    type Res = Resolution;
    type DefPath = DefPath;
    type Ty = ();
    type Tables = ();
}

impl Phase for Typecked {
    type ItemId = ItemId;
    type LoopId = LoopId;
    type Res = Resolution;
    type DefPath = DefPath;
    type Ty = Ty;
    type Tables = TyckTables;
}

/// Identifies a package within one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PkgId(pub u32);

/// Globally unique, phase-stable item identifier. Index 0 is the package
/// root module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    pub pkg: PkgId,
    pub idx: u32,
}

impl ItemId {
    pub fn root(pkg: PkgId) -> ItemId {
        ItemId { pkg, idx: 0 }
    }
}

/// Package-unique loop identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub u32);

/// Sequence of names from the package root down to an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefPath(pub Vec<String>);

impl fmt::Display for DefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Outcome of name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A local; `index` is the distance from the top of the locals stack
    /// (the most recently pushed local has index 0)
    Local { index: u32 },
    Item(ItemId),
    Builtin(Builtin),
    TyParam { index: u32, name: String },
    Error(ErrorToken),
}

/// Names implemented by the compiler rather than defined in source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    StringTy,
    IntTy,
    I32Ty,
    BoolTy,
    True,
    False,
    Trap,
    Null,
    I32Store,
    I64Store,
    I32Load,
    I64Load,
    MemorySize,
    MemoryGrow,
    I32ExtendToI64U,
    Transmute,
    Asm,
    Locals,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "print" => Some(Builtin::Print),
            "String" => Some(Builtin::StringTy),
            "Int" => Some(Builtin::IntTy),
            "I32" => Some(Builtin::I32Ty),
            "Bool" => Some(Builtin::BoolTy),
            "true" => Some(Builtin::True),
            "false" => Some(Builtin::False),
            "trap" => Some(Builtin::Trap),
            "__NULL" => Some(Builtin::Null),
            "__i32_store" => Some(Builtin::I32Store),
            "__i64_store" => Some(Builtin::I64Store),
            "__i32_load" => Some(Builtin::I32Load),
            "__i64_load" => Some(Builtin::I64Load),
            "__memory_size" => Some(Builtin::MemorySize),
            "__memory_grow" => Some(Builtin::MemoryGrow),
            "__i32_extend_to_i64_u" => Some(Builtin::I32ExtendToI64U),
            "___transmute" => Some(Builtin::Transmute),
            "___asm" => Some(Builtin::Asm),
            "__locals" => Some(Builtin::Locals),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::StringTy => "String",
            Builtin::IntTy => "Int",
            Builtin::I32Ty => "I32",
            Builtin::BoolTy => "Bool",
            Builtin::True => "true",
            Builtin::False => "false",
            Builtin::Trap => "trap",
            Builtin::Null => "__NULL",
            Builtin::I32Store => "__i32_store",
            Builtin::I64Store => "__i64_store",
            Builtin::I32Load => "__i32_load",
            Builtin::I64Load => "__i64_load",
            Builtin::MemorySize => "__memory_size",
            Builtin::MemoryGrow => "__memory_grow",
            Builtin::I32ExtendToI64U => "__i32_extend_to_i64_u",
            Builtin::Transmute => "___transmute",
            Builtin::Asm => "___asm",
            Builtin::Locals => "__locals",
        }
    }
}

/// Per-package type-check results
#[derive(Debug, Default)]
pub struct TyckTables {
    /// Resolved type signature per item (functions, imports, type defs,
    /// globals)
    pub item_tys: HashMap<ItemId, Ty>,
    /// Declared fields per struct item, without generic substitution
    pub struct_fields: HashMap<ItemId, Vec<(String, Ty)>>,
}

/// A compilation unit: one package of modules and items
#[derive(Debug)]
pub struct Package<P: Phase> {
    pub id: PkgId,
    pub name: String,
    pub root_file: PathBuf,
    /// The root module item (item index 0); all other items live under it
    pub root: Item<P>,
    /// Set when parsing this package failed fatally
    pub fatal: Option<ErrorToken>,
    pub tables: P::Tables,
    pub(crate) index: HashMap<ItemId, Vec<usize>>,
}

impl<P: Phase> Package<P> {
    pub fn new(id: PkgId, name: String, root_file: PathBuf, root: Item<P>) -> Package<P> {
        Package {
            id,
            name,
            root_file,
            root,
            fatal: None,
            tables: P::Tables::default(),
            index: HashMap::new(),
        }
    }
}

impl<P: Phase<ItemId = ItemId>> Package<P> {
    /// Recompute the by-id lookup table from the item tree
    pub fn rebuild_index(&mut self) {
        fn walk<P: Phase<ItemId = ItemId>>(
            item: &Item<P>,
            path: &mut Vec<usize>,
            index: &mut HashMap<ItemId, Vec<usize>>,
        ) {
            index.insert(item.id, path.clone());
            if let ItemKind::Mod(m) = &item.kind {
                for (i, child) in m.items.iter().enumerate() {
                    path.push(i);
                    walk(child, path, index);
                    path.pop();
                }
            }
        }
        let mut index = HashMap::new();
        walk(&self.root, &mut Vec::new(), &mut index);
        self.index = index;
    }

    pub fn find_item(&self, id: ItemId) -> Option<&Item<P>> {
        let path = self.index.get(&id)?;
        let mut cur = &self.root;
        for &i in path {
            match &cur.kind {
                ItemKind::Mod(m) => cur = m.items.get(i)?,
                _ => return None,
            }
        }
        Some(cur)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.index.keys().copied()
    }
}

/// A declaration inside a module
#[derive(Debug, Clone)]
pub struct Item<P: Phase> {
    pub span: Span,
    pub id: P::ItemId,
    pub name: String,
    pub def_path: P::DefPath,
    pub kind: ItemKind<P>,
}

#[derive(Debug, Clone)]
pub enum ItemKind<P: Phase> {
    Function(Function<P>),
    TypeDef(TypeDef<P>),
    Import(Import<P>),
    Mod(Module<P>),
    Extern(ExternPkg),
    Global(Global<P>),
    Use(UseDecl<P>),
    Error(ErrorToken),
}

#[derive(Debug, Clone)]
pub struct Function<P: Phase> {
    /// Generic parameter names; parsed but treated as opaque by the checker
    pub generics: Vec<String>,
    pub params: Vec<Param<P>>,
    pub ret: Option<AstTy<P>>,
    pub body: Expr<P>,
}

#[derive(Debug, Clone)]
pub struct Param<P: Phase> {
    pub name: String,
    pub span: Span,
    pub ty: AstTy<P>,
}

#[derive(Debug, Clone)]
pub struct TypeDef<P: Phase> {
    pub generics: Vec<String>,
    pub def: TyDefKind<P>,
}

#[derive(Debug, Clone)]
pub enum TyDefKind<P: Phase> {
    Struct(Vec<FieldDef<P>>),
    Alias(AstTy<P>),
}

#[derive(Debug, Clone)]
pub struct FieldDef<P: Phase> {
    pub name: String,
    pub span: Span,
    pub ty: AstTy<P>,
}

/// Foreign function declaration
#[derive(Debug, Clone)]
pub struct Import<P: Phase> {
    /// Wasm import module string
    pub module: String,
    /// Wasm import function string
    pub func: String,
    pub params: Vec<Param<P>>,
    pub ret: Option<AstTy<P>>,
}

#[derive(Debug, Clone)]
pub struct Module<P: Phase> {
    pub origin: ModOrigin,
    pub items: Vec<Item<P>>,
}

/// Whether a module's items were written inline or loaded from a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOrigin {
    Inline,
    File,
}

/// `extern mod NAME;` - opaque reference to another package
#[derive(Debug, Clone)]
pub struct ExternPkg {
    pub pkg_name: String,
}

#[derive(Debug, Clone)]
pub struct Global<P: Phase> {
    /// Assignable only when true
    pub mutable: bool,
    pub ty: AstTy<P>,
    pub init: Expr<P>,
}

/// `use a.b.c;` - after resolution `target` points at the final segment
#[derive(Debug, Clone)]
pub struct UseDecl<P: Phase> {
    pub segments: Vec<(String, Span)>,
    pub target: P::Res,
}

/// An identifier occurrence with its resolution slot
#[derive(Debug, Clone)]
pub struct Name<P: Phase> {
    pub name: String,
    pub span: Span,
    pub res: P::Res,
}

#[derive(Debug, Clone)]
pub struct Expr<P: Phase> {
    pub span: Span,
    pub ty: P::Ty,
    pub kind: ExprKind<P>,
}

#[derive(Debug, Clone)]
pub enum ExprKind<P: Phase> {
    Empty,
    Let {
        name: String,
        name_span: Span,
        ascription: Option<AstTy<P>>,
        init: Box<Expr<P>>,
        /// The local's resolved type, filled by the checker
        local_ty: Option<Ty>,
    },
    Assign {
        target: Box<Expr<P>>,
        value: Box<Expr<P>>,
    },
    Block {
        exprs: Vec<Expr<P>>,
        /// Locals declared directly in this block, recorded by the resolver
        locals: Vec<LocalDecl>,
    },
    Literal(Lit),
    Ident(Name<P>),
    /// `a.b.c` where the prefix denotes modules; introduced by the
    /// resolver, never by the parser
    Path {
        segments: Vec<(String, Span)>,
        res: P::Res,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr<P>>,
        rhs: Box<Expr<P>>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr<P>>,
    },
    Call {
        callee: Box<Expr<P>>,
        args: Vec<Expr<P>>,
    },
    FieldAccess {
        base: Box<Expr<P>>,
        field: FieldName,
        field_span: Span,
        /// Index of the field in its struct/tuple, filled by the checker
        /// and preserved by every fold
        idx: Option<u32>,
    },
    If {
        cond: Box<Expr<P>>,
        then_branch: Box<Expr<P>>,
        else_branch: Option<Box<Expr<P>>>,
    },
    Loop {
        id: P::LoopId,
        body: Box<Expr<P>>,
    },
    Break {
        /// Innermost enclosing loop, filled by the checker
        target: Option<LoopId>,
    },
    StructLiteral {
        name: Name<P>,
        fields: Vec<FieldInit<P>>,
    },
    TupleLiteral {
        elems: Vec<Expr<P>>,
    },
    /// Inline codegen instructions, spliced verbatim into the output
    Asm {
        instrs: Vec<String>,
    },
    Error(ErrorToken),
}

#[derive(Debug, Clone)]
pub struct FieldInit<P: Phase> {
    pub name: String,
    pub span: Span,
    pub value: Expr<P>,
    /// Declared-field index, filled by the checker
    pub idx: Option<u32>,
}

/// Record of a `let` inside a block
#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Str(String),
    Int(u64, IntKind),
}

/// Which integer subtype a literal denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    Int,
    I32,
}

/// Field selector in `base.field`
#[derive(Debug, Clone, PartialEq)]
pub enum FieldName {
    Named(String),
    Index(u64),
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldName::Named(s) => write!(f, "{}", s),
            FieldName::Index(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

/// Precedence class; a binary chain may not mix classes without parens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Comparison,
    Additive,
    Multiplicative,
    Logical,
}

impl BinOp {
    pub fn class(self) -> OpClass {
        match self {
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                OpClass::Comparison
            }
            BinOp::Add | BinOp::Sub => OpClass::Additive,
            BinOp::Mul | BinOp::Div | BinOp::Rem => OpClass::Multiplicative,
            BinOp::And | BinOp::Or => OpClass::Logical,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.class() == OpClass::Comparison
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self.class(), OpClass::Additive | OpClass::Multiplicative)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&",
            BinOp::Or => "|",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Not => write!(f, "!"),
            UnOp::Neg => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AstTy<P: Phase> {
    pub span: Span,
    pub kind: AstTyKind<P>,
}

#[derive(Debug, Clone)]
pub enum AstTyKind<P: Phase> {
    Named {
        name: Name<P>,
        args: Vec<AstTy<P>>,
    },
    Tuple(Vec<AstTy<P>>),
    RawPtr(Box<AstTy<P>>),
    Never,
    Error(ErrorToken),
}
