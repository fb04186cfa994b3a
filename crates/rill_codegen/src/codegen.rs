//! WebAssembly text-format emission.
//!
//! Consumes the finalized dependency packages plus the root package and
//! produces one wat module. Functions are emitted first into a side
//! buffer so string interning and data-segment layout are known before
//! the module header is assembled.
//!
//! The prototype runtime consists of a bump allocator (`$rill.alloc`),
//! string comparison helpers (`$rill.str_eq`, `$rill.str_cmp`) and the
//! host `print` import.

use std::collections::HashMap;

use rill_ast::*;

use crate::layout::{layout_of, round_up};

#[derive(Debug)]
pub struct CodegenError {
    pub message: String,
}

impl CodegenError {
    fn new(message: impl Into<String>) -> CodegenError {
        CodegenError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CodegenError {}

type Result<T> = std::result::Result<T, CodegenError>;

/// Wat type of a runtime value; `None` for types with no runtime
/// representation (unit, never)
fn wat_ty(ty: &Ty) -> Option<&'static str> {
    match ty {
        Ty::Int => Some("i64"),
        Ty::Unit | Ty::Never | Ty::Error(_) => None,
        _ => Some("i32"),
    }
}

/// De-Bruijn mirror slot; `None` for locals with no runtime value
#[derive(Debug, Clone, Copy)]
struct LocalSlot {
    wat: Option<u32>,
}

struct Codegen<'a> {
    packages: Vec<&'a Package<Typecked>>,
    /// Buffer for emitted function definitions
    funcs: String,
    /// Buffer for the function currently being emitted
    body: String,
    strings: HashMap<String, u32>,
    data: Vec<(u32, String)>,
    data_end: u32,

    // per-function state
    locals: Vec<LocalSlot>,
    next_local: u32,
    scratch_base: u32,
    lit_depth: u32,
    local_total: u32,
}

/// Emit a single text-format module for the root package and every
/// finalized dependency
pub fn generate(ctx: &Context, root: &Package<Typecked>) -> Result<String> {
    let mut packages: Vec<&Package<Typecked>> = ctx.deps.iter().collect();
    packages.push(root);

    let mut cg = Codegen {
        packages,
        funcs: String::new(),
        body: String::new(),
        strings: HashMap::new(),
        data: Vec::new(),
        data_end: 8,
        locals: Vec::new(),
        next_local: 0,
        scratch_base: 0,
        lit_depth: 0,
        local_total: 0,
    };
    cg.run(root)
}

/// Collect the types of every `let` in emission order, and the maximum
/// nesting depth of heap literals (each level needs a scratch local)
fn collect_lets(expr: &Expr<Typecked>, lets: &mut Vec<Ty>, depth: u32, max_depth: &mut u32) {
    match &expr.kind {
        ExprKind::Let { init, local_ty, .. } => {
            collect_lets(init, lets, depth, max_depth);
            lets.push(local_ty.clone().unwrap_or(Ty::Unit));
        }
        ExprKind::Assign { target, value } => {
            collect_lets(target, lets, depth, max_depth);
            collect_lets(value, lets, depth, max_depth);
        }
        ExprKind::Block { exprs, .. } => {
            for e in exprs {
                collect_lets(e, lets, depth, max_depth);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_lets(lhs, lets, depth, max_depth);
            collect_lets(rhs, lets, depth, max_depth);
        }
        ExprKind::Unary { operand, .. } => collect_lets(operand, lets, depth, max_depth),
        ExprKind::Call { callee, args } => {
            collect_lets(callee, lets, depth, max_depth);
            for a in args {
                collect_lets(a, lets, depth, max_depth);
            }
        }
        ExprKind::FieldAccess { base, .. } => collect_lets(base, lets, depth, max_depth),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_lets(cond, lets, depth, max_depth);
            collect_lets(then_branch, lets, depth, max_depth);
            if let Some(e) = else_branch {
                collect_lets(e, lets, depth, max_depth);
            }
        }
        ExprKind::Loop { body, .. } => collect_lets(body, lets, depth, max_depth),
        ExprKind::StructLiteral { fields, .. } => {
            *max_depth = (*max_depth).max(depth + 1);
            for f in fields {
                collect_lets(&f.value, lets, depth + 1, max_depth);
            }
        }
        ExprKind::TupleLiteral { elems } if !elems.is_empty() => {
            *max_depth = (*max_depth).max(depth + 1);
            for e in elems {
                collect_lets(e, lets, depth + 1, max_depth);
            }
        }
        _ => {}
    }
}

impl<'a> Codegen<'a> {
    fn run(mut self, root: &Package<Typecked>) -> Result<String> {
        // gather items across all packages, dependencies first
        let mut imports = Vec::new();
        let mut globals = Vec::new();
        let mut functions = Vec::new();
        for pkg in self.packages.clone() {
            gather_items(&pkg.root, &mut imports, &mut globals, &mut functions);
        }

        for (item, f) in &functions {
            self.emit_function(item, f)?;
        }
        if !globals.is_empty() {
            self.emit_init_function(&globals)?;
        }

        // assemble the module now that data layout is known
        let mut out = String::new();
        out.push_str("(module\n");
        out.push_str("  (import \"rill\" \"print\" (func $rill.print (param i32)))\n");
        for (item, imp) in &imports {
            out.push_str(&self.import_decl(item, imp)?);
        }

        let heap_base = round_up(self.data_end, 8);
        let pages = (heap_base / 65536 + 1).max(1);
        out.push_str(&format!("  (memory {})\n", pages));
        out.push_str("  (export \"memory\" (memory 0))\n");
        out.push_str(&format!(
            "  (global $rill.heap (mut i32) (i32.const {}))\n",
            heap_base
        ));
        for (item, _) in &globals {
            let pkg = self.package_of(item.id.pkg)?;
            let ty = pkg
                .tables
                .item_tys
                .get(&item.id)
                .cloned()
                .unwrap_or(Ty::Unit);
            if let Some(wat) = wat_ty(&ty) {
                out.push_str(&format!(
                    "  (global ${} (mut {}) ({}.const 0))\n",
                    item.def_path, wat, wat
                ));
            }
        }
        for (offset, bytes) in &self.data {
            out.push_str(&format!("  (data (i32.const {}) \"{}\")\n", offset, bytes));
        }

        out.push_str(RUNTIME);
        out.push_str(&self.funcs);

        if !globals.is_empty() {
            out.push_str("  (start $rill.init)\n");
        }
        if let Some(main_sym) = find_main(root) {
            out.push_str(&format!("  (export \"main\" (func ${}))\n", main_sym));
        }
        out.push_str(")\n");
        Ok(out)
    }

    fn package_of(&self, id: PkgId) -> Result<&'a Package<Typecked>> {
        self.packages
            .iter()
            .find(|p| p.id == id)
            .copied()
            .ok_or_else(|| CodegenError::new(format!("unknown package {:?}", id)))
    }

    fn item_of(&self, id: ItemId) -> Result<&'a Item<Typecked>> {
        self.package_of(id.pkg)?
            .find_item(id)
            .ok_or_else(|| CodegenError::new(format!("unknown item {:?}", id)))
    }

    fn fn_sig(&self, id: ItemId) -> Result<(Vec<Ty>, Ty)> {
        match self.package_of(id.pkg)?.tables.item_tys.get(&id) {
            Some(Ty::Fn { params, ret }) => Ok((params.clone(), (**ret).clone())),
            _ => Err(CodegenError::new(format!(
                "item {:?} has no function type",
                id
            ))),
        }
    }

    fn struct_field_tys(&self, id: ItemId) -> Result<Vec<Ty>> {
        self.package_of(id.pkg)?
            .tables
            .struct_fields
            .get(&id)
            .map(|fields| fields.iter().map(|(_, t)| t.clone()).collect())
            .ok_or_else(|| CodegenError::new(format!("unknown struct {:?}", id)))
    }

    fn import_decl(&self, item: &Item<Typecked>, imp: &Import<Typecked>) -> Result<String> {
        let (params, ret) = self.fn_sig(item.id)?;
        let mut sig = String::new();
        for p in &params {
            if let Some(wat) = wat_ty(p) {
                sig.push_str(&format!(" (param {})", wat));
            }
        }
        if let Some(wat) = wat_ty(&ret) {
            sig.push_str(&format!(" (result {})", wat));
        }
        Ok(format!(
            "  (import \"{}\" \"{}\" (func ${}{}))\n",
            imp.module, imp.func, item.def_path, sig
        ))
    }

    fn ins(&mut self, text: impl AsRef<str>) {
        self.body.push_str("    ");
        self.body.push_str(text.as_ref());
        self.body.push('\n');
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.strings.get(s) {
            return offset;
        }
        let offset = self.data_end;
        let mut bytes = (s.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(s.as_bytes());
        self.data.push((offset, escape_bytes(&bytes)));
        self.data_end = round_up(offset + bytes.len() as u32, 4);
        self.strings.insert(s.to_string(), offset);
        offset
    }

    fn alloc_local(&mut self) -> u32 {
        let idx = self.next_local;
        self.next_local += 1;
        idx
    }

    fn emit_function(&mut self, item: &Item<Typecked>, f: &Function<Typecked>) -> Result<()> {
        let (param_tys, ret_ty) = self.fn_sig(item.id)?;

        let mut let_tys = Vec::new();
        let mut max_depth = 0;
        collect_lets(&f.body, &mut let_tys, 0, &mut max_depth);

        self.body.clear();
        self.locals.clear();
        self.lit_depth = 0;

        let mut header = format!("  (func ${}", item.def_path);
        let mut param_index = 0;
        for ty in &param_tys {
            match wat_ty(ty) {
                Some(wat) => {
                    header.push_str(&format!(" (param {})", wat));
                    self.locals.push(LocalSlot {
                        wat: Some(param_index),
                    });
                    param_index += 1;
                }
                None => self.locals.push(LocalSlot { wat: None }),
            }
        }
        if let Some(wat) = wat_ty(&ret_ty) {
            header.push_str(&format!(" (result {})", wat));
        }

        let mut decls = String::new();
        let repr_lets = let_tys.iter().filter_map(|t| wat_ty(t)).count() as u32;
        for ty in &let_tys {
            if let Some(wat) = wat_ty(ty) {
                decls.push_str(&format!("    (local {})\n", wat));
            }
        }
        for _ in 0..max_depth {
            decls.push_str("    (local i32)\n");
        }
        self.next_local = param_index;
        self.scratch_base = param_index + repr_lets;
        self.local_total = param_index + repr_lets + max_depth;

        self.emit_expr(&f.body)?;

        let body = std::mem::take(&mut self.body);
        self.funcs.push_str(&header);
        self.funcs.push('\n');
        self.funcs.push_str(&decls);
        self.funcs.push_str(&body);
        self.funcs.push_str("  )\n");
        Ok(())
    }

    fn emit_init_function(
        &mut self,
        globals: &[(&Item<Typecked>, &Global<Typecked>)],
    ) -> Result<()> {
        let mut let_tys = Vec::new();
        let mut max_depth = 0;
        for (_, g) in globals {
            collect_lets(&g.init, &mut let_tys, 0, &mut max_depth);
        }

        self.body.clear();
        self.locals.clear();
        self.lit_depth = 0;
        let repr_lets = let_tys.iter().filter_map(|t| wat_ty(t)).count() as u32;
        self.next_local = 0;
        self.scratch_base = repr_lets;
        self.local_total = repr_lets + max_depth;

        for (item, g) in globals {
            let depth = self.locals.len();
            self.emit_expr(&g.init)?;
            self.locals.truncate(depth);
            let pkg = self.package_of(item.id.pkg)?;
            let ty = pkg
                .tables
                .item_tys
                .get(&item.id)
                .cloned()
                .unwrap_or(Ty::Unit);
            if wat_ty(&ty).is_some() {
                self.ins(format!("global.set ${}", item.def_path));
            }
        }

        let mut decls = String::new();
        for ty in &let_tys {
            if let Some(wat) = wat_ty(ty) {
                decls.push_str(&format!("    (local {})\n", wat));
            }
        }
        for _ in 0..max_depth {
            decls.push_str("    (local i32)\n");
        }

        let body = std::mem::take(&mut self.body);
        self.funcs.push_str("  (func $rill.init\n");
        self.funcs.push_str(&decls);
        self.funcs.push_str(&body);
        self.funcs.push_str("  )\n");
        Ok(())
    }

    fn emit_expr(&mut self, expr: &Expr<Typecked>) -> Result<()> {
        match &expr.kind {
            ExprKind::Empty => {}

            ExprKind::Literal(Lit::Str(s)) => {
                let offset = self.intern(s);
                self.ins(format!("i32.const {}", offset));
            }
            ExprKind::Literal(Lit::Int(n, IntKind::Int)) => {
                self.ins(format!("i64.const {}", n));
            }
            ExprKind::Literal(Lit::Int(n, IntKind::I32)) => {
                self.ins(format!("i32.const {}", *n as u32));
            }

            ExprKind::Ident(name) => self.emit_value(&name.res, &expr.ty)?,
            ExprKind::Path { res, .. } => self.emit_value(res, &expr.ty)?,

            ExprKind::Let { init, local_ty, .. } => {
                self.emit_expr(init)?;
                let ty = local_ty.clone().unwrap_or(Ty::Unit);
                let slot = if wat_ty(&ty).is_some() {
                    let idx = self.alloc_local();
                    self.ins(format!("local.set {}", idx));
                    LocalSlot { wat: Some(idx) }
                } else {
                    LocalSlot { wat: None }
                };
                self.locals.push(slot);
            }

            ExprKind::Block { exprs, .. } => {
                let depth = self.locals.len();
                let last = exprs.len().saturating_sub(1);
                for (i, e) in exprs.iter().enumerate() {
                    self.emit_expr(e)?;
                    if i != last && wat_ty(&e.ty).is_some() {
                        self.ins("drop");
                    }
                }
                self.locals.truncate(depth);
            }

            ExprKind::Binary { op, lhs, rhs } => {
                self.emit_expr(lhs)?;
                self.emit_expr(rhs)?;
                if lhs.ty.is_never() || rhs.ty.is_never() {
                    self.ins("unreachable");
                    return Ok(());
                }
                self.emit_binary_op(*op, &lhs.ty)?;
            }

            ExprKind::Unary { op, operand } => {
                self.emit_expr(operand)?;
                match (op, &operand.ty) {
                    (UnOp::Not, Ty::Bool) => self.ins("i32.eqz"),
                    (UnOp::Not, Ty::I32) => {
                        self.ins("i32.const -1");
                        self.ins("i32.xor");
                    }
                    (UnOp::Not, Ty::Int) => {
                        self.ins("i64.const -1");
                        self.ins("i64.xor");
                    }
                    _ => self.ins("unreachable"),
                }
            }

            ExprKind::Call { callee, args } => {
                let res = match &callee.kind {
                    ExprKind::Ident(n) => Some(&n.res),
                    ExprKind::Path { res, .. } => Some(res),
                    _ => None,
                };
                match res {
                    Some(Resolution::Builtin(b)) => {
                        self.emit_builtin_call(*b, args, &expr.ty)?
                    }
                    Some(Resolution::Item(id)) => {
                        let id = *id;
                        match &self.item_of(id)?.kind {
                            ItemKind::Function(_) | ItemKind::Import(_) => {
                                for a in args {
                                    self.emit_expr(a)?;
                                }
                                let path = self.item_of(id)?.def_path.clone();
                                self.ins(format!("call ${}", path));
                            }
                            _ => self.ins("unreachable"),
                        }
                    }
                    // no function tables in the prototype runtime
                    _ => self.ins("unreachable"),
                }
            }

            ExprKind::FieldAccess { base, idx, .. } => {
                self.emit_expr(base)?;
                let field_tys = self.field_tys_of(&base.ty)?;
                let idx = idx.ok_or_else(|| CodegenError::new("field index missing"))?
                    as usize;
                let layout = layout_of(&field_tys);
                let field_ty = field_tys
                    .get(idx)
                    .ok_or_else(|| CodegenError::new("field index out of range"))?;
                match wat_ty(field_ty) {
                    Some("i64") => {
                        self.ins(format!("i64.load offset={}", layout.field_offsets[idx]))
                    }
                    Some(_) => {
                        self.ins(format!("i32.load offset={}", layout.field_offsets[idx]))
                    }
                    None => self.ins("drop"),
                }
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.emit_expr(cond)?;
                match wat_ty(&expr.ty) {
                    Some(wat) => self.ins(format!("if (result {})", wat)),
                    None => self.ins("if"),
                }
                self.emit_expr(then_branch)?;
                if let Some(els) = else_branch {
                    self.ins("else");
                    self.emit_expr(els)?;
                }
                self.ins("end");
            }

            ExprKind::Loop { id, body } => {
                self.ins(format!("block $break_{}", id.0));
                self.ins(format!("loop $loop_{}", id.0));
                self.emit_expr(body)?;
                self.ins(format!("br $loop_{}", id.0));
                self.ins("end");
                self.ins("end");
                if expr.ty.is_never() {
                    self.ins("unreachable");
                }
            }

            ExprKind::Break { target } => {
                let target =
                    target.ok_or_else(|| CodegenError::new("break target missing"))?;
                self.ins(format!("br $break_{}", target.0));
            }

            ExprKind::StructLiteral { fields, .. } => {
                let field_tys = self.field_tys_of(&expr.ty)?;
                let layout = layout_of(&field_tys);
                let scratch = self.scratch_base + self.lit_depth;
                self.lit_depth += 1;

                self.ins(format!("i32.const {}", layout.size));
                self.ins("call $rill.alloc");
                self.ins(format!("local.set {}", scratch));
                for f in fields {
                    let idx = f
                        .idx
                        .ok_or_else(|| CodegenError::new("field index missing"))?
                        as usize;
                    let field_ty = &field_tys[idx];
                    match wat_ty(field_ty) {
                        Some(wat) => {
                            self.ins(format!("local.get {}", scratch));
                            self.emit_expr(&f.value)?;
                            self.ins(format!(
                                "{}.store offset={}",
                                wat, layout.field_offsets[idx]
                            ));
                        }
                        None => self.emit_expr(&f.value)?,
                    }
                }
                self.ins(format!("local.get {}", scratch));
                self.lit_depth -= 1;
            }

            ExprKind::TupleLiteral { elems } => {
                if elems.is_empty() {
                    return Ok(());
                }
                let field_tys: Vec<Ty> = elems.iter().map(|e| e.ty.clone()).collect();
                let layout = layout_of(&field_tys);
                let scratch = self.scratch_base + self.lit_depth;
                self.lit_depth += 1;

                self.ins(format!("i32.const {}", layout.size));
                self.ins("call $rill.alloc");
                self.ins(format!("local.set {}", scratch));
                for (i, e) in elems.iter().enumerate() {
                    match wat_ty(&field_tys[i]) {
                        Some(wat) => {
                            self.ins(format!("local.get {}", scratch));
                            self.emit_expr(e)?;
                            self.ins(format!(
                                "{}.store offset={}",
                                wat, layout.field_offsets[i]
                            ));
                        }
                        None => self.emit_expr(e)?,
                    }
                }
                self.ins(format!("local.get {}", scratch));
                self.lit_depth -= 1;
            }

            ExprKind::Assign { target, value } => match &target.kind {
                ExprKind::Ident(n) => {
                    self.emit_assign_to_res(&n.res, value)?;
                }
                ExprKind::Path { res, .. } => {
                    let res = res.clone();
                    self.emit_assign_to_res(&res, value)?;
                }
                ExprKind::FieldAccess { base, idx, .. } => {
                    self.emit_expr(base)?;
                    let field_tys = self.field_tys_of(&base.ty)?;
                    let idx = idx
                        .ok_or_else(|| CodegenError::new("field index missing"))?
                        as usize;
                    let layout = layout_of(&field_tys);
                    self.emit_expr(value)?;
                    match wat_ty(&field_tys[idx]) {
                        Some(wat) => self.ins(format!(
                            "{}.store offset={}",
                            wat, layout.field_offsets[idx]
                        )),
                        None => self.ins("drop"),
                    }
                }
                _ => self.ins("unreachable"),
            },

            ExprKind::Asm { instrs } => {
                for instr in instrs {
                    self.ins(instr);
                }
            }

            ExprKind::Error(_) => self.ins("unreachable"),
        }
        Ok(())
    }

    fn emit_assign_to_res(&mut self, res: &Resolution, value: &Expr<Typecked>) -> Result<()> {
        match res {
            Resolution::Local { index } => {
                let slot = self.local_slot(*index)?;
                self.emit_expr(value)?;
                if let Some(idx) = slot.wat {
                    self.ins(format!("local.set {}", idx));
                }
            }
            Resolution::Item(id) => {
                let path = self.item_of(*id)?.def_path.clone();
                self.emit_expr(value)?;
                if wat_ty(&value.ty).is_some() {
                    self.ins(format!("global.set ${}", path));
                }
            }
            _ => self.ins("unreachable"),
        }
        Ok(())
    }

    fn local_slot(&self, index: u32) -> Result<LocalSlot> {
        self.locals
            .len()
            .checked_sub(1 + index as usize)
            .and_then(|pos| self.locals.get(pos))
            .copied()
            .ok_or_else(|| CodegenError::new("local index out of range"))
    }

    fn emit_value(&mut self, res: &Resolution, ty: &Ty) -> Result<()> {
        match res {
            Resolution::Local { index } => {
                let slot = self.local_slot(*index)?;
                if let Some(idx) = slot.wat {
                    self.ins(format!("local.get {}", idx));
                }
            }
            Resolution::Item(id) => match &self.item_of(*id)?.kind {
                ItemKind::Global(_) => {
                    if wat_ty(ty).is_some() {
                        let path = self.item_of(*id)?.def_path.clone();
                        self.ins(format!("global.get ${}", path));
                    }
                }
                // no first-class functions in the prototype runtime
                _ => self.ins("unreachable"),
            },
            Resolution::Builtin(Builtin::True) => self.ins("i32.const 1"),
            Resolution::Builtin(Builtin::False) => self.ins("i32.const 0"),
            Resolution::Builtin(Builtin::Null) => self.ins("i32.const 0"),
            Resolution::Builtin(Builtin::Locals) => {
                self.ins(format!("i32.const {}", self.local_total))
            }
            _ => self.ins("unreachable"),
        }
        Ok(())
    }

    fn emit_binary_op(&mut self, op: BinOp, operand_ty: &Ty) -> Result<()> {
        use BinOp::*;

        if matches!(operand_ty, Ty::Str) {
            match op {
                Eq => self.ins("call $rill.str_eq"),
                Ne => {
                    self.ins("call $rill.str_eq");
                    self.ins("i32.eqz");
                }
                Lt | Gt | Le | Ge => {
                    self.ins("call $rill.str_cmp");
                    self.ins("i32.const 0");
                    self.ins(match op {
                        Lt => "i32.lt_s",
                        Gt => "i32.gt_s",
                        Le => "i32.le_s",
                        _ => "i32.ge_s",
                    });
                }
                _ => self.ins("unreachable"),
            }
            return Ok(());
        }

        let prefix = match wat_ty(operand_ty) {
            Some("i64") => "i64",
            _ => "i32",
        };
        let instr = match op {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div_u",
            Rem => "rem_u",
            Eq => "eq",
            Ne => "ne",
            Lt => "lt_u",
            Gt => "gt_u",
            Le => "le_u",
            Ge => "ge_u",
            And => "and",
            Or => "or",
        };
        self.ins(format!("{}.{}", prefix, instr));
        Ok(())
    }

    fn emit_builtin_call(
        &mut self,
        builtin: Builtin,
        args: &[Expr<Typecked>],
        result_ty: &Ty,
    ) -> Result<()> {
        for a in args {
            self.emit_expr(a)?;
        }
        match builtin {
            Builtin::Print => self.ins("call $rill.print"),
            Builtin::Trap => self.ins("unreachable"),
            Builtin::I32Store => self.ins("i32.store"),
            Builtin::I64Store => self.ins("i64.store"),
            Builtin::I32Load => self.ins("i32.load"),
            Builtin::I64Load => self.ins("i64.load"),
            Builtin::MemorySize => self.ins("memory.size"),
            Builtin::MemoryGrow => self.ins("memory.grow"),
            Builtin::I32ExtendToI64U => self.ins("i64.extend_i32_u"),
            Builtin::Transmute => {
                // reinterpret; bridge width changes, otherwise a no-op
                let from = args.first().map(|a| wat_ty(&a.ty)).unwrap_or(None);
                let to = wat_ty(result_ty);
                match (from, to) {
                    (Some("i32"), Some("i64")) => self.ins("i64.extend_i32_u"),
                    (Some("i64"), Some("i32")) => self.ins("i32.wrap_i64"),
                    _ => {}
                }
            }
            _ => self.ins("unreachable"),
        }
        Ok(())
    }

    /// Field types behind a field-access base: a struct, a raw pointer to
    /// a struct, or a tuple
    fn field_tys_of(&self, base_ty: &Ty) -> Result<Vec<Ty>> {
        match base_ty {
            Ty::Struct { id, .. } => self.struct_field_tys(*id),
            Ty::RawPtr(inner) => match inner.as_ref() {
                Ty::Struct { id, .. } => self.struct_field_tys(*id),
                other => Err(CodegenError::new(format!(
                    "cannot access fields of {}",
                    other
                ))),
            },
            Ty::Tuple(elems) => Ok(elems.clone()),
            other => Err(CodegenError::new(format!(
                "cannot access fields of {}",
                other
            ))),
        }
    }
}

fn gather_items<'p>(
    item: &'p Item<Typecked>,
    imports: &mut Vec<(&'p Item<Typecked>, &'p Import<Typecked>)>,
    globals: &mut Vec<(&'p Item<Typecked>, &'p Global<Typecked>)>,
    functions: &mut Vec<(&'p Item<Typecked>, &'p Function<Typecked>)>,
) {
    match &item.kind {
        ItemKind::Import(imp) => imports.push((item, imp)),
        ItemKind::Global(g) => globals.push((item, g)),
        ItemKind::Function(f) => functions.push((item, f)),
        ItemKind::Mod(m) => {
            for child in &m.items {
                gather_items(child, imports, globals, functions);
            }
        }
        _ => {}
    }
}

fn find_main(root: &Package<Typecked>) -> Option<String> {
    if let ItemKind::Mod(m) = &root.root.kind {
        for item in &m.items {
            if item.name == "main" && matches!(item.kind, ItemKind::Function(_)) {
                return Some(item.def_path.to_string());
            }
        }
    }
    None
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:02x}", b)),
        }
    }
    out
}

/// Prototype runtime emitted into every module
const RUNTIME: &str = r#"  (func $rill.alloc (param $size i32) (result i32)
    (local $ptr i32)
    global.get $rill.heap
    local.set $ptr
    global.get $rill.heap
    local.get $size
    i32.add
    global.set $rill.heap
    block $fits
    loop $more
    global.get $rill.heap
    memory.size
    i32.const 65536
    i32.mul
    i32.le_u
    br_if $fits
    i32.const 1
    memory.grow
    drop
    br $more
    end
    end
    local.get $ptr
  )
  (func $rill.str_eq (param $a i32) (param $b i32) (result i32)
    (local $len i32)
    (local $i i32)
    local.get $a
    i32.load
    local.get $b
    i32.load
    i32.ne
    if
    i32.const 0
    return
    end
    local.get $a
    i32.load
    local.set $len
    i32.const 0
    local.set $i
    block $done
    loop $next
    local.get $i
    local.get $len
    i32.ge_u
    br_if $done
    local.get $a
    i32.const 4
    i32.add
    local.get $i
    i32.add
    i32.load8_u
    local.get $b
    i32.const 4
    i32.add
    local.get $i
    i32.add
    i32.load8_u
    i32.ne
    if
    i32.const 0
    return
    end
    local.get $i
    i32.const 1
    i32.add
    local.set $i
    br $next
    end
    end
    i32.const 1
  )
  (func $rill.str_cmp (param $a i32) (param $b i32) (result i32)
    (local $la i32)
    (local $lb i32)
    (local $min i32)
    (local $i i32)
    (local $ca i32)
    (local $cb i32)
    local.get $a
    i32.load
    local.set $la
    local.get $b
    i32.load
    local.set $lb
    local.get $la
    local.get $lb
    i32.lt_u
    if (result i32)
    local.get $la
    else
    local.get $lb
    end
    local.set $min
    i32.const 0
    local.set $i
    block $done
    loop $next
    local.get $i
    local.get $min
    i32.ge_u
    br_if $done
    local.get $a
    i32.const 4
    i32.add
    local.get $i
    i32.add
    i32.load8_u
    local.set $ca
    local.get $b
    i32.const 4
    i32.add
    local.get $i
    i32.add
    i32.load8_u
    local.set $cb
    local.get $ca
    local.get $cb
    i32.ne
    if
    local.get $ca
    local.get $cb
    i32.lt_u
    if (result i32)
    i32.const -1
    else
    i32.const 1
    end
    return
    end
    local.get $i
    i32.const 1
    i32.add
    local.set $i
    br $next
    end
    end
    local.get $la
    local.get $lb
    i32.lt_u
    if (result i32)
    i32.const -1
    else
    local.get $la
    local.get $lb
    i32.gt_u
    if (result i32)
    i32.const 1
    else
    i32.const 0
    end
    end
  )
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rill_ast::context::NoLoader;
    use rill_lexer::Span;
    use rill_parser::Parser;
    use rill_resolve::resolve_package;
    use rill_session::Options;
    use rill_typeck::typecheck_package;
    use std::path::PathBuf;

    fn compile(src: &str) -> (Context, String) {
        let mut ctx = Context::new(Options::default());
        let file = ctx.sources.add_file("main.rl", src);
        let items = Parser::parse(file, src).unwrap();
        let pkg_id = ctx.fresh_pkg_id();
        let span = Span::new(file, 0, src.len());
        let built = build_package(pkg_id, "main", PathBuf::from("main.rl"), span, items);
        let mut loader = NoLoader;
        let resolved = resolve_package(&mut ctx, &mut loader, built);
        let typed = typecheck_package(&mut ctx, resolved);
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        let wat = generate(&ctx, &typed).unwrap();
        (ctx, wat)
    }

    #[test]
    fn test_simple_function() {
        let (_, wat) = compile("function main() = ( let a: Int = 1; a );");
        assert!(wat.contains("(func $main.main (result i64)"));
        assert!(wat.contains("i64.const 1"));
        assert!(wat.contains("local.set 0"));
        assert!(wat.contains("(export \"main\" (func $main.main))"));
    }

    #[test]
    fn test_string_literal_interned() {
        let (_, wat) = compile("function main() = print(\"hi\");");
        assert!(wat.contains("(data (i32.const 8) \"\\02\\00\\00\\00hi\")"));
        assert!(wat.contains("call $rill.print"));
    }

    #[test]
    fn test_loop_break_labels() {
        let (_, wat) = compile("function main() = loop ( break );");
        assert!(wat.contains("block $break_0"));
        assert!(wat.contains("loop $loop_0"));
        assert!(wat.contains("br $break_0"));
        assert!(wat.contains("br $loop_0"));
    }

    #[test]
    fn test_struct_literal_allocates() {
        let (_, wat) = compile(
            "type Pair = struct { x: I32, y: Int };\n\
             function main() = ( let p = Pair { x: 1_I32, y: 2 }; p.y );",
        );
        assert!(wat.contains("i32.const 16"), "{}", wat);
        assert!(wat.contains("call $rill.alloc"));
        assert!(wat.contains("i32.store offset=4"));
        assert!(wat.contains("i64.store offset=8"));
        assert!(wat.contains("i64.load offset=8"));
    }

    #[test]
    fn test_import_declaration() {
        let (_, wat) = compile(
            "import (\"env\" \"log_i64\") function log(x: Int);\n\
             function main() = log(7);",
        );
        assert!(wat.contains(
            "(import \"env\" \"log_i64\" (func $main.log (param i64)))"
        ));
        assert!(wat.contains("call $main.log"));
    }

    #[test]
    fn test_globals_initialized_by_start() {
        let (_, wat) = compile(
            "global mut counter: Int = 41;\n\
             function main() = ( counter = counter + 1; counter );",
        );
        assert!(wat.contains("(global $main.counter (mut i64) (i64.const 0))"));
        assert!(wat.contains("(func $rill.init"));
        assert!(wat.contains("global.set $main.counter"));
        assert!(wat.contains("(start $rill.init)"));
    }

    #[test]
    fn test_module_function_symbols() {
        let (_, wat) = compile(
            "mod m ( function g(): Int = 3; ); function main() = m.g();",
        );
        assert!(wat.contains("(func $main.m.g (result i64)"));
        assert!(wat.contains("call $main.m.g"));
    }

    #[test]
    fn test_if_yields_value() {
        let (_, wat) = compile("function main() = if true then 1 else 2;");
        assert!(wat.contains("if (result i64)"));
    }

    #[test]
    fn test_trap_and_memory_builtins() {
        let (_, wat) = compile(
            "function main() = ( __i32_store(0_I32, 1_I32); trap() );",
        );
        assert!(wat.contains("i32.store"));
        assert!(wat.contains("unreachable"));
    }

    #[test]
    fn test_asm_spliced_verbatim() {
        let (_, wat) = compile(
            "function main(): I32 = ___asm(\"i32.const 42\");",
        );
        assert!(wat.contains("i32.const 42"));
    }
}
