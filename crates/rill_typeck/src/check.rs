//! Expression checking: resolved -> typecked.
//!
//! The checker is a fold over the resolved package. One inference context
//! serves the whole package, so forward references between functions with
//! inferred return types unify. Each body is deep-resolved by the zonk
//! fold once its function completes; unbound variables there become
//! `cannot infer type` diagnostics.

use std::collections::{HashMap, HashSet};

use rill_ast::fold::{fold_package, Folder};
use rill_ast::*;
use rill_lexer::Span;
use rill_session::ErrorSink;

use crate::infer::InferCtx;
use crate::lower::{scrape_sigs, SigSource};

pub struct Checker<'a> {
    pub(crate) ctx: &'a mut Context,
    pub(crate) pkg_id: PkgId,
    pub(crate) infcx: InferCtx,
    pub(crate) tables: TyckTables,
    pub(crate) sigs: HashMap<ItemId, SigSource>,
    pub(crate) sig_spans: HashMap<ItemId, Span>,
    pub(crate) lowering: HashSet<ItemId>,
    root_span: Span,
    /// Types of the locals stack, parallel to the resolver's name stack
    local_tys: Vec<Ty>,
    loops: Vec<LoopState>,
}

struct LoopState {
    id: LoopId,
    has_break: bool,
}

/// Type-check a resolved package, producing the final phase
pub fn typecheck_package(ctx: &mut Context, pkg: Package<Resolved>) -> Package<Typecked> {
    let (sigs, sig_spans) = scrape_sigs(&pkg);
    let root_span = pkg.root.span;
    let mut checker = Checker {
        ctx,
        pkg_id: pkg.id,
        infcx: InferCtx::new(),
        tables: TyckTables::default(),
        sigs,
        sig_spans,
        lowering: HashSet::new(),
        root_span,
        local_tys: Vec::new(),
        loops: Vec::new(),
    };
    fold_package(&mut checker, pkg)
}

impl<'a> Checker<'a> {
    fn mk(&self, span: Span, ty: Ty, kind: ExprKind<Typecked>) -> Expr<Typecked> {
        Expr { span, ty, kind }
    }

    fn item_span(&self, id: ItemId) -> Span {
        self.sig_spans.get(&id).copied().unwrap_or(self.root_span)
    }

    fn is_module_like(&self, id: ItemId) -> bool {
        if id.pkg == self.pkg_id {
            self.sigs
                .get(&id)
                .map(|s| s.is_module_like())
                .unwrap_or(false)
        } else {
            matches!(
                self.ctx
                    .dep(id.pkg)
                    .and_then(|p| p.find_item(id))
                    .map(|i| &i.kind),
                Some(ItemKind::Mod(_)) | Some(ItemKind::Extern(_))
            )
        }
    }

    fn global_mutability(&self, id: ItemId) -> Option<bool> {
        if id.pkg == self.pkg_id {
            match self.sigs.get(&id) {
                Some(SigSource::Global { mutable, .. }) => Some(*mutable),
                _ => None,
            }
        } else {
            match self
                .ctx
                .dep(id.pkg)
                .and_then(|p| p.find_item(id))
                .map(|i| &i.kind)
            {
                Some(ItemKind::Global(g)) => Some(g.mutable),
                _ => None,
            }
        }
    }

    /// The type a resolution denotes when used as a value
    fn type_of_value(&mut self, res: &Resolution, span: Span) -> Ty {
        match res {
            Resolution::Local { index } => {
                let pos = self
                    .local_tys
                    .len()
                    .checked_sub(1 + *index as usize);
                match pos.and_then(|p| self.local_tys.get(p)) {
                    Some(ty) => ty.clone(),
                    None => unreachable!("local index {} out of range", index),
                }
            }
            Resolution::Item(id) => {
                if self.is_module_like(*id) {
                    return Ty::Error(
                        self.ctx
                            .sink
                            .emit("module cannot be used as a value", span),
                    );
                }
                match self.type_of_item(*id, span) {
                    Some(ty) => ty,
                    None => Ty::Error(
                        self.ctx
                            .sink
                            .emit("this item cannot be used as a value", span),
                    ),
                }
            }
            Resolution::Builtin(b) => self.type_of_builtin(*b, span),
            Resolution::TyParam { name, .. } => Ty::Error(self.ctx.sink.emit(
                format!("type parameter `{}` cannot be used as a value", name),
                span,
            )),
            Resolution::Error(tok) => Ty::Error(*tok),
        }
    }

    fn type_of_builtin(&mut self, builtin: Builtin, span: Span) -> Ty {
        match builtin {
            Builtin::Print => Ty::func(vec![Ty::Str], Ty::Unit),
            Builtin::True | Builtin::False => Ty::Bool,
            Builtin::Trap => Ty::func(Vec::new(), Ty::Never),
            Builtin::Null => {
                let pointee = self.infcx.new_var();
                Ty::raw_ptr(pointee)
            }
            Builtin::I32Store => Ty::func(vec![Ty::I32, Ty::I32], Ty::Unit),
            Builtin::I64Store => Ty::func(vec![Ty::I32, Ty::Int], Ty::Unit),
            Builtin::I32Load => Ty::func(vec![Ty::I32], Ty::I32),
            Builtin::I64Load => Ty::func(vec![Ty::I32], Ty::Int),
            Builtin::MemorySize => Ty::func(Vec::new(), Ty::I32),
            Builtin::MemoryGrow => Ty::func(vec![Ty::I32], Ty::I32),
            Builtin::I32ExtendToI64U => Ty::func(vec![Ty::I32], Ty::Int),
            Builtin::Locals => Ty::I32,
            Builtin::StringTy | Builtin::IntTy | Builtin::I32Ty | Builtin::BoolTy => {
                Ty::Error(self.ctx.sink.emit(
                    format!("type `{}` cannot be used as a value", builtin.name()),
                    span,
                ))
            }
            Builtin::Transmute | Builtin::Asm => Ty::Error(self.ctx.sink.emit(
                format!(
                    "compiler intrinsic `{}` must be called directly",
                    builtin.name()
                ),
                span,
            )),
        }
    }

    fn invalid_operands(&mut self, op: BinOp, l: &Ty, r: &Ty, span: Span) -> Ty {
        Ty::Error(self.ctx.sink.emit(
            format!("invalid operand types for `{}`: {} and {}", op, l, r),
            span,
        ))
    }

    fn check_binary(&mut self, op: BinOp, lhs: &Ty, rhs: &Ty, span: Span) -> Ty {
        let mut l = self.infcx.resolve_if_possible(lhs);
        let mut r = self.infcx.resolve_if_possible(rhs);
        if l.is_error() {
            return l;
        }
        if r.is_error() {
            return r;
        }
        // pull a lone variable toward the concrete side
        if l.is_var() != r.is_var() {
            let _ = self.infcx.unify(&l, &r);
            l = self.infcx.resolve_if_possible(&l);
            r = self.infcx.resolve_if_possible(&r);
        }

        match op.class() {
            OpClass::Comparison => {
                let ok = match (&l, &r) {
                    (Ty::Int, Ty::Int) | (Ty::I32, Ty::I32) | (Ty::Str, Ty::Str) => true,
                    (Ty::Bool, Ty::Bool) => matches!(op, BinOp::Eq | BinOp::Ne),
                    (Ty::RawPtr(a), Ty::RawPtr(b)) => {
                        // pointee types must unify; a mismatch is diagnosed
                        // like any other
                        self.infcx.assign(&mut self.ctx.sink, a, b, span);
                        true
                    }
                    (Ty::Never, _) | (_, Ty::Never) => true,
                    _ => false,
                };
                if ok {
                    Ty::Bool
                } else {
                    self.invalid_operands(op, &l, &r, span)
                }
            }
            // a diverging operand adopts the other side's type, but that
            // side must still be a valid operand of the class
            OpClass::Additive | OpClass::Multiplicative => match (&l, &r) {
                (Ty::Int, Ty::Int) => Ty::Int,
                (Ty::I32, Ty::I32) => Ty::I32,
                (Ty::Never, Ty::Int) | (Ty::Int, Ty::Never) => Ty::Int,
                (Ty::Never, Ty::I32) | (Ty::I32, Ty::Never) => Ty::I32,
                (Ty::Never, Ty::Never) => Ty::Never,
                _ => self.invalid_operands(op, &l, &r, span),
            },
            OpClass::Logical => match (&l, &r) {
                (Ty::Bool, Ty::Bool)
                | (Ty::Never, Ty::Bool)
                | (Ty::Bool, Ty::Never)
                | (Ty::Never, Ty::Never) => Ty::Bool,
                _ => self.invalid_operands(op, &l, &r, span),
            },
        }
    }

    /// The target must be a local, a mutable global, or a field chain
    /// rooted in one
    fn check_lvalue(&mut self, target: &Expr<Typecked>) {
        fn root_res(expr: &Expr<Typecked>) -> Option<&Resolution> {
            match &expr.kind {
                ExprKind::Ident(n) => Some(&n.res),
                ExprKind::Path { res, .. } => Some(res),
                ExprKind::FieldAccess { base, .. } => root_res(base),
                _ => None,
            }
        }

        match root_res(target) {
            Some(Resolution::Local { .. }) => {}
            Some(Resolution::Item(id)) => match self.global_mutability(*id) {
                Some(true) => {}
                Some(false) => {
                    self.ctx.sink.emit(
                        "global is not mutable; declare it with `mut`",
                        target.span,
                    );
                }
                None => {
                    self.ctx
                        .sink
                        .emit("cannot assign to a non-global item", target.span);
                }
            },
            Some(Resolution::Builtin(b)) => {
                self.ctx.sink.emit(
                    format!("cannot assign to builtin `{}`", b.name()),
                    target.span,
                );
            }
            Some(Resolution::TyParam { .. }) => {
                self.ctx
                    .sink
                    .emit("cannot assign to a type parameter", target.span);
            }
            Some(Resolution::Error(_)) => {}
            None => {
                self.ctx.sink.emit("invalid assignment target", target.span);
            }
        }
    }

    fn retype_callee(&self, callee: Expr<Resolved>, ty: Ty) -> Expr<Typecked> {
        let kind = match callee.kind {
            ExprKind::Ident(n) => ExprKind::Ident(Name {
                name: n.name,
                span: n.span,
                res: n.res,
            }),
            ExprKind::Path { segments, res } => ExprKind::Path { segments, res },
            _ => unreachable!("intrinsic callee is an identifier"),
        };
        Expr {
            span: callee.span,
            ty,
            kind,
        }
    }

    fn zonk_expr(&mut self, expr: Expr<Typecked>) -> Expr<Typecked> {
        let mut zonker = Zonker {
            infcx: &self.infcx,
            sink: &mut self.ctx.sink,
        };
        zonker.fold_expr(expr)
    }

    fn check_expr(&mut self, expr: Expr<Resolved>) -> Expr<Typecked> {
        let span = expr.span;
        match expr.kind {
            ExprKind::Empty => self.mk(span, Ty::Unit, ExprKind::Empty),

            ExprKind::Literal(lit) => {
                let ty = match &lit {
                    Lit::Str(_) => Ty::Str,
                    Lit::Int(_, IntKind::Int) => Ty::Int,
                    Lit::Int(_, IntKind::I32) => Ty::I32,
                };
                self.mk(span, ty, ExprKind::Literal(lit))
            }

            ExprKind::Let {
                name,
                name_span,
                ascription,
                init,
                ..
            } => {
                let declared = match &ascription {
                    Some(ty) => self.lower_ast_ty(ty),
                    None => self.infcx.new_var(),
                };
                let init = self.check_expr(*init);
                self.infcx
                    .assign(&mut self.ctx.sink, &declared, &init.ty, init.span);
                self.local_tys.push(declared.clone());
                let ascription = ascription.map(|t| self.fold_ast_ty(t));
                self.mk(
                    span,
                    Ty::Unit,
                    ExprKind::Let {
                        name,
                        name_span,
                        ascription,
                        init: Box::new(init),
                        local_ty: Some(declared),
                    },
                )
            }

            ExprKind::Block { exprs, locals } => {
                let depth = self.local_tys.len();
                let exprs: Vec<Expr<Typecked>> =
                    exprs.into_iter().map(|e| self.check_expr(e)).collect();
                self.local_tys.truncate(depth);
                let ty = exprs.last().map(|e| e.ty.clone()).unwrap_or(Ty::Unit);
                self.mk(span, ty, ExprKind::Block { exprs, locals })
            }

            ExprKind::Ident(name) => {
                let ty = self.type_of_value(&name.res, name.span);
                self.mk(
                    span,
                    ty,
                    ExprKind::Ident(Name {
                        name: name.name,
                        span: name.span,
                        res: name.res,
                    }),
                )
            }

            ExprKind::Path { segments, res } => {
                let ty = self.type_of_value(&res, span);
                self.mk(span, ty, ExprKind::Path { segments, res })
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expr(*lhs);
                let rhs = self.check_expr(*rhs);
                let ty = self.check_binary(op, &lhs.ty, &rhs.ty, span);
                self.mk(
                    span,
                    ty,
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.check_expr(*operand);
                let ty = match op {
                    UnOp::Not => {
                        let t = self.infcx.resolve_if_possible(&operand.ty);
                        match t {
                            Ty::Int | Ty::I32 | Ty::Bool | Ty::Never | Ty::Error(_) => t,
                            other => Ty::Error(self.ctx.sink.emit(
                                format!("invalid operand type for `!`: {}", other),
                                span,
                            )),
                        }
                    }
                    UnOp::Neg => Ty::Error(
                        self.ctx
                            .sink
                            .emit("unary `-` is not supported", span),
                    ),
                };
                self.mk(
                    span,
                    ty,
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                )
            }

            ExprKind::Call { callee, args } => {
                let callee_res = match &callee.kind {
                    ExprKind::Ident(n) => Some(n.res.clone()),
                    ExprKind::Path { res, .. } => Some(res.clone()),
                    _ => None,
                };

                // `___transmute` ignores its argument types and produces a
                // fresh variable
                if callee_res == Some(Resolution::Builtin(Builtin::Transmute)) {
                    let args: Vec<Expr<Typecked>> =
                        args.into_iter().map(|a| self.check_expr(a)).collect();
                    let result = self.infcx.new_var();
                    let callee_ty =
                        Ty::func(args.iter().map(|a| a.ty.clone()).collect(), result.clone());
                    let callee = self.retype_callee(*callee, callee_ty);
                    return self.mk(
                        span,
                        result,
                        ExprKind::Call {
                            callee: Box::new(callee),
                            args,
                        },
                    );
                }

                let callee = self.check_expr(*callee);
                let callee_ty = self.infcx.resolve_if_possible(&callee.ty);
                let args: Vec<Expr<Typecked>> =
                    args.into_iter().map(|a| self.check_expr(a)).collect();
                let ty = match callee_ty {
                    Ty::Fn { params, ret } => {
                        if params.len() != args.len() {
                            self.ctx.sink.emit(
                                format!(
                                    "expected {} arguments, found {}",
                                    params.len(),
                                    args.len()
                                ),
                                span,
                            );
                        }
                        for (param, arg) in params.iter().zip(args.iter()) {
                            self.infcx
                                .assign(&mut self.ctx.sink, param, &arg.ty, arg.span);
                        }
                        *ret
                    }
                    Ty::Error(tok) => Ty::Error(tok),
                    other => Ty::Error(self.ctx.sink.emit(
                        format!("cannot call a value of type {}", other),
                        callee.span,
                    )),
                };
                self.mk(
                    span,
                    ty,
                    ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                )
            }

            ExprKind::FieldAccess {
                base,
                field,
                field_span,
                ..
            } => {
                let base = self.check_expr(*base);
                let base_ty = self.infcx.resolve_if_possible(&base.ty);
                // field access through a raw pointer is permitted when the
                // pointee is a struct
                let through = match base_ty {
                    Ty::RawPtr(inner) => {
                        let inner = self.infcx.resolve_if_possible(&inner);
                        if matches!(inner, Ty::Struct { .. }) {
                            inner
                        } else {
                            Ty::RawPtr(Box::new(inner))
                        }
                    }
                    other => other,
                };

                let (ty, idx) = match &through {
                    Ty::Tuple(elems) => match &field {
                        FieldName::Index(n) if (*n as usize) < elems.len() => {
                            (elems[*n as usize].clone(), Some(*n as u32))
                        }
                        FieldName::Index(n) => (
                            Ty::Error(self.ctx.sink.emit(
                                format!("no field `{}` on {}", n, through),
                                field_span,
                            )),
                            None,
                        ),
                        FieldName::Named(f) => (
                            Ty::Error(self.ctx.sink.emit(
                                format!("tuple fields are numeric, found `{}`", f),
                                field_span,
                            )),
                            None,
                        ),
                    },
                    Ty::Struct { id, name } => match &field {
                        FieldName::Named(f) => {
                            let fields =
                                self.fields_of_struct(*id, field_span).unwrap_or_default();
                            match fields.iter().position(|(n, _)| n == f) {
                                Some(i) => (fields[i].1.clone(), Some(i as u32)),
                                None => (
                                    Ty::Error(self.ctx.sink.emit(
                                        format!("no field `{}` on `{}`", f, name),
                                        field_span,
                                    )),
                                    None,
                                ),
                            }
                        }
                        FieldName::Index(n) => (
                            Ty::Error(self.ctx.sink.emit(
                                format!("no field `{}` on `{}`", n, name),
                                field_span,
                            )),
                            None,
                        ),
                    },
                    Ty::Error(tok) => (Ty::Error(*tok), None),
                    other => (
                        Ty::Error(self.ctx.sink.emit(
                            format!("type {} has no fields", other),
                            field_span,
                        )),
                        None,
                    ),
                };

                self.mk(
                    span,
                    ty,
                    ExprKind::FieldAccess {
                        base: Box::new(base),
                        field,
                        field_span,
                        idx,
                    },
                )
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.check_expr(*cond);
                self.infcx
                    .assign(&mut self.ctx.sink, &Ty::Bool, &cond.ty, cond.span);
                let then_branch = self.check_expr(*then_branch);
                let (else_branch, ty) = match else_branch {
                    Some(els) => {
                        let els = self.check_expr(*els);
                        self.infcx
                            .assign(&mut self.ctx.sink, &then_branch.ty, &els.ty, els.span);
                        // a diverging then-branch takes the else type
                        let ty = if self.infcx.resolve_if_possible(&then_branch.ty).is_never()
                        {
                            els.ty.clone()
                        } else {
                            then_branch.ty.clone()
                        };
                        (Some(Box::new(els)), ty)
                    }
                    None => {
                        self.infcx.assign(
                            &mut self.ctx.sink,
                            &Ty::Unit,
                            &then_branch.ty,
                            then_branch.span,
                        );
                        (None, Ty::Unit)
                    }
                };
                self.mk(
                    span,
                    ty,
                    ExprKind::If {
                        cond: Box::new(cond),
                        then_branch: Box::new(then_branch),
                        else_branch,
                    },
                )
            }

            ExprKind::Loop { id, body } => {
                self.loops.push(LoopState {
                    id,
                    has_break: false,
                });
                let body = self.check_expr(*body);
                self.infcx
                    .assign(&mut self.ctx.sink, &Ty::Unit, &body.ty, body.span);
                let state = self.loops.pop().unwrap();
                let ty = if state.has_break { Ty::Unit } else { Ty::Never };
                self.mk(
                    span,
                    ty,
                    ExprKind::Loop {
                        id,
                        body: Box::new(body),
                    },
                )
            }

            ExprKind::Break { .. } => match self.loops.last_mut() {
                Some(state) => {
                    state.has_break = true;
                    let target = Some(state.id);
                    self.mk(span, Ty::Never, ExprKind::Break { target })
                }
                None => {
                    let tok = self.ctx.sink.emit("`break` outside of a loop", span);
                    self.mk(span, Ty::Error(tok), ExprKind::Error(tok))
                }
            },

            ExprKind::StructLiteral { name, fields } => {
                let struct_ty = match &name.res {
                    Resolution::Item(id) => self
                        .type_of_item(*id, name.span)
                        .map(|t| self.infcx.resolve_if_possible(&t)),
                    Resolution::Error(tok) => Some(Ty::Error(*tok)),
                    _ => None,
                };
                let (struct_id, ty) = match struct_ty {
                    Some(Ty::Struct { id, name: sname }) => {
                        (Some(id), Ty::Struct { id, name: sname })
                    }
                    Some(Ty::Error(tok)) => (None, Ty::Error(tok)),
                    _ => {
                        let tok = self.ctx.sink.emit(
                            format!("`{}` is not a struct", name.name),
                            name.span,
                        );
                        (None, Ty::Error(tok))
                    }
                };

                let declared = struct_id
                    .and_then(|id| self.fields_of_struct(id, name.span))
                    .unwrap_or_default();
                let mut assigned = vec![false; declared.len()];

                let fields: Vec<FieldInit<Typecked>> = fields
                    .into_iter()
                    .map(|f| {
                        let value = self.check_expr(f.value);
                        let idx = declared.iter().position(|(n, _)| *n == f.name);
                        match idx {
                            Some(i) => {
                                let (_, field_ty) = declared[i].clone();
                                self.infcx.assign(
                                    &mut self.ctx.sink,
                                    &field_ty,
                                    &value.ty,
                                    value.span,
                                );
                                assigned[i] = true;
                            }
                            None => {
                                if struct_id.is_some() {
                                    self.ctx.sink.emit(
                                        format!(
                                            "no field `{}` on `{}`",
                                            f.name, name.name
                                        ),
                                        f.span,
                                    );
                                }
                            }
                        }
                        FieldInit {
                            name: f.name,
                            span: f.span,
                            value,
                            idx: idx.map(|i| i as u32),
                        }
                    })
                    .collect();

                if struct_id.is_some() {
                    let missing: Vec<&str> = declared
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !assigned[*i])
                        .map(|(_, (n, _))| n.as_str())
                        .collect();
                    if !missing.is_empty() {
                        self.ctx.sink.emit(
                            format!("missing fields in literal: {}", missing.join(", ")),
                            span,
                        );
                    }
                }

                self.mk(
                    span,
                    ty,
                    ExprKind::StructLiteral {
                        name: Name {
                            name: name.name,
                            span: name.span,
                            res: name.res,
                        },
                        fields,
                    },
                )
            }

            ExprKind::TupleLiteral { elems } => {
                let elems: Vec<Expr<Typecked>> =
                    elems.into_iter().map(|e| self.check_expr(e)).collect();
                let ty = Ty::tuple(elems.iter().map(|e| e.ty.clone()).collect());
                self.mk(span, ty, ExprKind::TupleLiteral { elems })
            }

            ExprKind::Assign { target, value } => {
                let target = self.check_expr(*target);
                let value = self.check_expr(*value);
                self.infcx
                    .assign(&mut self.ctx.sink, &target.ty, &value.ty, value.span);
                self.check_lvalue(&target);
                self.mk(
                    span,
                    Ty::Unit,
                    ExprKind::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                )
            }

            ExprKind::Asm { instrs } => {
                let ty = self.infcx.new_var();
                self.mk(span, ty, ExprKind::Asm { instrs })
            }

            ExprKind::Error(tok) => self.mk(span, Ty::Error(tok), ExprKind::Error(tok)),
        }
    }
}

impl<'a> Folder<Resolved, Typecked> for Checker<'a> {
    fn fold_item_id(&mut self, id: ItemId) -> ItemId {
        id
    }

    fn fold_loop_id(&mut self, id: LoopId) -> LoopId {
        id
    }

    fn fold_def_path(&mut self, path: DefPath, _item_name: &str) -> DefPath {
        path
    }

    fn fold_res(&mut self, res: Resolution) -> Resolution {
        res
    }

    fn fold_expr_ty(&mut self, _ty: ()) -> Ty {
        unreachable!("the checker types every expression it folds")
    }

    fn fold_expr(&mut self, expr: Expr<Resolved>) -> Expr<Typecked> {
        self.check_expr(expr)
    }

    fn fold_tables(&mut self, _tables: ()) -> TyckTables {
        // lower signatures nothing referenced, so dependants see them
        let mut ids: Vec<ItemId> = self.sigs.keys().copied().collect();
        ids.sort();
        for id in ids {
            let span = self.item_span(id);
            self.type_of_item(id, span);
        }

        let mut tables = std::mem::take(&mut self.tables);
        let item_ids: Vec<ItemId> = tables.item_tys.keys().copied().collect();
        for id in item_ids {
            let ty = tables.item_tys.get(&id).cloned().unwrap_or(Ty::Unit);
            let resolved = self.infcx.resolve_deep(&ty);
            let final_ty = if resolved.contains_var() {
                let span = self.item_span(id);
                Ty::Error(self.ctx.sink.emit("cannot infer type", span))
            } else {
                resolved
            };
            tables.item_tys.insert(id, final_ty);
        }
        tables
    }

    fn fold_item(&mut self, item: Item<Resolved>) -> Item<Typecked> {
        let span = item.span;
        let id = item.id;
        match item.kind {
            ItemKind::Function(f) => {
                let fn_ty = self
                    .type_of_item(id, span)
                    .map(|t| self.infcx.resolve_if_possible(&t));
                let (param_tys, ret_ty) = match fn_ty {
                    Some(Ty::Fn { params, ret }) => (params, *ret),
                    Some(other) => (Vec::new(), other),
                    None => (Vec::new(), Ty::Unit),
                };

                let depth = self.local_tys.len();
                for (i, _) in f.params.iter().enumerate() {
                    self.local_tys
                        .push(param_tys.get(i).cloned().unwrap_or(Ty::Unit));
                }
                let body = self.check_expr(f.body);
                self.infcx
                    .assign(&mut self.ctx.sink, &ret_ty, &body.ty, body.span);
                self.local_tys.truncate(depth);
                let body = self.zonk_expr(body);

                Item {
                    span,
                    id,
                    name: item.name,
                    def_path: item.def_path,
                    kind: ItemKind::Function(Function {
                        generics: f.generics,
                        params: f
                            .params
                            .into_iter()
                            .map(|p| self.fold_param(p))
                            .collect(),
                        ret: f.ret.map(|t| self.fold_ast_ty(t)),
                        body,
                    }),
                }
            }
            ItemKind::Global(g) => {
                let declared = self
                    .type_of_item(id, span)
                    .unwrap_or(Ty::Unit);
                let init = self.check_expr(g.init);
                self.infcx
                    .assign(&mut self.ctx.sink, &declared, &init.ty, init.span);
                let init = self.zonk_expr(init);

                Item {
                    span,
                    id,
                    name: item.name,
                    def_path: item.def_path,
                    kind: ItemKind::Global(Global {
                        mutable: g.mutable,
                        ty: self.fold_ast_ty(g.ty),
                        init,
                    }),
                }
            }
            kind => self.super_fold_item(Item {
                span,
                id,
                name: item.name,
                def_path: item.def_path,
                kind,
            }),
        }
    }
}

/// The resolver pass run at the end of each body: deep-walks every
/// expression type and local type, replacing variables with their
/// substitutions and diagnosing anything still unbound
struct Zonker<'z> {
    infcx: &'z InferCtx,
    sink: &'z mut ErrorSink,
}

impl<'z> Zonker<'z> {
    fn zonk_ty(&mut self, ty: Ty, span: Span) -> Ty {
        let resolved = self.infcx.resolve_deep(&ty);
        if resolved.contains_var() {
            let tok = self.sink.emit("cannot infer type", span);
            Ty::Error(tok)
        } else {
            resolved
        }
    }
}

impl<'z> Folder<Typecked, Typecked> for Zonker<'z> {
    fn fold_item_id(&mut self, id: ItemId) -> ItemId {
        id
    }

    fn fold_loop_id(&mut self, id: LoopId) -> LoopId {
        id
    }

    fn fold_def_path(&mut self, path: DefPath, _item_name: &str) -> DefPath {
        path
    }

    fn fold_res(&mut self, res: Resolution) -> Resolution {
        res
    }

    fn fold_expr_ty(&mut self, ty: Ty) -> Ty {
        ty
    }

    fn fold_tables(&mut self, tables: TyckTables) -> TyckTables {
        tables
    }

    fn fold_expr(&mut self, expr: Expr<Typecked>) -> Expr<Typecked> {
        let span = expr.span;
        let mut expr = self.super_fold_expr(expr);
        expr.ty = self.zonk_ty(expr.ty.clone(), span);
        if let ExprKind::Let {
            local_ty,
            name_span,
            ..
        } = &mut expr.kind
        {
            let name_span = *name_span;
            if let Some(ty) = local_ty.clone() {
                *local_ty = Some(self.zonk_ty(ty, name_span));
            }
        }
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_ast::context::NoLoader;
    use rill_parser::Parser;
    use rill_resolve::resolve_package;
    use rill_session::Options;
    use std::path::PathBuf;

    fn typecheck(src: &str) -> (Context, Package<Typecked>) {
        let mut ctx = Context::new(Options::default());
        let file = ctx.sources.add_file("main.rl", src);
        let items = Parser::parse(file, src).unwrap();
        let pkg_id = ctx.fresh_pkg_id();
        let span = Span::new(file, 0, src.len());
        let built = build_package(pkg_id, "main", PathBuf::from("main.rl"), span, items);
        let mut loader = NoLoader;
        let resolved = resolve_package(&mut ctx, &mut loader, built);
        let typed = typecheck_package(&mut ctx, resolved);
        (ctx, typed)
    }

    fn find_item<'p>(pkg: &'p Package<Typecked>, name: &str) -> &'p Item<Typecked> {
        fn find<'p>(item: &'p Item<Typecked>, name: &str) -> Option<&'p Item<Typecked>> {
            if item.name == name && item.id.idx != 0 {
                return Some(item);
            }
            if let ItemKind::Mod(m) = &item.kind {
                return m.items.iter().find_map(|i| find(i, name));
            }
            None
        }
        find(&pkg.root, name).expect("item not found")
    }

    fn item_ty(pkg: &Package<Typecked>, name: &str) -> Ty {
        let item = find_item(pkg, name);
        pkg.tables.item_tys.get(&item.id).cloned().expect("item has no type")
    }

    fn body_of<'p>(pkg: &'p Package<Typecked>, name: &str) -> &'p Expr<Typecked> {
        match &find_item(pkg, name).kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!("expected function"),
        }
    }

    fn walk_exprs<'e>(expr: &'e Expr<Typecked>, f: &mut dyn FnMut(&'e Expr<Typecked>)) {
        f(expr);
        match &expr.kind {
            ExprKind::Let { init, .. } => walk_exprs(init, f),
            ExprKind::Assign { target, value } => {
                walk_exprs(target, f);
                walk_exprs(value, f);
            }
            ExprKind::Block { exprs, .. } => exprs.iter().for_each(|e| walk_exprs(e, f)),
            ExprKind::Binary { lhs, rhs, .. } => {
                walk_exprs(lhs, f);
                walk_exprs(rhs, f);
            }
            ExprKind::Unary { operand, .. } => walk_exprs(operand, f),
            ExprKind::Call { callee, args } => {
                walk_exprs(callee, f);
                args.iter().for_each(|a| walk_exprs(a, f));
            }
            ExprKind::FieldAccess { base, .. } => walk_exprs(base, f),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                walk_exprs(cond, f);
                walk_exprs(then_branch, f);
                if let Some(e) = else_branch {
                    walk_exprs(e, f);
                }
            }
            ExprKind::Loop { body, .. } => walk_exprs(body, f),
            ExprKind::StructLiteral { fields, .. } => {
                fields.iter().for_each(|fi| walk_exprs(&fi.value, f))
            }
            ExprKind::TupleLiteral { elems } => elems.iter().for_each(|e| walk_exprs(e, f)),
            _ => {}
        }
    }

    #[test]
    fn test_let_with_ascription_checks() {
        let (ctx, pkg) = typecheck("function main() = ( let a: Int = 1; a );");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "main"), Ty::func(Vec::new(), Ty::Int));
        assert_eq!(
            body_of(&pkg, "main").ty,
            Ty::Int,
            "block type is the last element's type"
        );
    }

    #[test]
    fn test_let_mismatch_reports_at_literal() {
        let src = "function main() = ( let a: Int = \"\"; a );";
        let (ctx, _) = typecheck(src);
        let errors = ctx.sink.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected int, found string");
        // reported at the string literal's span
        let lit_at = src.find('"').unwrap();
        assert_eq!(errors[0].span.start, lit_at);
    }

    #[test]
    fn test_missing_struct_fields() {
        let (ctx, _) = typecheck(
            "type Pair = struct { x: Int, y: Int }; function f() = Pair { x: 1 };",
        );
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "missing fields in literal: y"));
    }

    #[test]
    fn test_unknown_struct_field() {
        let (ctx, _) = typecheck(
            "type Pair = struct { x: Int, y: Int }; function f() = Pair { x: 1, y: 2, z: 3 };",
        );
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("no field `z` on `Pair`")));
    }

    #[test]
    fn test_module_call_through_path() {
        let (ctx, pkg) = typecheck("mod m ( function g() = (); ); function main() = m.g();");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match &body_of(&pkg, "main").kind {
            ExprKind::Call { callee, .. } => {
                assert!(matches!(callee.kind, ExprKind::Path { .. }));
                assert_eq!(callee.ty, Ty::func(Vec::new(), Ty::Unit));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_loop_with_break_is_unit() {
        let (ctx, pkg) = typecheck("function main() = loop ( break );");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "main"), Ty::func(Vec::new(), Ty::Unit));
    }

    #[test]
    fn test_unbroken_loop_is_never() {
        let (ctx, pkg) = typecheck("function main() = loop ( () );");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "main"), Ty::func(Vec::new(), Ty::Never));
    }

    #[test]
    fn test_never_loop_assigns_to_int_local() {
        let (ctx, pkg) =
            typecheck("function main() = ( let a: Int = loop ( () ); a );");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "main"), Ty::func(Vec::new(), Ty::Int));
    }

    #[test]
    fn test_loop_body_must_be_unit() {
        let (ctx, _) = typecheck("function f() = loop ( 1 );");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "expected (), found int"));
    }

    #[test]
    fn test_break_outside_loop() {
        let (ctx, _) = typecheck("function f() = break;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("outside of a loop")));
    }

    #[test]
    fn test_break_targets_innermost_loop() {
        let (ctx, pkg) = typecheck(
            "function f() = loop ( loop ( break ); break );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());

        let mut breaks: Vec<(Option<LoopId>, Vec<LoopId>)> = Vec::new();
        fn collect(
            expr: &Expr<Typecked>,
            enclosing: &mut Vec<LoopId>,
            out: &mut Vec<(Option<LoopId>, Vec<LoopId>)>,
        ) {
            match &expr.kind {
                ExprKind::Loop { id, body } => {
                    enclosing.push(*id);
                    collect(body, enclosing, out);
                    enclosing.pop();
                }
                ExprKind::Break { target } => out.push((*target, enclosing.clone())),
                ExprKind::Block { exprs, .. } => {
                    exprs.iter().for_each(|e| collect(e, enclosing, out))
                }
                _ => {}
            }
        }
        collect(body_of(&pkg, "f"), &mut Vec::new(), &mut breaks);

        assert_eq!(breaks.len(), 2);
        for (target, enclosing) in breaks {
            assert_eq!(target, enclosing.last().copied());
        }
    }

    #[test]
    fn test_forward_reference_infers() {
        let (ctx, pkg) = typecheck("function main() = helper(); function helper() = 1;");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "main"), Ty::func(Vec::new(), Ty::Int));
        assert_eq!(item_ty(&pkg, "helper"), Ty::func(Vec::new(), Ty::Int));
    }

    #[test]
    fn test_phase_completeness_no_vars_survive() {
        let (ctx, pkg) = typecheck(
            "type Pair = struct { x: Int, y: I32 };\n\
             function main() = (\n\
               let p = Pair { x: 1, y: 2_I32 };\n\
               let t = (p.x, p.y);\n\
               let c = if p.x < 2 then true else false;\n\
               print(\"done\");\n\
               t.0\n\
             );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        walk_exprs(body_of(&pkg, "main"), &mut |e| {
            if !matches!(e.kind, ExprKind::Error(_)) {
                assert!(
                    !e.ty.contains_var(),
                    "variable survived zonking: {:?}",
                    e.ty
                );
            }
        });
    }

    #[test]
    fn test_field_indices_recorded() {
        let (ctx, pkg) = typecheck(
            "type Pair = struct { x: Int, y: I32 }; function f(p: Pair) = p.y;",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match &body_of(&pkg, "f").kind {
            ExprKind::FieldAccess { idx, .. } => assert_eq!(*idx, Some(1)),
            _ => panic!("expected field access"),
        }
    }

    #[test]
    fn test_struct_literal_field_indices() {
        let (ctx, pkg) = typecheck(
            "type Pair = struct { x: Int, y: I32 }; function f() = Pair { y: 2_I32, x: 1 };",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match &body_of(&pkg, "f").kind {
            ExprKind::StructLiteral { fields, .. } => {
                assert_eq!(fields[0].idx, Some(1));
                assert_eq!(fields[1].idx, Some(0));
            }
            _ => panic!("expected struct literal"),
        }
    }

    #[test]
    fn test_tuple_field_access() {
        let (ctx, pkg) = typecheck("function f() = (1, 2_I32).1;");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "f"), Ty::func(Vec::new(), Ty::I32));
        match &body_of(&pkg, "f").kind {
            ExprKind::FieldAccess { idx, .. } => assert_eq!(*idx, Some(1)),
            _ => panic!("expected field access"),
        }
    }

    #[test]
    fn test_tuple_index_out_of_range() {
        let (ctx, _) = typecheck("function f() = (1, 2).5;");
        assert!(ctx.sink.errors().iter().any(|e| e.message.contains("no field `5`")));
    }

    #[test]
    fn test_field_access_through_rawptr() {
        let (ctx, pkg) = typecheck(
            "type Pair = struct { x: Int, y: Int }; function f(p: *Pair) = p.x;",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(
            item_ty(&pkg, "f"),
            Ty::func(
                vec![Ty::raw_ptr(item_ty(&pkg, "Pair"))],
                Ty::Int
            )
        );
    }

    #[test]
    fn test_rawptr_to_non_struct_has_no_fields() {
        let (ctx, _) = typecheck("function f(p: *Int) = p.x;");
        assert!(ctx.sink.errors().iter().any(|e| e.message.contains("has no fields")));
    }

    #[test]
    fn test_transmute_returns_fresh_var_bound_by_context() {
        let (ctx, pkg) = typecheck("function f(): I32 = ___transmute(1);");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "f"), Ty::func(Vec::new(), Ty::I32));
    }

    #[test]
    fn test_call_argument_mismatch() {
        let (ctx, _) = typecheck("function g(x: Int) = x; function f() = g(\"s\");");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "expected int, found string"));
    }

    #[test]
    fn test_call_arity_mismatch() {
        let (ctx, _) = typecheck("function g(x: Int, y: Int) = x; function f() = g(1);");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "expected 2 arguments, found 1"));
    }

    #[test]
    fn test_call_non_function() {
        let (ctx, _) = typecheck("function f() = ( let x = 1; x(2) );");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("cannot call a value of type int")));
    }

    #[test]
    fn test_alias_cycle_diagnosed() {
        let (ctx, _) = typecheck("type A = B; type B = A; function f(x: A) = ();");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("cyclic type definition")));
    }

    #[test]
    fn test_alias_resolves_to_struct() {
        let (ctx, pkg) = typecheck(
            "type Pair = struct { x: Int, y: Int }; type P = Pair; function f() = P { x: 1, y: 2 };",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match item_ty(&pkg, "f") {
            Ty::Fn { ret, .. } => assert!(matches!(*ret, Ty::Struct { .. })),
            other => panic!("expected function type, got {}", other),
        }
    }

    #[test]
    fn test_assign_to_local_and_mut_global() {
        let (ctx, _) = typecheck(
            "global mut counter: Int = 0; function f() = ( let x = 1; x = 2; counter = 3 );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
    }

    #[test]
    fn test_assign_to_immutable_global() {
        let (ctx, _) = typecheck("global g: Int = 0; function f() = g = 1;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("not mutable")));
    }

    #[test]
    fn test_assign_to_function_item() {
        let (ctx, _) = typecheck("function g() = (); function f() = g = 1;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("non-global item")));
    }

    #[test]
    fn test_assign_to_builtin() {
        let (ctx, _) = typecheck("function f() = true = false;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("cannot assign to builtin `true`")));
    }

    #[test]
    fn test_assign_through_field_chain() {
        let (ctx, _) = typecheck(
            "type Pair = struct { x: Int, y: Int }; function f(p: Pair) = p.x = 1;",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
    }

    #[test]
    fn test_binary_operator_table() {
        let (ctx, _) = typecheck(
            "function f() = (\n\
               let a: Int = 1 + 2;\n\
               let b: I32 = 3_I32 * 4_I32;\n\
               let c: Bool = \"x\" == \"y\";\n\
               let d: Bool = true & false;\n\
               let e: Bool = 1 < 2;\n\
               ()\n\
             );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
    }

    #[test]
    fn test_rawptr_comparison_unifies_pointees() {
        let (ctx, _) = typecheck(
            "type Pair = struct { x: Int, y: Int };\n\
             function f(a: *Pair, b: *Pair): Bool = ( let n = __NULL; if n == a then a == b else a != b );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
    }

    #[test]
    fn test_rawptr_comparison_pointee_mismatch() {
        let (ctx, _) = typecheck(
            "type A = struct { x: Int }; type B = struct { y: Int };\n\
             function f(a: *A, b: *B) = a == b;",
        );
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "expected A, found B"));
    }

    #[test]
    fn test_never_operand_adopts_arithmetic_type() {
        let (ctx, pkg) = typecheck("function f(): Int = trap() + 1;");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "f"), Ty::func(Vec::new(), Ty::Int));
    }

    #[test]
    fn test_never_operand_still_requires_valid_pairing() {
        let (ctx, _) = typecheck("function f() = trap() + \"x\";");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("invalid operand types for `+`")));

        let (ctx, _) = typecheck("function f() = trap() & \"x\";");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("invalid operand types for `&`")));
    }

    #[test]
    fn test_mixed_integer_arithmetic_rejected() {
        let (ctx, _) = typecheck("function f() = 1 + 2_I32;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("invalid operand types for `+`")));
    }

    #[test]
    fn test_bool_ordering_rejected() {
        let (ctx, _) = typecheck("function f() = true < false;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("invalid operand types for `<`")));
    }

    #[test]
    fn test_unary_not_and_neg() {
        let (ctx, _) = typecheck("function f() = ( !true; !1; !2_I32; () );");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());

        let (ctx, _) = typecheck("function f() = -1;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("unary `-` is not supported")));
    }

    #[test]
    fn test_if_condition_must_be_bool() {
        let (ctx, _) = typecheck("function f() = if 1 then () else ();");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "expected bool, found int"));
    }

    #[test]
    fn test_if_without_else_is_unit() {
        let (ctx, pkg) = typecheck("function f() = if true then ();");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "f"), Ty::func(Vec::new(), Ty::Unit));
    }

    #[test]
    fn test_if_never_branch_takes_other_type() {
        let (ctx, pkg) = typecheck("function f() = if true then trap() else 1;");
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        assert_eq!(item_ty(&pkg, "f"), Ty::func(Vec::new(), Ty::Int));
    }

    #[test]
    fn test_module_as_value_diagnosed() {
        let (ctx, _) = typecheck("mod m ( ); function f() = m;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("module cannot be used as a value")));
    }

    #[test]
    fn test_type_param_as_value_diagnosed() {
        let (ctx, _) = typecheck("function f[T](x: T) = T;");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message.contains("type parameter `T` cannot be used as a value")));
    }

    #[test]
    fn test_null_pointee_inferred() {
        let (ctx, pkg) = typecheck(
            "type Pair = struct { x: Int, y: Int }; function f() = ( let p: *Pair = __NULL; p );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match item_ty(&pkg, "f") {
            Ty::Fn { ret, .. } => assert!(matches!(*ret, Ty::RawPtr(_))),
            other => panic!("expected function type, got {}", other),
        }
    }

    #[test]
    fn test_unbound_var_cannot_infer() {
        let (ctx, _) = typecheck("function f() = ( let x = ___transmute(1); () );");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "cannot infer type"));
    }

    #[test]
    fn test_memory_builtins() {
        let (ctx, _) = typecheck(
            "function f() = (\n\
               __i32_store(0_I32, 1_I32);\n\
               __i64_store(8_I32, 2);\n\
               let a: I32 = __i32_load(0_I32);\n\
               let b: Int = __i64_load(8_I32);\n\
               let c: Int = __i32_extend_to_i64_u(a);\n\
               let pages: I32 = __memory_size();\n\
               ()\n\
             );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
    }

    #[test]
    fn test_global_init_checked() {
        let (ctx, _) = typecheck("global g: Int = \"s\";");
        assert!(ctx
            .sink
            .errors()
            .iter()
            .any(|e| e.message == "expected int, found string"));
    }

    #[test]
    fn test_error_sentinels_do_not_cascade() {
        // the unknown name produces one diagnostic; the addition with the
        // error sentinel stays silent
        let (ctx, _) = typecheck("function f() = ( let a: Int = nope + 1; a );");
        assert_eq!(ctx.sink.errors().len(), 1, "{:?}", ctx.sink.errors());
        assert!(ctx.sink.errors()[0].message.contains("cannot find `nope`"));
    }
}
