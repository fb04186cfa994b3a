//! Phase-to-phase AST folding.
//!
//! A [`Folder`] maps every item, expression, identifier-with-resolution and
//! AST type from phase `F` to phase `T`. Passes override the entry points
//! they elaborate and fall back to the structural `super_fold_*` methods,
//! which recurse into every child. Plain elaboration fields (field indices,
//! break targets, local types, block locals) are preserved verbatim by the
//! structural folds.

use std::collections::HashMap;

use crate::ast::*;

pub trait Folder<F: Phase, T: Phase> {
    // --- slot hooks ---

    fn fold_item_id(&mut self, id: F::ItemId) -> T::ItemId;
    fn fold_loop_id(&mut self, id: F::LoopId) -> T::LoopId;
    fn fold_def_path(&mut self, path: F::DefPath, item_name: &str) -> T::DefPath;
    fn fold_res(&mut self, res: F::Res) -> T::Res;
    fn fold_expr_ty(&mut self, ty: F::Ty) -> T::Ty;
    fn fold_tables(&mut self, tables: F::Tables) -> T::Tables;

    // --- entry points ---

    fn fold_item(&mut self, item: Item<F>) -> Item<T> {
        self.super_fold_item(item)
    }

    fn fold_expr(&mut self, expr: Expr<F>) -> Expr<T> {
        self.super_fold_expr(expr)
    }

    fn fold_name(&mut self, name: Name<F>) -> Name<T> {
        let res = self.fold_res(name.res);
        Name {
            name: name.name,
            span: name.span,
            res,
        }
    }

    fn fold_ast_ty(&mut self, ty: AstTy<F>) -> AstTy<T> {
        self.super_fold_ast_ty(ty)
    }

    // --- structural recursion ---

    fn super_fold_item(&mut self, item: Item<F>) -> Item<T> {
        let id = self.fold_item_id(item.id);
        let def_path = self.fold_def_path(item.def_path, &item.name);
        let kind = match item.kind {
            ItemKind::Function(func) => ItemKind::Function(Function {
                generics: func.generics,
                params: func
                    .params
                    .into_iter()
                    .map(|p| self.fold_param(p))
                    .collect(),
                ret: func.ret.map(|t| self.fold_ast_ty(t)),
                body: self.fold_expr(func.body),
            }),
            ItemKind::TypeDef(td) => ItemKind::TypeDef(TypeDef {
                generics: td.generics,
                def: match td.def {
                    TyDefKind::Struct(fields) => TyDefKind::Struct(
                        fields
                            .into_iter()
                            .map(|f| FieldDef {
                                name: f.name,
                                span: f.span,
                                ty: self.fold_ast_ty(f.ty),
                            })
                            .collect(),
                    ),
                    TyDefKind::Alias(ty) => TyDefKind::Alias(self.fold_ast_ty(ty)),
                },
            }),
            ItemKind::Import(imp) => ItemKind::Import(Import {
                module: imp.module,
                func: imp.func,
                params: imp
                    .params
                    .into_iter()
                    .map(|p| self.fold_param(p))
                    .collect(),
                ret: imp.ret.map(|t| self.fold_ast_ty(t)),
            }),
            ItemKind::Mod(m) => ItemKind::Mod(Module {
                origin: m.origin,
                items: m.items.into_iter().map(|i| self.fold_item(i)).collect(),
            }),
            ItemKind::Extern(e) => ItemKind::Extern(e),
            ItemKind::Global(g) => ItemKind::Global(Global {
                mutable: g.mutable,
                ty: self.fold_ast_ty(g.ty),
                init: self.fold_expr(g.init),
            }),
            ItemKind::Use(u) => ItemKind::Use(UseDecl {
                segments: u.segments,
                target: self.fold_res(u.target),
            }),
            ItemKind::Error(tok) => ItemKind::Error(tok),
        };
        Item {
            span: item.span,
            id,
            name: item.name,
            def_path,
            kind,
        }
    }

    fn fold_param(&mut self, param: Param<F>) -> Param<T> {
        Param {
            name: param.name,
            span: param.span,
            ty: self.fold_ast_ty(param.ty),
        }
    }

    fn super_fold_expr(&mut self, expr: Expr<F>) -> Expr<T> {
        let ty = self.fold_expr_ty(expr.ty);
        let kind = match expr.kind {
            ExprKind::Empty => ExprKind::Empty,
            ExprKind::Let {
                name,
                name_span,
                ascription,
                init,
                local_ty,
            } => ExprKind::Let {
                name,
                name_span,
                ascription: ascription.map(|t| self.fold_ast_ty(t)),
                init: Box::new(self.fold_expr(*init)),
                local_ty,
            },
            ExprKind::Assign { target, value } => ExprKind::Assign {
                target: Box::new(self.fold_expr(*target)),
                value: Box::new(self.fold_expr(*value)),
            },
            ExprKind::Block { exprs, locals } => ExprKind::Block {
                exprs: exprs.into_iter().map(|e| self.fold_expr(e)).collect(),
                locals,
            },
            ExprKind::Literal(lit) => ExprKind::Literal(lit),
            ExprKind::Ident(name) => ExprKind::Ident(self.fold_name(name)),
            ExprKind::Path { segments, res } => ExprKind::Path {
                segments,
                res: self.fold_res(res),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: Box::new(self.fold_expr(*lhs)),
                rhs: Box::new(self.fold_expr(*rhs)),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(self.fold_expr(*operand)),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: Box::new(self.fold_expr(*callee)),
                args: args.into_iter().map(|a| self.fold_expr(a)).collect(),
            },
            ExprKind::FieldAccess {
                base,
                field,
                field_span,
                idx,
            } => ExprKind::FieldAccess {
                base: Box::new(self.fold_expr(*base)),
                field,
                field_span,
                idx,
            },
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => ExprKind::If {
                cond: Box::new(self.fold_expr(*cond)),
                then_branch: Box::new(self.fold_expr(*then_branch)),
                else_branch: else_branch.map(|e| Box::new(self.fold_expr(*e))),
            },
            ExprKind::Loop { id, body } => ExprKind::Loop {
                id: self.fold_loop_id(id),
                body: Box::new(self.fold_expr(*body)),
            },
            ExprKind::Break { target } => ExprKind::Break { target },
            ExprKind::StructLiteral { name, fields } => ExprKind::StructLiteral {
                name: self.fold_name(name),
                fields: fields
                    .into_iter()
                    .map(|f| FieldInit {
                        name: f.name,
                        span: f.span,
                        value: self.fold_expr(f.value),
                        idx: f.idx,
                    })
                    .collect(),
            },
            ExprKind::TupleLiteral { elems } => ExprKind::TupleLiteral {
                elems: elems.into_iter().map(|e| self.fold_expr(e)).collect(),
            },
            ExprKind::Asm { instrs } => ExprKind::Asm { instrs },
            ExprKind::Error(tok) => ExprKind::Error(tok),
        };
        Expr {
            span: expr.span,
            ty,
            kind,
        }
    }

    fn super_fold_ast_ty(&mut self, ty: AstTy<F>) -> AstTy<T> {
        let kind = match ty.kind {
            AstTyKind::Named { name, args } => AstTyKind::Named {
                name: self.fold_name(name),
                args: args.into_iter().map(|a| self.fold_ast_ty(a)).collect(),
            },
            AstTyKind::Tuple(elems) => {
                AstTyKind::Tuple(elems.into_iter().map(|e| self.fold_ast_ty(e)).collect())
            }
            AstTyKind::RawPtr(inner) => AstTyKind::RawPtr(Box::new(self.fold_ast_ty(*inner))),
            AstTyKind::Never => AstTyKind::Never,
            AstTyKind::Error(tok) => AstTyKind::Error(tok),
        };
        AstTy {
            span: ty.span,
            kind,
        }
    }
}

/// Apply `folder` to every root item of `pkg`, producing a new package with
/// the by-id table rebuilt
pub fn fold_package<F, T, Fo>(folder: &mut Fo, pkg: Package<F>) -> Package<T>
where
    F: Phase,
    T: Phase<ItemId = ItemId>,
    Fo: Folder<F, T>,
{
    let root = folder.fold_item(pkg.root);
    let tables = folder.fold_tables(pkg.tables);
    let mut out = Package {
        id: pkg.id,
        name: pkg.name,
        root_file: pkg.root_file,
        root,
        fatal: pkg.fatal,
        tables,
        index: HashMap::new(),
    };
    out.rebuild_index();
    out
}
