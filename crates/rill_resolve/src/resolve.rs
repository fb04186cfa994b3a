//! Name resolution - maps every identifier occurrence to a Resolution.
//!
//! Works as a fold over the built package. For each module the resolver
//! first gathers a name -> item map over the module's direct items
//! (diagnosing duplicates), then recurses in source order. A single locals
//! stack is threaded through expression traversal; a local reference is the
//! distance from the top of that stack. Field-access chains whose left side
//! denotes a module collapse into `Path` expressions, so no field access
//! with a module-resolved base survives this pass.

use std::collections::{HashMap, HashSet};

use rill_ast::fold::{fold_package, Folder};
use rill_ast::*;
use rill_lexer::Span;

/// Item shape recorded by the pre-pass; enough to drive lookup decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemShape {
    Function,
    TypeDef,
    Import,
    Mod,
    Extern,
    Global,
    Use,
    Error,
}

struct Resolver<'a> {
    ctx: &'a mut Context,
    loader: &'a mut dyn PackageLoader,
    pkg_id: PkgId,
    pkg_name: String,

    // pre-pass tables over the built package
    shapes: HashMap<ItemId, ItemShape>,
    mod_contents: HashMap<ItemId, HashMap<String, ItemId>>,
    use_paths: HashMap<ItemId, Vec<(String, Span)>>,
    item_module: HashMap<ItemId, ItemId>,
    extern_names: HashMap<ItemId, String>,

    // traversal state
    locals: Vec<String>,
    generics: Vec<String>,
    path_prefix: Vec<String>,
    module_stack: Vec<ItemId>,
    block_locals: Vec<Vec<LocalDecl>>,

    // caches
    use_targets: HashMap<ItemId, Resolution>,
    use_in_progress: HashSet<ItemId>,
    extern_pkgs: HashMap<ItemId, Option<PkgId>>,
    dep_mod_contents: HashMap<ItemId, HashMap<String, ItemId>>,
}

/// Resolve a built package against the context's finalized dependencies
pub fn resolve_package(
    ctx: &mut Context,
    loader: &mut dyn PackageLoader,
    pkg: Package<Built>,
) -> Package<Resolved> {
    let mut resolver = Resolver::new(ctx, loader, &pkg);
    fold_package(&mut resolver, pkg)
}

impl<'a> Resolver<'a> {
    fn new(
        ctx: &'a mut Context,
        loader: &'a mut dyn PackageLoader,
        pkg: &Package<Built>,
    ) -> Resolver<'a> {
        let mut resolver = Resolver {
            ctx,
            loader,
            pkg_id: pkg.id,
            pkg_name: pkg.name.clone(),
            shapes: HashMap::new(),
            mod_contents: HashMap::new(),
            use_paths: HashMap::new(),
            item_module: HashMap::new(),
            extern_names: HashMap::new(),
            locals: Vec::new(),
            generics: Vec::new(),
            path_prefix: Vec::new(),
            module_stack: Vec::new(),
            block_locals: Vec::new(),
            use_targets: HashMap::new(),
            use_in_progress: HashSet::new(),
            extern_pkgs: HashMap::new(),
            dep_mod_contents: HashMap::new(),
        };
        resolver.scan_item(&pkg.root);
        resolver
    }

    /// Pre-pass: record item shapes, module contents (with duplicate-name
    /// diagnostics), use paths and enclosing modules
    fn scan_item(&mut self, item: &Item<Built>) {
        let shape = match &item.kind {
            ItemKind::Function(_) => ItemShape::Function,
            ItemKind::TypeDef(_) => ItemShape::TypeDef,
            ItemKind::Import(_) => ItemShape::Import,
            ItemKind::Mod(_) => ItemShape::Mod,
            ItemKind::Extern(_) => ItemShape::Extern,
            ItemKind::Global(_) => ItemShape::Global,
            ItemKind::Use(_) => ItemShape::Use,
            ItemKind::Error(_) => ItemShape::Error,
        };
        self.shapes.insert(item.id, shape);

        match &item.kind {
            ItemKind::Mod(m) => {
                let mut contents: HashMap<String, ItemId> = HashMap::new();
                for child in &m.items {
                    self.item_module.insert(child.id, item.id);
                    if contents.insert(child.name.clone(), child.id).is_some() {
                        self.ctx.sink.emit(
                            format!("duplicate definition of `{}`", child.name),
                            child.span,
                        );
                    }
                }
                self.mod_contents.insert(item.id, contents);
                for child in &m.items {
                    self.scan_item(child);
                }
            }
            ItemKind::Use(u) => {
                self.use_paths.insert(item.id, u.segments.clone());
            }
            ItemKind::Extern(e) => {
                self.extern_names.insert(item.id, e.pkg_name.clone());
            }
            _ => {}
        }
    }

    fn current_module(&self) -> ItemId {
        *self
            .module_stack
            .last()
            .unwrap_or(&ItemId::root(self.pkg_id))
    }

    /// Five-step identifier lookup: locals, enclosing generics, current
    /// module items, package names, builtins
    fn resolve_name(&mut self, name: &str, span: Span) -> Resolution {
        if let Some(pos) = self.locals.iter().rposition(|n| n == name) {
            return Resolution::Local {
                index: (self.locals.len() - 1 - pos) as u32,
            };
        }

        if let Some(index) = self.generics.iter().position(|g| g == name) {
            return Resolution::TyParam {
                index: index as u32,
                name: name.to_string(),
            };
        }

        let module = self.current_module();
        if let Some(id) = self
            .mod_contents
            .get(&module)
            .and_then(|c| c.get(name))
            .copied()
        {
            return self.chase_item(id, span);
        }

        if name == self.pkg_name {
            return Resolution::Item(ItemId::root(self.pkg_id));
        }
        if let Some(root) = self.ctx.dep_root(name) {
            return Resolution::Item(root);
        }

        if let Some(builtin) = Builtin::from_name(name) {
            return Resolution::Builtin(builtin);
        }

        Resolution::Error(
            self.ctx
                .sink
                .emit(format!("cannot find `{}`", name), span),
        )
    }

    /// Item reference, looking through `use` items to their targets
    fn chase_item(&mut self, id: ItemId, span: Span) -> Resolution {
        if id.pkg == self.pkg_id {
            if self.shapes.get(&id) == Some(&ItemShape::Use) {
                return self.resolve_use(id, span);
            }
            Resolution::Item(id)
        } else {
            match self.ctx.dep(id.pkg).and_then(|p| p.find_item(id)) {
                Some(Item {
                    kind: ItemKind::Use(u),
                    ..
                }) => u.target.clone(),
                _ => Resolution::Item(id),
            }
        }
    }

    /// Resolve the target of a `use` item, memoized per item id
    fn resolve_use(&mut self, use_id: ItemId, span: Span) -> Resolution {
        if let Some(res) = self.use_targets.get(&use_id) {
            return res.clone();
        }
        if !self.use_in_progress.insert(use_id) {
            let tok = self.ctx.sink.emit("cyclic `use` declaration", span);
            return Resolution::Error(tok);
        }

        let segments = self.use_paths.get(&use_id).cloned().unwrap_or_default();
        let module = self
            .item_module
            .get(&use_id)
            .copied()
            .unwrap_or(ItemId::root(self.pkg_id));

        let res = self.resolve_use_segments(module, &segments);

        self.use_in_progress.remove(&use_id);
        self.use_targets.insert(use_id, res.clone());
        res
    }

    fn resolve_use_segments(
        &mut self,
        module: ItemId,
        segments: &[(String, Span)],
    ) -> Resolution {
        let (first, first_span) = match segments.first() {
            Some(seg) => seg,
            None => return Resolution::Error(self.ctx.sink.emit(
                "empty `use` path",
                Span::new(rill_lexer::FileId(0), 0, 0),
            )),
        };

        let mut res = if let Some(id) = self
            .mod_contents
            .get(&module)
            .and_then(|c| c.get(first))
            .copied()
        {
            self.chase_item(id, *first_span)
        } else if *first == self.pkg_name {
            Resolution::Item(ItemId::root(self.pkg_id))
        } else if let Some(root) = self.ctx.dep_root(first) {
            Resolution::Item(root)
        } else if let Some(builtin) = Builtin::from_name(first) {
            Resolution::Builtin(builtin)
        } else {
            Resolution::Error(
                self.ctx
                    .sink
                    .emit(format!("cannot find `{}`", first), *first_span),
            )
        };

        for (seg, seg_span) in &segments[1..] {
            res = match res {
                Resolution::Item(id) => match self.module_target(id, *seg_span) {
                    Some(target) => match self.member_of(target, seg) {
                        Some(member) => self.chase_item(member, *seg_span),
                        None => Resolution::Error(self.ctx.sink.emit(
                            format!("no `{}` in module", seg),
                            *seg_span,
                        )),
                    },
                    None => Resolution::Error(self.ctx.sink.emit(
                        format!("`{}` is not a module", seg),
                        *seg_span,
                    )),
                },
                Resolution::Error(tok) => Resolution::Error(tok),
                _ => Resolution::Error(self.ctx.sink.emit(
                    format!("cannot look up `{}` here", seg),
                    *seg_span,
                )),
            };
        }
        res
    }

    /// If `id` denotes a module-like item, the id of the module whose direct
    /// contents should be searched. Extern items load their package on
    /// demand; the loaded root is cached per referring item id.
    fn module_target(&mut self, id: ItemId, span: Span) -> Option<ItemId> {
        if id.pkg == self.pkg_id {
            match self.shapes.get(&id).copied() {
                Some(ItemShape::Mod) => Some(id),
                Some(ItemShape::Extern) => {
                    let pkg = self.extern_pkg(id, span)?;
                    Some(ItemId::root(pkg))
                }
                _ => None,
            }
        } else {
            let dep = self.ctx.dep(id.pkg)?;
            match dep.find_item(id).map(|i| &i.kind) {
                Some(ItemKind::Mod(_)) => Some(id),
                Some(ItemKind::Extern(e)) => {
                    let name = e.pkg_name.clone();
                    self.ctx.dep_by_name(&name).map(|p| ItemId::root(p.id))
                }
                _ => None,
            }
        }
    }

    /// Load the package behind an extern item, once per item
    fn extern_pkg(&mut self, extern_id: ItemId, span: Span) -> Option<PkgId> {
        if let Some(cached) = self.extern_pkgs.get(&extern_id) {
            return *cached;
        }
        let name = self.extern_names.get(&extern_id).cloned()?;
        let pkg = self.loader.load_package(self.ctx, &name, span);
        self.extern_pkgs.insert(extern_id, pkg);
        pkg
    }

    /// Direct member of a module, by name; dependency module contents are
    /// computed on demand and cached per module id
    fn member_of(&mut self, module_id: ItemId, name: &str) -> Option<ItemId> {
        if module_id.pkg == self.pkg_id {
            return self
                .mod_contents
                .get(&module_id)?
                .get(name)
                .copied();
        }
        if !self.dep_mod_contents.contains_key(&module_id) {
            let mut contents = HashMap::new();
            if let Some(Item {
                kind: ItemKind::Mod(m),
                ..
            }) = self
                .ctx
                .dep(module_id.pkg)
                .and_then(|p| p.find_item(module_id))
            {
                for child in &m.items {
                    contents.insert(child.name.clone(), child.id);
                }
            }
            self.dep_mod_contents.insert(module_id, contents);
        }
        self.dep_mod_contents.get(&module_id)?.get(name).copied()
    }

    /// The resolution of a folded expression that could head a module path
    fn path_head(expr: &Expr<Resolved>) -> Option<(Vec<(String, Span)>, Resolution)> {
        match &expr.kind {
            ExprKind::Ident(name) => {
                Some((vec![(name.name.clone(), name.span)], name.res.clone()))
            }
            ExprKind::Path { segments, res } => Some((segments.clone(), res.clone())),
            _ => None,
        }
    }

    fn error_expr(&mut self, span: Span, tok: rill_session::ErrorToken) -> Expr<Resolved> {
        Expr {
            span,
            ty: (),
            kind: ExprKind::Error(tok),
        }
    }
}

impl<'a> Folder<Built, Resolved> for Resolver<'a> {
    fn fold_item_id(&mut self, id: ItemId) -> ItemId {
        id
    }

    fn fold_loop_id(&mut self, id: LoopId) -> LoopId {
        id
    }

    fn fold_def_path(&mut self, _path: (), item_name: &str) -> DefPath {
        let mut path = self.path_prefix.clone();
        path.push(item_name.to_string());
        DefPath(path)
    }

    fn fold_res(&mut self, _res: ()) -> Resolution {
        unreachable!("no resolution slots exist before the resolver runs")
    }

    fn fold_expr_ty(&mut self, _ty: ()) {}

    fn fold_tables(&mut self, _tables: ()) {}

    fn fold_name(&mut self, name: Name<Built>) -> Name<Resolved> {
        let res = self.resolve_name(&name.name, name.span);
        Name {
            name: name.name,
            span: name.span,
            res,
        }
    }

    fn fold_item(&mut self, item: Item<Built>) -> Item<Resolved> {
        let def_path = self.fold_def_path((), &item.name);
        let id = item.id;
        let span = item.span;
        let name = item.name;

        let kind = match item.kind {
            ItemKind::Function(f) => {
                self.generics = f.generics.clone();
                let params: Vec<Param<Resolved>> = f
                    .params
                    .into_iter()
                    .map(|p| self.fold_param(p))
                    .collect();
                let ret = f.ret.map(|t| self.fold_ast_ty(t));

                let depth = self.locals.len();
                for p in &params {
                    self.locals.push(p.name.clone());
                }
                let body = self.fold_expr(f.body);
                self.locals.truncate(depth);
                self.generics.clear();

                ItemKind::Function(Function {
                    generics: f.generics,
                    params,
                    ret,
                    body,
                })
            }
            ItemKind::TypeDef(td) => {
                self.generics = td.generics.clone();
                let def = match td.def {
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
                };
                self.generics.clear();
                ItemKind::TypeDef(TypeDef {
                    generics: td.generics,
                    def,
                })
            }
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
            ItemKind::Mod(m) => {
                self.module_stack.push(id);
                self.path_prefix.push(name.clone());
                let items = m.items.into_iter().map(|i| self.fold_item(i)).collect();
                self.path_prefix.pop();
                self.module_stack.pop();
                ItemKind::Mod(Module {
                    origin: m.origin,
                    items,
                })
            }
            ItemKind::Extern(e) => {
                // Eager load so later path references can see the package
                let _ = self.extern_pkg(id, span);
                ItemKind::Extern(e)
            }
            ItemKind::Global(g) => ItemKind::Global(Global {
                mutable: g.mutable,
                ty: self.fold_ast_ty(g.ty),
                init: self.fold_expr(g.init),
            }),
            ItemKind::Use(u) => {
                let target = self.resolve_use(id, span);
                ItemKind::Use(UseDecl {
                    segments: u.segments,
                    target,
                })
            }
            ItemKind::Error(tok) => ItemKind::Error(tok),
        };

        Item {
            span,
            id,
            name,
            def_path,
            kind,
        }
    }

    fn fold_expr(&mut self, expr: Expr<Built>) -> Expr<Resolved> {
        match expr.kind {
            ExprKind::Block { exprs, .. } => {
                let depth = self.locals.len();
                self.block_locals.push(Vec::new());
                let exprs: Vec<Expr<Resolved>> =
                    exprs.into_iter().map(|e| self.fold_expr(e)).collect();
                let locals = self.block_locals.pop().unwrap_or_default();
                self.locals.truncate(depth);
                Expr {
                    span: expr.span,
                    ty: (),
                    kind: ExprKind::Block { exprs, locals },
                }
            }
            ExprKind::Let {
                name,
                name_span,
                ascription,
                init,
                local_ty,
            } => {
                let ascription = ascription.map(|t| self.fold_ast_ty(t));
                // rhs is resolved before the binding is in scope
                let init = self.fold_expr(*init);
                self.locals.push(name.clone());
                if let Some(frame) = self.block_locals.last_mut() {
                    frame.push(LocalDecl {
                        name: name.clone(),
                        span: name_span,
                    });
                }
                Expr {
                    span: expr.span,
                    ty: (),
                    kind: ExprKind::Let {
                        name,
                        name_span,
                        ascription,
                        init: Box::new(init),
                        local_ty,
                    },
                }
            }
            ExprKind::FieldAccess {
                base,
                field,
                field_span,
                idx,
            } => {
                let base = self.fold_expr(*base);

                if let Some((segments, Resolution::Item(head))) = Self::path_head(&base) {
                    if let Some(target) = self.module_target(head, base.span) {
                        return match &field {
                            FieldName::Index(n) => {
                                let tok = self.ctx.sink.emit(
                                    format!("modules have no numeric member `{}`", n),
                                    field_span,
                                );
                                self.error_expr(expr.span, tok)
                            }
                            FieldName::Named(member_name) => {
                                let mut segments = segments;
                                segments.push((member_name.clone(), field_span));
                                let res = match self.member_of(target, member_name) {
                                    Some(member) => self.chase_item(member, field_span),
                                    None => Resolution::Error(self.ctx.sink.emit(
                                        format!(
                                            "no `{}` in module `{}`",
                                            member_name,
                                            segments
                                                [..segments.len() - 1]
                                                .iter()
                                                .map(|(s, _)| s.as_str())
                                                .collect::<Vec<_>>()
                                                .join(".")
                                        ),
                                        field_span,
                                    )),
                                };
                                Expr {
                                    span: expr.span,
                                    ty: (),
                                    kind: ExprKind::Path { segments, res },
                                }
                            }
                        };
                    }
                }

                Expr {
                    span: expr.span,
                    ty: (),
                    kind: ExprKind::FieldAccess {
                        base: Box::new(base),
                        field,
                        field_span,
                        idx,
                    },
                }
            }
            kind => self.super_fold_expr(Expr {
                span: expr.span,
                ty: expr.ty,
                kind,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_ast::context::NoLoader;
    use rill_parser::Parser;
    use rill_session::Options;
    use std::path::PathBuf;

    fn resolve_source(src: &str) -> (Context, Package<Resolved>) {
        let mut ctx = Context::new(Options::default());
        let file = ctx.sources.add_file("main.rl", src);
        let items = Parser::parse(file, src).unwrap();
        let pkg_id = ctx.fresh_pkg_id();
        let span = Span::new(file, 0, src.len());
        let built = build_package(pkg_id, "main", PathBuf::from("main.rl"), span, items);
        let mut loader = NoLoader;
        let resolved = resolve_package(&mut ctx, &mut loader, built);
        (ctx, resolved)
    }

    fn body_of<'p>(pkg: &'p Package<Resolved>, name: &str) -> &'p Expr<Resolved> {
        fn find<'p>(item: &'p Item<Resolved>, name: &str) -> Option<&'p Expr<Resolved>> {
            match &item.kind {
                ItemKind::Function(f) if item.name == name => Some(&f.body),
                ItemKind::Mod(m) => m.items.iter().find_map(|i| find(i, name)),
                _ => None,
            }
        }
        find(&pkg.root, name).expect("function not found")
    }

    fn block_exprs<'e>(body: &'e Expr<Resolved>) -> &'e [Expr<Resolved>] {
        match &body.kind {
            ExprKind::Block { exprs, .. } => exprs,
            _ => panic!("expected block body"),
        }
    }

    #[test]
    fn test_de_bruijn_shadowing() {
        let (ctx, pkg) = resolve_source(
            "function f() = ( let x = 1; let x = 2; x );",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        let exprs = block_exprs(body_of(&pkg, "f"));
        match &exprs[2].kind {
            ExprKind::Ident(name) => {
                assert_eq!(name.res, Resolution::Local { index: 0 });
            }
            _ => panic!("expected ident"),
        }
    }

    #[test]
    fn test_de_bruijn_distance() {
        let (ctx, pkg) = resolve_source("function f() = ( let a = 1; let b = 2; a );");
        assert!(!ctx.sink.has_errors());
        let exprs = block_exprs(body_of(&pkg, "f"));
        match &exprs[2].kind {
            ExprKind::Ident(name) => {
                assert_eq!(name.res, Resolution::Local { index: 1 });
            }
            _ => panic!("expected ident"),
        }
    }

    #[test]
    fn test_params_are_locals() {
        let (ctx, pkg) = resolve_source("function f(a: Int, b: Int) = a;");
        assert!(!ctx.sink.has_errors());
        match &body_of(&pkg, "f").kind {
            ExprKind::Ident(name) => {
                assert_eq!(name.res, Resolution::Local { index: 1 });
            }
            _ => panic!("expected ident"),
        }
    }

    #[test]
    fn test_block_scope_truncates() {
        let (ctx, pkg) = resolve_source(
            "function f() = ( let a = 1; ( let b = 2; b ); a );",
        );
        assert!(!ctx.sink.has_errors());
        let exprs = block_exprs(body_of(&pkg, "f"));
        // after the inner block, `a` is on top of the stack again
        match &exprs[2].kind {
            ExprKind::Ident(name) => {
                assert_eq!(name.res, Resolution::Local { index: 0 });
            }
            _ => panic!("expected ident"),
        }
    }

    #[test]
    fn test_module_path_collapse() {
        let (ctx, pkg) = resolve_source(
            "mod m ( function g() = (); ); function main() = m.g();",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match &body_of(&pkg, "main").kind {
            ExprKind::Call { callee, .. } => match &callee.kind {
                ExprKind::Path { segments, res } => {
                    let segs: Vec<&str> =
                        segments.iter().map(|(s, _)| s.as_str()).collect();
                    assert_eq!(segs, vec!["m", "g"]);
                    assert!(matches!(res, Resolution::Item(_)));
                }
                other => panic!("expected path callee, got {:?}", other),
            },
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_no_field_access_on_modules_after_resolve() {
        let (_, pkg) = resolve_source(
            "mod m ( mod inner ( function g() = (); ); ); function main() = m.inner.g();",
        );

        fn check(expr: &Expr<Resolved>, pkg: &Package<Resolved>) {
            if let ExprKind::FieldAccess { base, .. } = &expr.kind {
                let res = match &base.kind {
                    ExprKind::Ident(n) => Some(&n.res),
                    ExprKind::Path { res, .. } => Some(res),
                    _ => None,
                };
                if let Some(Resolution::Item(id)) = res {
                    let item = pkg.find_item(*id).unwrap();
                    assert!(
                        !matches!(item.kind, ItemKind::Mod(_) | ItemKind::Extern(_)),
                        "field access on module survived resolution"
                    );
                }
            }
            walk_children(expr, &mut |e| check(e, pkg));
        }

        fn walk_children(expr: &Expr<Resolved>, f: &mut dyn FnMut(&Expr<Resolved>)) {
            match &expr.kind {
                ExprKind::Let { init, .. } => f(init),
                ExprKind::Assign { target, value } => {
                    f(target);
                    f(value);
                }
                ExprKind::Block { exprs, .. } => exprs.iter().for_each(f),
                ExprKind::Binary { lhs, rhs, .. } => {
                    f(lhs);
                    f(rhs);
                }
                ExprKind::Unary { operand, .. } => f(operand),
                ExprKind::Call { callee, args } => {
                    f(callee);
                    args.iter().for_each(f);
                }
                ExprKind::FieldAccess { base, .. } => f(base),
                ExprKind::If {
                    cond,
                    then_branch,
                    else_branch,
                } => {
                    f(cond);
                    f(then_branch);
                    if let Some(e) = else_branch {
                        f(e);
                    }
                }
                ExprKind::Loop { body, .. } => f(body),
                ExprKind::StructLiteral { fields, .. } => {
                    fields.iter().for_each(|fi| f(&fi.value))
                }
                ExprKind::TupleLiteral { elems } => elems.iter().for_each(f),
                _ => {}
            }
        }

        check(body_of(&pkg, "main"), &pkg);
    }

    #[test]
    fn test_use_chases_target() {
        let (ctx, pkg) = resolve_source(
            "mod m ( function g() = (); ); use m.g; function main() = g();",
        );
        assert!(!ctx.sink.has_errors(), "{:?}", ctx.sink.errors());
        match &body_of(&pkg, "main").kind {
            ExprKind::Call { callee, .. } => match &callee.kind {
                ExprKind::Ident(name) => {
                    assert!(matches!(name.res, Resolution::Item(id) if id.idx == 2));
                }
                _ => panic!("expected ident callee"),
            },
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_builtin_resolution() {
        let (ctx, pkg) = resolve_source("function main() = print(\"hi\");");
        assert!(!ctx.sink.has_errors());
        match &body_of(&pkg, "main").kind {
            ExprKind::Call { callee, .. } => match &callee.kind {
                ExprKind::Ident(name) => {
                    assert_eq!(name.res, Resolution::Builtin(Builtin::Print));
                }
                _ => panic!("expected ident callee"),
            },
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_duplicate_names_diagnosed() {
        let (ctx, _) = resolve_source("function f() = (); function f() = ();");
        assert!(ctx.sink.has_errors());
        assert!(ctx.sink.errors()[0].message.contains("duplicate"));
    }

    #[test]
    fn test_unknown_name_diagnosed() {
        let (ctx, pkg) = resolve_source("function f() = nope;");
        assert!(ctx.sink.has_errors());
        assert!(ctx.sink.errors()[0].message.contains("cannot find `nope`"));
        match &body_of(&pkg, "f").kind {
            ExprKind::Ident(name) => assert!(matches!(name.res, Resolution::Error(_))),
            _ => panic!("expected ident"),
        }
    }

    #[test]
    fn test_numeric_member_on_module_diagnosed() {
        let (ctx, _) = resolve_source("mod m ( ); function f() = m.0;");
        assert!(ctx.sink.has_errors());
        assert!(ctx.sink.errors()[0].message.contains("numeric member"));
    }

    #[test]
    fn test_missing_member_diagnosed() {
        let (ctx, _) = resolve_source("mod m ( ); function f() = m.g();");
        assert!(ctx.sink.has_errors());
        assert!(ctx.sink.errors()[0].message.contains("no `g` in module `m`"));
    }

    #[test]
    fn test_def_paths() {
        let (_, pkg) = resolve_source("mod m ( function g() = (); );");
        let g = pkg
            .find_item(ItemId {
                pkg: pkg.id,
                idx: 2,
            })
            .unwrap();
        assert_eq!(g.def_path.to_string(), "main.m.g");
    }

    #[test]
    fn test_type_params_resolve_opaquely() {
        let (ctx, pkg) = resolve_source("function id[T](x: T) = x;");
        assert!(!ctx.sink.has_errors());
        let f = pkg
            .find_item(ItemId {
                pkg: pkg.id,
                idx: 1,
            })
            .unwrap();
        match &f.kind {
            ItemKind::Function(func) => match &func.params[0].ty.kind {
                AstTyKind::Named { name, .. } => {
                    assert!(matches!(name.res, Resolution::TyParam { index: 0, .. }));
                }
                _ => panic!("expected named type"),
            },
            _ => panic!("expected function"),
        }
    }
}
