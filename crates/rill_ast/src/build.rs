//! Builder pass: parsed -> built.
//!
//! Assigns every item a stable package-scoped identifier and every loop a
//! stable identifier. Item index 0 is reserved for the package root module,
//! which this pass synthesizes around the parsed item list.

use std::collections::HashSet;
use std::path::PathBuf;

use rill_lexer::Span;

use crate::ast::*;
use crate::fold::Folder;

struct Builder {
    pkg: PkgId,
    next_item: u32,
    next_loop: u32,
    seen: HashSet<ItemId>,
}

impl Folder<Parsed, Built> for Builder {
    fn fold_item_id(&mut self, _id: ()) -> ItemId {
        let id = ItemId {
            pkg: self.pkg,
            idx: self.next_item,
        };
        self.next_item += 1;
        assert!(self.seen.insert(id), "duplicate item id {:?}", id);
        id
    }

    fn fold_loop_id(&mut self, _id: ()) -> LoopId {
        let id = LoopId(self.next_loop);
        self.next_loop += 1;
        id
    }

    fn fold_def_path(&mut self, _path: (), _item_name: &str) {}

    fn fold_res(&mut self, _res: ()) {}

    fn fold_expr_ty(&mut self, _ty: ()) {}

    fn fold_tables(&mut self, _tables: ()) {}
}

/// Wrap the parsed items of one source tree into a package and assign
/// identifiers throughout
pub fn build_package(
    pkg_id: PkgId,
    name: &str,
    root_file: PathBuf,
    root_span: Span,
    items: Vec<Item<Parsed>>,
) -> Package<Built> {
    let root_id = ItemId::root(pkg_id);
    let mut builder = Builder {
        pkg: pkg_id,
        next_item: 1,
        next_loop: 0,
        seen: HashSet::from([root_id]),
    };
    let items = items
        .into_iter()
        .map(|item| builder.fold_item(item))
        .collect();
    let root = Item {
        span: root_span,
        id: root_id,
        name: name.to_string(),
        def_path: (),
        kind: ItemKind::Mod(Module {
            origin: ModOrigin::Inline,
            items,
        }),
    };
    let mut pkg = Package::new(pkg_id, name.to_string(), root_file, root);
    pkg.rebuild_index();
    pkg
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_lexer::FileId;

    fn sp() -> Span {
        Span::new(FileId(0), 0, 0)
    }

    fn unit_fn(name: &str, body: Expr<Parsed>) -> Item<Parsed> {
        Item {
            span: sp(),
            id: (),
            name: name.to_string(),
            def_path: (),
            kind: ItemKind::Function(Function {
                generics: Vec::new(),
                params: Vec::new(),
                ret: None,
                body,
            }),
        }
    }

    fn empty_expr() -> Expr<Parsed> {
        Expr {
            span: sp(),
            ty: (),
            kind: ExprKind::Empty,
        }
    }

    fn loop_expr(body: Expr<Parsed>) -> Expr<Parsed> {
        Expr {
            span: sp(),
            ty: (),
            kind: ExprKind::Loop {
                id: (),
                body: Box::new(body),
            },
        }
    }

    #[test]
    fn test_item_ids_unique_and_dense() {
        let items = vec![
            unit_fn("a", empty_expr()),
            Item {
                span: sp(),
                id: (),
                name: "m".to_string(),
                def_path: (),
                kind: ItemKind::Mod(Module {
                    origin: ModOrigin::Inline,
                    items: vec![unit_fn("b", empty_expr())],
                }),
            },
        ];
        let pkg = build_package(PkgId(0), "main", PathBuf::from("main.rl"), sp(), items);

        let mut ids: Vec<u32> = pkg.item_ids().map(|id| id.idx).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(pkg.root.id, ItemId::root(PkgId(0)));
    }

    #[test]
    fn test_loop_ids_assigned_in_order() {
        let body = Expr {
            span: sp(),
            ty: (),
            kind: ExprKind::Block {
                exprs: vec![loop_expr(empty_expr()), loop_expr(empty_expr())],
                locals: Vec::new(),
            },
        };
        let pkg = build_package(
            PkgId(1),
            "main",
            PathBuf::from("main.rl"),
            sp(),
            vec![unit_fn("f", body)],
        );

        let f = pkg
            .find_item(ItemId {
                pkg: PkgId(1),
                idx: 1,
            })
            .unwrap();
        let func = match &f.kind {
            ItemKind::Function(func) => func,
            _ => panic!("expected function"),
        };
        let loop_ids: Vec<LoopId> = match &func.body.kind {
            ExprKind::Block { exprs, .. } => exprs
                .iter()
                .map(|e| match &e.kind {
                    ExprKind::Loop { id, .. } => *id,
                    _ => panic!("expected loop"),
                })
                .collect(),
            _ => panic!("expected block"),
        };
        assert_eq!(loop_ids, vec![LoopId(0), LoopId(1)]);
    }

    #[test]
    fn test_find_item_walks_modules() {
        let items = vec![Item {
            span: sp(),
            id: (),
            name: "outer".to_string(),
            def_path: (),
            kind: ItemKind::Mod(Module {
                origin: ModOrigin::Inline,
                items: vec![unit_fn("inner", empty_expr())],
            }),
        }];
        let pkg = build_package(PkgId(0), "main", PathBuf::from("main.rl"), sp(), items);
        let inner = pkg
            .find_item(ItemId {
                pkg: PkgId(0),
                idx: 2,
            })
            .unwrap();
        assert_eq!(inner.name, "inner");
    }
}
