//! Item-signature lowering.
//!
//! `type_of_item` computes an item's semantic type from its AST form,
//! memoized per item id. Alias cycles are detected with an in-progress set
//! and produce an error type. Struct fields are lowered without generic
//! substitution and stored in the package tables.

use rill_ast::*;
use rill_lexer::Span;

use crate::check::Checker;

/// Signature-relevant AST of one item, scraped before the body fold
#[derive(Debug, Clone)]
pub(crate) enum SigSource {
    Function {
        params: Vec<AstTy<Resolved>>,
        ret: Option<AstTy<Resolved>>,
    },
    Import {
        params: Vec<AstTy<Resolved>>,
        ret: Option<AstTy<Resolved>>,
    },
    Struct {
        name: String,
        fields: Vec<(String, AstTy<Resolved>)>,
    },
    Alias {
        target: AstTy<Resolved>,
    },
    Global {
        mutable: bool,
        ty: AstTy<Resolved>,
    },
    Mod,
    Extern,
    Use,
    Error,
}

impl SigSource {
    pub(crate) fn is_module_like(&self) -> bool {
        matches!(self, SigSource::Mod | SigSource::Extern)
    }
}

/// Collect signature sources and spans for every item of the package
pub(crate) fn scrape_sigs(
    pkg: &Package<Resolved>,
) -> (
    std::collections::HashMap<ItemId, SigSource>,
    std::collections::HashMap<ItemId, Span>,
) {
    let mut sigs = std::collections::HashMap::new();
    let mut spans = std::collections::HashMap::new();
    scrape_item(&pkg.root, &mut sigs, &mut spans);
    (sigs, spans)
}

fn scrape_item(
    item: &Item<Resolved>,
    sigs: &mut std::collections::HashMap<ItemId, SigSource>,
    spans: &mut std::collections::HashMap<ItemId, Span>,
) {
    spans.insert(item.id, item.span);
    let sig = match &item.kind {
        ItemKind::Function(f) => SigSource::Function {
            params: f.params.iter().map(|p| p.ty.clone()).collect(),
            ret: f.ret.clone(),
        },
        ItemKind::Import(imp) => SigSource::Import {
            params: imp.params.iter().map(|p| p.ty.clone()).collect(),
            ret: imp.ret.clone(),
        },
        ItemKind::TypeDef(td) => match &td.def {
            TyDefKind::Struct(fields) => SigSource::Struct {
                name: item.name.clone(),
                fields: fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect(),
            },
            TyDefKind::Alias(target) => SigSource::Alias {
                target: target.clone(),
            },
        },
        ItemKind::Global(g) => SigSource::Global {
            mutable: g.mutable,
            ty: g.ty.clone(),
        },
        ItemKind::Mod(m) => {
            for child in &m.items {
                scrape_item(child, sigs, spans);
            }
            SigSource::Mod
        }
        ItemKind::Extern(_) => SigSource::Extern,
        ItemKind::Use(_) => SigSource::Use,
        ItemKind::Error(_) => SigSource::Error,
    };
    sigs.insert(item.id, sig);
}

impl<'a> Checker<'a> {
    /// The semantic type of an item, memoized. `None` for items that are
    /// not directly typed (modules, externs, uses, error items).
    pub(crate) fn type_of_item(&mut self, id: ItemId, span: Span) -> Option<Ty> {
        if id.pkg != self.pkg_id {
            return self
                .ctx
                .dep(id.pkg)
                .and_then(|dep| dep.tables.item_tys.get(&id))
                .cloned();
        }

        if let Some(ty) = self.tables.item_tys.get(&id) {
            return Some(ty.clone());
        }

        if !self.lowering.insert(id) {
            let tok = self
                .ctx
                .sink
                .emit("cyclic type definition", self.sig_spans.get(&id).copied().unwrap_or(span));
            return Some(Ty::Error(tok));
        }

        let sig = self.sigs.get(&id).cloned();
        let ty = match sig {
            Some(SigSource::Function { params, ret }) => {
                let params: Vec<Ty> = params.iter().map(|t| self.lower_ast_ty(t)).collect();
                // unannotated returns are inferred from the body
                let ret = match &ret {
                    Some(t) => self.lower_ast_ty(t),
                    None => self.infcx.new_var(),
                };
                Some(Ty::func(params, ret))
            }
            Some(SigSource::Import { params, ret }) => {
                let params: Vec<Ty> = params.iter().map(|t| self.lower_ast_ty(t)).collect();
                let ret = match &ret {
                    Some(t) => self.lower_ast_ty(t),
                    None => Ty::Unit,
                };
                Some(Ty::func(params, ret))
            }
            Some(SigSource::Struct { name, fields }) => {
                let lowered: Vec<(String, Ty)> = fields
                    .iter()
                    .map(|(fname, fty)| (fname.clone(), self.lower_ast_ty(fty)))
                    .collect();
                self.tables.struct_fields.insert(id, lowered);
                Some(Ty::Struct { id, name })
            }
            Some(SigSource::Alias { target }) => Some(self.lower_ast_ty(&target)),
            Some(SigSource::Global { ty, .. }) => Some(self.lower_ast_ty(&ty)),
            Some(SigSource::Mod)
            | Some(SigSource::Extern)
            | Some(SigSource::Use)
            | Some(SigSource::Error)
            | None => None,
        };

        self.lowering.remove(&id);
        if let Some(ty) = &ty {
            self.tables.item_tys.insert(id, ty.clone());
        }
        ty
    }

    /// Declared fields of a struct item, lowering them first if needed
    pub(crate) fn fields_of_struct(&mut self, id: ItemId, span: Span) -> Option<Vec<(String, Ty)>> {
        if id.pkg != self.pkg_id {
            return self
                .ctx
                .dep(id.pkg)
                .and_then(|dep| dep.tables.struct_fields.get(&id))
                .cloned();
        }
        self.type_of_item(id, span);
        self.tables.struct_fields.get(&id).cloned()
    }

    /// Map an AST type to a semantic type. The name's resolution must be an
    /// item, a type parameter or a builtin type name.
    pub(crate) fn lower_ast_ty(&mut self, ty: &AstTy<Resolved>) -> Ty {
        match &ty.kind {
            AstTyKind::Named { name, args } => {
                // generic arguments are validated but treated as opaque
                for arg in args {
                    self.lower_ast_ty(arg);
                }
                match &name.res {
                    Resolution::Builtin(b) => match b {
                        Builtin::StringTy => Ty::Str,
                        Builtin::IntTy => Ty::Int,
                        Builtin::I32Ty => Ty::I32,
                        Builtin::BoolTy => Ty::Bool,
                        _ => Ty::Error(self.ctx.sink.emit(
                            format!("`{}` is not a type", name.name),
                            name.span,
                        )),
                    },
                    Resolution::Item(id) => match self.type_of_item(*id, name.span) {
                        Some(item_ty) => item_ty,
                        None => Ty::Error(self.ctx.sink.emit(
                            format!("`{}` is not a type", name.name),
                            name.span,
                        )),
                    },
                    Resolution::TyParam { index, name: pname } => Ty::Param {
                        index: *index,
                        name: pname.clone(),
                    },
                    Resolution::Local { .. } => Ty::Error(self.ctx.sink.emit(
                        format!("`{}` is a local, not a type", name.name),
                        name.span,
                    )),
                    Resolution::Error(tok) => Ty::Error(*tok),
                }
            }
            AstTyKind::Tuple(elems) => {
                Ty::tuple(elems.iter().map(|e| self.lower_ast_ty(e)).collect())
            }
            AstTyKind::RawPtr(inner) => Ty::raw_ptr(self.lower_ast_ty(inner)),
            AstTyKind::Never => Ty::Never,
            AstTyKind::Error(tok) => Ty::Error(*tok),
        }
    }
}
