//! The unification store.
//!
//! A single mutable substitution maps variables to types. Lookups are
//! shallow ([`InferCtx::resolve_if_possible`]); every inspection point in
//! the checker resolves before matching, so chains never grow stale.
//! Error types absorb unification silently to prevent cascades, and the
//! never type unifies one-sidedly with anything.

use rill_ast::{Ty, TyVar};
use rill_lexer::Span;
use rill_session::ErrorSink;

#[derive(Debug, Default)]
pub struct InferCtx {
    subst: Vec<Option<Ty>>,
}

impl InferCtx {
    pub fn new() -> InferCtx {
        InferCtx::default()
    }

    /// Fresh unification variable
    pub fn new_var(&mut self) -> Ty {
        let var = TyVar(self.subst.len() as u32);
        self.subst.push(None);
        Ty::Var(var)
    }

    /// Shallow chase: replace a bound variable by its binding, repeatedly.
    /// Types nested inside the result are not resolved.
    pub fn resolve_if_possible(&self, ty: &Ty) -> Ty {
        let mut ty = ty.clone();
        while let Ty::Var(var) = ty {
            match &self.subst[var.0 as usize] {
                Some(bound) => ty = bound.clone(),
                None => return Ty::Var(var),
            }
        }
        ty
    }

    /// Substitute recursively; unbound variables stay in place
    pub fn resolve_deep(&self, ty: &Ty) -> Ty {
        match self.resolve_if_possible(ty) {
            Ty::Fn { params, ret } => Ty::Fn {
                params: params.iter().map(|p| self.resolve_deep(p)).collect(),
                ret: Box::new(self.resolve_deep(&ret)),
            },
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| self.resolve_deep(e)).collect()),
            Ty::RawPtr(inner) => Ty::RawPtr(Box::new(self.resolve_deep(&inner))),
            other => other,
        }
    }

    fn occurs(&self, var: TyVar, ty: &Ty) -> bool {
        match self.resolve_if_possible(ty) {
            Ty::Var(v) => v == var,
            Ty::Fn { params, ret } => {
                params.iter().any(|p| self.occurs(var, p)) || self.occurs(var, &ret)
            }
            Ty::Tuple(elems) => elems.iter().any(|e| self.occurs(var, e)),
            Ty::RawPtr(inner) => self.occurs(var, &inner),
            _ => false,
        }
    }

    /// Unify `expected` with `actual`; on mismatch emit a diagnostic at
    /// `span` and leave the substitution as it is
    pub fn assign(&mut self, sink: &mut ErrorSink, expected: &Ty, actual: &Ty, span: Span) {
        if self.unify(expected, actual).is_err() {
            let expected = self.resolve_deep(expected);
            let actual = self.resolve_deep(actual);
            sink.emit(format!("expected {}, found {}", expected, actual), span);
        }
    }

    /// Structural unification; `Err` means mismatch (the caller reports)
    pub fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), ()> {
        let a = self.resolve_if_possible(a);
        let b = self.resolve_if_possible(b);

        match (&a, &b) {
            // error sentinels absorb silently
            (Ty::Error(_), _) | (_, Ty::Error(_)) => Ok(()),

            (Ty::Var(v), Ty::Var(w)) if v == w => Ok(()),
            (Ty::Var(v), _) if !self.occurs(*v, &b) => {
                self.subst[v.0 as usize] = Some(b.clone());
                Ok(())
            }
            (_, Ty::Var(w)) if !self.occurs(*w, &a) => {
                self.subst[w.0 as usize] = Some(a.clone());
                Ok(())
            }
            // occurs-check failure
            (Ty::Var(_), _) | (_, Ty::Var(_)) => Err(()),

            // never unifies with anything, one-sided
            (Ty::Never, _) | (_, Ty::Never) => Ok(()),

            (Ty::Bool, Ty::Bool)
            | (Ty::Str, Ty::Str)
            | (Ty::Int, Ty::Int)
            | (Ty::I32, Ty::I32)
            | (Ty::Unit, Ty::Unit) => Ok(()),

            (Ty::Tuple(xs), Ty::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            (Ty::RawPtr(x), Ty::RawPtr(y)) => self.unify(x, y),
            (
                Ty::Fn {
                    params: p1,
                    ret: r1,
                },
                Ty::Fn {
                    params: p2,
                    ret: r2,
                },
            ) if p1.len() == p2.len() => {
                for (x, y) in p1.iter().zip(p2.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(r1, r2)
            }
            // structs unify by identity
            (Ty::Struct { id: i1, .. }, Ty::Struct { id: i2, .. }) if i1 == i2 => Ok(()),
            (Ty::Param { index: i, .. }, Ty::Param { index: j, .. }) if i == j => Ok(()),

            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_ast::{ItemId, PkgId};
    use rill_lexer::{FileId, Span};
    use rill_session::ErrorToken;

    fn sp() -> Span {
        Span::new(FileId(0), 0, 0)
    }

    #[test]
    fn test_var_binding_and_resolve() {
        let mut icx = InferCtx::new();
        let v = icx.new_var();
        assert!(icx.unify(&v, &Ty::Int).is_ok());
        assert_eq!(icx.resolve_if_possible(&v), Ty::Int);
    }

    #[test]
    fn test_unify_symmetry() {
        // assign(A, B) and assign(B, A) succeed on the same inputs and
        // produce equivalent substitutions
        let cases: Vec<(Ty, Ty, bool)> = vec![
            (Ty::Int, Ty::Int, true),
            (Ty::Int, Ty::Str, false),
            (Ty::Never, Ty::Int, true),
            (Ty::raw_ptr(Ty::Int), Ty::raw_ptr(Ty::Int), true),
            (Ty::raw_ptr(Ty::Int), Ty::raw_ptr(Ty::I32), false),
            (
                Ty::func(vec![Ty::Int], Ty::Unit),
                Ty::func(vec![Ty::Int], Ty::Unit),
                true,
            ),
        ];
        for (a, b, expect) in cases {
            let mut fwd = InferCtx::new();
            let mut bwd = InferCtx::new();
            assert_eq!(fwd.unify(&a, &b).is_ok(), expect, "{} ~ {}", a, b);
            assert_eq!(bwd.unify(&b, &a).is_ok(), expect, "{} ~ {}", b, a);
        }
    }

    #[test]
    fn test_var_symmetry_produces_same_binding() {
        let mut fwd = InferCtx::new();
        let v = fwd.new_var();
        fwd.unify(&v, &Ty::Int).unwrap();

        let mut bwd = InferCtx::new();
        let w = bwd.new_var();
        bwd.unify(&Ty::Int, &w).unwrap();

        assert_eq!(fwd.resolve_if_possible(&v), bwd.resolve_if_possible(&w));
    }

    #[test]
    fn test_never_unifies_one_sided() {
        let mut icx = InferCtx::new();
        assert!(icx.unify(&Ty::Never, &Ty::Int).is_ok());
        assert!(icx.unify(&Ty::Str, &Ty::Never).is_ok());
        assert!(icx.unify(&Ty::Never, &Ty::Never).is_ok());
    }

    #[test]
    fn test_error_absorbs_silently() {
        let mut icx = InferCtx::new();
        let mut sink = ErrorSink::new();
        let err = Ty::Error(ErrorToken(0));
        icx.assign(&mut sink, &err, &Ty::Int, sp());
        icx.assign(&mut sink, &Ty::Str, &err, sp());
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_mismatch_reports_resolved_types() {
        let mut icx = InferCtx::new();
        let mut sink = ErrorSink::new();
        let v = icx.new_var();
        icx.unify(&v, &Ty::Int).unwrap();
        icx.assign(&mut sink, &v, &Ty::Str, sp());
        assert_eq!(sink.errors()[0].message, "expected int, found string");
    }

    #[test]
    fn test_occurs_check() {
        let mut icx = InferCtx::new();
        let v = icx.new_var();
        let nested = Ty::raw_ptr(v.clone());
        assert!(icx.unify(&v, &nested).is_err());
    }

    #[test]
    fn test_struct_identity() {
        let a = ItemId {
            pkg: PkgId(0),
            idx: 1,
        };
        let b = ItemId {
            pkg: PkgId(0),
            idx: 2,
        };
        let sa = Ty::Struct {
            id: a,
            name: "S".to_string(),
        };
        let sa2 = Ty::Struct {
            id: a,
            name: "S".to_string(),
        };
        let sb = Ty::Struct {
            id: b,
            name: "S".to_string(),
        };
        let mut icx = InferCtx::new();
        assert!(icx.unify(&sa, &sa2).is_ok());
        assert!(icx.unify(&sa, &sb).is_err());
    }

    #[test]
    fn test_deep_resolve() {
        let mut icx = InferCtx::new();
        let v = icx.new_var();
        let w = icx.new_var();
        icx.unify(&v, &Ty::raw_ptr(w.clone())).unwrap();
        icx.unify(&w, &Ty::I32).unwrap();
        assert_eq!(icx.resolve_deep(&v), Ty::raw_ptr(Ty::I32));
    }
}
