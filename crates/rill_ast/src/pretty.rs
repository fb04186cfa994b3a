//! Source-form printer, used by the driver's `--debug` categories.
//!
//! Prints the structural payload only, so it works for every phase. Binary
//! operands are always parenthesized, which keeps the output inside the
//! single-precedence-class grammar and makes printing a fixpoint.

use crate::ast::*;

pub fn print_package<P: Phase>(pkg: &Package<P>) -> String {
    match &pkg.root.kind {
        ItemKind::Mod(m) => print_items(&m.items, 0),
        _ => print_item(&pkg.root, 0),
    }
}

pub fn print_items<P: Phase>(items: &[Item<P>], indent: usize) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&print_item(item, indent));
        out.push('\n');
    }
    out
}

pub fn print_item<P: Phase>(item: &Item<P>, indent: usize) -> String {
    let ind = "    ".repeat(indent);
    match &item.kind {
        ItemKind::Function(f) => {
            let ret = f
                .ret
                .as_ref()
                .map(|t| format!(": {}", print_ast_ty(t)))
                .unwrap_or_default();
            format!(
                "{}function {}{}({}){} = {};",
                ind,
                item.name,
                print_generics(&f.generics),
                print_params(&f.params),
                ret,
                print_expr(&f.body)
            )
        }
        ItemKind::TypeDef(td) => match &td.def {
            TyDefKind::Struct(fields) => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, print_ast_ty(&f.ty)))
                    .collect();
                format!(
                    "{}type {}{} = struct {{ {} }};",
                    ind,
                    item.name,
                    print_generics(&td.generics),
                    fields.join(", ")
                )
            }
            TyDefKind::Alias(ty) => format!(
                "{}type {}{} = {};",
                ind,
                item.name,
                print_generics(&td.generics),
                print_ast_ty(ty)
            ),
        },
        ItemKind::Import(imp) => {
            let ret = imp
                .ret
                .as_ref()
                .map(|t| format!(": {}", print_ast_ty(t)))
                .unwrap_or_default();
            format!(
                "{}import (\"{}\" \"{}\") function {}({}){};",
                ind,
                imp.module,
                imp.func,
                item.name,
                print_params(&imp.params),
                ret
            )
        }
        ItemKind::Mod(m) => {
            let mut out = format!("{}mod {} (\n", ind, item.name);
            out.push_str(&print_items(&m.items, indent + 1));
            out.push_str(&format!("{});", ind));
            out
        }
        ItemKind::Extern(e) => format!("{}extern mod {};", ind, e.pkg_name),
        ItemKind::Global(g) => {
            let mut_str = if g.mutable { "mut " } else { "" };
            format!(
                "{}global {}{}: {} = {};",
                ind,
                mut_str,
                item.name,
                print_ast_ty(&g.ty),
                print_expr(&g.init)
            )
        }
        ItemKind::Use(u) => {
            let segs: Vec<&str> = u.segments.iter().map(|(s, _)| s.as_str()).collect();
            format!("{}use {};", ind, segs.join("."))
        }
        ItemKind::Error(_) => format!("{}/* error item */", ind),
    }
}

fn print_generics(generics: &[String]) -> String {
    if generics.is_empty() {
        String::new()
    } else {
        format!("[{}]", generics.join(", "))
    }
}

fn print_params<P: Phase>(params: &[Param<P>]) -> String {
    let params: Vec<String> = params
        .iter()
        .map(|p| format!("{}: {}", p.name, print_ast_ty(&p.ty)))
        .collect();
    params.join(", ")
}

pub fn print_expr<P: Phase>(expr: &Expr<P>) -> String {
    match &expr.kind {
        ExprKind::Empty => "()".to_string(),
        ExprKind::Let {
            name,
            ascription,
            init,
            ..
        } => {
            let ty = ascription
                .as_ref()
                .map(|t| format!(": {}", print_ast_ty(t)))
                .unwrap_or_default();
            format!("let {}{} = {}", name, ty, print_expr(init))
        }
        ExprKind::Assign { target, value } => {
            format!("{} = {}", print_expr(target), print_expr(value))
        }
        ExprKind::Block { exprs, .. } => {
            let exprs: Vec<String> = exprs.iter().map(|e| print_expr(e)).collect();
            format!("( {} )", exprs.join("; "))
        }
        ExprKind::Literal(Lit::Str(s)) => format!("\"{}\"", escape_str(s)),
        ExprKind::Literal(Lit::Int(n, IntKind::Int)) => format!("{}", n),
        ExprKind::Literal(Lit::Int(n, IntKind::I32)) => format!("{}_I32", n),
        ExprKind::Ident(name) => name.name.clone(),
        ExprKind::Path { segments, .. } => {
            let segs: Vec<&str> = segments.iter().map(|(s, _)| s.as_str()).collect();
            segs.join(".")
        }
        ExprKind::Binary { op, lhs, rhs } => {
            format!(
                "{} {} {}",
                print_operand(lhs),
                op,
                print_operand(rhs)
            )
        }
        ExprKind::Unary { op, operand } => format!("{}{}", op, print_operand(operand)),
        ExprKind::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(|a| print_expr(a)).collect();
            format!("{}({})", print_operand(callee), args.join(", "))
        }
        ExprKind::FieldAccess { base, field, .. } => {
            format!("{}.{}", print_operand(base), field)
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let els = else_branch
                .as_ref()
                .map(|e| format!(" else {}", print_expr(e)))
                .unwrap_or_default();
            format!(
                "if {} then {}{}",
                print_expr(cond),
                print_expr(then_branch),
                els
            )
        }
        ExprKind::Loop { body, .. } => format!("loop {}", print_expr(body)),
        ExprKind::Break { .. } => "break".to_string(),
        ExprKind::StructLiteral { name, fields } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|f| format!("{}: {}", f.name, print_expr(&f.value)))
                .collect();
            format!("{} {{ {} }}", name.name, fields.join(", "))
        }
        ExprKind::TupleLiteral { elems } => {
            let parts: Vec<String> = elems.iter().map(|e| print_expr(e)).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        ExprKind::Asm { instrs } => {
            let parts: Vec<String> = instrs.iter().map(|i| format!("\"{}\"", i)).collect();
            format!("___asm({})", parts.join(", "))
        }
        ExprKind::Error(_) => "/* error */()".to_string(),
    }
}

/// Wrap operands that would reparse differently without parens
fn print_operand<P: Phase>(expr: &Expr<P>) -> String {
    match &expr.kind {
        ExprKind::Binary { .. }
        | ExprKind::Assign { .. }
        | ExprKind::If { .. }
        | ExprKind::Let { .. }
        | ExprKind::Loop { .. } => format!("( {} )", print_expr(expr)),
        _ => print_expr(expr),
    }
}

pub fn print_ast_ty<P: Phase>(ty: &AstTy<P>) -> String {
    match &ty.kind {
        AstTyKind::Named { name, args } => {
            if args.is_empty() {
                name.name.clone()
            } else {
                let args: Vec<String> = args.iter().map(print_ast_ty).collect();
                format!("{}[{}]", name.name, args.join(", "))
            }
        }
        AstTyKind::Tuple(elems) => {
            let parts: Vec<String> = elems.iter().map(print_ast_ty).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        AstTyKind::RawPtr(inner) => format!("*{}", print_ast_ty(inner)),
        AstTyKind::Never => "!".to_string(),
        AstTyKind::Error(_) => "/* error */()".to_string(),
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}
