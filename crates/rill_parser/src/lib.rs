//! Recursive descent parser for the rill surface syntax.
//!
//! Produces the `Parsed`-phase AST: structure only, no identifiers, no
//! resolutions. Parse errors are fatal for the current file. The parser
//! also enforces the flat-precedence rule: a binary chain may not mix
//! operator classes without parentheses.

use rill_ast::*;
use rill_lexer::{FileId, Lexer, Span, SpannedToken, Token};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(file: FileId, source: &str) -> ParseResult<Parser> {
        let tokens = Lexer::tokenize(file, source).map_err(|e| ParseError {
            message: e.message,
            span: e.span,
        })?;
        Ok(Parser { tokens, pos: 0 })
    }

    /// Parse a whole source file into its item list
    pub fn parse(file: FileId, source: &str) -> ParseResult<Vec<Item<Parsed>>> {
        let mut parser = Parser::new(file, source)?;
        parser.parse_items_until_eof()
    }

    // === Token access ===

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_span(&self) -> Span {
        self.current().span
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<SpannedToken> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, self.peek()),
                span: self.peek_span(),
            })
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Span)> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.peek_span();
                self.advance();
                Ok((name, span))
            }
            _ => Err(ParseError {
                message: format!("expected identifier, found '{}'", self.peek()),
                span: self.peek_span(),
            }),
        }
    }

    fn expect_string(&mut self) -> ParseResult<(String, Span)> {
        match self.peek().clone() {
            Token::StringLiteral(s) => {
                let span = self.peek_span();
                self.advance();
                Ok((s, span))
            }
            _ => Err(ParseError {
                message: format!("expected string literal, found '{}'", self.peek()),
                span: self.peek_span(),
            }),
        }
    }

    // === Items ===

    fn parse_items_until_eof(&mut self) -> ParseResult<Vec<Item<Parsed>>> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        Ok(items)
    }

    pub fn parse_item(&mut self) -> ParseResult<Item<Parsed>> {
        match self.peek() {
            Token::Function => self.parse_function(),
            Token::Type => self.parse_typedef(),
            Token::Import => self.parse_import(),
            Token::Extern => self.parse_extern_mod(),
            Token::Mod => self.parse_mod(),
            Token::Global => self.parse_global(),
            Token::Use => self.parse_use(),
            _ => Err(ParseError {
                message: format!(
                    "expected item (function, type, import, extern, mod, global, use), found '{}'",
                    self.peek()
                ),
                span: self.peek_span(),
            }),
        }
    }

    fn parse_generics(&mut self) -> ParseResult<Vec<String>> {
        let mut generics = Vec::new();
        if self.eat(&Token::LBracket) {
            loop {
                let (name, _) = self.expect_ident()?;
                generics.push(name);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBracket)?;
        }
        Ok(generics)
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param<Parsed>>> {
        let mut params = Vec::new();
        self.expect(Token::LParen)?;
        if !self.check(&Token::RParen) {
            loop {
                let (name, span) = self.expect_ident()?;
                self.expect(Token::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param { name, span, ty });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_function(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Function)?;
        let (name, _) = self.expect_ident()?;
        let generics = self.parse_generics()?;
        let params = self.parse_params()?;
        let ret = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(Token::Eq)?;
        let body = self.parse_expr()?;
        let end = self.expect(Token::Semi)?.span;

        Ok(Item {
            span: start.to(end),
            id: (),
            name,
            def_path: (),
            kind: ItemKind::Function(Function {
                generics,
                params,
                ret,
                body,
            }),
        })
    }

    fn parse_typedef(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Type)?;
        let (name, _) = self.expect_ident()?;
        let generics = self.parse_generics()?;
        self.expect(Token::Eq)?;

        let def = if self.check(&Token::Struct) {
            self.advance();
            self.expect(Token::LBrace)?;
            let mut fields = Vec::new();
            while !self.check(&Token::RBrace) {
                let (fname, fspan) = self.expect_ident()?;
                self.expect(Token::Colon)?;
                let ty = self.parse_type()?;
                fields.push(FieldDef {
                    name: fname,
                    span: fspan,
                    ty,
                });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBrace)?;
            TyDefKind::Struct(fields)
        } else {
            TyDefKind::Alias(self.parse_type()?)
        };
        let end = self.expect(Token::Semi)?.span;

        Ok(Item {
            span: start.to(end),
            id: (),
            name,
            def_path: (),
            kind: ItemKind::TypeDef(TypeDef { generics, def }),
        })
    }

    fn parse_import(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Import)?;
        self.expect(Token::LParen)?;
        let (module, _) = self.expect_string()?;
        let (func, _) = self.expect_string()?;
        self.expect(Token::RParen)?;
        self.expect(Token::Function)?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let ret = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let end = self.expect(Token::Semi)?.span;

        Ok(Item {
            span: start.to(end),
            id: (),
            name,
            def_path: (),
            kind: ItemKind::Import(Import {
                module,
                func,
                params,
                ret,
            }),
        })
    }

    fn parse_extern_mod(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Extern)?;
        self.expect(Token::Mod)?;
        let (name, _) = self.expect_ident()?;
        let end = self.expect(Token::Semi)?.span;

        Ok(Item {
            span: start.to(end),
            id: (),
            name: name.clone(),
            def_path: (),
            kind: ItemKind::Extern(ExternPkg { pkg_name: name }),
        })
    }

    fn parse_mod(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Mod)?;
        let (name, _) = self.expect_ident()?;

        let module = if self.eat(&Token::LParen) {
            let mut items = Vec::new();
            while !self.check(&Token::RParen) {
                items.push(self.parse_item()?);
            }
            self.expect(Token::RParen)?;
            Module {
                origin: ModOrigin::Inline,
                items,
            }
        } else {
            // `mod NAME;` - the loader fills the items from NAME.rl
            Module {
                origin: ModOrigin::File,
                items: Vec::new(),
            }
        };
        let end = self.expect(Token::Semi)?.span;

        Ok(Item {
            span: start.to(end),
            id: (),
            name,
            def_path: (),
            kind: ItemKind::Mod(module),
        })
    }

    fn parse_global(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Global)?;
        let mutable = self.eat(&Token::Mut);
        let (name, _) = self.expect_ident()?;
        self.expect(Token::Colon)?;
        let ty = self.parse_type()?;
        self.expect(Token::Eq)?;
        let init = self.parse_expr()?;
        let end = self.expect(Token::Semi)?.span;

        Ok(Item {
            span: start.to(end),
            id: (),
            name,
            def_path: (),
            kind: ItemKind::Global(Global { mutable, ty, init }),
        })
    }

    fn parse_use(&mut self) -> ParseResult<Item<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Use)?;
        let mut segments = vec![self.expect_ident()?];
        while self.eat(&Token::Dot) {
            segments.push(self.expect_ident()?);
        }
        let end = self.expect(Token::Semi)?.span;

        let name = segments
            .last()
            .map(|(s, _)| s.clone())
            .unwrap_or_default();
        Ok(Item {
            span: start.to(end),
            id: (),
            name,
            def_path: (),
            kind: ItemKind::Use(UseDecl {
                segments,
                target: (),
            }),
        })
    }

    // === Types ===

    fn parse_type(&mut self) -> ParseResult<AstTy<Parsed>> {
        let start = self.peek_span();
        match self.peek().clone() {
            Token::Star => {
                self.advance();
                let inner = self.parse_type()?;
                let span = start.to(inner.span);
                Ok(AstTy {
                    span,
                    kind: AstTyKind::RawPtr(Box::new(inner)),
                })
            }
            Token::Not => {
                self.advance();
                Ok(AstTy {
                    span: start,
                    kind: AstTyKind::Never,
                })
            }
            Token::LParen => {
                self.advance();
                if self.check(&Token::RParen) {
                    let end = self.advance().span;
                    return Ok(AstTy {
                        span: start.to(end),
                        kind: AstTyKind::Tuple(Vec::new()),
                    });
                }
                let first = self.parse_type()?;
                if self.eat(&Token::Comma) {
                    let mut elems = vec![first];
                    while !self.check(&Token::RParen) {
                        elems.push(self.parse_type()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(Token::RParen)?.span;
                    Ok(AstTy {
                        span: start.to(end),
                        kind: AstTyKind::Tuple(elems),
                    })
                } else {
                    self.expect(Token::RParen)?;
                    Ok(first)
                }
            }
            Token::Ident(name) => {
                let name_span = self.peek_span();
                self.advance();
                let mut args = Vec::new();
                let mut end = name_span;
                if self.eat(&Token::LBracket) {
                    loop {
                        args.push(self.parse_type()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    end = self.expect(Token::RBracket)?.span;
                }
                Ok(AstTy {
                    span: start.to(end),
                    kind: AstTyKind::Named {
                        name: Name {
                            name,
                            span: name_span,
                            res: (),
                        },
                        args,
                    },
                })
            }
            _ => Err(ParseError {
                message: format!("expected type, found '{}'", self.peek()),
                span: self.peek_span(),
            }),
        }
    }

    // === Expressions ===

    pub fn parse_expr(&mut self) -> ParseResult<Expr<Parsed>> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> ParseResult<Expr<Parsed>> {
        let lhs = self.parse_binary()?;
        if self.check(&Token::Eq) {
            self.advance();
            let rhs = self.parse_assign()?;
            let span = lhs.span.to(rhs.span);
            return Ok(self.mk(span, ExprKind::Assign {
                target: Box::new(lhs),
                value: Box::new(rhs),
            }));
        }
        Ok(lhs)
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match self.peek() {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            Token::Percent => Some(BinOp::Rem),
            Token::EqEq => Some(BinOp::Eq),
            Token::NotEq => Some(BinOp::Ne),
            Token::Lt => Some(BinOp::Lt),
            Token::Gt => Some(BinOp::Gt),
            Token::LtEq => Some(BinOp::Le),
            Token::GtEq => Some(BinOp::Ge),
            Token::Amp => Some(BinOp::And),
            Token::Pipe => Some(BinOp::Or),
            _ => None,
        }
    }

    /// Left-associative chain of binary operators. All operators in one
    /// chain must share a precedence class; mixing requires parentheses.
    fn parse_binary(&mut self) -> ParseResult<Expr<Parsed>> {
        let mut lhs = self.parse_unary()?;
        let mut chain_class: Option<OpClass> = None;

        while let Some(op) = self.peek_binop() {
            let op_span = self.peek_span();
            match chain_class {
                None => chain_class = Some(op.class()),
                Some(class) if class != op.class() => {
                    return Err(ParseError {
                        message: format!(
                            "operator '{}' cannot be mixed with the preceding chain without parentheses",
                            op
                        ),
                        span: op_span,
                    });
                }
                Some(_) => {}
            }
            self.advance();
            let rhs = self.parse_unary()?;
            let span = lhs.span.to(rhs.span);
            lhs = self.mk(span, ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr<Parsed>> {
        let start = self.peek_span();
        let op = match self.peek() {
            Token::Not => Some(UnOp::Not),
            Token::Minus => Some(UnOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.to(operand.span);
            return Ok(self.mk(span, ExprKind::Unary {
                op,
                operand: Box::new(operand),
            }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr<Parsed>> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&Token::LParen) {
                // `___asm("...", ...)` is recognized syntactically
                if let ExprKind::Ident(name) = &expr.kind {
                    if name.name == "___asm" {
                        expr = self.parse_asm(expr.span)?;
                        continue;
                    }
                }
                self.advance();
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(Token::RParen)?.span;
                let span = expr.span.to(end);
                expr = self.mk(span, ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                });
            } else if self.check(&Token::Dot) {
                self.advance();
                let (field, field_span) = match self.peek().clone() {
                    Token::Ident(name) => {
                        let span = self.peek_span();
                        self.advance();
                        (FieldName::Named(name), span)
                    }
                    Token::IntLiteral(n) => {
                        let span = self.peek_span();
                        self.advance();
                        (FieldName::Index(n), span)
                    }
                    _ => {
                        return Err(ParseError {
                            message: format!("expected field name, found '{}'", self.peek()),
                            span: self.peek_span(),
                        });
                    }
                };
                let span = expr.span.to(field_span);
                expr = self.mk(span, ExprKind::FieldAccess {
                    base: Box::new(expr),
                    field,
                    field_span,
                    idx: None,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_asm(&mut self, start: Span) -> ParseResult<Expr<Parsed>> {
        self.expect(Token::LParen)?;
        let mut instrs = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (instr, _) = self.expect_string()?;
                instrs.push(instr);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(Token::RParen)?.span;
        Ok(self.mk(start.to(end), ExprKind::Asm { instrs }))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr<Parsed>> {
        let start = self.peek_span();
        match self.peek().clone() {
            Token::IntLiteral(n) => {
                self.advance();
                Ok(self.mk(start, ExprKind::Literal(Lit::Int(n, IntKind::Int))))
            }
            Token::I32Literal(n) => {
                self.advance();
                Ok(self.mk(start, ExprKind::Literal(Lit::Int(n, IntKind::I32))))
            }
            Token::StringLiteral(s) => {
                self.advance();
                Ok(self.mk(start, ExprKind::Literal(Lit::Str(s))))
            }
            Token::Let => self.parse_let(),
            Token::If => self.parse_if(),
            Token::Loop => {
                self.advance();
                let body = self.parse_expr()?;
                let span = start.to(body.span);
                Ok(self.mk(span, ExprKind::Loop {
                    id: (),
                    body: Box::new(body),
                }))
            }
            Token::Break => {
                self.advance();
                Ok(self.mk(start, ExprKind::Break { target: None }))
            }
            Token::LParen => self.parse_paren_group(),
            Token::Ident(name) => {
                self.advance();
                let ident = Name {
                    name,
                    span: start,
                    res: (),
                };
                if self.check(&Token::LBrace) {
                    return self.parse_struct_literal(ident);
                }
                Ok(self.mk(start, ExprKind::Ident(ident)))
            }
            _ => Err(ParseError {
                message: format!("expected expression, found '{}'", self.peek()),
                span: self.peek_span(),
            }),
        }
    }

    fn parse_let(&mut self) -> ParseResult<Expr<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::Let)?;
        let (name, name_span) = self.expect_ident()?;
        let ascription = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(Token::Eq)?;
        let init = self.parse_expr()?;
        let span = start.to(init.span);
        Ok(self.mk(span, ExprKind::Let {
            name,
            name_span,
            ascription,
            init: Box::new(init),
            local_ty: None,
        }))
    }

    fn parse_if(&mut self) -> ParseResult<Expr<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::If)?;
        let cond = self.parse_expr()?;
        self.expect(Token::Then)?;
        let then_branch = self.parse_expr()?;
        let else_branch = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|e| e.span)
            .unwrap_or(then_branch.span);
        let span = start.to(end);
        Ok(self.mk(span, ExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
        }))
    }

    /// `()` empty, `(e)` one-element block, `(e; e; ...)` block,
    /// `(e, e, ...)` and `(e,)` tuples
    fn parse_paren_group(&mut self) -> ParseResult<Expr<Parsed>> {
        let start = self.peek_span();
        self.expect(Token::LParen)?;

        if self.check(&Token::RParen) {
            let end = self.advance().span;
            return Ok(self.mk(start.to(end), ExprKind::Empty));
        }

        let first = self.parse_expr()?;

        if self.check(&Token::Comma) {
            let mut elems = vec![first];
            while self.eat(&Token::Comma) {
                if self.check(&Token::RParen) {
                    break;
                }
                elems.push(self.parse_expr()?);
            }
            let end = self.expect(Token::RParen)?.span;
            return Ok(self.mk(start.to(end), ExprKind::TupleLiteral { elems }));
        }

        let mut exprs = vec![first];
        while self.eat(&Token::Semi) {
            if self.check(&Token::RParen) {
                break;
            }
            exprs.push(self.parse_expr()?);
        }
        let end = self.expect(Token::RParen)?.span;
        Ok(self.mk(start.to(end), ExprKind::Block {
            exprs,
            locals: Vec::new(),
        }))
    }

    fn parse_struct_literal(&mut self, name: Name<Parsed>) -> ParseResult<Expr<Parsed>> {
        let start = name.span;
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            let (fname, fspan) = self.expect_ident()?;
            self.expect(Token::Colon)?;
            let value = self.parse_expr()?;
            fields.push(FieldInit {
                name: fname,
                span: fspan,
                value,
                idx: None,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let end = self.expect(Token::RBrace)?.span;
        Ok(self.mk(start.to(end), ExprKind::StructLiteral { name, fields }))
    }

    fn mk(&self, span: Span, kind: ExprKind<Parsed>) -> Expr<Parsed> {
        Expr {
            span,
            ty: (),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_ast::pretty;

    fn parse(src: &str) -> Vec<Item<Parsed>> {
        Parser::parse(FileId(0), src).unwrap()
    }

    #[test]
    fn test_parse_simple_fn() {
        let items = parse("function main() = ( let x = 5; x );");
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].kind, ItemKind::Function(_)));
    }

    #[test]
    fn test_parse_struct_typedef() {
        let items = parse("type Pair = struct { x: Int, y: Int };");
        match &items[0].kind {
            ItemKind::TypeDef(td) => match &td.def {
                TyDefKind::Struct(fields) => assert_eq!(fields.len(), 2),
                _ => panic!("expected struct"),
            },
            _ => panic!("expected typedef"),
        }
    }

    #[test]
    fn test_parse_alias_and_generics() {
        let items = parse("type Boxed[T] = struct { value: T };");
        match &items[0].kind {
            ItemKind::TypeDef(td) => assert_eq!(td.generics, vec!["T".to_string()]),
            _ => panic!("expected typedef"),
        }
    }

    #[test]
    fn test_parse_import() {
        let items = parse("import (\"env\" \"log\") function log(msg: String);");
        match &items[0].kind {
            ItemKind::Import(imp) => {
                assert_eq!(imp.module, "env");
                assert_eq!(imp.func, "log");
                assert_eq!(imp.params.len(), 1);
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn test_parse_mod_forms() {
        let items = parse("mod m ( function g() = (); ); mod util;");
        match &items[0].kind {
            ItemKind::Mod(m) => {
                assert_eq!(m.origin, ModOrigin::Inline);
                assert_eq!(m.items.len(), 1);
            }
            _ => panic!("expected mod"),
        }
        match &items[1].kind {
            ItemKind::Mod(m) => assert_eq!(m.origin, ModOrigin::File),
            _ => panic!("expected mod"),
        }
    }

    #[test]
    fn test_parse_global_and_use() {
        let items = parse("global mut counter: Int = 0; use a.b.c;");
        match &items[0].kind {
            ItemKind::Global(g) => assert!(g.mutable),
            _ => panic!("expected global"),
        }
        match &items[1].kind {
            ItemKind::Use(u) => {
                assert_eq!(u.segments.len(), 3);
                assert_eq!(items[1].name, "c");
            }
            _ => panic!("expected use"),
        }
    }

    #[test]
    fn test_tuple_vs_block_vs_empty() {
        let items = parse("function f() = ( (1, 2); (1,); (); (1; 2) );");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!("expected function"),
        };
        let exprs = match &body.kind {
            ExprKind::Block { exprs, .. } => exprs,
            _ => panic!("expected block"),
        };
        assert!(matches!(
            &exprs[0].kind,
            ExprKind::TupleLiteral { elems } if elems.len() == 2
        ));
        assert!(matches!(
            &exprs[1].kind,
            ExprKind::TupleLiteral { elems } if elems.len() == 1
        ));
        assert!(matches!(exprs[2].kind, ExprKind::Empty));
        assert!(matches!(
            &exprs[3].kind,
            ExprKind::Block { exprs, .. } if exprs.len() == 2
        ));
    }

    #[test]
    fn test_integer_literal_kinds() {
        let items = parse("function f() = ( 1; 2_I32 );");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!(),
        };
        let exprs = match &body.kind {
            ExprKind::Block { exprs, .. } => exprs,
            _ => panic!(),
        };
        assert!(matches!(
            exprs[0].kind,
            ExprKind::Literal(Lit::Int(1, IntKind::Int))
        ));
        assert!(matches!(
            exprs[1].kind,
            ExprKind::Literal(Lit::Int(2, IntKind::I32))
        ));
    }

    #[test]
    fn test_mixed_precedence_rejected() {
        let err = Parser::parse(FileId(0), "function f() = 1 + 2 < 3;").unwrap_err();
        assert!(err.message.contains("parentheses"));
    }

    #[test]
    fn test_same_class_chain_allowed() {
        let items = parse("function f() = 1 + 2 - 3;");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!(),
        };
        // left associative: (1 + 2) - 3
        match &body.kind {
            ExprKind::Binary { op, lhs, .. } => {
                assert_eq!(*op, BinOp::Sub);
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary { op: BinOp::Add, .. }
                ));
            }
            _ => panic!("expected binary"),
        }
    }

    #[test]
    fn test_if_then_else_and_loop() {
        let items = parse("function f() = if 1 < 2 then 1 else loop ( break );");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!(),
        };
        match &body.kind {
            ExprKind::If { else_branch, .. } => {
                assert!(matches!(
                    else_branch.as_ref().unwrap().kind,
                    ExprKind::Loop { .. }
                ));
            }
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn test_struct_literal_and_field_access() {
        let items = parse("function f() = Pair { x: 1, y: 2 }.x;");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!(),
        };
        match &body.kind {
            ExprKind::FieldAccess { base, field, idx, .. } => {
                assert_eq!(*field, FieldName::Named("x".to_string()));
                assert!(idx.is_none());
                assert!(matches!(base.kind, ExprKind::StructLiteral { .. }));
            }
            _ => panic!("expected field access"),
        }
    }

    #[test]
    fn test_numeric_field_access() {
        let items = parse("function f() = (1, 2).0;");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!(),
        };
        assert!(matches!(
            &body.kind,
            ExprKind::FieldAccess { field: FieldName::Index(0), .. }
        ));
    }

    #[test]
    fn test_asm_expression() {
        let items = parse("function f() = ___asm(\"i32.const 1\", \"drop\");");
        let body = match &items[0].kind {
            ItemKind::Function(f) => &f.body,
            _ => panic!(),
        };
        match &body.kind {
            ExprKind::Asm { instrs } => assert_eq!(instrs.len(), 2),
            _ => panic!("expected asm"),
        }
    }

    #[test]
    fn test_rawptr_and_never_types() {
        let items = parse("function f(p: *Pair): ! = trap();");
        match &items[0].kind {
            ItemKind::Function(f) => {
                assert!(matches!(f.params[0].ty.kind, AstTyKind::RawPtr(_)));
                assert!(matches!(f.ret.as_ref().unwrap().kind, AstTyKind::Never));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_print_reparse_fixpoint() {
        let src = "type Pair = struct { x: Int, y: I32 };\n\
                   global mut g: Int = 41;\n\
                   function main(): Int = ( let p = Pair { x: 1, y: 2_I32 }; g = ( g + 1 ); if ( p.x < 2 ) then p.x else loop ( break ) );\n";
        let once = pretty::print_items(&parse(src), 0);
        let twice = pretty::print_items(&parse(&once), 0);
        assert_eq!(once, twice);
    }
}
