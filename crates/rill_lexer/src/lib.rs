use logos::Logos;

/// Process escape sequences in a string literal
fn process_escape_sequences(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('0') => result.push('\0'),
                Some(other) => {
                    // Unknown escape - keep as-is
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Identifies a source file registered in the session's source map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Span in source code (file + byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(file: FileId, start: usize, end: usize) -> Self {
        Self { file, start, end }
    }

    /// A span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span::new(self.file, self.start, other.end)
    }
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]  // Skip whitespace
#[logos(skip r"//[^\n]*")]     // Skip line comments
pub enum Token {
    // === Keywords ===
    #[token("function")]
    Function,
    #[token("type")]
    Type,
    #[token("struct")]
    Struct,
    #[token("import")]
    Import,
    #[token("extern")]
    Extern,
    #[token("mod")]
    Mod,
    #[token("global")]
    Global,
    #[token("use")]
    Use,
    #[token("let")]
    Let,
    #[token("mut")]
    Mut,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("loop")]
    Loop,
    #[token("break")]
    Break,

    // === Literals ===
    // Integer literals are base 10; the `_I32` suffix selects the 32-bit
    // subtype, bare literals default to `Int`.
    #[regex(r"[0-9][0-9]*_I32", |lex| {
        let s = lex.slice();
        s[..s.len() - 4].parse::<u64>().ok()
    })]
    I32Literal(u64),

    #[regex(r"[0-9][0-9]*", |lex| lex.slice().parse::<u64>().ok())]
    IntLiteral(u64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        let inner = &s[1..s.len()-1];
        Some(process_escape_sequences(inner))
    })]
    StringLiteral(String),

    // === Identifiers ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("!")]
    Not,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,

    // === Special ===
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Function => write!(f, "function"),
            Token::Type => write!(f, "type"),
            Token::Struct => write!(f, "struct"),
            Token::Import => write!(f, "import"),
            Token::Extern => write!(f, "extern"),
            Token::Mod => write!(f, "mod"),
            Token::Global => write!(f, "global"),
            Token::Use => write!(f, "use"),
            Token::Let => write!(f, "let"),
            Token::Mut => write!(f, "mut"),
            Token::If => write!(f, "if"),
            Token::Then => write!(f, "then"),
            Token::Else => write!(f, "else"),
            Token::Loop => write!(f, "loop"),
            Token::Break => write!(f, "break"),
            Token::I32Literal(n) => write!(f, "{}_I32", n),
            Token::IntLiteral(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "\"{}\"", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::Not => write!(f, "!"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semi => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer wrapper that produces SpannedTokens
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, Token>,
    file: FileId,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(file: FileId, source: &'src str) -> Self {
        Self {
            inner: Token::lexer(source),
            file,
            finished: false,
        }
    }

    /// Tokenize the entire source into a Vec
    pub fn tokenize(file: FileId, source: &str) -> Result<Vec<SpannedToken>, LexError> {
        let mut lexer = Lexer::new(file, source);
        let mut tokens = Vec::new();

        loop {
            let spanned = lexer.next_token()?;
            let is_eof = spanned.token == Token::Eof;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        if self.finished {
            return Ok(SpannedToken {
                token: Token::Eof,
                span: Span::new(self.file, 0, 0),
            });
        }

        match self.inner.next() {
            Some(Ok(token)) => {
                let span = self.inner.span();
                Ok(SpannedToken {
                    token,
                    span: Span::new(self.file, span.start, span.end),
                })
            }
            Some(Err(())) => {
                let span = self.inner.span();
                Err(LexError {
                    message: format!("unexpected character: '{}'", self.inner.slice()),
                    span: Span::new(self.file, span.start, span.end),
                })
            }
            None => {
                self.finished = true;
                let len = self.inner.source().len();
                Ok(SpannedToken {
                    token: Token::Eof,
                    span: Span::new(self.file, len, len),
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for LexError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> FileId {
        FileId(0)
    }

    #[test]
    fn test_basic_tokens() {
        let source = "function main() = ( let x = 5; x );";
        let tokens = Lexer::tokenize(file(), source).unwrap();

        assert!(matches!(tokens[0].token, Token::Function));
        assert!(matches!(tokens[1].token, Token::Ident(ref s) if s == "main"));
        assert!(matches!(tokens[2].token, Token::LParen));
        assert!(matches!(tokens[3].token, Token::RParen));
        assert!(matches!(tokens[4].token, Token::Eq));
        assert!(matches!(tokens[5].token, Token::LParen));
        assert!(matches!(tokens[6].token, Token::Let));
        assert!(matches!(tokens[7].token, Token::Ident(ref s) if s == "x"));
        assert!(matches!(tokens[8].token, Token::Eq));
        assert!(matches!(tokens[9].token, Token::IntLiteral(5)));
        assert!(matches!(tokens[10].token, Token::Semi));
    }

    #[test]
    fn test_integer_suffix() {
        let tokens = Lexer::tokenize(file(), "1 23_I32 4").unwrap();
        assert!(matches!(tokens[0].token, Token::IntLiteral(1)));
        assert!(matches!(tokens[1].token, Token::I32Literal(23)));
        assert!(matches!(tokens[2].token, Token::IntLiteral(4)));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = Lexer::tokenize(file(), r#""a\nb""#).unwrap();
        assert!(matches!(tokens[0].token, Token::StringLiteral(ref s) if s == "a\nb"));
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = Lexer::tokenize(file(), "// nothing\nbreak").unwrap();
        assert!(matches!(tokens[0].token, Token::Break));
        assert!(matches!(tokens[1].token, Token::Eof));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::tokenize(file(), "let a = #").unwrap_err();
        assert!(err.message.contains("unexpected character"));
    }
}
