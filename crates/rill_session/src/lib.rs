//! Shared session state: diagnostics, source mapping, options.
//!
//! Every compiler phase reports recoverable problems through the same
//! [`ErrorSink`]; each emission hands back an [`ErrorToken`] that the phase
//! embeds in an error sentinel node. Fatal problems (I/O, unparsable files)
//! use [`FatalError`] instead and abort the current file.

use rill_lexer::{FileId, Span};
use thiserror::Error;

/// A recoverable diagnostic, reported at a source span
#[derive(Debug, Clone)]
pub struct CompilerError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for CompilerError {}

/// Token returned by [`ErrorSink::emit`]; error sentinels carry it so later
/// phases can tell which diagnostic produced them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorToken(pub u32);

/// Accumulates diagnostics for a whole compilation
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: Vec<CompilerError>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and return the token for its error sentinel
    pub fn emit(&mut self, message: impl Into<String>, span: Span) -> ErrorToken {
        let token = ErrorToken(self.errors.len() as u32);
        self.errors.push(CompilerError {
            message: message.into(),
            span,
        });
        token
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    /// Render every diagnostic with file/line/column positions
    pub fn report(&self, sources: &SourceMap) -> String {
        let mut out = String::new();
        for err in &self.errors {
            let (line, col) = sources.line_col(err.span.file, err.span.start);
            out.push_str(&format!(
                "error: {} at {}:{}:{}\n",
                err.message,
                sources.name(err.span.file),
                line,
                col
            ));
        }
        out
    }
}

/// Registry of loaded source files, for span -> position mapping
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<(String, String)>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push((name.into(), source.into()));
        id
    }

    pub fn name(&self, file: FileId) -> &str {
        &self.files[file.0 as usize].0
    }

    pub fn source(&self, file: FileId) -> &str {
        &self.files[file.0 as usize].1
    }

    /// One-based line and column of a byte offset
    pub fn line_col(&self, file: FileId, offset: usize) -> (usize, usize) {
        let src = self.source(file);
        let offset = offset.min(src.len());
        let mut line = 1;
        let mut line_start = 0;
        for (i, c) in src[..offset].char_indices() {
            if c == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        (line, offset - line_start + 1)
    }
}

/// Debug output categories selected with `--debug`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCategory {
    Tokens,
    Ast,
    Resolved,
    Typecked,
    Wat,
    WasmValidate,
}

impl DebugCategory {
    pub fn from_name(name: &str) -> Option<DebugCategory> {
        match name {
            "tokens" => Some(DebugCategory::Tokens),
            "ast" => Some(DebugCategory::Ast),
            "resolved" => Some(DebugCategory::Resolved),
            "typecked" => Some(DebugCategory::Typecked),
            "wat" => Some(DebugCategory::Wat),
            "wasm-validate" => Some(DebugCategory::WasmValidate),
            _ => None,
        }
    }
}

/// Per-invocation compiler configuration
#[derive(Debug, Clone)]
pub struct Options {
    /// Name of the package being compiled
    pub package_name: String,
    /// Output path for the emitted text module
    pub output: std::path::PathBuf,
    /// Skip writing the output file
    pub no_output: bool,
    /// Do not make the embedded standard library loadable
    pub no_std: bool,
    /// Enabled debug categories
    pub debug: Vec<DebugCategory>,
}

impl Options {
    pub fn debug_enabled(&self, category: DebugCategory) -> bool {
        self.debug.contains(&category)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            package_name: "main".to_string(),
            output: std::path::PathBuf::from("out.wat"),
            no_output: false,
            no_std: false,
            debug: Vec::new(),
        }
    }
}

/// Non-recoverable failures; these abort the current file or the run
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{message} at {}:{}..{}", span.file.0, span.start, span.end)]
    Parse { message: String, span: Span },
    #[error("{0}")]
    Usage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tokens_are_sequential() {
        let mut map = SourceMap::new();
        let file = map.add_file("t.rl", "abc");
        let mut sink = ErrorSink::new();
        let a = sink.emit("first", Span::new(file, 0, 1));
        let b = sink.emit("second", Span::new(file, 1, 2));
        assert_eq!(a, ErrorToken(0));
        assert_eq!(b, ErrorToken(1));
        assert!(sink.has_errors());
    }

    #[test]
    fn test_line_col() {
        let mut map = SourceMap::new();
        let file = map.add_file("t.rl", "ab\ncd\nef");
        assert_eq!(map.line_col(file, 0), (1, 1));
        assert_eq!(map.line_col(file, 3), (2, 1));
        assert_eq!(map.line_col(file, 7), (3, 2));
    }

    #[test]
    fn test_report_positions() {
        let mut map = SourceMap::new();
        let file = map.add_file("main.rl", "let x\nlet y");
        let mut sink = ErrorSink::new();
        sink.emit("cannot find y", Span::new(file, 10, 11));
        let report = sink.report(&map);
        assert!(report.contains("main.rl:2:5"));
    }

    #[test]
    fn test_debug_category_names() {
        assert_eq!(DebugCategory::from_name("wat"), Some(DebugCategory::Wat));
        assert_eq!(DebugCategory::from_name("nope"), None);
    }

    #[test]
    fn test_line_col_clamps_past_end() {
        let mut map = SourceMap::new();
        let file = map.add_file("t.rl", "ab");
        assert_eq!(map.line_col(file, 99), (1, 3));
    }
}
