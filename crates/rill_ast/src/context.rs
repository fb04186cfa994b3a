//! Per-invocation compilation context.

use rill_lexer::{FileId, Span};
use rill_session::{ErrorSink, ErrorToken, Options, SourceMap};

use crate::ast::{ItemId, Package, PkgId, Typecked};

/// State shared by every phase of one compiler invocation: the source map,
/// the error sink, the options and the finalized dependency packages.
pub struct Context {
    pub sources: SourceMap,
    pub sink: ErrorSink,
    pub options: Options,
    next_pkg: u32,
    /// Dependency packages that finished type checking, in load order
    pub deps: Vec<Package<Typecked>>,
}

impl Context {
    pub fn new(options: Options) -> Context {
        Context {
            sources: SourceMap::new(),
            sink: ErrorSink::new(),
            options,
            next_pkg: 0,
            deps: Vec::new(),
        }
    }

    pub fn fresh_pkg_id(&mut self) -> PkgId {
        let id = PkgId(self.next_pkg);
        self.next_pkg += 1;
        id
    }

    pub fn dep(&self, id: PkgId) -> Option<&Package<Typecked>> {
        self.deps.iter().find(|p| p.id == id)
    }

    pub fn dep_by_name(&self, name: &str) -> Option<&Package<Typecked>> {
        self.deps.iter().find(|p| p.name == name)
    }

    /// Root item identifier of the finalized dependency called `name`
    pub fn dep_root(&self, name: &str) -> Option<ItemId> {
        self.dep_by_name(name).map(|p| ItemId::root(p.id))
    }
}

/// Loads dependency packages and file-based modules on behalf of the
/// resolver and the driver. Implementations memoize by package name and
/// detect load cycles.
pub trait PackageLoader {
    /// Load the dependency package `name`, type-checking it recursively and
    /// appending it to `ctx.deps`; returns its id, or `None` after emitting
    /// a diagnostic
    fn load_package(&mut self, ctx: &mut Context, name: &str, span: Span) -> Option<PkgId>;

    /// Load the source file backing `mod name;` declared in `referrer`
    fn load_module_file(
        &mut self,
        ctx: &mut Context,
        referrer: &std::path::Path,
        name: &str,
        span: Span,
    ) -> Result<(FileId, String), ErrorToken>;
}

/// Loader that refuses every request; used where dependencies cannot occur
pub struct NoLoader;

impl PackageLoader for NoLoader {
    fn load_package(&mut self, ctx: &mut Context, name: &str, span: Span) -> Option<PkgId> {
        ctx.sink
            .emit(format!("cannot load package `{}`", name), span);
        None
    }

    fn load_module_file(
        &mut self,
        ctx: &mut Context,
        _referrer: &std::path::Path,
        name: &str,
        span: Span,
    ) -> Result<(FileId, String), ErrorToken> {
        Err(ctx
            .sink
            .emit(format!("cannot load module file `{}`", name), span))
    }
}
