//! Package and module-file loading.
//!
//! `extern mod NAME;` resolves to the embedded standard library (for
//! `std`, unless disabled) or to `NAME.rl` next to the root source file.
//! Each package loads at most once; circular dependencies are diagnosed.
//! `mod NAME;` items load `NAME.rl` relative to the declaring file and
//! splice the parsed items in before the build phase.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rill_ast::{build_package, Context, Item, ItemKind, ModOrigin, Package, PackageLoader, Parsed, PkgId, Typecked};
use rill_lexer::{FileId, Span};
use rill_parser::Parser;
use rill_resolve::resolve_package;
use rill_session::ErrorToken;
use rill_typeck::typecheck_package;

/// Prototype standard library, compiled like any other dependency
pub const STD_SOURCE: &str = r#"// Prototype allocation support over the raw memory builtins.

global mut next_free: I32 = 0_I32;

function heap_base(): I32 = __memory_size() * 65536_I32;

function alloc(size: I32): I32 = (
    let ptr = if next_free == 0_I32 then heap_base() else next_free;
    next_free = ptr + size;
    grow_to(next_free);
    ptr
);

function grow_to(limit: I32): () = (
    loop (
        if ( __memory_size() * 65536_I32 ) >= limit then break
        else ( __memory_grow(1_I32); () )
    )
);

function zero(ptr: I32, len: I32): () = (
    let end = ptr + len;
    let cur = ptr;
    loop (
        if cur >= end then break
        else ( __i32_store(cur, 0_I32); cur = cur + 4_I32 )
    )
);
"#;

pub struct FileLoader {
    /// Directory holding the root package's source file
    search_dir: PathBuf,
    no_std: bool,
    loaded: HashMap<String, PkgId>,
    loading: Vec<String>,
}

impl FileLoader {
    pub fn new(search_dir: PathBuf, no_std: bool) -> FileLoader {
        FileLoader {
            search_dir,
            no_std,
            loaded: HashMap::new(),
            loading: Vec::new(),
        }
    }

    fn load_uncached(&mut self, ctx: &mut Context, name: &str, span: Span) -> Option<PkgId> {
        let (path, source) = if name == "std" && !self.no_std {
            (PathBuf::from("<std>"), STD_SOURCE.to_string())
        } else {
            let path = self.search_dir.join(format!("{}.rl", name));
            match fs::read_to_string(&path) {
                Ok(source) => (path, source),
                Err(err) => {
                    ctx.sink.emit(
                        format!("cannot load package `{}`: {}", name, err),
                        span,
                    );
                    return None;
                }
            }
        };

        let pkg = compile_package(ctx, self, name, path, &source)?;
        let id = pkg.id;
        ctx.deps.push(pkg);
        Some(id)
    }
}

impl PackageLoader for FileLoader {
    fn load_package(&mut self, ctx: &mut Context, name: &str, span: Span) -> Option<PkgId> {
        if let Some(&id) = self.loaded.get(name) {
            return Some(id);
        }
        if self.loading.iter().any(|n| n == name) {
            ctx.sink.emit(
                format!("circular package dependency on `{}`", name),
                span,
            );
            return None;
        }

        self.loading.push(name.to_string());
        let result = self.load_uncached(ctx, name, span);
        self.loading.pop();

        if let Some(id) = result {
            self.loaded.insert(name.to_string(), id);
        }
        result
    }

    fn load_module_file(
        &mut self,
        ctx: &mut Context,
        referrer: &Path,
        name: &str,
        span: Span,
    ) -> Result<(FileId, String), ErrorToken> {
        let dir = referrer.parent().unwrap_or_else(|| Path::new("."));
        let path = dir.join(format!("{}.rl", name));
        match fs::read_to_string(&path) {
            Ok(source) => {
                let file = ctx
                    .sources
                    .add_file(path.display().to_string(), source.clone());
                Ok((file, source))
            }
            Err(err) => Err(ctx
                .sink
                .emit(format!("cannot load module `{}`: {}", name, err), span)),
        }
    }
}

/// Replace every `mod NAME;` item with the parsed contents of `NAME.rl`,
/// recursively. Unloadable or unparsable files become error items.
pub fn expand_file_mods(
    ctx: &mut Context,
    loader: &mut FileLoader,
    items: &mut Vec<Item<Parsed>>,
    referrer: &Path,
) {
    for item in items.iter_mut() {
        let is_file_mod =
            matches!(&item.kind, ItemKind::Mod(m) if m.origin == ModOrigin::File);
        if is_file_mod {
            match loader.load_module_file(ctx, referrer, &item.name, item.span) {
                Ok((file, source)) => match Parser::parse(file, &source) {
                    Ok(mut sub_items) => {
                        let sub_path = referrer
                            .parent()
                            .unwrap_or_else(|| Path::new("."))
                            .join(format!("{}.rl", item.name));
                        expand_file_mods(ctx, loader, &mut sub_items, &sub_path);
                        if let ItemKind::Mod(m) = &mut item.kind {
                            m.items = sub_items;
                        }
                    }
                    Err(err) => {
                        let tok = ctx.sink.emit(err.message, err.span);
                        item.kind = ItemKind::Error(tok);
                    }
                },
                Err(tok) => {
                    item.kind = ItemKind::Error(tok);
                }
            }
        } else if let ItemKind::Mod(m) = &mut item.kind {
            expand_file_mods(ctx, loader, &mut m.items, referrer);
        }
    }
}

/// Full pipeline for a dependency package: parse, expand file modules,
/// build, resolve, type-check
pub fn compile_package(
    ctx: &mut Context,
    loader: &mut FileLoader,
    name: &str,
    path: PathBuf,
    source: &str,
) -> Option<Package<Typecked>> {
    let file = ctx.sources.add_file(path.display().to_string(), source);
    let mut items = match Parser::parse(file, source) {
        Ok(items) => items,
        Err(err) => {
            ctx.sink.emit(err.message, err.span);
            return None;
        }
    };
    expand_file_mods(ctx, loader, &mut items, &path);

    let pkg_id = ctx.fresh_pkg_id();
    let span = Span::new(file, 0, source.len());
    let built = build_package(pkg_id, name, path, span, items);
    let resolved = resolve_package(ctx, loader, built);
    Some(typecheck_package(ctx, resolved))
}
