use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use rill_ast::{build_package, pretty, Context, ItemKind, Package, Typecked};
use rill_codegen::generate;
use rill_lexer::{Lexer, Span};
use rill_parser::Parser;
use rill_resolve::resolve_package;
use rill_session::{DebugCategory, Options};
use rill_typeck::typecheck_package;

mod loader;

use loader::{expand_file_mods, FileLoader};

fn print_usage() {
    eprintln!("Rill Compiler");
    eprintln!();
    eprintln!("Usage: rillc [options] <file.rl>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --name NAME      Package name (default: the file stem)");
    eprintln!("  -o FILE          Output path (default: out.wat)");
    eprintln!("  --no-output      Run all phases but write nothing");
    eprintln!("  --no-std         Do not provide the standard library package");
    eprintln!("  --debug CAT      Enable a debug category; repeatable");
    eprintln!("                   (tokens, ast, resolved, typecked, wat, wasm-validate)");
    eprintln!("  -h, --help       Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  rillc demos/hello.rl");
    eprintln!("  rillc --debug typecked --no-output main.rl");
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut options = Options::default();
    let mut name_given = false;
    let mut input: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "--name" => {
                i += 1;
                match args.get(i) {
                    Some(name) => {
                        options.package_name = name.clone();
                        name_given = true;
                    }
                    None => fail_usage("--name requires a value"),
                }
            }
            "-o" | "--output" => {
                i += 1;
                match args.get(i) {
                    Some(path) => options.output = PathBuf::from(path),
                    None => fail_usage("-o requires a value"),
                }
            }
            "--no-output" => options.no_output = true,
            "--no-std" => options.no_std = true,
            "--debug" => {
                i += 1;
                match args.get(i).and_then(|c| DebugCategory::from_name(c)) {
                    Some(category) => options.debug.push(category),
                    None => fail_usage(
                        "--debug requires one of: tokens, ast, resolved, typecked, wat, wasm-validate",
                    ),
                }
            }
            flag if flag.starts_with('-') => {
                fail_usage(&format!("unknown option '{}'", flag));
            }
            file => {
                if input.is_some() {
                    fail_usage("more than one input file");
                }
                input = Some(file.to_string());
            }
        }
        i += 1;
    }

    let input = match input {
        Some(input) => input,
        None => {
            print_usage();
            process::exit(1);
        }
    };

    let source = match fs::read_to_string(&input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", input, err);
            process::exit(1);
        }
    };

    if !name_given {
        options.package_name = Path::new(&input)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("main")
            .to_string();
    }

    compile(options, PathBuf::from(input), source);
}

fn fail_usage(message: &str) -> ! {
    eprintln!("error: {}", message);
    eprintln!();
    print_usage();
    process::exit(1);
}

fn compile(options: Options, input_path: PathBuf, source: String) {
    let mut ctx = Context::new(options);
    let search_dir = input_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut loader = FileLoader::new(search_dir, ctx.options.no_std);

    let file = ctx
        .sources
        .add_file(input_path.display().to_string(), source.clone());

    if ctx.options.debug_enabled(DebugCategory::Tokens) {
        match Lexer::tokenize(file, &source) {
            Ok(tokens) => {
                for tok in &tokens {
                    println!("{:>5}..{:<5} {}", tok.span.start, tok.span.end, tok.token);
                }
            }
            Err(err) => eprintln!("lex error: {}", err),
        }
    }

    let mut items = match Parser::parse(file, &source) {
        Ok(items) => items,
        Err(err) => {
            ctx.sink.emit(err.message, err.span);
            eprint!("{}", ctx.sink.report(&ctx.sources));
            process::exit(1);
        }
    };
    expand_file_mods(&mut ctx, &mut loader, &mut items, &input_path);

    let pkg_id = ctx.fresh_pkg_id();
    let span = Span::new(file, 0, source.len());
    let name = ctx.options.package_name.clone();
    let built = build_package(pkg_id, &name, input_path, span, items);
    if ctx.options.debug_enabled(DebugCategory::Ast) {
        print!("{}", pretty::print_package(&built));
    }

    let resolved = resolve_package(&mut ctx, &mut loader, built);
    if ctx.options.debug_enabled(DebugCategory::Resolved) {
        print!("{}", pretty::print_package(&resolved));
    }

    let typed = typecheck_package(&mut ctx, resolved);
    if ctx.options.debug_enabled(DebugCategory::Typecked) {
        print_item_types(&typed);
    }

    if ctx.sink.has_errors() {
        eprint!("{}", ctx.sink.report(&ctx.sources));
        process::exit(1);
    }

    if ctx.options.no_output && !ctx.options.debug_enabled(DebugCategory::Wat) {
        return;
    }

    let wat = match generate(&ctx, &typed) {
        Ok(wat) => wat,
        Err(err) => {
            eprintln!("codegen error: {}", err);
            process::exit(1);
        }
    };
    if ctx.options.debug_enabled(DebugCategory::Wat) {
        print!("{}", wat);
    }
    if ctx.options.no_output {
        return;
    }

    let out_path = ctx.options.output.clone();
    if let Err(err) = fs::write(&out_path, &wat) {
        eprintln!("Error writing '{}': {}", out_path.display(), err);
        process::exit(1);
    }

    if ctx.options.debug_enabled(DebugCategory::WasmValidate) {
        match Command::new("wasm-tools")
            .arg("validate")
            .arg(&out_path)
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => {
                eprintln!("wasm-tools validate failed with exit code: {:?}", status.code());
                process::exit(1);
            }
            Err(err) => {
                eprintln!("Failed to run wasm-tools: {}", err);
                process::exit(1);
            }
        }
    }
}

/// `--debug typecked`: every item's resolved type signature, in id order
fn print_item_types(pkg: &Package<Typecked>) {
    let mut ids: Vec<_> = pkg.tables.item_tys.keys().copied().collect();
    ids.sort();
    for id in ids {
        let Some(item) = pkg.find_item(id) else { continue };
        if matches!(item.kind, ItemKind::Mod(_)) {
            continue;
        }
        if let Some(ty) = pkg.tables.item_tys.get(&id) {
            println!("{}: {}", item.def_path, ty);
        }
    }
}
