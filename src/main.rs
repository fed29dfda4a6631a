//! `pdf-inspect` - a thin CLI over the core parser, shipped as an inspector
//! binary alongside the library. Strictly outer-layer: nothing here is part
//! of the core's public contract.

use pdf_core::{Dictionary, Document, Name, Numeric, Object, OpenOptions, XRefEntry};
use std::env;
use std::fs;
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(subcommand) = args.get(1) else {
        print_usage(&args[0]);
        process::exit(1);
    };

    let result = match subcommand.as_str() {
        "info" => run_info(&args[2..]),
        "dump" => run_dump(&args[2..]),
        "pages" => run_pages(&args[2..]),
        "xref" => run_xref(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage(&args[0]);
            return;
        }
        other => {
            eprintln!("Unknown subcommand: {other}");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(message) = result {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("pdf-inspect - parser and random-access reader for PDF object graphs");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {program} info <path>                    version, object/page counts, trailer summary");
    eprintln!("  {program} dump <path> <obj_no> [gen_no]   pretty-print a single resolved object");
    eprintln!("  {program} pages <path>                    list every page dictionary's direct entries");
    eprintln!("  {program} xref <path>                     print the increment chain and entry breakdown");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for construction-pipeline logging.");
}

fn open_document(path: &str) -> Result<Document, String> {
    let bytes = fs::read(path).map_err(|e| format!("Error reading {path}: {e}"))?;
    Document::open_with_options(bytes, OpenOptions::default())
        .map_err(|e| format!("Error parsing {path}: {e}"))
}

fn run_info(args: &[String]) -> Result<(), String> {
    let path = args.first().ok_or("usage: pdf-inspect info <path>")?;
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let doc = open_document(path)?;

    let (major, minor) = doc.version();
    println!("File: {path}");
    println!("PDF Version: {major}.{minor}");
    println!("File Size: {}", format_size(file_size));
    println!("Increments: {}", doc.increments().len());
    println!("Objects materialized: {}", doc.object_count());

    let (mut in_use, mut free, mut compressed) = (0, 0, 0);
    for inc in doc.increments() {
        let (u, f, c) = inc.entry_counts();
        in_use += u;
        free += f;
        compressed += c;
    }
    println!("XRef entries: {in_use} in-use, {free} free, {compressed} compressed");

    match doc.get_all_page_dicts(-1) {
        Ok(pages) => println!("Page Count: {}", pages.len()),
        Err(e) => println!("Page Count: unavailable ({e})"),
    }

    println!("\nTrailer:");
    match doc.get_trailer(-1) {
        Ok(trailer) => print_object(&Object::Dictionary(trailer), 1),
        Err(e) => println!("  Error retrieving trailer: {e}"),
    }

    Ok(())
}

fn run_dump(args: &[String]) -> Result<(), String> {
    let path = args.first().ok_or("usage: pdf-inspect dump <path> <obj_no> [gen_no]")?;
    let obj_no: u32 = args
        .get(1)
        .ok_or("usage: pdf-inspect dump <path> <obj_no> [gen_no]")?
        .parse()
        .map_err(|_| "obj_no must be a non-negative integer".to_string())?;
    let gen_no: u16 = match args.get(2) {
        Some(s) => s.parse().map_err(|_| "gen_no must be a non-negative integer".to_string())?,
        None => 0,
    };

    let doc = open_document(path)?;
    match doc.get_obj(obj_no, gen_no) {
        Ok(obj) => {
            print_object(&obj, 0);
            Ok(())
        }
        Err(e) => Err(format!("Error fetching object {obj_no} {gen_no}: {e}")),
    }
}

fn run_pages(args: &[String]) -> Result<(), String> {
    let path = args.first().ok_or("usage: pdf-inspect pages <path>")?;
    let doc = open_document(path)?;
    let pages = doc
        .get_all_page_dicts(-1)
        .map_err(|e| format!("Error retrieving page tree: {e}"))?;

    for (i, page) in pages.iter().enumerate() {
        println!("--- page {i} ---");
        print_object(&Object::Dictionary(page.clone()), 0);
    }
    println!("{} page(s)", pages.len());
    Ok(())
}

fn run_xref(args: &[String]) -> Result<(), String> {
    let path = args.first().ok_or("usage: pdf-inspect xref <path>")?;
    let doc = open_document(path)?;

    println!(
        "{:<8} {:<8} {:<12} {:<14} {:<8}",
        "Inc.", "Object", "Type", "Offset/Ref", "Gen"
    );
    println!("{}", "─".repeat(60));
    for (inc_idx, inc) in doc.increments().iter().enumerate() {
        for sub in &inc.xref.subsections {
            for (i, entry) in sub.entries.iter().enumerate() {
                let obj_no = sub.first_obj_no + i as u32;
                match entry {
                    XRefEntry::Free { next_free_obj_no, gen_no } => println!(
                        "{:<8} {:<8} {:<12} {:<14} {:<8}",
                        inc_idx, obj_no, "free", next_free_obj_no, gen_no
                    ),
                    XRefEntry::InUse { offset, gen_no } => println!(
                        "{:<8} {:<8} {:<12} {:<14} {:<8}",
                        inc_idx, obj_no, "in-use", offset, gen_no
                    ),
                    XRefEntry::Compressed { container_obj_no, index } => println!(
                        "{:<8} {:<8} {:<12} {:<14} {:<8}",
                        inc_idx,
                        obj_no,
                        "compressed",
                        format!("{container_obj_no}[{index}]"),
                        0
                    ),
                }
            }
        }
        let (in_use, free, compressed) = inc.entry_counts();
        println!("  (increment {inc_idx}: {in_use} in-use, {free} free, {compressed} compressed, startxref={})", inc.startxref);
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    let size = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", size / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", size / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", size / (1024.0 * 1024.0 * 1024.0))
    }
}

fn print_object(obj: &Object, indent: usize) {
    let pad = "  ".repeat(indent);
    match obj {
        Object::Null => println!("{pad}null"),
        Object::Boolean(b) => println!("{pad}{b}"),
        Object::Numeric(Numeric::Integer(n)) => println!("{pad}{n}"),
        Object::Numeric(Numeric::Real(r)) => println!("{pad}{r}"),
        Object::LiteralString(s) => println!("{pad}({})", truncated_display(s)),
        Object::HexString(s) => println!("{pad}<{}>", truncated_hex(s)),
        Object::Name(n) => println!("{pad}/{}", n.as_str()),
        Object::Reference { obj_no, gen_no } => println!("{pad}{obj_no} {gen_no} R"),
        Object::Array(items) => {
            if items.is_empty() {
                println!("{pad}[]");
            } else {
                println!("{pad}[");
                for item in items {
                    print_object(item, indent + 1);
                }
                println!("{pad}]");
            }
        }
        Object::Dictionary(dict) => print_dict(dict, indent),
        Object::Stream(dict, payload, _) => {
            println!("{pad}stream ({} bytes)", payload.len());
            print_dict(dict, indent);
        }
        Object::Indirect { obj_no, gen_no, inner } => {
            println!("{pad}{obj_no} {gen_no} obj");
            print_object(inner, indent);
        }
    }
}

fn print_dict(dict: &Dictionary, indent: usize) {
    let pad = "  ".repeat(indent);
    if dict.is_empty() {
        println!("{pad}<< >>");
        return;
    }
    println!("{pad}<<");
    let mut entries: Vec<(&Name, &Object)> = dict.entries().collect();
    entries.sort_by(|a, b| a.0.expanded_bytes().cmp(b.0.expanded_bytes()));
    for (key, value) in entries {
        print!("{}/{}:", "  ".repeat(indent + 1), key.as_str());
        match value {
            Object::Dictionary(_) | Object::Array(_) | Object::Stream(..) => {
                println!();
                print_object(value, indent + 2);
            }
            _ => {
                print!(" ");
                print_object_inline(value);
            }
        }
    }
    println!("{pad}>>");
}

fn print_object_inline(obj: &Object) {
    match obj {
        Object::Null => println!("null"),
        Object::Boolean(b) => println!("{b}"),
        Object::Numeric(Numeric::Integer(n)) => println!("{n}"),
        Object::Numeric(Numeric::Real(r)) => println!("{r}"),
        Object::LiteralString(s) => println!("({})", truncated_display(s)),
        Object::HexString(s) => println!("<{}>", truncated_hex(s)),
        Object::Name(n) => println!("/{}", n.as_str()),
        Object::Reference { obj_no, gen_no } => println!("{obj_no} {gen_no} R"),
        Object::Array(_) => println!("[...]"),
        Object::Dictionary(_) => println!("<< ... >>"),
        Object::Stream(_, payload, _) => println!("stream ({} bytes)", payload.len()),
        Object::Indirect { obj_no, gen_no, .. } => println!("{obj_no} {gen_no} obj"),
    }
}

fn truncated_display(bytes: &[u8]) -> String {
    let display = String::from_utf8_lossy(bytes);
    if display.len() > 100 {
        let cut = (0..=100).rfind(|&i| display.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &display[..cut])
    } else {
        display.into_owned()
    }
}

fn truncated_hex(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    if hex.len() > 100 {
        format!("{}...", &hex[..100])
    } else {
        hex
    }
}
