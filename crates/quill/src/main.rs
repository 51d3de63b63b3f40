use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use quill_pdf::object::{ObjId, ObjKind, ObjStore};
use quill_pdf::{load_document_from_file, ParseOptions, Warning};

#[derive(Parser)]
#[command(name = "quill", version, about = "Inspect PDF object structure and parse warnings")]
struct Args {
    /// PDF file to parse
    pdf: PathBuf,
    /// Dump the parsed object tree
    #[arg(long)]
    dump: bool,
    /// Maximum nesting depth for --dump
    #[arg(long, default_value_t = 4)]
    max_depth: usize,
    /// Warning listing: deduped with counts, or every occurrence
    #[arg(long, default_value = "dedup", value_parser = ["dedup", "full"])]
    warnings: String,
    /// List pages via the document structuralizer
    #[arg(long)]
    structure: bool,
    /// Machine-readable JSON summary on stdout
    #[arg(long)]
    json: bool,
    /// Stop parsing at the first warning
    #[arg(long)]
    abort_on_warning: bool,
    /// Structured tracing output on stderr
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }
    let options = ParseOptions {
        abort_on_warning: args.abort_on_warning,
        ..Default::default()
    };
    let doc = load_document_from_file(&args.pdf, &options)?;
    let structure = if args.structure || args.json {
        Some(quill_doc::build_structure(&doc))
    } else {
        None
    };

    if args.json {
        let structure = structure.expect("structure computed for json");
        let summary = serde_json::json!({
            "path": args.pdf.display().to_string(),
            "pdf_version": doc.store.pdf_version.as_deref(),
            "object_count": doc.store.len(),
            "indirect_count": doc.store.indirects.len(),
            "stream_count": doc.store.streams.len(),
            "revision_count": doc.store.tables().len(),
            "has_catalog": doc.store.catalog.is_some(),
            "warnings": &doc.parser_warnings,
            "structure": &structure.structure,
            "structuralizer_warnings": &structure.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "PDF version {}",
        doc.store.pdf_version.as_deref().unwrap_or("unknown")
    );
    println!(
        "{} objects, {} indirect, {} streams, {} revision(s)",
        doc.store.len(),
        doc.store.indirects.len(),
        doc.store.streams.len(),
        doc.store.tables().len()
    );
    if doc.store.catalog.is_none() {
        println!("no catalog resolved");
    }

    if args.dump {
        println!();
        dump_object(&doc.store, doc.store.root, 0, args.max_depth);
    }

    if let Some(structure) = &structure {
        println!();
        if let Some(v) = &structure.structure.version_override {
            println!("catalog version override: {v}");
        }
        println!("{} page(s)", structure.structure.pages.len());
        for page in &structure.structure.pages {
            let ident = page
                .ident
                .map(|(n, g)| format!("{n} {g}"))
                .unwrap_or_else(|| "-".into());
            let media = page
                .media_box
                .map(|m| format!("[{} {} {} {}]", m[0], m[1], m[2], m[3]))
                .unwrap_or_else(|| "-".into());
            println!(
                "  page {} obj({}) media {} rotate {} contents {}",
                page.number,
                ident,
                media,
                page.rotate.unwrap_or(0),
                if page.has_contents { "yes" } else { "no" }
            );
        }
        print_warnings("structuralizer", &structure.warnings, &args.warnings);
    }

    print_warnings("parser", &doc.parser_warnings, &args.warnings);
    Ok(())
}

fn print_warnings(origin: &str, warnings: &[Warning], mode: &str) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{} warning(s) from {origin}:", warnings.len());
    if mode == "full" {
        for w in warnings {
            let at = w
                .span
                .map(|s| format!(" @ {}..{}", s.start, s.end))
                .unwrap_or_default();
            println!("  {}{at}: {}", w.code, w.message);
            if let Some(cause) = &w.cause {
                println!("    cause: {cause}");
            }
        }
        return;
    }
    let mut by_code: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for w in warnings {
        let entry = by_code.entry(w.code.as_str()).or_insert((0, w.message.as_str()));
        entry.0 += 1;
    }
    for (code, (count, message)) in by_code {
        println!("  {count}x {code}: {message}");
    }
}

fn dump_object(store: &ObjStore, id: ObjId, depth: usize, max_depth: usize) {
    if depth > max_depth {
        return;
    }
    let indent = "  ".repeat(depth);
    let obj = store.get(id);
    let truncated = depth == max_depth;
    match &obj.kind {
        ObjKind::Null => println!("{indent}null"),
        ObjKind::Boolean(v) => println!("{indent}{v}"),
        ObjKind::Integer(v) => println!("{indent}{v}"),
        ObjKind::Real(v) => println!("{indent}{v}"),
        ObjKind::Name(n) => println!("{indent}/{n}"),
        ObjKind::Text { value, encoding, .. } => {
            println!("{indent}({}) [{}]", preview(value), encoding.tag())
        }
        ObjKind::Bytes(b) => println!("{indent}<{} bytes>", b.len()),
        ObjKind::Date(d) => println!("{indent}date {}", d.to_rfc3339()),
        ObjKind::Comment(c) => println!("{indent}% {}", preview(c)),
        ObjKind::Junk(j) => println!("{indent}junk {}", preview(j)),
        ObjKind::Op(op) => println!("{indent}op {op}"),
        ObjKind::Array(children) => {
            println!("{indent}array ({} items)", children.len());
            if !truncated {
                for c in children {
                    dump_object(store, *c, depth + 1, max_depth);
                }
            }
        }
        ObjKind::Content(children) => {
            println!("{indent}content ({} items)", children.len());
            if !truncated {
                for c in children {
                    dump_object(store, *c, depth + 1, max_depth);
                }
            }
        }
        ObjKind::Root(children) => {
            println!("{indent}document ({} revision(s))", children.len());
            if !truncated {
                for c in children {
                    dump_object(store, *c, depth + 1, max_depth);
                }
            }
        }
        ObjKind::Table(t) => {
            println!(
                "{indent}revision ({} objects{}{})",
                t.children.len(),
                if t.xref_table.is_some() || t.xref_obj.is_some() {
                    ", xref"
                } else {
                    ""
                },
                if t.trailer.is_some() { ", trailer" } else { "" },
            );
            if !truncated {
                for c in &t.children {
                    dump_object(store, *c, depth + 1, max_depth);
                }
            }
        }
        ObjKind::Indirect { ident, direct } => {
            println!("{indent}{} {} obj", ident.num, ident.gen);
            if !truncated {
                if let Some(d) = direct {
                    dump_object(store, *d, depth + 1, max_depth);
                }
            }
        }
        ObjKind::Ref { ident, indirect } => {
            println!(
                "{indent}{} {} R{}",
                ident.num,
                ident.gen,
                if indirect.is_some() { "" } else { " (unresolved)" }
            );
        }
        ObjKind::Dictionary(d) => {
            println!("{indent}dict ({} entries)", d.len());
            if !truncated {
                for (key, value) in &d.entries {
                    println!("{indent}  /{key} ->");
                    dump_object(store, *value, depth + 2, max_depth);
                }
            }
        }
        ObjKind::Stream(s) => {
            println!(
                "{indent}stream type={} body={}",
                s.stream_type.as_deref().unwrap_or("-"),
                s.source_location
                    .map(|l| format!("{}..{}", l.start, l.end))
                    .unwrap_or_else(|| "-".into()),
            );
            if !truncated {
                if let Some(d) = s.dictionary {
                    dump_object(store, d, depth + 1, max_depth);
                }
                if let Some(d) = s.direct {
                    dump_object(store, d, depth + 1, max_depth);
                }
            }
        }
        ObjKind::Xref(x) => {
            println!(
                "{indent}xref stream ({} entries, widths {:?})",
                x.entries.len(),
                x.widths
            );
        }
    }
}

fn preview(s: &str) -> String {
    let mut out = String::new();
    for ch in s.chars().take(48) {
        if ch.is_control() {
            out.push('.');
        } else {
            out.push(ch);
        }
    }
    if s.chars().count() > 48 {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn preview_masks_control_bytes_and_truncates() {
        assert_eq!(preview("ab\u{0002}c"), "ab.c");
        let long: String = std::iter::repeat('x').take(60).collect();
        let p = preview(&long);
        assert!(p.ends_with('…'));
        assert_eq!(p.chars().count(), 49);
    }
}
