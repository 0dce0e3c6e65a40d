use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::{env, fs, process};
use textmarker_config::Config;
use textmarker_engine::dom::markup;
use textmarker_engine::dom::range::find_text;
use textmarker_engine::{
    Cmd, ExportFormat, HighlightId, JsonFileStorage, Reply, Session,
};

fn usage(program: &str) {
    eprintln!("Usage: {program} <document> <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  highlight <text> [color]   highlight the first occurrence of <text>");
    eprintln!("  list                       list stored highlights");
    eprintln!("  remove <id>                remove one highlight");
    eprintln!("  clear [--yes]              remove every highlight for the document");
    eprintln!("  export <md|json> [path]    write the highlight list to a file");
    eprintln!("  render                     print the document with highlights applied");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
        process::exit(1);
    }

    let document_path = PathBuf::from(&args[1]);
    let command = args[2].as_str();

    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let markup_source = fs::read_to_string(&document_path)
        .with_context(|| format!("failed to read document {}", document_path.display()))?;
    let mut tree = markup::parse(&markup_source);

    let document_id = document_url(&document_path);
    let storage = JsonFileStorage::new(&config.storage_path);
    let mut session = Session::new(document_id, config.default_color, storage);

    // Page-load flow: replay whatever is already stored before acting.
    let report = session.restore(&mut tree).await?;
    if report.lost > 0 {
        eprintln!(
            "warning: {} highlight(s) no longer match the document structure and were skipped",
            report.lost
        );
    }

    match command {
        "highlight" => {
            let Some(needle) = args.get(3) else {
                usage(&args[0]);
                process::exit(1);
            };
            if let Some(color) = args.get(4) {
                session
                    .dispatch(
                        &mut tree,
                        Cmd::SetColor {
                            color: color.clone(),
                        },
                    )
                    .await?;
            }
            let Some(range) = find_text(&tree, needle) else {
                bail!("text {needle:?} not found in {}", document_path.display());
            };
            let reply = session.dispatch(&mut tree, Cmd::Select { range }).await?;
            if let Reply::Created(highlight) = reply {
                println!(
                    "Highlighted {:?} with {} (id {})",
                    highlight.text, highlight.color, highlight.id
                );
            }
        }
        "list" => {
            let reply = session.dispatch(&mut tree, Cmd::GetHighlights).await?;
            if let Reply::Highlights { highlights, .. } = reply {
                if highlights.is_empty() {
                    println!("No highlights for {}", session.document_id());
                    return Ok(());
                }
                for highlight in highlights {
                    println!(
                        "{}  {}  {:?}",
                        highlight.id, highlight.color, highlight.text
                    );
                }
            }
        }
        "remove" => {
            let Some(raw_id) = args.get(3) else {
                usage(&args[0]);
                process::exit(1);
            };
            let id: HighlightId = raw_id
                .parse()
                .with_context(|| format!("invalid highlight id {raw_id:?}"))?;
            let reply = session.dispatch(&mut tree, Cmd::RemoveById { id }).await?;
            match reply {
                Reply::Removed { existed: true } => println!("Removed highlight {id}"),
                _ => println!("No highlight with id {id}"),
            }
        }
        "clear" => {
            let skip_confirm = args.iter().any(|arg| arg == "--yes");
            if !skip_confirm && !confirm_clear(session.document_id())? {
                println!("Aborted");
                return Ok(());
            }
            session.dispatch(&mut tree, Cmd::ClearAll).await?;
            println!("All highlights cleared for {}", session.document_id());
        }
        "export" => {
            let Some(format_arg) = args.get(3) else {
                usage(&args[0]);
                process::exit(1);
            };
            let (format, default_name) = match format_arg.as_str() {
                "md" | "markdown" => (ExportFormat::Markdown, "highlights.md"),
                "json" => (ExportFormat::Json, "highlights.json"),
                other => bail!("unknown export format {other:?}, expected md or json"),
            };
            let output = args
                .get(4)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default_name));
            match session.export(format).await? {
                Some(content) => {
                    fs::write(&output, content)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    println!("Exported to {}", output.display());
                }
                None => println!("No highlights to export"),
            }
        }
        "render" => {
            println!("{}", tree.serialize_children(tree.root()));
        }
        _ => {
            usage(&args[0]);
            process::exit(1);
        }
    }

    Ok(())
}

/// Opaque document identifier: the canonical path as a file URL, so the same
/// file addressed through different relative paths shares one highlight set.
fn document_url(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", canonical.display())
}

fn confirm_clear(document_id: &str) -> Result<bool> {
    print!("Clear all highlights for {document_id}? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
