//! Command implementations for the Satchel CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::{ErrorKind, Result, SatchelError};
use crate::index::Index;

/// Execute a CLI command.
pub fn execute_command(args: SatchelArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => IndexConfig::from_json_file(path)?,
        None => IndexConfig::default(),
    };

    match &args.command {
        Command::Index(index_args) => index_documents(index_args, config, &args),
        Command::Search(search_args) => search_index(search_args, config, &args),
        Command::Get(get_args) => get_document(get_args, config, &args),
        Command::Stats(path_args) => show_stats(path_args, config, &args),
        Command::Check(path_args) => check_index(path_args, config, &args),
        Command::Merge(path_args) => merge_index(path_args, config, &args),
    }
}

fn open(path: &Path, config: IndexConfig) -> Result<Index> {
    Index::open_or_create_with_config(path, config)
}

/// Bulk-load a JSON Lines file.
///
/// Lines that fail to parse or validate are logged and skipped; a batch is
/// committed every `batch_size` documents and at the end.
fn index_documents(args: &IndexArgs, config: IndexConfig, cli_args: &SatchelArgs) -> Result<()> {
    let index = open(&args.index_path, config)?;
    let started = Instant::now();
    let reader = BufReader::new(File::open(&args.document_file)?);

    let mut added = 0u64;
    let mut rejected = 0u64;
    let mut commits = 0u64;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let doc: Document = match serde_json::from_str(&line) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(line = line_number + 1, error = %e, "skipping unparsable document");
                rejected += 1;
                continue;
            }
        };

        match add_with_flush(&index, doc, &mut commits) {
            Ok(()) => added += 1,
            Err(e) if e.kind() == ErrorKind::InvalidDocument => {
                warn!(line = line_number + 1, error = %e, "skipping invalid document");
                rejected += 1;
                continue;
            }
            Err(e) => return Err(e),
        }

        if index.pending_docs() as u64 >= args.batch_size {
            index.commit()?;
            commits += 1;
            info!(added, "committed batch");
        }
    }

    if index.pending_docs() > 0 {
        index.commit()?;
        commits += 1;
    }

    let stats = index.stats();
    let elapsed = started.elapsed();
    let report = IndexingReport {
        documents_added: added,
        documents_rejected: rejected,
        commits,
        total_docs: stats.doc_count,
        generation: stats.generation,
        duration_ms: elapsed.as_millis() as u64,
        docs_per_second: if elapsed.as_secs_f64() > 0.0 {
            added as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        },
    };

    index.close()?;
    output_result(&report, cli_args)
}

/// Add a document, committing once and retrying if the staging buffer is full.
fn add_with_flush(index: &Index, doc: Document, commits: &mut u64) -> Result<()> {
    match index.add(doc.clone()) {
        Err(e) if e.kind() == ErrorKind::OutOfMemory && index.pending_docs() > 0 => {
            index.commit()?;
            *commits += 1;
            index.add(doc)
        }
        result => result,
    }
}

fn search_index(args: &SearchArgs, config: IndexConfig, cli_args: &SatchelArgs) -> Result<()> {
    let index = open(&args.index_path, config)?;
    let started = Instant::now();
    let results = index.searcher().search(&args.query, args.limit, args.offset)?;

    let report = SearchReport {
        query: args.query.clone(),
        results,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    output_result(&report, cli_args)
}

fn get_document(args: &GetArgs, config: IndexConfig, cli_args: &SatchelArgs) -> Result<()> {
    let index = open(&args.index_path, config)?;
    let doc = index
        .searcher()
        .get_document(&args.id)?
        .ok_or_else(|| SatchelError::invalid_document(format!("no document with id '{}'", args.id)))?;
    output_result(&doc, cli_args)
}

fn show_stats(args: &IndexPathArgs, config: IndexConfig, cli_args: &SatchelArgs) -> Result<()> {
    let index = open(&args.index_path, config)?;
    output_result(&index.stats(), cli_args)
}

/// Opening validates every segment checksum, so a successful open plus the
/// cheap health check covers the whole index.
fn check_index(args: &IndexPathArgs, config: IndexConfig, cli_args: &SatchelArgs) -> Result<()> {
    if !args.index_path.is_dir() {
        return Err(SatchelError::invalid_path(format!(
            "{} is not an index directory",
            args.index_path.display()
        )));
    }

    let index = open(&args.index_path, config)?;
    let stats = index.stats();
    let report = CheckReport {
        healthy: index.is_healthy(),
        generation: stats.generation,
        segments: stats.segment_count,
        documents: stats.doc_count,
    };
    output_result(&report, cli_args)?;

    if report.healthy {
        Ok(())
    } else {
        Err(SatchelError::corrupt("index failed the health check"))
    }
}

fn merge_index(args: &IndexPathArgs, config: IndexConfig, cli_args: &SatchelArgs) -> Result<()> {
    let index = open(&args.index_path, config)?;
    let stats = index.merge_segments()?;
    output_result(&stats, cli_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn run(argv: &[&str]) -> Result<()> {
        execute_command(SatchelArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_index_search_merge() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("idx");
        let index_str = index_path.to_str().unwrap();

        let mut docs = NamedTempFile::new().unwrap();
        writeln!(docs, r#"{{"id":"1","content":"water purification tablets"}}"#).unwrap();
        writeln!(docs).unwrap();
        writeln!(docs, "not json").unwrap();
        writeln!(docs, r#"{{"id":"","content":"empty id"}}"#).unwrap();
        writeln!(docs, r#"{{"id":"2","content":"water filter pump","priority":2}}"#).unwrap();
        docs.flush().unwrap();
        let docs_str = docs.path().to_str().unwrap();

        run(&["satchel", "-q", "index", index_str, docs_str, "--batch-size", "1"]).unwrap();
        run(&["satchel", "-q", "--format", "json", "search", index_str, "water"]).unwrap();
        run(&["satchel", "-q", "get", index_str, "2"]).unwrap();
        run(&["satchel", "-q", "check", index_str]).unwrap();
        run(&["satchel", "-q", "merge", index_str]).unwrap();

        let index = Index::open_or_create(&index_path).unwrap();
        let stats = index.stats();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.segment_count, 1);
    }

    #[test]
    fn test_errors_surface() {
        let dir = TempDir::new().unwrap();
        let index_str = dir.path().to_str().unwrap();

        let err = run(&["satchel", "-q", "search", index_str, "water AND"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryParse);

        let err = run(&["satchel", "-q", "get", index_str, "missing"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDocument);

        let missing = dir.path().join("nope");
        let err = run(&["satchel", "-q", "check", missing.to_str().unwrap()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }
}
