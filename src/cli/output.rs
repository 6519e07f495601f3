//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{OutputFormat, SatchelArgs};
use crate::document::Document;
use crate::error::{Result, SatchelError};
use crate::index::{IndexStats, MergeStats};
use crate::search::searcher::SearchResults;

/// Result of a bulk indexing run.
#[derive(Debug, Serialize)]
pub struct IndexingReport {
    pub documents_added: u64,
    pub documents_rejected: u64,
    pub commits: u64,
    pub total_docs: u64,
    pub generation: u64,
    pub duration_ms: u64,
    pub docs_per_second: f64,
}

/// Search results with timing.
#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub query: String,
    #[serde(flatten)]
    pub results: SearchResults,
    pub duration_ms: u64,
}

/// Result of an integrity check.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub healthy: bool,
    pub generation: u64,
    pub segments: usize,
    pub documents: u64,
}

/// Something the CLI can print for people.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Output a result in the selected format.
pub fn output_result<T: Serialize + HumanOutput>(result: &T, args: &SatchelArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result)
                .map_err(|e| SatchelError::unknown(format!("failed to serialize output: {e}")))?;
            println!("{json}");
            Ok(())
        }
    }
}

impl HumanOutput for IndexingReport {
    fn print_human(&self) {
        println!("Indexed {} documents in {} ms ({:.0} docs/s)", self.documents_added, self.duration_ms, self.docs_per_second);
        if self.documents_rejected > 0 {
            println!("Rejected: {}", self.documents_rejected);
        }
        println!("Commits: {}", self.commits);
        println!("Total documents: {} (generation {})", self.total_docs, self.generation);
    }
}

impl HumanOutput for SearchReport {
    fn print_human(&self) {
        let results = &self.results;
        println!(
            "{} hits for \"{}\" ({} ms)",
            results.total_hits, self.query, self.duration_ms
        );

        for (i, hit) in results.hits.iter().enumerate() {
            println!();
            println!("{}. {} [{}] (score {:.3})", i + 1, hit.title, hit.id, hit.score);
            if !hit.category.is_empty() || hit.priority > 0 {
                println!("   category: {}  priority: {}", hit.category, hit.priority);
            }
            if !hit.summary.is_empty() {
                println!("   {}", hit.summary);
            }
        }
    }
}

impl HumanOutput for Document {
    fn print_human(&self) {
        println!("id:       {}", self.id);
        println!("title:    {}", self.title);
        println!("category: {}", self.category);
        println!("priority: {}", self.priority);
        println!("summary:  {}", self.summary);
        println!();
        println!("{}", self.content);
    }
}

impl HumanOutput for IndexStats {
    fn print_human(&self) {
        println!("Index Statistics:");
        println!("  Documents:   {}", self.doc_count);
        println!("  Size:        {}", format_bytes(self.size_bytes));
        println!("  Segments:    {}", self.segment_count);
        println!("  Generation:  {}", self.generation);
        match self.last_commit {
            Some(time) => println!("  Last commit: {}", time.to_rfc3339()),
            None => println!("  Last commit: never"),
        }
    }
}

impl HumanOutput for CheckReport {
    fn print_human(&self) {
        let status = if self.healthy { "OK" } else { "UNHEALTHY" };
        println!(
            "{status}: generation {}, {} segments, {} documents",
            self.generation, self.segments, self.documents
        );
    }
}

impl HumanOutput for MergeStats {
    fn print_human(&self) {
        if self.segments_merged == 0 {
            println!("Nothing to merge (generation {})", self.generation);
        } else {
            println!(
                "Merged {} segments: kept {} documents, dropped {} (generation {})",
                self.segments_merged, self.docs_kept, self.docs_dropped, self.generation
            );
        }
    }
}

/// Format a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
