//! CLI command implementations.
//!
//! Each `taxctx` subcommand maps to one `run_*` function here. Commands
//! build a [`DocumentManager`] over the configured cache, load the requested
//! source (restoring it from the cache when possible) and print to stdout.

use std::sync::Arc;

use anyhow::{bail, Result};

use taxlaw_context_core::models::{ElementKind, StructureNode};
use taxlaw_context_core::search::QueryOptions;

use crate::cache::{DocumentCache, SqliteCache};
use crate::config::Config;
use crate::manager::{DocumentManager, LoadOptions};
use crate::migrate;
use crate::source::Source;

const SNIPPET_CHARS: usize = 240;

/// Manager backed by the SQLite cache when `[cache].path` is set.
pub async fn open_manager(config: &Config) -> Result<DocumentManager> {
    let cache: Option<Arc<dyn DocumentCache>> = match &config.cache.path {
        Some(path) => Some(Arc::new(SqliteCache::open(path).await?)),
        None => None,
    };
    Ok(DocumentManager::new(config.clone(), cache))
}

pub async fn run_init(config: &Config) -> Result<()> {
    let Some(path) = &config.cache.path else {
        bail!("No cache database configured. Set [cache] path in the config file.");
    };
    migrate::run_migrations(path).await?;
    println!("Cache initialized at {}.", path.display());
    Ok(())
}

pub async fn run_ingest(config: &Config, source: &str, force: bool) -> Result<()> {
    let manager = open_manager(config).await?;
    let doc = manager
        .load(
            &Source::parse(source),
            LoadOptions {
                force_reingest: force,
            },
        )
        .await?;

    let headings = doc
        .elements
        .iter()
        .filter(|e| e.kind == ElementKind::Heading)
        .count();
    println!("Ingested {}", source);
    println!("  key:          {}", doc.source_id);
    println!("  ingestion:    {}", doc.ingestion_id);
    println!("  ingested_at:  {}", doc.ingested_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  pages:        {}", doc.pages.len());
    println!("  elements:     {} ({} headings)", doc.elements.len(), headings);
    println!("  chunks:       {}", doc.chunks.len());
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    source: &str,
    limit: Option<usize>,
    min_score: Option<f64>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    let mut opts = QueryOptions::from_config(&config.retrieval);
    if let Some(limit) = limit {
        opts.limit = limit;
    }
    if let Some(min_score) = min_score {
        if !(0.0..=1.0).contains(&min_score) {
            bail!("--min-score must be in [0.0, 1.0]");
        }
        opts.min_score = min_score;
    }

    let manager = open_manager(config).await?;
    let doc = manager.load(&Source::parse(source), LoadOptions::default()).await?;
    let response = manager.query(&doc.source_id, query, opts).await?;

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in response.results.iter().enumerate() {
        let chunk = &result.chunk;
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.score,
            result.relevance.as_str(),
            chunk.section_label()
        );
        println!("    pages: {}", chunk.page_range.label());
        println!("    excerpt: \"{}\"", snippet(&chunk.content));
        println!("    id: {}", chunk.id);
        println!();
    }
    tracing::debug!(strategy = ?response.strategy, "search complete");
    Ok(())
}

pub async fn run_context(
    config: &Config,
    query: &str,
    source: &str,
    max_tokens: Option<usize>,
) -> Result<()> {
    let manager = open_manager(config).await?;
    let doc = manager.load(&Source::parse(source), LoadOptions::default()).await?;
    let budget = max_tokens.unwrap_or(config.retrieval.max_context_tokens);
    let context = manager.context_for(&doc.source_id, query, budget).await?;
    println!("{}", context);
    Ok(())
}

pub async fn run_outline(config: &Config, source: &str) -> Result<()> {
    let manager = open_manager(config).await?;
    let doc = manager.load(&Source::parse(source), LoadOptions::default()).await?;
    let lines = outline_lines(&doc.outline);
    if lines.is_empty() {
        println!("No headings detected.");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// One indented line per heading, in document order.
fn outline_lines(roots: &[StructureNode]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&StructureNode, usize)> = roots.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        if node.kind != ElementKind::Heading {
            continue;
        }
        lines.push(format!(
            "{}{} ({})",
            "  ".repeat(depth),
            node.text.replace('\n', " "),
            node.page_range.label()
        ));
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    lines
}

fn snippet(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxlaw_context_core::models::{PageRange, BODY_LEVEL};

    fn node(id: &str, kind: ElementKind, text: &str, children: Vec<StructureNode>) -> StructureNode {
        StructureNode {
            id: id.to_string(),
            kind,
            level: if kind == ElementKind::Heading { 1 } else { BODY_LEVEL },
            text: text.to_string(),
            page_number: 1,
            page_range: PageRange { start: 1, end: 2 },
            children,
            parent_id: None,
            section_path: Vec::new(),
            numbering: None,
        }
    }

    #[test]
    fn test_outline_lines_skip_body() {
        let tree = vec![node(
            "node-0",
            ElementKind::Heading,
            "PART I",
            vec![
                node("node-1", ElementKind::Paragraph, "Body text.", Vec::new()),
                node("node-2", ElementKind::Heading, "1. Objective", Vec::new()),
            ],
        )];
        assert_eq!(
            outline_lines(&tree),
            vec!["PART I (Pages 1-2)", "  1. Objective (Pages 1-2)"]
        );
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("a\n  b\tc"), "a b c");
        let long = "word ".repeat(100);
        let s = snippet(&long);
        assert!(s.ends_with('…'));
        assert!(s.chars().count() <= SNIPPET_CHARS + 1);
    }

    #[tokio::test]
    async fn test_init_requires_cache_path() {
        let err = run_init(&Config::minimal()).await.unwrap_err();
        assert!(err.to_string().contains("No cache database configured"));
    }
}
