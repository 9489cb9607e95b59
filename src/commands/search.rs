use anyhow::Result;

use super::build_engine;
use crate::config::{Config, SearchMode};
use crate::search::SearchResult;

/// One-shot search against a freshly built local engine.
pub async fn run(config: Config, query: &str, top_k: Option<usize>, mode: Option<SearchMode>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.search.default_top_k);
    let mode = mode.unwrap_or(config.search.default_mode);

    let engine = build_engine(&config).await?;
    let response = engine.search(query, top_k, mode).await?;

    if response.results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!(
        "Found {} results for \"{}\" ({} search, {} ms)\n",
        response.results.len(),
        query,
        mode,
        response.processing_time_ms
    );

    for (i, result) in response.results.iter().enumerate() {
        println!("{}. {}", i + 1, describe(result));
        println!("{}", format_preview(&result.document.content, 4));
        println!();
    }

    Ok(())
}

fn describe(result: &SearchResult) -> String {
    let mut line = format!(
        "[{}] {} (score: {:.3}, {}",
        result.document.label(),
        result.document.metadata.source,
        result.score,
        result.search_type
    );
    if let (Some(v), Some(k)) = (result.vector_score, result.bm25_score) {
        line.push_str(&format!(", vector {:.3}, bm25 {:.3}", v, k));
    }
    line.push(')');
    line
}

/// First `max_lines` lines of `content`, indented.
fn format_preview(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.trim().lines().collect();
    let mut preview: Vec<String> = lines.iter().take(max_lines).map(|l| format!("   {}", l)).collect();
    if lines.len() > max_lines {
        preview.push("   ...".to_string());
    }
    preview.join("\n")
}
