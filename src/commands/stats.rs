//! Stats command: knowledge-base statistics and metrics.

use anyhow::Result;
use serde_json::Value;

use crate::config::{BackendKind, Config};
use crate::metrics::{gather_metrics, MetricSnapshot};
use crate::rag::build_orchestrator;

pub async fn run(config: Config, prometheus: bool) -> Result<()> {
    let engine = if config.rag.backends.contains(&BackendKind::Local) {
        Some(super::build_engine(&config).await?)
    } else {
        None
    };

    if prometheus {
        print!("{}", gather_metrics());
        return Ok(());
    }

    let orchestrator = build_orchestrator(&config, engine)?;
    let stats = orchestrator.stats().await?;
    let snapshot = MetricSnapshot::capture();

    println!("Knowledge Base Statistics");
    println!("=========================\n");
    print_stats(&stats);
    println!();

    println!("Search Metrics:");
    println!("  Searches:         {:.0}", snapshot.searches);
    if snapshot.searches > 0.0 {
        println!("  Mean latency:     {:.3}s", snapshot.search_latency_mean);
    }
    println!("  Cache hits:       {:.0}", snapshot.cache_hits);
    println!("  Cache misses:     {:.0}", snapshot.cache_misses);
    println!("  Cache hit rate:   {:.1}%", snapshot.cache_hit_rate() * 100.0);
    println!();

    println!("Embedding Metrics:");
    println!("  Provider calls:   {:.0}", snapshot.embedding_calls);
    if snapshot.embedding_calls > 0.0 {
        println!("  Mean latency:     {:.3}s", snapshot.embedding_latency_mean);
    }

    Ok(())
}

/// Print whatever shape the backend returned, one field per line.
fn print_stats(stats: &Value) {
    match stats.as_object() {
        Some(fields) => {
            for (key, value) in fields {
                println!("  {:<24} {}", format!("{}:", key), render(value));
            }
        }
        None => println!("  {}", stats),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, render(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
