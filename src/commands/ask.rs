use anyhow::Result;
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;

use crate::config::{BackendKind, Config};
use crate::rag::build_orchestrator;

/// Answer `question` end to end and print the reply, optionally revealing it
/// word by word.
pub async fn run(config: Config, question: &str, reveal_ms: u64) -> Result<()> {
    let engine = if config.rag.backends.contains(&BackendKind::Local) {
        Some(super::build_engine(&config).await?)
    } else {
        None
    };
    let orchestrator = build_orchestrator(&config, engine)?;

    let answer = orchestrator.answer(question, &[]).await?;

    if reveal_ms == 0 {
        println!("{}", answer.answer);
    } else {
        let mut stream = Box::pin(answer.typewriter().into_stream(Duration::from_millis(reveal_ms)));
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            print!("{}", chunk);
            stdout.flush()?;
        }
        println!();
    }

    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  - [{}] {} ({:.3}, {})", source.label, source.id, source.score, source.search_type);
        }
    }
    eprintln!(
        "\n{} via {} in {} ms",
        answer.outcome.as_str(),
        answer.backend.as_deref().unwrap_or("no backend"),
        answer.processing_time_ms
    );

    Ok(())
}
