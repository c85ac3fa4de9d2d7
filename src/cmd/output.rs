use anyhow::Result;
use serde::Serialize;

use toonhop::{AnimePage, ResolutionOutcome};

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_page(page: &AnimePage, number: u32) {
    if page.entries.is_empty() {
        println!("No results on page {number}");
        return;
    }
    for entry in &page.entries {
        println!("{}", entry.title);
        println!("   {}", entry.url);
    }
    if page.has_next_page {
        println!("\n(more on page {})", number + 1);
    }
}

pub fn print_outcomes(outcomes: &[ResolutionOutcome]) {
    if outcomes.is_empty() {
        println!("no playable stream found");
        return;
    }
    for (i, outcome) in outcomes.iter().enumerate() {
        println!("{:>2}. {}", i + 1, outcome.quality_label);
        println!("    {}", outcome.stream_url);
        if !outcome.request_headers.is_empty() {
            println!("    {}", outcome.request_headers);
        }
    }
}
