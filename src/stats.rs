//! Registry statistics and sync-health overview.
//!
//! A quick summary of what's been ingested: document counts by status,
//! type, and partition, plus per-partition cursor state. Used by
//! `twindex stats` to confirm syncs and extractions are keeping up.

use anyhow::Result;

use crate::cursor::CursorStore;
use crate::registry::Registry;

/// Run the stats command: query the registry and print a summary.
pub async fn run_stats(registry: &Registry, cursors: &CursorStore) -> Result<()> {
    let stats = registry.stats().await?;

    println!("twindex — Registry Stats");
    println!("========================");
    println!();
    println!("  Documents:   {}", stats.total);

    let print_group = |title: &str, entries: &[(String, i64)]| {
        if entries.is_empty() {
            return;
        }
        println!();
        println!("  By {}:", title);
        for (key, count) in entries {
            println!("    {:<28} {:>6}", key, count);
        }
    };
    print_group("status", &stats.by_status);
    print_group("type", &stats.by_type);
    print_group("partition", &stats.by_partition);

    let cursors = cursors.all().await?;
    if !cursors.is_empty() {
        println!();
        println!("  Sync cursors:");
        println!(
            "    {:<24} {:>6} {:>8} {:>8} {:>8}   {}",
            "PARTITION", "SYNCS", "SEEN", "CREATED", "DELETED", "LAST SYNC"
        );
        for cursor in &cursors {
            let last = match cursor.last_sync_at {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "    {:<24} {:>6} {:>8} {:>8} {:>8}   {}",
                cursor.partition_id,
                cursor.sync_count,
                cursor.items_seen,
                cursor.created,
                cursor.deleted,
                last
            );
        }
    }

    println!();
    Ok(())
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
