//! # zapview CLI
//!
//! Command-line interface for the zapview library.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::process;
use std::time::{Duration, Instant};

use clap::Parser as ClapParser;

use zapview::archive::{ChatArchive, parse_archive};
use zapview::cli::Args;
use zapview::message::ChatMessage;
use zapview::parser::parse_chat;
use zapview::progress::no_progress;
use zapview::search::{SearchEvent, SearchWorker};
use zapview::stats::ChatStats;
use zapview::{ParsedChat, ZapviewError};

fn main() {
    if let Err(e) = run() {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), ZapviewError> {
    let total_start = Instant::now();
    let args = <Args as ClapParser>::parse();

    if args.verbose {
        init_logging();
    }

    println!("💬 zapview v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Input:   {}", args.input);
    println!();

    let path = Path::new(&args.input);
    let parse_start = Instant::now();
    let (chat, archive) = open_export(path)?;
    let parse_time = parse_start.elapsed();

    println!("📖 {}", chat.title);
    println!(
        "   {} messages, {} with media ({:.2}s)",
        chat.message_count,
        chat.media_count,
        parse_time.as_secs_f64()
    );
    println!("   Participants: {}", chat.participants.join(", "));
    if let (Some(start), Some(end)) = (chat.start_date, chat.end_date) {
        println!(
            "   Span: {} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
    }

    if args.stats {
        print_stats(&chat);
    }

    if let Some(archive) = &archive {
        if args.contacts {
            print_contacts(archive);
        }
        if args.media {
            print_media(archive);
        }
    } else if args.contacts || args.media {
        println!();
        println!("ℹ️  Contacts and media require a .zip export");
    }

    if let Some(query) = &args.search {
        run_search(&chat, query, args.limit)?;
    }

    println!();
    println!("✅ Done in {:.2}s", total_start.elapsed().as_secs_f64());

    Ok(())
}

/// Opens either a ZIP export or a bare transcript. Only ZIPs carry media
/// and contacts, so the archive half is optional.
fn open_export(path: &Path) -> Result<(ParsedChat, Option<ChatArchive>), ZapviewError> {
    let is_transcript = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

    if is_transcript {
        println!("⏳ Parsing transcript...");
        let content = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .map_or_else(|| "chat.txt".to_string(), |n| n.to_string_lossy().into_owned());
        return Ok((parse_chat(&content, &filename), None));
    }

    println!("⏳ Parsing archive...");
    let file = File::open(path)?;
    let source_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let archive = parse_archive(file, source_name.as_deref(), &no_progress())?;
    Ok((archive.chat.clone(), Some(archive)))
}

fn print_stats(chat: &ParsedChat) {
    let stats = ChatStats::compute(chat);

    println!();
    println!("📊 Statistics:");
    println!(
        "   Most active: {} ({} messages)",
        stats.most_active_participant,
        stats
            .messages_by_participant
            .get(&stats.most_active_participant)
            .copied()
            .unwrap_or(0)
    );
    println!("   Busiest hour: {:02}:00", stats.most_active_hour);
    println!(
        "   {} active days, ~{} messages/day",
        stats.total_days, stats.avg_messages_per_day
    );

    let mut by_count: Vec<_> = stats.messages_by_participant.iter().collect();
    by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in by_count {
        println!("   {:>6}  {}", count, name);
    }
}

fn print_contacts(archive: &ChatArchive) {
    println!();
    if archive.contacts.is_empty() {
        println!("👤 No contact cards in this export");
        return;
    }
    println!("👤 Contacts ({}):", archive.contacts.len());
    let mut contacts: Vec<_> = archive.contacts.values().collect();
    contacts.sort_by(|a, b| a.name.cmp(&b.name));
    for contact in contacts {
        match &contact.phone_number {
            Some(phone) => println!("   {} ({})", contact.name, phone),
            None => println!("   {}", contact.name),
        }
    }
}

fn print_media(archive: &ChatArchive) {
    println!();
    if archive.media_files.is_empty() {
        println!("🖼️  No media files in this export");
        return;
    }
    println!("🖼️  Media ({} files):", archive.media_files.len());
    for media in &archive.media_files {
        let linked = if media.message_id.is_some() { "" } else { "  (unlinked)" };
        println!("   {:>9}  {}  {}{}", media.size, media.kind, media.name, linked);
    }
}

/// Runs a one-shot search to completion on the worker thread.
fn run_search(chat: &ParsedChat, query: &str, limit: usize) -> Result<(), ZapviewError> {
    println!();
    println!("🔍 Searching for \"{}\"...", query);

    let corpus: Vec<_> = chat.messages.iter().map(Into::into).collect();
    let worker = SearchWorker::spawn();
    worker.load(corpus)?;
    worker.wait_ready()?;
    worker.search(1, query, HashMap::new())?;

    let results = loop {
        match worker.recv_event_timeout(Duration::from_secs(30)) {
            Some(SearchEvent::Complete(results)) => break results,
            Some(_) => continue,
            None => {
                return Err(ZapviewError::WorkerTimeout { seconds: 30 });
            }
        }
    };

    println!("   {} matches", results.total_matches);

    let by_id: HashMap<&str, &ChatMessage> =
        chat.messages.iter().map(|m| (m.id.as_str(), m)).collect();
    for id in results.matching_ids.iter().take(limit) {
        if let Some(msg) = by_id.get(id.as_str()) {
            println!(
                "   [{}] {}: {}",
                msg.timestamp.format("%Y-%m-%d %H:%M"),
                msg.sender,
                msg.content
            );
        }
    }
    if results.total_matches > limit {
        println!("   ... and {} more", results.total_matches - limit);
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zapview=debug")),
        )
        .init();
}
