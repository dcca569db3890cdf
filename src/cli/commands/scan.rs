//! Scan command implementation.
//!
//! Runs the scan worker on a background thread and answers its decision
//! requests from the terminal on the calling thread.

use crate::core::detection::{BatchContext, DetectionController, DetectionState};
use crate::core::rendezvous::{Choice, Decision, DecisionRequest, Rendezvous, RequestKind};
use crate::core::scanner::find_media_files;
use crate::core::worker::{ScanEvent, ScanOptions, ScanOutcome, ScanWorker};
use crate::models::config::TmdbSettings;
use crate::models::media::{MediaType, MetadataSource};
use crate::services::ffprobe::FfprobeExtractor;
use crate::services::id_mapping::{parse_tmdb_reference, JsonIdMapping};
use crate::services::tmdb::{TmdbClient, TmdbConfig};
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::{mpsc, Arc};

/// What the user typed at a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Hand this to the worker (`None` skips the batch).
    Supply(Option<Decision>),
    /// Cancel the whole scan.
    Quit,
}

/// Interpret one line of prompt input; `None` means the input was invalid.
pub fn parse_answer(request: &DecisionRequest, input: &str) -> Option<PromptAnswer> {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "" => return Some(PromptAnswer::Supply(None)),
        "a" | "all" => return Some(PromptAnswer::Supply(Some(Decision::SkipAll))),
        "q" | "quit" => return Some(PromptAnswer::Quit),
        _ => {}
    }

    let snapshot = &request.snapshot;
    match request.kind {
        RequestKind::MediaType => input
            .parse::<MediaType>()
            .ok()
            .map(|t| PromptAnswer::Supply(Some(Decision::MediaType(t)))),
        RequestKind::Selection => {
            if let Ok(n) = input.parse::<usize>() {
                if (1..=snapshot.candidates.len()).contains(&n) {
                    let scored = &snapshot.candidates[n - 1];
                    return Some(PromptAnswer::Supply(Some(Decision::Select(Choice {
                        id: scored.candidate.id,
                        media_type: snapshot.media_type,
                        title: Some(scored.candidate.title.clone()),
                    }))));
                }
                return None;
            }
            reference_answer(input, snapshot.media_type)
        }
        RequestKind::Fallback => reference_answer(input, snapshot.media_type),
    }
}

fn reference_answer(input: &str, default_type: MediaType) -> Option<PromptAnswer> {
    let reference = parse_tmdb_reference(input).ok()?;
    Some(PromptAnswer::Supply(Some(Decision::Select(Choice {
        id: reference.id,
        media_type: reference.media_type.unwrap_or(default_type),
        title: None,
    }))))
}

fn print_request(request: &DecisionRequest) {
    let snapshot = &request.snapshot;
    println!();
    println!("{} {}", "Batch:".bold(), snapshot.parsed_title.cyan());
    if let Some(ref path) = snapshot.first_path {
        println!("  {} {}", "First file:".bold(), path.display());
    }
    println!(
        "  {} {} file(s), {}{}",
        "Parsed:".bold(),
        snapshot.file_count,
        snapshot.media_type,
        snapshot
            .year
            .map(|y| format!(", {}", y))
            .unwrap_or_default()
    );
    if !snapshot.seasons.is_empty() {
        let seasons: Vec<String> = snapshot.seasons.iter().map(|s| s.to_string()).collect();
        println!("  {} {}", "Seasons:".bold(), seasons.join(", "));
    }

    match request.kind {
        RequestKind::MediaType => {
            println!("{}", "Is this a series or a movie?".yellow());
            print!("[s]eries / [m]ovie, Enter to skip, [a] skip all, [q] quit: ");
        }
        RequestKind::Selection => {
            println!("{}", "Several matches found:".yellow());
            for (i, scored) in snapshot.candidates.iter().enumerate() {
                let candidate = &scored.candidate;
                println!(
                    "  {}. {} ({}) [{}] {}",
                    i + 1,
                    candidate.title.bold(),
                    candidate
                        .year()
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    candidate.id,
                    format!("confidence {:.2}", scored.confidence).dimmed()
                );
                if candidate.original_title != candidate.title && !candidate.original_title.is_empty() {
                    println!("     {}", candidate.original_title.dimmed());
                }
            }
            print!("Number or TMDB reference, Enter to skip, [a] skip all, [q] quit: ");
        }
        RequestKind::Fallback => {
            println!("{}", "No match found.".yellow());
            print!("TMDB URL, tv:ID, movie:ID or ID, Enter to skip, [a] skip all, [q] quit: ");
        }
    }
    let _ = std::io::stdout().flush();
}

/// Ask until the user gives a valid answer. End of input cancels the scan.
fn prompt(request: &DecisionRequest) -> PromptAnswer {
    let stdin = std::io::stdin();
    loop {
        print_request(request);
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return PromptAnswer::Quit,
            Ok(_) => {}
        }
        match parse_answer(request, &line) {
            Some(answer) => return answer,
            None => println!("{} {}", "Invalid answer:".red(), line.trim()),
        }
    }
}

/// Execute the scan command.
pub fn scan(
    path: &Path,
    recursive: bool,
    tmdb: &TmdbSettings,
    options: ScanOptions,
    interactive: bool,
    output: Option<&Path>,
) -> Result<()> {
    println!("{}", "🔍 Resolving media identities...".bold().cyan());
    println!("  {} {}", "Source:".bold(), path.display());
    println!();

    let scan = find_media_files(path, recursive)?;
    if scan.files.is_empty() {
        println!("{}", "No media files found.".yellow());
        return Ok(());
    }
    let files = scan.parse_all();

    let client = TmdbClient::new(TmdbConfig::from_settings(tmdb)?)?;
    let mapping_dir = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };
    let overrides = JsonIdMapping::load(mapping_dir);
    let extractor = FfprobeExtractor::detect();

    let rendezvous = Arc::new(Rendezvous::new());
    let controller = DetectionController::new(client, overrides, extractor, rendezvous.cancel_flag());
    let (tx, rx) = mpsc::channel();
    let mut worker = ScanWorker::new(controller, Arc::clone(&rendezvous), tx, options);

    let handle = std::thread::Builder::new()
        .name("scan-worker".to_string())
        .spawn(move || worker.run(files))?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    for event in rx {
        match event {
            ScanEvent::BatchStarted {
                index,
                total,
                group_key,
                file_count,
            } => {
                pb.set_message(format!("[{}/{}] {} ({} file(s))", index + 1, total, group_key, file_count));
            }
            ScanEvent::DecisionRequested(request) => {
                let answer = if interactive {
                    pb.suspend(|| prompt(&request))
                } else {
                    PromptAnswer::Supply(None)
                };
                match answer {
                    PromptAnswer::Supply(decision) => {
                        rendezvous.supply(decision);
                    }
                    PromptAnswer::Quit => rendezvous.cancel(),
                }
            }
            ScanEvent::BatchFinished {
                group_key,
                state,
                identity,
                ..
            } => {
                let line = match (state, identity) {
                    (DetectionState::Confirmed, Some(identity)) => {
                        format!("  {} {} -> {}", "✓".green(), group_key, identity)
                    }
                    (DetectionState::Skipped, _) => format!("  {} {}", "-".yellow(), group_key),
                    _ => format!("  {} {}", "✗".red(), group_key),
                };
                pb.println(line);
            }
            ScanEvent::Finished { .. } => break,
        }
    }
    pb.finish_and_clear();

    let outcome = handle
        .join()
        .map_err(|_| crate::Error::other("scan worker panicked"))?;

    print_summary(&outcome);

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&outcome.contexts)?;
        std::fs::write(output, json)?;
        println!("{} {}", "Results written to".bold(), output.display());
    }

    Ok(())
}

fn source_label(context: &BatchContext) -> &'static str {
    match context.metadata_source {
        MetadataSource::Tmdb if context.mapped => "manual ID",
        MetadataSource::Tmdb => "TMDB",
        MetadataSource::EmbeddedMetadata => "embedded title",
        MetadataSource::Inferred => "filename",
        MetadataSource::Unidentified => "none",
    }
}

fn print_summary(outcome: &ScanOutcome) {
    println!();
    println!("{}", "📋 Scan Summary".bold().green());
    println!("  {} {}", "Batches:".bold(), outcome.contexts.len());
    println!("  {} {}", "Confirmed:".bold(), outcome.confirmed());
    println!("  {} {}", "Skipped:".bold(), outcome.skipped());
    println!("  {} {}", "Unidentified:".bold(), outcome.unidentified());
    if outcome.cancelled {
        println!("  {}", "Scan was cancelled.".yellow());
    }
    println!();

    for context in &outcome.contexts {
        match &context.identity {
            Some(identity) => println!(
                "  {} {} ({} file(s), {}, confidence {:.2})",
                identity.to_string().bold(),
                context.group_key.dimmed(),
                context.files.len(),
                source_label(context),
                context.confidence
            ),
            None => println!(
                "  {} {} ({} file(s))",
                format!("{:?}", context.state).yellow(),
                context.group_key,
                context.files.len()
            ),
        }
        if !context.episode_cache.is_empty() {
            println!("    {} episode title(s) cached", context.episode_cache.len());
        }
        if let Some(ref diagnostic) = context.diagnostic {
            println!("    {}", diagnostic.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detection::BatchSnapshot;
    use crate::models::media::{Candidate, ScoredCandidate};

    fn request(kind: RequestKind) -> DecisionRequest {
        DecisionRequest {
            kind,
            snapshot: BatchSnapshot {
                group_key: "office".to_string(),
                first_path: None,
                parsed_title: "Office".to_string(),
                media_type: MediaType::Series,
                seasons: vec![1],
                year: None,
                file_count: 2,
                candidates: vec![ScoredCandidate {
                    candidate: Candidate {
                        id: 2316,
                        title: "The Office".to_string(),
                        ..Default::default()
                    },
                    rank_score: 1.0,
                    confidence: 0.9,
                }],
            },
        }
    }

    #[test]
    fn test_parse_common_answers() {
        let req = request(RequestKind::Selection);
        assert_eq!(parse_answer(&req, "\n"), Some(PromptAnswer::Supply(None)));
        assert_eq!(
            parse_answer(&req, "a"),
            Some(PromptAnswer::Supply(Some(Decision::SkipAll)))
        );
        assert_eq!(parse_answer(&req, "Q"), Some(PromptAnswer::Quit));
    }

    #[test]
    fn test_parse_selection_number() {
        let req = request(RequestKind::Selection);
        match parse_answer(&req, "1") {
            Some(PromptAnswer::Supply(Some(Decision::Select(choice)))) => {
                assert_eq!(choice.id, 2316);
                assert_eq!(choice.media_type, MediaType::Series);
            }
            other => panic!("Expected selection, got {:?}", other),
        }
        assert_eq!(parse_answer(&req, "2"), None);
    }

    #[test]
    fn test_parse_fallback_reference() {
        let req = request(RequestKind::Fallback);
        match parse_answer(&req, "movie:603") {
            Some(PromptAnswer::Supply(Some(Decision::Select(choice)))) => {
                assert_eq!(choice.id, 603);
                assert_eq!(choice.media_type, MediaType::Movie);
            }
            other => panic!("Expected selection, got {:?}", other),
        }
        assert_eq!(parse_answer(&req, "not an id"), None);
    }

    #[test]
    fn test_parse_media_type() {
        let req = request(RequestKind::MediaType);
        assert_eq!(
            parse_answer(&req, "m"),
            Some(PromptAnswer::Supply(Some(Decision::MediaType(MediaType::Movie))))
        );
        assert_eq!(parse_answer(&req, "podcast"), None);
    }
}
