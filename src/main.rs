//! Media Resolver CLI
//!
//! A command-line tool that identifies the movies and TV shows behind messy
//! media filenames using TMDB.

use clap::Parser;
use media_resolver::cli::{
    args::{Cli, Commands, EpisodeLanguageArg},
    commands::{mapping, scan},
};
use media_resolver::core::prefetch::EpisodeTitleLanguage;
use media_resolver::core::worker::ScanOptions;
use media_resolver::models::config::{self, Config};
use media_resolver::preflight;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = config::load_config();

    // Run the appropriate command
    match cli.command {
        Commands::Scan {
            path,
            recursive,
            ask_type,
            confirm,
            manual_fallback,
            non_interactive,
            no_episode_titles,
            episode_language,
            episode_language_tag,
            output,
        } => {
            // Run preflight checks unless skipped
            if !cli.skip_preflight {
                run_preflight_checks(&config)?;
            }

            let mut policy = config.detection;
            policy.always_ask_media_type |= ask_type;
            policy.always_confirm_match |= confirm;
            policy.interactive_fallback |= manual_fallback;
            if non_interactive {
                policy = Default::default();
            }

            let episode_language = match (episode_language, episode_language_tag) {
                (_, Some(tag)) => EpisodeTitleLanguage::Forced(tag),
                (Some(EpisodeLanguageArg::Same), None) => EpisodeTitleLanguage::SameAsMetadata,
                (Some(EpisodeLanguageArg::Original), None) => EpisodeTitleLanguage::Original,
                (None, None) => config.episodes.language.clone(),
            };

            let options = ScanOptions {
                policy,
                include_episode_titles: config.episodes.include_titles && !no_episode_titles,
                episode_language,
            };

            scan::scan(
                &path,
                recursive || config.scan.recursive,
                &config.tmdb,
                options,
                !non_interactive,
                output.as_deref(),
            )?;
        }

        Commands::Map {
            file,
            reference,
            media_type,
        } => {
            mapping::map(&file, &reference, media_type.map(Into::into))?;
        }

        Commands::Unmap { file } => {
            mapping::unmap(&file)?;
        }

        Commands::Mappings { dir } => {
            mapping::list(&dir.unwrap_or_else(|| PathBuf::from(".")))?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("media_resolver=debug")
    } else {
        EnvFilter::new("media_resolver=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Run preflight checks and exit if a required one fails.
fn run_preflight_checks(config: &Config) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(&config.tmdb);
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
