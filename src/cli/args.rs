//! Command line argument definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Media Resolver - Identify movies and TV shows behind messy filenames
#[derive(Parser, Debug)]
#[command(name = "media-resolver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the identities of the media files in a folder
    Scan {
        /// Folder or single video file to scan
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Descend into subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Ask for the media type of every batch before searching
        #[arg(long)]
        ask_type: bool,

        /// Confirm even single, trusted matches
        #[arg(long)]
        confirm: bool,

        /// Prompt for a manual ID when nothing matches
        #[arg(long)]
        manual_fallback: bool,

        /// Never prompt; ambiguous batches are skipped
        #[arg(long, conflicts_with_all = ["ask_type", "confirm", "manual_fallback"])]
        non_interactive: bool,

        /// Do not prefetch episode titles
        #[arg(long)]
        no_episode_titles: bool,

        /// Episode title language
        #[arg(long, value_enum)]
        episode_language: Option<EpisodeLanguageArg>,

        /// Forced episode title language tag (e.g. en-US)
        #[arg(long, value_name = "TAG", conflicts_with = "episode_language")]
        episode_language_tag: Option<String>,

        /// Write the resolved batches as JSON
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Map a file to a TMDB entry for future scans
    Map {
        /// Media file to map
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// TMDB URL, tv:ID, movie:ID or a bare ID
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Media type for a bare ID
        #[arg(short = 't', long, value_enum)]
        media_type: Option<MediaTypeArg>,
    },

    /// Remove the mapping of a file
    Unmap {
        /// Mapped media file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List the mappings of a folder
    Mappings {
        /// Folder holding the mapping file (default: current directory)
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

/// Media type as accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaTypeArg {
    #[value(alias = "tv")]
    Series,
    Movie,
}

/// Episode title language policy as accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeLanguageArg {
    /// Same language as the rest of the metadata
    Same,
    /// The series' original language
    Original,
}

impl From<MediaTypeArg> for crate::models::media::MediaType {
    fn from(arg: MediaTypeArg) -> Self {
        match arg {
            MediaTypeArg::Series => Self::Series,
            MediaTypeArg::Movie => Self::Movie,
        }
    }
}
