//! Manual ID mapping commands.
//!
//! Implements `map`, `unmap` and `mappings`. Mappings live next to the media
//! files, so a file's mapping is stored in its parent folder.

use crate::models::media::MediaType;
use crate::services::id_mapping::{parse_tmdb_reference, JsonIdMapping, MAPPING_FILE};
use crate::services::OverrideStore;
use crate::Result;
use colored::Colorize;
use std::path::Path;

fn split_file(file: &Path) -> Result<(&Path, String)> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| crate::Error::other(format!("not a file path: {}", file.display())))?;
    let dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(crate::Error::NotADirectory(dir.display().to_string()));
    }
    Ok((dir, name))
}

/// Map a file to a TMDB entry.
pub fn map(file: &Path, reference: &str, media_type: Option<MediaType>) -> Result<()> {
    let parsed = parse_tmdb_reference(reference)?;
    let media_type = parsed.media_type.or(media_type).ok_or_else(|| {
        crate::Error::InvalidReference(format!(
            "{} (bare IDs need --media-type series|movie)",
            reference
        ))
    })?;

    let (dir, name) = split_file(file)?;
    let mut store = JsonIdMapping::load(dir);
    store.set_id(&name, parsed.id, media_type, None)?;

    println!(
        "{} {} -> {}:{}",
        "Mapped".green().bold(),
        name,
        media_type,
        parsed.id
    );
    Ok(())
}

/// Remove the mapping of a file.
pub fn unmap(file: &Path) -> Result<()> {
    let (dir, name) = split_file(file)?;
    let mut store = JsonIdMapping::load(dir);

    if store.remove(&name)? {
        println!("{} {}", "Removed mapping for".green().bold(), name);
    } else {
        println!("{} {}", "No mapping for".yellow(), name);
    }
    Ok(())
}

/// List the mappings of a folder.
pub fn list(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(crate::Error::NotADirectory(dir.display().to_string()));
    }
    let store = JsonIdMapping::load(dir);

    if store.is_empty() {
        println!("{} {}", "No mappings in".yellow(), dir.join(MAPPING_FILE).display());
        return Ok(());
    }

    println!("{} {}", "📋 Mappings in".bold().green(), store.path().display());
    for (key, entry) in store.entries() {
        println!(
            "  {} -> {}:{}{}",
            entry.original_filename.bold(),
            entry.media_type,
            entry.tmdb_id,
            entry
                .title
                .as_ref()
                .map(|t| format!(" ({})", t))
                .unwrap_or_default()
        );
        let mapped_at = entry
            .mapped_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("    {} key '{}', mapped {}", "·".dimmed(), key, mapped_at);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_map_and_unmap() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("The.Matrix.1999.mkv");

        map(&file, "movie:603", None).unwrap();
        let store = JsonIdMapping::load(dir.path());
        assert_eq!(store.get_id("The.Matrix.1999.mkv"), Some((603, MediaType::Movie)));

        unmap(&file).unwrap();
        assert!(JsonIdMapping::load(dir.path()).is_empty());
    }

    #[test]
    fn test_map_bare_id_needs_type() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Show.S01E01.mkv");

        assert!(map(&file, "1396", None).is_err());
        map(&file, "1396", Some(MediaType::Series)).unwrap();
        assert_eq!(
            JsonIdMapping::load(dir.path()).get_id("Show.S01E01.mkv"),
            Some((1396, MediaType::Series))
        );
    }
}
