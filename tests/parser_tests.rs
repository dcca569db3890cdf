//! Integration tests for filename parsing and title grouping.

use media_resolver::core::grouper::{group_by_title, group_key};
use media_resolver::core::parser::{parse_filename, parse_stem};
use media_resolver::models::media::MediaType;
use std::path::{Path, PathBuf};

// ========== EPISODE ANCHOR TESTS ==========

#[test]
fn test_scene_release_episode() {
    let parsed = parse_stem("Show.Name.S01E04.1080p.WEB-DL.x264-GROUP");

    assert_eq!(parsed.title_guess, "Show Name");
    assert_eq!(parsed.media_type, MediaType::Series);
    assert_eq!(parsed.season, Some(1));
    assert_eq!(parsed.episodes, vec![4]);
    assert_eq!(parsed.year, None);
}

#[test]
fn test_multi_episode_file() {
    let parsed = parse_stem("Show.Name.S01E04E05.720p");

    assert_eq!(parsed.title_guess, "Show Name");
    assert_eq!(parsed.season, Some(1));
    assert_eq!(parsed.episodes, vec![4, 5]);
    assert_eq!(parsed.single_episode(), None);
}

#[test]
fn test_repeated_episode_is_deduplicated() {
    let parsed = parse_stem("Show.S01E04E04");
    assert_eq!(parsed.episodes, vec![4]);
    assert_eq!(parsed.single_episode(), Some((1, 4)));
}

#[test]
fn test_alternate_anchor_forms() {
    let cross = parse_stem("Show Name 1x04");
    assert_eq!(cross.season, Some(1));
    assert_eq!(cross.episodes, vec![4]);
    assert_eq!(cross.title_guess, "Show Name");

    let spelled = parse_stem("Show.Name.Season.2.Episode.3");
    assert_eq!(spelled.season, Some(2));
    assert_eq!(spelled.episodes, vec![3]);
    assert_eq!(spelled.title_guess, "Show Name");
}

#[test]
fn test_episode_zero_is_accepted() {
    let parsed = parse_stem("Show.S02E00");
    assert_eq!(parsed.media_type, MediaType::Series);
    assert_eq!(parsed.single_episode(), Some((2, 0)));
}

#[test]
fn test_resolution_is_not_an_episode() {
    let parsed = parse_stem("Movie.1920x1080");
    assert_eq!(parsed.media_type, MediaType::Movie);
    assert_eq!(parsed.season, None);
    assert!(parsed.episodes.is_empty());
}

// ========== MOVIE TESTS ==========

#[test]
fn test_movie_with_year() {
    let parsed = parse_stem("The.Matrix.1999.1080p.BluRay.x264");

    assert_eq!(parsed.title_guess, "The Matrix");
    assert_eq!(parsed.media_type, MediaType::Movie);
    assert_eq!(parsed.year, Some(1999));
    assert_eq!(parsed.season, None);
}

#[test]
fn test_last_year_wins() {
    let parsed = parse_stem("Blade.Runner.2049.2017.2160p");
    assert_eq!(parsed.year, Some(2017));
    assert_eq!(parsed.title_guess, "Blade Runner 2049");
}

#[test]
fn test_noise_only_stem_keeps_a_title() {
    let parsed = parse_stem("1080p");
    assert_eq!(parsed.title_guess, "1080p");
}

#[test]
fn test_parse_filename_keeps_path() {
    let path = Path::new("/media/tv/Show.Name.S02E10.mkv");
    let parsed = parse_filename(path);

    assert_eq!(parsed.path, PathBuf::from("/media/tv/Show.Name.S02E10.mkv"));
    assert_eq!(parsed.raw_stem, "Show.Name.S02E10");
    assert_eq!(parsed.file_name(), "Show.Name.S02E10.mkv");
    assert_eq!(parsed.single_episode(), Some((2, 10)));
}

// ========== GROUPING TESTS ==========

#[test]
fn test_episode_titles_do_not_split_a_series() {
    let files = vec![
        parse_stem("Show.Name.S01E01.Pilot.1080p"),
        parse_stem("Show.Name.S01E02.Cats.in.the.Bag.720p"),
        parse_stem("Show_Name_1x03"),
    ];
    let groups = group_by_title(files);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, "show name");
    assert_eq!(groups[0].files.len(), 3);
}

#[test]
fn test_movies_group_by_full_stem() {
    assert_ne!(group_key("Dune.2021.2160p"), group_key("Dune.1984.720p"));
}
