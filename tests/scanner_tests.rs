//! Integration tests for media file discovery.

use media_resolver::core::scanner::find_media_files;
use media_resolver::models::media::MediaType;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ========== DISCOVERY TESTS ==========

#[test]
fn test_scan_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let result = find_media_files(temp_dir.path(), true).unwrap();

    assert!(result.files.is_empty());
    assert_eq!(result.skipped_extras, 0);
}

#[test]
fn test_scan_filters_non_video_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("movie1.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("movie2.mp4"), "fake").unwrap();
    fs::write(temp_dir.path().join("movie2.srt"), "subs").unwrap();
    fs::write(temp_dir.path().join("document.txt"), "not video").unwrap();

    let result = find_media_files(temp_dir.path(), false).unwrap();

    assert_eq!(result.files.len(), 2);
    assert_eq!(result.total_files_scanned, 4);
}

#[test]
fn test_scan_output_is_sorted() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("b.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("a.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("c.mkv"), "fake").unwrap();

    let result = find_media_files(temp_dir.path(), false).unwrap();
    let names: Vec<_> = result
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["a.mkv", "b.mkv", "c.mkv"]);
}

#[test]
fn test_scan_skips_sample_folder_and_sample_files() {
    let temp_dir = TempDir::new().unwrap();
    let sample_dir = temp_dir.path().join("Sample");
    fs::create_dir(&sample_dir).unwrap();
    fs::write(sample_dir.join("clip.mkv"), "fake sample").unwrap();
    fs::write(temp_dir.path().join("movie-sample.mkv"), "fake sample").unwrap();
    fs::write(temp_dir.path().join("movie.mkv"), "fake video").unwrap();

    let result = find_media_files(temp_dir.path(), true).unwrap();

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.skipped_extras, 2);
}

#[test]
fn test_scan_keeps_titles_containing_samples() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("Free.Samples.2012.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("movie-sample.mkv"), "fake sample").unwrap();

    let result = find_media_files(temp_dir.path(), false).unwrap();
    let names: Vec<_> = result
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["Free.Samples.2012.mkv"]);
    assert_eq!(result.skipped_extras, 1);
}

// ========== RECURSION TESTS ==========

#[test]
fn test_scan_nested_requires_recursive() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("Show").join("Season 01");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("Show.S01E01.mkv"), "fake").unwrap();

    assert_eq!(find_media_files(temp_dir.path(), false).unwrap().files.len(), 0);
    assert_eq!(find_media_files(temp_dir.path(), true).unwrap().files.len(), 1);
}

#[test]
fn test_scan_parse_all() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("Show.Name.S01E04.1080p.mkv"), "fake").unwrap();
    fs::write(temp_dir.path().join("The.Matrix.1999.mkv"), "fake").unwrap();

    let parsed = find_media_files(temp_dir.path(), false).unwrap().parse_all();

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].media_type, MediaType::Series);
    assert_eq!(parsed[1].media_type, MediaType::Movie);
    assert_eq!(parsed[1].year, Some(1999));
}

// ========== ERROR TESTS ==========

#[test]
fn test_scan_nonexistent_path() {
    let result = find_media_files(Path::new("/nonexistent/path"), true);
    assert!(result.is_err());
}

#[test]
fn test_scan_single_video_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("The.Matrix.1999.mkv");
    fs::write(&file, "fake").unwrap();
    fs::write(temp_dir.path().join("Heat.1995.mkv"), "fake").unwrap();

    let result = find_media_files(&file, true).unwrap();

    assert_eq!(result.files, vec![file]);
    assert_eq!(result.total_files_scanned, 1);
    assert_eq!(result.skipped_extras, 0);
}

#[test]
fn test_scan_single_non_video_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("notes.txt");
    fs::write(&file, "not video").unwrap();

    let result = find_media_files(&file, false).unwrap();

    assert!(result.files.is_empty());
    assert_eq!(result.total_files_scanned, 1);
}
