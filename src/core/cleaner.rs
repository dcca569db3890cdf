//! Aggressive cleaning of filenames into TMDB search queries.
//!
//! The parser extracts structure; this module only cares about producing the
//! best possible search string from noisy scene-release names.

use regex::Regex;
use std::sync::LazyLock;

const RESOLUTION: &str = r"\b(720p|1080p|1080i|2160p|4320p|4[kK]|UHD|SD|HD|FHD|QHD)\b";

const CODEC: &str = r"\b(x\.?264|x\.?265|[hH]\.?264|[hH]\.?265|HEVC|AVC|XVID|DIVX|AV1|VP9|MPEG[24]?|VC-?1|DVDR)\b";

const AUDIO: &str = concat!(
    r"\b(AAC|AC3|EAC3|E-AC-?3|DTS(?:-?HD)?|DTS-?X|TrueHD|Atmos",
    r"|DD[P+]?5\.?1|DD[P+]?7\.?1|DD[P+]?2\.?0|DD[P+]?",
    r"|LPCM|PCM|FLAC|OPUS|MP3|OGG|WMA",
    r"|2\.0|5\.1|7\.1)(?:ch)?\b"
);

const SOURCE: &str = concat!(
    r"\b(WEB[- ]?DL|WEBRip|WEB[- ]?Cap|WEB",
    r"|Blu[- ]?[Rr]ay|BDRip|BRRip|BDREMUX",
    r"|HDTV|HDRip|DVDRip|DVD[Rr]?|PDTV|SDTV|TVRip|VHSRip",
    r"|R5|CAMRip|CAM|TELESYNC|TS|TC|SCR|SCREENER",
    r"|PPVRip|VODRip|HC|HDCAM)\b"
);

const HDR: &str = r"\b(HDR10\+?|HDR|DV|Dolby[- ]?Vision|HLG|SDR|10[- ]?bit|8[- ]?bit)\b";

const STREAMING: &str = concat!(
    r"\b(AMZN|NF|Netflix|DSNP|Disney\+?|HULU|ATVP|AppleTV\+?",
    r"|PMTP|Paramount\+?|PCOK|Peacock|HMAX|HBO[- ]?Max|MAX",
    r"|STAN|iT|iTunes|RED|CRAV|MA|VUDU|CR|Crunchyroll",
    r"|APTV|APTX|MUBI|CRITERION)\b"
);

const LANGUAGE: &str = concat!(
    r"\b(Dual[- ]?Lat|Latino|Castellano|Spanish|English|French|German",
    r"|Italian|Portuguese|Russian|Japanese|Korean|Chinese|Hindi|Arabic",
    r"|MULTi[- ]?SUBS?|MULTi|SUB(?:BED|S)?|DUB(?:BED)?)\b"
);

const RELEASE: &str = concat!(
    r"\b(REPACK|PROPER|RERIP|REAL|EXTENDED|UNRATED|UNCUT",
    r"|DC|DIRECTORS?[- ]?CUT|THEATRICAL|IMAX|OPEN[- ]?MATTE",
    r"|REMUX|HYBRID|REMASTERED|RESTORED|ANNIVERSARY|CRITERION",
    r"|COMPLETE|FINAL|LIMITED|INTERNAL|SAMPLE)\b"
);

const GROUPS: &str = concat!(
    r"\b(YIFY|YTS|RARBG|SPARKS|GECKOS|FGT|EVO|ETTV|ETRG|PSA|AMIABLE",
    r"|QxR|ION10|NTb|NTG|CMRG|MeGusta|TIGOLE|GalaxyRG|GalaxyTV",
    r"|pahe|iFT|MZABI|SiGMA|AMRAP|FLUX|CUPCAKES|NOGRP|BONSAI",
    r"|LAW|DEFLATE|SHITBOX|PLAYWEB|RAPIDCOWS|SUJAIDR)\b"
);

const WEBSITE: &str = r"(?:www\.)\S+\.\S+|\bYTS\.(?:MX|AM|AG|LT)\b|\bEZTV\b|\b1337x\b";

const TRAILING_GROUP: &str = r"-[A-Za-z0-9]+$";

const BRACKETS: &str = r"\[[^\]]*\]";

const PAREN_NOISE: &str = concat!(
    r"\([^)]*(?:rip|sub|dub|lat|720|1080|2160|x264|x265|hevc|bluray|web|hdr",
    r"|remux|amzn|yify|yts|cam|ts(?:$|\s)|hc)[^)]*\)"
);

static RE_BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(BRACKETS).unwrap());
static RE_WEBSITE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("(?i){}", WEBSITE)).unwrap());
static RE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._]").unwrap());
static RE_DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--+").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\(\[]?((?:19|20)\d{2})[\)\]]?").unwrap());
static RE_EMPTY_PARENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s*\)|\[\s*\]").unwrap());
static RE_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s'\-:&]").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_EDGE_DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s\-]+|[\s\-]+$").unwrap());

/// All noise patterns; brackets and parenthesised noise go first.
static ALL_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        BRACKETS,
        PAREN_NOISE,
        RESOLUTION,
        CODEC,
        AUDIO,
        SOURCE,
        HDR,
        STREAMING,
        LANGUAGE,
        RELEASE,
        GROUPS,
        WEBSITE,
        TRAILING_GROUP,
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).expect("valid cleaner pattern"))
    .collect()
});

/// Clean a raw filename stem (or title) into a search query.
///
/// For movies everything after the detected year is dropped, since post-year
/// text is reliably release noise. For series only the year token goes, as
/// years can be part of a series title.
///
/// Returns `(clean_title, year)`. The title may be empty; callers fall back to
/// the parser's title guess in that case.
pub fn clean_for_search(raw_name: &str, is_series: bool) -> (String, Option<u16>) {
    // Brackets go as a unit before separators are touched ("[YTS.MX]").
    let name = RE_BRACKETS.replace_all(raw_name, " ");
    // Watermarks need their dots intact ("www.1337x.to").
    let name = RE_WEBSITE.replace_all(&name, " ");

    let name = RE_SEPARATORS.replace_all(&name, " ");
    let mut name = RE_DASH_RUNS.replace_all(&name, " ").into_owned();

    let mut year = None;
    if let Some(caps) = RE_YEAR.captures_iter(&name).last() {
        let full = caps.get(0).expect("match 0 always present");
        let parsed = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok());
        if let Some(y) = parsed.filter(|y| (1900..=2100).contains(y)) {
            year = Some(y);
            name = if is_series {
                format!("{}{}", &name[..full.start()], &name[full.end()..])
            } else {
                name[..full.start()].to_string()
            };
        }
    }

    for pattern in ALL_NOISE.iter() {
        name = pattern.replace_all(&name, " ").into_owned();
    }

    let name = RE_EMPTY_PARENS.replace_all(&name, "");
    let name = RE_DISALLOWED.replace_all(&name, " ");
    let name = RE_SPACES.replace_all(&name, " ");
    let name = RE_EDGE_DASHES.replace_all(name.trim(), "").into_owned();

    tracing::debug!("Search query for '{}': '{}' (year={:?})", raw_name, name, year);

    (name, year)
}
