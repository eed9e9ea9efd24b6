//! Static effect/resource catalog with fuzzy name lookup.
//!
//! Replayed mutations name resources by human-readable names; this table maps
//! each enumerated kind to its entries and ranks a keyword against them:
//! exact (100) > prefix (95) > substring (90) > similarity ratio, floor 30.

use serde::{Deserialize, Serialize};

use crate::error::{DraftError, DraftResult};

pub(crate) const MATCH_FLOOR: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum CatalogKind {
    VideoSceneEffectType,
    VideoCharacterEffectType,
    ToneEffectType,
    AudioSceneEffectType,
    SpeechToSongType,
    FilterType,
    MaskType,
    TransitionType,
    FontType,
    TextIntro,
    TextOutro,
    TextLoopAnim,
    GroupAnimationType,
    IntroType,
    OutroType,
}

impl CatalogKind {
    pub(crate) const ALL: [CatalogKind; 15] = [
        Self::VideoSceneEffectType,
        Self::VideoCharacterEffectType,
        Self::ToneEffectType,
        Self::AudioSceneEffectType,
        Self::SpeechToSongType,
        Self::FilterType,
        Self::MaskType,
        Self::TransitionType,
        Self::FontType,
        Self::TextIntro,
        Self::TextOutro,
        Self::TextLoopAnim,
        Self::GroupAnimationType,
        Self::IntroType,
        Self::OutroType,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::VideoSceneEffectType => "VideoSceneEffectType",
            Self::VideoCharacterEffectType => "VideoCharacterEffectType",
            Self::ToneEffectType => "ToneEffectType",
            Self::AudioSceneEffectType => "AudioSceneEffectType",
            Self::SpeechToSongType => "SpeechToSongType",
            Self::FilterType => "FilterType",
            Self::MaskType => "MaskType",
            Self::TransitionType => "TransitionType",
            Self::FontType => "FontType",
            Self::TextIntro => "TextIntro",
            Self::TextOutro => "TextOutro",
            Self::TextLoopAnim => "TextLoopAnim",
            Self::GroupAnimationType => "GroupAnimationType",
            Self::IntroType => "IntroType",
            Self::OutroType => "OutroType",
        }
    }

    pub(crate) fn description(&self) -> &'static str {
        match self {
            Self::VideoSceneEffectType => "full-frame visual scene effects",
            Self::VideoCharacterEffectType => "effects that track people in the frame",
            Self::ToneEffectType => "voice tone changers",
            Self::AudioSceneEffectType => "ambient audio scene processing",
            Self::SpeechToSongType => "speech-to-song conversion",
            Self::FilterType => "color and style filters",
            Self::MaskType => "shape masks",
            Self::TransitionType => "transitions between adjacent clips",
            Self::FontType => "text fonts",
            Self::TextIntro => "text entrance animations",
            Self::TextOutro => "text exit animations",
            Self::TextLoopAnim => "looping text animations",
            Self::GroupAnimationType => "combined in/out animations for video and images",
            Self::IntroType => "entrance animations for video and images",
            Self::OutroType => "exit animations for video and images",
        }
    }

    /// Accepts the canonical name plus the short aliases older callers send.
    pub(crate) fn parse(raw: &str) -> DraftResult<Self> {
        let key = raw.trim();
        let kind = match key {
            "VIDEO_SCENE" => Some(Self::VideoSceneEffectType),
            "VIDEO_CHARACTER" => Some(Self::VideoCharacterEffectType),
            "filter_type" => Some(Self::FilterType),
            "mask_type" => Some(Self::MaskType),
            "Font" => Some(Self::FontType),
            _ => Self::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(key)),
        };
        kind.ok_or_else(|| {
            let names: Vec<_> = Self::ALL.iter().map(|k| k.as_str()).collect();
            DraftError::NotFound(format!(
                "catalog kind '{key}' (supported: {})",
                names.join(", ")
            ))
        })
    }

    pub(crate) fn entries(&self) -> &'static [CatalogEntry] {
        match self {
            Self::VideoSceneEffectType => VIDEO_SCENE,
            Self::VideoCharacterEffectType => VIDEO_CHARACTER,
            Self::ToneEffectType => TONE,
            Self::AudioSceneEffectType => AUDIO_SCENE,
            Self::SpeechToSongType => SPEECH_TO_SONG,
            Self::FilterType => FILTERS,
            Self::MaskType => MASKS,
            Self::TransitionType => TRANSITIONS,
            Self::FontType => FONTS,
            Self::TextIntro => TEXT_INTRO,
            Self::TextOutro => TEXT_OUTRO,
            Self::TextLoopAnim => TEXT_LOOP,
            Self::GroupAnimationType => GROUP_ANIMATION,
            Self::IntroType => INTRO,
            Self::OutroType => OUTRO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct CatalogEntry {
    pub(crate) name: &'static str,
    pub(crate) resource_id: &'static str,
    pub(crate) is_vip: bool,
    /// Default length in microseconds for animations and transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<i64>,
    /// Names of adjustable parameters, each taking a value in [0, 100].
    #[serde(skip_serializing_if = "no_params")]
    pub(crate) params: &'static [&'static str],
}

fn no_params(params: &&'static [&'static str]) -> bool {
    params.is_empty()
}

const fn entry(name: &'static str, resource_id: &'static str, is_vip: bool) -> CatalogEntry {
    CatalogEntry {
        name,
        resource_id,
        is_vip,
        duration: None,
        params: &[],
    }
}

const fn timed(name: &'static str, resource_id: &'static str, is_vip: bool, duration: i64) -> CatalogEntry {
    CatalogEntry {
        name,
        resource_id,
        is_vip,
        duration: Some(duration),
        params: &[],
    }
}

const fn tunable(
    name: &'static str,
    resource_id: &'static str,
    is_vip: bool,
    params: &'static [&'static str],
) -> CatalogEntry {
    CatalogEntry {
        name,
        resource_id,
        is_vip,
        duration: None,
        params,
    }
}

// ── Tables ───────────────────────────────────────────────────────────────

static VIDEO_SCENE: &[CatalogEntry] = &[
    tunable("Glitch", "7010558788675605000", false, &["speed", "intensity"]),
    tunable("Film Grain", "7010558788675605001", false, &["intensity"]),
    tunable("Light Leak", "7010558788675605002", true, &["speed", "brightness"]),
    tunable("Snowfall", "7010558788675605003", false, &["density", "speed"]),
    tunable("Vignette", "7010558788675605004", false, &["intensity", "range"]),
    tunable("Zoom Blur", "7010558788675605005", true, &["intensity"]),
    tunable("Shake", "7010558788675605006", false, &["amplitude", "speed"]),
];

static VIDEO_CHARACTER: &[CatalogEntry] = &[
    tunable("Halo Outline", "7020558788675605000", false, &["width", "brightness"]),
    tunable("Clone Trail", "7020558788675605001", true, &["count"]),
    tunable("Spotlight", "7020558788675605002", false, &["intensity"]),
    tunable("Heart Eyes", "7020558788675605003", false, &[]),
];

static TONE: &[CatalogEntry] = &[
    tunable("Robot", "7030558788675605000", false, &["strength"]),
    tunable("Chipmunk", "7030558788675605001", false, &["pitch"]),
    tunable("Deep Voice", "7030558788675605002", false, &["pitch"]),
    tunable("Megaphone", "7030558788675605003", true, &["strength"]),
    tunable("Echo Chamber", "7030558788675605004", false, &["delay", "feedback"]),
];

static AUDIO_SCENE: &[CatalogEntry] = &[
    tunable("Rain", "7040558788675605000", false, &["mix"]),
    tunable("Concert Hall", "7040558788675605001", false, &["reverb"]),
    tunable("Telephone", "7040558788675605002", false, &["strength"]),
    tunable("Underwater", "7040558788675605003", true, &["depth"]),
    tunable("Radio", "7040558788675605004", false, &["noise"]),
];

static SPEECH_TO_SONG: &[CatalogEntry] = &[
    entry("Lofi", "7050558788675605000", false),
    entry("Folk", "7050558788675605001", false),
    entry("Pop Chorus", "7050558788675605002", true),
];

static FILTERS: &[CatalogEntry] = &[
    entry("Warm", "7060558788675605000", false),
    entry("Cool Blue", "7060558788675605001", false),
    entry("Black and White", "7060558788675605002", false),
    entry("Vintage", "7060558788675605003", false),
    entry("Cinematic", "7060558788675605004", true),
    entry("Fade Film", "7060558788675605005", false),
    entry("Sunset Glow", "7060558788675605006", true),
];

pub(crate) const RECTANGLE_MASK: &str = "Rectangle";

static MASKS: &[CatalogEntry] = &[
    entry("Linear", "7070558788675605000", false),
    entry("Mirror", "7070558788675605001", false),
    entry("Circle", "7070558788675605002", false),
    entry(RECTANGLE_MASK, "7070558788675605003", false),
    entry("Heart", "7070558788675605004", false),
    entry("Star", "7070558788675605005", false),
];

static TRANSITIONS: &[CatalogEntry] = &[
    timed("Dissolve", "7080558788675605000", false, 500_000),
    timed("Fade to Black", "7080558788675605001", false, 800_000),
    timed("Push Left", "7080558788675605002", false, 500_000),
    timed("Zoom In", "7080558788675605003", false, 600_000),
    timed("Swirl", "7080558788675605004", true, 1_000_000),
    timed("Wipe Down", "7080558788675605005", false, 500_000),
];

static FONTS: &[CatalogEntry] = &[
    entry("System", "7090558788675605000", false),
    entry("Serif Classic", "7090558788675605001", false),
    entry("Handwriting", "7090558788675605002", false),
    entry("Mono", "7090558788675605003", false),
    entry("Bold Display", "7090558788675605004", true),
];

static TEXT_INTRO: &[CatalogEntry] = &[
    timed("Typewriter", "7100558788675605000", false, 500_000),
    timed("Fade In", "7100558788675605001", false, 500_000),
    timed("Bounce In", "7100558788675605002", false, 600_000),
    timed("Slide Up", "7100558788675605003", false, 500_000),
    timed("Retro Typewriter", "7100558788675605004", true, 800_000),
];

static TEXT_OUTRO: &[CatalogEntry] = &[
    timed("Fade Out", "7110558788675605000", false, 500_000),
    timed("Slide Down", "7110558788675605001", false, 500_000),
    timed("Shrink", "7110558788675605002", false, 400_000),
    timed("Burst", "7110558788675605003", true, 600_000),
];

static TEXT_LOOP: &[CatalogEntry] = &[
    timed("Spring", "7120558788675605000", false, 1_000_000),
    timed("Color Glitch", "7120558788675605001", false, 800_000),
    timed("Pulse", "7120558788675605002", false, 1_000_000),
    timed("Wave", "7120558788675605003", true, 1_200_000),
];

static GROUP_ANIMATION: &[CatalogEntry] = &[
    timed("Spin and Zoom", "7130558788675605000", false, 1_000_000),
    timed("Swing", "7130558788675605001", false, 1_000_000),
    timed("Flip Over", "7130558788675605002", true, 1_200_000),
];

static INTRO: &[CatalogEntry] = &[
    timed("Fade In", "7140558788675605000", false, 500_000),
    timed("Zoom In", "7140558788675605001", false, 500_000),
    timed("Slide Right", "7140558788675605002", false, 500_000),
    timed("Rotate In", "7140558788675605003", true, 700_000),
];

static OUTRO: &[CatalogEntry] = &[
    timed("Fade Out", "7150558788675605000", false, 500_000),
    timed("Zoom Out", "7150558788675605001", false, 500_000),
    timed("Slide Left", "7150558788675605002", false, 500_000),
    timed("Rotate Out", "7150558788675605003", true, 700_000),
];

// ── Ranking ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct RankedEntry {
    #[serde(flatten)]
    pub(crate) entry: CatalogEntry,
    pub(crate) score: u32,
}

/// Tiered score of `keyword` against `name`, case-insensitive.
pub(crate) fn match_score(keyword: &str, name: &str) -> u32 {
    let keyword = keyword.trim().to_lowercase();
    let name = name.to_lowercase();
    if keyword == name {
        100
    } else if name.starts_with(&keyword) {
        95
    } else if name.contains(&keyword) {
        90
    } else {
        (similarity(&keyword, &name) * 100.0) as u32
    }
}

/// Ratcliff/Obershelp ratio: `2 * matches / (len(a) + len(b))`.
pub(crate) fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Longest common substring, leftmost in `a` on ties.
    let mut best = (0usize, 0usize, 0usize);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                row[j + 1] = prev[j] + 1;
                if row[j + 1] > best.2 {
                    best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
                }
            }
        }
        prev = row;
    }
    let (ai, bj, len) = best;
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..ai], &b[..bj]) + matching_chars(&a[ai + len..], &b[bj + len..])
}

/// Entries of `kind`, optionally filtered by VIP flag and ranked against `keyword`.
///
/// Without a keyword entries keep table order. With one, anything under the
/// floor is dropped and the rest sort by descending score.
pub(crate) fn find(
    kind: CatalogKind,
    keyword: Option<&str>,
    is_vip: Option<bool>,
    limit: Option<usize>,
) -> Vec<RankedEntry> {
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
    let mut ranked: Vec<RankedEntry> = kind
        .entries()
        .iter()
        .filter(|e| is_vip.is_none_or(|vip| e.is_vip == vip))
        .filter_map(|e| match keyword {
            Some(k) => {
                let score = match_score(k, e.name);
                (score >= MATCH_FLOOR).then_some(RankedEntry { entry: *e, score })
            }
            None => Some(RankedEntry { entry: *e, score: 100 }),
        })
        .collect();
    if keyword.is_some() {
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
    }
    if let Some(limit) = limit.filter(|l| *l > 0) {
        ranked.truncate(limit);
    }
    ranked
}

/// Best entry for `name`, or NotFound when nothing clears the floor.
pub(crate) fn resolve(kind: CatalogKind, name: &str) -> DraftResult<CatalogEntry> {
    find(kind, Some(name), None, Some(1))
        .into_iter()
        .next()
        .map(|r| r.entry)
        .ok_or_else(|| DraftError::NotFound(format!("no {} named '{name}'", kind.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_tiers() {
        assert_eq!(match_score("Dissolve", "dissolve"), 100);
        assert_eq!(match_score("fade", "Fade to Black"), 95);
        assert_eq!(match_score("black", "Fade to Black"), 90);
        // Ratio tier can outscore substring: 2 * 7 / 15.
        assert_eq!(match_score("disolve", "Dissolve"), 93);
        assert_eq!(match_score("xyz", "Dissolve"), 0);
    }

    #[test]
    fn test_similarity_matches_known_ratio() {
        // "abcd" vs "bcde": one block "bcd", 2*3/8.
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_find_ranks_and_filters() {
        let hits = find(CatalogKind::TransitionType, Some("zoom"), None, None);
        assert_eq!(hits[0].entry.name, "Zoom In");
        assert_eq!(hits[0].score, 95);

        let vip_only = find(CatalogKind::FilterType, None, Some(true), None);
        assert!(vip_only.iter().all(|h| h.entry.is_vip));
        assert_eq!(vip_only.len(), 2);

        let limited = find(CatalogKind::FilterType, None, None, Some(3));
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].entry.name, "Warm");

        assert!(find(CatalogKind::MaskType, Some("qqqqqqqqqqqq"), None, None).is_empty());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve(CatalogKind::MaskType, "circle").unwrap().name, "Circle");
        assert_eq!(resolve(CatalogKind::IntroType, "fade").unwrap().name, "Fade In");
        assert!(matches!(
            resolve(CatalogKind::FontType, "zzzzzzzzzzzzzzzz"),
            Err(DraftError::NotFound(_))
        ));
    }

    #[test]
    fn test_kind_parse_aliases() {
        assert_eq!(CatalogKind::parse("VIDEO_SCENE").unwrap(), CatalogKind::VideoSceneEffectType);
        assert_eq!(CatalogKind::parse("transitiontype").unwrap(), CatalogKind::TransitionType);
        assert_eq!(CatalogKind::parse("Font").unwrap(), CatalogKind::FontType);
        assert!(CatalogKind::parse("Sticker").is_err());
    }
}
