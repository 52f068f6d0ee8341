//! Text similarity used to decide whether two search hits denote the same
//! recording.
//!
//! Titles and artists are reduced to their letters, digits and CJK ideographs
//! before comparison, so punctuation, spacing and casing differences between
//! platforms never count against a match.

/// Weight of the title in the combined score; the artist takes the rest.
const NAME_WEIGHT: f64 = 0.7;
const ARTIST_WEIGHT: f64 = 0.3;

/// Durations closer than this many seconds always match.
const DURATION_FLOOR_SECS: u32 = 10;
/// Relative tolerance applied to the original duration for longer tracks.
const DURATION_RATIO: f64 = 0.15;

// =============================================================================
// Normalization
// =============================================================================

/// Lowercase and keep only letters, digits and CJK ideographs.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_numeric())
        .collect()
}

// =============================================================================
// String Similarity
// =============================================================================

/// Edit distance over code points, using two rolling rows sized by the shorter
/// input.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut cur = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        cur[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[short.len()]
}

/// `1 - distance / max_len`, floored at 0.
///
/// Returns 1.0 for identical strings and 0.0 if either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein(a, b);
    if distance >= max_len {
        return 0.0;
    }

    1.0 - distance as f64 / max_len as f64
}

/// Confidence in [0, 1] that a candidate (name, artist) is the same recording.
///
/// A missing name on either side means no match at all. A missing artist on
/// either side leaves the name similarity as the whole score.
pub fn song_similarity(name: &str, artist: &str, cand_name: &str, cand_artist: &str) -> f64 {
    let name_a = normalize(name);
    let name_b = normalize(cand_name);
    if name_a.is_empty() || name_b.is_empty() {
        return 0.0;
    }
    let name_similarity = similarity(&name_a, &name_b);

    let artist_a = normalize(artist);
    let artist_b = normalize(cand_artist);
    if artist_a.is_empty() || artist_b.is_empty() {
        return name_similarity;
    }

    name_similarity * NAME_WEIGHT + similarity(&artist_a, &artist_b) * ARTIST_WEIGHT
}

// =============================================================================
// Duration Matching
// =============================================================================

/// Whether a candidate duration is close enough to the original.
///
/// Unknown (zero) durations never filter. The tolerance is 10 seconds, widened
/// to 15% of the original for long tracks.
pub fn is_duration_close(original_secs: u32, candidate_secs: u32) -> bool {
    if original_secs == 0 || candidate_secs == 0 {
        return true;
    }

    let diff = original_secs.abs_diff(candidate_secs);
    if diff <= DURATION_FLOOR_SECS {
        return true;
    }

    let max_allowed = ((original_secs as f64 * DURATION_RATIO) as u32).max(DURATION_FLOOR_SECS);
    diff <= max_allowed
}

// =============================================================================
// Tests
// =============================================================================
