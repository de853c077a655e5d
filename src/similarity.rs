// Copyright 2025 Cowboy AI, LLC.

//! Normalized edit-distance ratio and minimum-ratio ranking

use crate::resource::ResourceCandidate;

/// Levenshtein distance divided by the longer length, case-insensitive
///
/// `0.0` means identical, `1.0` means nothing in common. Two empty strings
/// compare as identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    strsim::levenshtein(&a, &b) as f64 / longest as f64
}

/// Candidates sharing the lowest ratio against a span
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidates {
    /// Candidates at the minimum, in scan order
    pub candidates: Vec<ResourceCandidate>,
    /// The minimum ratio they share
    pub ratio: f64,
}

/// Keep the candidates achieving the minimum ratio seen while scanning
///
/// A strictly better candidate clears everything kept so far; ties are
/// appended. With a `ceiling`, scanning starts at that ratio, so nothing worse
/// is ever kept. Candidates repeating an identifier already kept are skipped.
pub fn rank_by_ratio<I>(span: &str, candidates: I, ceiling: Option<f64>) -> Option<RankedCandidates>
where
    I: IntoIterator<Item = ResourceCandidate>,
{
    let mut best = ceiling.unwrap_or(f64::INFINITY);
    let mut kept: Vec<ResourceCandidate> = Vec::new();

    for candidate in candidates {
        let ratio = similarity_ratio(span, &candidate.label);
        if ratio < best {
            best = ratio;
            kept.clear();
            kept.push(candidate);
        } else if ratio == best && !kept.iter().any(|k| k.id == candidate.id) {
            kept.push(candidate);
        }
    }

    if kept.is_empty() {
        None
    } else {
        Some(RankedCandidates {
            candidates: kept,
            ratio: best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use test_case::test_case;

    fn entity(id: &str, label: &str) -> ResourceCandidate {
        ResourceCandidate::new(id, label, ResourceKind::Entity)
    }

    #[test_case("Berlin", "Berlin", 0.0 ; "identical")]
    #[test_case("Berlin", "berlin", 0.0 ; "case insensitive")]
    #[test_case("", "", 0.0 ; "both empty")]
    #[test_case("abc", "", 1.0 ; "one empty")]
    #[test_case("kitten", "sitting", 3.0 / 7.0 ; "classic pair")]
    #[test_case("Douglas", "Douglas Hofstadter", 11.0 / 18.0 ; "prefix")]
    fn test_similarity_ratio(a: &str, b: &str, expected: f64) {
        assert!((similarity_ratio(a, b) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_is_symmetric_and_bounded() {
        let r1 = similarity_ratio("Hofstadter", "Hofstaedter");
        let r2 = similarity_ratio("Hofstaedter", "Hofstadter");
        assert_eq!(r1, r2);
        assert!((0.0..=1.0).contains(&r1));
    }

    #[test]
    fn test_rank_keeps_ties_at_minimum() {
        let ranked = rank_by_ratio(
            "berlin",
            vec![
                entity("e:1", "Berlin"),
                entity("e:2", "Bern"),
                entity("e:3", "berlin"),
            ],
            None,
        )
        .unwrap();

        assert_eq!(ranked.ratio, 0.0);
        let ids: Vec<_> = ranked.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["e:1", "e:3"]);
    }

    #[test]
    fn test_rank_better_candidate_restarts() {
        let ranked = rank_by_ratio(
            "berlin",
            vec![entity("e:2", "Bern"), entity("e:1", "Berlin")],
            None,
        )
        .unwrap();
        assert_eq!(ranked.candidates.len(), 1);
        assert_eq!(ranked.candidates[0].id, "e:1");
    }

    #[test]
    fn test_rank_respects_ceiling() {
        assert!(rank_by_ratio("Douglas", vec![entity("e:1", "Douglas Hofstadter")], Some(0.4)).is_none());
        assert!(rank_by_ratio("Douglas", vec![entity("e:1", "Douglas Hofstadter")], None).is_some());
    }

    #[test]
    fn test_rank_skips_repeated_ids() {
        let ranked = rank_by_ratio(
            "berlin",
            vec![entity("e:1", "Berlin"), entity("e:1", "Berlin")],
            None,
        )
        .unwrap();
        assert_eq!(ranked.candidates.len(), 1);
    }
}
