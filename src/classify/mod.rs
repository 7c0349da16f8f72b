//! Pattern classification.
//!
//! Each sharing group is checked against every enabled catalog kind; the
//! matching kinds are ranked by the configured priority and the best one
//! becomes the group's PatternMatch. A genuine rank tie is reported as
//! ambiguous for manual review, never auto-picked.

pub mod signature;

use crate::config::CatalogConfig;
use crate::core::types::{AmbiguousGroup, PatternKind, PatternMatch, SharingGroup};

/// Classifier output for one unit
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub matches: Vec<PatternMatch>,
    pub ambiguous: Vec<AmbiguousGroup>,
    /// Groups matching no signature; kept for the group partition invariant
    pub unmatched: Vec<SharingGroup>,
}

pub fn classify_groups(groups: Vec<SharingGroup>, catalog: &CatalogConfig) -> Classification {
    let mut out = Classification::default();

    for group in groups {
        let mut candidates: Vec<PatternKind> = PatternKind::ALL
            .into_iter()
            .filter(|kind| catalog.is_enabled(*kind))
            .filter(|kind| signature::matches_kind(&group, *kind))
            .collect();
        candidates.sort_by_key(|kind| catalog.rank(*kind));

        match candidates.len() {
            0 => out.unmatched.push(group),
            1 => out.matches.push(PatternMatch {
                kind: candidates[0],
                candidates,
                group,
            }),
            _ => {
                // the default priority is a total order; a tie can only come
                // from a configuration override, and is never resolved here
                if catalog.rank(candidates[0]) == catalog.rank(candidates[1]) {
                    let err = crate::core::Error::ClassificationAmbiguous {
                        group_id: group.id,
                        first: candidates[0],
                        second: candidates[1],
                    };
                    log::warn!("{err}");
                    out.ambiguous.push(AmbiguousGroup {
                        tied: (candidates[0], candidates[1]),
                        group,
                    });
                } else {
                    out.matches.push(PatternMatch {
                        kind: candidates[0],
                        candidates,
                        group,
                    });
                }
            }
        }
    }

    out
}
