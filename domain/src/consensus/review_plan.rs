//! Round-robin reviewer assignment for Phase 2

use crate::core::provider::ProviderId;

/// One draft and the provider assigned to review it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewAssignment {
    pub author: ProviderId,
    pub reviewer: ProviderId,
}

/// Assign a reviewer to every surviving draft.
///
/// Draft `i` (in survivor order) is reviewed by survivor `(i + 1) mod k`.
/// With a single survivor the next provider after it in `roster` is used
/// instead. A provider never reviews its own draft; drafts for which no
/// other provider exists get no assignment.
pub fn assign_reviewers(survivors: &[ProviderId], roster: &[ProviderId]) -> Vec<ReviewAssignment> {
    match survivors.len() {
        0 => Vec::new(),
        1 => {
            let author = &survivors[0];
            let start = roster.iter().position(|p| p == author).unwrap_or(0);
            roster
                .iter()
                .cycle()
                .skip(start + 1)
                .take(roster.len())
                .find(|p| *p != author)
                .map(|reviewer| {
                    vec![ReviewAssignment {
                        author: author.clone(),
                        reviewer: reviewer.clone(),
                    }]
                })
                .unwrap_or_default()
        }
        k => survivors
            .iter()
            .enumerate()
            .map(|(i, author)| ReviewAssignment {
                author: author.clone(),
                reviewer: survivors[(i + 1) % k].clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ProviderId> {
        names.iter().map(|n| ProviderId::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_round_robin_over_survivors() {
        let survivors = ids(&["a", "b", "c"]);
        let plan = assign_reviewers(&survivors, &ids(&["a", "b", "c", "d"]));
        let pairs: Vec<_> = plan
            .iter()
            .map(|a| (a.author.as_str(), a.reviewer.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "b"), ("b", "c"), ("c", "a")]);
    }

    #[test]
    fn test_no_self_review() {
        for n in 2..6 {
            let names: Vec<String> = (0..n).map(|i| format!("p{}", i)).collect();
            let survivors: Vec<ProviderId> =
                names.iter().map(|s| ProviderId::new(s.as_str()).unwrap()).collect();
            for assignment in assign_reviewers(&survivors, &survivors) {
                assert_ne!(assignment.author, assignment.reviewer);
            }
        }
    }

    #[test]
    fn test_single_survivor_uses_next_roster_provider() {
        let plan = assign_reviewers(&ids(&["c"]), &ids(&["a", "b", "c"]));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].reviewer.as_str(), "a");
    }

    #[test]
    fn test_single_provider_roster_gets_no_review() {
        assert!(assign_reviewers(&ids(&["a"]), &ids(&["a"])).is_empty());
        assert!(assign_reviewers(&[], &ids(&["a"])).is_empty());
    }
}
