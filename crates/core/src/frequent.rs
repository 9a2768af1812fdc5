//! Frequently-used tag aggregation.
//!
//! Folds the tag groupings of a user's recent posts into per-class use
//! counts and keeps the top N of each class.

use std::collections::BTreeMap;

use crate::classes::CLASS_MISC;
use crate::tag::TagGroups;

/// Result size per class.
const TOP_N: usize = 10;

/// The `misc` class is wider in practice and gets a larger window.
const TOP_N_MISC: usize = 25;

/// Aggregate the groupings of many posts into the caller's most-used tags.
///
/// Within each class, tags are ordered by descending use count, ties broken
/// alphabetically, and truncated to the class's window.
pub fn most_used<I>(posts: I) -> TagGroups
where
    I: IntoIterator<Item = TagGroups>,
{
    let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for groups in posts {
        for (class, tags) in groups.0 {
            let class_counts = counts.entry(class).or_default();
            for tag in tags {
                *class_counts.entry(tag).or_insert(0) += 1;
            }
        }
    }

    let mut result = BTreeMap::new();
    for (class, class_counts) in counts {
        let limit = if class == CLASS_MISC { TOP_N_MISC } else { TOP_N };
        let mut ranked: Vec<(String, usize)> = class_counts.into_iter().collect();
        ranked.sort_by(|(a_tag, a_count), (b_tag, b_count)| {
            b_count.cmp(a_count).then_with(|| a_tag.cmp(b_tag))
        });
        ranked.truncate(limit);
        result.insert(class, ranked.into_iter().map(|(tag, _)| tag).collect());
    }
    TagGroups(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(pairs: &[(&str, &[&str])]) -> TagGroups {
        TagGroups(
            pairs
                .iter()
                .map(|(class, tags)| {
                    (class.to_string(), tags.iter().map(|t| t.to_string()).collect())
                })
                .collect(),
        )
    }

    #[test]
    fn counts_across_posts_rank_descending() {
        let posts = vec![
            groups(&[("misc", &["fox", "forest"])]),
            groups(&[("misc", &["fox"])]),
            groups(&[("misc", &["fox", "river"])]),
        ];
        let used = most_used(posts);
        assert_eq!(used.0["misc"], vec!["fox", "forest", "river"]);
    }

    #[test]
    fn ties_break_alphabetically() {
        let posts = vec![groups(&[("species", &["wolf", "fox"])])];
        let used = most_used(posts);
        assert_eq!(used.0["species"], vec!["fox", "wolf"]);
    }

    #[test]
    fn misc_keeps_twenty_five_others_ten() {
        let misc_tags: Vec<String> = (0..40).map(|i| format!("m{i:02}")).collect();
        let species_tags: Vec<String> = (0..20).map(|i| format!("s{i:02}")).collect();
        let posts = vec![TagGroups(
            [
                ("misc".to_string(), misc_tags),
                ("species".to_string(), species_tags),
            ]
            .into_iter()
            .collect(),
        )];

        let used = most_used(posts);
        assert_eq!(used.0["misc"].len(), 25);
        assert_eq!(used.0["species"].len(), 10);
    }

    #[test]
    fn empty_input_yields_empty_groups() {
        assert!(most_used(Vec::new()).0.is_empty());
    }
}
