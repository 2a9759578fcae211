//! Collision-free name allocation.
//!
//! Names produced here follow the `<prefix><tag><index>` shape, e.g.
//! `vm1_clone0`. Re-allocating from a name that already carries a suffix
//! replaces the suffix instead of stacking a second one.

use std::collections::HashSet;

/// Suffix tag appended to cloned entity, snapshot and dataset names.
pub const CLONE_SUFFIX: &str = "_clone";

/// Splits `name` into its prefix and numeric index if it ends with
/// `<tag><digits>`. The index is `None` when the digits overflow a `u64`.
fn split_suffix<'a>(name: &'a str, tag: &str) -> Option<(&'a str, Option<u64>)> {
    if tag.is_empty() {
        return None;
    }
    let pos = name.rfind(tag)?;
    let digits = &name[pos + tag.len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&name[..pos], digits.parse().ok()))
}

/// Returns a name absent from `existing`, derived from `base`.
///
/// If `base` already ends in `<tag><n>` the suffix is replaced and the search
/// starts at `n + 1`; otherwise the search starts at index 0.
#[must_use]
pub fn allocate(base: &str, tag: &str, existing: &HashSet<String>) -> String {
    let (prefix, mut index) = match split_suffix(base, tag) {
        Some((prefix, n)) => (prefix, n.and_then(|n| n.checked_add(1)).unwrap_or(0)),
        None => (base, 0),
    };

    loop {
        let candidate = format!("{prefix}{tag}{index}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        index = index.wrapping_add(1);
    }
}

/// Returns `seed` verbatim when it is free, otherwise falls back to
/// [`allocate`].
#[must_use]
pub fn allocate_seeded(seed: &str, tag: &str, existing: &HashSet<String>) -> String {
    if existing.contains(seed) {
        allocate(seed, tag, existing)
    } else {
        seed.to_string()
    }
}

/// The set of names `<prefix><tag><digits>` sharing one clone prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneNameFamily {
    prefix: String,
    tag: String,
}

impl CloneNameFamily {
    /// Family of clone names derived from `name`, which may itself be a clone.
    #[must_use]
    pub fn of(name: &str, tag: &str) -> Self {
        let prefix = split_suffix(name, tag).map_or(name, |(prefix, _)| prefix);
        Self {
            prefix: prefix.to_string(),
            tag: tag.to_string(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        split_suffix(candidate, &self.tag).is_some_and(|(prefix, _)| prefix == self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn unsuffixed_base_starts_at_zero() {
        assert_eq!(allocate("vm1", CLONE_SUFFIX, &set(&[])), "vm1_clone0");
    }

    #[test]
    fn skips_taken_indices() {
        let existing = set(&["vm1_clone0", "vm1_clone1"]);
        assert_eq!(allocate("vm1", CLONE_SUFFIX, &existing), "vm1_clone2");
    }

    #[test]
    fn replaces_existing_suffix_instead_of_stacking() {
        let existing = set(&["foo_clone3"]);
        let name = allocate("foo_clone3", CLONE_SUFFIX, &existing);

        assert_eq!(name, "foo_clone4");
        assert_ne!(name, "foo_clone3_clone0");
    }

    #[test]
    fn suffix_detection_needs_digits() {
        assert_eq!(
            allocate("foo_clone", CLONE_SUFFIX, &set(&[])),
            "foo_clone_clone0"
        );
        assert_eq!(
            allocate("foo_clonex1", CLONE_SUFFIX, &set(&[])),
            "foo_clonex1_clone0"
        );
    }

    #[test]
    fn oversized_suffix_is_replaced_not_stacked() {
        let base = "foo_clone18446744073709551616";
        let name = allocate(base, CLONE_SUFFIX, &set(&[base]));

        assert_eq!(name, "foo_clone0");
        assert!(CloneNameFamily::of(base, CLONE_SUFFIX).matches(&name));
    }

    #[test]
    fn max_index_wraps_to_zero() {
        let base = format!("foo_clone{}", u64::MAX);
        let name = allocate(&base, CLONE_SUFFIX, &set(&[base.as_str()]));

        assert_eq!(name, "foo_clone0");
    }

    #[test]
    fn last_suffix_wins_for_nested_names() {
        let existing = set(&["a_clone1_clone2"]);
        assert_eq!(
            allocate("a_clone1_clone2", CLONE_SUFFIX, &existing),
            "a_clone1_clone3"
        );
    }

    #[test]
    fn seeded_allocation_keeps_free_seed() {
        assert_eq!(allocate_seeded("myvm", CLONE_SUFFIX, &set(&[])), "myvm");
    }

    #[test]
    fn seeded_allocation_falls_back_when_taken() {
        let existing = set(&["myvm", "myvm_clone0"]);
        assert_eq!(
            allocate_seeded("myvm", CLONE_SUFFIX, &existing),
            "myvm_clone1"
        );
    }

    #[test]
    fn family_matches_suffixed_siblings_only() {
        let family = CloneNameFamily::of("vm1_clone4", CLONE_SUFFIX);

        assert_eq!(family.prefix(), "vm1");
        assert!(family.matches("vm1_clone0"));
        assert!(family.matches("vm1_clone12"));
        assert!(!family.matches("vm1"));
        assert!(!family.matches("vm10_clone0"));
        assert!(!family.matches("vm1_clone0_clone1"));
    }

    proptest! {
        #[test]
        fn allocated_name_is_never_taken(
            base in "[a-z]{1,6}(_clone[0-9]{1,2})?",
            taken in proptest::collection::vec(0u64..40, 0..40),
        ) {
            let prefix = CloneNameFamily::of(&base, CLONE_SUFFIX).prefix().to_string();
            let mut existing: HashSet<String> = taken
                .iter()
                .map(|i| format!("{prefix}{CLONE_SUFFIX}{i}"))
                .collect();
            existing.insert(base.clone());

            let name = allocate(&base, CLONE_SUFFIX, &existing);

            prop_assert!(!existing.contains(&name));
            prop_assert!(name.starts_with(&prefix));
            prop_assert_eq!(name.matches(CLONE_SUFFIX).count(), prefix.matches(CLONE_SUFFIX).count() + 1);
        }
    }
}
