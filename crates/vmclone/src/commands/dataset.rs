use vmclone_core::DatasetPath;
use vmclone_inventory::Config;
use vmclone_operations::providers::ZfsDatasetStore;
use vmclone_operations::traits::DatasetStore;
use vmclone_operations::{PropertyChange, PropertyChanges};

use super::SetArgs;
use crate::error::{CliError, Result};

pub(crate) fn run_set(args: SetArgs, config: &Config) -> Result<()> {
    let dataset = DatasetPath::new(args.dataset)?;
    let changes = parse_changes(&args.assignments, &args.inherit)?;
    if changes.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    let store = ZfsDatasetStore::with_binary(config.zfs().binary());
    store
        .update_properties(&dataset, &changes)
        .map_err(|source| CliError::PropertyUpdate {
            dataset: dataset.clone(),
            source,
        })?;

    println!("Updated {} properties on {dataset}", changes.len());
    Ok(())
}

/// Builds a change batch in command line order. A later entry for the same
/// property replaces an earlier one.
fn parse_changes(assignments: &[String], inherit: &[String]) -> Result<PropertyChanges> {
    let mut changes = PropertyChanges::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| CliError::InvalidAssignment(assignment.clone()))?;
        changes.insert(name.to_string(), PropertyChange::value(value));
    }
    for name in inherit {
        changes.insert(name.clone(), PropertyChange::inherit());
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn assignments_keep_command_line_order() {
        let changes = parse_changes(&strings(&["quota=10G", "compression=lz4"]), &[])
            .expect("valid assignments");

        let names: Vec<&str> = changes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["quota", "compression"]);
        assert_eq!(changes["quota"].value.as_deref(), Some("10G"));
    }

    #[test]
    fn inherit_entries_follow_assignments() {
        let changes = parse_changes(&strings(&["org:owner=ops"]), &strings(&["atime"]))
            .expect("valid assignments");

        assert!(changes["atime"].inherit);
        assert_eq!(changes.get_index(1).map(|(name, _)| name.as_str()), Some("atime"));
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let changes =
            parse_changes(&strings(&["org:note=a=b"]), &[]).expect("valid assignments");

        assert_eq!(changes["org:note"].value.as_deref(), Some("a=b"));
    }

    #[test]
    fn assignment_without_name_is_rejected() {
        let result = parse_changes(&strings(&["=lz4"]), &[]);

        assert!(matches!(result, Err(CliError::InvalidAssignment(_))));
    }

    #[test]
    fn assignment_without_equals_is_rejected() {
        let result = parse_changes(&strings(&["compression"]), &[]);

        assert!(matches!(result, Err(CliError::InvalidAssignment(a)) if a == "compression"));
    }
}
