//! Common types used across CLI modules

use crate::error::{ExecError, Result};

/// How the user chose the endpoints to run on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// Explicit endpoint IDs
    ClientIds(Vec<String>),
    /// Exact endpoint names, each must match a single endpoint
    Names(Vec<String>),
    /// Search terms, every matching endpoint is targeted
    Search(Vec<String>),
    /// Endpoint group IDs, expanded by the server
    GroupIds(Vec<String>),
}

/// Endpoints and groups a submission is sent to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTargets {
    pub client_ids: Vec<String>,
    pub group_ids: Vec<String>,
}

impl TargetSelector {
    /// Build a selector from the raw comma-separated targeting flags
    ///
    /// Exactly one flag may be non-empty.
    pub fn from_flags(ids: &str, names: &str, search: &str, groups: &str) -> Result<Self> {
        let (ids, names, search, groups) = (
            split_list(ids),
            split_list(names),
            split_list(search),
            split_list(groups),
        );

        let given: Vec<&str> = [
            ("--ids", &ids),
            ("--names", &names),
            ("--search", &search),
            ("--groups", &groups),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(flag, _)| flag)
        .collect();

        if given.len() > 1 {
            return Err(ExecError::MultipleTargeting(given.join(", ")));
        }

        if !ids.is_empty() {
            Ok(TargetSelector::ClientIds(ids))
        } else if !names.is_empty() {
            Ok(TargetSelector::Names(names))
        } else if !search.is_empty() {
            Ok(TargetSelector::Search(search))
        } else if !groups.is_empty() {
            Ok(TargetSelector::GroupIds(groups))
        } else {
            Err(ExecError::NoTargets)
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_single_flag_selects_mode() {
        assert_eq!(
            TargetSelector::from_flags("1,2", "", "", "").unwrap(),
            TargetSelector::ClientIds(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(
            TargetSelector::from_flags("", "", "web", "").unwrap(),
            TargetSelector::Search(vec!["web".to_string()])
        );
        assert_eq!(
            TargetSelector::from_flags("", "", "", "g1").unwrap(),
            TargetSelector::GroupIds(vec!["g1".to_string()])
        );
    }

    #[test]
    fn test_multiple_flags_rejected() {
        let err = TargetSelector::from_flags("1", "db", "", "").unwrap_err();
        assert!(err.to_string().contains("multiple targeting options"));
        assert!(err.to_string().contains("--ids, --names"));
    }

    #[test]
    fn test_no_flags_rejected() {
        assert!(matches!(
            TargetSelector::from_flags("", " ", "", ""),
            Err(ExecError::NoTargets)
        ));
    }
}
