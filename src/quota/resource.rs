use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource types a subscription plan can cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Clinics,
    Patients,
    Staff,
    Appointments,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Clinics,
        ResourceType::Patients,
        ResourceType::Staff,
        ResourceType::Appointments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Clinics => "Clinics",
            ResourceType::Patients => "Patients",
            ResourceType::Staff => "Staff",
            ResourceType::Appointments => "Appointments",
        }
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource type: {}", s))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route prefix to the resource type its creations count against.
pub const RESOURCE_PATHS: &[(&str, ResourceType)] = &[
    ("/api/clinics", ResourceType::Clinics),
    ("/api/patients", ResourceType::Patients),
    ("/api/staff", ResourceType::Staff),
    ("/api/appointments", ResourceType::Appointments),
];

/// Never subject to quota checks.
pub const DEFAULT_EXEMPT_PREFIXES: &[&str] = &["/api/auth", "/api/subscriptions", "/api/packages"];

/// Whole-segment prefix match: `/api/patients` matches `/api/patients` and
/// `/api/patients/42` but not `/api/patientsearch`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn resource_for_path(path: &str) -> Option<ResourceType> {
    RESOURCE_PATHS
        .iter()
        .find(|(prefix, _)| path_has_prefix(path, prefix))
        .map(|(_, resource)| *resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_collection_and_item_paths() {
        assert_eq!(resource_for_path("/api/patients"), Some(ResourceType::Patients));
        assert_eq!(resource_for_path("/api/patients/"), Some(ResourceType::Patients));
        assert_eq!(
            resource_for_path("/api/appointments/3f0c2c1e"),
            Some(ResourceType::Appointments)
        );
        assert_eq!(resource_for_path("/api/clinics"), Some(ResourceType::Clinics));
    }

    #[test]
    fn ignores_partial_segments_and_unmapped_paths() {
        assert_eq!(resource_for_path("/api/patientsearch"), None);
        assert_eq!(resource_for_path("/api/invoices"), None);
        assert_eq!(resource_for_path("/patients"), None);
    }

    #[test]
    fn exempt_prefixes_match_by_segment() {
        assert!(path_has_prefix("/api/auth/login", "/api/auth"));
        assert!(path_has_prefix("/api/auth", "/api/auth/"));
        assert!(!path_has_prefix("/api/authors", "/api/auth"));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("patients".parse::<ResourceType>(), Ok(ResourceType::Patients));
        assert!("beds".parse::<ResourceType>().is_err());
    }
}
