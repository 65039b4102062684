//! Organisations visible to an authenticated user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: i64,
    pub name: String,
    pub country: String,
}

/// Header tile figures for the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectorySummary {
    pub countries: usize,
    pub institutions: usize,
}

/// Read-only organisation listing produced by a successful login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationDirectory {
    organisations: Vec<Organisation>,
}

impl OrganisationDirectory {
    pub fn new(organisations: Vec<Organisation>) -> Self {
        Self { organisations }
    }

    pub fn organisations(&self) -> &[Organisation] {
        &self.organisations
    }

    pub fn id_for_name(&self, name: &str) -> Option<i64> {
        self.organisations
            .iter()
            .find(|org| org.name == name)
            .map(|org| org.id)
    }

    /// Ids of the named organisations; unknown names are logged and skipped
    pub fn ids_for_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<i64> {
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let id = self.id_for_name(name);
                if id.is_none() {
                    warn!(organisation = %name, "Unknown organisation name ignored");
                }
                id
            })
            .collect()
    }

    pub fn summary(&self) -> DirectorySummary {
        let countries = self
            .organisations
            .iter()
            .map(|org| org.country.as_str())
            .collect::<BTreeSet<_>>();
        DirectorySummary {
            countries: countries.len(),
            institutions: self.organisations.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.organisations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organisations.is_empty()
    }
}
