//! API diff between the previous and current context of an application.

use serde::{Deserialize, Serialize};

use rollout_core::{Api, ApiName, Context};

/// Classification of APIs across two contexts.
///
/// Every API name in either context lands in exactly one list. Lists are
/// ordered by API name for reproducible output; only membership carries meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDiff {
    /// In `current` only.
    pub created: Vec<Api>,
    /// In both, with a different definition or compute identity.
    pub updated: Vec<Api>,
    /// In `previous` only.
    pub deleted: Vec<Api>,
    /// In both, identical.
    pub unchanged: Vec<ApiName>,
}

impl ApiDiff {
    /// No API is created, updated, or deleted.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Names of APIs that will be (re)started: created, then updated.
    pub fn updating_apis(&self) -> Vec<ApiName> {
        self.created
            .iter()
            .chain(&self.updated)
            .map(|api| api.name.clone())
            .collect()
    }
}

/// Partition `current`'s APIs against `previous`.
///
/// Name-keyed lookups keep this linear in the two API counts.
pub fn diff(previous: Option<&Context>, current: &Context) -> ApiDiff {
    let mut out = ApiDiff::default();

    let Some(previous) = previous else {
        out.created = current.apis.values().cloned().collect();
        return out;
    };

    for (name, api) in &current.apis {
        match previous.apis.get(name) {
            None => out.created.push(api.clone()),
            Some(prev) if !api.matches(prev) => out.updated.push(api.clone()),
            Some(_) => out.unchanged.push(name.clone()),
        }
    }

    out.deleted = previous
        .apis
        .iter()
        .filter(|(name, _)| !current.apis.contains_key(*name))
        .map(|(_, api)| api.clone())
        .collect();

    out
}
