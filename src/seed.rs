//! Idempotent seeding.

use heck::ToKebabCase;
use quickdata_core::{Payload, QuickDataError, Result, Store, quickdata_trace_op};
use serde_json::Value as Json;

use crate::repository::Repository;

/// One row to seed: just its name, or a full payload carrying the name.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedEntry {
    Name(String),
    Payload(Payload),
}

impl From<&str> for SeedEntry {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for SeedEntry {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Payload> for SeedEntry {
    fn from(payload: Payload) -> Self {
        Self::Payload(payload)
    }
}

impl SeedEntry {
    fn name(&self, name_field: &str) -> Result<String> {
        match self {
            Self::Name(name) => Ok(name.clone()),
            Self::Payload(payload) => match payload.get(name_field) {
                Some(Json::String(name)) => Ok(name.clone()),
                Some(Json::Number(n)) => Ok(n.to_string()),
                _ => Err(QuickDataError::InvalidPayload {
                    field: name_field.to_string(),
                    reason: "seed entries need a name".into(),
                }),
            },
        }
    }
}

/// Creates each entry unless a row already has its lookup value in
/// `where_field`. The lookup value is the name itself when both fields are the
/// same column, otherwise the name's slug. Returns how many rows were created.
///
/// Slugs are heck kebab case: words split at case changes (`iPhone` becomes
/// `i-phone`) and non-ASCII letters are kept (`Café` becomes `café`). Rows
/// slugged by another tool with ASCII folding will not match.
pub fn seed_without_duplicates<S, I>(
    repo: &mut Repository<'_, S>,
    entries: I,
    name_field: &str,
    where_field: &str,
) -> Result<usize>
where
    S: Store,
    I: IntoIterator,
    I::Item: Into<SeedEntry>,
{
    let mut created = 0;
    for entry in entries {
        let entry = entry.into();
        let name = entry.name(name_field)?;
        let lookup = if where_field == name_field {
            name.clone()
        } else {
            name.to_kebab_case()
        };

        if repo.find_by(where_field, lookup.as_str())?.is_some() {
            continue;
        }

        let mut data = match entry {
            SeedEntry::Name(name) => {
                let mut data = Payload::new();
                data.insert(name_field.to_string(), Json::String(name));
                data
            }
            SeedEntry::Payload(data) => data,
        };
        if !data.contains_key(where_field) {
            data.insert(where_field.to_string(), Json::String(lookup));
        }
        repo.create(&data)?;
        created += 1;
    }
    quickdata_trace_op!("seed", entity = repo.entity().name, created = created);
    Ok(created)
}
