//! Controller-style CRUD over JSON payloads.
//!
//! No HTTP here: operations take decoded input and return JSON bodies, and
//! [`into_response`] pairs a result with the status code a web
//! layer would send.

use std::collections::BTreeMap;

use heck::ToTitleCase;
use quickdata_core::{
    Direction, Page, Payload, QuickDataError, Record, Result, Rule, SearchFilter, SearchResult,
    Store,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use thiserror::Error;

use crate::repository::Repository;

/// Listing parameters as they arrive in a query string:
/// `filter[name]=rog&count=10&page=2&sorting[name]=asc&q=london`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub filter: BTreeMap<String, String>,
    pub count: Option<u32>,
    pub page: Option<u32>,
    pub sorting: BTreeMap<String, String>,
    pub q: Option<String>,
}

/// Input rejected by the entity's field rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .messages.join(" "))]
pub struct ValidationFailure {
    pub messages: Vec<String>,
}

impl ValidationFailure {
    pub const STATUS: u16 = 422;

    pub fn to_response(&self) -> Json {
        json!({
            "result": false,
            "message": self.messages.join(" "),
        })
    }
}

impl From<ValidationFailure> for QuickDataError {
    fn from(failure: ValidationFailure) -> Self {
        QuickDataError::Validation(failure.messages)
    }
}

/// One column of a listing's display schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldData {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub searchable: bool,
}

impl FieldData {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }
}

fn display_field(field: &str) -> String {
    field.replace('_', " ")
}

fn is_blank(value: Option<&Json>) -> bool {
    match value {
        None | Some(Json::Null) => true,
        Some(Json::String(s)) => s.trim().is_empty(),
        Some(Json::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn is_numeric(value: &Json) -> bool {
    match value {
        Json::Number(_) => true,
        Json::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

/// Checks `input` against field rules, collecting one message per failed
/// rule. Absent optional fields are not checked further.
pub fn validate(rules: &[(String, Vec<Rule>)], input: &Payload) -> std::result::Result<(), ValidationFailure> {
    let mut messages = Vec::new();
    for (field, field_rules) in rules {
        let value = input.get(field);
        let label = display_field(field);
        if is_blank(value) {
            if field_rules.contains(&Rule::Required) {
                messages.push(format!("The {label} field is required."));
            }
            continue;
        }
        let Some(value) = value else { continue };
        for rule in field_rules {
            match rule {
                Rule::Required => {}
                Rule::Numeric if !is_numeric(value) => {
                    messages.push(format!("The {label} must be a number."));
                }
                Rule::MaxLength(max) => {
                    if let Json::String(s) = value
                        && s.chars().count() > *max
                    {
                        messages.push(format!(
                            "The {label} may not be greater than {max} characters."
                        ));
                    }
                }
                Rule::Numeric => {}
            }
        }
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure { messages })
    }
}

/// Lifts `pivot` values into the object that holds them, at every depth.
/// Pivot keys naming a foreign key (containing `_id`) are dropped.
pub fn flatten_pivots(json: &Json) -> Json {
    match json {
        Json::Object(object) => {
            let mut flat = serde_json::Map::new();
            for (key, value) in object {
                match value {
                    Json::Object(pivot) if key == "pivot" => {
                        for (pivot_key, pivot_value) in pivot {
                            if !pivot_key.contains("_id") {
                                flat.insert(pivot_key.clone(), pivot_value.clone());
                            }
                        }
                    }
                    Json::Object(_) | Json::Array(_) => {
                        flat.insert(key.clone(), flatten_pivots(value));
                    }
                    _ => {
                        flat.insert(key.clone(), value.clone());
                    }
                }
            }
            Json::Object(flat)
        }
        Json::Array(items) => Json::Array(items.iter().map(flatten_pivots).collect()),
        other => other.clone(),
    }
}

fn records_json(records: &[Record]) -> Json {
    Json::Array(records.iter().map(Record::to_json).collect())
}

/// CRUD endpoints for one entity.
pub struct JsonCrud<'a, S: Store> {
    repo: Repository<'a, S>,
}

impl<'a, S: Store> JsonCrud<'a, S> {
    pub fn new(repo: Repository<'a, S>) -> Self {
        Self { repo }
    }

    pub fn repository(&mut self) -> &mut Repository<'a, S> {
        &mut self.repo
    }

    pub fn index(&mut self) -> Result<Json> {
        Ok(records_json(&self.repo.all(&[])?))
    }

    /// Legacy listing: `filter` entries on searchable columns are matched as
    /// substrings, `count` sets the page size.
    pub fn filter_results(&mut self, params: &ListParams, relations: &[&str]) -> Result<Page<Record>> {
        let searchable = &self.repo.entity().searchable;
        let filters: Vec<(&str, &str)> = params
            .filter
            .iter()
            .filter(|(column, _)| searchable.contains(column))
            .map(|(column, needle)| (column.as_str(), needle.as_str()))
            .collect();
        let per_page = params
            .count
            .filter(|count| *count > 0)
            .unwrap_or(self.repo.settings().per_page);
        let page = params.page.unwrap_or(1).max(1);
        self.repo.paginate(per_page, page, relations, &filters, &[])
    }

    /// Turns listing parameters into a [`SearchFilter`] and runs it.
    pub fn search(&mut self, params: &ListParams, relations: &[&str]) -> Result<SearchResult> {
        let filter = self.list_filter(params)?;
        self.repo.search(relations, Some(filter))
    }

    fn list_filter(&self, params: &ListParams) -> Result<SearchFilter> {
        let searchable = &self.repo.entity().searchable;
        let mut filter = SearchFilter::new();
        for (column, needle) in &params.filter {
            if searchable.contains(column) {
                filter = filter.where_op(column.as_str(), "LIKE", format!("%{needle}%"))?;
            }
        }
        if let Some(count) = params.count.filter(|count| *count > 0) {
            filter = filter.set_per_page(count)?;
        }
        if let Some(page) = params.page {
            filter = filter.set_page(page);
        }
        if !params.sorting.is_empty() {
            let orders = params
                .sorting
                .iter()
                .map(|(column, direction)| Ok((column.as_str(), direction.parse::<Direction>()?)))
                .collect::<Result<Vec<_>>>()?;
            filter = filter.order_by(orders);
        }
        if let Some(q) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
            filter = filter.set_search_query(q);
        }
        Ok(filter)
    }

    pub fn store(&mut self, input: &Payload) -> Result<Json> {
        validate(&self.repo.entity().rules, input)?;
        Ok(self.repo.store_or_update(None, input)?.to_json())
    }

    pub fn update(&mut self, id: i64, input: &Payload) -> Result<Json> {
        validate(&self.repo.entity().rules, input)?;
        Ok(self.repo.store_or_update(Some(id), input)?.to_json())
    }

    /// The record as JSON, or `null` when there is none.
    pub fn show(&mut self, id: i64) -> Result<Json> {
        Ok(self
            .repo
            .find(id, &[])?
            .map_or(Json::Null, |record| record.to_json()))
    }

    pub fn destroy(&mut self, id: i64) -> Result<Json> {
        Ok(json!({ "result": self.repo.delete(id)? }))
    }

    /// Fills in display names and marks the fields the entity searches on.
    pub fn append_default_values(&self, fields: Vec<FieldData>) -> Vec<FieldData> {
        let searchable = &self.repo.entity().searchable;
        fields
            .into_iter()
            .map(|mut data| {
                if data.name.as_deref().is_none_or(|name| name.trim().is_empty()) {
                    data.name = Some(data.field.to_title_case());
                }
                if searchable.contains(&data.field) {
                    data.searchable = true;
                }
                data
            })
            .collect()
    }
}

/// Status code and body a web layer would send for an operation's outcome.
pub fn into_response(result: Result<Json>) -> (u16, Json) {
    match result {
        Ok(body) => (200, body),
        Err(QuickDataError::Validation(messages)) => {
            let failure = ValidationFailure { messages };
            (ValidationFailure::STATUS, failure.to_response())
        }
        Err(err) => {
            let status = match &err {
                QuickDataError::NotFound { .. } => 404,
                QuickDataError::PermissionDenied => 403,
                QuickDataError::Unauthenticated => 401,
                QuickDataError::InvalidArgument(_)
                | QuickDataError::InvalidPredicate { .. }
                | QuickDataError::InvalidPayload { .. } => 400,
                _ => 500,
            };
            (status, json!({ "result": false, "message": err.to_string() }))
        }
    }
}
