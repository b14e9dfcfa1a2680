use std::collections::BTreeMap;

use common::{blog, payload, seed_posts, text};
use quickdata::prelude::*;
use quickdata::crud::into_response;
use quickdata::{FieldData, flatten_pivots};
use serde_json::json;

mod common;

#[test]
fn store_validates_before_writing() {
    let mut data = blog();
    let mut crud = data.crud("posts").unwrap();

    let result = crud.store(&payload(json!({ "score": "lots" })));
    let (status, body) = into_response(result);
    assert_eq!(status, 422);
    assert_eq!(
        body,
        json!({
            "result": false,
            "message": "The title field is required. The score must be a number.",
        })
    );
    assert!(crud.index().unwrap().as_array().unwrap().is_empty());
}

#[test]
fn store_creates_and_syncs_nested_input() {
    let mut data = blog();
    let mut crud = data.crud("posts").unwrap();
    let body = crud
        .store(&payload(json!({
            "title": "Hello",
            "comments": [ { "body": "first" } ],
            "tags": [ { "name": "rust" } ],
        })))
        .unwrap();

    assert_eq!(body["title"], json!("Hello"));
    assert_eq!(body["comments"][0]["body"], json!("first"));
    assert_eq!(body["tags"][0]["name"], json!("rust"));
    assert_eq!(body["tags"][0]["pivot"]["post_id"], body["id"]);
}

#[test]
fn update_validates_then_updates() {
    let mut data = blog();
    let ids = seed_posts(&mut data, &["Old"]);
    let mut crud = data.crud("posts").unwrap();

    let too_long = "x".repeat(41);
    let err = crud
        .update(ids[0], &payload(json!({ "title": too_long })))
        .unwrap_err();
    assert!(matches!(
        &err,
        QuickDataError::Validation(messages)
            if messages == &["The title may not be greater than 40 characters.".to_string()]
    ));

    let body = crud
        .update(ids[0], &payload(json!({ "title": "New" })))
        .unwrap();
    assert_eq!(body["title"], json!("New"));

    let (status, _) = into_response(crud.update(77, &payload(json!({ "title": "X" }))));
    assert_eq!(status, 404);
}

#[test]
fn show_and_destroy() {
    let mut data = blog();
    let ids = seed_posts(&mut data, &["Shown"]);
    let mut crud = data.crud("posts").unwrap();

    assert_eq!(crud.show(ids[0]).unwrap()["title"], json!("Shown"));
    assert_eq!(crud.destroy(ids[0]).unwrap(), json!({ "result": true }));
    assert_eq!(crud.show(ids[0]).unwrap(), serde_json::Value::Null);
    assert_eq!(crud.destroy(ids[0]).unwrap(), json!({ "result": true }));
}

#[test]
fn filter_results_restricts_to_searchable_columns() {
    let mut data = blog();
    seed_posts(&mut data, &["Rust tips", "Garden tips", "Rust traps"]);
    {
        let mut repo = data.repository("posts").unwrap();
        let record = repo.find_or_fail(1, &[]).unwrap();
        repo.update(record, &payload(json!({ "slug": "rust-tips" })))
            .unwrap();
    }
    let mut crud = data.crud("posts").unwrap();

    let params = ListParams {
        filter: BTreeMap::from([
            ("title".to_string(), "rust".to_string()),
            ("slug".to_string(), "nothing-matches".to_string()),
        ]),
        count: Some(1),
        ..ListParams::default()
    };
    let page = crud.filter_results(&params, &[]).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.per_page, 1);
    assert_eq!(text(&page.data[0], "title"), "Rust traps");

    let page = crud.filter_results(&ListParams::default(), &[]).unwrap();
    assert_eq!(page.per_page, 20);
    assert_eq!(page.total, 3);
}

#[test]
fn search_reads_list_params() {
    let mut data = blog();
    seed_posts(&mut data, &["Beta", "Alpha", "Gamma", "Alphabet"]);
    let mut crud = data.crud("posts").unwrap();

    let params: ListParams = serde_json::from_value(json!({
        "q": "alpha",
        "sorting": { "title": "asc" },
        "count": 10,
    }))
    .unwrap();
    let result = crud.search(&params, &[]).unwrap();
    let titles: Vec<String> = result.records().iter().map(|r| text(r, "title")).collect();
    assert_eq!(titles, ["Alpha", "Alphabet"]);
    assert_eq!(result.as_page().unwrap().per_page, 10);

    let bad = ListParams {
        sorting: BTreeMap::from([("title".to_string(), "sideways".to_string())]),
        ..ListParams::default()
    };
    assert!(matches!(
        crud.search(&bad, &[]).unwrap_err(),
        QuickDataError::InvalidArgument(_)
    ));
}

#[test]
fn append_default_values_names_and_marks_fields() {
    let mut data = blog();
    let crud = data.crud("posts").unwrap();
    let fields = crud.append_default_values(vec![
        FieldData::new("title"),
        FieldData {
            field: "author_id".into(),
            name: Some("Writer".into()),
            searchable: false,
        },
        FieldData::new("created_at"),
    ]);

    assert_eq!(fields[0].name.as_deref(), Some("Title"));
    assert!(fields[0].searchable);
    assert_eq!(fields[1].name.as_deref(), Some("Writer"));
    assert!(!fields[1].searchable);
    assert_eq!(fields[2].name.as_deref(), Some("Created At"));
}

#[test]
fn flattened_store_response_lifts_pivot_columns() {
    let mut data = blog();
    let tag = data
        .repository("tags")
        .unwrap()
        .create(&payload(json!({ "name": "rust" })))
        .unwrap()
        .id()
        .unwrap();
    let mut crud = data.crud("posts").unwrap();
    let body = crud
        .store(&payload(json!({
            "title": "Pinned",
            "tags": [ { "id": tag, "sort_order": 3 } ],
        })))
        .unwrap();

    let flat = flatten_pivots(&body);
    assert_eq!(flat["tags"][0]["sort_order"], json!(3));
    assert!(flat["tags"][0].get("pivot").is_none());
    assert!(flat["tags"][0].get("post_id").is_none());
}
