use common::{blog, payload, text};
use quickdata::prelude::*;
use serde_json::json;

mod common;

#[test]
fn seeds_names_once_by_slug() {
    let mut data = blog();
    let mut tags = data.repository("tags").unwrap();

    let created = seed_without_duplicates(&mut tags, ["Rust Lang", "Postgres"], "name", "slug").unwrap();
    assert_eq!(created, 2);
    let again = seed_without_duplicates(&mut tags, ["Rust Lang", "Go"], "name", "slug").unwrap();
    assert_eq!(again, 1);

    let all = tags.all(&[]).unwrap();
    let slugs: Vec<String> = all.iter().map(|t| text(t, "slug")).collect();
    assert_eq!(slugs, ["rust-lang", "postgres", "go"]);
}

#[test]
fn seeds_by_name_when_fields_match() {
    let mut data = blog();
    let mut tags = data.repository("tags").unwrap();
    tags.create(&payload(json!({ "name": "Existing" }))).unwrap();

    let created = seed_without_duplicates(&mut tags, ["Existing", "Fresh"], "name", "name").unwrap();
    assert_eq!(created, 1);
    assert!(tags.find_by("name", "Fresh").unwrap().is_some());
    assert!(tags.find_by("slug", "fresh").unwrap().is_none());
}

#[test]
fn payload_entries_keep_their_own_columns() {
    let mut data = blog();
    let mut users = data.repository("users").unwrap();
    let entries = vec![
        SeedEntry::from(payload(json!({ "name": "ann", "email": "ann@example.com" }))),
        SeedEntry::from("bob"),
    ];
    let created = seed_without_duplicates(&mut users, entries, "name", "name").unwrap();
    assert_eq!(created, 2);

    let ann = users.find_by("name", "ann").unwrap().unwrap();
    assert_eq!(text(&ann, "email"), "ann@example.com");
}

#[test]
fn payload_without_a_name_is_rejected() {
    let mut data = blog();
    let mut users = data.repository("users").unwrap();
    let err = seed_without_duplicates(
        &mut users,
        [SeedEntry::from(payload(json!({ "email": "x@example.com" })))],
        "name",
        "name",
    )
    .unwrap_err();
    assert!(matches!(err, QuickDataError::InvalidPayload { .. }));
}

#[test]
fn slugs_keep_accents_and_split_case_changes() {
    let mut data = blog();
    let mut tags = data.repository("tags").unwrap();

    let created = seed_without_duplicates(&mut tags, ["Café Racer", "iPhone"], "name", "slug").unwrap();
    assert_eq!(created, 2);
    assert!(tags.find_by("slug", "café-racer").unwrap().is_some());
    assert!(tags.find_by("slug", "i-phone").unwrap().is_some());

    // an ASCII-folded slug from elsewhere is a different row
    tags.create(&payload(json!({ "name": "Crème", "slug": "creme" })))
        .unwrap();
    let again = seed_without_duplicates(&mut tags, ["Café Racer", "Crème"], "name", "slug").unwrap();
    assert_eq!(again, 1);
    assert!(tags.find_by("slug", "crème").unwrap().is_some());
}
