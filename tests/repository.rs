use std::cell::RefCell;

use common::{blog, payload, seed_posts, text};
use quickdata::prelude::*;
use quickdata_core::Payload;
use serde_json::json;

mod common;

#[test]
fn find_or_create_without_id_creates() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();

    let created = repo
        .find_or_create(None, &payload(json!({ "title": "First", "ignored": "x" })))
        .unwrap();
    let id = created.id().unwrap();
    assert_eq!(text(&created, "title"), "First");
    assert!(created.get("ignored").is_none());

    let found = repo.find(id, &[]).unwrap().unwrap();
    assert_eq!(found.attributes, created.attributes);
}

#[test]
fn find_or_create_with_id_updates_in_place() {
    let mut data = blog();
    let ids = seed_posts(&mut data, &["Draft"]);
    let mut repo = data.repository("posts").unwrap();

    let updated = repo
        .find_or_create(Some(ids[0]), &payload(json!({ "title": "Final", "score": 4 })))
        .unwrap();
    assert_eq!(updated.id(), Some(ids[0]));
    assert_eq!(text(&updated, "title"), "Final");

    let all = repo.all(&[]).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get("score"), Some(&Value::from(4)));
}

#[test]
fn find_or_create_with_missing_id_is_not_found() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();
    let err = repo
        .find_or_create(Some(42), &payload(json!({ "title": "Nope" })))
        .unwrap_err();
    assert!(matches!(err, QuickDataError::NotFound { .. }));
    assert!(repo.all(&[]).unwrap().is_empty());
}

#[test]
fn delete_is_idempotent() {
    let mut data = blog();
    let ids = seed_posts(&mut data, &["Doomed"]);
    let mut repo = data.repository("posts").unwrap();

    assert!(repo.delete(ids[0]).unwrap());
    assert!(repo.delete(ids[0]).unwrap());
    assert!(repo.delete(999).unwrap());
    assert!(repo.find(ids[0], &[]).unwrap().is_none());
}

#[test]
fn find_or_fail_and_lookups() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();
    repo.create(&payload(json!({
        "title": "Hello",
        "uuid": "3f1c",
        "slug": "hello-world",
    })))
    .unwrap();

    assert!(matches!(
        repo.find_or_fail(7, &[]).unwrap_err(),
        QuickDataError::NotFound { .. }
    ));
    assert_eq!(text(&repo.find_by_uuid("3f1c").unwrap().unwrap(), "title"), "Hello");
    assert_eq!(
        text(&repo.find_by_slug("hello-world", "slug").unwrap().unwrap(), "title"),
        "Hello"
    );
    assert!(repo.find_by_uuid("nope").unwrap().is_none());
}

#[test]
fn save_persists_record_changes() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();
    let mut record = repo.new_record();
    record.set("title", "Unsaved");
    repo.save(&mut record).unwrap();
    let id = record.id().unwrap();

    record.set("title", "Saved again");
    repo.save(&mut record).unwrap();
    assert_eq!(text(&repo.find_or_fail(id, &[]).unwrap(), "title"), "Saved again");
}

#[test]
fn update_replaces_fillable_columns_only() {
    let mut data = blog();
    let ids = seed_posts(&mut data, &["Before"]);
    let mut repo = data.repository("posts").unwrap();
    let record = repo.find_or_fail(ids[0], &[]).unwrap();

    let updated = repo
        .update(record, &payload(json!({ "title": "After", "id": 99, "secret": true })))
        .unwrap();
    assert_eq!(updated.id(), Some(ids[0]));
    assert!(updated.get("secret").is_none());
}

#[test]
fn nested_objects_in_fillable_columns_are_rejected() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();
    let err = repo
        .create(&payload(json!({ "title": { "en": "Hi" } })))
        .unwrap_err();
    assert!(matches!(err, QuickDataError::InvalidPayload { .. }));
}

#[test]
fn all_as_list_pairs_id_and_name() {
    let mut data = blog();
    let mut tags = data.repository("tags").unwrap();
    tags.create(&payload(json!({ "name": "rust" }))).unwrap();
    tags.create(&payload(json!({ "name": "sqlite" }))).unwrap();

    let list = tags.all_as_list().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].value, Value::from(1));
    assert_eq!(list[0].name, Value::from("rust"));
    assert_eq!(
        serde_json::to_value(&list[1]).unwrap(),
        json!({ "value": 2, "name": "sqlite" })
    );
}

#[test]
fn paginate_ands_filters_ors_or_filters_and_orders_newest_first() {
    let mut data = blog();
    seed_posts(
        &mut data,
        &["Rust tips", "Rust traps", "Garden tips", "Cooking", "Rusty tools"],
    );
    let mut repo = data.repository("posts").unwrap();

    let page = repo
        .paginate(2, 1, &[], &[("title", "rust")], &[("title", "tips"), ("title", "tools")])
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.last_page, 1);
    let titles: Vec<String> = page.data.iter().map(|r| text(r, "title")).collect();
    assert_eq!(titles, ["Rusty tools", "Rust tips"]);

    let second = repo.paginate(2, 2, &[], &[], &[]).unwrap();
    assert_eq!(second.total, 5);
    assert_eq!(second.current_page, 2);
    let titles: Vec<String> = second.data.iter().map(|r| text(r, "title")).collect();
    assert_eq!(titles, ["Garden tips", "Rust traps"]);
}

#[test]
fn paginate_rejects_zero_page_size() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();
    assert!(matches!(
        repo.paginate(0, 1, &[], &[], &[]).unwrap_err(),
        QuickDataError::InvalidArgument(_)
    ));
}

#[test]
fn unknown_entity_is_an_error() {
    let mut data = blog();
    assert!(matches!(
        data.repository("ghosts").err(),
        Some(QuickDataError::UnknownEntity(name)) if name == "ghosts"
    ));
}

#[test]
fn failed_nested_write_rolls_back_the_parent() {
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap();

    let err = repo
        .store_or_update(None, &payload(json!({ "title": "Orphan", "comments": "oops" })))
        .unwrap_err();
    assert!(matches!(err, QuickDataError::InvalidPayload { .. }));
    assert!(repo.all(&[]).unwrap().is_empty());
}

#[derive(Default)]
struct PostHooks {
    saved: RefCell<Vec<i64>>,
}

impl RepositoryHooks<MemoryStore> for PostHooks {
    fn scope_search(&self, query: &mut Query) -> quickdata::Result<()> {
        query.where_eq("published", 1);
        Ok(())
    }

    fn fill_custom_fields(
        &self,
        _store: &mut MemoryStore,
        record: &mut Record,
        input: &Payload,
    ) -> quickdata::Result<()> {
        if let Some(title) = input.get("title").and_then(|t| t.as_str()) {
            record.set("slug", title.to_lowercase().replace(' ', "-"));
        }
        Ok(())
    }

    fn after_save(
        &self,
        _store: &mut MemoryStore,
        record: &mut Record,
        _input: &Payload,
    ) -> quickdata::Result<()> {
        self.saved.borrow_mut().extend(record.id());
        Ok(())
    }
}

#[test]
fn fill_from_input_runs_hooks_around_save() {
    let hooks = PostHooks::default();
    let mut data = blog();
    let mut repo = data.repository("posts").unwrap().with_hooks(&hooks);

    let record = repo
        .fill_from_input(&payload(json!({ "title": "Hello World" })), None)
        .unwrap();
    assert_eq!(text(&record, "slug"), "hello-world");
    assert_eq!(*hooks.saved.borrow(), vec![record.id().unwrap()]);

    let stored = repo.find_or_fail(record.id().unwrap(), &[]).unwrap();
    assert_eq!(text(&stored, "slug"), "hello-world");

    let err = repo
        .fill_from_input(&payload(json!({ "title": "Missing" })), Some(404))
        .unwrap_err();
    assert!(matches!(err, QuickDataError::NotFound { .. }));
}

#[test]
fn search_applies_hook_scope() {
    let hooks = PostHooks::default();
    let mut data = blog();
    {
        let mut repo = data.repository("posts").unwrap();
        repo.create(&payload(json!({ "title": "Public", "published": 1 })))
            .unwrap();
        repo.create(&payload(json!({ "title": "Hidden", "published": 0 })))
            .unwrap();
    }
    let mut repo = data.repository("posts").unwrap().with_hooks(&hooks);
    let result = repo.search(&[], None).unwrap();
    let titles: Vec<String> = result.records().iter().map(|r| text(r, "title")).collect();
    assert_eq!(titles, ["Public"]);
}

#[test]
fn with_settings_validates() {
    let settings = Settings {
        per_page: 0,
        ..Settings::default()
    };
    assert!(matches!(
        blog().with_settings(settings).err(),
        Some(QuickDataError::InvalidArgument(_))
    ));
}
