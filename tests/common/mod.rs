#![allow(dead_code)]

use quickdata::prelude::*;
use quickdata_core::{Attributes, Payload};
use serde_json::Value as Json;

pub const POST_TAG: &str = "post_tag";

/// users, posts, comments, replies and tags.
///
/// posts have many comments (synced), comments have many replies (synced),
/// posts and tags are linked through `post_tag` with a `sort_order` pivot
/// column that may be filled from input.
pub fn blog_schema() -> Schema {
    let mut schema = Schema::new();
    let users = schema.entity(
        EntitySchema::new("users")
            .fillable(["name", "email"])
            .searchable(["name", "email"]),
    );
    let posts = schema.entity(
        EntitySchema::new("posts")
            .fillable([
                "title",
                "body",
                "score",
                "author_id",
                "uuid",
                "slug",
                "published",
                "latitude",
                "longitude",
            ])
            .searchable(["title", "body"])
            .syncs_many_to_many(["tags"])
            .syncs_has_many(["comments"])
            .rule("title", vec![Rule::Required, Rule::MaxLength(40)])
            .rule("score", vec![Rule::Numeric]),
    );
    let comments = schema.entity(
        EntitySchema::new("comments")
            .fillable(["body", "post_id", "author_id"])
            .syncs_has_many(["replies"]),
    );
    let replies = schema.entity(EntitySchema::new("replies").fillable(["body", "comment_id"]));
    let tags = schema.entity(
        EntitySchema::new("tags")
            .fillable(["name", "slug"])
            .searchable(["name"]),
    );

    schema
        .has_many(users, "posts", posts, "author_id")
        .has_many(posts, "comments", comments, "post_id")
        .has_many(comments, "replies", replies, "comment_id")
        .many_to_many(
            posts,
            "tags",
            tags,
            PivotTable::new(POST_TAG, "post_id", "tag_id"),
            ["sort_order"],
        );
    schema
}

pub fn blog() -> QuickData<MemoryStore> {
    QuickData::new(MemoryStore::new(), blog_schema())
}

pub fn payload(json: Json) -> Payload {
    match json {
        Json::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn attrs(pairs: &[(&str, Value)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn text(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(value) => value.to_string(),
        None => panic!("record has no `{column}`: {record:?}"),
    }
}

pub fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().filter_map(Record::id).collect()
}

/// Inserts posts with the given titles and returns their ids.
pub fn seed_posts<S: Store>(data: &mut QuickData<S>, titles: &[&str]) -> Vec<i64> {
    let mut repo = data.repository("posts").unwrap();
    titles
        .iter()
        .map(|title| {
            repo.create(&payload(serde_json::json!({ "title": title })))
                .unwrap()
                .id()
                .unwrap()
        })
        .collect()
}
