use std::cell::Cell;

use common::{blog, payload, text};
use quickdata::prelude::*;
use quickdata::authorize_query;
use serde_json::json;

mod common;

struct User {
    id: i64,
    permissions: &'static [&'static str],
}

impl Actor for User {
    fn can(&self, permission: &str) -> bool {
        self.permissions.contains(&permission)
    }
}

fn authored_posts() -> QuickData<MemoryStore> {
    let mut data = blog();
    {
        let mut repo = data.repository("posts").unwrap();
        for (title, author, published) in [
            ("Mine", 1, 0),
            ("Theirs", 2, 1),
            ("Their draft", 2, 0),
        ] {
            repo.create(&payload(json!({
                "title": title,
                "author_id": author,
                "published": published,
            })))
            .unwrap();
        }
    }
    data
}

fn permissions(user_id: i64) -> QueryPermissions<'static> {
    QueryPermissions::new()
        .allow("posts.view-any")
        .restrict("posts.view-own", move |query, _| {
            query.where_eq("author_id", user_id);
            Ok(())
        })
        .restrict("posts.view-published", |query, _| {
            query.where_eq("published", 1);
            Ok(())
        })
}

fn visible(data: &mut QuickData<MemoryStore>, user: &User) -> quickdata::Result<Vec<String>> {
    let rules = permissions(user.id);
    let scope = |query: &mut Query| -> quickdata::Result<()> {
        authorize_query(query, Some(user), &rules, true, true).map(|_| ())
    };
    let mut repo = data.repository("posts")?;
    let result = repo.search_scoped(
        &[],
        Some(SearchFilter::new().order_by([("id", Direction::Asc)])),
        Some(&scope),
    )?;
    Ok(result.records().iter().map(|r| text(r, "title")).collect())
}

#[test]
fn admin_sees_everything() {
    let mut data = authored_posts();
    let admin = User {
        id: 9,
        permissions: &["posts.view-any", "posts.view-own"],
    };
    assert_eq!(visible(&mut data, &admin).unwrap(), ["Mine", "Theirs", "Their draft"]);
}

#[test]
fn first_held_permission_wins() {
    let mut data = authored_posts();
    let author = User {
        id: 1,
        permissions: &["posts.view-own", "posts.view-published"],
    };
    assert_eq!(visible(&mut data, &author).unwrap(), ["Mine"]);
}

#[test]
fn no_permission_is_denied() {
    let mut data = authored_posts();
    let guest = User {
        id: 3,
        permissions: &[],
    };
    assert!(matches!(
        visible(&mut data, &guest).unwrap_err(),
        QuickDataError::PermissionDenied
    ));
}

#[test]
fn every_match_applies_without_break() {
    let calls = Cell::new(0);
    let rules = QueryPermissions::new()
        .restrict("a", |query, _| {
            calls.set(calls.get() + 1);
            query.where_eq("author_id", 2);
            Ok(())
        })
        .restrict("b", |query, _| {
            calls.set(calls.get() + 1);
            query.where_eq("published", 1);
            Ok(())
        });
    let user = User {
        id: 2,
        permissions: &["a", "b"],
    };

    let mut data = authored_posts();
    let repo = data.repository("posts").unwrap();
    let mut query = Query::new("posts");
    let matched = repo
        .authorize_query(&mut query, Some(&user), &rules, true, false)
        .unwrap();
    assert_eq!(matched, 2);
    assert_eq!(calls.get(), 2);

    let mut query = Query::new("posts");
    let matched = repo
        .authorize_query(&mut query, Some(&user), &rules, true, true)
        .unwrap();
    assert_eq!(matched, 1);
    assert_eq!(calls.get(), 3);
}

#[test]
fn missing_actor_is_unauthenticated() {
    let mut data = authored_posts();
    let repo = data.repository("posts").unwrap();
    let mut query = Query::new("posts");
    let err = repo
        .authorize_query(&mut query, None, &permissions(1), false, false)
        .unwrap_err();
    assert!(matches!(err, QuickDataError::Unauthenticated));
}
