//! Permission-driven row restriction.
//!
//! A [`QueryPermissions`] lists permission names in priority order, each
//! optionally paired with a callback that narrows the query. The callbacks of
//! every permission the actor holds are applied in turn.

use std::fmt;

use quickdata_core::{Query, QuickDataError, Result};

/// Anything that can be asked whether it holds a permission.
pub trait Actor {
    fn can(&self, permission: &str) -> bool;
}

type Restriction<'a> = Box<dyn Fn(&mut Query, &dyn Actor) -> Result<()> + 'a>;

pub struct PermissionRule<'a> {
    pub permission: String,
    restriction: Option<Restriction<'a>>,
}

impl fmt::Debug for PermissionRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRule")
            .field("permission", &self.permission)
            .field("restricts", &self.restriction.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct QueryPermissions<'a> {
    rules: Vec<PermissionRule<'a>>,
}

impl<'a> QueryPermissions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A permission that grants access without narrowing the query.
    pub fn allow(mut self, permission: impl Into<String>) -> Self {
        self.rules.push(PermissionRule {
            permission: permission.into(),
            restriction: None,
        });
        self
    }

    /// A permission whose holders see only what `restriction` leaves.
    pub fn restrict<F>(mut self, permission: impl Into<String>, restriction: F) -> Self
    where
        F: Fn(&mut Query, &dyn Actor) -> Result<()> + 'a,
    {
        self.rules.push(PermissionRule {
            permission: permission.into(),
            restriction: Some(Box::new(restriction)),
        });
        self
    }

    pub fn rules(&self) -> &[PermissionRule<'a>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Applies the restriction of each permission `actor` holds, in order, and
/// returns how many matched.
///
/// With `break_on_first_match`, rules after the first match are not looked
/// at. With `reject_if_no_match`, holding none of the permissions is
/// [`QuickDataError::PermissionDenied`]. A missing actor is
/// [`QuickDataError::Unauthenticated`].
pub fn authorize_query(
    query: &mut Query,
    actor: Option<&dyn Actor>,
    permissions: &QueryPermissions<'_>,
    reject_if_no_match: bool,
    break_on_first_match: bool,
) -> Result<usize> {
    let actor = actor.ok_or(QuickDataError::Unauthenticated)?;

    let mut matched = 0;
    for rule in &permissions.rules {
        if break_on_first_match && matched > 0 {
            break;
        }
        if !actor.can(&rule.permission) {
            continue;
        }
        if let Some(restriction) = &rule.restriction {
            restriction(query, actor)?;
        }
        matched += 1;
    }

    if reject_if_no_match && matched == 0 {
        return Err(QuickDataError::PermissionDenied);
    }
    Ok(matched)
}
