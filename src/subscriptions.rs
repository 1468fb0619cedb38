use std::collections::BTreeSet;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::{
    entities::{ignore_entry, watch_entry},
    error::{AppError, AppResult},
    matcher,
    models::{ListKind, PatternEntry, UserId},
};

/// Runs `$body` with `$list` bound to the entity module backing `$kind`.
macro_rules! with_list {
    ($kind:expr, $list:ident => $body:expr) => {
        match $kind {
            ListKind::Watch => {
                use crate::entities::watch_entry as $list;
                $body
            },
            ListKind::Ignore => {
                use crate::entities::ignore_entry as $list;
                $body
            },
        }
    };
}

#[derive(Clone)]
pub struct SubscriptionStore {
    db: DatabaseConnection,
}

impl SubscriptionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores `pattern` verbatim. Returns `false` when the user already has this exact
    /// pattern on the list.
    pub async fn add(
        &self,
        kind: ListKind,
        user_id: UserId,
        pattern: &str,
        is_regex: bool,
    ) -> AppResult<bool> {
        if pattern.trim().is_empty() {
            return Err(AppError::validation("pattern must not be empty"));
        }
        if is_regex {
            matcher::validate_regex(pattern)?;
        }

        let inserted = with_list!(kind, list => {
            let model = list::ActiveModel {
                user_id: Set(user_id),
                pattern: Set(pattern.to_string()),
                is_regex: Set(is_regex),
            };
            list::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([list::Column::UserId, list::Column::Pattern])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?
        });

        Ok(inserted > 0)
    }

    pub async fn remove(&self, kind: ListKind, user_id: UserId, pattern: &str) -> AppResult<bool> {
        let removed = with_list!(kind, list => {
            list::Entity::delete_many()
                .filter(list::Column::UserId.eq(user_id))
                .filter(list::Column::Pattern.eq(pattern))
                .exec(&self.db)
                .await?
                .rows_affected
        });

        Ok(removed > 0)
    }

    pub async fn list_for_user(
        &self,
        kind: ListKind,
        user_id: UserId,
    ) -> AppResult<Vec<PatternEntry>> {
        let entries = with_list!(kind, list => {
            list::Entity::find()
                .filter(list::Column::UserId.eq(user_id))
                .order_by_asc(list::Column::Pattern)
                .all(&self.db)
                .await?
                .into_iter()
                .map(|m| PatternEntry { pattern: m.pattern, is_regex: m.is_regex })
                .collect::<Vec<_>>()
        });

        Ok(entries)
    }

    /// Users whose watch list matches `title`, each listed once.
    pub async fn watchers_for(&self, title: &str) -> AppResult<BTreeSet<UserId>> {
        let mut watchers: BTreeSet<UserId> = watch_entry::Entity::find()
            .filter(watch_entry::Column::Pattern.eq(title))
            .filter(watch_entry::Column::IsRegex.eq(false))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();

        let regex_entries = watch_entry::Entity::find()
            .filter(watch_entry::Column::IsRegex.eq(true))
            .all(&self.db)
            .await?;

        for entry in regex_entries {
            if watchers.contains(&entry.user_id) {
                continue;
            }
            if matcher::matches(title, &entry.pattern, true) {
                watchers.insert(entry.user_id);
            }
        }

        Ok(watchers)
    }

    /// True when any user's ignore list matches `title`.
    pub async fn is_globally_ignored(&self, title: &str) -> AppResult<bool> {
        let literal = ignore_entry::Entity::find()
            .filter(ignore_entry::Column::Pattern.eq(title))
            .filter(ignore_entry::Column::IsRegex.eq(false))
            .one(&self.db)
            .await?;
        if literal.is_some() {
            return Ok(true);
        }

        let regex_entries = ignore_entry::Entity::find()
            .filter(ignore_entry::Column::IsRegex.eq(true))
            .all(&self.db)
            .await?;

        Ok(regex_entries.iter().any(|entry| matcher::matches(title, &entry.pattern, true)))
    }
}
