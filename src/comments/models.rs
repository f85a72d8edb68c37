use chrono::{DateTime, Utc};
use diesel::prelude::*;
use garde::Validate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{posts::models::Post, schema::comments, users::models::User};

#[derive(Insertable, Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Post))]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub post_id: Uuid,
    pub user_id: Uuid,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = comments)]
pub struct UpdateComment {
    pub content: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Validated text input. Both the full form and the quick-add path build
/// this, so the two entry points cannot drift apart.
#[derive(Validate, Debug)]
pub struct CommentInput {
    #[garde(length(min = 3, max = 1000))]
    pub content: String,
}

impl CommentInput {
    #[must_use]
    pub fn new(content: &str) -> Self {
        Self {
            content: content.trim().to_string(),
        }
    }
}

/// Full comment form body.
#[derive(Deserialize, Debug)]
pub struct CommentForm {
    pub content: String,
    #[serde(rename = "_token")]
    pub token: String,
}

/// Inline quick-add body rendered next to a post.
#[derive(Deserialize, Debug)]
pub struct QuickAddForm {
    pub comment_text: String,
    #[serde(rename = "_token")]
    pub token: String,
}

#[cfg(test)]
mod tests {
    use garde::Validate;

    use super::CommentInput;

    #[test]
    fn bounds_match_the_post_rules() {
        assert!(CommentInput::new("ok").validate(&()).is_err());
        assert!(CommentInput::new("abc").validate(&()).is_ok());
        assert!(CommentInput::new(&"a".repeat(1000)).validate(&()).is_ok());
        assert!(CommentInput::new(&"a".repeat(1001)).validate(&()).is_err());
    }

    #[test]
    fn both_entry_paths_share_one_validator() {
        // the form path and the quick-add path feed the same constructor,
        // so a two-character comment fails identically through either
        let from_form = CommentInput::new(" ok ");
        let from_quick_add = CommentInput::new("ok");

        assert_eq!(from_form.content, from_quick_add.content);
        assert!(from_form.validate(&()).is_err());
        assert!(from_quick_add.validate(&()).is_err());
    }
}
