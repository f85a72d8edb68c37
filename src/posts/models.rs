use chrono::{DateTime, Utc};
use derive_builder::Builder;
use diesel::prelude::*;
use garde::Validate;
use uuid::Uuid;

use crate::{schema::posts, users::models::User};

#[derive(Insertable, Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(User))]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
    /// Generated storage file name, never a path
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = posts)]
pub struct UpdatePost {
    pub content: String,
    pub updated_at: Option<DateTime<Utc>>,
    /// `None` leaves the stored image reference untouched
    pub image: Option<String>,
}

/// Validated text input shared by the create and edit flows.
#[derive(Validate, Debug)]
pub struct PostInput {
    #[garde(length(min = 3, max = 1000))]
    pub content: String,
}

impl PostInput {
    #[must_use]
    pub fn new(content: &str) -> Self {
        Self {
            content: content.trim().to_string(),
        }
    }
}

/// Raw fields assembled from the multipart form.
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct PostData {
    pub content: String,
    #[builder(default)]
    pub image: Option<UploadedImage>,
    #[builder(default)]
    pub token: Option<String>,
}

impl PostData {
    #[must_use]
    pub fn builder() -> PostDataBuilder {
        PostDataBuilder::default()
    }
}

#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use garde::Validate;

    use super::PostInput;

    #[test]
    fn two_characters_are_rejected() {
        assert!(PostInput::new("Hi").validate(&()).is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(PostInput::new("abc").validate(&()).is_ok());
        assert!(PostInput::new(&"a".repeat(1000)).validate(&()).is_ok());
        assert!(PostInput::new(&"a".repeat(1001)).validate(&()).is_err());
    }

    #[test]
    fn content_is_trimmed_before_validation() {
        assert!(PostInput::new("  Hi  ").validate(&()).is_err());
        assert_eq!(PostInput::new("  Hello world  ").content, "Hello world");
    }
}
