//! Authorization rules, kept as pure functions so they can be checked
//! without any web or database context.
//!
//! Posts are intentionally owner-only: admins moderate them through the
//! dashboard's own delete routes, not by impersonating the owner actions.

use crate::{
    comments::models::Comment,
    posts::models::Post,
    users::models::{UserResponseBrief, UserRole},
};

#[must_use]
pub fn can_edit_post(actor: &UserResponseBrief, post: &Post) -> bool {
    actor.id == post.user_id
}

#[must_use]
pub fn can_delete_post(actor: &UserResponseBrief, post: &Post) -> bool {
    actor.id == post.user_id
}

#[must_use]
pub fn can_edit_comment(actor: &UserResponseBrief, comment: &Comment) -> bool {
    actor.id == comment.user_id || actor.role == UserRole::Admin
}

#[must_use]
pub fn can_delete_comment(actor: &UserResponseBrief, comment: &Comment) -> bool {
    actor.id == comment.user_id || actor.role == UserRole::Admin
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn actor(id: Uuid, role: UserRole) -> UserResponseBrief {
        UserResponseBrief {
            id,
            username: "someone".to_string(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    fn post(owner: Uuid) -> Post {
        Post {
            id: Uuid::now_v7(),
            content: "Hello world".to_string(),
            image: None,
            created_at: Utc::now(),
            updated_at: None,
            user_id: owner,
        }
    }

    fn comment(owner: Uuid) -> Comment {
        Comment {
            id: Uuid::now_v7(),
            content: "nice one".to_string(),
            created_at: Utc::now(),
            updated_at: None,
            post_id: Uuid::now_v7(),
            user_id: owner,
        }
    }

    #[test]
    fn only_the_owner_touches_a_post() {
        let owner_id = Uuid::now_v7();
        let post = post(owner_id);

        assert!(can_edit_post(&actor(owner_id, UserRole::User), &post));
        assert!(can_delete_post(&actor(owner_id, UserRole::User), &post));

        let stranger = actor(Uuid::now_v7(), UserRole::User);
        assert!(!can_edit_post(&stranger, &post));
        assert!(!can_delete_post(&stranger, &post));
    }

    #[test]
    fn admins_get_no_post_override() {
        let post = post(Uuid::now_v7());
        let admin = actor(Uuid::now_v7(), UserRole::Admin);

        assert!(!can_edit_post(&admin, &post));
        assert!(!can_delete_post(&admin, &post));
    }

    #[test]
    fn comment_owner_or_admin_may_modify() {
        let owner_id = Uuid::now_v7();
        let comment = comment(owner_id);

        assert!(can_edit_comment(&actor(owner_id, UserRole::User), &comment));
        assert!(can_delete_comment(&actor(owner_id, UserRole::User), &comment));

        let admin = actor(Uuid::now_v7(), UserRole::Admin);
        assert!(can_edit_comment(&admin, &comment));
        assert!(can_delete_comment(&admin, &comment));

        let stranger = actor(Uuid::now_v7(), UserRole::User);
        assert!(!can_edit_comment(&stranger, &comment));
        assert!(!can_delete_comment(&stranger, &comment));
    }
}
