use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const COMMENT_QUICK_ADD_ACTION: &str = "comment_quick_add";
pub const POST_FORM_ACTION: &str = "post_form";
pub const COMMENT_FORM_ACTION: &str = "comment_form";

/// Action name for deleting a specific resource.
#[must_use]
pub fn delete_action(id: Uuid) -> String {
    format!("delete{id}")
}

#[derive(thiserror::Error, Debug)]
pub enum CsrfError {
    #[error("invalid security token")]
    InvalidToken,
}

/// Form body carrying nothing but the per-action token (delete flows).
#[derive(Deserialize, Debug)]
pub struct TokenForm {
    #[serde(rename = "_token")]
    pub token: String,
}

/// Mint a per-action token bound to the caller's session.
#[must_use]
pub fn token(secret: &[u8], session_id: Uuid, action: &str) -> String {
    URL_SAFE_NO_PAD.encode(tag(secret, session_id, action))
}

pub fn verify(
    secret: &[u8],
    session_id: Uuid,
    action: &str,
    presented: &str,
) -> Result<(), CsrfError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(presented)
        .map_err(|_| CsrfError::InvalidToken)?;

    let mut mac = mac(secret, session_id, action);
    mac.verify_slice(&decoded).map_err(|_| CsrfError::InvalidToken)
}

fn tag(secret: &[u8], session_id: Uuid, action: &str) -> Vec<u8> {
    mac(secret, session_id, action).finalize().into_bytes().to_vec()
}

fn mac(secret: &[u8], session_id: Uuid, action: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac key");
    mac.update(session_id.as_bytes());
    mac.update(b":");
    mac.update(action.as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip_verifies() {
        let session_id = Uuid::now_v7();
        let minted = token(SECRET, session_id, POST_FORM_ACTION);
        assert!(verify(SECRET, session_id, POST_FORM_ACTION, &minted).is_ok());
    }

    #[test]
    fn wrong_action_is_rejected() {
        let session_id = Uuid::now_v7();
        let minted = token(SECRET, session_id, COMMENT_FORM_ACTION);
        assert!(verify(SECRET, session_id, COMMENT_QUICK_ADD_ACTION, &minted).is_err());
    }

    #[test]
    fn delete_tokens_are_scoped_to_one_resource() {
        let session_id = Uuid::now_v7();
        let post_a = Uuid::now_v7();
        let post_b = Uuid::now_v7();
        let minted = token(SECRET, session_id, &delete_action(post_a));
        assert!(verify(SECRET, session_id, &delete_action(post_a), &minted).is_ok());
        assert!(verify(SECRET, session_id, &delete_action(post_b), &minted).is_err());
    }

    #[test]
    fn another_session_cannot_replay_a_token() {
        let minted = token(SECRET, Uuid::now_v7(), POST_FORM_ACTION);
        assert!(verify(SECRET, Uuid::now_v7(), POST_FORM_ACTION, &minted).is_err());
    }

    #[test]
    fn tampered_or_garbage_tokens_are_rejected() {
        let session_id = Uuid::now_v7();
        let mut minted = token(SECRET, session_id, POST_FORM_ACTION);
        minted.pop();
        assert!(verify(SECRET, session_id, POST_FORM_ACTION, &minted).is_err());
        assert!(verify(SECRET, session_id, POST_FORM_ACTION, "not base64 at all!").is_err());
    }
}
