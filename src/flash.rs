use tower_cookies::{Cookie, Cookies};

pub const FLASH_COOKIE_NAME: &str = "flash";

/// One-shot status message shown after a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// CSS class used by the page templates.
    #[must_use]
    pub fn kind_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "flash-success",
            FlashKind::Error => "flash-error",
        }
    }
}

pub fn set(cookies: &Cookies, flash: Flash) {
    let mut cookie = Cookie::new(FLASH_COOKIE_NAME, encode(&flash));
    cookie.set_path("/");
    cookies.add(cookie);
}

/// Read and consume the pending flash message, if any.
pub fn take(cookies: &Cookies) -> Option<Flash> {
    let flash = cookies
        .get(FLASH_COOKIE_NAME)
        .and_then(|cookie| decode(cookie.value()));

    if flash.is_some() {
        let mut removal = Cookie::new(FLASH_COOKIE_NAME, "");
        removal.set_path("/");
        cookies.remove(removal);
    }

    flash
}

fn encode(flash: &Flash) -> String {
    let kind = match flash.kind {
        FlashKind::Success => "success",
        FlashKind::Error => "error",
    };
    format!("{kind}|{}", flash.message)
}

fn decode(raw: &str) -> Option<Flash> {
    let (kind, message) = raw.split_once('|')?;
    let kind = match kind {
        "success" => FlashKind::Success,
        "error" => FlashKind::Error,
        _ => return None,
    };
    Some(Flash {
        kind,
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let flash = Flash::success("Post created successfully!");
        assert_eq!(decode(&encode(&flash)), Some(flash));

        let flash = Flash::error("Invalid security token.");
        assert_eq!(decode(&encode(&flash)), Some(flash));
    }

    #[test]
    fn message_may_contain_the_separator() {
        let flash = Flash::error("a|b|c");
        assert_eq!(decode(&encode(&flash)).unwrap().message, "a|b|c");
    }

    #[test]
    fn unknown_payloads_are_ignored() {
        assert_eq!(decode("warning|hm"), None);
        assert_eq!(decode("no separator"), None);
    }
}
