//! One-shot UI messages.
//!
//! A handler that redirects stores the message in a short-lived cookie; the next
//! page render shows it once and clears the cookie.

use axum::http::header;
use axum::http::request::Parts;

pub const FLASH_COOKIE: &str = "elmosyar_flash";

/// Generic message for transport or decode failures. The cause is only logged.
pub const SERVER_ERROR: &str = "خطا در ارتباط با سرور";
pub const LOGIN_REQUIRED: &str = "لطفا ابتدا وارد شوید";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }

    fn tag(&self) -> char {
        match self {
            FlashKind::Success => 's',
            FlashKind::Error => 'e',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub text: String,
}

impl Flash {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            text: text.into(),
        }
    }

    /// `Set-Cookie` value carrying this message.
    pub fn cookie(&self) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(self.text.as_bytes()).collect();
        format!(
            "{}={}{}; SameSite=Lax; Path=/; Max-Age=60",
            FLASH_COOKIE,
            self.kind.tag(),
            encoded
        )
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        let kind = match chars.next()? {
            's' => FlashKind::Success,
            'e' => FlashKind::Error,
            _ => return None,
        };
        let text: String = url::form_urlencoded::parse(format!("t={}", chars.as_str()).as_bytes())
            .next()
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        Some(Self { kind, text })
    }

    pub fn from_parts(parts: &Parts) -> Option<Self> {
        get_cookie_value(parts, FLASH_COOKIE).and_then(Self::decode)
    }
}

pub fn clear_cookie() -> String {
    format!("{}=; SameSite=Lax; Path=/; Max-Age=0", FLASH_COOKIE)
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_value(set_cookie: &str) -> &str {
        let pair = set_cookie.split(';').next().unwrap();
        pair.split_once('=').unwrap().1
    }

    #[test]
    fn flash_survives_cookie_encoding() {
        let flash = Flash::error("رمز عبور و تکرار آن مطابقت ندارند; a=b");
        let decoded = Flash::decode(cookie_value(&flash.cookie())).unwrap();
        assert_eq!(decoded, flash);
    }

    #[test]
    fn success_flash_uses_success_class() {
        let decoded = Flash::decode(cookie_value(&Flash::success("ok").cookie())).unwrap();
        assert_eq!(decoded.kind.css_class(), "success");
        assert_eq!(decoded.text, "ok");
    }

    #[test]
    fn unknown_tag_is_ignored() {
        assert_eq!(Flash::decode("xhello"), None);
        assert_eq!(Flash::decode(""), None);
    }

    #[test]
    fn reads_flash_from_request_cookies() {
        let request = axum::http::Request::builder()
            .header(header::COOKIE, format!("other=1; {}", cookie_value_pair()))
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(Flash::from_parts(&parts), Some(Flash::success("X")));
    }

    fn cookie_value_pair() -> String {
        Flash::success("X").cookie().split(';').next().unwrap().to_string()
    }
}
