//! Avatar/cover/background URLs and the derived palette.

use crate::color;
use crate::hash;

/// Default avatar host when no SRV override exists for the domain.
pub const DEFAULT_AVATAR_HOST: &str = "www.libravatar.org";

/// 1x1 transparent PNG used wherever no real image is available.
pub const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Presentation style for an identity page.
#[derive(Debug, Clone)]
pub struct Style {
    pub avatar: String,
    pub cover: String,
    pub background: String,
    /// 14 hex colors, see [`color::palette`].
    pub palette: Vec<String>,
}

impl Style {
    /// Build a style from an email and the SRV-discovered hosts.
    ///
    /// `style_host` empty means the domain publishes no style service; cover
    /// and background fall back to the transparent pixel.
    pub fn derive(email: &str, avatar_host: &str, style_host: &str) -> Self {
        let id = hash::md5_hex(email.trim().to_lowercase().as_bytes());

        let mut style = Style {
            avatar: format!("https://{avatar_host}/avatar/{id}"),
            cover: PIXEL.to_string(),
            background: PIXEL.to_string(),
            palette: color::palette(&format!("#{}", &id[..6])),
        };

        if !style_host.is_empty() {
            style.cover = format!("https://{style_host}/cover/{id}");
            style.background = format!("https://{style_host}/bg/{id}");
        }

        style
    }

    /// The neutral style shown before any real one resolves.
    pub fn fallback() -> Self {
        Style {
            avatar: PIXEL.to_string(),
            cover: PIXEL.to_string(),
            background: PIXEL.to_string(),
            palette: color::palette("#93CCEA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_defaults_to_pixel_without_style_host() {
        let s = Style::derive("me@example.org", DEFAULT_AVATAR_HOST, "");
        assert!(s.avatar.starts_with("https://www.libravatar.org/avatar/"));
        assert_eq!(s.cover, PIXEL);
        assert_eq!(s.background, PIXEL);
        assert_eq!(s.palette.len(), 14);
    }

    #[test]
    fn derive_uses_style_host() {
        let s = Style::derive("me@example.org", "img.example.org", "img.example.org");
        assert!(s.cover.starts_with("https://img.example.org/cover/"));
        assert!(s.background.starts_with("https://img.example.org/bg/"));
    }

    #[test]
    fn derive_normalizes_email() {
        let a = Style::derive("  Me@Example.ORG ", DEFAULT_AVATAR_HOST, "");
        let b = Style::derive("me@example.org", DEFAULT_AVATAR_HOST, "");
        assert_eq!(a.avatar, b.avatar);
        assert_eq!(a.palette, b.palette);
    }

    #[test]
    fn seed_comes_from_first_three_id_bytes() {
        let id = hash::md5_hex(b"me@example.org");
        let s = Style::derive("me@example.org", DEFAULT_AVATAR_HOST, "");
        assert_eq!(s.palette, color::palette(&format!("#{}", &id[..6])));
    }
}
