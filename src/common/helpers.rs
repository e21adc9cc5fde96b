use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use argon2::password_hash::SaltString;
use ammonia::Builder;
use chrono::NaiveDateTime;
use rand::rngs::OsRng;
use regex::Regex;
use std::sync::OnceLock;
use crate::config::ALLOWED_EXTENSIONS;

pub fn now_utc() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::PasswordHash;

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Strips all markup, leaving plain text. Escaping happens at render time,
/// so entities produced by the cleaner are decoded again.
pub fn sanitize_text(text: &str) -> String {
    let clean = Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text.trim())
        .to_string();
    html_escape::decode_html_entities(&clean).trim().to_string()
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// At least 8 characters with one ASCII letter and one ASCII digit.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= crate::config::MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (crate::config::MIN_USERNAME_LENGTH..=crate::config::MAX_USERNAME_LENGTH).contains(&len)
        && !username.chars().any(|c| c.is_whitespace() || c == '/')
}

fn extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

pub fn allowed_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
        .unwrap_or(false)
}

/// Reduces a client-supplied filename to `[A-Za-z0-9_.-]`, with path
/// separators treated as whitespace and whitespace runs joined by `_`.
pub fn secure_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `name.ext` -> `name-<suffix>.ext`; names without an extension get the
/// suffix appended.
pub fn with_suffix(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, suffix, ext),
        None => format!("{}-{}", filename, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        assert!(!is_valid_password("abc123"));
        assert!(!is_valid_password("abcdefgh"));
        assert!(!is_valid_password("12345678"));
        assert!(is_valid_password("abcdefg1"));
        assert!(is_valid_password("s3cret-passphrase!"));
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("alice.example.com"));
        assert!(!is_valid_email("a@b.c@d"));
        assert!(!is_valid_email("alice @example.com"));
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(allowed_file("photo.JPG"));
        assert!(allowed_file("photo.jpeg"));
        assert!(allowed_file("archive.tar.gif"));
        assert!(!allowed_file("photo.exe"));
        assert!(!allowed_file("png"));
        assert!(!allowed_file("photo.png.exe"));
    }

    #[test]
    fn secure_filename_strips_traversal() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("my cat photo.png"), "my_cat_photo.png");
        assert_eq!(secure_filename("C:\\Users\\me\\pic.gif"), "C_Users_me_pic.gif");
        assert_eq!(secure_filename("..."), "");
        assert_eq!(secure_filename("caf\u{e9}.jpg"), "caf.jpg");
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("photo.png", "ab12"), "photo-ab12.png");
        assert_eq!(with_suffix("photo", "ab12"), "photo-ab12");
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("abcdefg1").unwrap();
        assert_ne!(hash, "abcdefg1");
        assert!(verify_password("abcdefg1", &hash));
        assert!(!verify_password("abcdefg2", &hash));
        assert!(!verify_password("abcdefg1", "not-a-hash"));
    }

    #[test]
    fn sanitize_drops_markup() {
        assert_eq!(sanitize_text("  <b>Ada</b> "), "Ada");
        assert_eq!(sanitize_text("Tom & Jerry"), "Tom & Jerry");
    }
}
