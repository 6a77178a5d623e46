//! Stored file naming
//!
//! Uploaded files are stored as `<YYYYMMDD_HHMMSS>_<8 hex>_<sanitized name>`.
//! The hash is derived from the user id, the timestamp and the sanitized
//! name. The uploader's name survives only inside that composite name.

use chrono::NaiveDateTime;
use md5::{Digest, Md5};
use unicode_normalization::UnicodeNormalization;

use crate::user::UserId;

/// Format of the timestamp prefix of a stored name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Number of hex characters in the hash field.
pub const HASH_LEN: usize = 8;

/// Used when sanitizing leaves nothing of the uploaded name.
pub const FALLBACK_NAME: &str = "file";

/// Reduces a client-supplied filename to `[A-Za-z0-9._-]`.
///
/// The name is NFKD-decomposed first so accented letters keep their base
/// letter (`"résumé.pdf"` becomes `"resume.pdf"`). Remaining non-ASCII is
/// dropped, path separators become whitespace, whitespace runs become a
/// single `_`, and leading or trailing `.` / `_` are trimmed. The transform
/// is lossy: `"Report Final.pdf"` becomes `"Report_Final.pdf"`. May return
/// an empty string.
pub fn sanitize_filename(filename: &str) -> String {
    let spaced: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced
        .split(is_name_whitespace)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// ASCII whitespace including vertical tab and the information separators
/// `\x1c`..=`\x1f`, which `char::is_ascii_whitespace` leaves out.
fn is_name_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | '\x1c'..='\x1f')
}

/// Builds the composite stored name for an already sanitized filename.
pub fn stored_name(user: UserId, at: NaiveDateTime, sanitized: &str) -> String {
    let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
    let digest = Md5::digest(format!("{user}_{timestamp}_{sanitized}").as_bytes());
    let hash: String = digest
        .iter()
        .take(HASH_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect();

    format!("{timestamp}_{hash}_{sanitized}")
}

/// Recovers the (sanitized) original filename from a composite stored name.
///
/// The timestamp field itself contains an underscore, so the prefix is
/// three `_`-delimited fields: date, time and hash. Names that do not carry
/// that prefix are returned unchanged.
pub fn original_name(stored: &str) -> &str {
    let mut fields = stored.splitn(4, '_');
    let (Some(date), Some(time), Some(hash), Some(rest)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return stored;
    };

    let is_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    let is_hash = hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit());

    if is_digits(date, 8) && is_digits(time, 6) && is_hash && !rest.is_empty() {
        rest
    } else {
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_sanitize_spaces_become_underscores() {
        assert_eq!(sanitize_filename("Report Final.pdf"), "Report_Final.pdf");
        assert_eq!(sanitize_filename("  many   spaces  .txt"), "many_spaces_.txt");
    }

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.docx"), "C_Users_me_cv.docx");
    }

    #[test]
    fn test_sanitize_drops_control_and_non_ascii() {
        assert_eq!(sanitize_filename("na\0me\x07.txt"), "name.txt");
        assert_eq!(sanitize_filename("日本語.txt"), "txt");
    }

    #[test]
    fn test_sanitize_keeps_base_letters_of_accented_names() {
        assert_eq!(sanitize_filename("résumé.pdf"), "resume.pdf");
        assert_eq!(sanitize_filename("Café Menu.pdf"), "Cafe_Menu.pdf");
        assert_eq!(sanitize_filename("naïve façade.txt"), "naive_facade.txt");
        assert_eq!(sanitize_filename("ｆｉｌｅ.txt"), "file.txt");
    }

    #[test]
    fn test_sanitize_treats_separator_controls_as_whitespace() {
        assert_eq!(sanitize_filename("a\x0bb\x1cc\x1fd.txt"), "a_b_c_d.txt");
        assert_eq!(sanitize_filename("tab\there.txt"), "tab_here.txt");
    }

    #[test]
    fn test_sanitize_can_be_empty() {
        assert_eq!(sanitize_filename(".."), "");
        assert_eq!(sanitize_filename("___"), "");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_stored_name_format() {
        let name = stored_name(UserId::new(42), at(14, 5, 9), "Report_Final.pdf");

        assert!(name.starts_with("20240309_140509_"));
        assert!(name.ends_with("_Report_Final.pdf"));
        let hash = &name[16..24];
        assert_eq!(hash.len(), HASH_LEN);
        assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(&name[24..25], "_");
    }

    #[test]
    fn test_stored_name_matches_known_hash() {
        let name = stored_name(UserId::new(42), at(14, 5, 9), "Report_Final.pdf");
        assert_eq!(name, "20240309_140509_1beea438_Report_Final.pdf");
    }

    #[test]
    fn test_stored_name_is_deterministic_per_inputs() {
        let a = stored_name(UserId::new(42), at(1, 2, 3), "a.txt");
        let b = stored_name(UserId::new(42), at(1, 2, 3), "a.txt");
        let other_user = stored_name(UserId::new(43), at(1, 2, 3), "a.txt");
        let other_time = stored_name(UserId::new(42), at(1, 2, 4), "a.txt");

        assert_eq!(a, b);
        assert_ne!(a, other_user);
        assert_ne!(a[16..24], other_time[16..24]);
    }

    #[test]
    fn test_original_name_round_trip() {
        let sanitized = sanitize_filename("Report Final.pdf");
        let name = stored_name(UserId::new(42), at(9, 30, 0), &sanitized);

        assert_eq!(original_name(&name), "Report_Final.pdf");
    }

    #[test]
    fn test_original_name_keeps_underscores_in_name() {
        assert_eq!(
            original_name("20240309_093000_0a1b2c3d_my_big_file.tar.gz"),
            "my_big_file.tar.gz"
        );
    }

    #[test]
    fn test_original_name_passthrough_for_plain_names() {
        assert_eq!(original_name("notes.txt"), "notes.txt");
        assert_eq!(original_name("a_b_c_d"), "a_b_c_d");
        assert_eq!(original_name("20240309_093000_zzzzzzzz_x"), "20240309_093000_zzzzzzzz_x");
        assert_eq!(original_name("20240309_093000_0a1b2c3d_"), "20240309_093000_0a1b2c3d_");
    }
}
