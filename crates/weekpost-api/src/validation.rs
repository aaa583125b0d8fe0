use weekpost_types::models::Category;

use crate::error::ApiError;

pub const MAX_CONTENT_CHARS: usize = 900;
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Trim, drop carriage returns, and enforce the length limit.
pub fn normalize_content(raw: &str) -> Result<String, ApiError> {
    let content = raw.trim().replace('\r', "");
    if content.is_empty() {
        return Err(ApiError::Validation("text must not be empty".into()));
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(ApiError::Validation(format!(
            "text is too long ({} > {} characters)",
            len, MAX_CONTENT_CHARS
        )));
    }
    Ok(content)
}

pub fn normalize_author(raw: &str) -> String {
    let author = raw.trim();
    if author.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        author.to_string()
    }
}

pub fn parse_category(raw: &str) -> Result<Category, ApiError> {
    Category::from_key(raw.trim())
        .ok_or_else(|| ApiError::Validation(format!("unknown type '{}' (added, changed, removed)", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_cleaned() {
        assert_eq!(normalize_content("  hello\r\nworld \r").unwrap(), "hello\nworld");
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(matches!(normalize_content(" \r\n "), Err(ApiError::Validation(_))));
    }

    #[test]
    fn length_limit_counts_characters() {
        assert!(normalize_content(&"ä".repeat(MAX_CONTENT_CHARS)).is_ok());
        assert!(normalize_content(&"ä".repeat(MAX_CONTENT_CHARS + 1)).is_err());
    }

    #[test]
    fn author_and_category() {
        assert_eq!(normalize_author("  "), "unknown");
        assert_eq!(normalize_author(" bob "), "bob");
        assert_eq!(parse_category("Removed").unwrap(), Category::Removed);
        assert!(parse_category("fixed").is_err());
    }
}
