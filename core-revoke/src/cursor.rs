//! Item-granular resume position over a page-granular listing.
//!
//! A listing can only be resumed at page boundaries, so the cursor pairs the
//! token of the page being consumed with the offset of the next unprocessed
//! item on it. The encoded form is `"{offset}@{page_token}"`, with an empty
//! token standing for the first page.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RevokeError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeCursor {
    /// Token of the page holding the next item, `None` for the first page.
    pub page_token: Option<String>,
    /// Index of the next unprocessed item within that page.
    pub offset: usize,
}

impl ResumeCursor {
    pub fn new(page_token: Option<String>, offset: usize) -> Self {
        Self { page_token, offset }
    }

    /// Start of the page identified by `page_token`.
    pub fn page_start(page_token: Option<String>) -> Self {
        Self::new(page_token, 0)
    }

    pub fn encode(&self) -> String {
        format!(
            "{}@{}",
            self.offset,
            self.page_token.as_deref().unwrap_or_default()
        )
    }

    /// Parses a persisted cursor.
    ///
    /// # Errors
    ///
    /// Returns `RevokeError::InvalidCursor` when the separator is missing or
    /// the offset is not a number.
    pub fn decode(encoded: &str) -> Result<Self> {
        let (offset, token) = encoded
            .split_once('@')
            .ok_or_else(|| RevokeError::InvalidCursor(encoded.to_string()))?;

        let offset = offset
            .parse::<usize>()
            .map_err(|_| RevokeError::InvalidCursor(encoded.to_string()))?;

        let page_token = (!token.is_empty()).then(|| token.to_string());

        Ok(Self { page_token, offset })
    }
}

impl fmt::Display for ResumeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ResumeCursor {
    type Err = RevokeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_encoding() {
        let cursor = ResumeCursor::page_start(None);
        assert_eq!(cursor.encode(), "0@");
        assert_eq!(ResumeCursor::decode("0@").unwrap(), cursor);
    }

    #[test]
    fn test_token_may_contain_separator() {
        let cursor = ResumeCursor::new(Some("abc@def==".to_string()), 17);
        let decoded: ResumeCursor = cursor.to_string().parse().unwrap();
        assert_eq!(decoded.page_token.as_deref(), Some("abc@def=="));
        assert_eq!(decoded.offset, 17);
    }

    #[test]
    fn test_invalid_cursor() {
        assert!(matches!(
            ResumeCursor::decode("no-separator"),
            Err(RevokeError::InvalidCursor(_))
        ));
        assert!(matches!(
            ResumeCursor::decode("x@token"),
            Err(RevokeError::InvalidCursor(_))
        ));
    }
}
