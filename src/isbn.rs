//! ISBN normalization and ISBN-10 / ISBN-13 conversion.
//!
//! All functions are total: malformed input yields an [`IsbnError`] or
//! `None`, never a panic. Callers treat an error as "skip identifier-based
//! candidates" and keep resolving with whatever URLs remain.
//!
//! ```rust
//! use libflix_covers::isbn::{normalize_isbn, to_isbn10, to_isbn13};
//!
//! assert_eq!(normalize_isbn("978-0-439-70818-0").unwrap(), "9780439708180");
//! assert_eq!(to_isbn10("9780439708180").as_deref(), Some("0439708184"));
//! assert_eq!(to_isbn13("0439708184").unwrap(), "9780439708180");
//! ```

use crate::error::IsbnError;

/// Strip separators, uppercase a trailing `x`, and verify the check digit.
///
/// Accepts only 10- or 13-character results. An `X` check digit is only
/// valid in the last position of an ISBN-10.
pub fn normalize_isbn(raw: &str) -> Result<String, IsbnError> {
    let mut clean: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if clean.is_empty() {
        return Err(IsbnError::Empty);
    }
    if clean.ends_with('x') {
        clean.pop();
        clean.push('X');
    }

    match clean.len() {
        10 => {
            let body = digits(&clean[..9], 0)?;
            let found = last_char(&clean);
            if !found.is_ascii_digit() && found != 'X' {
                return Err(IsbnError::InvalidCharacter(9));
            }
            let expected = isbn10_check(&body);
            if expected != found {
                return Err(IsbnError::CheckDigitMismatch { expected, found });
            }
            Ok(clean)
        }
        13 => {
            let body = digits(&clean[..12], 0)?;
            let found = last_char(&clean);
            if !found.is_ascii_digit() {
                return Err(IsbnError::InvalidCharacter(12));
            }
            let expected = isbn13_check(&body);
            if expected != found {
                return Err(IsbnError::CheckDigitMismatch { expected, found });
            }
            Ok(clean)
        }
        n => Err(IsbnError::InvalidLength(n)),
    }
}

/// Convert a normalized ISBN-10 into its `978`-prefixed ISBN-13 form.
pub fn to_isbn13(isbn10: &str) -> Result<String, IsbnError> {
    let isbn10 = normalize_isbn(isbn10)?;
    if isbn10.len() != 10 {
        return Err(IsbnError::NotConvertible);
    }
    let mut body = vec![9, 7, 8];
    body.extend(digits(&isbn10[..9], 0)?);
    let check = isbn13_check(&body);

    let mut out = String::with_capacity(13);
    out.push_str("978");
    out.push_str(&isbn10[..9]);
    out.push(check);
    Ok(out)
}

/// Convert an ISBN-13 into ISBN-10. Only `978`-prefixed numbers have one.
pub fn to_isbn10(isbn13: &str) -> Option<String> {
    let isbn13 = normalize_isbn(isbn13).ok()?;
    if isbn13.len() != 13 || !isbn13.starts_with("978") {
        return None;
    }
    let body = digits(&isbn13[3..12], 3).ok()?;
    let mut out = String::with_capacity(10);
    out.push_str(&isbn13[3..12]);
    out.push(isbn10_check(&body));
    Some(out)
}

/// Both forms of one ISBN, as far as they are derivable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsbnForms {
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
}

impl IsbnForms {
    /// Normalize `raw` and derive the other form where one exists.
    pub fn from_raw(raw: &str) -> Result<Self, IsbnError> {
        let normalized = normalize_isbn(raw)?;
        if normalized.len() == 10 {
            let isbn13 = to_isbn13(&normalized)?;
            Ok(Self {
                isbn10: Some(normalized),
                isbn13: Some(isbn13),
            })
        } else {
            Ok(Self {
                isbn10: to_isbn10(&normalized),
                isbn13: Some(normalized),
            })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.isbn10.is_none() && self.isbn13.is_none()
    }
}

fn digits(s: &str, offset: usize) -> Result<Vec<u32>, IsbnError> {
    s.chars()
        .enumerate()
        .map(|(i, c)| c.to_digit(10).ok_or(IsbnError::InvalidCharacter(i + offset)))
        .collect()
}

fn last_char(s: &str) -> char {
    s.chars().last().unwrap_or(' ')
}

/// Mod-11 check over nine digits weighted 10 down to 2.
fn isbn10_check(body: &[u32]) -> char {
    let sum: u32 = body
        .iter()
        .zip((2..=10).rev())
        .map(|(d, w)| d * w)
        .sum();
    match (11 - sum % 11) % 11 {
        10 => 'X',
        n => char::from_digit(n, 10).unwrap_or('0'),
    }
}

/// Mod-10 check over twelve digits weighted 1, 3, 1, 3, ...
fn isbn13_check(body: &[u32]) -> char {
    let sum: u32 = body
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    char::from_digit((10 - sum % 10) % 10, 10).unwrap_or('0')
}
