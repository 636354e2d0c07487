//! Page filename conventions: extension handling, titles, and name checks.

use crate::error::{Error, Result};

/// Extension every page filename carries.
pub const PAGE_EXTENSION: &str = ".md";

/// Strip the `.md` suffix from a page filename.
///
/// # Examples
///
/// ```
/// use jugaadpress::markdown::page_stem;
///
/// assert_eq!(page_stem("01_intro.md"), "01_intro");
/// assert_eq!(page_stem("notes"), "notes");
/// ```
pub fn page_stem(filename: &str) -> &str {
    filename.strip_suffix(PAGE_EXTENSION).unwrap_or(filename)
}

/// Human title for a page: stem with underscores as spaces, title-cased.
///
/// # Examples
///
/// ```
/// use jugaadpress::markdown::page_title;
///
/// assert_eq!(page_title("01_intro.md"), "01 Intro");
/// assert_eq!(page_title("verb_CONJUGATION.md"), "Verb Conjugation");
/// ```
pub fn page_title(filename: &str) -> String {
    title_case(&page_stem(filename).replace('_', " "))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

/// Turn a user-supplied page name into a filename, appending `.md` if needed.
pub fn normalize_page_name(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(PAGE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{PAGE_EXTENSION}")
    }
}

/// Whether a directory entry is a visible markdown page.
pub fn is_page_file(name: &str) -> bool {
    name.ends_with(PAGE_EXTENSION) && name.len() > PAGE_EXTENSION.len() && !name.starts_with('.')
}

/// Reject names that could escape their folder or collide with hidden files.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::InvalidName(format!("'{name}' {reason}")));

    if name.trim().is_empty() {
        return invalid("is empty");
    }
    if name.starts_with('.') {
        return invalid("may not start with '.'");
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return invalid("may not contain path separators");
    }
    if name.chars().any(char::is_control) {
        return invalid("may not contain control characters");
    }
    Ok(())
}
