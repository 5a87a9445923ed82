//! # Text Chunking
//!
//! Splits long text into overlapping, fixed-size windows so each window fits
//! in the generation endpoint's context. The overlap carries trailing context
//! from one window into the next so meaning is not lost at the boundary.

use crate::errors::ConfigError;

/// Splits `text` into windows of at most `window_size` characters, each
/// starting `overlap` characters before the end of the previous one.
///
/// Window `k` covers `[k * step, min(k * step + window_size, len))` with
/// `step = window_size - overlap`. Splitting stops at the first window that
/// reaches the end of the text, so the final window may be shorter.
///
/// ```
/// use distill::chunk::split_into_windows;
///
/// let windows = split_into_windows("abcdefghij", 4, 1).unwrap();
/// assert_eq!(windows, vec!["abcd", "defg", "ghij"]);
/// ```
///
/// # Errors
///
/// Returns `ConfigError::InvalidWindow` when `overlap >= window_size`; the
/// window start would never advance.
pub fn split_into_windows(
    text: &str,
    window_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ConfigError> {
    if overlap >= window_size {
        return Err(ConfigError::InvalidWindow {
            window_size,
            overlap,
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let step = window_size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = std::cmp::min(start + window_size, chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(windows)
}

/// Rebuilds the source text from windows produced by [`split_into_windows`]
/// with the same `overlap`.
pub fn join_windows(windows: &[String], overlap: usize) -> String {
    let mut text = String::new();
    for (i, window) in windows.iter().enumerate() {
        if i == 0 {
            text.push_str(window);
        } else {
            text.extend(window.chars().skip(overlap));
        }
    }
    text
}
