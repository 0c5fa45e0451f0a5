//! Tidy operations. Each one always succeeds and borrows its input when it
//! has nothing to change.

use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

/// Cell text folded to lower case.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Cell text folded to upper case; gene symbols and IDs usually want this.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

/// Removes every whitespace character, including interior ones.
pub fn remove_whitespace(input: &str) -> Cow<'_, str> {
    if input.chars().any(char::is_whitespace) {
        Cow::Owned(input.chars().filter(|ch| !ch.is_whitespace()).collect())
    } else {
        Cow::Borrowed(input)
    }
}

/// Trims, folds typographic punctuation to ASCII, drops control and
/// zero-width characters, and collapses whitespace runs to one space.
pub fn sanitize(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    let needs_work = trimmed.chars().any(|ch| fold_char(ch) != Some(ch))
        || trimmed.contains("  ")
        || trimmed.chars().any(|ch| ch.is_whitespace() && ch != ' ');
    if !needs_work {
        return Cow::Borrowed(trimmed);
    }
    let mut output = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for ch in trimmed.chars() {
        let Some(folded) = fold_char(ch) else {
            continue;
        };
        if folded.is_whitespace() {
            if !last_was_space {
                output.push(' ');
            }
            last_was_space = true;
        } else {
            output.push(folded);
            last_was_space = false;
        }
    }
    Cow::Owned(output.trim().to_string())
}

fn fold_char(ch: char) -> Option<char> {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => Some('\''),
        '\u{201C}' | '\u{201D}' | '\u{201F}' | '\u{2033}' => Some('"'),
        '\u{2010}'..='\u{2015}' | '\u{2212}' => Some('-'),
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
        '\u{200B}'..='\u{200D}' | '\u{FEFF}' => None,
        '\t' | '\n' | '\r' => Some(' '),
        c if c.is_control() => None,
        c => Some(c),
    }
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex"))
}

/// Keeps only the numbers found in the input, separated by single spaces.
pub fn extract_numbers(input: &str) -> Cow<'_, str> {
    let numbers = number_pattern()
        .find_iter(input)
        .map(|m| m.as_str())
        .collect::<Vec<_>>();
    match numbers.as_slice() {
        [only] if *only == input => Cow::Borrowed(input),
        _ => Cow::Owned(numbers.join(" ")),
    }
}
