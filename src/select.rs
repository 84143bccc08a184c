//! Chapter-selector grammar.
//!
//! A selector is a comma-separated list of single numbers or
//! `start-end` ranges (floats allowed), or the literal `all`. An `all`
//! token anywhere in the list selects every chapter, whatever else is
//! present. A single number naming a chapter that does not exist is an
//! error, surfaced before any download starts; a range that matches
//! nothing is not.

use std::collections::HashSet;

use crate::error::SelectionError;
use crate::extract::Chapter;

fn parse_number(token: &str) -> Result<f64, SelectionError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| SelectionError::InvalidToken(token.to_string()))
}

/// Resolves a selector string against a chapter list.
///
/// Duplicate selections collapse to one: `number` is the selection key,
/// and two downloads of the same chapter would race on one directory.
pub fn resolve_selection(
    selector: &str,
    chapters: &[Chapter],
) -> Result<Vec<Chapter>, SelectionError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(SelectionError::Empty);
    }

    let tokens: Vec<&str> = trimmed.split(',').map(str::trim).collect();

    if tokens.iter().any(|t| t.eq_ignore_ascii_case("all")) {
        return Ok(chapters.to_vec());
    }

    let mut selected: Vec<Chapter> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();

    for token in tokens {
        if let Some((lo, hi)) = token.split_once('-') {
            let lo = parse_number(lo)?;
            let hi = parse_number(hi)?;
            for chapter in chapters
                .iter()
                .filter(|c| lo <= c.number && c.number <= hi)
            {
                if seen.insert(chapter.number.to_bits()) {
                    selected.push(chapter.clone());
                }
            }
        } else {
            let number = parse_number(token)?;
            let found = chapters
                .iter()
                .find(|c| c.number == number)
                .ok_or_else(|| SelectionError::ChapterNotFound(token.to_string()))?;
            if seen.insert(found.number.to_bits()) {
                selected.push(found.clone());
            }
        }
    }

    Ok(selected)
}
