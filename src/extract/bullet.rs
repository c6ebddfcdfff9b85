// src/extract/bullet.rs
// =============================================================================
// This module extracts the anchor text and target link from bullet lines.
//
// A README line is a candidate when it:
// - starts with '-'
// - is at least 4 bytes long
// - contains a '['
//
// Two independent extractions run on every candidate line:
//   anchor: text between the first '[' and the next ']'
//   link:   text between the first '(' and the next ')'
//
// A link is only kept when it mentions "github" and does not mention
// "awesome". Lists of lists link to each other endlessly, so following them
// would keep the frontier growing with meta-lists instead of projects.
//
// Rust concepts:
// - Lifetimes: BulletLine<'a> borrows slices of the original line
// - Result<Option<T>, E>: three outcomes (error, not applicable, found)
// - Iterators: bullet_lines() is lazy, nothing is collected up front
// =============================================================================

use crate::error::ExtractError;

const MIN_LINE_LEN: usize = 4;

/// What was found on one bullet line.
///
/// `anchor` and `link` are extracted separately, so a line with a broken
/// anchor can still contribute its link and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletLine<'a> {
    pub anchor: Result<&'a str, ExtractError>,
    /// `Ok(None)` means the link parsed fine but is out of scope.
    pub link: Result<Option<&'a str>, ExtractError>,
}

impl<'a> BulletLine<'a> {
    /// Runs both extractions on `line`, or returns None when the line is not
    /// a bullet link line at all.
    pub fn parse(line: &'a str) -> Option<Self> {
        if !is_bullet_link_line(line) {
            return None;
        }

        Some(BulletLine {
            anchor: extract_anchor(line),
            link: extract_link(line),
        })
    }
}

/// Iterates over every bullet link line of a document.
pub fn bullet_lines(document: &str) -> impl Iterator<Item = BulletLine<'_>> {
    document.lines().filter_map(BulletLine::parse)
}

pub fn is_bullet_link_line(line: &str) -> bool {
    line.contains('[') && line.len() >= MIN_LINE_LEN && line.starts_with('-')
}

/// Returns the text between the first '[' and the ']' after it.
pub fn extract_anchor(line: &str) -> Result<&str, ExtractError> {
    between(line, '[', ']').ok_or_else(|| ExtractError::MalformedAnchor(line.to_string()))
}

/// Returns the text between the first '(' and the ')' after it, filtered
/// through `is_in_scope`.
///
/// Returns:
///   Ok(Some(link)) for an in-scope link
///   Ok(None) when the link is fine but not one we follow
///   Err(MalformedLink) when there is no "(...)" pair on the line
pub fn extract_link(line: &str) -> Result<Option<&str>, ExtractError> {
    let link = between(line, '(', ')').ok_or_else(|| ExtractError::MalformedLink(line.to_string()))?;

    if is_in_scope(link) {
        Ok(Some(link))
    } else {
        Ok(None)
    }
}

pub fn is_in_scope(link: &str) -> bool {
    link.contains("github") && !link.contains("awesome")
}

// Parameters:
//   open, close: delimiters; `close` is searched for after `open` only
fn between(line: &str, open: char, close: char) -> Option<&str> {
    let start = line.find(open)? + open.len_utf8();
    let len = line[start..].find(close)?;
    Some(&line[start..start + len])
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does BulletLine hold Results instead of being a Result itself?
//    - Anchor and link are independent; one failing must not hide the other
//
// 2. What is the '_ in impl Iterator<Item = BulletLine<'_>>?
//    - The items borrow from `document`, and '_ ties them to it
//
// 3. Why find() + slicing instead of a regex?
//    - Only "first opener, next closer" is needed, which find() does directly
// -----------------------------------------------------------------------------
