// src/extract/mod.rs
// =============================================================================
// This module pulls repository links out of README text.
//
// Submodules:
// - bullet: line-oriented detection of "- [anchor](link)" entries
//
// Only bullet lines are considered. Links in prose, tables or headings are
// deliberately invisible to the crawler, and no markdown parsing happens
// beyond looking at one line at a time.
// =============================================================================

mod bullet;

pub use bullet::bullet_lines;
