//! Unified-diff position mapping for inline comment anchoring.
//!
//! Hosting platforms anchor a single-line inline comment by an offset into
//! the file's patch text, counted over every patch line including hunk
//! headers. [`calculate_diff_position`] translates a reviewer's new-file
//! line number into that offset; a line with no valid anchor (context far
//! from any hunk, or outside the patch entirely) maps to `None`, and the
//! caller degrades to a file-level comment instead of failing.

use regex::Regex;

/// Translates a 1-indexed new-file line into the patch-relative position.
///
/// The position counter advances by exactly one per patch line examined
/// (hunk headers included); only the new-file line counter is conditional:
/// a hunk header `@@ -old[,len] +new[,len] @@` resets it to `new - 1`, a
/// deletion line leaves it untouched, everything else advances it.
pub fn calculate_diff_position(patch: &str, target_line: u32) -> Option<u32> {
    let hunk_re = Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,\d+)? @@").unwrap();

    let mut current_line: u32 = 0;
    let mut diff_position: u32 = 0;

    for line in patch.lines() {
        diff_position += 1;

        if let Some(caps) = hunk_re.captures(line) {
            let new_start: u32 = caps[1].parse().unwrap_or(0);
            current_line = new_start.saturating_sub(1);
            continue;
        }

        if !line.starts_with('-') {
            current_line += 1;
        }
        if current_line == target_line {
            return Some(diff_position);
        }
    }

    None
}
