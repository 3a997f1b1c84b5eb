//! Comment markers: the human-visible projection of what the engine has
//! already handled inside an order's free-text manager comment.
//!
//! Two kinds exist. A per-line suffix marks one line as turned into a task;
//! a state marker line gates a whole category of escalation for the order.

use crate::config::MarkerConfig;
use crate::ledger::OrderState;
use crate::types::DUE_FORMAT;
use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct CommentMarkers {
    line: String,
    comment_requested: String,
    follow_up_requested: String,
}

impl CommentMarkers {
    pub fn new(cfg: &MarkerConfig) -> Self {
        Self {
            line: cfg.line.clone(),
            comment_requested: cfg.comment_requested.clone(),
            follow_up_requested: cfg.follow_up_requested.clone(),
        }
    }

    /// `true` if `line` ends with the per-line marker.
    pub fn is_marked_line(&self, line: &str) -> bool {
        let marker = self.line.trim();
        !marker.is_empty() && line.trim_end().ends_with(marker)
    }

    /// `true` if `line` carries either state marker. Blank markers never match.
    pub fn is_state_line(&self, line: &str) -> bool {
        has_state_marker(line, &self.comment_requested)
            || has_state_marker(line, &self.follow_up_requested)
    }

    /// The line text with any trailing per-line marker removed.
    pub fn strip_line_marker<'a>(&self, line: &'a str) -> &'a str {
        let trimmed = line.trim();
        trimmed
            .strip_suffix(self.line.trim())
            .map(str::trim_end)
            .unwrap_or(trimmed)
    }

    /// The trailing unprocessed lines of `comment`, at most `max_lines`,
    /// joined with `\n` in their original order.
    ///
    /// Lines are trimmed and blank lines dropped. Scanning from the end, the
    /// first processed line (per-line marker, state marker, or `handled`)
    /// ends the tail. Empty when the most recent line is processed.
    pub fn extract_unprocessed_tail(
        &self,
        comment: &str,
        max_lines: usize,
        handled: impl Fn(&str) -> bool,
    ) -> String {
        let lines: Vec<&str> = comment
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let tail: Vec<&str> = lines
            .iter()
            .rev()
            .take_while(|l| !self.is_marked_line(l) && !self.is_state_line(l) && !handled(l))
            .copied()
            .collect();

        tail.into_iter()
            .take(max_lines)
            .rev()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Append the per-line marker to the first unmarked line matching
    /// `source_line`.
    ///
    /// A whole-line match wins over a substring match. Returns `None` when no
    /// line matches (e.g. the extractor paraphrased it); the caller logs and
    /// moves on.
    pub fn mark_line(&self, comment: &str, source_line: &str) -> Option<String> {
        let mut lines: Vec<String> = comment.split('\n').map(str::to_string).collect();
        let idx = self.find_unmarked(&lines, source_line)?;
        let marked = format!("{}{}", lines[idx].trim_end(), self.line);
        lines[idx] = marked;
        Some(lines.join("\n"))
    }

    /// The comment line [`mark_line`](Self::mark_line) would mark, trimmed.
    pub fn matching_line(&self, comment: &str, source_line: &str) -> Option<String> {
        let lines: Vec<&str> = comment.split('\n').collect();
        let idx = self.find_unmarked(&lines, source_line)?;
        Some(lines[idx].trim().to_string())
    }

    fn find_unmarked<S: AsRef<str>>(&self, lines: &[S], source_line: &str) -> Option<usize> {
        let target = self.strip_line_marker(source_line);
        if target.is_empty() {
            return None;
        }
        let unmarked = |l: &str| !self.is_marked_line(l);
        lines
            .iter()
            .position(|l| l.as_ref().trim() == target && unmarked(l.as_ref()))
            .or_else(|| {
                lines
                    .iter()
                    .position(|l| l.as_ref().contains(target) && unmarked(l.as_ref()))
            })
    }

    /// The state recorded in the comment text itself, if any.
    pub fn state_in(&self, comment: &str) -> OrderState {
        if has_state_marker(comment, &self.comment_requested) {
            OrderState::CommentRequested
        } else if has_state_marker(comment, &self.follow_up_requested) {
            OrderState::FollowUpRequested
        } else {
            OrderState::Clean
        }
    }

    pub fn state_marker(&self, state: OrderState) -> Option<&str> {
        match state {
            OrderState::Clean => None,
            OrderState::CommentRequested => Some(self.comment_requested.as_str()),
            OrderState::FollowUpRequested => Some(self.follow_up_requested.as_str()),
        }
        .filter(|m| !m.trim().is_empty())
    }

    /// Hash identifying a comment line independently of its per-line marker.
    pub fn line_hash(&self, line: &str) -> String {
        let digest = Sha256::digest(self.strip_line_marker(line).as_bytes());
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

pub fn has_state_marker(comment: &str, marker: &str) -> bool {
    !marker.trim().is_empty() && comment.contains(marker)
}

/// Append a timestamped state-marker line. An empty comment becomes the
/// marker line alone.
pub fn append_state_marker(comment: &str, marker: &str, timestamp: NaiveDateTime) -> String {
    let line = format!("{marker} {}", timestamp.format(DUE_FORMAT));
    let body = comment.trim_end();
    if body.trim().is_empty() {
        line
    } else {
        format!("{body}\n{line}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
