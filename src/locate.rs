//! Snippet resolution against live file content.
//!
//! Resolution runs in stages and stops at the first success:
//!
//! 1. Verbatim substring match.
//! 2. Whitespace-normalised match. The snippet exists but its indentation or
//!    line breaks drifted, so a concrete block is recovered from the file,
//!    anchored on the snippet's first line and bounded by indentation.
//! 3. Not found.
//!
//! Stage 2 never guesses content it cannot anchor to a literal line of the
//! file.

/// A resolved span of file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located<'a> {
    /// Byte offset of `text` in the content.
    pub start: usize,
    pub text: &'a str,
}

impl Located<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome<'a> {
    /// The snippet occurs verbatim.
    ExactMatch(Located<'a>),
    /// The snippet only matches modulo whitespace; this block stands in for it.
    RecoveredBlock(Located<'a>),
    NotFound,
}

impl<'a> LocateOutcome<'a> {
    pub fn located(&self) -> Option<Located<'a>> {
        match self {
            LocateOutcome::ExactMatch(found) | LocateOutcome::RecoveredBlock(found) => {
                Some(*found)
            }
            LocateOutcome::NotFound => None,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, LocateOutcome::RecoveredBlock(_))
    }
}

/// Nearest line to a missing snippet, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct LineHint {
    /// 1-based.
    pub line_number: usize,
    pub text: String,
    pub similarity: f64,
}

const HINT_THRESHOLD: f64 = 0.6;

/// Collapse every whitespace run (newlines included) to one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    /// Line text without its terminator.
    body: &'a str,
}

impl Line<'_> {
    fn indent(&self) -> usize {
        self.body.len() - self.body.trim_start().len()
    }

    fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }

    fn end(&self) -> usize {
        self.start + self.body.len()
    }
}

fn lines_with_offsets(content: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    content
        .split_inclusive('\n')
        .map(|raw| {
            let body = raw.strip_suffix('\n').unwrap_or(raw);
            let body = body.strip_suffix('\r').unwrap_or(body);
            let line = Line {
                start: offset,
                body,
            };
            offset += raw.len();
            line
        })
        .collect()
}

fn first_meaningful_line(snippet: &str) -> Option<&str> {
    snippet.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Resolves snippets against one file's current content.
#[derive(Debug, Clone, Copy)]
pub struct SnippetLocator<'a> {
    content: &'a str,
}

impl<'a> SnippetLocator<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { content }
    }

    pub fn locate(&self, snippet: &str) -> LocateOutcome<'a> {
        // An empty needle would match at offset 0 of every file.
        if snippet.trim().is_empty() {
            return LocateOutcome::NotFound;
        }

        if let Some(found) = self.exact(snippet) {
            return LocateOutcome::ExactMatch(found);
        }

        if let Some(found) = self.recover(snippet) {
            tracing::debug!(
                start = found.start,
                len = found.text.len(),
                "recovered reformatted snippet block"
            );
            return LocateOutcome::RecoveredBlock(found);
        }

        LocateOutcome::NotFound
    }

    fn exact(&self, snippet: &str) -> Option<Located<'a>> {
        let start = self.content.find(snippet)?;
        Some(Located {
            start,
            text: &self.content[start..start + snippet.len()],
        })
    }

    fn recover(&self, snippet: &str) -> Option<Located<'a>> {
        let normalized_snippet = normalize_whitespace(snippet);
        if normalized_snippet.is_empty()
            || !normalize_whitespace(self.content).contains(&normalized_snippet)
        {
            return None;
        }

        let anchor_text = first_meaningful_line(snippet)?;
        let lines = lines_with_offsets(self.content);
        let anchor_idx = lines
            .iter()
            .position(|line| line.body.trim() == anchor_text)?;

        let anchor = lines[anchor_idx];
        let base_indent = anchor.indent();
        let mut end = anchor.end();

        // Blank lines always belong to the block; end of file terminates it
        // like an under-indented line.
        for line in &lines[anchor_idx + 1..] {
            if !line.is_blank() && line.indent() < base_indent {
                break;
            }
            end = line.end();
        }

        Some(Located {
            start: anchor.start,
            text: &self.content[anchor.start..end],
        })
    }

    /// The file line most similar to the snippet's first line, if any line is
    /// close enough to be worth showing.
    pub fn closest_line(&self, snippet: &str) -> Option<LineHint> {
        let target = first_meaningful_line(snippet)?;

        lines_with_offsets(self.content)
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_blank())
            .map(|(idx, line)| {
                let text = line.body.trim();
                (idx, text, strsim::normalized_levenshtein(target, text))
            })
            .filter(|(_, _, score)| *score >= HINT_THRESHOLD)
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(idx, text, similarity)| LineHint {
                line_number: idx + 1,
                text: text.to_string(),
                similarity,
            })
    }
}
