//! Manifest comparison engine
//!
//! Two manifests are compared line by line; records are never parsed, so a
//! renamed file shows up as one removed and one added line. The result is a
//! sequence of tagged lines ([`DiffLine`]) that is filtered according to the
//! selected [`FilterMode`] before being written.
//!
//! ## Styles
//!
//! - **Full** ([`full_diff`]): every line of both inputs, prefixed `  `
//!   (common), `- ` (removed) or `+ ` (added). Inside a replaced block, a
//!   removed/added pair that is at least 75% similar is printed adjacently and
//!   followed by `? ` marker lines pointing at the changed characters.
//! - **Unified** ([`unified_diff`]): `---`/`+++` file headers, `@@` hunk
//!   headers and `-`/`+`/` ` prefixed lines, with configurable context.
//!
//! ## Filters
//!
//! | mode | full | unified |
//! |------|------|---------|
//! | differences-only | added + removed | zero context |
//! | include-matches | all but `? ` markers | context spans both inputs |
//! | only-matches | common only | common lines and their hunk headers |
//!
//! ## Difference count
//!
//! Added and removed lines are counted on the unfiltered result and the larger
//! of the two is reported, so a changed record (one removed plus one added
//! line) counts once. Identical inputs always count zero.
//!
//! ## Example
//!
//! ```rust
//! use diffspot::compare::compare_lines;
//! use diffspot::types::DiffOptions;
//!
//! let before = ["/srv/a,11", "/srv/b,22"];
//! let after = ["/srv/a,11", "/srv/b,33"];
//! let comparison = compare_lines(&before, &after, &DiffOptions::default());
//! assert_eq!(comparison.stats.difference_count, 1);
//! assert_eq!(comparison.rendered(), vec!["- /srv/b,22", "+ /srv/b,33"]);
//! ```

use crate::diff::{grouped_opcodes, opcodes, quick_ratio, ratio, real_quick_ratio, OpTag};
use crate::error::{DiffspotError, Result};
use crate::types::{CompareStats, DiffOptions, DiffStyle, FilterMode};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Pairs with a similarity above this are shown with intraline markers
const SIMILARITY_CUTOFF: f64 = 0.75;

/// Replaced blocks with more candidate pairs than this are printed as a plain
/// block of removals followed by a block of additions. Pairing rescans the
/// whole block after every match, so the cost grows with the cube of its size.
const MAX_FANCY_PAIRS: usize = 1_000;

/// Kind of a marker line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    /// `--- name` or `+++ name`
    FileHeader,
    /// `@@ -a,b +c,d @@`
    HunkHeader,
    /// `? ` line pointing at changed characters
    Intraline,
}

/// Classification of a result line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag {
    /// Only in the later manifest
    Added,
    /// Only in the earlier manifest
    Removed,
    /// In both manifests
    Common,
    /// Marker produced by the diff style itself
    Annotation(AnnotationKind),
}

/// One tagged line of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    /// Classification
    pub tag: LineTag,
    /// Manifest line, or the full text of a header, or the intraline tags
    pub content: String,
}

impl DiffLine {
    fn new(tag: LineTag, content: impl Into<String>) -> Self {
        Self { tag, content: content.into() }
    }

    fn annotation(kind: AnnotationKind, content: impl Into<String>) -> Self {
        Self::new(LineTag::Annotation(kind), content)
    }

    /// Text of this line as written to the result file, without terminator
    pub fn render(&self, style: DiffStyle) -> String {
        match (self.tag, style) {
            (LineTag::Added, DiffStyle::Full) => format!("+ {}", self.content),
            (LineTag::Removed, DiffStyle::Full) => format!("- {}", self.content),
            (LineTag::Common, DiffStyle::Full) => format!("  {}", self.content),
            (LineTag::Added, DiffStyle::Unified) => format!("+{}", self.content),
            (LineTag::Removed, DiffStyle::Unified) => format!("-{}", self.content),
            (LineTag::Common, DiffStyle::Unified) => format!(" {}", self.content),
            (LineTag::Annotation(AnnotationKind::Intraline), _) => format!("? {}", self.content),
            (LineTag::Annotation(_), _) => self.content.clone(),
        }
    }
}

/// Filtered result of comparing two manifests
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Style the lines were produced in
    pub style: DiffStyle,
    /// Lines kept by the filter, in order
    pub lines: Vec<DiffLine>,
    /// Counters of the run
    pub stats: CompareStats,
}

impl Comparison {
    /// Rendered output lines, without terminators
    pub fn rendered(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.render(self.style)).collect()
    }

    /// Whether nothing is left to report
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Compare two manifests given as lines
pub fn compare_lines<S: AsRef<str>>(before: &[S], after: &[S], options: &DiffOptions) -> Comparison {
    let start = Instant::now();
    let before: Vec<&str> = before.iter().map(AsRef::as_ref).collect();
    let after: Vec<&str> = after.iter().map(AsRef::as_ref).collect();
    let files_processed = before.len().max(after.len());

    let raw = match options.style {
        DiffStyle::Unified => {
            let context = match options.filter {
                FilterMode::DifferencesOnly => 0,
                FilterMode::IncludeMatches | FilterMode::OnlyMatches => files_processed,
            };
            unified_diff(&before, &after, &options.from_label, &options.to_label, context)
        }
        DiffStyle::Full => full_diff(&before, &after),
    };

    let added = raw.iter().filter(|l| l.tag == LineTag::Added).count();
    let removed = raw.iter().filter(|l| l.tag == LineTag::Removed).count();

    let keep = retain_predicate(options.style, options.filter);
    let mut lines: Vec<DiffLine> = raw.into_iter().filter(|line| keep(line)).collect();
    if options.style == DiffStyle::Unified && options.filter == FilterMode::OnlyMatches {
        lines = drop_empty_hunks(lines);
    }

    let stats = CompareStats {
        files_processed,
        difference_count: added.max(removed),
        added,
        removed,
        lines_written: lines.len(),
        duration: start.elapsed(),
    };
    debug!(
        "Compared {} lines: {} added, {} removed, {} kept",
        files_processed, added, removed, stats.lines_written
    );

    Comparison {
        style: options.style,
        lines,
        stats,
    }
}

fn retain_predicate(style: DiffStyle, filter: FilterMode) -> fn(&DiffLine) -> bool {
    match (style, filter) {
        (DiffStyle::Full, FilterMode::DifferencesOnly) => is_change,
        (DiffStyle::Full, FilterMode::IncludeMatches) => is_not_annotation,
        (DiffStyle::Full, FilterMode::OnlyMatches) => is_common,
        (DiffStyle::Unified, FilterMode::OnlyMatches) => is_common_or_hunk_header,
        (DiffStyle::Unified, _) => keep_all,
    }
}

fn is_change(line: &DiffLine) -> bool {
    matches!(line.tag, LineTag::Added | LineTag::Removed)
}

fn is_not_annotation(line: &DiffLine) -> bool {
    !matches!(line.tag, LineTag::Annotation(_))
}

fn is_common(line: &DiffLine) -> bool {
    line.tag == LineTag::Common
}

fn is_common_or_hunk_header(line: &DiffLine) -> bool {
    matches!(
        line.tag,
        LineTag::Common | LineTag::Annotation(AnnotationKind::HunkHeader)
    )
}

fn keep_all(_: &DiffLine) -> bool {
    true
}

/// Drop hunk headers not followed by any line of their own
fn drop_empty_hunks(lines: Vec<DiffLine>) -> Vec<DiffLine> {
    let mut kept = Vec::with_capacity(lines.len());
    let mut pending_header = None;
    for line in lines {
        if line.tag == LineTag::Annotation(AnnotationKind::HunkHeader) {
            pending_header = Some(line);
            continue;
        }
        if let Some(header) = pending_header.take() {
            kept.push(header);
        }
        kept.push(line);
    }
    kept
}

/// Unified diff of two line sequences with `context` lines of context
///
/// Produces nothing, not even file headers, when the inputs are identical.
pub fn unified_diff(
    before: &[&str],
    after: &[&str],
    from_label: &str,
    to_label: &str,
    context: usize,
) -> Vec<DiffLine> {
    let mut lines = Vec::new();
    let mut started = false;

    for group in grouped_opcodes(opcodes(before, after), context) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        if !started {
            started = true;
            lines.push(DiffLine::annotation(AnnotationKind::FileHeader, format!("--- {}", from_label)));
            lines.push(DiffLine::annotation(AnnotationKind::FileHeader, format!("+++ {}", to_label)));
        }
        lines.push(DiffLine::annotation(
            AnnotationKind::HunkHeader,
            format!(
                "@@ -{} +{} @@",
                format_range(first.a_start, last.a_end),
                format_range(first.b_start, last.b_end)
            ),
        ));

        for op in &group {
            if op.tag == OpTag::Equal {
                lines.extend(before[op.a_start..op.a_end].iter().map(|l| DiffLine::new(LineTag::Common, *l)));
                continue;
            }
            if matches!(op.tag, OpTag::Replace | OpTag::Delete) {
                lines.extend(before[op.a_start..op.a_end].iter().map(|l| DiffLine::new(LineTag::Removed, *l)));
            }
            if matches!(op.tag, OpTag::Replace | OpTag::Insert) {
                lines.extend(after[op.b_start..op.b_end].iter().map(|l| DiffLine::new(LineTag::Added, *l)));
            }
        }
    }

    lines
}

/// Hunk range in unified notation: 1-based start, length omitted when 1
fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let mut beginning = start + 1;
    if length == 1 {
        return beginning.to_string();
    }
    if length == 0 {
        beginning -= 1;
    }
    format!("{},{}", beginning, length)
}

/// Pending work while expanding a replaced block
enum Work {
    Block { alo: usize, ahi: usize, blo: usize, bhi: usize },
    Pair { i: usize, j: usize, identical: bool },
}

/// Full line-by-line comparison, including intraline annotations
pub fn full_diff(before: &[&str], after: &[&str]) -> Vec<DiffLine> {
    let mut out = Vec::new();
    for op in opcodes(before, after) {
        match op.tag {
            OpTag::Equal => dump(&mut out, LineTag::Common, &before[op.a_start..op.a_end]),
            OpTag::Delete => dump(&mut out, LineTag::Removed, &before[op.a_start..op.a_end]),
            OpTag::Insert => dump(&mut out, LineTag::Added, &after[op.b_start..op.b_end]),
            OpTag::Replace => fancy_replace(before, after, op.a_start, op.a_end, op.b_start, op.b_end, &mut out),
        }
    }
    out
}

fn dump(out: &mut Vec<DiffLine>, tag: LineTag, lines: &[&str]) {
    out.extend(lines.iter().map(|l| DiffLine::new(tag, *l)));
}

/// Expand a replaced block, pairing up similar lines
///
/// The most similar pair splits the block in two; both halves are expanded the
/// same way. Work is kept on an explicit stack so long blocks cannot exhaust
/// the call stack.
fn fancy_replace(
    a: &[&str],
    b: &[&str],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
    out: &mut Vec<DiffLine>,
) {
    let mut stack = vec![Work::Block { alo, ahi, blo, bhi }];

    while let Some(work) = stack.pop() {
        match work {
            Work::Pair { i, identical: true, .. } => out.push(DiffLine::new(LineTag::Common, a[i])),
            Work::Pair { i, j, identical: false } => push_marked_pair(a[i], b[j], out),
            Work::Block { alo, ahi, blo, bhi } => match (alo < ahi, blo < bhi) {
                (false, false) => {}
                (true, false) => dump(out, LineTag::Removed, &a[alo..ahi]),
                (false, true) => dump(out, LineTag::Added, &b[blo..bhi]),
                (true, true) => match best_pair(a, b, alo, ahi, blo, bhi) {
                    Some((i, j, identical)) => {
                        stack.push(Work::Block { alo: i + 1, ahi, blo: j + 1, bhi });
                        stack.push(Work::Pair { i, j, identical });
                        stack.push(Work::Block { alo, ahi: i, blo, bhi: j });
                    }
                    None => {
                        // The shorter side goes first.
                        if bhi - blo < ahi - alo {
                            dump(out, LineTag::Added, &b[blo..bhi]);
                            dump(out, LineTag::Removed, &a[alo..ahi]);
                        } else {
                            dump(out, LineTag::Removed, &a[alo..ahi]);
                            dump(out, LineTag::Added, &b[blo..bhi]);
                        }
                    }
                },
            },
        }
    }
}

/// Most similar `(i, j)` pair of a block, or the first identical pair when
/// nothing reaches the cutoff
fn best_pair(
    a: &[&str],
    b: &[&str],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> Option<(usize, usize, bool)> {
    if (ahi - alo).saturating_mul(bhi - blo) > MAX_FANCY_PAIRS {
        return None;
    }

    let a_chars: Vec<Vec<char>> = a[alo..ahi].iter().map(|l| l.chars().collect()).collect();
    let mut best_ratio = SIMILARITY_CUTOFF - 0.01;
    let mut best = None;
    let mut first_identical = None;

    for j in blo..bhi {
        let bj: Vec<char> = b[j].chars().collect();
        for i in alo..ahi {
            if a[i] == b[j] {
                first_identical.get_or_insert((i, j));
                continue;
            }
            let ai = &a_chars[i - alo];
            if real_quick_ratio(ai, &bj) > best_ratio && quick_ratio(ai, &bj) > best_ratio {
                let r = ratio(ai, &bj);
                if r > best_ratio {
                    best_ratio = r;
                    best = Some((i, j));
                }
            }
        }
    }

    if best_ratio < SIMILARITY_CUTOFF {
        first_identical.map(|(i, j)| (i, j, true))
    } else {
        best.map(|(i, j)| (i, j, false))
    }
}

/// Removed/added pair followed by their intraline markers
fn push_marked_pair(a_line: &str, b_line: &str, out: &mut Vec<DiffLine>) {
    let a_chars: Vec<char> = a_line.chars().collect();
    let b_chars: Vec<char> = b_line.chars().collect();
    let mut a_tags = String::new();
    let mut b_tags = String::new();

    for op in opcodes(&a_chars, &b_chars) {
        let (a_mark, b_mark) = match op.tag {
            OpTag::Equal => (' ', ' '),
            OpTag::Replace => ('^', '^'),
            OpTag::Delete => ('-', ' '),
            OpTag::Insert => (' ', '+'),
        };
        if op.tag != OpTag::Insert {
            a_tags.extend(std::iter::repeat(a_mark).take(op.a_len()));
        }
        if op.tag != OpTag::Delete {
            b_tags.extend(std::iter::repeat(b_mark).take(op.b_len()));
        }
    }

    let a_tags = keep_original_whitespace(&a_chars, &a_tags);
    let b_tags = keep_original_whitespace(&b_chars, &b_tags);

    out.push(DiffLine::new(LineTag::Removed, a_line));
    if !a_tags.is_empty() {
        out.push(DiffLine::annotation(AnnotationKind::Intraline, a_tags));
    }
    out.push(DiffLine::new(LineTag::Added, b_line));
    if !b_tags.is_empty() {
        out.push(DiffLine::annotation(AnnotationKind::Intraline, b_tags));
    }
}

/// Copy tabs and other whitespace of the source line under blank tags so the
/// markers line up, then trim the trailing blanks
fn keep_original_whitespace(line: &[char], tags: &str) -> String {
    let kept: String = line
        .iter()
        .zip(tags.chars())
        .map(|(&c, tag)| if tag == ' ' && c.is_whitespace() { c } else { tag })
        .collect();
    kept.trim_end().to_string()
}

/// Read a manifest as lines, decoding invalid UTF-8 lossily
pub fn read_manifest_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| DiffspotError::from_read_error(e, path))?;
    Ok(String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect())
}

/// Write the filtered comparison in one batch, one line each
pub fn write_comparison<W: Write + ?Sized>(sink: &mut W, comparison: &Comparison) -> std::io::Result<()> {
    let mut buffer = String::new();
    for line in comparison.rendered() {
        buffer.push_str(&line);
        buffer.push('\n');
    }
    sink.write_all(buffer.as_bytes())
}
