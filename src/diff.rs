//! Sequence diff primitives
//!
//! This module computes edit scripts between two sequences and exposes them as
//! difflib-style opcodes (`equal`, `replace`, `delete`, `insert`). Both the
//! line-level manifest comparison and the character-level intraline markers
//! are built on it.
//!
//! ## Algorithm
//!
//! 1. Strip the common prefix and suffix. Manifests of the same tree usually
//!    differ in a handful of lines, so this removes most of the work.
//! 2. Drop elements that occur on one side only; they can never match.
//! 3. Run Myers' O(ND) search in its linear-space form on what is left: find
//!    the middle of an optimal edit path, split there and recurse. Memory
//!    stays linear in the input whatever the number of edits.
//! 4. Fold the matched index pairs into opcodes, and optionally group those
//!    into hunks with `n` lines of context.
//!
//! ```rust
//! use diffspot::diff::{opcodes, OpTag};
//!
//! let a = ["a", "b", "c"];
//! let b = ["a", "x", "c"];
//! let ops = opcodes(&a, &b);
//! assert_eq!(ops[1].tag, OpTag::Replace);
//! ```

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Kind of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    /// `a[a_start..a_end] == b[b_start..b_end]`
    Equal,
    /// `a[a_start..a_end]` should be replaced by `b[b_start..b_end]`
    Replace,
    /// `a[a_start..a_end]` should be deleted
    Delete,
    /// `b[b_start..b_end]` should be inserted
    Insert,
}

/// One step of an edit script, as half-open ranges into both sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// What this step does
    pub tag: OpTag,
    /// Start in the first sequence
    pub a_start: usize,
    /// End (exclusive) in the first sequence
    pub a_end: usize,
    /// Start in the second sequence
    pub b_start: usize,
    /// End (exclusive) in the second sequence
    pub b_end: usize,
}

impl Opcode {
    /// Create an opcode
    pub fn new(tag: OpTag, a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> Self {
        Self { tag, a_start, a_end, b_start, b_end }
    }

    /// Number of elements taken from the first sequence
    pub fn a_len(&self) -> usize {
        self.a_end - self.a_start
    }

    /// Number of elements taken from the second sequence
    pub fn b_len(&self) -> usize {
        self.b_end - self.b_start
    }
}

/// Index pairs `(i, j)` with `a[i] == b[j]`, forming a longest common
/// subsequence, in increasing order
pub fn matching_pairs<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let prefix = common_prefix(a, b);
    let suffix = common_suffix(&a[prefix..], &b[prefix..]);
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|i| (i, i)).collect();
    pairs.extend(
        shared_matches(a_mid, b_mid)
            .into_iter()
            .map(|(i, j)| (i + prefix, j + prefix)),
    );
    let a_tail = a.len() - suffix;
    let b_tail = b.len() - suffix;
    pairs.extend((0..suffix).map(|k| (a_tail + k, b_tail + k)));
    pairs
}

fn common_prefix<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Matches between two sequences, searching only elements present in both
///
/// An element missing from the other side can never be matched, so dropping
/// it leaves the longest common subsequence unchanged. Two manifests of
/// different roots share no line at all and cost a single linear pass.
fn shared_matches<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let in_a: HashSet<&T> = a.iter().collect();
    let in_b: HashSet<&T> = b.iter().collect();
    let a_keep: Vec<usize> = (0..a.len()).filter(|&i| in_b.contains(&a[i])).collect();
    let b_keep: Vec<usize> = (0..b.len()).filter(|&j| in_a.contains(&b[j])).collect();
    if a_keep.is_empty() || b_keep.is_empty() {
        return Vec::new();
    }

    let a_sub: Vec<&T> = a_keep.iter().map(|&i| &a[i]).collect();
    let b_sub: Vec<&T> = b_keep.iter().map(|&j| &b[j]).collect();
    let mut pairs = Vec::new();
    bisect(&a_sub, &b_sub, 0, 0, &mut pairs);
    pairs
        .into_iter()
        .map(|(i, j)| (a_keep[i], b_keep[j]))
        .collect()
}

/// Linear-space Myers: split both sequences at a point on an optimal edit
/// path, then solve each half the same way
///
/// `a_base`/`b_base` are the offsets of `a`/`b` in the sequences the pairs
/// refer to. Recursion depth grows with the log of the edit distance.
fn bisect<T: PartialEq>(a: &[T], b: &[T], a_base: usize, b_base: usize, pairs: &mut Vec<(usize, usize)>) {
    let prefix = common_prefix(a, b);
    pairs.extend((0..prefix).map(|i| (a_base + i, b_base + i)));
    let suffix = common_suffix(&a[prefix..], &b[prefix..]);
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    let a_base = a_base + prefix;
    let b_base = b_base + prefix;

    if !a_mid.is_empty() && !b_mid.is_empty() {
        if let Some((x, y)) = middle_snake(a_mid, b_mid) {
            bisect(&a_mid[..x], &b_mid[..y], a_base, b_base, pairs);
            bisect(&a_mid[x..], &b_mid[y..], a_base + x, b_base + y, pairs);
        }
    }

    let a_tail = a_base + a_mid.len();
    let b_tail = b_base + b_mid.len();
    pairs.extend((0..suffix).map(|k| (a_tail + k, b_tail + k)));
}

/// Point where the forward and backward searches of Myers' algorithm meet
///
/// Only two diagonal vectors are kept, so memory is linear in the input.
/// Both inputs must be non-empty and differ in their first and last elements.
fn middle_snake<T: PartialEq>(a: &[T], b: &[T]) -> Option<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = (n + m + 1) / 2;
    let offset = max_d;
    let width = 2 * max_d + 2;
    let mut forward = vec![-1isize; width as usize];
    let mut backward = vec![-1isize; width as usize];
    forward[(offset + 1) as usize] = 0;
    backward[(offset + 1) as usize] = 0;

    let delta = n - m;
    // With an odd delta the paths meet during a forward step.
    let front = delta % 2 != 0;
    // Diagonals that left the grid are skipped from then on.
    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let k1_offset = (offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && forward[k1_offset - 1] < forward[k1_offset + 1]) {
                forward[k1_offset + 1]
            } else {
                forward[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && a[x1 as usize] == b[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            forward[k1_offset] = x1;

            if x1 > n {
                k1_end += 2;
            } else if y1 > m {
                k1_start += 2;
            } else if front {
                let k2_offset = offset + delta - k1;
                if (0..width).contains(&k2_offset) && backward[k2_offset as usize] != -1 {
                    let x2 = n - backward[k2_offset as usize];
                    if x1 >= x2 {
                        return Some((x1 as usize, y1 as usize));
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let k2_offset = (offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && backward[k2_offset - 1] < backward[k2_offset + 1]) {
                backward[k2_offset + 1]
            } else {
                backward[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n && y2 < m && a[(n - x2 - 1) as usize] == b[(m - y2 - 1) as usize] {
                x2 += 1;
                y2 += 1;
            }
            backward[k2_offset] = x2;

            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !front {
                let k1_offset = offset + delta - k2;
                if (0..width).contains(&k1_offset) && forward[k1_offset as usize] != -1 {
                    let x1 = forward[k1_offset as usize];
                    let y1 = offset + x1 - k1_offset;
                    if x1 >= n - x2 {
                        return Some((x1 as usize, y1 as usize));
                    }
                }
            }
            k2 += 2;
        }
    }

    None
}

/// Edit script between `a` and `b` as opcodes covering both sequences
pub fn opcodes<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Opcode> {
    let pairs = matching_pairs(a, b);
    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    let mut idx = 0;

    while idx < pairs.len() {
        let (si, sj) = pairs[idx];
        let mut len = 1;
        while idx + len < pairs.len() && pairs[idx + len] == (si + len, sj + len) {
            len += 1;
        }
        push_gap(&mut ops, i, si, j, sj);
        ops.push(Opcode::new(OpTag::Equal, si, si + len, sj, sj + len));
        i = si + len;
        j = sj + len;
        idx += len;
    }
    push_gap(&mut ops, i, a.len(), j, b.len());

    ops
}

fn push_gap(ops: &mut Vec<Opcode>, a_start: usize, a_end: usize, b_start: usize, b_end: usize) {
    let tag = match (a_start < a_end, b_start < b_end) {
        (true, true) => OpTag::Replace,
        (true, false) => OpTag::Delete,
        (false, true) => OpTag::Insert,
        (false, false) => return,
    };
    ops.push(Opcode::new(tag, a_start, a_end, b_start, b_end));
}

/// Group opcodes into hunks with up to `context` lines of context each
///
/// Leading and trailing equal runs are clipped to `context`; an equal run
/// longer than twice the context splits two hunks. A script without any change
/// yields no hunks at all.
pub fn grouped_opcodes(mut codes: Vec<Opcode>, context: usize) -> Vec<Vec<Opcode>> {
    let n = context;
    if codes.is_empty() {
        codes.push(Opcode::new(OpTag::Equal, 0, 1, 0, 1));
    }

    if let Some(first) = codes.first_mut() {
        if first.tag == OpTag::Equal {
            first.a_start = first.a_start.max(first.a_end.saturating_sub(n));
            first.b_start = first.b_start.max(first.b_end.saturating_sub(n));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == OpTag::Equal {
            last.a_end = last.a_end.min(last.a_start + n);
            last.b_end = last.b_end.min(last.b_start + n);
        }
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for code in codes {
        let mut code = code;
        if code.tag == OpTag::Equal && code.a_len() > n.saturating_mul(2) {
            group.push(Opcode::new(
                OpTag::Equal,
                code.a_start,
                code.a_end.min(code.a_start + n),
                code.b_start,
                code.b_end.min(code.b_start + n),
            ));
            groups.push(std::mem::take(&mut group));
            code.a_start = code.a_start.max(code.a_end.saturating_sub(n));
            code.b_start = code.b_start.max(code.b_end.saturating_sub(n));
        }
        group.push(code);
    }
    if !group.is_empty() && !(group.len() == 1 && group[0].tag == OpTag::Equal) {
        groups.push(group);
    }

    groups
}

/// Similarity of two sequences in `[0, 1]`: twice the matched elements over
/// the total length
pub fn ratio<T: Eq + Hash>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_pairs(a, b).len() as f64 / total as f64
}

/// Upper bound on [`ratio`] from the lengths alone
pub fn real_quick_ratio<T>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * a.len().min(b.len()) as f64 / total as f64
}

/// Upper bound on [`ratio`] from the multiset of elements, ignoring order
pub fn quick_ratio<T: Eq + Hash>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<&T, usize> = HashMap::new();
    for item in b {
        *available.entry(item).or_insert(0) += 1;
    }
    let mut matches = 0usize;
    for item in a {
        if let Some(count) = available.get_mut(item) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}
