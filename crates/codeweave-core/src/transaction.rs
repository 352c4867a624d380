//! Transaction Manager
//!
//! Pending text edits are queued per file and validated at enqueue time:
//! ranges must lie inside the file on character boundaries and must not
//! overlap another pending transaction, except that anything nested inside
//! a pending Remove is accepted and dropped. Commit applies each file's
//! transactions back-to-front so earlier offsets stay valid.
//!
//! ## Same-offset ordering
//!
//! Transactions are applied by start descending, then end descending, then
//! priority ascending, then enqueue sequence descending. For several inserts
//! at one offset this means the highest priority ends up textually first,
//! and equal priorities keep their enqueue order in the final text.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};

use crate::model::ByteRange;
use crate::parser::AppliedEdit;

// ============================================================================
// Errors
// ============================================================================

/// Limit carried by resource errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Count(usize),
    Duration(Duration),
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Count(n) => write!(f, "{n} transactions"),
            Threshold::Duration(d) => write!(f, "{:.3}s", d.as_secs_f64()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction on '{file}' at {range} overlaps pending {existing_kind} at {existing}")]
    Conflict {
        file: String,
        range: ByteRange,
        existing: ByteRange,
        existing_kind: TransactionKind,
    },

    #[error("range {range} is outside '{file}' (length {len}) or splits a character")]
    OutOfBounds {
        file: String,
        range: ByteRange,
        len: usize,
    },

    #[error("maximum number of transactions exceeded ({threshold})")]
    MaxTransactionsExceeded { threshold: usize },

    #[error("maximum preview time exceeded ({:.3}s)", threshold.as_secs_f64())]
    MaxPreviewTimeExceeded { threshold: Duration },
}

impl TransactionError {
    /// The limit that tripped, for resource errors.
    pub fn threshold(&self) -> Option<Threshold> {
        match self {
            TransactionError::MaxTransactionsExceeded { threshold } => {
                Some(Threshold::Count(*threshold))
            }
            TransactionError::MaxPreviewTimeExceeded { threshold } => {
                Some(Threshold::Duration(*threshold))
            }
            _ => None,
        }
    }

    pub fn is_resource_limit(&self) -> bool {
        self.threshold().is_some()
    }
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransactionKind {
    Edit,
    Insert,
    Remove,
    /// Delete the whole file from disk and graph
    RemoveFile,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Edit => "edit",
            TransactionKind::Insert => "insert",
            TransactionKind::Remove => "remove",
            TransactionKind::RemoveFile => "remove_file",
        }
    }

    fn removes(&self) -> bool {
        matches!(self, TransactionKind::Remove | TransactionKind::RemoveFile)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued text replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Enqueue sequence number, unique per session
    pub seq: u64,
    pub file: String,
    pub range: ByteRange,
    pub new_content: String,
    pub priority: i32,
    pub kind: TransactionKind,
}

impl Transaction {
    /// Whether two pending transactions touch the same bytes.
    ///
    /// Zero-width inserts only overlap a range they fall strictly inside;
    /// inserts at one offset never overlap each other.
    pub fn overlaps(&self, other: &Transaction) -> bool {
        overlaps(self.range, other.range)
    }

    fn same_request(&self, request: &TransactionRequest) -> bool {
        self.kind == request.kind
            && self.range == request.range
            && self.new_content == request.new_content
            && self.priority == request.priority
    }
}

fn overlaps(a: ByteRange, b: ByteRange) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => false,
        (true, false) => b.start < a.start && a.start < b.end,
        (false, true) => a.start < b.start && b.start < a.end,
        (false, false) => a.overlaps(&b),
    }
}

/// `inner` lies within `outer` such that `outer` removing its bytes makes
/// `inner` meaningless.
fn nested_in(inner: ByteRange, outer: ByteRange) -> bool {
    if inner.is_empty() {
        outer.start < inner.start && inner.start < outer.end
    } else {
        outer.contains(&inner)
    }
}

/// A transaction to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub file: String,
    pub range: ByteRange,
    pub new_content: String,
    pub priority: i32,
    pub kind: TransactionKind,
}

impl TransactionRequest {
    pub fn edit(file: impl Into<String>, range: ByteRange, new_content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            range,
            new_content: new_content.into(),
            priority: 0,
            kind: TransactionKind::Edit,
        }
    }

    pub fn insert(file: impl Into<String>, offset: usize, new_content: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::Insert,
            ..Self::edit(file, ByteRange::point(offset), new_content)
        }
    }

    pub fn remove(file: impl Into<String>, range: ByteRange) -> Self {
        Self {
            kind: TransactionKind::Remove,
            ..Self::edit(file, range, String::new())
        }
    }

    pub fn remove_file(file: impl Into<String>, len: usize) -> Self {
        Self {
            kind: TransactionKind::RemoveFile,
            ..Self::edit(file, ByteRange::new(0, len), String::new())
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// What happened to an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Queued under this sequence number
    Queued(u64),
    /// Nested inside a pending Remove; dropped, the removal wins
    Superseded,
    /// Identical to a pending transaction
    Duplicate,
}

// ============================================================================
// Manager
// ============================================================================

/// Configured resource limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_transactions: Option<usize>,
    pub max_duration: Option<Duration>,
}

/// Pending transactions of one session, keyed by file path.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    pending: BTreeMap<String, Vec<Transaction>>,
    next_seq: u64,
    limits: SessionLimits,
    started: Instant,
    clock: fn() -> Instant,
}

impl TransactionManager {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            pending: BTreeMap::new(),
            next_seq: 0,
            limits,
            started: Instant::now(),
            clock: Instant::now,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: SessionLimits) {
        self.limits = limits;
    }

    /// Restart the preview clock.
    pub fn restart_clock(&mut self) {
        self.started = (self.clock)();
    }

    /// Replace the time source and restart the preview clock from it.
    pub fn set_clock(&mut self, clock: fn() -> Instant) {
        self.clock = clock;
        self.restart_clock();
    }

    pub fn elapsed(&self) -> Duration {
        (self.clock)().saturating_duration_since(self.started)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Paths with pending transactions, sorted.
    pub fn files(&self) -> Vec<String> {
        self.pending.keys().cloned().collect()
    }

    /// Pending transactions for `file` in enqueue order.
    pub fn pending_for(&self, file: &str) -> &[Transaction] {
        self.pending.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.pending.values().flatten()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Remove and return `file`'s transactions in apply order.
    pub fn take_file(&mut self, file: &str) -> Vec<Transaction> {
        let mut transactions = self.pending.remove(file).unwrap_or_default();
        sort_for_apply(&mut transactions);
        transactions
    }

    /// Put back transactions taken with [`take_file`](Self::take_file) whose
    /// commit failed. They are kept in enqueue order.
    pub fn requeue(&mut self, file: &str, mut transactions: Vec<Transaction>) {
        if transactions.is_empty() {
            return;
        }
        let queue = self.pending.entry(file.to_string()).or_default();
        transactions.append(queue);
        transactions.sort_by_key(|t| t.seq);
        *queue = transactions;
    }

    /// Fail when the pending count is over the limit.
    pub fn check_count(&self) -> Result<(), TransactionError> {
        match self.limits.max_transactions {
            Some(max) if self.pending_count() > max => {
                Err(TransactionError::MaxTransactionsExceeded { threshold: max })
            }
            _ => Ok(()),
        }
    }

    /// Fail when the session has run past its time limit.
    pub fn check_time(&self) -> Result<(), TransactionError> {
        match self.limits.max_duration {
            Some(max) if self.elapsed() >= max => {
                Err(TransactionError::MaxPreviewTimeExceeded { threshold: max })
            }
            _ => Ok(()),
        }
    }

    /// Validate and queue `request` against the file's current `text`.
    pub fn enqueue(
        &mut self,
        request: TransactionRequest,
        text: &str,
    ) -> Result<Enqueued, TransactionError> {
        let range = request.range;
        if range.start > range.end
            || range.end > text.len()
            || !text.is_char_boundary(range.start)
            || !text.is_char_boundary(range.end)
        {
            return Err(TransactionError::OutOfBounds {
                file: request.file,
                range,
                len: text.len(),
            });
        }

        let pending = self.pending.get(&request.file).map(Vec::as_slice).unwrap_or(&[]);

        if pending.iter().any(|t| t.same_request(&request)) {
            trace!("duplicate transaction on {} at {}", request.file, range);
            return Ok(Enqueued::Duplicate);
        }
        if pending
            .iter()
            .any(|t| t.kind.removes() && (t.kind == TransactionKind::RemoveFile || nested_in(range, t.range)))
        {
            trace!("transaction on {} at {} superseded by a pending removal", request.file, range);
            return Ok(Enqueued::Superseded);
        }

        let mut request = request;
        let mut dropped: Vec<u64> = Vec::new();

        match request.kind {
            TransactionKind::RemoveFile => {
                dropped.extend(pending.iter().map(|t| t.seq));
            }
            TransactionKind::Remove => {
                // Grow over partially overlapping removals until stable.
                loop {
                    let merge: Vec<&Transaction> = pending
                        .iter()
                        .filter(|t| !dropped.contains(&t.seq))
                        .filter(|t| t.kind == TransactionKind::Remove && overlaps(t.range, request.range))
                        .collect();
                    if merge.is_empty() {
                        break;
                    }
                    for t in merge {
                        request.range = request.range.union(&t.range);
                        dropped.push(t.seq);
                    }
                }
                let nested: Vec<u64> = pending
                    .iter()
                    .filter(|t| !dropped.contains(&t.seq) && nested_in(t.range, request.range))
                    .map(|t| t.seq)
                    .collect();
                dropped.extend(nested);
            }
            TransactionKind::Edit | TransactionKind::Insert => {}
        }

        if let Some(existing) = pending
            .iter()
            .filter(|t| !dropped.contains(&t.seq))
            .find(|t| overlaps(t.range, request.range))
        {
            return Err(TransactionError::Conflict {
                file: request.file,
                range: request.range,
                existing: existing.range,
                existing_kind: existing.kind,
            });
        }

        if let Some(max) = self.limits.max_transactions {
            if self.pending_count() - dropped.len() >= max {
                return Err(TransactionError::MaxTransactionsExceeded { threshold: max });
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let queue = self.pending.entry(request.file.clone()).or_default();
        if !dropped.is_empty() {
            debug!("{} pending transactions on {} absorbed by removal", dropped.len(), request.file);
            queue.retain(|t| !dropped.contains(&t.seq));
        }
        queue.push(Transaction {
            seq,
            file: request.file,
            range: request.range,
            new_content: request.new_content,
            priority: request.priority,
            kind: request.kind,
        });
        Ok(Enqueued::Queued(seq))
    }
}

/// Sort into apply order: start desc, end desc, priority asc, seq desc.
pub fn sort_for_apply(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| {
        (
            Reverse(t.range.start),
            Reverse(t.range.end),
            t.priority,
            Reverse(t.seq),
        )
    });
}

/// Text after applying transactions, with the edits needed to update the
/// syntax tree incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedText {
    pub text: String,
    /// One per transaction, in apply order
    pub edits: Vec<AppliedEdit>,
}

/// Apply `transactions` (already in apply order) to `text`.
pub fn apply_transactions(text: &str, transactions: &[Transaction]) -> AppliedText {
    let mut out = text.to_string();
    let mut edits = Vec::with_capacity(transactions.len());
    for t in transactions {
        out.replace_range(t.range.start..t.range.end, &t.new_content);
        edits.push(AppliedEdit {
            start: t.range.start,
            old_end: t.range.end,
            new_len: t.new_content.len(),
        });
    }
    AppliedText { text: out, edits }
}
