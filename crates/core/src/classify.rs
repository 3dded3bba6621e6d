use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::types::{AssignmentDoc, AssignmentStatus};

/// Records due on or before the end of this window count as due soon.
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// Derived time bucket. Never persisted: recomputed from the persisted
/// status plus the due date on every read, so a record can move from
/// `Upcoming` to `Due` with no underlying mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Due,
    Upcoming,
    Completed,
}

/// Seam for anything the classifier can bucket: the aggregation engine
/// wraps assignments with group metadata and still classifies through
/// this.
pub trait Deadline {
    fn status(&self) -> AssignmentStatus;
    fn due_at(&self) -> OffsetDateTime;
    /// Tie-break key so equal due dates order deterministically.
    fn tie_id(&self) -> &str;
}

impl Deadline for AssignmentDoc {
    fn status(&self) -> AssignmentStatus {
        self.status
    }

    fn due_at(&self) -> OffsetDateTime {
        self.due_at
    }

    fn tie_id(&self) -> &str {
        &self.id
    }
}

/// 23:59:59 on the calendar date `days_ahead` days after `now`, in
/// `now`'s UTC offset.
#[must_use]
pub fn end_of_day(now: OffsetDateTime, days_ahead: i64) -> OffsetDateTime {
    let date = now.date().saturating_add(Duration::days(days_ahead));
    PrimitiveDateTime::new(date, time::macros::time!(23:59:59)).assume_offset(now.offset())
}

#[must_use]
pub fn bucket_for(status: AssignmentStatus, due_at: OffsetDateTime, now: OffsetDateTime) -> Bucket {
    if status == AssignmentStatus::Completed {
        return Bucket::Completed;
    }
    if due_at <= end_of_day(now, DUE_SOON_WINDOW_DAYS) {
        Bucket::Due
    } else {
        Bucket::Upcoming
    }
}

/// Persisted status assigned at creation time: already inside today →
/// `Due`, otherwise `Upcoming`.
#[must_use]
pub fn initial_status(due_at: OffsetDateTime, now: OffsetDateTime) -> AssignmentStatus {
    if due_at <= end_of_day(now, 0) {
        AssignmentStatus::Due
    } else {
        AssignmentStatus::Upcoming
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets<T> {
    pub due: Vec<T>,
    pub upcoming: Vec<T>,
    pub completed: Vec<T>,
}

impl<T> Buckets<T> {
    pub fn is_empty(&self) -> bool {
        self.due.is_empty() && self.upcoming.is_empty() && self.completed.is_empty()
    }
}

/// Splits `items` into ordered buckets. Pure: same `(items, now)` in,
/// same buckets and same relative order out. `due` and `upcoming` sort
/// ascending by due date, `completed` descending (most recently due
/// first); ties break on the record id.
pub fn classify<T: Deadline>(items: Vec<T>, now: OffsetDateTime) -> Buckets<T> {
    let mut buckets = Buckets {
        due: Vec::new(),
        upcoming: Vec::new(),
        completed: Vec::new(),
    };

    for item in items {
        match bucket_for(item.status(), item.due_at(), now) {
            Bucket::Due => buckets.due.push(item),
            Bucket::Upcoming => buckets.upcoming.push(item),
            Bucket::Completed => buckets.completed.push(item),
        }
    }

    let ascending = |a: &T, b: &T| {
        a.due_at()
            .cmp(&b.due_at())
            .then_with(|| a.tie_id().cmp(b.tie_id()))
    };
    buckets.due.sort_by(ascending);
    buckets.upcoming.sort_by(ascending);
    buckets.completed.sort_by(|a, b| {
        b.due_at()
            .cmp(&a.due_at())
            .then_with(|| a.tie_id().cmp(b.tie_id()))
    });

    buckets
}
