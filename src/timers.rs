//! Deferred callbacks expressed as data.
//!
//! Nothing in the core blocks: "do this in 800 ms" becomes an entry here that
//! the frame loop drains once its deadline has passed.

#[derive(Debug, Clone, PartialEq)]
struct Scheduled<T> {
    due_ms: f64,
    seq: u64,
    payload: T,
}

#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    entries: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn schedule_at(&mut self, due_ms: f64, payload: T) {
        self.entries.push(Scheduled {
            due_ms,
            seq: self.next_seq,
            payload,
        });
        self.next_seq += 1;
    }

    pub fn schedule_after(&mut self, now_ms: f64, delay_ms: f64, payload: T) {
        self.schedule_at(now_ms + delay_ms.max(0.0), payload);
    }

    /// Remove and return every payload due at `now_ms`, earliest first.
    /// Entries with the same deadline come out in scheduling order.
    pub fn drain_due(&mut self, now_ms: f64) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|e| e.due_ms <= now_ms);
        self.entries = pending;
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|e| e.payload).collect()
    }

    /// Drop scheduled entries matching `pred`. Returns how many were removed.
    pub fn cancel_where(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !pred(&e.payload));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
