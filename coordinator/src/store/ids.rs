//! Command id generation

/// Hands out command ids that are never reused.
///
/// Every id the coordinator has seen, whether loaded from disk or carried by
/// a report, is fed through [`IdGenerator::observe`] so the next id is
/// always strictly greater. Once `u64::MAX` has been seen there is no such
/// id left and the generator stays exhausted.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: Option<u64>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: Some(0) }
    }

    /// Get the next command ID, or `None` once the id space is used up
    pub fn next_id(&mut self) -> Option<u64> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(id)
    }

    /// Make sure `id` will never be handed out
    pub fn observe(&mut self, id: u64) {
        match (self.next, id.checked_add(1)) {
            (Some(next), Some(after)) if after > next => self.next = Some(after),
            (Some(_), None) => self.next = None,
            _ => {}
        }
    }

    /// The id the next call to `next_id` returns
    pub fn peek(&self) -> Option<u64> {
        self.next
    }
}
