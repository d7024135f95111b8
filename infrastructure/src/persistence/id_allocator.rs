use domain::AccountId;

/// Monotonic id source owned by a single store. Ids are handed out starting at 1
/// and are never reissued, even after the account holding them is deleted.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments before assigning, so a fresh allocator yields 1.
    pub fn next(&mut self) -> AccountId {
        self.last += 1;
        AccountId::new(self.last)
    }

    #[cfg(test)]
    pub(crate) fn last_issued(&self) -> Option<AccountId> {
        (self.last > 0).then(|| AccountId::new(self.last))
    }
}
