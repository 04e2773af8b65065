//! Capacity accounting.

/// Tracks bytes claimed by reserved and committed buffers against a fixed
/// ceiling.
///
/// Not synchronized on its own: the store keeps it inside the same mutex
/// that serializes every table mutation, so admission and insertion happen
/// as one step.
#[derive(Debug, Clone)]
pub struct Accountant {
    used: u64,
    capacity: u64,
}

impl Accountant {
    pub fn new(capacity: u64) -> Self {
        Self { used: 0, capacity }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Bytes that can still be admitted.
    ///
    /// Admission is strict, so at most `available() - 1` more bytes fit.
    pub fn available(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }

    /// True iff `used + additional < capacity`.
    ///
    /// An exact fit is rejected: the store never reaches 100% utilization.
    pub fn can_admit(&self, additional: u64) -> bool {
        self.used
            .checked_add(additional)
            .is_some_and(|total| total < self.capacity)
    }

    /// Claim `additional` bytes. Callers check [`can_admit`](Self::can_admit) first.
    pub fn admit(&mut self, additional: u64) {
        self.used += additional;
    }

    /// Return `amount` bytes to the pool.
    pub fn release(&mut self, amount: u64) {
        match self.used.checked_sub(amount) {
            Some(used) => self.used = used,
            None => {
                tracing::warn!(
                    used = self.used,
                    amount,
                    "release exceeds accounted usage, clamping to zero"
                );
                self.used = 0;
            }
        }
    }

    /// Fraction of capacity in use, in `[0, 1]`.
    pub fn percent_used(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.used as f32 / self.capacity as f32
    }
}
