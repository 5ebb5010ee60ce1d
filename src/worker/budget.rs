//! Per-credential request budget.

/// Counts generation requests issued with one credential.
///
/// The count only grows. Once it reaches the ceiling, no further request is
/// granted and the owning unit stops.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    used: u32,
    max: u32,
}

impl RequestBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// Reserves one request. Returns false, without counting, if none is left.
    pub fn try_acquire(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_never_exceeds_max() {
        let mut budget = RequestBudget::new(3);
        let granted = (0..10).filter(|_| budget.try_acquire()).count();

        assert_eq!(granted, 3);
        assert_eq!(budget.used(), 3);
        assert_eq!(budget.remaining(), 0);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        let mut budget = RequestBudget::new(0);
        assert!(budget.is_exhausted());
        assert!(!budget.try_acquire());
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut budget = RequestBudget::new(250);
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert_eq!(budget.remaining(), 248);
        assert_eq!(budget.max(), 250);
    }
}
