/// Counters describing traffic through a ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingMetrics {
    /// Candidates written by all producers.
    pub published: u64,
    /// Candidates taken by the supervisor.
    pub consumed: u64,
}

impl RingMetrics {
    /// Candidates written but not yet consumed.
    pub fn unread(&self) -> u64 {
        self.published.saturating_sub(self.consumed)
    }
}

/// Token counts of the free/used semaphores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCounts {
    pub free: usize,
    pub used: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread() {
        let m = RingMetrics {
            published: 7,
            consumed: 3,
        };
        assert_eq!(m.unread(), 4);
        assert_eq!(RingMetrics::default().unread(), 0);
    }
}
