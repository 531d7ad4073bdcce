//! Wall-clock seam. Time budgets and audit timestamps read from a [`Clock`]
//! so tests can drive them by hand.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Time since `earlier`; zero if the clock went backwards.
    fn elapsed_since(&self, earlier: DateTime<Utc>) -> Duration {
        (self.now() - earlier).to_std().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let before = Utc::now();
        assert!(SystemClock.now() >= before);
    }

    #[test]
    fn test_elapsed_since_saturates_at_zero() {
        let now = Utc::now();
        let clock = Fixed(now);

        assert_eq!(
            clock.elapsed_since(now - chrono::Duration::seconds(90)),
            Duration::from_secs(90)
        );
        assert_eq!(
            clock.elapsed_since(now + chrono::Duration::seconds(5)),
            Duration::ZERO
        );
    }
}
