//! Implementation of sequence counters defined in [RFC 6550 § 7.2]. Values from 128 and greater
//! are used as a linear sequence to indicate a restart and bootstrap the counter. Values less than
//! or equal to 127 are used as a circular sequence number space of size 128. When operating in the
//! circular region, if sequence numbers are detected to be too far apart, then they are not
//! comparable.
//!
//! Ordering follows the RPL rules rather than a total order: two counters can each be
//! "greater" than the other when they are not comparable. This is why the counter exposes
//! [`SequenceCounter::greater_than`] instead of implementing `PartialOrd`.
//!
//! [RFC 6550 § 7.2]: https://datatracker.ietf.org/doc/html/rfc6550#section-7.2

use super::consts::{LOLLIPOP_CIRCULAR_REGION, LOLLIPOP_INIT, SEQUENCE_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceCounter(u8);

impl Default for SequenceCounter {
    fn default() -> Self {
        // RFC6550 7.2 recommends 240 (256 - SEQUENCE_WINDOW) as the initialization value of the
        // counter.
        Self(LOLLIPOP_INIT)
    }
}

impl SequenceCounter {
    /// Create a new sequence counter.
    ///
    /// Use `Self::default()` when a new sequence counter needs to be created with a value that is
    /// recommended in RFC6550 7.2, being 240.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Return the value of the sequence counter.
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Increment the sequence counter.
    ///
    /// When the sequence counter is greater than or equal to 128, the maximum value is 255.
    /// When the sequence counter is less than 128, the maximum value is 127.
    ///
    /// When an increment of the sequence counter would cause the counter to increment beyond its
    /// maximum value, the counter MUST wrap back to zero.
    pub fn increment(&mut self) {
        let max = if self.0 > LOLLIPOP_CIRCULAR_REGION {
            u8::MAX
        } else {
            LOLLIPOP_CIRCULAR_REGION
        };

        self.0 = match self.0.checked_add(1) {
            Some(val) if val <= max => val,
            _ => 0,
        };
    }

    /// Return the counter that follows this one.
    pub fn next(self) -> Self {
        let mut next = self;
        next.increment();
        next
    }

    /// Query whether `self` is newer than `other`.
    pub fn greater_than(&self, other: &Self) -> bool {
        let a = self.0 as i32;
        let b = other.0 as i32;
        let circular = LOLLIPOP_CIRCULAR_REGION as i32;
        let window = SEQUENCE_WINDOW as i32;

        // An initial (linear) value compared with an old circular one.
        if a > circular && b <= circular {
            return (u8::MAX as i32 + 1 + b - a) > window;
        }

        (a > b && (a - b) < window) || (a < b && (b - a) > (circular + 1 - window))
    }
}

impl core::fmt::Display for SequenceCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt(a: u8, b: u8) -> bool {
        SequenceCounter::new(a).greater_than(&SequenceCounter::new(b))
    }

    #[test]
    fn sequence_counter_increment() {
        let mut seq = SequenceCounter::new(253);
        seq.increment();
        assert_eq!(seq.value(), 254);
        seq.increment();
        assert_eq!(seq.value(), 255);
        seq.increment();
        assert_eq!(seq.value(), 0);

        let mut seq = SequenceCounter::new(126);
        seq.increment();
        assert_eq!(seq.value(), 127);
        seq.increment();
        assert_eq!(seq.value(), 0);

        assert_eq!(SequenceCounter::default().value(), 240);
        assert_eq!(SequenceCounter::default().next().value(), 241);
    }

    #[test]
    fn sequence_counter_comparison() {
        assert!(gt(241, 240));
        assert!(!gt(240, 241));
        assert!(gt(121, 120));
        assert!(!gt(120, 121));

        // Leaving the linear region.
        assert!(gt(5, 250));
        assert!(!gt(250, 5));
        assert!(gt(0, 255));

        // Wrapping in the circular region.
        assert!(gt(2, 120));
        assert!(!gt(120, 2));

        // A restarted counter is newer than an old circular one.
        assert!(gt(240, 5));
    }

    #[test]
    fn irreflexive() {
        for v in 0..=255u8 {
            assert!(!gt(v, v));
        }
    }

    #[test]
    fn matches_integer_order_within_window() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let same_region = (a > LOLLIPOP_CIRCULAR_REGION) == (b > LOLLIPOP_CIRCULAR_REGION);
                if same_region && a.abs_diff(b) < SEQUENCE_WINDOW {
                    assert_eq!(gt(a, b), a > b, "a={a} b={b}");
                }
            }
        }
    }

    #[test]
    fn a_few_increments_are_newer() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let old = SequenceCounter::new(rng.gen());
            let mut new = old;
            for _ in 0..rng.gen_range(1..SEQUENCE_WINDOW) {
                new.increment();
            }
            assert!(new.greater_than(&old), "old={old} new={new}");
            assert!(!old.greater_than(&new), "old={old} new={new}");
        }
    }
}
