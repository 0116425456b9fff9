//! The Trickle timer of DIO transmissions (RFC 6206, RFC 6550 § 8.3).
//!
//! The interval `I` is `2^i_current` milliseconds. In every interval a DIO is sent at a random
//! point `t` in `[I/2, I]`, unless `k` or more consistent DIOs were heard during the interval.
//! At the end of the interval, `I` is doubled, up to `2^(i_min + doublings)`.
//!
//! The timer does not keep deadlines itself: every operation returns the delay after which the
//! owner must call [`TrickleTimer::fire`].

use crate::rand::Rand;
use crate::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrickleTimer {
    i_min: u8,
    doublings: u8,
    k: u8,

    /// Exponent of the current interval. 0 until the timer is first reset.
    i_current: u8,
    counter: u8,
    /// Whether the next expiration is the transmission point of the interval.
    send: bool,
    /// Time left in the interval after the transmission point.
    next_delay: Duration,
}

/// What an expiration of the timer amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fired {
    /// The transmission point of the interval was reached and the DIO is not suppressed.
    pub transmit: bool,
    /// Delay until the next call to [`TrickleTimer::fire`].
    pub next: Duration,
}

impl TrickleTimer {
    pub(crate) const fn new(i_min: u8, doublings: u8, k: u8) -> Self {
        Self {
            i_min,
            doublings,
            k,
            i_current: 0,
            counter: 0,
            send: false,
            next_delay: Duration::ZERO,
        }
    }

    pub(crate) fn i_current(&self) -> u8 {
        self.i_current
    }

    pub(crate) fn i_min(&self) -> u8 {
        self.i_min
    }

    pub(crate) fn doublings(&self) -> u8 {
        self.doublings
    }

    pub(crate) fn redundancy(&self) -> u8 {
        self.k
    }

    /// The length of the current interval.
    pub(crate) fn interval(&self) -> Duration {
        Duration::from_millis(1u64 << self.i_current.min(63))
    }

    /// Start a new interval of length `2^i_current` and return the delay until its transmission
    /// point.
    fn new_interval(&mut self, rand: &mut Rand) -> Duration {
        let i = self.interval().total_millis();
        let half = i / 2;
        let t = half + (rand.rand_u32() as u64) % (half + 1);

        self.next_delay = Duration::from_millis(i - t);
        self.send = true;
        self.counter = 0;

        net_trace!("trickle: new interval I={} ms, t={} ms", i, t);
        Duration::from_millis(t)
    }

    /// Query whether a reset would shorten the interval.
    ///
    /// A timer already at `i_min` is left running, to not postpone its transmission.
    pub(crate) fn needs_reset(&self) -> bool {
        self.i_current == 0 || self.i_current > self.i_min
    }

    /// Go back to the shortest interval. Returns the delay until the transmission point.
    pub(crate) fn reset(&mut self, rand: &mut Rand) -> Duration {
        self.counter = 0;
        self.i_current = self.i_min;
        self.new_interval(rand)
    }

    /// Signal that a consistent DIO was heard.
    pub(crate) fn hear_consistent(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    /// Process an expiration of the timer.
    ///
    /// A root never suppresses its DIOs, and neither does a timer with a redundancy constant
    /// of 0.
    pub(crate) fn fire(&mut self, is_root: bool, rand: &mut Rand) -> Fired {
        if self.send {
            self.send = false;
            let transmit = is_root || self.k == 0 || self.counter < self.k;
            return Fired {
                transmit,
                next: self.next_delay,
            };
        }

        if self.i_current < self.i_min.saturating_add(self.doublings) {
            self.i_current += 1;
        }
        Fired {
            transmit: false,
            next: self.new_interval(rand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_starts_at_i_min() {
        let mut rand = Rand::new(1234);
        let mut trickle = TrickleTimer::new(12, 8, 0);
        assert!(trickle.needs_reset());

        let t = trickle.reset(&mut rand);
        assert_eq!(trickle.i_current(), 12);
        assert!(t >= Duration::from_millis(2048));
        assert!(t <= Duration::from_millis(4096));
        assert!(!trickle.needs_reset());

        // The send point plus the rest of the interval is the full interval.
        let fired = trickle.fire(false, &mut rand);
        assert!(fired.transmit);
        assert_eq!(t + fired.next, Duration::from_millis(4096));
    }

    #[test]
    fn interval_doubling_is_bounded() {
        let mut rand = Rand::new(42);
        let mut trickle = TrickleTimer::new(4, 2, 0);
        trickle.reset(&mut rand);

        for _ in 0..10 {
            trickle.fire(false, &mut rand);
            trickle.fire(false, &mut rand);
        }
        assert_eq!(trickle.i_current(), 6);
        assert_eq!(trickle.interval(), Duration::from_millis(64));
        assert!(trickle.needs_reset());
    }

    #[test]
    fn redundancy_suppresses() {
        let mut rand = Rand::new(7);
        let mut trickle = TrickleTimer::new(8, 4, 2);
        trickle.reset(&mut rand);
        trickle.hear_consistent();
        trickle.hear_consistent();

        assert!(!trickle.fire(false, &mut rand).transmit);

        // The counter is reset at the start of the next interval.
        trickle.fire(false, &mut rand);
        assert!(trickle.fire(false, &mut rand).transmit);
    }

    #[test]
    fn root_is_never_suppressed() {
        let mut rand = Rand::new(7);
        let mut trickle = TrickleTimer::new(8, 4, 1);
        trickle.reset(&mut rand);
        trickle.hear_consistent();
        assert!(trickle.fire(true, &mut rand).transmit);
    }
}
