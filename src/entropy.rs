//! Randomness source used for address generation and neighbor-key rotation.
//!
//! PRNG seeding and the underlying timing-entropy primitive are external
//! collaborators (board-specific: a hardware RNG, cycle counter, or CRC of
//! volatile state); this crate only needs a bounded draw and a hook to stir
//! in fresh entropy before a security-relevant choice.

use rand_core::RngCore;

/// A `RngCore` that can also be asked to mix in fresh timing entropy.
///
/// Implementors typically wrap a `rand_core`-compatible PRNG seeded once at
/// boot, and fold e.g. a free-running cycle counter into its state each time
/// `collect_timing_entropy` is called.
pub trait Entropy: RngCore {
    fn collect_timing_entropy(&mut self);

    /// Draw a value uniformly from `[0, bound)`.
    ///
    /// `bound` must be nonzero.
    fn value_bounded(&mut self, bound: u32) -> u32 {
        debug_assert!(bound > 0);
        self.next_u32() % bound
    }
}

#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    use super::*;
    use rand_core::impls;

    /// Deterministic xorshift generator for tests: no external entropy, but
    /// `collect_timing_entropy` is a no-op rather than missing entirely, so
    /// call sites exercise the same code path as the real thing.
    pub struct MockEntropy {
        state: u64,
    }

    impl MockEntropy {
        pub fn new(seed: u64) -> Self {
            Self { state: seed | 1 }
        }
    }

    impl RngCore for MockEntropy {
        fn next_u32(&mut self) -> u32 {
            (self.next_u64() >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            // xorshift64*
            let mut x = self.state;
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;
            self.state = x;
            x.wrapping_mul(0x2545_f491_4f6c_dd1d)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            impls::fill_bytes_via_next(self, dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl Entropy for MockEntropy {
        fn collect_timing_entropy(&mut self) {
            // No real clock in tests; nudge the state so repeated calls
            // still diverge, the way stirring in a free-running timer would.
            self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        }
    }
}
