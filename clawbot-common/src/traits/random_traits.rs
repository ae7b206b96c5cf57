use rand::Rng;
use rand::rngs::StdRng;

/// Uniform random draws used for win rolls and prize picks.
///
/// Production uses an OS-seeded `StdRng`; tests use a seeded `StdRng`
/// or a scripted sequence so outcomes can be asserted exactly.
pub trait RandomSource: Send {
    /// A uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Fills `buf` with random bytes (used for redemption ids and codes).
    fn fill_random(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = (self.next_unit() * 256.0) as u8;
        }
    }
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn fill_random(&mut self, buf: &mut [u8]) {
        self.fill(buf);
    }
}
