/// Turns held levels into one-tick rising-edge pulses.
///
/// Starts with everything released, so a control already held on the first
/// scan produces an edge on that scan.
#[derive(Debug, Clone)]
pub struct EdgeDetector<const N: usize> {
    prev: [bool; N],
}

impl<const N: usize> EdgeDetector<N> {
    pub fn new() -> Self {
        Self { prev: [false; N] }
    }

    pub fn update(&mut self, levels: &[bool; N]) -> [bool; N] {
        let mut rising = [false; N];
        for ((r, &level), &prev) in rising.iter_mut().zip(levels).zip(&self.prev) {
            *r = level && !prev;
        }
        self.prev = *levels;
        rising
    }
}

impl<const N: usize> Default for EdgeDetector<N> {
    fn default() -> Self {
        Self::new()
    }
}
