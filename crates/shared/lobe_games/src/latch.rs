/// Run an effect at most once per session.
///
/// Each game owns one latch for its completion call. A restart that begins a
/// new session calls [`OnceLatch::reset`].
#[derive(Debug, Clone, Default)]
pub struct OnceLatch {
    fired: bool,
}

impl OnceLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time it is called after construction or reset.
    pub fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_until_reset() {
        let mut l = OnceLatch::new();
        assert!(l.fire());
        assert!(!l.fire());
        assert!(l.has_fired());
        l.reset();
        assert!(l.fire());
    }
}
