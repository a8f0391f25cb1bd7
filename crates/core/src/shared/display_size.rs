/// Pixel dimensions of the displayed video, which the overlay matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Per-axis factors that map coordinates in `self` onto `target`.
    pub fn scale_to(&self, target: DisplaySize) -> (f64, f64) {
        if self.is_empty() {
            return (1.0, 1.0);
        }
        (
            target.width as f64 / self.width as f64,
            target.height as f64 / self.height as f64,
        )
    }
}

impl std::fmt::Display for DisplaySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
