use std::fmt::{self, Display, Formatter};

/// Packages processed out of the current batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressCounter {
    pub current: usize,
    pub total: usize,
    pub label: String,
}

impl ProgressCounter {
    pub fn reset(&mut self, label: &str, total: usize) {
        self.current = 0;
        self.total = total;
        self.label.clear();
        self.label.push_str(label);
    }

    /// Counts one more processed package, never exceeding the total.
    pub fn tick(&mut self) {
        if self.current < self.total {
            self.current += 1;
        }
    }
}

impl Display for ProgressCounter {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "{} {}/{}", self.label, self.current, self.total)
    }
}
