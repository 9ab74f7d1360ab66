use std::fmt;

/// Snapshot of a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    /// Bytes written to the temporary file so far
    pub transferred: u64,
    /// Expected size, when the origin sent a content length
    pub total: Option<u64>,
}

impl TransferProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            transferred: 0,
            total,
        }
    }

    pub fn advance(&mut self, bytes: usize) {
        self.transferred += bytes as u64;
    }

    /// Completion percentage, or `None` when the size is unknown.
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.transferred as f64 * 100.0 / total as f64),
            None => None,
        }
    }
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.total, self.percent()) {
            (Some(total), Some(pct)) => {
                write!(f, "{} / {} bytes ({pct:.2}%)", self.transferred, total)
            }
            _ => write!(f, "{} bytes", self.transferred),
        }
    }
}
