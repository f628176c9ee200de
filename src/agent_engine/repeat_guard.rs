use std::collections::VecDeque;

/// Detects the planner issuing the same tool-call block over and over.
///
/// Keeps only the last `max_repeat` signatures; fires once all of them are
/// identical.
#[derive(Debug, Clone)]
pub struct RepeatGuard {
    max_repeat: usize,
    recent: VecDeque<String>,
}

impl RepeatGuard {
    pub fn new(max_repeat: usize) -> Self {
        let max_repeat = max_repeat.max(1);
        Self {
            max_repeat,
            recent: VecDeque::with_capacity(max_repeat),
        }
    }

    /// Records `signature` and reports whether the streak threshold is hit.
    pub fn observe(&mut self, signature: impl Into<String>) -> bool {
        self.recent.push_back(signature.into());
        while self.recent.len() > self.max_repeat {
            self.recent.pop_front();
        }
        self.is_repeating()
    }

    pub fn is_repeating(&self) -> bool {
        match self.recent.back() {
            Some(last) => {
                self.recent.len() == self.max_repeat && self.recent.iter().all(|s| s == last)
            }
            None => false,
        }
    }
}
