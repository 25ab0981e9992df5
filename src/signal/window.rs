use std::collections::VecDeque;

/// Fixed-capacity FIFO of the most recent samples. Pushing into a full
/// window evicts the oldest sample.
#[derive(Clone, Debug)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning the evicted one if the window was full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_then_evicts_oldest_first() {
        let capacity = 150;
        let mut window = RollingWindow::new(capacity);

        for n in 0..capacity {
            assert_eq!(window.push(n as f64), None);
        }
        assert!(window.is_full());

        for n in capacity..1000 {
            let evicted = window.push(n as f64);
            assert_eq!(evicted, Some((n - capacity) as f64));
            assert_eq!(window.len(), capacity);

            let expected: Vec<f64> = ((n + 1 - capacity)..=n).map(|v| v as f64).collect();
            assert_eq!(window.iter().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window = RollingWindow::new(3);
        for n in 0..10 {
            window.push(n as f64);
            assert!(window.len() <= 3);
        }
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 3);
    }
}
