use std::collections::VecDeque;

/// Default capacity of the analysis window.
pub const BUFFER_CAPACITY: usize = 30;

/// Fixed-capacity FIFO window over the most recent samples.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    data: VecDeque<f64>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(BUFFER_CAPACITY)
    }
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            data: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a sample, evicting the oldest one once capacity is exceeded.
    pub fn push(&mut self, sample: f64) {
        self.data.push_back(sample);
        while self.data.len() > self.capacity {
            self.data.pop_front();
        }
    }

    /// Current contents, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut buf = SampleBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            buf.push(v);
        }
        assert_eq!(buf.values(), vec![2.0, 3.0, 4.0]);
        assert!(buf.is_full());
    }

    #[test]
    fn default_capacity_is_thirty() {
        let mut buf = SampleBuffer::default();
        for i in 0..45 {
            buf.push(i as f64);
        }
        assert_eq!(buf.len(), 30);
        assert_eq!(buf.values()[0], 15.0);
    }
}
