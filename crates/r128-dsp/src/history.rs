//! Bounded block history
//!
//! Fixed-capacity ring of block mean-square values. Storage is allocated
//! once; when full, each push overwrites the oldest entry.

/// Oldest-first bounded ring of `f64` block values
#[derive(Debug, Clone)]
pub struct BlockHistory {
    buffer: Vec<f64>,
    /// Index of the oldest entry once full
    head: usize,
    len: usize,
}

impl BlockHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Append a value, returning the oldest one if it was evicted
    #[inline]
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let capacity = self.buffer.len();
        if self.len < capacity {
            self.buffer[self.len] = value;
            self.len += 1;
            None
        } else {
            let evicted = std::mem::replace(&mut self.buffer[self.head], value);
            self.head += 1;
            if self.head == capacity {
                self.head = 0;
            }
            Some(evicted)
        }
    }

    /// Contents as two slices, oldest first
    #[inline]
    pub fn as_slices(&self) -> (&[f64], &[f64]) {
        if self.len < self.buffer.len() {
            (&self.buffer[..self.len], &[])
        } else {
            (&self.buffer[self.head..], &self.buffer[..self.head])
        }
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let (front, back) = self.as_slices();
        front.iter().chain(back.iter()).copied()
    }

    /// Most recently pushed value
    pub fn latest(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let capacity = self.buffer.len();
        let idx = if self.len < capacity {
            self.len - 1
        } else {
            (self.head + capacity - 1) % capacity
        };
        Some(self.buffer[idx])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_in_order() {
        let mut history = BlockHistory::new(4);
        for v in [1.0, 2.0, 3.0] {
            history.push(v);
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        assert_eq!(history.latest(), Some(3.0));
    }

    #[test]
    fn test_evicts_oldest() {
        let mut history = BlockHistory::new(3);
        for v in 1..=7 {
            history.push(v as f64);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![5.0, 6.0, 7.0]);
        assert_eq!(history.latest(), Some(7.0));

        let (front, back) = history.as_slices();
        assert_eq!(front.len() + back.len(), 3);

        assert_eq!(history.push(8.0), Some(5.0));
        assert_eq!(BlockHistory::new(2).push(1.0), None);
    }

    #[test]
    fn test_clear() {
        let mut history = BlockHistory::new(2);
        history.push(1.0);
        history.push(2.0);
        history.push(3.0);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
        history.push(9.0);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![9.0]);
        assert_eq!(history.capacity(), 2);
    }
}
