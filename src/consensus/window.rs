use super::sample::ClassificationSample;
use std::collections::VecDeque;

/// Bounded FIFO of the most recent classification samples.
///
/// Older samples are evicted as new ones arrive so the voting set never
/// grows past `capacity`. Insertion order is temporal order; nothing is
/// reordered after the fact.
#[derive(Debug, Clone)]
pub struct ConsensusWindow<L> {
    samples: VecDeque<ClassificationSample<L>>,
    capacity: usize,
}

impl<L> ConsensusWindow<L> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: ClassificationSample<L>) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationSample<L>> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
