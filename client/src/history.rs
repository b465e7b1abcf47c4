//! Recently predicted positions of the local ship.
//!
//! A broadcast that reports one of these positions is something the client
//! already showed, so the local prediction is kept instead of snapping back.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct TrustBuffer {
    positions: VecDeque<(i32, i32)>,
    capacity: usize,
}

impl TrustBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a predicted position, evicting the oldest once full.
    pub fn push(&mut self, position: (i32, i32)) {
        if self.positions.len() == self.capacity {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
    }

    pub fn contains(&self, position: (i32, i32)) -> bool {
        self.positions.contains(&position)
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
