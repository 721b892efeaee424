/// Ascending-priority queue. Equal priorities keep insertion order.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    items: Vec<(i32, T)>,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> PriorityQueue<T> {
    pub fn enqueue(&mut self, item: T, priority: i32) {
        let index = self
            .items
            .iter()
            .position(|(existing, _)| *existing > priority)
            .unwrap_or(self.items.len());
        self.items.insert(index, (priority, item));
    }

    pub fn dequeue(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.items.remove(0).1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Empties the queue lowest priority first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..).map(|(_, item)| item)
    }
}
