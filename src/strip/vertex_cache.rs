/// FIFO post-transform cache. New entries go in at the front and push the
/// oldest one out of the back.
#[derive(Debug, Clone)]
pub struct VertexCache {
    entries: Vec<i32>, // -1 means empty
}

impl VertexCache {
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![-1; size.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, v: u16) -> bool {
        self.entries.contains(&(v as i32))
    }

    /// Insert at the front, returning the evicted entry.
    pub fn add(&mut self, v: u16) -> i32 {
        let removed = self.entries[self.entries.len() - 1];
        self.entries.rotate_right(1);
        self.entries[0] = v as i32;
        removed
    }

    pub fn clear(&mut self) {
        self.entries.fill(-1);
    }

    /// Add the vertices of a face that are not cached yet.
    pub fn touch_face(&mut self, face: &[u16; 3]) {
        for &v in face {
            if !self.contains(v) {
                self.add(v);
            }
        }
    }

    pub fn face_hits(&self, face: &[u16; 3]) -> usize {
        face.iter().filter(|&&v| self.contains(v)).count()
    }

    /// Feed an index stream through the cache and count the misses.
    pub fn count_misses(&mut self, indices: impl IntoIterator<Item = u16>) -> usize {
        let mut misses = 0;
        for v in indices {
            if !self.contains(v) {
                self.add(v);
                misses += 1;
            }
        }
        misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_entry() {
        let mut cache = VertexCache::new(3);
        assert_eq!(cache.add(1), -1);
        cache.add(2);
        cache.add(3);
        assert!(cache.contains(1));
        assert_eq!(cache.add(4), 1);
        assert!(!cache.contains(1));
        assert!(cache.contains(4));
    }

    #[test]
    fn repeated_indices_hit() {
        let mut cache = VertexCache::new(4);
        assert_eq!(cache.count_misses([0, 1, 2, 1, 2, 3, 0]), 4);
        cache.clear();
        assert_eq!(cache.face_hits(&[0, 1, 2]), 0);
    }
}
