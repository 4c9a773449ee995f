use crate::shared::constants::MAX_FEATURES;
use crate::shared::geometry::Point2f;

/// Fixed-capacity set of tracked feature points, stored inline.
#[derive(Clone, Debug, PartialEq)]
pub struct FeaturePoints {
    points: [Point2f; MAX_FEATURES],
    len: usize,
}

impl FeaturePoints {
    pub const CAPACITY: usize = MAX_FEATURES;

    pub fn new() -> Self {
        Self {
            points: [Point2f::ZERO; MAX_FEATURES],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == Self::CAPACITY
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Appends a point; returns `false` when already full.
    pub fn push(&mut self, p: Point2f) -> bool {
        if self.is_full() {
            return false;
        }
        self.points[self.len] = p;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[Point2f] {
        &self.points[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Point2f] {
        &mut self.points[..self.len]
    }

    /// Shifts every valid point by `offset`.
    pub fn translate(&mut self, offset: Point2f) {
        for p in self.as_mut_slice() {
            *p = *p + offset;
        }
    }

    /// Compacts in place: `f(index, point)` returns the replacement for a
    /// surviving point or `None` to drop it. Order is preserved. Returns the
    /// number of survivors.
    pub fn retain_map<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(usize, Point2f) -> Option<Point2f>,
    {
        let mut write = 0;
        for read in 0..self.len {
            if let Some(p) = f(read, self.points[read]) {
                self.points[write] = p;
                write += 1;
            }
        }
        self.len = write;
        write
    }
}

impl Default for FeaturePoints {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> FeaturePoints {
        let mut fp = FeaturePoints::new();
        for i in 0..n {
            fp.push(Point2f::new(i as f32, 2.0 * i as f32));
        }
        fp
    }

    #[test]
    fn test_push_until_full() {
        let mut fp = filled(MAX_FEATURES);
        assert!(fp.is_full());
        assert!(!fp.push(Point2f::new(99.0, 99.0)));
        assert_eq!(fp.len(), MAX_FEATURES);
    }

    #[test]
    fn test_clear_empties() {
        let mut fp = filled(4);
        fp.clear();
        assert!(fp.is_empty());
        assert!(fp.as_slice().is_empty());
    }

    #[test]
    fn test_retain_compacts_in_order() {
        let mut fp = filled(6);
        let kept = fp.retain_map(|i, p| (i % 2 == 1).then_some(p));
        assert_eq!(kept, 3);
        let xs: Vec<f32> = fp.as_slice().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_retain_none() {
        let mut fp = filled(3);
        assert_eq!(fp.retain_map(|_, _| None), 0);
        assert!(fp.is_empty());
    }

    #[test]
    fn test_retain_map_replaces_survivors() {
        let mut fp = filled(3);
        fp.retain_map(|i, p| (i != 1).then(|| Point2f::new(p.x + 0.5, p.y)));
        assert_eq!(fp.as_slice(), &[Point2f::new(0.5, 0.0), Point2f::new(2.5, 4.0)]);
    }

    #[test]
    fn test_translate_moves_only_valid_points() {
        let mut fp = filled(2);
        fp.translate(Point2f::new(10.0, -1.0));
        assert_eq!(fp.as_slice()[0], Point2f::new(10.0, -1.0));
        assert_eq!(fp.as_slice()[1], Point2f::new(11.0, 1.0));
    }
}
