use crate::circular_queue::CircularQueue;

/// Moving average over the last `capacity` samples.
///
/// Non-finite samples still occupy a slot in the window but never enter the
/// mean, so a single broken measurement cannot poison the average.
#[derive(Debug, Clone)]
pub struct RollingAvg {
    samples: CircularQueue<f64>,
}

impl RollingAvg {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: CircularQueue::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[inline]
    pub fn push(&mut self, sample: f64) -> Option<f64> {
        self.samples.push(sample)
    }

    /// Arithmetic mean of the finite samples, `None` when there are none
    pub fn mean(&self) -> Option<f64> {
        let (sum, count) = self
            .samples
            .iter()
            .filter(|s| s.is_finite())
            .fold((0.0, 0usize), |(sum, n), s| (sum + s, n + 1));

        if count == 0 {
            return None;
        }

        let mean = sum / count as f64;

        if mean.is_finite() {
            Some(mean)
        } else {
            None
        }
    }

    #[inline]
    pub fn latest(&self) -> Option<f64> {
        self.samples.latest().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::RollingAvg;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_over_window() {
        let mut avg = RollingAvg::new(3);
        assert_eq!(avg.mean(), None);

        avg.push(1.0);
        avg.push(2.0);
        avg.push(3.0);
        assert_abs_diff_eq!(avg.mean().unwrap(), 2.0);

        avg.push(6.0);
        assert_abs_diff_eq!(avg.mean().unwrap(), 11.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_samples_are_ignored() {
        let mut avg = RollingAvg::new(4);
        avg.push(f64::NAN);
        assert_eq!(avg.mean(), None);

        avg.push(f64::INFINITY);
        avg.push(4.0);
        avg.push(f64::NEG_INFINITY);
        assert_abs_diff_eq!(avg.mean().unwrap(), 4.0);
        assert_eq!(avg.len(), 4);
    }
}
