use crate::executor::predicate::Op;

/// A fixed-width histogram over one integer column, used to estimate the
/// selectivity of comparison predicates.
///
/// Space and estimation time are constant in the number of recorded values:
/// only per-bucket heights are kept, never the values themselves.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    buckets: usize,
    min: i32,
    max: i32,
    width: i32,
    last_bucket_width: i32,
    heights: Vec<usize>,
    total_tuples: usize,
}

impl IntHistogram {
    /// `min` and `max` bound every value the histogram will ever receive;
    /// `add_value` drops anything outside the range. Every bucket but the
    /// last spans `width` values; the last takes the remainder.
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        let span = max - min + 1;
        let width = (span / buckets as i32).max(1);
        IntHistogram {
            buckets,
            min,
            max,
            width,
            last_bucket_width: span - width * (buckets as i32 - 1),
            heights: vec![0; buckets],
            total_tuples: 0,
        }
    }

    /// Counts one value into its bucket.
    pub fn add_value(&mut self, v: i32) {
        if v > self.max || v < self.min {
            return;
        }
        let index = ((v - self.min) / self.width) as usize;
        if index >= self.buckets {
            return;
        }
        self.heights[index] += 1;
        self.total_tuples += 1;
    }

    /// The estimated fraction of recorded values satisfying `value <op> v`.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        let index = self.bucket_index(v);
        let bucket_width = if index < self.buckets - 1 {
            self.width
        } else {
            self.last_bucket_width
        };
        match op {
            Op::Equals => self.eq_selectivity(index, v, bucket_width),
            Op::NotEquals => 1.0 - self.eq_selectivity(index, v, bucket_width),
            Op::GreaterThan => self.gt_selectivity(index, v, bucket_width),
            Op::GreaterThanOrEq => {
                self.eq_selectivity(index, v, bucket_width)
                    + self.gt_selectivity(index, v, bucket_width)
            }
            Op::LessThan => {
                1.0 - self.gt_selectivity(index, v, bucket_width)
                    - self.eq_selectivity(index, v, bucket_width)
            }
            Op::LessThanOrEq => 1.0 - self.gt_selectivity(index, v, bucket_width),
        }
    }

    fn bucket_index(&self, v: i32) -> usize {
        let raw = (v - self.min) / self.width;
        raw.clamp(0, self.buckets as i32 - 1) as usize
    }

    fn eq_selectivity(&self, index: usize, v: i32, bucket_width: i32) -> f64 {
        if v < self.min || v > self.max {
            return 0.0;
        }
        self.heights[index] as f64 / bucket_width as f64 / self.total_tuples as f64
    }

    fn gt_selectivity(&self, index: usize, v: i32, bucket_width: i32) -> f64 {
        if v < self.min {
            return 1.0;
        }
        if v > self.max {
            return 0.0;
        }
        let bucket_edge = index as i32 * self.width + self.min;
        let bucket_ratio = (bucket_edge - v) as f64 / bucket_width as f64;
        let partial = bucket_ratio * (self.heights[index] as f64 / self.total_tuples as f64);
        let tail: usize = self.heights[index + 1..].iter().sum();
        tail as f64 / self.total_tuples as f64 + partial
    }

    /// The mean selectivity over every recorded value; 1 whenever the
    /// histogram is non-empty.
    pub fn avg_selectivity(&self) -> f64 {
        let sum: usize = self.heights.iter().sum();
        sum as f64 / self.total_tuples as f64
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn uniform_1_to_10() -> IntHistogram {
        let mut hist = IntHistogram::new(10, 1, 10);
        for v in 1..=10 {
            hist.add_value(v);
        }
        hist
    }

    #[test]
    fn uniform_distribution_estimates() {
        let hist = uniform_1_to_10();
        assert!((hist.estimate_selectivity(Op::Equals, 3) - 0.1).abs() < EPSILON);
        assert!((hist.estimate_selectivity(Op::GreaterThan, 5) - 0.5).abs() < EPSILON);
        assert!((hist.estimate_selectivity(Op::LessThanOrEq, 5) - 0.5).abs() < EPSILON);
        assert!((hist.estimate_selectivity(Op::NotEquals, 3) - 0.9).abs() < EPSILON);
        assert!((hist.avg_selectivity() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let mut hist = uniform_1_to_10();
        hist.add_value(0);
        hist.add_value(11);
        hist.add_value(i32::MAX);
        assert_eq!(hist.total_tuples(), 10);
    }

    #[test]
    fn heights_always_sum_to_the_total() {
        let mut hist = IntHistogram::new(7, -50, 50);
        for v in [-50, -50, -1, 0, 0, 0, 13, 50, 99, -99] {
            hist.add_value(v);
        }
        // 99 and -99 fall outside the range; eight values remain.
        assert_eq!(hist.total_tuples(), 8);
        assert!((hist.avg_selectivity() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn greater_than_saturates_outside_the_range() {
        let hist = uniform_1_to_10();
        assert!((hist.estimate_selectivity(Op::GreaterThan, -4) - 1.0).abs() < EPSILON);
        assert!(hist.estimate_selectivity(Op::GreaterThan, 42).abs() < EPSILON);
        assert!(hist.estimate_selectivity(Op::Equals, 42).abs() < EPSILON);
        assert!((hist.estimate_selectivity(Op::NotEquals, -4) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn greater_than_and_complement_partition_the_range() {
        let mut hist = IntHistogram::new(9, 0, 100);
        for v in [1, 5, 5, 17, 40, 41, 41, 41, 77, 90, 100] {
            hist.add_value(v);
        }
        for v in 0..=100 {
            let gt = hist.estimate_selectivity(Op::GreaterThan, v);
            let leq = hist.estimate_selectivity(Op::LessThanOrEq, v);
            assert!((gt + leq - 1.0).abs() < EPSILON, "v = {}", v);
        }
    }

    #[test]
    fn skew_lands_in_one_bucket() {
        let mut hist = IntHistogram::new(10, 1, 100);
        for _ in 0..99 {
            hist.add_value(7);
        }
        hist.add_value(93);
        // Bucket width is 10, so equality within the hot bucket spreads its
        // height over ten values.
        assert!((hist.estimate_selectivity(Op::Equals, 7) - 0.099).abs() < EPSILON);
        assert!(hist.estimate_selectivity(Op::GreaterThan, 93) < 0.02);
    }

    #[test]
    fn single_bucket_covers_the_whole_range() {
        let mut hist = IntHistogram::new(1, 0, 9);
        for v in 0..10 {
            hist.add_value(v);
        }
        assert!((hist.estimate_selectivity(Op::Equals, 4) - 0.1).abs() < EPSILON);
        assert!((hist.avg_selectivity() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn narrow_range_widens_buckets_to_one() {
        // More buckets than values: width clamps to 1 and the tail buckets
        // stay unused.
        let mut hist = IntHistogram::new(10, 1, 3);
        for v in [1, 2, 3] {
            hist.add_value(v);
        }
        assert_eq!(hist.total_tuples(), 3);
        assert!((hist.estimate_selectivity(Op::GreaterThan, 0) - 1.0).abs() < EPSILON);
    }
}
