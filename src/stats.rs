//! Per-depth timing of root searches, for the host's performance readout.

use std::fmt;
use std::time::Duration;

const DEPTH_BUCKETS: usize = 16;

/// Wall-clock time spent in root searches, bucketed by the root depth used.
///
/// ```
/// use std::time::Duration;
/// use cell_weight_2048::stats::DepthTimings;
/// let mut t = DepthTimings::default();
/// t.record(5, Duration::from_micros(300));
/// t.record(5, Duration::from_micros(100));
/// assert_eq!(t.count(5), 2);
/// assert_eq!(t.average(5), Some(Duration::from_micros(200)));
/// assert_eq!(t.to_string().trim(), "[Depth 5] 200 us * 2 times");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepthTimings {
    total: [Duration; DEPTH_BUCKETS],
    count: [u64; DEPTH_BUCKETS],
}

impl DepthTimings {
    /// Add one search at `depth`. Depths outside `0..16` land in the nearest bucket.
    pub fn record(&mut self, depth: i32, elapsed: Duration) {
        let bucket = bucket(depth);
        self.total[bucket] += elapsed;
        self.count[bucket] += 1;
    }

    /// Number of searches recorded at `depth`.
    pub fn count(&self, depth: i32) -> u64 { self.count[bucket(depth)] }

    /// Mean search time at `depth`, if any search was recorded there.
    pub fn average(&self, depth: i32) -> Option<Duration> {
        let bucket = bucket(depth);
        let count = self.count[bucket];
        if count == 0 {
            return None;
        }
        Some(mean(self.total[bucket], count))
    }

    /// Total searches across every depth.
    pub fn searches(&self) -> u64 { self.count.iter().sum() }

    /// `(depth, average, count)` for every depth that saw a search.
    pub fn iter(&self) -> impl Iterator<Item = (i32, Duration, u64)> + '_ {
        (0..DEPTH_BUCKETS).filter(move |&d| self.count[d] > 0).map(move |d| {
            let depth = d as i32;
            (depth, mean(self.total[d], self.count[d]), self.count[d])
        })
    }
}

impl fmt::Display for DepthTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, average, count) in self.iter() {
            writeln!(f, "[Depth {}] {} us * {} times", depth, average.as_micros(), count)?;
        }
        Ok(())
    }
}

fn mean(total: Duration, count: u64) -> Duration {
    let nanos = total.as_nanos() / count as u128;
    Duration::new((nanos / 1_000_000_000) as u64, (nanos % 1_000_000_000) as u32)
}

#[inline]
fn bucket(depth: i32) -> usize { depth.clamp(0, DEPTH_BUCKETS as i32 - 1) as usize }
