use crate::Alert;

pub const RECENT_ALERTS_CAPACITY: usize = 5;

/// Newest-first window over the alerts observed across poll cycles.
///
/// Order follows observation, not the pipeline timestamp: each merged batch
/// lands ahead of everything already held, keeping its own internal order,
/// and the tail beyond capacity is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentAlerts {
    capacity: usize,
    alerts: Vec<Alert>,
}

impl Default for RecentAlerts {
    fn default() -> Self {
        Self::new(RECENT_ALERTS_CAPACITY)
    }
}

impl RecentAlerts {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "recent alerts capacity must be greater than 0");
        Self {
            capacity,
            alerts: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn as_slice(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// Prepends `batch` and truncates to capacity.
    pub fn merge_batch(&mut self, batch: Vec<Alert>) {
        if batch.is_empty() {
            return;
        }
        let mut merged = batch;
        merged.truncate(self.capacity);
        let room = self.capacity - merged.len();
        merged.extend(self.alerts.drain(..).take(room));
        self.alerts = merged;
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(lga: &str) -> Alert {
        Alert {
            lga: lga.to_string(),
            issue: "Severe Pothole/Structural Failure".to_string(),
            recommended_action: format!("Deploy Road Maintenance Team to {lga} immediately."),
            timestamp: 1_718_000_000.0,
            severity: Some("CRITICAL".to_string()),
        }
    }

    fn regions(buffer: &RecentAlerts) -> Vec<&str> {
        buffer.iter().map(|a| a.lga.as_str()).collect()
    }

    #[test]
    fn second_batch_lands_ahead_and_truncates() {
        let mut buffer = RecentAlerts::default();
        buffer.merge_batch(vec![alert("A"), alert("B")]);
        assert_eq!(regions(&buffer), vec!["A", "B"]);

        buffer.merge_batch(vec![alert("C"), alert("D"), alert("E"), alert("F")]);
        assert_eq!(regions(&buffer), vec!["C", "D", "E", "F", "A"]);
    }

    #[test]
    fn oversized_batch_keeps_its_leading_alerts() {
        let mut buffer = RecentAlerts::default();
        buffer.merge_batch(vec![alert("old")]);
        buffer.merge_batch(
            ["1", "2", "3", "4", "5", "6", "7"]
                .iter()
                .map(|name| alert(name))
                .collect(),
        );
        assert_eq!(regions(&buffer), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn empty_batch_leaves_buffer_untouched() {
        let mut buffer = RecentAlerts::default();
        buffer.merge_batch(vec![alert("A"), alert("B")]);
        let before = buffer.clone();
        buffer.merge_batch(Vec::new());
        assert_eq!(buffer, before);
    }

    #[test]
    fn length_never_exceeds_capacity_across_cycles() {
        let mut buffer = RecentAlerts::default();
        let mut expected: Vec<String> = Vec::new();
        for cycle in 0..12usize {
            let batch: Vec<Alert> = (0..(cycle % 4))
                .map(|idx| alert(&format!("c{cycle}-{idx}")))
                .collect();
            let mut next: Vec<String> = batch.iter().map(|a| a.lga.clone()).collect();
            next.extend(expected.iter().cloned());
            next.truncate(RECENT_ALERTS_CAPACITY);
            expected = next;

            buffer.merge_batch(batch);
            assert!(buffer.len() <= RECENT_ALERTS_CAPACITY);
            assert_eq!(
                buffer.iter().map(|a| a.lga.clone()).collect::<Vec<_>>(),
                expected
            );
        }
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn zero_capacity_is_rejected() {
        let _ = RecentAlerts::new(0);
    }
}
