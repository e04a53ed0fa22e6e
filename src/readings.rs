use serde::Serialize;
use std::collections::HashMap;

/// One parsed traffic-sensor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub signal_id: u32,
    pub car_count: u64,
    pub timestamp: String,
}

/// All readings sharing one timestamp, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimestampGroup {
    pub timestamp: String,
    pub readings: Vec<Reading>,
}

/// Readings partitioned by timestamp.
///
/// Groups are ordered by the first appearance of their timestamp in the
/// source. Every later stage walks groups in this order, so it must survive
/// distribution unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimestampGroups {
    groups: Vec<TimestampGroup>,
}

impl TimestampGroups {
    pub fn from_readings(readings: impl IntoIterator<Item = Reading>) -> Self {
        let mut groups: Vec<TimestampGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for reading in readings {
            let slot = *index.entry(reading.timestamp.clone()).or_insert_with(|| {
                groups.push(TimestampGroup {
                    timestamp: reading.timestamp.clone(),
                    readings: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].readings.push(reading);
        }

        Self { groups }
    }

    /// Builds the structure from already-ordered groups, as received over
    /// the wire.
    pub fn from_groups(groups: Vec<TimestampGroup>) -> Self {
        Self { groups }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimestampGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn reading_count(&self) -> usize {
        self.groups.iter().map(|g| g.readings.len()).sum()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.timestamp.as_str())
    }
}
