use serde::ser::{Serialize, SerializeMap, Serializer};

use super::event::InterceptionKind;

/// One monotonically non-decreasing counter per interception kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSet {
    counts: [u64; InterceptionKind::ALL.len()],
}

impl CounterSet {
    pub fn get(&self, kind: InterceptionKind) -> u64 {
        self.counts[kind.index()]
    }

    /// Increments and returns the new value, which doubles as the event's sequence number.
    pub(crate) fn bump(&mut self, kind: InterceptionKind) -> u64 {
        let slot = &mut self.counts[kind.index()];
        *slot += 1;
        *slot
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InterceptionKind, u64)> + '_ {
        InterceptionKind::ALL.iter().map(move |k| (*k, self.get(*k)))
    }
}

impl Serialize for CounterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (kind, count) in self.iter() {
            map.serialize_entry(&kind, &count)?;
        }
        map.end()
    }
}
