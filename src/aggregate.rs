use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-event-name counters. Names are shared with the event table, so
/// crediting a sample clones a pointer, not a string.
pub type CounterMap = BTreeMap<Arc<str>, u64>;

/// Accumulates per-(map, pc, event) counts and the totals derived from
/// them, in a single pass over the sample stream.
#[derive(Debug, Default)]
pub struct Aggregator {
    /// map id -> pc -> event name -> count
    events: BTreeMap<usize, BTreeMap<u64, CounterMap>>,
    /// event name -> count, over every credited sample
    totals: CounterMap,
    /// map id -> event name -> count
    totals_per_map: BTreeMap<usize, CounterMap>,
}

impl Aggregator {
    /// Credit `period` of event `name` at `pc` within `map_id`.
    pub fn credit(&mut self, map_id: usize, pc: u64, name: &Arc<str>, period: u64) {
        *self
            .events
            .entry(map_id)
            .or_default()
            .entry(pc)
            .or_default()
            .entry(Arc::clone(name))
            .or_insert(0) += period;
        *self.totals.entry(Arc::clone(name)).or_insert(0) += period;
        *self
            .totals_per_map
            .entry(map_id)
            .or_default()
            .entry(Arc::clone(name))
            .or_insert(0) += period;
    }

    /// Per-map event counts, ordered by map id.
    pub fn events(&self) -> &BTreeMap<usize, BTreeMap<u64, CounterMap>> {
        &self.events
    }

    pub fn totals(&self) -> &CounterMap {
        &self.totals
    }

    pub fn totals_for_map(&self, map_id: usize) -> Option<&CounterMap> {
        self.totals_per_map.get(&map_id)
    }
}
