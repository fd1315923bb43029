use std::collections::BTreeMap;

/// A loaded region of an executable object.
#[derive(Debug, Clone)]
pub struct Map {
    pub start: u64,
    pub end: u64,
    /// Subtracted from sample pcs to obtain the file-relative addresses
    /// `nm` and `objdump` report: zero for ET_EXEC objects,
    /// `start - pgoff` for ET_DYN objects. Fixed once the map is recorded.
    pub adjust: u64,
    pub filename: String,
}

/// Append-only store of maps plus a time-keyed index answering
/// "which map held address `pc` at time `t`?".
///
/// A process can remap the same address range (exec, dlopen), so the
/// index is keyed by the timestamp of the MMAP record and resolution
/// scans from the newest entry at or before the sample's time.
#[derive(Debug, Default)]
pub struct MapRegistry {
    maps: Vec<Map>,
    by_time: BTreeMap<u64, BTreeMap<u64, usize>>,
}

impl MapRegistry {
    /// Record a map observed at `time`; returns its id.
    pub fn record(&mut self, map: Map, time: u64) -> usize {
        let map_id = self.maps.len();
        self.by_time.entry(time).or_default().insert(map.start, map_id);
        self.maps.push(map);
        map_id
    }

    /// Resolve `(time, pc)` to a map id: the newest timestamp at or
    /// before `time` wins, and within it the greatest start at or below
    /// `pc`. Candidates whose start exceeds `pc` are rejected.
    pub fn resolve(&self, time: u64, pc: u64) -> Option<usize> {
        for by_start in self.by_time.range(..=time).rev().map(|(_, m)| m) {
            if let Some((&start, &map_id)) = by_start.range(..=pc).next_back() {
                debug_assert!(start <= pc);
                return Some(map_id);
            }
        }
        None
    }

    pub fn get(&self, map_id: usize) -> Option<&Map> {
        self.maps.get(map_id)
    }
}
