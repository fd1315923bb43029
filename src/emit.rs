use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::aggregate::{Aggregator, CounterMap};
use crate::disasm::Disassembly;
use crate::importer::ImportOptions;
use crate::maps::{Map, MapRegistry};
use crate::report::{FunctionReport, Report, ReportLine};
use crate::symbols::{Symbol, SymbolReader};
use crate::tool::ToolLauncher;

/// Maps below this share of every event are dropped: typically the perf
/// launcher, the shell, and loader libraries that caught a few stray
/// samples while the workload was starting.
const MAP_NOISE_FLOOR: f64 = 0.01;

/// Symbols below this share of every event are dropped from the report.
const SYMBOL_NOISE_FLOOR: f64 = 0.005;

/// Joins the aggregated counts with `nm` symbols and `objdump` output to
/// produce the final report tree.
pub struct Emitter<'a> {
    aggregator: &'a Aggregator,
    registry: &'a MapRegistry,
    options: &'a ImportOptions,
    launcher: &'a dyn ToolLauncher,
}

impl<'a> Emitter<'a> {
    pub fn new(
        aggregator: &'a Aggregator,
        registry: &'a MapRegistry,
        options: &'a ImportOptions,
        launcher: &'a dyn ToolLauncher,
    ) -> Self {
        Self {
            aggregator,
            registry,
            options,
            launcher,
        }
    }

    pub fn emit(&self) -> Report {
        let mut report = Report::default();
        for (name, &count) in self.aggregator.totals() {
            report.counters.insert(name.to_string(), count);
        }

        let symbol_reader = SymbolReader::new(&self.options.nm, &self.options.binary_cache_root);
        for (&map_id, map_events) in self.aggregator.events() {
            if map_events.is_empty() {
                continue;
            }
            let Some(map) = self.registry.get(map_id) else {
                warn!("events recorded against unknown map id {map_id}");
                continue;
            };

            let per_map_totals = match self.aggregator.totals_for_map(map_id) {
                Some(totals) => totals,
                None => continue,
            };
            if !self.any_share_exceeds(per_map_totals, MAP_NOISE_FLOOR) {
                debug!("dropping low-signal map {}", map.filename);
                continue;
            }

            let symbols = symbol_reader.load(map, self.launcher);
            if symbols.is_empty() {
                debug!("no symbols for {}, skipping map", map.filename);
                continue;
            }

            // Symbol tables and disassembly are file-relative; rebase the
            // pcs once so ET_DYN maps line up with them.
            let adjusted_events: BTreeMap<u64, &CounterMap> = map_events
                .iter()
                .map(|(&pc, counters)| (pc - map.adjust, counters))
                .collect();

            let symbol_totals = accumulate_symbol_totals(&adjusted_events, &symbols);
            for symbol in &symbols {
                let Some(totals) = symbol_totals.get(&symbol.start) else {
                    continue;
                };
                if !self.any_share_exceeds(totals, SYMBOL_NOISE_FLOOR) {
                    continue;
                }
                let function = self.emit_symbol(map, symbol, &adjusted_events, totals);
                report.functions.insert(symbol.name.clone(), function);
            }
        }
        report
    }

    /// True if any event in `counters` holds a share of its global total
    /// strictly above `floor`.
    fn any_share_exceeds(&self, counters: &CounterMap, floor: f64) -> bool {
        counters.iter().any(|(name, &count)| {
            match self.aggregator.totals().get(name) {
                Some(&total) if total > 0 => count as f64 / total as f64 > floor,
                _ => false,
            }
        })
    }

    /// Walk the disassembly of `[symbol.start, symbol.end)` and attach
    /// counters to each sampled instruction address.
    fn emit_symbol(
        &self,
        map: &Map,
        symbol: &Symbol,
        adjusted_events: &BTreeMap<u64, &CounterMap>,
        totals: &CounterMap,
    ) -> FunctionReport {
        let mut disasm = Disassembly::new(
            &self.options.objdump,
            &self.options.binary_cache_root,
            self.launcher,
        );
        disasm.reset(map, symbol.start, symbol.end);

        let mut events = adjusted_events.range(symbol.start..).peekable();
        let mut data = Vec::new();
        loop {
            let address = disasm.next();
            if address >= symbol.end {
                break;
            }
            let counters = match events.peek() {
                Some(&(&pc, counters)) if pc == address => {
                    events.next();
                    owned_counters(counters)
                }
                _ => BTreeMap::new(),
            };
            data.push(ReportLine {
                counters,
                pc: address,
                text: disasm.text().to_string(),
            });
        }

        FunctionReport {
            counters: owned_counters(totals),
            data,
        }
    }
}

/// Walk events and symbols in lockstep (both address-ordered) and sum
/// each symbol's share of every event, keyed by symbol start.
fn accumulate_symbol_totals(
    events: &BTreeMap<u64, &CounterMap>,
    symbols: &[Symbol],
) -> BTreeMap<u64, CounterMap> {
    let mut totals: BTreeMap<u64, CounterMap> = BTreeMap::new();
    let mut symbol_iter = symbols.iter().peekable();
    for (&pc, counters) in events {
        while symbol_iter.peek().is_some_and(|symbol| symbol.end <= pc) {
            symbol_iter.next();
        }
        let Some(symbol) = symbol_iter.peek() else {
            break;
        };
        if pc < symbol.start {
            continue;
        }
        let entry = totals.entry(symbol.start).or_default();
        for (name, &count) in counters.iter() {
            *entry.entry(Arc::clone(name)).or_insert(0) += count;
        }
    }
    totals
}

fn owned_counters(counters: &CounterMap) -> BTreeMap<String, u64> {
    counters
        .iter()
        .map(|(name, &count)| (name.to_string(), count))
        .collect()
}
