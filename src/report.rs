use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// The aggregated profile: global per-event totals plus one entry per
/// reported function. Owns every string it references; the input file
/// can be unmapped once this is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Report {
    pub counters: BTreeMap<String, u64>,
    pub functions: BTreeMap<String, FunctionReport>,
}

/// One function's share of the profile: its per-event totals and its
/// address-ordered, disassembly-annotated lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FunctionReport {
    pub counters: BTreeMap<String, u64>,
    pub data: Vec<ReportLine>,
}

/// One instruction line: the counters observed at `pc` (empty when the
/// instruction was never sampled) and the disassembly text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportLine {
    pub counters: BTreeMap<String, u64>,
    pub pc: u64,
    pub text: String,
}

/// Lines serialize as the `[counters, pc, text]` triple consumed by the
/// analysis database.
impl Serialize for ReportLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.counters)?;
        tuple.serialize_element(&self.pc)?;
        tuple.serialize_element(&self.text)?;
        tuple.end()
    }
}
