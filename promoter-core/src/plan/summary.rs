//! `PlanSummary` — counts per `Op`, per destination registry, reported to an
//! operator before a run asks for confirmation.

use crate::model::Registry;
use crate::plan::edge::{Op, PromotionEdge};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub add: usize,
    pub mv: usize,
    pub delete: usize,
}

impl OpCounts {
    pub fn total(&self) -> usize {
        self.add + self.mv + self.delete
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanSummary {
    pub by_registry: BTreeMap<Registry, OpCounts>,
}

impl PlanSummary {
    pub fn record(&mut self, edge: &PromotionEdge) {
        let counts = self.by_registry.entry(edge.registry.clone()).or_default();
        match edge.op {
            Op::Add => counts.add += 1,
            Op::Move { .. } => counts.mv += 1,
            Op::Delete => counts.delete += 1,
        }
    }

    pub fn total(&self) -> OpCounts {
        self.by_registry.values().fold(OpCounts::default(), |mut acc, c| {
            acc.add += c.add;
            acc.mv += c.mv;
            acc.delete += c.delete;
            acc
        })
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (registry, counts) in &self.by_registry {
            writeln!(
                f,
                "{}: {} add, {} move, {} delete",
                registry, counts.add, counts.mv, counts.delete
            )?;
        }
        let total = self.total();
        write!(f, "total: {} add, {} move, {} delete", total.add, total.mv, total.delete)
    }
}
