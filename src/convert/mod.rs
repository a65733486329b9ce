use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::fmt;

use serde::Serialize;

use crate::domain::ingredient::ConversionFact;
use crate::domain::ratios::shared_family_ratios;
use crate::domain::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Identity,
    SameFamily,
    DirectFact,
    ReverseFact,
    Chained,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Identity => "identity",
            Stage::SameFamily => "same_family",
            Stage::DirectFact => "direct_fact",
            Stage::ReverseFact => "reverse_fact",
            Stage::Chained => "chained",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub value: f64,
    pub stage: Stage,
    /// Units visited from source to target; only filled for chained results.
    pub path: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    NoPath { from: Unit, to: Unit },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::NoPath { from, to } => {
                write!(f, "no conversion from '{}' to '{}'", from, to)
            }
        }
    }
}

impl Error for ConversionError {}

pub fn resolve(
    amount: f64,
    from: &Unit,
    to: &Unit,
    facts: &[ConversionFact],
) -> Result<f64, ConversionError> {
    resolve_detailed(amount, from, to, facts).map(|conversion| conversion.value)
}

/// Runs the resolution stages in order; the first stage that applies wins
/// even when a later one would also produce a value.
pub fn resolve_detailed(
    amount: f64,
    from: &Unit,
    to: &Unit,
    facts: &[ConversionFact],
) -> Result<Conversion, ConversionError> {
    if from == to {
        return Ok(single_step(amount, Stage::Identity));
    }

    if let Some((from_base, to_base)) = shared_family_ratios(from, to) {
        return Ok(single_step(amount * from_base / to_base, Stage::SameFamily));
    }

    if let Some(fact) = facts
        .iter()
        .find(|fact| fact.from_unit() == from && fact.to_unit() == to)
    {
        return Ok(single_step(
            amount * fact.to_amount() / fact.from_amount(),
            Stage::DirectFact,
        ));
    }

    if let Some(fact) = facts
        .iter()
        .find(|fact| fact.from_unit() == to && fact.to_unit() == from)
    {
        return Ok(single_step(
            amount * fact.from_amount() / fact.to_amount(),
            Stage::ReverseFact,
        ));
    }

    FactGraph::build(facts)
        .shortest_path(amount, from, to)
        .ok_or_else(|| ConversionError::NoPath {
            from: from.clone(),
            to: to.clone(),
        })
}

fn single_step(value: f64, stage: Stage) -> Conversion {
    Conversion {
        value,
        stage,
        path: Vec::new(),
    }
}

/// Per-call adjacency over the units mentioned by one ingredient's facts.
/// Each fact adds a forward and a reverse edge, in fact-list order.
struct FactGraph<'a> {
    nodes: Vec<&'a Unit>,
    index: HashMap<&'a Unit, usize>,
    edges: Vec<Vec<(usize, f64)>>,
}

impl<'a> FactGraph<'a> {
    fn build(facts: &'a [ConversionFact]) -> Self {
        let mut graph = FactGraph {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        };
        for fact in facts {
            let from = graph.node(fact.from_unit());
            let to = graph.node(fact.to_unit());
            graph.edges[from].push((to, fact.forward_multiplier()));
            graph.edges[to].push((from, fact.reverse_multiplier()));
        }
        graph
    }

    fn node(&mut self, unit: &'a Unit) -> usize {
        if let Some(&existing) = self.index.get(unit) {
            return existing;
        }
        let id = self.nodes.len();
        self.nodes.push(unit);
        self.index.insert(unit, id);
        self.edges.push(Vec::new());
        id
    }

    /// Breadth-first search; every node is visited at most once, so the
    /// first path found has the fewest hops and ties go to fact order.
    fn shortest_path(&self, amount: f64, from: &Unit, to: &Unit) -> Option<Conversion> {
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;

        let mut value = vec![None; self.nodes.len()];
        let mut parent = vec![None; self.nodes.len()];
        value[start] = Some(amount);

        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if current == goal {
                break;
            }
            let current_value = value[current]?;
            for &(next, multiplier) in &self.edges[current] {
                if value[next].is_some() {
                    continue;
                }
                value[next] = Some(current_value * multiplier);
                parent[next] = Some(current);
                queue.push_back(next);
            }
        }

        let result = value[goal]?;
        let mut path = vec![self.nodes[goal].clone()];
        let mut cursor = goal;
        while let Some(previous) = parent[cursor] {
            path.push(self.nodes[previous].clone());
            cursor = previous;
        }
        path.reverse();

        Some(Conversion {
            value: result,
            stage: Stage::Chained,
            path,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inconsistency {
    pub from: Unit,
    pub to: Unit,
    pub ratios: Vec<f64>,
}

/// Reports unit pairs that different facts relate with different ratios,
/// directly, through one shared intermediate unit, or against the exact
/// same-family ratio. Informational:
/// the resolver keeps using the first path it discovers.
pub fn find_inconsistencies(facts: &[ConversionFact], tolerance: f64) -> Vec<Inconsistency> {
    let mut derived: Vec<(Unit, Unit, f64)> = Vec::new();
    for fact in facts {
        derived.push((
            fact.from_unit().clone(),
            fact.to_unit().clone(),
            fact.forward_multiplier(),
        ));
        derived.push((
            fact.to_unit().clone(),
            fact.from_unit().clone(),
            fact.reverse_multiplier(),
        ));
    }

    let direct = derived.clone();
    for (a, b, first) in &direct {
        for (c, d, second) in &direct {
            if b == c && a != d {
                derived.push((a.clone(), d.clone(), first * second));
            }
        }
    }
    let chained = derived.clone();
    for (from, to, _) in &chained {
        if let Some((from_base, to_base)) = shared_family_ratios(from, to) {
            derived.push((from.clone(), to.clone(), from_base / to_base));
        }
    }

    let mut findings: Vec<Inconsistency> = Vec::new();
    for (from, to, _) in &derived {
        if from.to_string() >= to.to_string() {
            continue;
        }
        if findings
            .iter()
            .any(|finding| &finding.from == from && &finding.to == to)
        {
            continue;
        }
        let mut ratios: Vec<f64> = Vec::new();
        for (other_from, other_to, ratio) in &derived {
            if other_from != from || other_to != to {
                continue;
            }
            if !ratios
                .iter()
                .any(|known| relative_eq(*known, *ratio, tolerance))
            {
                ratios.push(*ratio);
            }
        }
        if ratios.len() > 1 {
            findings.push(Inconsistency {
                from: from.clone(),
                to: to.clone(),
                ratios,
            });
        }
    }
    findings
}

fn relative_eq(left: f64, right: f64, tolerance: f64) -> bool {
    let scale = left.abs().max(right.abs()).max(f64::MIN_POSITIVE);
    (left - right).abs() / scale <= tolerance
}

#[cfg(test)]
mod tests;
