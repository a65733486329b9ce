use std::collections::HashMap;

use crate::domain::ingredient::Ingredient;

use super::registry::ChangeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub name: String,
    pub kept: String,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupePlan {
    pub changes: ChangeSet,
    pub groups: Vec<DuplicateGroup>,
}

impl DedupePlan {
    pub fn removed(&self) -> usize {
        self.changes.deletes.len()
    }
}

/// Collapses default records sharing a case-insensitive name to one. The
/// survivor is a favorite if any, else the most recently used, else the
/// first in `records` order. Custom records are not considered.
pub fn plan_dedupe(records: &[Ingredient]) -> DedupePlan {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Ingredient>> = HashMap::new();
    for record in records.iter().filter(|record| !record.is_custom) {
        let key = record.name_key();
        let members = groups.entry(key.clone()).or_default();
        if members.is_empty() {
            order.push(key);
        }
        members.push(record);
    }

    let mut plan = DedupePlan::default();
    for key in order {
        let Some(members) = groups.get(&key) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        let kept = select_survivor(members);
        let removed: Vec<String> = members
            .iter()
            .filter(|member| member.id != kept.id)
            .map(|member| member.id.clone())
            .collect();
        log::debug!(
            "keeping {} for '{}', removing {} duplicate(s)",
            kept.id,
            kept.name,
            removed.len()
        );
        plan.changes.deletes.extend(removed.iter().cloned());
        plan.groups.push(DuplicateGroup {
            name: kept.name.clone(),
            kept: kept.id.clone(),
            removed,
        });
    }
    plan
}

fn select_survivor<'a>(members: &[&'a Ingredient]) -> &'a Ingredient {
    if let Some(favorite) = members.iter().copied().find(|member| member.is_favorite) {
        return favorite;
    }
    let mut most_recent: Option<&'a Ingredient> = None;
    for &member in members {
        let Some(used_at) = member.last_used_at else {
            continue;
        };
        if most_recent
            .and_then(|best| best.last_used_at)
            .map_or(true, |best_used| used_at > best_used)
        {
            most_recent = Some(member);
        }
    }
    most_recent.unwrap_or(members[0])
}
