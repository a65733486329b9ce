use std::collections::HashSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::dataset::IngredientDescriptor;
use crate::domain::ingredient::{name_key, ConversionFact, Ingredient};

use super::registry::ChangeSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    pub changes: ChangeSet,
    pub inserted: usize,
    pub updated: usize,
    pub renamed: usize,
    pub preserved_custom: usize,
    pub skipped_facts: usize,
    pub skipped_ingredients: usize,
}

/// First-launch load: every descriptor becomes a new default record.
pub fn plan_bulk_load(descriptors: &[IngredientDescriptor], now: OffsetDateTime) -> MergePlan {
    let mut plan = MergePlan::default();
    for descriptor in descriptors {
        let Some(facts) = usable_facts(descriptor, &mut plan) else {
            continue;
        };
        plan.changes.inserts.push(new_default(descriptor, facts, now));
        plan.inserted += 1;
    }
    plan
}

/// Matches each descriptor against the existing default records, by stable
/// id first and by case-insensitive name second. Custom records are never
/// targets.
pub fn plan_merge(
    existing: &[Ingredient],
    descriptors: &[IngredientDescriptor],
    now: OffsetDateTime,
) -> MergePlan {
    let incoming_ids: HashSet<&str> = descriptors
        .iter()
        .filter_map(|descriptor| descriptor.default_id.as_deref())
        .collect();
    let mut matched = vec![false; existing.len()];
    let mut plan = MergePlan::default();

    for descriptor in descriptors {
        let Some(facts) = usable_facts(descriptor, &mut plan) else {
            continue;
        };
        let key = name_key(&descriptor.name);
        plan.preserved_custom += existing
            .iter()
            .filter(|record| record.is_custom && record.name_key() == key)
            .count();

        let mut targets = identity_targets(existing, descriptor);
        if targets.is_empty() {
            targets = name_targets(existing, &key, &matched, &incoming_ids);
            if !targets.is_empty() {
                log::debug!("'{}' matched by name", descriptor.name);
            }
        }

        if targets.is_empty() {
            log::debug!("'{}' is new", descriptor.name);
            plan.changes.inserts.push(new_default(descriptor, facts, now));
            plan.inserted += 1;
            continue;
        }

        for index in targets {
            matched[index] = true;
            let current = &existing[index];
            let next = apply_descriptor(current, descriptor, &facts);
            if &next == current {
                continue;
            }
            if next.name != current.name {
                log::debug!("renaming '{}' to '{}'", current.name, next.name);
                plan.renamed += 1;
            }
            plan.changes.updates.push(next);
            plan.updated += 1;
        }
    }
    plan
}

fn identity_targets(existing: &[Ingredient], descriptor: &IngredientDescriptor) -> Vec<usize> {
    let Some(default_id) = descriptor.default_id.as_deref() else {
        return Vec::new();
    };
    existing
        .iter()
        .enumerate()
        .filter(|(_, record)| !record.is_custom && record.default_id.as_deref() == Some(default_id))
        .map(|(index, _)| index)
        .collect()
}

fn name_targets(
    existing: &[Ingredient],
    key: &str,
    matched: &[bool],
    incoming_ids: &HashSet<&str>,
) -> Vec<usize> {
    existing
        .iter()
        .enumerate()
        .filter(|(index, record)| {
            !record.is_custom
                && !matched[*index]
                && record.name_key() == key
                && record
                    .default_id
                    .as_deref()
                    .map_or(true, |id| !incoming_ids.contains(id))
        })
        .map(|(index, _)| index)
        .collect()
}

fn usable_facts(
    descriptor: &IngredientDescriptor,
    plan: &mut MergePlan,
) -> Option<Vec<ConversionFact>> {
    if descriptor.name.is_empty() {
        log::warn!(
            "skipping dataset ingredient {} without a name",
            descriptor.default_id.as_deref().unwrap_or("<no id>")
        );
        plan.skipped_ingredients += 1;
        return None;
    }
    let decoded = descriptor.decode_facts();
    for (index, err) in &decoded.rejected {
        log::warn!(
            "skipping conversion #{} of '{}': {}",
            index + 1,
            descriptor.name,
            err
        );
    }
    plan.skipped_facts += decoded.rejected.len();
    Some(decoded.facts)
}

fn new_default(
    descriptor: &IngredientDescriptor,
    facts: Vec<ConversionFact>,
    now: OffsetDateTime,
) -> Ingredient {
    Ingredient {
        id: Uuid::now_v7().to_string(),
        default_id: descriptor.default_id.clone(),
        name: descriptor.name.clone(),
        category: descriptor.category.clone(),
        brand: descriptor.brand.clone(),
        is_custom: false,
        is_favorite: false,
        last_used_at: None,
        created_at: now,
        facts,
    }
}

/// Dataset-owned fields come from the descriptor; user-owned fields are kept.
/// A descriptor without a stable id keeps the record's existing one.
fn apply_descriptor(
    current: &Ingredient,
    descriptor: &IngredientDescriptor,
    facts: &[ConversionFact],
) -> Ingredient {
    Ingredient {
        default_id: descriptor
            .default_id
            .clone()
            .or_else(|| current.default_id.clone()),
        name: descriptor.name.clone(),
        category: descriptor.category.clone(),
        brand: descriptor.brand.clone(),
        facts: facts.to_vec(),
        ..current.clone()
    }
}
