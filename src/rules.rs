use std::collections::HashMap;

use serde::Serialize;

use crate::models::{FrequencyRule, ViolationType};
use crate::roles::{LetterTier, StaffRole};

impl FrequencyRule {
    // open range fires from min upward, min == max repeats on multiples, otherwise only at max
    pub fn matches(&self, frequency: u32) -> bool {
        if frequency == 0 {
            return false;
        }

        match self.frequency_max {
            None => frequency >= self.frequency_min,
            Some(max) if max == self.frequency_min => frequency
                .checked_rem(self.frequency_min)
                .map_or(false, |rest| rest == 0),
            Some(max) => frequency == max,
        }
    }

    pub fn letter_tier(&self) -> Option<LetterTier> {
        if !self.triggers_letter {
            return None;
        }

        if let [StaffRole::SemuaGuruStaff] = self.responsible_roles.as_slice() {
            return None;
        }

        Some(LetterTier::from_roles(&self.responsible_roles))
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    violation: ViolationType,
    rules: Vec<FrequencyRule>,
}

/// Violation types and their frequency rules, each rule list in `display_order`.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    entries: HashMap<i64, CatalogEntry>,
}

impl RuleCatalog {
    pub fn new(violations: Vec<ViolationType>, rules: Vec<FrequencyRule>) -> Self {
        let mut entries: HashMap<i64, CatalogEntry> = violations
            .into_iter()
            .map(|violation| {
                (
                    violation.id,
                    CatalogEntry {
                        violation,
                        rules: Vec::new(),
                    },
                )
            })
            .collect();

        for rule in rules {
            match entries.get_mut(&rule.violation_type_id) {
                Some(entry) => entry.rules.push(rule),
                None => tracing::warn!(
                    rule_id = rule.id,
                    violation_type_id = rule.violation_type_id,
                    "frequency rule references unknown violation type"
                ),
            }
        }

        for entry in entries.values_mut() {
            entry.rules.sort_by_key(|rule| (rule.display_order, rule.id));
        }

        Self { entries }
    }

    pub fn violation(&self, violation_type_id: i64) -> Option<&ViolationType> {
        self.entries
            .get(&violation_type_id)
            .map(|entry| &entry.violation)
    }

    pub fn rules_for(&self, violation_type_id: i64) -> &[FrequencyRule] {
        self.entries
            .get(&violation_type_id)
            .map(|entry| entry.rules.as_slice())
            .unwrap_or(&[])
    }

    /// Frequency rules that drive scoring for this type. Empty means flat legacy points.
    pub fn scoring_rules(&self, violation_type_id: i64) -> &[FrequencyRule] {
        match self.entries.get(&violation_type_id) {
            Some(entry) if entry.violation.uses_frequency_rules => &entry.rules,
            _ => &[],
        }
    }

    /// Rules that fire when a student reaches `frequency` occurrences of a type.
    pub fn sanctions_at(&self, violation_type_id: i64, frequency: u32) -> Vec<Sanction> {
        self.scoring_rules(violation_type_id)
            .iter()
            .filter(|rule| rule.matches(frequency))
            .map(|rule| Sanction {
                rule_id: rule.id,
                frequency,
                points: rule.points,
                sanction: rule.sanction.clone(),
                roles: rule.responsible_roles.clone(),
                letter_tier: rule.letter_tier(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sanction {
    pub rule_id: i64,
    pub frequency: u32,
    pub points: i32,
    pub sanction: String,
    pub roles: Vec<StaffRole>,
    pub letter_tier: Option<LetterTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuleWarning {
    InvertedRange {
        violation_type_id: i64,
        rule_id: i64,
        min: u32,
        max: u32,
    },
    ZeroMinimum {
        violation_type_id: i64,
        rule_id: i64,
    },
    Overlap {
        violation_type_id: i64,
        first_rule_id: i64,
        second_rule_id: i64,
    },
}

impl RuleWarning {
    pub fn summary(&self) -> String {
        match self {
            RuleWarning::InvertedRange {
                violation_type_id,
                rule_id,
                min,
                max,
            } => format!(
                "violation type {violation_type_id}: rule {rule_id} has min {min} above max {max}"
            ),
            RuleWarning::ZeroMinimum {
                violation_type_id,
                rule_id,
            } => format!("violation type {violation_type_id}: rule {rule_id} has a zero minimum"),
            RuleWarning::Overlap {
                violation_type_id,
                first_rule_id,
                second_rule_id,
            } => format!(
                "violation type {violation_type_id}: rules {first_rule_id} and {second_rule_id} overlap"
            ),
        }
    }
}

/// Reports suspicious rule ranges. Point outcomes are not affected.
pub fn audit_rules(catalog: &RuleCatalog) -> Vec<RuleWarning> {
    let mut warnings = Vec::new();
    let mut type_ids: Vec<i64> = catalog.entries.keys().copied().collect();
    type_ids.sort_unstable();

    for type_id in type_ids {
        let rules = catalog.rules_for(type_id);

        for rule in rules {
            if rule.frequency_min == 0 {
                warnings.push(RuleWarning::ZeroMinimum {
                    violation_type_id: type_id,
                    rule_id: rule.id,
                });
            }
            if let Some(max) = rule.frequency_max {
                if rule.frequency_min > max {
                    warnings.push(RuleWarning::InvertedRange {
                        violation_type_id: type_id,
                        rule_id: rule.id,
                        min: rule.frequency_min,
                        max,
                    });
                }
            }
        }

        for (index, first) in rules.iter().enumerate() {
            for second in &rules[index + 1..] {
                if ranges_intersect(first, second) {
                    warnings.push(RuleWarning::Overlap {
                        violation_type_id: type_id,
                        first_rule_id: first.id,
                        second_rule_id: second.id,
                    });
                }
            }
        }
    }

    warnings
}

fn ranges_intersect(first: &FrequencyRule, second: &FrequencyRule) -> bool {
    let first_max = first.frequency_max.unwrap_or(u32::MAX);
    let second_max = second.frequency_max.unwrap_or(u32::MAX);
    first.frequency_min <= second_max && second.frequency_min <= first_max
}
