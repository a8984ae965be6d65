use uuid::Uuid;

use crate::ledger::ViolationLedger;
use crate::models::{RuleHit, ScoringMode, ViolationPoints};
use crate::rules::RuleCatalog;

/// Replays a student's violation history against the rule catalog.
pub struct PointCalculator<'a> {
    catalog: &'a RuleCatalog,
    ledger: &'a ViolationLedger,
}

impl<'a> PointCalculator<'a> {
    pub fn new(catalog: &'a RuleCatalog, ledger: &'a ViolationLedger) -> Self {
        Self { catalog, ledger }
    }

    pub fn total_points(&self, student_id: Uuid) -> i64 {
        let total: i64 = self
            .breakdown(student_id)
            .iter()
            .map(|entry| entry.points)
            .sum();
        total.max(0)
    }

    // unknown violation types are skipped
    pub fn breakdown(&self, student_id: Uuid) -> Vec<ViolationPoints> {
        let mut entries = Vec::new();

        for (violation_type_id, count) in self.ledger.counts(student_id) {
            let Some(violation) = self.catalog.violation(violation_type_id) else {
                tracing::warn!(
                    %student_id,
                    violation_type_id,
                    "skipping records for unknown violation type"
                );
                continue;
            };

            let rules = self.catalog.scoring_rules(violation_type_id);
            let entry = if rules.is_empty() {
                ViolationPoints {
                    violation_type_id,
                    violation_name: violation.name.clone(),
                    count,
                    points: i64::from(violation.points) * i64::from(count),
                    mode: ScoringMode::Legacy,
                    hits: Vec::new(),
                }
            } else {
                let mut hits = Vec::new();
                for frequency in 1..=count {
                    for rule in rules.iter().filter(|rule| rule.matches(frequency)) {
                        hits.push(RuleHit {
                            frequency,
                            rule_id: rule.id,
                            points: rule.points,
                        });
                    }
                }

                ViolationPoints {
                    violation_type_id,
                    violation_name: violation.name.clone(),
                    count,
                    points: hits.iter().map(|hit| i64::from(hit.points)).sum(),
                    mode: ScoringMode::Frequency,
                    hits,
                }
            };

            tracing::trace!(
                %student_id,
                violation_type_id,
                count,
                points = entry.points,
                "scored violation type"
            );
            entries.push(entry);
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ViolationRecord, ViolationType};
    use crate::rules::tests::rule;
    use chrono::{Duration, NaiveDate, Utc};

    fn violation(id: i64, points: i32, uses_frequency_rules: bool) -> ViolationType {
        ViolationType {
            id,
            name: format!("violation {id}"),
            category: "sedang".to_string(),
            points,
            uses_frequency_rules,
        }
    }

    fn history(student_id: Uuid, violation_type_id: i64, count: i64) -> Vec<ViolationRecord> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date");
        (0..count)
            .map(|offset| ViolationRecord {
                student_id,
                violation_type_id,
                occurred_at: start + Duration::days(offset),
                note: None,
                deleted_at: None,
            })
            .collect()
    }

    fn total(catalog: &RuleCatalog, records: Vec<ViolationRecord>, student_id: Uuid) -> i64 {
        let ledger = ViolationLedger::new(records);
        PointCalculator::new(catalog, &ledger).total_points(student_id)
    }

    #[test]
    fn open_rule_fires_on_every_occurrence() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(vec![violation(1, 0, true)], vec![rule(1, 1, None, 5)]);
        assert_eq!(total(&catalog, history(student, 1, 5), student), 25);
    }

    #[test]
    fn repeating_rule_fires_on_multiples() {
        let student = Uuid::new_v4();
        let catalog =
            RuleCatalog::new(vec![violation(1, 0, true)], vec![rule(1, 3, Some(3), 10)]);
        assert_eq!(total(&catalog, history(student, 1, 6), student), 20);
        assert_eq!(total(&catalog, history(student, 1, 5), student), 10);
    }

    #[test]
    fn escalation_rule_fires_once_at_threshold() {
        let student = Uuid::new_v4();
        let catalog =
            RuleCatalog::new(vec![violation(1, 0, true)], vec![rule(1, 1, Some(10), 50)]);
        assert_eq!(total(&catalog, history(student, 1, 9), student), 0);
        assert_eq!(total(&catalog, history(student, 1, 10), student), 50);
        assert_eq!(total(&catalog, history(student, 1, 11), student), 50);
    }

    #[test]
    fn no_records_scores_zero() {
        let catalog = RuleCatalog::new(vec![violation(1, 5, false)], Vec::new());
        assert_eq!(total(&catalog, Vec::new(), Uuid::new_v4()), 0);
    }

    #[test]
    fn legacy_types_multiply_flat_points() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(vec![violation(1, 15, false)], Vec::new());
        assert_eq!(total(&catalog, history(student, 1, 3), student), 45);
    }

    #[test]
    fn flagged_type_without_rules_falls_back_to_legacy() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(vec![violation(1, 4, true)], Vec::new());
        assert_eq!(total(&catalog, history(student, 1, 2), student), 8);
    }

    #[test]
    fn rules_accumulate_across_replay() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(
            vec![violation(1, 0, true)],
            vec![rule(1, 1, None, 2), rule(2, 3, Some(3), 10), rule(3, 1, Some(5), 25)],
        );
        // 6 x 2 + (3, 6) x 10 + 5 -> 25
        assert_eq!(total(&catalog, history(student, 1, 6), student), 57);

        let ledger = ViolationLedger::new(history(student, 1, 6));
        let breakdown = PointCalculator::new(&catalog, &ledger).breakdown(student);
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].mode, ScoringMode::Frequency);
        assert_eq!(breakdown[0].hits.len(), 9);
        assert!(breakdown[0]
            .hits
            .iter()
            .any(|hit| hit.rule_id == 3 && hit.frequency == 5));
    }

    #[test]
    fn sums_across_violation_types_and_skips_unknown() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(
            vec![violation(1, 0, true), violation(2, 10, false)],
            vec![rule(1, 1, None, 5)],
        );

        let mut records = history(student, 1, 2);
        records.extend(history(student, 2, 1));
        records.extend(history(student, 99, 4));
        assert_eq!(total(&catalog, records, student), 20);
    }

    #[test]
    fn negative_points_clamp_at_zero() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(vec![violation(1, -5, false)], Vec::new());
        assert_eq!(total(&catalog, history(student, 1, 3), student), 0);
    }

    #[test]
    fn soft_deleted_records_do_not_count() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(vec![violation(1, 0, true)], vec![rule(1, 3, Some(3), 10)]);
        let mut records = history(student, 1, 3);
        records[2].deleted_at = Some(Utc::now());
        assert_eq!(total(&catalog, records, student), 0);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let student = Uuid::new_v4();
        let catalog = RuleCatalog::new(vec![violation(1, 0, true)], vec![rule(1, 3, Some(3), 10)]);
        let ledger = ViolationLedger::new(history(student, 1, 7));
        let calculator = PointCalculator::new(&catalog, &ledger);
        assert_eq!(calculator.total_points(student), calculator.total_points(student));
        assert_eq!(calculator.breakdown(student), calculator.breakdown(student));
    }
}
