use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::ledger::ViolationLedger;
use crate::models::StudentCoaching;
use crate::points::PointCalculator;
use crate::roles::join_roles;
use crate::rules::{audit_rules, RuleCatalog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationMix {
    pub violation_name: String,
    pub count: usize,
    pub students: usize,
}

pub fn summarize_by_type(catalog: &RuleCatalog, ledger: &ViolationLedger) -> Vec<ViolationMix> {
    let mut map: HashMap<i64, (usize, usize)> = HashMap::new();

    for student_id in ledger.students() {
        for (type_id, count) in ledger.counts(student_id) {
            let entry = map.entry(type_id).or_insert((0, 0));
            entry.0 += count as usize;
            entry.1 += 1;
        }
    }

    let mut summaries: Vec<ViolationMix> = map
        .into_iter()
        .map(|(type_id, (count, students))| ViolationMix {
            violation_name: catalog
                .violation(type_id)
                .map(|violation| violation.name.clone())
                .unwrap_or_else(|| format!("unknown type {type_id}")),
            count,
            students,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.violation_name.cmp(&b.violation_name))
    });
    summaries
}

/// Latest occurrence per violation type with the sanctions it fired.
fn latest_sanctions(
    catalog: &RuleCatalog,
    ledger: &ViolationLedger,
    student_id: Uuid,
    output: &mut String,
) {
    for (type_id, count) in ledger.counts(student_id) {
        for sanction in catalog.sanctions_at(type_id, count) {
            let letter = sanction
                .letter_tier
                .map(|tier| tier.to_string())
                .unwrap_or_else(|| "no letter".to_string());
            let _ = writeln!(
                output,
                "  - occurrence #{}: {} ({} pts, {}, {})",
                sanction.frequency,
                if sanction.sanction.is_empty() {
                    "sanction"
                } else {
                    sanction.sanction.as_str()
                },
                sanction.points,
                join_roles(&sanction.roles),
                letter
            );
        }
    }
}

pub fn build_report(
    generated_on: NaiveDate,
    catalog: &RuleCatalog,
    ledger: &ViolationLedger,
    coaching: &[StudentCoaching],
) -> String {
    let calculator = PointCalculator::new(catalog, ledger);
    let summaries = summarize_by_type(catalog, ledger);
    let warnings = audit_rules(catalog);

    let mut output = String::new();

    let _ = writeln!(output, "# Student Coaching Report");
    let _ = writeln!(output, "Generated on {}", generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Coaching");

    if coaching.is_empty() {
        let _ = writeln!(output, "No students currently need coaching.");
    } else {
        for row in coaching {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {} points [{}]: {} ({})",
                row.student.full_name,
                row.student.student_number,
                row.student.class_name,
                row.total_points,
                row.recommendation.range_label,
                row.recommendation.description,
                join_roles(&row.recommendation.roles)
            );

            for entry in calculator.breakdown(row.student.id) {
                let _ = writeln!(
                    output,
                    "  - {}: {} occurrence(s), {} points",
                    entry.violation_name, entry.count, entry.points
                );
            }
            latest_sanctions(catalog, ledger, row.student.id, &mut output);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Violation Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No violations recorded.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {}: {} occurrence(s) across {} student(s)",
                summary.violation_name, summary.count, summary.students
            );
        }
    }

    if !warnings.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rule Warnings");
        for warning in &warnings {
            let _ = writeln!(output, "- {}", warning.summary());
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrequencyRule, Student, ViolationRecord, ViolationType};
    use crate::recommend::tests::school_tiers;
    use crate::roles::StaffRole;
    use crate::scan::{find_students_needing_coaching, PointBounds};

    fn fixture() -> (Vec<Student>, RuleCatalog, ViolationLedger) {
        let student = Student {
            id: Uuid::new_v4(),
            student_number: "2024001".to_string(),
            full_name: "Ayu Lestari".to_string(),
            class_name: "XI RPL 1".to_string(),
        };
        let catalog = RuleCatalog::new(
            vec![ViolationType {
                id: 2,
                name: "Alfa".to_string(),
                category: "sedang".to_string(),
                points: 0,
                uses_frequency_rules: true,
            }],
            vec![FrequencyRule {
                id: 7,
                violation_type_id: 2,
                frequency_min: 1,
                frequency_max: None,
                points: 10,
                triggers_letter: true,
                responsible_roles: vec![StaffRole::WaliKelas],
                sanction: "Pembinaan wali kelas".to_string(),
                display_order: 1,
            }],
        );
        let date = NaiveDate::from_ymd_opt(2026, 2, 2).expect("valid date");
        let records = (0..6)
            .map(|_| ViolationRecord {
                student_id: student.id,
                violation_type_id: 2,
                occurred_at: date,
                note: None,
                deleted_at: None,
            })
            .collect();
        (vec![student], catalog, ViolationLedger::new(records))
    }

    #[test]
    fn report_lists_students_and_sanctions() {
        let (students, catalog, ledger) = fixture();
        let coaching = find_students_needing_coaching(
            &students,
            &catalog,
            &ledger,
            &school_tiers(),
            PointBounds::default(),
        );
        let generated_on = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");

        let report = build_report(generated_on, &catalog, &ledger, &coaching);

        assert!(report.contains("# Student Coaching Report"));
        assert!(report.contains("- Ayu Lestari (2024001, XI RPL 1) 60 points [50-99]"));
        assert!(report.contains("  - Alfa: 6 occurrence(s), 60 points"));
        assert!(report.contains("occurrence #6: Pembinaan wali kelas (10 pts, Wali Kelas, Surat 1)"));
        assert!(report.contains("- Alfa: 6 occurrence(s) across 1 student(s)"));
        assert!(!report.contains("## Rule Warnings"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let catalog = RuleCatalog::default();
        let ledger = ViolationLedger::default();
        let generated_on = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");

        let report = build_report(generated_on, &catalog, &ledger, &[]);
        assert!(report.contains("No students currently need coaching."));
        assert!(report.contains("No violations recorded."));
    }
}
