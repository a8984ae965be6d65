use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::models::ViolationRecord;

/// Read-only snapshot of live violation records, grouped by student.
#[derive(Debug, Clone, Default)]
pub struct ViolationLedger {
    by_student: HashMap<Uuid, Vec<ViolationRecord>>,
}

impl ViolationLedger {
    pub fn new(records: Vec<ViolationRecord>) -> Self {
        let mut by_student: HashMap<Uuid, Vec<ViolationRecord>> = HashMap::new();
        let mut skipped = 0usize;

        for record in records {
            if !record.is_live() {
                skipped += 1;
                continue;
            }
            by_student.entry(record.student_id).or_default().push(record);
        }

        for history in by_student.values_mut() {
            history.sort_by_key(|record| record.occurred_at);
        }

        if skipped > 0 {
            tracing::debug!(skipped, "ignored soft-deleted violation records");
        }

        Self { by_student }
    }

    pub fn history(&self, student_id: Uuid) -> &[ViolationRecord] {
        self.by_student
            .get(&student_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Students with at least one live record.
    pub fn students(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.by_student.keys().copied()
    }

    /// Occurrence counts per violation type for one student, keyed by type id.
    pub fn counts(&self, student_id: Uuid) -> BTreeMap<i64, u32> {
        let mut counts = BTreeMap::new();
        for record in self.history(student_id) {
            *counts.entry(record.violation_type_id).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.by_student.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn record(student_id: Uuid, violation_type_id: i64, day: u32) -> ViolationRecord {
        ViolationRecord {
            student_id,
            violation_type_id,
            occurred_at: NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date"),
            note: None,
            deleted_at: None,
        }
    }

    #[test]
    fn counts_group_by_violation_type() {
        let student = Uuid::new_v4();
        let ledger = ViolationLedger::new(vec![
            record(student, 1, 3),
            record(student, 2, 4),
            record(student, 1, 1),
        ]);

        let counts = ledger.counts(student);
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), Some(&1));
        assert_eq!(
            ledger.history(student)[0].occurred_at,
            NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
        );
    }

    #[test]
    fn soft_deleted_records_are_excluded() {
        let student = Uuid::new_v4();
        let mut corrected = record(student, 1, 2);
        corrected.deleted_at = Some(Utc::now());

        let ledger = ViolationLedger::new(vec![corrected]);
        assert!(ledger.is_empty());
        assert!(ledger.history(student).is_empty());
        assert!(ledger.counts(student).is_empty());
    }
}
