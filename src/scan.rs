use std::collections::HashMap;

use uuid::Uuid;

use crate::ledger::ViolationLedger;
use crate::models::{Student, StudentCoaching};
use crate::points::PointCalculator;
use crate::recommend::PembinaanRecommender;
use crate::rules::RuleCatalog;

/// Inclusive point bounds for the coaching scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointBounds {
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
}

impl PointBounds {
    pub fn contains(&self, total_points: i64) -> bool {
        self.min_points.map_or(true, |min| total_points >= min)
            && self.max_points.map_or(true, |max| total_points <= max)
    }
}

/// Students whose points warrant coaching, highest totals first.
///
/// Only students with live records and a recommendation naming at least one
/// role are returned. This walks every student, so it suits a single school.
pub fn find_students_needing_coaching(
    students: &[Student],
    catalog: &RuleCatalog,
    ledger: &ViolationLedger,
    recommender: &PembinaanRecommender,
    bounds: PointBounds,
) -> Vec<StudentCoaching> {
    let roster: HashMap<Uuid, &Student> =
        students.iter().map(|student| (student.id, student)).collect();
    let calculator = PointCalculator::new(catalog, ledger);
    let mut results = Vec::new();

    for student_id in ledger.students() {
        let Some(student) = roster.get(&student_id) else {
            tracing::warn!(%student_id, "violation records for student missing from roster");
            continue;
        };

        let total_points = calculator.total_points(student_id);
        if !bounds.contains(total_points) {
            continue;
        }

        let Some(recommendation) = recommender.recommend(total_points) else {
            continue;
        };
        if recommendation.roles.is_empty() {
            continue;
        }

        results.push(StudentCoaching {
            student: (*student).clone(),
            total_points,
            recommendation,
        });
    }

    results.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.student.full_name.cmp(&b.student.full_name))
            .then_with(|| a.student.id.cmp(&b.student.id))
    });

    tracing::debug!(matched = results.len(), ?bounds, "coaching scan finished");
    results
}
