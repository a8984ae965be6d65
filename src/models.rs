use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::StaffRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub student_number: String,
    pub full_name: String,
    pub class_name: String,
}

/// One logged incident. Records are never mutated; corrections set `deleted_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub student_id: Uuid,
    pub violation_type_id: i64,
    pub occurred_at: NaiveDate,
    pub note: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ViolationRecord {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationType {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// Flat points per occurrence, used when no frequency rules apply.
    pub points: i32,
    pub uses_frequency_rules: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRule {
    pub id: i64,
    pub violation_type_id: i64,
    pub frequency_min: u32,
    pub frequency_max: Option<u32>,
    pub points: i32,
    pub triggers_letter: bool,
    pub responsible_roles: Vec<StaffRole>,
    pub sanction: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PembinaanTier {
    pub id: i64,
    pub poin_min: i64,
    pub poin_max: Option<i64>,
    pub description: String,
    pub roles: Vec<StaffRole>,
    pub display_order: i32,
}

impl PembinaanTier {
    pub fn contains(&self, total_points: i64) -> bool {
        total_points >= self.poin_min && self.poin_max.map_or(true, |max| total_points <= max)
    }

    pub fn range_label(&self) -> String {
        match self.poin_max {
            Some(max) => format!("{}-{}", self.poin_min, max),
            None => format!("{}+", self.poin_min),
        }
    }
}

/// Advisory coaching recommendation for a point total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub roles: Vec<StaffRole>,
    pub description: String,
    pub range_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentCoaching {
    pub student: Student,
    pub total_points: i64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Frequency,
    Legacy,
}

/// A rule firing at one frequency value during a history replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleHit {
    pub frequency: u32,
    pub rule_id: i64,
    pub points: i32,
}

/// Contribution of one violation type to a student's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationPoints {
    pub violation_type_id: i64,
    pub violation_name: String,
    pub count: u32,
    pub points: i64,
    pub mode: ScoringMode,
    pub hits: Vec<RuleHit>,
}
