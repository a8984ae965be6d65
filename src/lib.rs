pub mod config;
pub mod db;
pub mod ledger;
pub mod models;
pub mod points;
pub mod recommend;
pub mod report;
pub mod roles;
pub mod rules;
pub mod scan;
pub mod telemetry;

pub use ledger::ViolationLedger;
pub use models::{
    FrequencyRule, PembinaanTier, Recommendation, Student, StudentCoaching, ViolationPoints,
    ViolationRecord, ViolationType,
};
pub use points::PointCalculator;
pub use recommend::PembinaanRecommender;
pub use roles::{LetterTier, StaffRole};
pub use rules::{audit_rules, RuleCatalog, RuleWarning, Sanction};
pub use scan::{find_students_needing_coaching, PointBounds};
