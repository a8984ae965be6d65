use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::ledger::ViolationLedger;
use crate::models::{FrequencyRule, PembinaanTier, Student, ViolationRecord, ViolationType};
use crate::recommend::PembinaanRecommender;
use crate::roles::parse_roles;
use crate::rules::RuleCatalog;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Everything the engine needs for one run, loaded up front.
pub struct EngineInputs {
    pub students: Vec<Student>,
    pub catalog: RuleCatalog,
    pub ledger: ViolationLedger,
    pub recommender: PembinaanRecommender,
}

pub async fn load_inputs(pool: &PgPool) -> anyhow::Result<EngineInputs> {
    let students = fetch_students(pool).await?;
    let violations = fetch_violation_types(pool).await?;
    let rules = fetch_frequency_rules(pool).await?;
    let tiers = fetch_pembinaan_tiers(pool).await?;
    let records = fetch_violations(pool, None).await?;

    tracing::info!(
        students = students.len(),
        violation_types = violations.len(),
        rules = rules.len(),
        tiers = tiers.len(),
        records = records.len(),
        "loaded discipline data"
    );

    Ok(EngineInputs {
        students,
        catalog: RuleCatalog::new(violations, rules),
        ledger: ViolationLedger::new(records),
        recommender: PembinaanRecommender::new(tiers),
    })
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        "SELECT id, student_number, full_name, class_name \
         FROM discipline.students ORDER BY full_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Student {
            id: row.get("id"),
            student_number: row.get("student_number"),
            full_name: row.get("full_name"),
            class_name: row.get("class_name"),
        })
        .collect())
}

pub async fn find_student(pool: &PgPool, student_number: &str) -> anyhow::Result<Option<Student>> {
    let row = sqlx::query(
        "SELECT id, student_number, full_name, class_name \
         FROM discipline.students WHERE student_number = $1",
    )
    .bind(student_number)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Student {
        id: row.get("id"),
        student_number: row.get("student_number"),
        full_name: row.get("full_name"),
        class_name: row.get("class_name"),
    }))
}

pub async fn fetch_violation_types(pool: &PgPool) -> anyhow::Result<Vec<ViolationType>> {
    let rows = sqlx::query(
        "SELECT id, name, category, points, uses_frequency_rules \
         FROM discipline.violation_types ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ViolationType {
            id: row.get("id"),
            name: row.get("name"),
            category: row.get("category"),
            points: row.get("points"),
            uses_frequency_rules: row.get("uses_frequency_rules"),
        })
        .collect())
}

pub async fn fetch_frequency_rules(pool: &PgPool) -> anyhow::Result<Vec<FrequencyRule>> {
    let rows = sqlx::query(
        "SELECT id, violation_type_id, frequency_min, frequency_max, points, \
         triggers_letter, responsible_roles, sanction, display_order \
         FROM discipline.frequency_rules ORDER BY violation_type_id, display_order",
    )
    .fetch_all(pool)
    .await?;

    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        let frequency_min: i32 = row.get("frequency_min");
        let frequency_max: Option<i32> = row.get("frequency_max");
        let roles: Vec<String> = row.get("responsible_roles");

        rules.push(FrequencyRule {
            id,
            violation_type_id: row.get("violation_type_id"),
            frequency_min: u32::try_from(frequency_min)
                .with_context(|| format!("rule {id} has negative frequency_min"))?,
            frequency_max: frequency_max
                .map(u32::try_from)
                .transpose()
                .with_context(|| format!("rule {id} has negative frequency_max"))?,
            points: row.get("points"),
            triggers_letter: row.get("triggers_letter"),
            responsible_roles: parse_roles(&roles),
            sanction: row.get("sanction"),
            display_order: row.get("display_order"),
        });
    }

    Ok(rules)
}

pub async fn fetch_pembinaan_tiers(pool: &PgPool) -> anyhow::Result<Vec<PembinaanTier>> {
    let rows = sqlx::query(
        "SELECT id, poin_min, poin_max, description, roles, display_order \
         FROM discipline.pembinaan_tiers ORDER BY display_order",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let roles: Vec<String> = row.get("roles");
            PembinaanTier {
                id: row.get("id"),
                poin_min: row.get("poin_min"),
                poin_max: row.get("poin_max"),
                description: row.get("description"),
                roles: parse_roles(&roles),
                display_order: row.get("display_order"),
            }
        })
        .collect())
}

/// Violation records, including soft-deleted ones; the ledger filters them.
pub async fn fetch_violations(
    pool: &PgPool,
    student_id: Option<Uuid>,
) -> anyhow::Result<Vec<ViolationRecord>> {
    let mut query = String::from(
        "SELECT student_id, violation_type_id, occurred_at, note, deleted_at \
         FROM discipline.violations",
    );
    if student_id.is_some() {
        query.push_str(" WHERE student_id = $1");
    }
    query.push_str(" ORDER BY occurred_at");

    let mut rows = sqlx::query(&query);
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records
        .into_iter()
        .map(|row| ViolationRecord {
            student_id: row.get("student_id"),
            violation_type_id: row.get("violation_type_id"),
            occurred_at: row.get("occurred_at"),
            note: row.get("note"),
            deleted_at: row.get::<Option<DateTime<Utc>>, _>("deleted_at"),
        })
        .collect())
}

async fn upsert_student(
    conn: &mut PgConnection,
    student_number: &str,
    full_name: &str,
    class_name: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO discipline.students (id, student_number, full_name, class_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (student_number) DO UPDATE
        SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_number)
    .bind(full_name)
    .bind(class_name)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    Ok(id)
}

async fn insert_violation(
    conn: &mut PgConnection,
    student_id: Uuid,
    violation_type_id: i64,
    occurred_at: NaiveDate,
    note: Option<&str>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO discipline.violations
        (id, student_id, violation_type_id, occurred_at, note, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(violation_type_id)
    .bind(occurred_at)
    .bind(note)
    .bind(source_key)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let violation_types = [
        (1_i64, "Terlambat masuk sekolah", "ringan", 5, true),
        (2, "Alfa (tanpa keterangan)", "sedang", 10, true),
        (3, "Atribut tidak lengkap", "ringan", 3, false),
        (4, "Merokok di lingkungan sekolah", "berat", 50, false),
    ];

    for (id, name, category, points, uses_frequency_rules) in violation_types {
        sqlx::query(
            r#"
            INSERT INTO discipline.violation_types
            (id, name, category, points, uses_frequency_rules)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, category = EXCLUDED.category,
                points = EXCLUDED.points, uses_frequency_rules = EXCLUDED.uses_frequency_rules
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(category)
        .bind(points)
        .bind(uses_frequency_rules)
        .execute(pool)
        .await?;
    }

    let rules: [(i64, i64, i32, Option<i32>, i32, bool, &[&str], &str, i32); 5] = [
        (1, 1, 3, Some(3), 5, false, &["Semua Guru & Staff"], "Teguran lisan", 1),
        (2, 1, 1, Some(10), 25, true, &["Wali Kelas"], "Surat panggilan orang tua", 2),
        (3, 2, 1, None, 10, false, &["Wali Kelas"], "Pembinaan wali kelas", 1),
        (4, 2, 1, Some(5), 30, true, &["Wali Kelas", "Waka Kesiswaan"], "Panggilan orang tua", 2),
        (5, 2, 1, Some(10), 75, true, &["Kepala Sekolah", "Waka Kesiswaan"], "Skorsing", 3),
    ];

    for (id, type_id, min, max, points, letter, roles, sanction, order) in rules {
        let roles: Vec<String> = roles.iter().map(|role| role.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO discipline.frequency_rules
            (id, violation_type_id, frequency_min, frequency_max, points,
             triggers_letter, responsible_roles, sanction, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(type_id)
        .bind(min)
        .bind(max)
        .bind(points)
        .bind(letter)
        .bind(roles)
        .bind(sanction)
        .bind(order)
        .execute(pool)
        .await?;
    }

    let tiers: [(i64, i64, Option<i64>, &str, &[&str]); 4] = [
        (1, 0, Some(49), "Belum perlu pembinaan", &[]),
        (2, 50, Some(99), "Pembinaan oleh wali kelas", &["Wali Kelas"]),
        (3, 100, Some(199), "Pembinaan oleh wali kelas dan kaprodi", &["Wali Kelas", "Kaprodi"]),
        (4, 200, None, "Pembinaan oleh kepala sekolah", &["Kepala Sekolah", "Waka Kesiswaan"]),
    ];

    for (id, min, max, description, roles) in tiers {
        let roles: Vec<String> = roles.iter().map(|role| role.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO discipline.pembinaan_tiers
            (id, poin_min, poin_max, description, roles, display_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(min)
        .bind(max)
        .bind(description)
        .bind(roles)
        .bind(id as i32)
        .execute(pool)
        .await?;
    }

    let students = [
        ("2024001", "Ayu Lestari", "XI RPL 1"),
        ("2024002", "Bagas Pratama", "XI TKJ 2"),
        ("2024003", "Citra Maharani", "X AKL 1"),
    ];
    let start = NaiveDate::from_ymd_opt(2026, 1, 5).context("invalid date")?;
    let mut conn = pool.acquire().await?;

    for (index, (number, name, class_name)) in students.into_iter().enumerate() {
        let student_id = upsert_student(&mut conn, number, name, class_name).await?;
        let occurrences: &[(i64, usize)] = match index {
            0 => &[(1, 12), (3, 2)],
            1 => &[(2, 6)],
            _ => &[(1, 2)],
        };

        for (type_id, count) in occurrences {
            for offset in 0..*count {
                let occurred_at = start + chrono::Duration::days(offset as i64 * 3);
                let source_key = format!("seed-{number}-{type_id}-{offset}");
                insert_violation(&mut conn, student_id, *type_id, occurred_at, None, &source_key)
                    .await?;
            }
        }
    }

    Ok(())
}

/// Key for a CSV row without an explicit `source_key`, stable across re-imports.
pub fn import_source_key(
    student_number: &str,
    violation_type_id: i64,
    occurred_at: NaiveDate,
    note: Option<&str>,
) -> String {
    format!(
        "import-{}-{}-{}-{}",
        student_number.trim(),
        violation_type_id,
        occurred_at,
        note.map(str::trim).unwrap_or_default()
    )
}

/// Imports every row or none: a bad row rolls back the whole file.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_number: String,
        full_name: String,
        class_name: String,
        violation_type_id: i64,
        occurred_at: NaiveDate,
        note: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let student_id =
            upsert_student(&mut tx, &row.student_number, &row.full_name, &row.class_name)
                .await?;

        let note = row.note.as_deref().filter(|note| !note.trim().is_empty());
        let source_key = row
            .source_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| {
                import_source_key(
                    &row.student_number,
                    row.violation_type_id,
                    row.occurred_at,
                    note,
                )
            });

        let fresh = insert_violation(
            &mut tx,
            student_id,
            row.violation_type_id,
            row.occurred_at,
            note,
            &source_key,
        )
        .await?;

        if fresh {
            inserted += 1;
        } else {
            tracing::debug!(%source_key, "violation already imported");
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).expect("valid date")
    }

    #[test]
    fn derived_key_is_stable_for_the_same_row() {
        let first = import_source_key("2024005", 3, day(6), Some("Tidak memakai dasi"));
        let again = import_source_key(" 2024005 ", 3, day(6), Some("Tidak memakai dasi "));
        assert_eq!(first, again);
        assert_eq!(first, "import-2024005-3-2026-02-06-Tidak memakai dasi");
    }

    #[test]
    fn derived_key_differs_when_row_content_differs() {
        let base = import_source_key("2024005", 3, day(6), None);
        assert_eq!(base, "import-2024005-3-2026-02-06-");
        assert_ne!(base, import_source_key("2024006", 3, day(6), None));
        assert_ne!(base, import_source_key("2024005", 2, day(6), None));
        assert_ne!(base, import_source_key("2024005", 3, day(7), None));
        assert_ne!(base, import_source_key("2024005", 3, day(6), Some("dasi")));
    }
}
