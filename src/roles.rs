use std::fmt;

use serde::{Deserialize, Serialize};

/// Staff roles that can be assigned to a rule or coaching tier.
///
/// Role names are stored as free text; anything not listed here is kept as
/// [`StaffRole::Unrecognized`] so it round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StaffRole {
    WaliKelas,
    Kaprodi,
    WakaKesiswaan,
    WakaSarana,
    KepalaSekolah,
    /// Catch-all for on-the-spot coaching by any staff member.
    SemuaGuruStaff,
    Unrecognized(String),
}

impl StaffRole {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Wali Kelas" => Self::WaliKelas,
            "Kaprodi" => Self::Kaprodi,
            "Waka Kesiswaan" => Self::WakaKesiswaan,
            "Waka Sarana" => Self::WakaSarana,
            "Kepala Sekolah" => Self::KepalaSekolah,
            "Semua Guru & Staff" => Self::SemuaGuruStaff,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::WaliKelas => "Wali Kelas",
            Self::Kaprodi => "Kaprodi",
            Self::WakaKesiswaan => "Waka Kesiswaan",
            Self::WakaSarana => "Waka Sarana",
            Self::KepalaSekolah => "Kepala Sekolah",
            Self::SemuaGuruStaff => "Semua Guru & Staff",
            Self::Unrecognized(name) => name,
        }
    }

    /// Letter tier this role signs for, if it is one of the four letter authorities.
    fn authority(&self) -> Option<LetterTier> {
        match self {
            Self::KepalaSekolah => Some(LetterTier::Surat4),
            Self::WakaKesiswaan | Self::WakaSarana => Some(LetterTier::Surat3),
            Self::Kaprodi => Some(LetterTier::Surat2),
            Self::WaliKelas => Some(LetterTier::Surat1),
            Self::SemuaGuruStaff | Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for StaffRole {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<StaffRole> for String {
    fn from(value: StaffRole) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_roles<S: AsRef<str>>(values: &[S]) -> Vec<StaffRole> {
    values.iter().map(|value| StaffRole::parse(value.as_ref())).collect()
}

pub fn join_roles(roles: &[StaffRole]) -> String {
    roles
        .iter()
        .map(StaffRole::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Summons letter tier, ordered by the authority that must handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterTier {
    Surat1,
    Surat2,
    Surat3,
    Surat4,
}

impl LetterTier {
    pub fn level(self) -> u8 {
        match self {
            Self::Surat1 => 1,
            Self::Surat2 => 2,
            Self::Surat3 => 3,
            Self::Surat4 => 4,
        }
    }

    /// Highest authority present among `roles`; defaults to the lowest tier.
    pub fn from_roles(roles: &[StaffRole]) -> Self {
        roles
            .iter()
            .filter_map(StaffRole::authority)
            .max()
            .unwrap_or(Self::Surat1)
    }
}

impl fmt::Display for LetterTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Surat {}", self.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_and_keeps_unknown_text() {
        assert_eq!(StaffRole::parse("Wali Kelas"), StaffRole::WaliKelas);
        assert_eq!(StaffRole::parse(" Kepala Sekolah "), StaffRole::KepalaSekolah);
        assert_eq!(
            StaffRole::parse("Guru BK"),
            StaffRole::Unrecognized("Guru BK".to_string())
        );
        assert_eq!(StaffRole::parse("Guru BK").as_str(), "Guru BK");
    }

    #[test]
    fn tier_uses_highest_authority_regardless_of_order() {
        let roles = vec![StaffRole::WaliKelas, StaffRole::KepalaSekolah];
        assert_eq!(LetterTier::from_roles(&roles), LetterTier::Surat4);

        let reversed = vec![StaffRole::KepalaSekolah, StaffRole::WaliKelas];
        assert_eq!(LetterTier::from_roles(&reversed), LetterTier::Surat4);
    }

    #[test]
    fn both_vice_principals_map_to_tier_three() {
        assert_eq!(
            LetterTier::from_roles(&[StaffRole::WakaSarana, StaffRole::Kaprodi]),
            LetterTier::Surat3
        );
        assert_eq!(
            LetterTier::from_roles(&[StaffRole::WaliKelas, StaffRole::WakaKesiswaan]),
            LetterTier::Surat3
        );
    }

    #[test]
    fn unknown_roles_fall_back_to_lowest_tier() {
        let roles = vec![StaffRole::Unrecognized("Satpam".to_string())];
        assert_eq!(LetterTier::from_roles(&roles), LetterTier::Surat1);
        assert_eq!(LetterTier::from_roles(&[]), LetterTier::Surat1);
    }

    #[test]
    fn roles_serialize_as_display_names() {
        let json = serde_json::to_string(&vec![StaffRole::WakaKesiswaan]).expect("serialize");
        assert_eq!(json, r#"["Waka Kesiswaan"]"#);
        let parsed: Vec<StaffRole> =
            serde_json::from_str(r#"["Semua Guru & Staff","Guru BK"]"#).expect("deserialize");
        assert_eq!(
            parsed,
            vec![
                StaffRole::SemuaGuruStaff,
                StaffRole::Unrecognized("Guru BK".to_string())
            ]
        );
    }
}
