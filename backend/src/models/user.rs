//! User model and authority levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Authority level, totally ordered: `None < Restricted < Full < SuperAdmin`.
///
/// Applied independently to reading and writing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "authority_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    #[default]
    None,
    Restricted,
    Full,
    SuperAdmin,
}

impl AuthorityLevel {
    pub const ALL: [AuthorityLevel; 4] = [
        AuthorityLevel::None,
        AuthorityLevel::Restricted,
        AuthorityLevel::Full,
        AuthorityLevel::SuperAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityLevel::None => "none",
            AuthorityLevel::Restricted => "restricted",
            AuthorityLevel::Full => "full",
            AuthorityLevel::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "none" => Some(AuthorityLevel::None),
            "restricted" => Some(AuthorityLevel::Restricted),
            "full" => Some(AuthorityLevel::Full),
            "super_admin" | "superadmin" => Some(AuthorityLevel::SuperAdmin),
            _ => None,
        }
    }

    /// Sees the whole non-deleted org tree regardless of unit grants.
    pub fn is_unscoped(&self) -> bool {
        *self >= AuthorityLevel::Full
    }
}

/// User entity
#[derive(Clone, FromRow, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub egn: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub unit_id: Uuid,
    pub reading_access: AuthorityLevel,
    pub writing_access: AuthorityLevel,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub deleted_on: Option<DateTime<Utc>>,
}

redacted_debug!(User {
    show id,
    show username,
    show first_name,
    show middle_name,
    show last_name,
    redact_option egn,
    mask_option phone,
    show position,
    show unit_id,
    show reading_access,
    show writing_access,
    redact_option password_hash,
    show deleted_on,
});

impl User {
    pub fn new(
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        unit_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            first_name: first_name.into(),
            middle_name: None,
            last_name: last_name.into(),
            egn: None,
            phone: None,
            position: None,
            unit_id,
            reading_access: AuthorityLevel::None,
            writing_access: AuthorityLevel::None,
            password_hash: None,
            deleted_on: None,
        }
    }

    pub fn with_authority(mut self, reading: AuthorityLevel, writing: AuthorityLevel) -> Self {
        self.reading_access = reading;
        self.writing_access = writing;
        self
    }

    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_on.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_levels_are_ordered() {
        assert!(AuthorityLevel::None < AuthorityLevel::Restricted);
        assert!(AuthorityLevel::Restricted < AuthorityLevel::Full);
        assert!(AuthorityLevel::Full < AuthorityLevel::SuperAdmin);
        let mut levels = vec![
            AuthorityLevel::SuperAdmin,
            AuthorityLevel::None,
            AuthorityLevel::Full,
            AuthorityLevel::Restricted,
        ];
        levels.sort();
        assert_eq!(levels, AuthorityLevel::ALL.to_vec());
    }

    #[test]
    fn test_authority_level_parse_round_trips_as_str() {
        for level in AuthorityLevel::ALL {
            assert_eq!(AuthorityLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(AuthorityLevel::parse("SuperAdmin"), Some(AuthorityLevel::SuperAdmin));
        assert_eq!(AuthorityLevel::parse("super-admin"), Some(AuthorityLevel::SuperAdmin));
        assert_eq!(AuthorityLevel::parse("owner"), None);
    }

    #[test]
    fn test_authority_level_serde_snake_case() {
        let json = serde_json::to_string(&AuthorityLevel::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
        let parsed: AuthorityLevel = serde_json::from_str("\"restricted\"").unwrap();
        assert_eq!(parsed, AuthorityLevel::Restricted);
    }

    #[test]
    fn test_full_name_with_and_without_middle_name() {
        let mut user = User::new("gpetrov", "Georgi", "Petrov", Uuid::new_v4());
        assert_eq!(user.full_name(), "Georgi Petrov");
        user.middle_name = Some("Ivanov".to_string());
        assert_eq!(user.full_name(), "Georgi Ivanov Petrov");
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let mut user = User::new("gpetrov", "Georgi", "Petrov", Uuid::new_v4());
        user.password_hash = Some("$2b$12$abcdef".to_string());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$2b$12$abcdef"));
        assert!(json.contains("\"reading_access\":\"none\""));
    }

    #[test]
    fn test_user_debug_hides_personal_data() {
        let mut user = User::new("gpetrov", "Georgi", "Petrov", Uuid::new_v4());
        user.egn = Some("7501010010".to_string());
        user.phone = Some("0888123456".to_string());
        user.password_hash = Some("$2b$12$abcdef".to_string());
        let output = format!("{:?}", user);
        assert!(output.contains("gpetrov"));
        assert!(!output.contains("7501010010"));
        assert!(!output.contains("0888123456"));
        assert!(output.contains("******3456"));
        assert!(!output.contains("$2b$12$abcdef"));
    }
}
