//! Role normalization.
//!
//! Role labels arrive in several languages, casings and underscore variants
//! ("Administrador", "admin", "Profesor", "docente", "alumno", ...). Every role
//! comparison in the crate goes through [`normalize_role`]; raw role strings
//! are never compared directly.

use std::fmt;

use serde::{Serialize, Serializer};

/// Canonical role keys.
pub const ADMIN: &str = "admin";
pub const DIRECTOR: &str = "director";
pub const TEACHER: &str = "teacher";
pub const STUDENT: &str = "student";

const ADMIN_ALIASES: &[&str] = &[
    "admin",
    "administrador",
    "administradora",
    "administrator",
    "administración",
    "administracion",
    "super_admin",
    "superadmin",
    "super-admin",
    "admin_general",
];

const DIRECTOR_ALIASES: &[&str] = &[
    "director",
    "directora",
    "directivo",
    "directiva",
    "rector",
    "rectora",
    "coordinador",
    "coordinadora",
    "principal",
    "director_academico",
];

const TEACHER_ALIASES: &[&str] = &[
    "teacher",
    "profesor",
    "profesora",
    "docente",
    "maestro",
    "maestra",
    "instructor",
    "tutor",
    "professor",
];

const STUDENT_ALIASES: &[&str] = &[
    "student",
    "estudiante",
    "alumno",
    "alumna",
    "aprendiz",
    "pupil",
];

/// Alias tables in match order.
const ALIAS_TABLE: &[(CanonicalKind, &[&str])] = &[
    (CanonicalKind::Admin, ADMIN_ALIASES),
    (CanonicalKind::Director, DIRECTOR_ALIASES),
    (CanonicalKind::Teacher, TEACHER_ALIASES),
    (CanonicalKind::Student, STUDENT_ALIASES),
];

#[derive(Debug, Clone, Copy)]
enum CanonicalKind {
    Admin,
    Director,
    Teacher,
    Student,
}

/// Result of normalizing a role label.
///
/// Unknown labels are kept as `Other` with the trimmed, lowercased input so
/// that normalizing the string form again yields the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalRole {
    Admin,
    Director,
    Teacher,
    Student,
    Other(String),
}

impl CanonicalRole {
    pub fn from_raw(raw: &str) -> Self {
        normalize_role(Some(raw))
    }

    pub fn as_str(&self) -> &str {
        match self {
            CanonicalRole::Admin => ADMIN,
            CanonicalRole::Director => DIRECTOR,
            CanonicalRole::Teacher => TEACHER,
            CanonicalRole::Student => STUDENT,
            CanonicalRole::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, CanonicalRole::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self, CanonicalRole::Teacher)
    }

    pub fn is_student(&self) -> bool {
        matches!(self, CanonicalRole::Student)
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CanonicalRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<CanonicalKind> for CanonicalRole {
    fn from(kind: CanonicalKind) -> Self {
        match kind {
            CanonicalKind::Admin => CanonicalRole::Admin,
            CanonicalKind::Director => CanonicalRole::Director,
            CanonicalKind::Teacher => CanonicalRole::Teacher,
            CanonicalKind::Student => CanonicalRole::Student,
        }
    }
}

/// Maps a free-form role label to its canonical role. Never fails.
pub fn normalize_role(raw: Option<&str>) -> CanonicalRole {
    let cleaned = raw.map(|value| value.trim().to_lowercase()).unwrap_or_default();

    ALIAS_TABLE
        .iter()
        .find(|(_, aliases)| aliases.contains(&cleaned.as_str()))
        .map(|(kind, _)| CanonicalRole::from(*kind))
        .unwrap_or(CanonicalRole::Other(cleaned))
}
