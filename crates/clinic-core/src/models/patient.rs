//! Patient and medical history models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Patient gender as recorded at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "masculino" => Some(Gender::Male),
            "female" | "f" | "femenino" => Some(Gender::Female),
            "other" | "otro" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// National identity document; unique across patients
    pub document_number: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Gender,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(first_name: String, last_name: String, document_number: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name,
            last_name,
            document_number,
            birth_date: None,
            gender: Gender::Other,
            phone: String::new(),
            address: String::new(),
            email: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `today`. Never stored.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        if birth > today {
            return None;
        }
        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }
}

/// Medical history, one per patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalHistory {
    pub patient_id: String,
    pub allergies: Option<String>,
    pub pre_existing_conditions: Option<String>,
    pub current_medications: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MedicalHistory {
    /// Empty history for a freshly registered patient.
    pub fn empty_for(patient_id: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            patient_id: patient_id.to_string(),
            allergies: None,
            pre_existing_conditions: None,
            current_medications: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Ana".into(), "Pérez".into(), "V-12345678".into());
        assert_eq!(patient.full_name(), "Ana Pérez");
        assert_eq!(patient.id.len(), 36); // UUID format
        assert_eq!(patient.gender, Gender::Other);
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let mut patient = Patient::new("Ana".into(), "Pérez".into(), "1".into());
        patient.birth_date = Some(date(1990, 6, 15));

        assert_eq!(patient.age_on(date(2025, 6, 14)), Some(34));
        assert_eq!(patient.age_on(date(2025, 6, 15)), Some(35));
        assert_eq!(patient.age_on(date(1980, 1, 1)), None);
    }

    #[test]
    fn test_age_without_birth_date() {
        let patient = Patient::new("Ana".into(), "Pérez".into(), "1".into());
        assert_eq!(patient.age_on(date(2025, 1, 1)), None);
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("Femenino"), Some(Gender::Female));
        assert_eq!(Gender::parse("male"), Some(Gender::Male));
        assert_eq!(Gender::parse("x"), None);
        assert_eq!(Gender::parse(Gender::Other.as_str()), Some(Gender::Other));
    }
}
