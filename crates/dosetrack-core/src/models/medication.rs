//! Medication models.

use serde::{Deserialize, Serialize};

/// A medication as the user knows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    /// Local UUID - assigned at creation
    pub medication_id: String,
    /// Display name (e.g., "Amoxicillin 500mg")
    pub name: String,
    /// Whether this is a generic formulation
    pub generic: bool,
    /// Brand name, if the user entered one
    pub brand: Option<String>,
}

impl Medication {
    /// Create a new medication with required fields.
    pub fn new(name: String, generic: bool, brand: Option<String>) -> Self {
        Self {
            medication_id: uuid::Uuid::new_v4().to_string(),
            name,
            generic,
            // The entry form submits empty strings for untouched fields
            brand: brand.filter(|b| !b.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_medication() {
        let med = Medication::new("Amoxicillin".into(), true, Some("Amoxil".into()));
        assert_eq!(med.name, "Amoxicillin");
        assert!(med.generic);
        assert_eq!(med.brand, Some("Amoxil".into()));
        assert_eq!(med.medication_id.len(), 36); // UUID format
    }

    #[test]
    fn test_empty_brand_becomes_none() {
        let med = Medication::new("Amoxicillin".into(), true, Some(String::new()));
        assert_eq!(med.brand, None);
    }
}
