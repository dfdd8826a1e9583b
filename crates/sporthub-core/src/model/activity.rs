//! Activities: the bookable offering that search documents are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A persisted activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity identifier.
    pub id: i64,
    /// User that owns (created) the activity.
    pub owner_user_id: String,
    /// Sport or discipline.
    pub category: String,
    /// Display name.
    pub name: String,
    /// Venue.
    pub location: String,
    /// Attributed instructor; may be empty.
    pub instructor: String,
    /// Price before enrollment adjustments.
    pub base_price: f64,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create an activity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewActivity {
    /// Owner of the new activity.
    pub owner_user_id: String,
    /// Sport or discipline.
    pub category: String,
    /// Display name.
    pub name: String,
    /// Venue.
    pub location: String,
    /// Attributed instructor.
    #[serde(default)]
    pub instructor: String,
    /// Base price; must be positive.
    pub base_price: f64,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewActivity {
    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<(), DomainError> {
        require_non_blank("owner_user_id", &self.owner_user_id)?;
        require_non_blank("category", &self.category)?;
        require_non_blank("name", &self.name)?;
        require_non_blank("location", &self.location)?;
        require_positive_price(self.base_price)
    }
}

/// Partial update of an activity.
///
/// `Some` means the field was present in the request and must be written;
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActivityPatch {
    /// New category.
    #[serde(default)]
    pub category: Option<String>,
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New location.
    #[serde(default)]
    pub location: Option<String>,
    /// New instructor; an empty string clears it.
    #[serde(default)]
    pub instructor: Option<String>,
    /// New base price.
    #[serde(default)]
    pub base_price: Option<f64>,
    /// Replacement tag list.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl ActivityPatch {
    /// Returns `true` when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.name.is_none()
            && self.location.is_none()
            && self.instructor.is_none()
            && self.base_price.is_none()
            && self.tags.is_none()
    }

    /// Checks the present fields.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty patch, a blank required
    /// text field, or a non-positive price.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::Validation("update contains no fields".to_owned()));
        }
        if let Some(category) = &self.category {
            require_non_blank("category", category)?;
        }
        if let Some(name) = &self.name {
            require_non_blank("name", name)?;
        }
        if let Some(location) = &self.location {
            require_non_blank("location", location)?;
        }
        if let Some(price) = self.base_price {
            require_positive_price(price)?;
        }
        Ok(())
    }

    /// Applies the present fields to `activity`.
    pub fn apply_to(&self, activity: &mut Activity) {
        if let Some(category) = &self.category {
            activity.category.clone_from(category);
        }
        if let Some(name) = &self.name {
            activity.name.clone_from(name);
        }
        if let Some(location) = &self.location {
            activity.location.clone_from(location);
        }
        if let Some(instructor) = &self.instructor {
            activity.instructor.clone_from(instructor);
        }
        if let Some(price) = self.base_price {
            activity.base_price = price;
        }
        if let Some(tags) = &self.tags {
            activity.tags.clone_from(tags);
        }
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_positive_price(price: f64) -> Result<(), DomainError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(DomainError::Validation(
            "base_price must be greater than 0".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_activity() -> NewActivity {
        NewActivity {
            owner_user_id: "7".to_owned(),
            category: "football".to_owned(),
            name: "Futbol 5".to_owned(),
            location: "Club Norte".to_owned(),
            instructor: String::new(),
            base_price: 100.0,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_new_activity_rejects_non_positive_price() {
        let mut activity = new_activity();
        activity.base_price = 0.0;

        let err = activity.validate().unwrap_err();

        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("base_price")));
    }

    #[test]
    fn test_new_activity_rejects_blank_name() {
        let mut activity = new_activity();
        activity.name = "   ".to_owned();

        assert!(activity.validate().is_err());
    }

    #[test]
    fn test_patch_distinguishes_absent_from_present_instructor() {
        let absent: ActivityPatch = serde_json::from_str(r#"{"name":"Yoga"}"#).unwrap();
        let cleared: ActivityPatch =
            serde_json::from_str(r#"{"name":"Yoga","instructor":""}"#).unwrap();

        assert_eq!(absent.instructor, None);
        assert_eq!(cleared.instructor, Some(String::new()));
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        assert!(ActivityPatch::default().validate().is_err());
    }

    #[test]
    fn test_apply_to_only_touches_present_fields() {
        let mut activity = Activity {
            id: 1,
            owner_user_id: "7".to_owned(),
            category: "football".to_owned(),
            name: "Futbol 5".to_owned(),
            location: "Club Norte".to_owned(),
            instructor: "Ana".to_owned(),
            base_price: 100.0,
            tags: vec!["outdoor".to_owned()],
            updated_at: chrono::Utc::now(),
        };
        let patch = ActivityPatch {
            base_price: Some(120.0),
            ..ActivityPatch::default()
        };

        patch.apply_to(&mut activity);

        assert!((activity.base_price - 120.0).abs() < f64::EPSILON);
        assert_eq!(activity.instructor, "Ana");
        assert_eq!(activity.tags, vec!["outdoor".to_owned()]);
    }
}
