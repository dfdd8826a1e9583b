//! Projection of an activity into its search document.

use sporthub_core::model::{Activity, Session};
use sporthub_core::search::SearchDocument;

/// Difficulty assigned to every activity document.
pub const DEFAULT_DIFFICULTY: i32 = 1;

/// Builds the search document for `activity`.
///
/// The schedule window is taken from the earliest session by date and start
/// time; without sessions the window is absent.
#[must_use]
pub fn build_search_document(activity: &Activity, sessions: &[Session]) -> SearchDocument {
    let earliest = sessions.iter().min_by_key(|s| (s.date, s.start_time));
    let id = activity.id.to_string();
    SearchDocument {
        id: id.clone(),
        activity_id: id,
        session_id: String::new(),
        name: activity.name.clone(),
        category: activity.category.clone(),
        location: activity.location.clone(),
        instructor: activity.instructor.clone(),
        start_at: earliest.map(Session::starts_at),
        end_at: earliest.map(Session::ends_at),
        difficulty: DEFAULT_DIFFICULTY,
        price: activity.base_price,
        tags: activity.tags.clone(),
        updated_at: Some(activity.updated_at),
    }
}
