//! SportHub: activities, sessions and enrollments.
//!
//! Write-side handlers persist through the repository ports in
//! `sporthub-core` and announce every committed change on the event bus.
//! Enrollment prices the booking and checks capacity concurrently before
//! committing.

pub mod application;
pub mod domain;
