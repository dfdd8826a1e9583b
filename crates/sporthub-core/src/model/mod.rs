//! Entities owned by the activities service.

pub mod activity;
pub mod booking;
pub mod session;

pub use activity::{Activity, ActivityPatch, NewActivity};
pub use booking::{Booking, BookingStatus, NewBooking};
pub use session::{NewSession, Session, SessionPatch};
