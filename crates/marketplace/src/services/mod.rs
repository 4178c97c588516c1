//! Business logic that spans more than one repository or talks to the
//! outside world.
//!
//! - `auth` - Registration, login, password change and reset
//! - `bookings` - Rental date rules and booking transactions
//! - `email` - SMTP delivery of transactional email
//! - `import` - CSV import of reference data
//! - `media` - Image validation and storage backends

pub mod auth;
pub mod bookings;
pub mod email;
pub mod import;
pub mod media;
