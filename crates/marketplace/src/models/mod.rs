//! Domain types returned by the repositories and serialized by the API.
//!
//! Row types derive `sqlx::FromRow` directly; joined display fields (store
//! name, author name...) are selected alongside the row so handlers never
//! need a second round trip.

pub mod banner;
pub mod booking;
pub mod chat;
pub mod community;
pub mod notification;
pub mod product;
pub mod reference;
pub mod report;
pub mod session;
pub mod store;
pub mod user;
pub mod vehicle;

pub use banner::Banner;
pub use booking::Booking;
pub use chat::{ConversationSummary, Message};
pub use community::{Comment, Community, Post};
pub use notification::Notification;
pub use product::{Product, Rating};
pub use reference::{Category, City, State, Unit};
pub use report::Report;
pub use session::CurrentUser;
pub use store::Store;
pub use user::{User, UserSummary};
pub use vehicle::Vehicle;
