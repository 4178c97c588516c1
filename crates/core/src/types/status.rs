//! Status enums for marketplace entities.
//!
//! Each enum maps to a Postgres enum type in the `market` schema when the
//! `postgres` feature is enabled, and to `snake_case` strings in JSON.

use serde::{Deserialize, Serialize};

/// Implements `Display` and `FromStr` using the `snake_case` wire names.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The `snake_case` name used in JSON and the database.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Account role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Browses, wishlists, rates, books vehicles.
    #[default]
    Buyer,
    /// Everything a buyer can do, plus runs a store and lists vehicles.
    Seller,
    /// Full access to the admin console.
    Admin,
}

string_enum!(UserRole {
    Buyer => "buyer",
    Seller => "seller",
    Admin => "admin",
});

impl UserRole {
    /// Whether this role may manage a store, products and vehicles.
    #[must_use]
    pub const fn can_sell(&self) -> bool {
        matches!(self, Self::Seller | Self::Admin)
    }

    /// Whether this role may be chosen at self-registration.
    #[must_use]
    pub const fn is_self_assignable(&self) -> bool {
        matches!(self, Self::Buyer | Self::Seller)
    }
}

/// Whether an account may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.user_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
}

string_enum!(UserStatus {
    Active => "active",
    Blocked => "blocked",
});

/// Listing visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

string_enum!(ProductStatus {
    Active => "active",
    Inactive => "inactive",
});

/// Rental availability of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.vehicle_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    #[default]
    Available,
    Booked,
    Maintenance,
}

string_enum!(VehicleStatus {
    Available => "available",
    Booked => "booked",
    Maintenance => "maintenance",
});

/// Who is acting on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingActor {
    /// The user who requested the rental.
    Renter,
    /// The owner of the vehicle.
    Owner,
}

/// Lifecycle of a vehicle booking.
///
/// ```text
/// Pending ──confirm──▶ Confirmed ──complete──▶ Completed
///    │                    │
///    ├──reject──▶ Rejected└──cancel──▶ Cancelled
///    └──cancel──▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.booking_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
    Completed,
}

string_enum!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Rejected => "rejected",
    Cancelled => "cancelled",
    Completed => "completed",
});

impl BookingStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    /// Whether `actor` may move a booking from `self` to `next`.
    #[must_use]
    pub const fn allows(&self, next: Self, actor: BookingActor) -> bool {
        use BookingActor::{Owner, Renter};

        matches!(
            (self, next, actor),
            (Self::Pending, Self::Confirmed | Self::Rejected, Owner)
                | (Self::Pending, Self::Cancelled, Renter)
                | (Self::Confirmed, Self::Completed, Owner)
                | (Self::Confirmed, Self::Cancelled, Owner | Renter)
        )
    }

    /// Whether any actor may move a booking from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        self.allows(next, BookingActor::Renter) || self.allows(next, BookingActor::Owner)
    }

    /// The vehicle status implied by moving from `self` to `next`.
    ///
    /// `None` means the vehicle row is left untouched.
    #[must_use]
    pub const fn vehicle_status_after(&self, next: Self) -> Option<VehicleStatus> {
        match (self, next) {
            (Self::Pending, Self::Confirmed) => Some(VehicleStatus::Booked),
            (Self::Confirmed, Self::Completed | Self::Cancelled) => {
                Some(VehicleStatus::Available)
            }
            _ => None,
        }
    }
}

/// Moderation state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.report_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Open,
    Resolved,
    Dismissed,
}

string_enum!(ReportStatus {
    Open => "open",
    Resolved => "resolved",
    Dismissed => "dismissed",
});

/// Kind of entity a report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.report_target", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    Product,
    Vehicle,
    Store,
    User,
    Post,
    Comment,
}

string_enum!(ReportTarget {
    Product => "product",
    Vehicle => "vehicle",
    Store => "store",
    User => "user",
    Post => "post",
    Comment => "comment",
});

/// Category of an in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "market.notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Booking,
    Message,
    Comment,
    Like,
    Follow,
    Report,
    System,
}

string_enum!(NotificationKind {
    Booking => "booking",
    Message => "message",
    Comment => "comment",
    Like => "like",
    Follow => "follow",
    Report => "report",
    System => "system",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use BookingActor::{Owner, Renter};

    #[test]
    fn test_owner_confirms_or_rejects_pending() {
        assert!(BookingStatus::Pending.allows(BookingStatus::Confirmed, Owner));
        assert!(BookingStatus::Pending.allows(BookingStatus::Rejected, Owner));
        assert!(!BookingStatus::Pending.allows(BookingStatus::Confirmed, Renter));
        assert!(!BookingStatus::Pending.allows(BookingStatus::Rejected, Renter));
    }

    #[test]
    fn test_only_renter_cancels_pending() {
        assert!(BookingStatus::Pending.allows(BookingStatus::Cancelled, Renter));
        assert!(!BookingStatus::Pending.allows(BookingStatus::Cancelled, Owner));
    }

    #[test]
    fn test_confirmed_can_complete_or_cancel() {
        assert!(BookingStatus::Confirmed.allows(BookingStatus::Completed, Owner));
        assert!(!BookingStatus::Confirmed.allows(BookingStatus::Completed, Renter));
        assert!(BookingStatus::Confirmed.allows(BookingStatus::Cancelled, Owner));
        assert!(BookingStatus::Confirmed.allows(BookingStatus::Cancelled, Renter));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            assert!(from.is_terminal());
            for to in BookingStatus::ALL {
                assert!(!from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in BookingStatus::ALL {
            assert!(!status.can_transition_to(*status));
        }
    }

    #[test]
    fn test_vehicle_status_follows_booking() {
        assert_eq!(
            BookingStatus::Pending.vehicle_status_after(BookingStatus::Confirmed),
            Some(VehicleStatus::Booked)
        );
        assert_eq!(
            BookingStatus::Confirmed.vehicle_status_after(BookingStatus::Completed),
            Some(VehicleStatus::Available)
        );
        assert_eq!(
            BookingStatus::Confirmed.vehicle_status_after(BookingStatus::Cancelled),
            Some(VehicleStatus::Available)
        );
        // A pending booking never held the vehicle.
        assert_eq!(
            BookingStatus::Pending.vehicle_status_after(BookingStatus::Cancelled),
            None
        );
        assert_eq!(
            BookingStatus::Pending.vehicle_status_after(BookingStatus::Rejected),
            None
        );
    }

    #[test]
    fn test_role_permissions() {
        assert!(!UserRole::Buyer.can_sell());
        assert!(UserRole::Seller.can_sell());
        assert!(UserRole::Admin.can_sell());
        assert!(UserRole::Seller.is_self_assignable());
        assert!(!UserRole::Admin.is_self_assignable());
    }

    #[test]
    fn test_string_roundtrip() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), *kind);
        }
        assert_eq!("vehicle".parse::<ReportTarget>().unwrap(), ReportTarget::Vehicle);
        assert!("super_admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&VehicleStatus::Maintenance).unwrap();
        assert_eq!(json, "\"maintenance\"");
    }
}
