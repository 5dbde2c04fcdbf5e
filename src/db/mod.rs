//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CHALLENGES: &str = "challenges";
    pub const ACTIVITIES: &str = "activities";
    pub const BADGES: &str = "badges";
    /// Earned badge sets (keyed by user id)
    pub const EARNED_BADGES: &str = "earned_badges";
}
