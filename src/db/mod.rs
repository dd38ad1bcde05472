//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
    pub const REPORTS: &str = "reports";
    /// Games keyed by `{report_id}_{index}`
    pub const GAMES: &str = "games";
    /// Ban/RPS state keyed by set id
    pub const SET_STATES: &str = "set_states";
    /// Report form drafts keyed by `{set_id}_{user_id}`
    pub const SET_DRAFTS: &str = "set_drafts";
    /// Marker of the single pending report of a set, keyed by set id
    pub const PENDING_SETS: &str = "pending_sets";
}
