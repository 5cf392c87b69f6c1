//! Embedded SQL migrations
//!
//! Migrations are embedded at compile time using include_str!

/// Migration metadata
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Application tables owned by the migrations, in drop order
pub const APP_TABLES: &[&str] = &["profiles", "users"];

/// Get all embedded migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_users",
            sql: include_str!("../../migrations/001_users.sql"),
        },
        Migration {
            id: "002_profiles",
            sql: include_str!("../../migrations/002_profiles.sql"),
        },
    ]
}

/// Ids of all embedded migrations, in application order
pub fn migration_ids() -> Vec<&'static str> {
    get_migrations().into_iter().map(|m| m.id).collect()
}
