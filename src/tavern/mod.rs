pub mod client;
pub mod types;

use anyhow::Result;

use crate::tavern::types::{
    ChatFileEntry, MaintenanceReport, MaintenanceToken, OwnerScope, RosterCharacter, RosterGroup,
};

/// The host operations an expiration pass depends on.
///
/// Every call is a single request/response; implementations report
/// non-success as `Err` and never retry.
pub trait ChatStore {
    fn list_characters(&self) -> Result<Vec<RosterCharacter>>;
    fn list_groups(&self) -> Result<Vec<RosterGroup>>;
    fn search_chats(&self, scope: OwnerScope<'_>) -> Result<Vec<ChatFileEntry>>;
    fn delete_chat(&self, file_name: &str, scope: OwnerScope<'_>) -> Result<()>;
    fn maintenance_report(&self) -> Result<MaintenanceReport>;
    fn delete_backups(&self, hashes: &[String], token: &MaintenanceToken) -> Result<()>;
    fn finalize_maintenance(&self, token: &MaintenanceToken) -> Result<()>;
}
