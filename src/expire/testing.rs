//! In-memory `ChatStore` for unit tests. Deletions really remove records, so
//! a second pass over the same store sees what the host would.

use anyhow::{Result, anyhow};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;

use crate::error::ExpireError;
use crate::tavern::ChatStore;
use crate::tavern::types::{
    BackupEntry, ChatFileEntry, MaintenanceReport, MaintenanceToken, OwnerScope, RosterCharacter,
    RosterGroup,
};

pub fn character(name: &str, avatar: Option<&str>) -> RosterCharacter {
    RosterCharacter {
        name: name.to_string(),
        avatar: avatar.map(ToOwned::to_owned),
        chat: None,
    }
}

pub fn group(id: Option<&str>, name: &str) -> RosterGroup {
    RosterGroup {
        id: id.map(ToOwned::to_owned),
        name: name.to_string(),
        chat_id: None,
    }
}

#[derive(Default)]
struct FakeState {
    characters: Vec<RosterCharacter>,
    groups: Vec<RosterGroup>,
    chats: Vec<(String, ChatFileEntry)>,
    backups: Vec<BackupEntry>,
    withhold_token: bool,
    tokens_issued: usize,

    failing_searches: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    fail_roster: bool,
    fail_report: bool,
    fail_backup_delete: bool,
    fail_finalize: bool,

    search_calls: usize,
    report_calls: usize,
    deleted_chats: Vec<String>,
    backup_delete_calls: Vec<Vec<String>>,
    finalize_attempts: usize,
    finalized: Vec<String>,
}

#[derive(Default)]
pub struct FakeStore {
    state: RefCell<FakeState>,
}

fn scope_key(scope: OwnerScope<'_>) -> &str {
    match scope {
        OwnerScope::Character { avatar } => avatar,
        OwnerScope::Group { id } => id,
    }
}

fn transport(operation: &'static str) -> anyhow::Error {
    ExpireError::Transport {
        operation,
        status: 500,
    }
    .into()
}

impl FakeStore {
    pub fn add_character(&self, name: &str, avatar: &str, open_chat: Option<&str>) {
        let mut c = character(name, Some(avatar));
        c.chat = open_chat.map(ToOwned::to_owned);
        self.state.borrow_mut().characters.push(c);
    }

    pub fn add_group(&self, id: &str, name: &str, open_chat: Option<&str>) {
        let mut g = group(Some(id), name);
        g.chat_id = open_chat.map(ToOwned::to_owned);
        self.state.borrow_mut().groups.push(g);
    }

    /// `owner_key` is the character avatar or the group id.
    pub fn add_chat(&self, owner_key: &str, file_name: &str, last_mes: Value) {
        self.state.borrow_mut().chats.push((
            owner_key.to_string(),
            ChatFileEntry {
                file_name: file_name.to_string(),
                last_mes: Some(last_mes),
            },
        ));
    }

    pub fn add_backup(&self, name: &str, hash: &str, mtime: Option<Value>) {
        self.state.borrow_mut().backups.push(BackupEntry {
            name: name.to_string(),
            hash: hash.to_string(),
            mtime,
        });
    }

    pub fn withhold_token(&self) {
        self.state.borrow_mut().withhold_token = true;
    }

    pub fn fail_search_for(&self, owner_key: &str) {
        self.state
            .borrow_mut()
            .failing_searches
            .insert(owner_key.to_string());
    }

    pub fn fail_delete_of(&self, file_name: &str) {
        self.state
            .borrow_mut()
            .failing_deletes
            .insert(file_name.to_string());
    }

    pub fn fail_roster(&self) {
        self.state.borrow_mut().fail_roster = true;
    }

    pub fn fail_report(&self) {
        self.state.borrow_mut().fail_report = true;
    }

    pub fn fail_backup_delete(&self) {
        self.state.borrow_mut().fail_backup_delete = true;
    }

    pub fn fail_finalize(&self) {
        self.state.borrow_mut().fail_finalize = true;
    }

    pub fn search_count(&self) -> usize {
        self.state.borrow().search_calls
    }

    pub fn report_count(&self) -> usize {
        self.state.borrow().report_calls
    }

    pub fn tokens_issued(&self) -> usize {
        self.state.borrow().tokens_issued
    }

    pub fn deleted_chats(&self) -> Vec<String> {
        self.state.borrow().deleted_chats.clone()
    }

    pub fn backup_delete_calls(&self) -> Vec<Vec<String>> {
        self.state.borrow().backup_delete_calls.clone()
    }

    pub fn finalize_attempts(&self) -> usize {
        self.state.borrow().finalize_attempts
    }

    pub fn finalized(&self) -> Vec<String> {
        self.state.borrow().finalized.clone()
    }

    pub fn remaining_chats(&self) -> usize {
        self.state.borrow().chats.len()
    }

    pub fn remaining_backups(&self) -> usize {
        self.state.borrow().backups.len()
    }
}

impl ChatStore for FakeStore {
    fn list_characters(&self) -> Result<Vec<RosterCharacter>> {
        let state = self.state.borrow();
        if state.fail_roster {
            return Err(transport("characters/all"));
        }
        Ok(state.characters.clone())
    }

    fn list_groups(&self) -> Result<Vec<RosterGroup>> {
        let state = self.state.borrow();
        if state.fail_roster {
            return Err(transport("groups/all"));
        }
        Ok(state.groups.clone())
    }

    fn search_chats(&self, scope: OwnerScope<'_>) -> Result<Vec<ChatFileEntry>> {
        let mut state = self.state.borrow_mut();
        state.search_calls += 1;
        let key = scope_key(scope);
        if state.failing_searches.contains(key) {
            return Err(transport("chats/search"));
        }
        Ok(state
            .chats
            .iter()
            .filter(|(owner, _)| owner == key)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    fn delete_chat(&self, file_name: &str, scope: OwnerScope<'_>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failing_deletes.contains(file_name) {
            return Err(transport("chats/delete"));
        }
        let key = scope_key(scope).to_string();
        let before = state.chats.len();
        state
            .chats
            .retain(|(owner, entry)| !(owner == &key && entry.file_name == file_name));
        if state.chats.len() == before {
            return Err(anyhow!("chat {file_name} not found for {key}"));
        }
        state.deleted_chats.push(file_name.to_string());
        Ok(())
    }

    fn maintenance_report(&self) -> Result<MaintenanceReport> {
        let mut state = self.state.borrow_mut();
        state.report_calls += 1;
        if state.fail_report {
            return Err(transport("data-maid/report"));
        }
        let token = if state.withhold_token {
            None
        } else {
            state.tokens_issued += 1;
            Some(MaintenanceToken::new(format!("maid-{}", state.tokens_issued)))
        };
        Ok(MaintenanceReport {
            backups: state.backups.clone(),
            token,
        })
    }

    fn delete_backups(&self, hashes: &[String], _token: &MaintenanceToken) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.backup_delete_calls.push(hashes.to_vec());
        if state.fail_backup_delete {
            return Err(transport("data-maid/delete"));
        }
        state.backups.retain(|b| !hashes.contains(&b.hash));
        Ok(())
    }

    fn finalize_maintenance(&self, token: &MaintenanceToken) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.finalize_attempts += 1;
        if state.fail_finalize {
            return Err(transport("data-maid/finalize"));
        }
        state.finalized.push(token.as_str().to_string());
        Ok(())
    }
}
