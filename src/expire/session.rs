use serde::Serialize;

use crate::expire::candidates::{ConversationCandidate, Owner, Roster, strip_chat_extension};

/// What the caller says is open right now, before it is checked against the
/// roster.
#[derive(Debug, Clone, Default)]
pub struct SessionSelector {
    pub character: Option<usize>,
    pub group: Option<String>,
    pub chat: Option<String>,
}

/// The conversation currently open in the user's session. Read once per pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub active_character: Option<usize>,
    pub active_group: Option<String>,
    pub active_file: Option<String>,
}

impl SessionContext {
    /// An explicit chat wins; otherwise the open chat is whatever the roster
    /// records for the active group or character.
    pub fn resolve(selector: &SessionSelector, roster: &Roster) -> Self {
        let active_group = selector
            .group
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned);
        let active_character = selector.character;

        let roster_chat = if let Some(group_id) = active_group.as_deref() {
            roster
                .groups
                .iter()
                .find(|g| g.id.as_deref() == Some(group_id))
                .and_then(|g| g.chat_id.clone())
        } else {
            active_character
                .and_then(|index| roster.characters.get(index))
                .and_then(|c| c.chat.clone())
        };

        let active_file = selector
            .chat
            .as_deref()
            .map(str::trim)
            .filter(|chat| !chat.is_empty())
            .map(ToOwned::to_owned)
            .or(roster_chat)
            .map(|chat| strip_chat_extension(&chat).to_string());

        Self {
            active_character,
            active_group,
            active_file,
        }
    }
}

/// True iff `candidate` is the chat open in `session`. Owner and chat file
/// must both match; other chats of the active owner are fair game.
pub fn is_active_conversation(candidate: &ConversationCandidate, session: &SessionContext) -> bool {
    let Some(active_file) = session.active_file.as_deref() else {
        return false;
    };
    let owner_matches = match &candidate.owner {
        Owner::Group { id, .. } => session.active_group.as_deref() == Some(id.as_str()),
        Owner::Character { index, .. } => session.active_character == Some(*index),
    };
    owner_matches && candidate.chat_id() == active_file
}
