/// A chat the account participates in, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub name: String,
    pub is_group: bool,
}

/// Which group a workflow should operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    pub name: String,
    /// When set, a group with this id also matches regardless of its name.
    pub id: Option<i64>,
}

impl GroupQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn by_name_or_id(name: impl Into<String>, id: Option<i64>) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    pub fn matches(&self, conversation: &Conversation) -> bool {
        conversation.is_group
            && (conversation.name == self.name || self.id == Some(conversation.id))
    }
}
