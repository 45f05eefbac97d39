use crate::{
    domain::{Conversation, GroupQuery},
    platform::{ChatPlatform, PlatformResult},
};

/// First group in `conversations` that satisfies `query`.
pub fn find_group<'a>(
    conversations: &'a [Conversation],
    query: &GroupQuery,
) -> Option<&'a Conversation> {
    conversations
        .iter()
        .find(|conversation| query.matches(conversation))
}

/// Looks the target group up among the account's known conversations.
/// `Ok(None)` means the group is not there; no retry is attempted.
pub async fn resolve_group(
    platform: &dyn ChatPlatform,
    query: &GroupQuery,
) -> PlatformResult<Option<Conversation>> {
    let conversations = platform.conversations().await?;
    tracing::debug!(
        target: "resolver",
        known = conversations.len(),
        name = %query.name,
        id = ?query.id,
        "scanning conversations"
    );

    let found = find_group(&conversations, query).cloned();
    match &found {
        Some(group) => tracing::info!(
            target: "resolver",
            name = %group.name,
            id = group.id,
            "found group"
        ),
        None => tracing::warn!(
            target: "resolver",
            name = %query.name,
            id = ?query.id,
            "could not find group"
        ),
    }
    Ok(found)
}
