use serenity::model::Permissions;
use serenity::model::channel::Message;
use serenity::model::guild::Guild;
use serenity::model::id::RoleId;

/// Operator commands recognized at the gateway boundary. Everything else
/// in a message is treated as plain activity to mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorCommand {
    Sync,
    Stats,
}

pub fn parse_command(prefix: &str, content: &str) -> Option<MirrorCommand> {
    let rest = content.trim().strip_prefix(prefix)?;
    match rest.split_whitespace().next()? {
        "sync" => Some(MirrorCommand::Sync),
        "stats" => Some(MirrorCommand::Stats),
        _ => None,
    }
}

// Gateway message payloads carry no resolved permission set (that field
// only arrives on interactions), so the check walks the cached guild:
// the owner always passes, otherwise the author's roles decide. Missing
// data fails closed.
pub fn is_administrator(guild: &Guild, message: &Message) -> bool {
    let resolved = message.member.as_ref().and_then(|member| member.permissions);

    let mut role_permissions: Vec<Permissions> = Vec::new();
    if let Some(member) = message.member.as_ref() {
        for role_id in &member.roles {
            if let Some(role) = guild.roles.get(role_id) {
                role_permissions.push(role.permissions);
            }
        }
    }
    // The @everyone role shares the guild's id and is not listed on the
    // member.
    if let Some(everyone) = guild.roles.get(&RoleId::new(guild.id.get())) {
        role_permissions.push(everyone.permissions);
    }

    has_admin_permission(
        guild.owner_id == message.author.id,
        resolved,
        &role_permissions,
    )
}

fn has_admin_permission(
    is_owner: bool,
    resolved: Option<Permissions>,
    role_permissions: &[Permissions],
) -> bool {
    is_owner
        || resolved
            .map(|permissions| permissions.administrator())
            .unwrap_or(false)
        || role_permissions
            .iter()
            .any(|permissions| permissions.administrator())
}
