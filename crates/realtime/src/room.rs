//! Room names and join rules.
//!
//! | room          | who may join     |
//! |---------------|------------------|
//! | `kitchen`     | kitchen, admin   |
//! | `waiter`      | waiter, admin    |
//! | `table_<id>`  | anyone           |

use common::TableId;
use domain::Channel;

use crate::error::JoinError;
use crate::identity::{Identity, Role};

const TABLE_PREFIX: &str = "table_";

/// Parses a room name into its channel.
pub fn parse(name: &str) -> Result<Channel, JoinError> {
    match name {
        "kitchen" => Ok(Channel::Kitchen),
        "waiter" => Ok(Channel::Waiter),
        _ => name
            .strip_prefix(TABLE_PREFIX)
            .and_then(|id| id.parse::<TableId>().ok())
            .map(Channel::Table)
            .ok_or_else(|| JoinError::UnknownRoom(name.to_string())),
    }
}

pub fn can_join(role: Role, channel: Channel) -> bool {
    match channel {
        Channel::Kitchen => matches!(role, Role::Kitchen | Role::Admin),
        Channel::Waiter => matches!(role, Role::Waiter | Role::Admin),
        Channel::Table(_) => true,
    }
}

/// Parses and authorizes a join request.
pub fn authorize(name: &str, identity: &Identity) -> Result<Channel, JoinError> {
    let channel = parse(name)?;
    if !can_join(identity.role, channel) {
        return Err(JoinError::Forbidden {
            room: channel.name(),
            role: identity.role,
        });
    }
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;

    #[test]
    fn parses_known_rooms() {
        let table_id = TableId::new();
        assert_eq!(parse("kitchen"), Ok(Channel::Kitchen));
        assert_eq!(parse("waiter"), Ok(Channel::Waiter));
        assert_eq!(
            parse(&format!("table_{table_id}")),
            Ok(Channel::Table(table_id))
        );
    }

    #[test]
    fn rejects_unknown_rooms() {
        for name in ["admin", "table_", "table_42", "Kitchen", ""] {
            assert_eq!(parse(name), Err(JoinError::UnknownRoom(name.to_string())));
        }
    }

    #[test]
    fn staff_rooms_are_role_gated() {
        let guest = Identity::guest();
        let waiter = Identity::user(UserId::new(), Role::Waiter);
        let admin = Identity::user(UserId::new(), Role::Admin);

        assert!(matches!(
            authorize("kitchen", &guest),
            Err(JoinError::Forbidden { role: Role::Guest, .. })
        ));
        assert!(authorize("kitchen", &waiter).is_err());
        assert_eq!(authorize("waiter", &waiter), Ok(Channel::Waiter));
        assert_eq!(authorize("kitchen", &admin), Ok(Channel::Kitchen));
    }

    #[test]
    fn table_rooms_are_open() {
        let name = format!("table_{}", TableId::new());
        assert!(authorize(&name, &Identity::guest()).is_ok());
    }
}
