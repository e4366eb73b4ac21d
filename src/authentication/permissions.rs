use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoplist,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoplist,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnShoplist,
    ManageOwnSubscriptions,

    ManageUsers,
    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(uid, actions)| {
                if role != uid {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: "maija".into(),
            is_admin: role == UserRole::Admin,
            role,
        }
    }

    #[test]
    fn plain_users_manage_only_their_own_things() {
        let user = session(UserRole::User);
        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(ActionType::ManageOwnRecipes.authenticate(&user));
        assert!(!ActionType::ManageAllRecipes.authenticate(&user));
        assert!(!ActionType::ManageUsers.authenticate(&user));
    }

    #[test]
    fn admins_hold_every_grant() {
        let admin = session(UserRole::Admin);
        assert!(ActionType::ManageAllRecipes.authenticate(&admin));
        assert!(ActionType::ManageUsers.authenticate(&admin));
    }
}
