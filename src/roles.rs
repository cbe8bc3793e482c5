// 13.0 roles.rs: access control for privileged operations. every privileged
// entry point makes exactly one capability check at the top,
// registry.require(caller, role). no inheritance, no implicit elevation; an
// account holds exactly the roles it was granted.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// 13.1: the capabilities an account can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    // parameter setters, manual settlement, pause/resume, oracle management
    Admin,
    // casts emergency activation votes
    Guardian,
    // submits oracle reports, triggers aggregation and settlement crank calls
    Operator,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RoleError {
    #[error("Account {0:?} lacks required role {1:?}")]
    Unauthorized(AccountId, Role),
}

// 13.2: explicit role-assignment map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRegistry {
    assignments: HashMap<AccountId, HashSet<Role>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, account: AccountId, role: Role) {
        self.assignments.entry(account).or_default().insert(role);
    }

    pub fn revoke(&mut self, account: AccountId, role: Role) {
        if let Some(roles) = self.assignments.get_mut(&account) {
            roles.remove(&role);
        }
    }

    pub fn has_role(&self, account: AccountId, role: Role) -> bool {
        self.assignments
            .get(&account)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    // 13.3: allow/deny check. a deny is a typed error callers propagate with ?
    pub fn require(&self, account: AccountId, role: Role) -> Result<(), RoleError> {
        if self.has_role(account, role) {
            Ok(())
        } else {
            Err(RoleError::Unauthorized(account, role))
        }
    }

    pub fn accounts_with(&self, role: Role) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self
            .assignments
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(id, _)| *id)
            .collect();
        accounts.sort_by_key(|id| id.0);
        accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_and_require() {
        let mut registry = RoleRegistry::new();
        let admin = AccountId(1);
        let user = AccountId(2);

        registry.grant(admin, Role::Admin);

        assert!(registry.require(admin, Role::Admin).is_ok());
        assert!(matches!(
            registry.require(user, Role::Admin),
            Err(RoleError::Unauthorized(..))
        ));
    }

    #[test]
    fn roles_are_independent() {
        let mut registry = RoleRegistry::new();
        let guardian = AccountId(7);

        registry.grant(guardian, Role::Guardian);

        assert!(registry.require(guardian, Role::Guardian).is_ok());
        // guardian does not imply admin
        assert!(registry.require(guardian, Role::Admin).is_err());
    }

    #[test]
    fn revoke_removes_capability() {
        let mut registry = RoleRegistry::new();
        let op = AccountId(3);

        registry.grant(op, Role::Operator);
        assert!(registry.require(op, Role::Operator).is_ok());

        registry.revoke(op, Role::Operator);
        assert!(registry.require(op, Role::Operator).is_err());
    }

    #[test]
    fn accounts_with_role() {
        let mut registry = RoleRegistry::new();
        registry.grant(AccountId(2), Role::Guardian);
        registry.grant(AccountId(1), Role::Guardian);
        registry.grant(AccountId(3), Role::Admin);

        let guardians = registry.accounts_with(Role::Guardian);
        assert_eq!(guardians, vec![AccountId(1), AccountId(2)]);
    }
}
