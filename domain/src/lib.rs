use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// --- Domain Errors ---
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Name invalid: {0}")]
    InvalidName(String),
}

// --- Account ID ---

/// Store-assigned identity of an account. Never reused within a store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl From<AccountId> for i64 {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Account ---

/// The persisted record. Serializes as `{"id": <int>, "name": <text>}`, which is
/// also the document shape used by the document-backed store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}

impl Account {
    /// Builds an account from validated input and a freshly allocated id.
    pub fn new(id: AccountId, input: AccountInput) -> Result<Self, DomainError> {
        let input = input.validate()?;
        Ok(Self {
            id,
            name: input.name,
        })
    }

    /// Replaces the name, keeping the id untouched.
    pub fn rename(&mut self, input: &AccountInput) -> Result<(), DomainError> {
        input.check()?;
        self.name = input.name.clone();
        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account {}, Name {}", self.id, self.name)
    }
}

// --- Account Input ---

/// Creation/update payload as received from a client. Not trusted until validated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountInput {
    #[serde(default)]
    pub name: String,
}

impl AccountInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Checks the input without consuming it.
    pub fn check(&self) -> Result<(), DomainError> {
        if self.name.is_empty() {
            return Err(DomainError::InvalidName(
                "Account name must not be empty.".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates and hands the input back so it can be consumed.
    pub fn validate(self) -> Result<Self, DomainError> {
        self.check()?;
        Ok(self)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_with_name_is_valid() {
        assert!(AccountInput::new("Alice").check().is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let result = AccountInput::new("").validate();
        assert!(matches!(result, Err(DomainError::InvalidName(_))));
    }

    #[test]
    fn whitespace_name_counts_as_non_empty() {
        assert!(AccountInput::new(" ").check().is_ok());
        assert!(AccountInput::new("").check().is_err());
    }

    #[test]
    fn account_new_takes_name_from_input() {
        let account = Account::new(AccountId::new(7), AccountInput::new("Bob")).unwrap();
        assert_eq!(account.id, AccountId::new(7));
        assert_eq!(account.name, "Bob");
    }

    #[test]
    fn rename_keeps_id() {
        let mut account = Account::new(AccountId::new(1), AccountInput::new("Alice")).unwrap();
        account.rename(&AccountInput::new("Alicia")).unwrap();
        assert_eq!(account.id, AccountId::new(1));
        assert_eq!(account.name, "Alicia");
    }

    #[test]
    fn rename_with_empty_name_leaves_account_untouched() {
        let mut account = Account::new(AccountId::new(1), AccountInput::new("Alice")).unwrap();
        assert!(account.rename(&AccountInput::new("")).is_err());
        assert_eq!(account.name, "Alice");
    }

    #[test]
    fn account_serializes_with_integer_id_and_name() {
        let account = Account::new(AccountId::new(2), AccountInput::new("Bob")).unwrap();
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value, json!({ "id": 2, "name": "Bob" }));
    }

    #[test]
    fn missing_name_deserializes_as_empty_and_fails_validation() {
        let input: AccountInput = serde_json::from_value(json!({})).unwrap();
        assert!(input.check().is_err());
    }

    #[test]
    fn display_matches_log_format() {
        let account = Account::new(AccountId::new(3), AccountInput::new("Carol")).unwrap();
        assert_eq!(account.to_string(), "Account 3, Name Carol");
    }
}
