//! # Signature Rules
//!
//! An ordered list of declarative rules decides, per message kind and
//! action, whether a message must be signed on the way out and/or verified
//! on the way in. The first matching rule wins; messages matched by no rule
//! fall back to the policy's default requirement.

use crate::domain::errors::PolicyError;
use fl_01_envelope::MessageKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a message is travelling relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Received from a peer.
    Incoming,
    /// About to be transmitted.
    Outgoing,
}

/// What a rule demands of matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignatureRequirement {
    /// No signing and no verification.
    #[default]
    None,
    /// Sign outgoing messages.
    Sign,
    /// Verify incoming messages.
    Verify,
    /// Sign outgoing and verify incoming messages.
    SignAndVerify,
}

impl SignatureRequirement {
    /// Whether this requirement does anything in `direction`.
    #[must_use]
    pub fn applies_to(self, direction: Direction) -> bool {
        match (self, direction) {
            (Self::None, _) => false,
            (Self::Sign, Direction::Outgoing) | (Self::Verify, Direction::Incoming) => true,
            (Self::SignAndVerify, _) => true,
            _ => false,
        }
    }
}

/// Action matcher: `*` matches everything, `Prefix*` matches by prefix,
/// anything else must match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionPattern {
    Any,
    Prefix(String),
    Exact(String),
}

impl ActionPattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        match pattern {
            "" => Err(PolicyError::InvalidPattern(pattern.to_string())),
            "*" => Ok(Self::Any),
            p => match p.strip_suffix('*') {
                Some(prefix) if prefix.contains('*') => {
                    Err(PolicyError::InvalidPattern(pattern.to_string()))
                }
                Some(prefix) => Ok(Self::Prefix(prefix.to_string())),
                None if p.contains('*') => Err(PolicyError::InvalidPattern(pattern.to_string())),
                None => Ok(Self::Exact(p.to_string())),
            },
        }
    }

    #[must_use]
    pub fn matches(&self, action: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => action.starts_with(prefix.as_str()),
            Self::Exact(exact) => action == exact,
        }
    }
}

impl TryFrom<String> for ActionPattern {
    type Error = PolicyError;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::parse(&pattern)
    }
}

impl From<ActionPattern> for String {
    fn from(pattern: ActionPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for ActionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Exact(exact) => f.write_str(exact),
        }
    }
}

/// One policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRule {
    /// Message kind the rule applies to. `None` matches every kind.
    #[serde(default)]
    pub kind: Option<MessageKind>,

    /// Actions the rule applies to. For responses and errors this is the
    /// action of the request they answer.
    pub action: ActionPattern,

    pub requirement: SignatureRequirement,

    /// Keys to sign with, and the only keys accepted when verifying.
    /// Empty means every configured key.
    #[serde(default)]
    pub keys: Vec<String>,
}

impl SignatureRule {
    /// Rule matching every kind for `action`.
    #[must_use]
    pub fn new(action: ActionPattern, requirement: SignatureRequirement) -> Self {
        Self {
            kind: None,
            action,
            requirement,
            keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn matches(&self, kind: MessageKind, action: &str) -> bool {
        self.kind.map_or(true, |k| k == kind) && self.action.matches(action)
    }
}

/// First rule matching `kind` and `action`.
#[must_use]
pub fn first_match<'a>(
    rules: &'a [SignatureRule],
    kind: MessageKind,
    action: &str,
) -> Option<&'a SignatureRule> {
    rules.iter().find(|rule| rule.matches(kind, action))
}
