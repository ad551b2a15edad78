//! # Signature Policy Service
//!
//! Holds the active rules and key material as one immutable snapshot.
//! Rotation publishes a new snapshot; evaluations already running keep
//! using the one they started with.

use crate::domain::canonical::canonical_bytes;
use crate::domain::config::SignaturesConfig;
use crate::domain::errors::PolicyError;
use crate::domain::keys::KeyStore;
use crate::domain::rules::{first_match, Direction, SignatureRequirement, SignatureRule};
use crate::ports::inbound::{SignResult, SignaturePolicyApi};
use fl_01_envelope::{Envelope, MessageKind, Signature};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rules, default and keys in force at one point in time.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    pub rules: Vec<SignatureRule>,
    pub default_requirement: SignatureRequirement,
    pub keys: KeyStore,
}

impl PolicySnapshot {
    pub fn from_config(config: &SignaturesConfig) -> Result<Self, PolicyError> {
        let keys = KeyStore::from_config(&config.keys)?;
        for rule in &config.rules {
            if let Some(missing) = rule.keys.iter().find(|id| keys.trusted_key(id).is_none()) {
                return Err(PolicyError::UnknownKey(missing.clone()));
            }
        }
        Ok(Self {
            rules: config.rules.clone(),
            default_requirement: config.default_requirement,
            keys,
        })
    }

    /// Requirement and accepted key ids for a message.
    #[must_use]
    pub fn requirement_for(&self, kind: MessageKind, action: &str) -> (SignatureRequirement, &[String]) {
        match first_match(&self.rules, kind, action) {
            Some(rule) => (rule.requirement, rule.keys.as_slice()),
            None => (self.default_requirement, &[][..]),
        }
    }
}

/// The signature policy in force on this node.
#[derive(Debug, Default)]
pub struct SignaturePolicy {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl SignaturePolicy {
    #[must_use]
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Policy that signs and verifies nothing.
    #[must_use]
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SignaturesConfig) -> Result<Self, PolicyError> {
        Ok(Self::new(PolicySnapshot::from_config(config)?))
    }

    /// The snapshot currently in force.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.read().clone()
    }

    /// Swap in new key material, keeping rules.
    pub fn rotate_keys(&self, keys: KeyStore) {
        self.update(|snapshot| snapshot.keys = keys);
        debug!("Signature keys rotated");
    }

    /// Swap in a new rule list, keeping keys.
    pub fn replace_rules(&self, rules: Vec<SignatureRule>) {
        let count = rules.len();
        self.update(|snapshot| snapshot.rules = rules);
        debug!(rules = count, "Signature rules replaced");
    }

    pub fn set_default_requirement(&self, requirement: SignatureRequirement) {
        self.update(|snapshot| snapshot.default_requirement = requirement);
    }

    fn update(&self, change: impl FnOnce(&mut PolicySnapshot)) {
        let mut current = self.current.write();
        let mut next = PolicySnapshot::clone(&current);
        change(&mut next);
        *current = Arc::new(next);
    }

    fn sign(keys: &KeyStore, envelope: &mut Envelope, key_ids: &[String]) -> Result<(), PolicyError> {
        let message = canonical_bytes(envelope.payload())?;

        let mut signatures = Vec::new();
        let mut push = |id: &str, key: &crate::domain::keys::SigningKey| {
            signatures.push(Signature {
                key_id: id.to_string(),
                algorithm: key.algorithm(),
                value: key.sign_hex(&message),
            });
        };

        if key_ids.is_empty() {
            for (id, key) in keys.signing_keys() {
                push(id, key);
            }
        } else {
            for id in key_ids {
                let key = keys
                    .signing_key(id)
                    .ok_or_else(|| PolicyError::UnknownKey(id.clone()))?;
                push(id, key);
            }
        }

        if signatures.is_empty() {
            return Err(PolicyError::NoSigningKey);
        }

        // Re-signing with a key replaces its earlier signature.
        let header = envelope.header_mut();
        header
            .signatures
            .retain(|existing| !signatures.iter().any(|s| s.key_id == existing.key_id));
        header.signatures.extend(signatures);
        Ok(())
    }

    fn verify(keys: &KeyStore, envelope: &Envelope, key_ids: &[String]) -> Result<(), PolicyError> {
        let signatures = envelope.signatures();
        if signatures.is_empty() {
            return Err(PolicyError::MissingSignature);
        }

        let message = canonical_bytes(envelope.payload())?;
        for signature in signatures {
            if !key_ids.is_empty() && !key_ids.contains(&signature.key_id) {
                return Err(PolicyError::UntrustedKey(signature.key_id.clone()));
            }
            let key = keys
                .trusted_key(&signature.key_id)
                .ok_or_else(|| PolicyError::UnknownKey(signature.key_id.clone()))?;
            key.verify(&message, signature)?;
        }
        Ok(())
    }
}

impl SignaturePolicyApi for SignaturePolicy {
    fn evaluate(&self, envelope: &mut Envelope, action: &str, direction: Direction) -> SignResult {
        let snapshot = self.snapshot();
        let (requirement, key_ids) = snapshot.requirement_for(envelope.kind(), action);

        if !requirement.applies_to(direction) {
            return SignResult::Pass;
        }

        let result = match direction {
            Direction::Outgoing => Self::sign(&snapshot.keys, envelope, key_ids),
            Direction::Incoming => Self::verify(&snapshot.keys, envelope, key_ids),
        };

        match result {
            Ok(()) => {
                debug!(
                    correlation_id = %envelope.correlation_id(),
                    action,
                    ?direction,
                    "Signature policy passed"
                );
                SignResult::Pass
            }
            Err(e) => {
                warn!(
                    correlation_id = %envelope.correlation_id(),
                    action,
                    ?direction,
                    error = %e,
                    "Signature policy failed"
                );
                SignResult::Fail(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::{SigningKey, VerifyingKey};
    use crate::domain::rules::ActionPattern;
    use fl_01_envelope::{ErrorFrame, Payload, Request, SignatureAlgorithm};
    use shared_crypto::{Ed25519KeyPair, HmacKey};
    use shared_types::ErrorCode;

    fn hmac_store(id: &str, secret: &[u8]) -> KeyStore {
        let mut keys = KeyStore::new();
        keys.add_signing_key(id, SigningKey::Hmac(HmacKey::new(secret.to_vec()).unwrap()));
        keys
    }

    fn request(action: &str, payload: &str) -> Envelope {
        Envelope::Request(
            Request::new(action, Payload::from_json_str(payload).unwrap()).with_correlation_id("1"),
        )
    }

    fn policy(requirement: SignatureRequirement, keys: KeyStore) -> SignaturePolicy {
        SignaturePolicy::new(PolicySnapshot {
            rules: vec![SignatureRule::new(ActionPattern::Any, requirement)],
            default_requirement: SignatureRequirement::None,
            keys,
        })
    }

    #[test]
    fn test_default_none_passes_untouched() {
        let policy = SignaturePolicy::permissive();
        let mut envelope = request("Heartbeat", "{}");
        let before = envelope.clone();

        assert_eq!(policy.evaluate(&mut envelope, "Heartbeat", Direction::Outgoing), SignResult::Pass);
        assert_eq!(policy.evaluate(&mut envelope, "Heartbeat", Direction::Incoming), SignResult::Pass);
        assert_eq!(envelope, before);
    }

    #[test]
    fn test_default_requirement_is_overridable() {
        let policy = SignaturePolicy::new(PolicySnapshot {
            keys: hmac_store("k", b"secret"),
            ..PolicySnapshot::default()
        });
        policy.set_default_requirement(SignatureRequirement::Verify);

        let mut unsigned = request("Heartbeat", "{}");
        assert!(!policy.evaluate(&mut unsigned, "Heartbeat", Direction::Incoming).is_pass());
    }

    #[test]
    fn test_sign_then_verify() {
        let policy = policy(SignatureRequirement::SignAndVerify, hmac_store("k", b"secret"));
        let mut envelope = request("Reset", r#"{"type":"Immediate"}"#);

        assert!(policy.evaluate(&mut envelope, "Reset", Direction::Outgoing).is_pass());
        assert_eq!(envelope.signatures().len(), 1);
        assert_eq!(envelope.signatures()[0].algorithm, SignatureAlgorithm::HmacSha256);

        assert!(policy.evaluate(&mut envelope, "Reset", Direction::Incoming).is_pass());
    }

    #[test]
    fn test_verification_survives_reformatting() {
        let policy = policy(SignatureRequirement::SignAndVerify, hmac_store("k", b"secret"));
        let mut signed = request("Reset", r#"{"b":1,"a":2}"#);
        assert!(policy.evaluate(&mut signed, "Reset", Direction::Outgoing).is_pass());

        let mut reformatted = request("Reset", r#"{ "a": 2, "b": 1 }"#);
        reformatted.header_mut().signatures = signed.signatures().to_vec();
        assert!(policy.evaluate(&mut reformatted, "Reset", Direction::Incoming).is_pass());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let policy = policy(SignatureRequirement::SignAndVerify, hmac_store("k", b"secret"));
        let mut signed = request("Reset", r#"{"type":"Immediate"}"#);
        assert!(policy.evaluate(&mut signed, "Reset", Direction::Outgoing).is_pass());

        let mut tampered = request("Reset", r#"{"type":"OnIdle"}"#);
        tampered.header_mut().signatures = signed.signatures().to_vec();
        assert!(matches!(
            policy.evaluate(&mut tampered, "Reset", Direction::Incoming),
            SignResult::Fail(_)
        ));
    }

    #[test]
    fn test_missing_signature_fails() {
        let policy = policy(SignatureRequirement::Verify, hmac_store("k", b"secret"));
        let mut envelope = request("Reset", "{}");
        assert_eq!(
            policy.evaluate(&mut envelope, "Reset", Direction::Incoming),
            SignResult::Fail("message is not signed".into())
        );
    }

    #[test]
    fn test_failure_has_no_side_effects() {
        let mut rules_policy = PolicySnapshot {
            rules: vec![SignatureRule::new(ActionPattern::Any, SignatureRequirement::Sign)
                .with_keys(vec!["k".into(), "absent".into()])],
            default_requirement: SignatureRequirement::None,
            keys: hmac_store("k", b"secret"),
        };
        let policy = SignaturePolicy::new(rules_policy.clone());
        let mut envelope = request("Reset", "{}");
        let before = envelope.clone();

        assert!(!policy.evaluate(&mut envelope, "Reset", Direction::Outgoing).is_pass());
        assert_eq!(envelope, before);

        rules_policy.keys = KeyStore::new();
        rules_policy.rules[0].keys.clear();
        let policy = SignaturePolicy::new(rules_policy);
        assert_eq!(
            policy.evaluate(&mut envelope, "Reset", Direction::Outgoing),
            SignResult::Fail("no signing key configured".into())
        );
        assert_eq!(envelope, before);
    }

    #[test]
    fn test_untrusted_key_rejected() {
        let mut keys = hmac_store("a", b"one");
        keys.add_signing_key("b", SigningKey::Hmac(HmacKey::new(b"two".to_vec()).unwrap()));
        let snapshot = PolicySnapshot {
            rules: vec![
                SignatureRule::new(ActionPattern::Any, SignatureRequirement::Sign)
                    .with_keys(vec!["b".into()])
                    .for_kind(MessageKind::Request),
                SignatureRule::new(ActionPattern::Any, SignatureRequirement::Verify)
                    .with_keys(vec!["a".into()]),
            ],
            default_requirement: SignatureRequirement::None,
            keys,
        };
        let signer = SignaturePolicy::new(snapshot.clone());
        let mut envelope = request("Reset", "{}");
        assert!(signer.evaluate(&mut envelope, "Reset", Direction::Outgoing).is_pass());

        // Verify with the second rule only: signed by "b", rule accepts "a".
        let verifier = SignaturePolicy::new(PolicySnapshot {
            rules: snapshot.rules[1..].to_vec(),
            ..snapshot
        });
        assert!(matches!(
            verifier.evaluate(&mut envelope, "Reset", Direction::Incoming),
            SignResult::Fail(reason) if reason.contains("not accepted")
        ));
    }

    #[test]
    fn test_first_rule_wins_over_default() {
        let policy = SignaturePolicy::new(PolicySnapshot {
            rules: vec![SignatureRule::new(
                ActionPattern::Exact("Heartbeat".into()),
                SignatureRequirement::None,
            )],
            default_requirement: SignatureRequirement::Verify,
            keys: KeyStore::new(),
        });

        let mut heartbeat = request("Heartbeat", "{}");
        assert!(policy.evaluate(&mut heartbeat, "Heartbeat", Direction::Incoming).is_pass());
        let mut reset = request("Reset", "{}");
        assert!(!policy.evaluate(&mut reset, "Reset", Direction::Incoming).is_pass());
    }

    #[test]
    fn test_ed25519_trust() {
        let pair = Ed25519KeyPair::from_seed([9u8; 32]);
        let mut signer_keys = KeyStore::new();
        signer_keys.add_signing_key("csms", SigningKey::Ed25519(pair.clone()));
        let mut verifier_keys = KeyStore::new();
        verifier_keys.add_trusted_key("csms", VerifyingKey::Ed25519(pair.public_key()));

        let signer = policy(SignatureRequirement::Sign, signer_keys);
        let verifier = policy(SignatureRequirement::Verify, verifier_keys);

        let mut envelope = request("UpdateFirmware", r#"{"url":"x"}"#);
        assert!(signer.evaluate(&mut envelope, "UpdateFirmware", Direction::Outgoing).is_pass());
        assert!(verifier.evaluate(&mut envelope, "UpdateFirmware", Direction::Incoming).is_pass());
    }

    #[test]
    fn test_resign_replaces_own_signature() {
        let policy = policy(SignatureRequirement::Sign, hmac_store("k", b"secret"));
        let mut envelope = request("Reset", "{}");
        assert!(policy.evaluate(&mut envelope, "Reset", Direction::Outgoing).is_pass());
        assert!(policy.evaluate(&mut envelope, "Reset", Direction::Outgoing).is_pass());
        assert_eq!(envelope.signatures().len(), 1);
    }

    #[test]
    fn test_error_frames_signed_by_kind_rule() {
        let policy = SignaturePolicy::new(PolicySnapshot {
            rules: vec![SignatureRule::new(ActionPattern::Any, SignatureRequirement::Sign)
                .for_kind(MessageKind::RequestError)],
            default_requirement: SignatureRequirement::None,
            keys: hmac_store("k", b"secret"),
        });
        let mut error = Envelope::RequestError(ErrorFrame::new("9", ErrorCode::Filtered, "no"));
        assert!(policy.evaluate(&mut error, "Reset", Direction::Outgoing).is_pass());
        assert_eq!(error.signatures().len(), 1);

        let mut plain = request("Reset", "{}");
        assert!(policy.evaluate(&mut plain, "Reset", Direction::Outgoing).is_pass());
        assert!(plain.signatures().is_empty());
    }

    #[test]
    fn test_rotation_swaps_snapshot() {
        let policy = policy(SignatureRequirement::SignAndVerify, hmac_store("k", b"old"));
        let held = policy.snapshot();

        let mut envelope = request("Reset", "{}");
        assert!(policy.evaluate(&mut envelope, "Reset", Direction::Outgoing).is_pass());

        policy.rotate_keys(hmac_store("k", b"new"));
        assert!(!policy.evaluate(&mut envelope, "Reset", Direction::Incoming).is_pass());

        // A snapshot taken before rotation is unaffected.
        assert!(held.keys.signing_key("k").is_some());
        assert_eq!(held.rules.len(), 1);
    }

    #[test]
    fn test_from_config_rejects_unknown_rule_key() {
        let config: SignaturesConfig = serde_json::from_str(
            r#"{"rules":[{"action":"*","requirement":"Sign","keys":["ghost"]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            SignaturePolicy::from_config(&config),
            Err(PolicyError::UnknownKey(id)) if id == "ghost"
        ));
    }

    #[test]
    fn test_sign_reply_degrades_to_security_error() {
        // Sign required but no keys configured.
        let policy = policy(SignatureRequirement::Sign, KeyStore::new());
        let request = Request::new("Reset", Payload::empty()).with_correlation_id("9");
        let local = shared_types::NodeId::new("relay").unwrap();
        let reply = Envelope::Response(request.reply(&local, Payload::empty()));

        match policy.sign_reply(reply, "Reset") {
            Envelope::RequestError(error) => {
                assert_eq!(error.code, ErrorCode::SecurityError);
                assert_eq!(error.correlation_id.as_str(), "9");
                assert_eq!(error.header.path.hops(), [local].as_slice());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
