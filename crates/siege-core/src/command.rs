//! Commands accepted by the state store.
//!
//! Both transports (REST and `WebSocket`) translate their input into a
//! [`Command`] and hand it to the single engine entry point. The
//! countdown driver feeds [`Command::Tick`] through the same path.

use siege_types::{AttackRequest, DefendRequest, EpisodeId};

/// Sentinel used for missing or malformed actor identifiers.
pub const ANONYMOUS: &str = "anonymous";

/// Attack label used when none (or a malformed one) is supplied.
pub const DEFAULT_ATTACK_TYPE: &str = "manual";

/// Longest identifier accepted verbatim, in characters.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// A state-changing command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start an attack episode.
    Attack {
        /// Who is attacking.
        attacker_id: String,
        /// Attack label.
        attack_type: String,
    },
    /// End the running episode.
    Defend {
        /// Who is defending.
        defender_id: String,
    },
    /// One countdown step for the given episode. Internal only.
    Tick {
        /// Episode the driver was armed for.
        episode: EpisodeId,
    },
    /// Return to `Secure` from any phase.
    Reset,
}

impl Command {
    /// Build an attack command, defaulting malformed fields.
    pub fn attack(attacker_id: Option<&str>, attack_type: Option<&str>) -> Self {
        Self::Attack {
            attacker_id: sanitize_identifier(attacker_id, ANONYMOUS),
            attack_type: sanitize_identifier(attack_type, DEFAULT_ATTACK_TYPE),
        }
    }

    /// Build a defend command, defaulting a malformed defender id.
    pub fn defend(defender_id: Option<&str>) -> Self {
        Self::Defend {
            defender_id: sanitize_identifier(defender_id, ANONYMOUS),
        }
    }

    /// Short name used in log fields.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Attack { .. } => "attack",
            Self::Defend { .. } => "defend",
            Self::Tick { .. } => "tick",
            Self::Reset => "reset",
        }
    }
}

impl From<&AttackRequest> for Command {
    fn from(req: &AttackRequest) -> Self {
        Self::attack(req.attacker_id.as_deref(), req.attack_type.as_deref())
    }
}

impl From<&DefendRequest> for Command {
    fn from(req: &DefendRequest) -> Self {
        Self::defend(req.defender_id.as_deref())
    }
}

/// Normalize a client-supplied identifier.
///
/// Surrounding whitespace is trimmed. Missing, blank, over-long, or
/// control-character identifiers are replaced by `fallback`.
pub fn sanitize_identifier(raw: Option<&str>, fallback: &str) -> String {
    let Some(trimmed) = raw.map(str::trim) else {
        return fallback.to_owned();
    };
    let malformed = trimmed.is_empty()
        || trimmed.chars().count() > MAX_IDENTIFIER_LEN
        || trimmed.chars().any(char::is_control);
    if malformed {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn missing_identifiers_default() {
        assert_eq!(
            Command::attack(None, None),
            Command::Attack {
                attacker_id: String::from("anonymous"),
                attack_type: String::from("manual"),
            }
        );
        assert_eq!(
            Command::defend(None),
            Command::Defend {
                defender_id: String::from("anonymous"),
            }
        );
    }

    #[test]
    fn identifiers_are_trimmed() {
        assert_eq!(sanitize_identifier(Some("  alice "), ANONYMOUS), "alice");
    }

    #[test]
    fn malformed_identifiers_fall_back() {
        assert_eq!(sanitize_identifier(Some("   "), ANONYMOUS), ANONYMOUS);
        assert_eq!(sanitize_identifier(Some("bad\u{0}id"), ANONYMOUS), ANONYMOUS);
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_eq!(sanitize_identifier(Some(&long), ANONYMOUS), ANONYMOUS);
        let exact = "y".repeat(MAX_IDENTIFIER_LEN);
        assert_eq!(sanitize_identifier(Some(&exact), ANONYMOUS), exact);
    }

    #[test]
    fn requests_convert_to_commands() {
        let req = AttackRequest {
            attacker_id: Some(String::from("bob")),
            attack_type: None,
        };
        assert_eq!(
            Command::from(&req),
            Command::Attack {
                attacker_id: String::from("bob"),
                attack_type: String::from("manual"),
            }
        );
    }
}
