//! The turn coordinator: decides whether a user action proceeds now or
//! must first collect an entity selection.
//!
//! Single-entity conversations proceed immediately.  Multi-entity
//! conversations detour: a new conversation needs ≥2 participants picked,
//! an existing one needs exactly one responder per turn.  After each
//! completed turn the responder choice is offered again (continuation
//! mode), so several entities can reply to one user message.

use pl_domain::chat::{Conversation, ConversationKind};
use pl_domain::error::{Error, Result};

/// Minimum participants for a multi-entity conversation.
pub const MIN_PARTICIPANTS: usize = 2;

/// What must happen before a send/create/regenerate can proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnDecision {
    /// Proceed now, targeting `responder` (the sole owner in single-entity
    /// conversations).
    Proceed { responder: Option<String> },

    /// Suspend: a new multi-entity conversation needs ≥2 participants.
    SelectParticipants,

    /// Suspend: one responder must be picked from the participants.
    SelectResponder { participants: Vec<String> },
}

/// Per-conversation turn-taking state.
///
/// Holds the participant snapshot taken at conversation creation; entity
/// catalog changes after that never affect an existing conversation.
#[derive(Debug, Clone)]
pub struct TurnCoordinator {
    kind: ConversationKind,
    participants: Vec<String>,
}

impl TurnCoordinator {
    pub fn new(kind: ConversationKind, participants: Vec<String>) -> Self {
        Self { kind, participants }
    }

    pub fn for_conversation(conversation: &Conversation) -> Self {
        Self::new(conversation.kind, conversation.participants.clone())
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    /// Decide whether an action can proceed with the given responder.
    ///
    /// `skip_selection` marks a resumed action whose selection detour has
    /// already run; reaching a suspend branch with it set is a programming
    /// error, reported rather than looping back into a second detour.
    pub fn decide(&self, chosen: Option<&str>, skip_selection: bool) -> Result<TurnDecision> {
        match self.kind {
            ConversationKind::Normal => Ok(TurnDecision::Proceed {
                responder: self.participants.first().cloned(),
            }),

            ConversationKind::MultiEntity => {
                if self.participants.is_empty() {
                    if skip_selection {
                        return Err(Error::Validation(
                            "selection already ran but no participants were applied".into(),
                        ));
                    }
                    return Ok(TurnDecision::SelectParticipants);
                }

                match chosen {
                    Some(id) if self.participants.iter().any(|p| p == id) => {
                        Ok(TurnDecision::Proceed {
                            responder: Some(id.to_string()),
                        })
                    }
                    Some(id) => Err(Error::Validation(format!(
                        "entity {id} is not a participant of this conversation"
                    ))),
                    None if skip_selection => Err(Error::Validation(
                        "selection already ran but no responder was supplied".into(),
                    )),
                    None => Ok(TurnDecision::SelectResponder {
                        participants: self.participants.clone(),
                    }),
                }
            }
        }
    }

    /// After a completed turn: the participants to re-offer as responder
    /// candidates, or `None` in single-entity conversations.
    ///
    /// Continuation mode lets entity B answer the same user message right
    /// after entity A's reply was stored.
    pub fn continuation(&self) -> Option<Vec<String>> {
        match self.kind {
            ConversationKind::MultiEntity if !self.participants.is_empty() => {
                Some(self.participants.clone())
            }
            _ => None,
        }
    }

    /// Whether a multi-select confirmation may be enabled.
    pub fn multi_select_valid(selected: usize) -> bool {
        selected >= MIN_PARTICIPANTS
    }

    /// Validate a participant selection for a new multi-entity
    /// conversation, before any request is issued.
    pub fn validate_participants(selected: &[String]) -> Result<()> {
        if !Self::multi_select_valid(selected.len()) {
            return Err(Error::Validation(format!(
                "a multi-entity conversation needs at least {MIN_PARTICIPANTS} entities"
            )));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn multi(participants: &[&str]) -> TurnCoordinator {
        TurnCoordinator::new(
            ConversationKind::MultiEntity,
            participants.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn single_entity_proceeds_with_sole_owner() {
        let coord = TurnCoordinator::new(ConversationKind::Normal, vec!["ent-a".into()]);
        let decision = coord.decide(None, false).unwrap();
        assert_eq!(
            decision,
            TurnDecision::Proceed {
                responder: Some("ent-a".into())
            }
        );
    }

    #[test]
    fn new_multi_entity_conversation_demands_participants() {
        let coord = multi(&[]);
        assert_eq!(
            coord.decide(None, false).unwrap(),
            TurnDecision::SelectParticipants
        );
    }

    #[test]
    fn existing_multi_entity_conversation_demands_responder() {
        let coord = multi(&["ent-a", "ent-b"]);
        match coord.decide(None, false).unwrap() {
            TurnDecision::SelectResponder { participants } => {
                assert_eq!(participants, vec!["ent-a", "ent-b"]);
            }
            other => panic!("wrong decision: {other:?}"),
        }
    }

    #[test]
    fn chosen_responder_proceeds() {
        let coord = multi(&["ent-a", "ent-b"]);
        assert_eq!(
            coord.decide(Some("ent-b"), true).unwrap(),
            TurnDecision::Proceed {
                responder: Some("ent-b".into())
            }
        );
    }

    #[test]
    fn non_participant_responder_is_rejected() {
        let coord = multi(&["ent-a", "ent-b"]);
        assert!(matches!(
            coord.decide(Some("ent-z"), true),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn skip_selection_without_responder_is_an_error() {
        let coord = multi(&["ent-a", "ent-b"]);
        assert!(coord.decide(None, true).is_err());
    }

    #[test]
    fn multi_select_threshold() {
        assert!(!TurnCoordinator::multi_select_valid(0));
        assert!(!TurnCoordinator::multi_select_valid(1));
        assert!(TurnCoordinator::multi_select_valid(2));
        assert!(TurnCoordinator::multi_select_valid(5));
    }

    #[test]
    fn validate_participants_rejects_fewer_than_two() {
        assert!(TurnCoordinator::validate_participants(&["a".into()]).is_err());
        assert!(TurnCoordinator::validate_participants(&["a".into(), "b".into()]).is_ok());
    }

    #[test]
    fn continuation_reoffers_participants_in_multi_mode() {
        let coord = multi(&["ent-a", "ent-b"]);
        assert_eq!(
            coord.continuation(),
            Some(vec!["ent-a".to_string(), "ent-b".to_string()])
        );
    }

    #[test]
    fn no_continuation_in_single_entity_mode() {
        let coord = TurnCoordinator::new(ConversationKind::Normal, vec!["ent-a".into()]);
        assert!(coord.continuation().is_none());
    }
}
