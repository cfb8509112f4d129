//! Routing policy applied after a reply is classified.

use serde::{Deserialize, Serialize};

use crate::classifier::{DecodedReply, Intent, Sentiment};
use crate::graph::Node;

/// Outcome of the response check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Continue,
    Question,
    Escalation,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::Continue => "continue",
            RouteDecision::Question => "question",
            RouteDecision::Escalation => "escalation",
        }
    }

    /// Node the conditional edge leads to.
    pub fn target(&self) -> Node {
        match self {
            RouteDecision::Continue => Node::AdvanceStage,
            RouteDecision::Question => Node::QuestionHandler,
            RouteDecision::Escalation => Node::HumanEscalation,
        }
    }
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decide where a classified reply goes. First matching rule wins.
///
/// Unrecognized or unclear intents fall through to `Continue`.
pub fn route(intent: Intent, has_question: bool, sentiment: Sentiment) -> RouteDecision {
    if intent == Intent::Accept && !has_question {
        RouteDecision::Continue
    } else if intent == Intent::Question || has_question {
        RouteDecision::Question
    } else if matches!(intent, Intent::Decline | Intent::Negotiate) || sentiment == Sentiment::Negative {
        RouteDecision::Escalation
    } else {
        RouteDecision::Continue
    }
}

/// Route a decoded reply; a missing decode is treated as an accept.
pub fn route_decoded(decoded: Option<&DecodedReply>) -> (Intent, RouteDecision) {
    match decoded {
        Some(d) => (d.intent, route(d.intent, d.has_question, d.sentiment)),
        None => (Intent::Accept, RouteDecision::Continue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTENTS: [Intent; 5] = [
        Intent::Accept,
        Intent::Decline,
        Intent::Question,
        Intent::Negotiate,
        Intent::Unclear,
    ];
    const SENTIMENTS: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

    #[test]
    fn test_accept_without_question_continues() {
        for s in SENTIMENTS {
            assert_eq!(route(Intent::Accept, false, s), RouteDecision::Continue);
        }
    }

    #[test]
    fn test_any_question_routes_to_question() {
        for s in SENTIMENTS {
            assert_eq!(route(Intent::Accept, true, s), RouteDecision::Question);
            assert_eq!(route(Intent::Question, false, s), RouteDecision::Question);
            assert_eq!(route(Intent::Question, true, s), RouteDecision::Question);
        }
    }

    #[test]
    fn test_decline_and_negotiate_escalate() {
        for s in SENTIMENTS {
            assert_eq!(route(Intent::Decline, false, s), RouteDecision::Escalation);
            assert_eq!(route(Intent::Negotiate, false, s), RouteDecision::Escalation);
        }
    }

    #[test]
    fn test_negative_sentiment_escalates() {
        assert_eq!(route(Intent::Unclear, false, Sentiment::Negative), RouteDecision::Escalation);
    }

    #[test]
    fn test_fallback_continues() {
        assert_eq!(route(Intent::Unclear, false, Sentiment::Neutral), RouteDecision::Continue);
        assert_eq!(route(Intent::Unclear, false, Sentiment::Positive), RouteDecision::Continue);
    }

    #[test]
    fn test_policy_is_total() {
        for intent in INTENTS {
            for has_question in [false, true] {
                for s in SENTIMENTS {
                    let decision = route(intent, has_question, s);
                    let expected_question = intent == Intent::Question || has_question;
                    if expected_question && !(intent == Intent::Accept && !has_question) {
                        assert_eq!(decision, RouteDecision::Question);
                    }
                }
            }
        }
    }

    #[test]
    fn test_targets() {
        assert_eq!(RouteDecision::Continue.target(), Node::AdvanceStage);
        assert_eq!(RouteDecision::Question.target(), Node::QuestionHandler);
        assert_eq!(RouteDecision::Escalation.target(), Node::HumanEscalation);
    }

    #[test]
    fn test_missing_decode_continues() {
        assert_eq!(route_decoded(None), (Intent::Accept, RouteDecision::Continue));
    }
}
