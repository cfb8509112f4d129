//! Workflow graph: the nodes of the per-stage loop and the edges between them.
//!
//! ```text
//! initialization -> stage_processor -> decorator -> await_response -> decoder -> response_check
//!                        ^                                                          |
//!                        |                   continue / question_handler / human_escalation
//!                        |                                                          v
//!                        +------------------- continue ------------------------ advance_stage -> END
//! ```

use serde::{Deserialize, Serialize};

/// A step in the orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Initialization,
    StageProcessor,
    Decorator,
    AwaitResponse,
    Decoder,
    ResponseCheck,
    QuestionHandler,
    HumanEscalation,
    AdvanceStage,
}

impl Node {
    pub const ALL: [Node; 9] = [
        Node::Initialization,
        Node::StageProcessor,
        Node::Decorator,
        Node::AwaitResponse,
        Node::Decoder,
        Node::ResponseCheck,
        Node::QuestionHandler,
        Node::HumanEscalation,
        Node::AdvanceStage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Initialization => "initialization",
            Node::StageProcessor => "stage_processor",
            Node::Decorator => "decorator",
            Node::AwaitResponse => "await_response",
            Node::Decoder => "decoder",
            Node::ResponseCheck => "response_check",
            Node::QuestionHandler => "question_handler",
            Node::HumanEscalation => "human_escalation",
            Node::AdvanceStage => "advance_stage",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Node::Initialization => "Set up state and influencer profile",
            Node::StageProcessor => "Produce the current stage's message",
            Node::Decorator => "Polish the outgoing message",
            Node::AwaitResponse => "Send and wait for the reply",
            Node::Decoder => "Classify the reply",
            Node::ResponseCheck => "Decide the route",
            Node::QuestionHandler => "Answer the influencer's question",
            Node::HumanEscalation => "Hand off to a human operator",
            Node::AdvanceStage => "Move to the next stage",
        }
    }

    /// Every node this node may hand control to.
    pub fn successors(&self) -> &'static [Target] {
        match self {
            Node::Initialization => &[Target::Node(Node::StageProcessor)],
            Node::StageProcessor => &[
                Target::Node(Node::Decorator),
                Target::Node(Node::AdvanceStage),
            ],
            Node::Decorator => &[Target::Node(Node::AwaitResponse)],
            Node::AwaitResponse => &[Target::Node(Node::Decoder)],
            Node::Decoder => &[Target::Node(Node::ResponseCheck)],
            Node::ResponseCheck => &[
                Target::Node(Node::AdvanceStage),
                Target::Node(Node::QuestionHandler),
                Target::Node(Node::HumanEscalation),
            ],
            Node::QuestionHandler => &[Target::Node(Node::AdvanceStage)],
            Node::HumanEscalation => &[Target::Node(Node::AdvanceStage)],
            Node::AdvanceStage => &[Target::Node(Node::StageProcessor), Target::End],
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Edge target in the static graph description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(Node),
    End,
}

/// What the executor does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "node")]
pub enum Transition {
    Next(Node),
    End,
}

/// Label carried by a conditional edge, if any.
fn edge_label(from: Node, to: Target) -> Option<&'static str> {
    match (from, to) {
        (Node::StageProcessor, Target::Node(Node::AdvanceStage)) => Some("no handler"),
        (Node::ResponseCheck, Target::Node(Node::AdvanceStage)) => Some("continue"),
        (Node::ResponseCheck, Target::Node(Node::QuestionHandler)) => Some("question"),
        (Node::ResponseCheck, Target::Node(Node::HumanEscalation)) => Some("escalation"),
        (Node::AdvanceStage, Target::Node(Node::StageProcessor)) => Some("more stages"),
        (Node::AdvanceStage, Target::End) => Some("all complete"),
        _ => None,
    }
}

/// Render the graph as a Mermaid flowchart.
pub fn render_mermaid() -> String {
    let mut out = String::from("flowchart TD\n");
    out.push_str("    START([START]) --> initialization\n");
    for node in Node::ALL {
        for target in node.successors() {
            let to = match target {
                Target::Node(n) => n.as_str(),
                Target::End => "END([END])",
            };
            match edge_label(node, *target) {
                Some(label) => out.push_str(&format!("    {} -->|{}| {}\n", node, label, to)),
                None => out.push_str(&format!("    {} --> {}\n", node, to)),
            }
        }
    }
    out
}

/// Render the graph as a plain adjacency listing.
pub fn render_ascii() -> String {
    let mut out = String::new();
    for node in Node::ALL {
        out.push_str(&format!("{:<18} {}\n", node.as_str(), node.description()));
        for target in node.successors() {
            let to = match target {
                Target::Node(n) => n.as_str(),
                Target::End => "END",
            };
            match edge_label(node, *target) {
                Some(label) => out.push_str(&format!("    └─[{}]─▶ {}\n", label, to)),
                None => out.push_str(&format!("    └─▶ {}\n", to)),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_advance_stage_reaches_end() {
        for node in Node::ALL {
            let ends = node.successors().contains(&Target::End);
            assert_eq!(ends, node == Node::AdvanceStage, "{}", node);
        }
    }

    #[test]
    fn test_every_node_is_reachable() {
        for node in Node::ALL.iter().filter(|n| **n != Node::Initialization) {
            let reachable = Node::ALL
                .iter()
                .any(|from| from.successors().contains(&Target::Node(*node)));
            assert!(reachable, "{} is unreachable", node);
        }
    }

    #[test]
    fn test_mermaid_contains_conditional_edges() {
        let mermaid = render_mermaid();
        assert!(mermaid.starts_with("flowchart TD"));
        assert!(mermaid.contains("response_check -->|question| question_handler"));
        assert!(mermaid.contains("advance_stage -->|all complete| END([END])"));
    }

    #[test]
    fn test_transition_serde() {
        let json = serde_json::to_string(&Transition::Next(Node::Decoder)).unwrap();
        assert_eq!(json, r#"{"kind":"next","node":"decoder"}"#);
        let end: Transition = serde_json::from_str(r#"{"kind":"end"}"#).unwrap();
        assert_eq!(end, Transition::End);
    }
}
