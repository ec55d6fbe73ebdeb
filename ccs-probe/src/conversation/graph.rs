//! Conversations as a small arena of steps.
//!
//! Nodes refer to each other through `NodeId` handles. Each node has at most
//! one child, the next mandatory step, and `Expect` nodes may carry an
//! alternate: another `Expect` that is tried against the same message when the
//! node itself does not match.

use std::fmt::Display;

use crate::{
    conversation::{Expectation, Generator},
    error::ConfigError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transport directives that neither produce nor consume records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BufferingEnable,
    BufferingDisable,
    BufferingFlush,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Generate(Generator),
    Expect(Expectation),
    Command(Command),
}

impl From<Generator> for Step {
    fn from(value: Generator) -> Self {
        Step::Generate(value)
    }
}

impl From<Expectation> for Step {
    fn from(value: Expectation) -> Self {
        Step::Expect(value)
    }
}

impl From<Command> for Step {
    fn from(value: Command) -> Self {
        Step::Command(value)
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Generate(generator) => write!(f, "send {generator}"),
            Step::Expect(expectation) => write!(f, "expect {expectation}"),
            Step::Command(command) => write!(f, "{command:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub step: Step,
    pub child: Option<NodeId>,
    pub alternate: Option<NodeId>,
}

/// Arena of nodes. Handles are only meaningful for the graph that issued them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Into<Step>) -> NodeId {
        self.nodes.push(Node {
            step: step.into(),
            child: None,
            alternate: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Panics if `id` was not issued by this graph, which `validate` rules out.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn set_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.child = Some(child);
        }
    }

    pub fn set_alternate(&mut self, node: NodeId, alternate: NodeId) {
        if let Some(node) = self.nodes.get_mut(node.0) {
            node.alternate = Some(alternate);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that the graph can be walked from `entry`:
    /// - every handle is in range
    /// - alternates hang only off `Expect` nodes and are `Expect` nodes
    /// - no path through child or alternate links comes back to a node on it,
    ///   so every walk reaches a node without a child
    pub fn validate(&self, entry: NodeId) -> Result<(), ConfigError> {
        self.check_handle(entry, "entry")?;
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index);
            if let Some(child) = node.child {
                self.check_handle(child, "child")?;
            }
            if let Some(alternate) = node.alternate {
                self.check_handle(alternate, "alternate")?;
                if !matches!(node.step, Step::Expect(_)) {
                    return Err(ConfigError::InvalidGraph(format!(
                        "node {id} has an alternate but does not expect anything"
                    )));
                }
                if !matches!(self.node(alternate).step, Step::Expect(_)) {
                    return Err(ConfigError::InvalidGraph(format!(
                        "alternate {alternate} of node {id} does not expect anything"
                    )));
                }
            }
        }

        // iterative depth first search, `on_path` doubles as the visit state
        #[derive(Clone, Copy, PartialEq)]
        enum Visit {
            New,
            OnPath,
            Done,
        }
        let mut state = vec![Visit::New; self.nodes.len()];
        let mut stack = vec![(entry, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                state[id.0] = Visit::Done;
                continue;
            }
            match state[id.0] {
                Visit::Done => continue,
                Visit::OnPath => {
                    return Err(ConfigError::InvalidGraph(format!("cycle through node {id}")))
                }
                Visit::New => {}
            }
            state[id.0] = Visit::OnPath;
            stack.push((id, true));
            let node = self.node(id);
            for next in [node.child, node.alternate].into_iter().flatten() {
                if state[next.0] == Visit::OnPath {
                    return Err(ConfigError::InvalidGraph(format!(
                        "cycle through node {next}"
                    )));
                }
                stack.push((next, false));
            }
        }
        Ok(())
    }

    fn check_handle(&self, id: NodeId, role: &str) -> Result<(), ConfigError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(ConfigError::InvalidGraph(format!(
                "{role} {id} is out of range for a graph of {} nodes",
                self.nodes.len()
            )))
        }
    }
}

/// One named scenario, from connecting to the last expected event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    name: String,
    host: String,
    port: u16,
    graph: Graph,
    entry: NodeId,
}

impl Conversation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Steps along the primary path, in order.
    pub fn primary_path(&self) -> impl Iterator<Item = &Step> {
        std::iter::successors(Some(self.entry), |id| self.graph.node(*id).child)
            .map(|id| &self.graph.node(id).step)
    }
}

/// Builds a conversation as a chain, the way it reads on paper.
///
/// ```ignore
/// ConversationBuilder::new("sanity", "localhost", 4433)
///     .then(Generator::ClientHello(hello))
///     .then(Expectation::ServerHello)
///     // ...
///     .then(Expectation::alert(None, None))
///     .or(Expectation::Close)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct ConversationBuilder {
    name: String,
    host: String,
    port: u16,
    graph: Graph,
    entry: Option<NodeId>,
    tail: Option<NodeId>,
}

impl ConversationBuilder {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            graph: Graph::new(),
            entry: None,
            tail: None,
        }
    }

    /// Append a step after the last one.
    pub fn then(mut self, step: impl Into<Step>) -> Self {
        let id = self.graph.push(step);
        match self.tail {
            Some(tail) => self.graph.set_child(tail, id),
            None => self.entry = Some(id),
        }
        self.tail = Some(id);
        self
    }

    /// Give the last step an alternate, or extend its chain of alternates.
    pub fn or(mut self, alternate: Expectation) -> Self {
        let id = self.graph.push(alternate);
        if let Some(tail) = self.tail {
            let mut last = tail;
            while let Some(next) = self.graph.node(last).alternate {
                last = next;
            }
            self.graph.set_alternate(last, id);
        }
        self
    }

    pub fn build(self) -> Result<Conversation, ConfigError> {
        let entry = self
            .entry
            .ok_or_else(|| ConfigError::InvalidGraph(format!("{} has no steps", self.name)))?;
        self.graph.validate(entry)?;
        Ok(Conversation {
            name: self.name,
            host: self.host,
            port: self.port,
            graph: self.graph,
            entry,
        })
    }
}
