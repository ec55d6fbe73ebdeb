//! Walks one conversation over one connection.

use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

use crate::{
    conversation::{Command, Conversation, Expectation, NodeId, Step},
    error::ConversationError,
    session::Session,
    transport::{connection, Inbound},
};

#[derive(Debug)]
pub struct Runner<'a> {
    conversation: &'a Conversation,
    timeout: Duration,
}

impl<'a> Runner<'a> {
    /// `timeout` bounds connecting and every blocking read or write.
    pub fn new(conversation: &'a Conversation, timeout: Duration) -> Self {
        Self {
            conversation,
            timeout,
        }
    }

    /// Connect to the conversation's target and run it to the end. The socket
    /// is closed when this returns.
    pub fn run(&self) -> Result<(), ConversationError> {
        let (host, port) = self.conversation.target();
        let stream = connection::connect(host, port, self.timeout)?;
        let mut session = Session::new(stream);
        self.run_on(&mut session)
    }

    /// Run the conversation over an already established session.
    pub fn run_on<S: Read + Write>(
        &self,
        session: &mut Session<S>,
    ) -> Result<(), ConversationError> {
        let graph = self.conversation.graph();
        let mut current = Some(self.conversation.entry());

        while let Some(id) = current {
            let node = graph.node(id);
            tracing::debug!(node = %id, step = %node.step, "processing node");
            let completed = match &node.step {
                Step::Generate(generator) => {
                    generator.generate(session)?;
                    id
                }
                Step::Command(command) => {
                    execute(*command, session)?;
                    id
                }
                Step::Expect(expectation) => {
                    let event = receive(session, expectation)?;
                    self.match_event(id, &event, session)?
                }
            };
            current = graph.node(completed).child;
        }
        tracing::debug!(conversation = self.conversation.name(), "conversation complete");
        Ok(())
    }

    /// Try `event` against the expectation at `id` and then its chain of
    /// alternates. Returns the node that matched; if none did, the error of the
    /// first one.
    fn match_event<S: Read + Write>(
        &self,
        id: NodeId,
        event: &Inbound,
        session: &mut Session<S>,
    ) -> Result<NodeId, ConversationError> {
        let graph = self.conversation.graph();
        let mut first_error = None;
        let mut candidate = Some(id);
        while let Some(current) = candidate {
            let node = graph.node(current);
            if let Step::Expect(expectation) = &node.step {
                match expectation.accept(session, event) {
                    Ok(()) => {
                        if current != id {
                            tracing::debug!(node = %current, "matched alternate {expectation}");
                        }
                        return Ok(current);
                    }
                    Err(e) => {
                        tracing::debug!(node = %current, "no match: {e}");
                        first_error.get_or_insert(e);
                    }
                }
            }
            candidate = node.alternate;
        }
        Err(first_error.unwrap_or_else(|| {
            ConversationError::State(format!("node {id} does not expect anything"))
        }))
    }
}

fn execute<S: Read + Write>(
    command: Command,
    session: &mut Session<S>,
) -> Result<(), ConversationError> {
    let transport = session.transport();
    match command {
        Command::BufferingEnable => transport.enable(),
        Command::BufferingDisable => transport.disable(),
        Command::BufferingFlush => transport.flush()?,
    }
    Ok(())
}

/// A read that runs into the socket timeout is reported against the
/// expectation that was waiting.
fn receive<S: Read + Write>(
    session: &mut Session<S>,
    expectation: &Expectation,
) -> Result<Inbound, ConversationError> {
    match session.receive() {
        Err(ConversationError::Io(e))
            if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
        {
            Err(ConversationError::Timeout {
                expected: expectation.to_string(),
            })
        }
        other => other,
    }
}
