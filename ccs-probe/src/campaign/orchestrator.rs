use std::{
    collections::BTreeSet,
    fmt::Display,
    io::{self, Write},
    time::Duration,
};

use rand::{seq::SliceRandom, Rng};
use serde::Serialize;

use crate::{
    campaign::TestReport,
    config::{CampaignConfig, ExpectedFailure},
    conversation::{scenarios::SANITY, Conversation},
    error::{ConfigError, ConversationError},
    runner::Runner,
};

/// How a single conversation run is judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome")]
pub enum TestOutcome {
    #[serde(rename = "pass")]
    Pass,
    /// `missing_message` is set when the conversation was expected to fail
    /// with a message that wasn't in `error`
    #[serde(rename = "fail")]
    Fail {
        error: String,
        missing_message: Option<String>,
    },
    #[serde(rename = "xfail")]
    ExpectedFail { error: String },
    #[serde(rename = "xpass")]
    UnexpectedPass,
    #[serde(rename = "skip")]
    Skip,
}

impl Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TestOutcome::Pass => "pass",
            TestOutcome::Fail { .. } => "fail",
            TestOutcome::ExpectedFail { .. } => "xfail",
            TestOutcome::UnexpectedPass => "xpass",
            TestOutcome::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Judge a run against what was expected of it.
pub fn classify(
    expected: Option<&ExpectedFailure>,
    result: &Result<(), ConversationError>,
) -> TestOutcome {
    match (expected, result) {
        (None, Ok(())) => TestOutcome::Pass,
        (None, Err(e)) => TestOutcome::Fail {
            error: e.to_string(),
            missing_message: None,
        },
        (Some(_), Ok(())) => TestOutcome::UnexpectedPass,
        (Some(expected), Err(e)) => {
            let error = e.to_string();
            match expected {
                ExpectedFailure::Containing(message) if !expected.matches(&error) => {
                    TestOutcome::Fail {
                        error,
                        missing_message: Some(message.clone()),
                    }
                }
                _ => TestOutcome::ExpectedFail { error },
            }
        }
    }
}

/// A set of conversations and the rules for running them.
#[derive(Debug)]
pub struct Campaign {
    conversations: Vec<Conversation>,
    config: CampaignConfig,
    timeout: Duration,
}

impl Campaign {
    /// Conversation names must be unique and one of them must be `sanity`.
    pub fn new(
        conversations: Vec<Conversation>,
        config: CampaignConfig,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let mut names = BTreeSet::new();
        for conversation in &conversations {
            if !names.insert(conversation.name()) {
                return Err(ConfigError::DuplicateConversation(
                    conversation.name().to_owned(),
                ));
            }
        }
        if !names.contains(SANITY) {
            return Err(ConfigError::MissingConversation(SANITY));
        }
        Ok(Self {
            conversations,
            config,
            timeout,
        })
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    fn sanity(&self) -> &Conversation {
        // `new` checked that it exists
        self.conversations
            .iter()
            .find(|c| c.name() == SANITY)
            .unwrap_or(&self.conversations[0])
    }

    /// Excluded names that are real conversations, in natural order.
    pub fn skipped(&self) -> Vec<&str> {
        let mut skipped: Vec<&str> = self
            .conversations
            .iter()
            .map(|c| c.name())
            .filter(|name| self.config.exclude.contains(*name))
            .collect();
        skipped.sort_by(|a, b| crate::campaign::natural_cmp(a, b));
        skipped
    }

    /// The run order: sanity, a sample of the other eligible conversations,
    /// sanity again.
    ///
    /// With a run-only set, exactly those conversations are eligible and the
    /// limit is capped at the size of the set. Otherwise everything that is
    /// not excluded is eligible. Sanity is never part of the sample.
    pub fn schedule<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<&Conversation> {
        let eligible: Vec<&Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.name() != SANITY)
            .filter(|c| match &self.config.run_only {
                Some(run_only) => run_only.contains(c.name()),
                None => !self.config.exclude.contains(c.name()),
            })
            .collect();

        let mut limit = self.config.limit.unwrap_or(self.conversations.len());
        if let Some(run_only) = &self.config.run_only {
            limit = limit.min(run_only.len());
        }
        let count = limit.min(eligible.len());

        let sanity = self.sanity();
        let mut scheduled = Vec::with_capacity(count + 2);
        scheduled.push(sanity);
        scheduled.extend(eligible.choose_multiple(rng, count).copied());
        scheduled.push(sanity);
        tracing::debug!(
            eligible = eligible.len(),
            sampled = count,
            "scheduled conversations"
        );
        scheduled
    }

    /// Run the schedule against the real server, writing a line by line
    /// transcript to `out`.
    pub fn run<R: Rng + ?Sized, W: Write>(
        &self,
        rng: &mut R,
        out: &mut W,
    ) -> io::Result<TestReport> {
        let timeout = self.timeout;
        self.run_with(rng, out, |conversation| {
            Runner::new(conversation, timeout).run()
        })
    }

    /// Like `run`, with `execute` standing in for the runner.
    pub fn run_with<R, W, F>(&self, rng: &mut R, out: &mut W, mut execute: F) -> io::Result<TestReport>
    where
        R: Rng + ?Sized,
        W: Write,
        F: FnMut(&Conversation) -> Result<(), ConversationError>,
    {
        let mut report = TestReport::new();
        for conversation in self.schedule(rng) {
            let name = conversation.name();
            let span = tracing::info_span!("conversation", name);
            let _guard = span.enter();

            writeln!(out, "{name} ...")?;
            tracing::info!("starting");
            let result = execute(conversation);
            if let Err(e) = &result {
                writeln!(out, "Error while processing")?;
                writeln!(out, "{e}\n")?;
            }

            let outcome = classify(self.config.expected_failures.get(name), &result);
            match &outcome {
                TestOutcome::Pass => writeln!(out, "OK\n")?,
                TestOutcome::UnexpectedPass => {
                    writeln!(out, "XPASS-expected failure but test passed\n")?
                }
                TestOutcome::ExpectedFail { .. } => writeln!(out, "OK-expected failure\n")?,
                TestOutcome::Fail {
                    missing_message: Some(message),
                    ..
                } => writeln!(out, "Expected error message: {message}\n")?,
                TestOutcome::Fail { .. } | TestOutcome::Skip => {}
            }
            tracing::info!(%outcome, "finished");
            report.record(name, outcome);
        }
        for name in self.skipped() {
            report.record(name, TestOutcome::Skip);
        }
        report.finish();
        Ok(report)
    }
}
