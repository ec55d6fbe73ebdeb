use std::{cmp::Ordering, fmt::Display};

use serde::Serialize;

use crate::campaign::TestOutcome;

/// Summary block format version.
pub const REPORT_VERSION: u32 = 2;

const RULE: &str = "====================";

/// One conversation run, or one excluded conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRecord {
    pub name: String,
    #[serde(flatten)]
    pub outcome: TestOutcome,
}

/// Everything a campaign observed.
///
/// `Display` renders the summary printed at the end of a run, `Serialize`
/// the machine readable form written by `--report-json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub version: u32,
    pub total: usize,
    pub skip: usize,
    pub pass: usize,
    pub xfail: usize,
    pub fail: usize,
    pub xpass: usize,
    /// in natural order once the report is finished
    pub xpassed: Vec<String>,
    pub failed: Vec<String>,
    /// in the order things ran, skipped conversations last
    pub results: Vec<TestRecord>,
}

impl TestReport {
    pub fn new() -> Self {
        Self {
            version: REPORT_VERSION,
            ..Default::default()
        }
    }

    pub fn record(&mut self, name: &str, outcome: TestOutcome) {
        match &outcome {
            TestOutcome::Pass => self.pass += 1,
            TestOutcome::Fail { .. } => {
                self.fail += 1;
                self.failed.push(name.to_owned());
            }
            TestOutcome::ExpectedFail { .. } => self.xfail += 1,
            TestOutcome::UnexpectedPass => {
                self.xpass += 1;
                self.xpassed.push(name.to_owned());
            }
            TestOutcome::Skip => self.skip += 1,
        }
        if outcome != TestOutcome::Skip {
            self.total += 1;
        }
        self.results.push(TestRecord {
            name: name.to_owned(),
            outcome,
        });
    }

    /// Put the name lists in natural order. Ties keep the order they ran in.
    pub fn finish(&mut self) {
        self.xpassed.sort_by(|a, b| natural_cmp(a, b));
        self.failed.sort_by(|a, b| natural_cmp(a, b));
    }

    /// No unexpected failure and no unexpected pass.
    pub fn is_success(&self) -> bool {
        self.fail == 0 && self.xpass == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for TestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reproducer for CVE-2004-0079. Checking behavior of server with")?;
        writeln!(f, "interleaved ClientHello and ChangeCipherSpec messages.")?;
        writeln!(f, "Test end")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "TOTAL: {}", self.total)?;
        writeln!(f, "SKIP: {}", self.skip)?;
        writeln!(f, "PASS: {}", self.pass)?;
        writeln!(f, "XFAIL: {}", self.xfail)?;
        writeln!(f, "FAIL: {}", self.fail)?;
        writeln!(f, "XPASS: {}", self.xpass)?;
        writeln!(f, "{RULE}")?;
        for (heading, names) in [("XPASSED", &self.xpassed), ("FAILED", &self.failed)] {
            if names.is_empty() {
                continue;
            }
            let names: Vec<String> = names.iter().map(|name| quoted(name)).collect();
            writeln!(f, "{heading}:\n\t{}", names.join("\n\t"))?;
        }
        Ok(())
    }
}

/// Quote a name for the summary: single quotes, unless the name contains a
/// single quote and no double quote.
fn quoted(name: &str) -> String {
    let quote = if name.contains('\'') && !name.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Text(String),
    /// significant digit count, then the digits
    Number(usize, String),
}

/// Text and digit runs, always starting and ending with a (maybe empty) text
/// run so the chunks of two names line up by kind.
fn chunks(name: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut rest = name;
    loop {
        let digits_start = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        chunks.push(Chunk::Text(rest[..digits_start].to_lowercase()));
        rest = &rest[digits_start..];
        if rest.is_empty() {
            return chunks;
        }
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let significant = rest[..digits_end].trim_start_matches('0');
        chunks.push(Chunk::Number(significant.len(), significant.to_owned()));
        rest = &rest[digits_end..];
    }
}

/// Human ordering: case is ignored and digit runs compare by value, so
/// `test 2` sorts before `Test 10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b))
}
