//! QPA-style result log
//!
//! The format interleaves `#`-prefixed session markers with one
//! `<TestCaseResult>` XML fragment per executed case:
//!
//! ```text
//! #sessionInfo releaseName vkcts-0.1.0
//! #sessionInfo targetName "default"
//! #beginSession
//! #beginTestCaseResult vkcts.info.instance_version
//! <?xml version="1.0" encoding="UTF-8"?>
//! <TestCaseResult Version="0.3.4" CasePath="vkcts.info.instance_version" CaseType="SelfValidate">
//!  <Text>apiVersion: 1.2.203</Text>
//!  <Result StatusCode="Pass">Pass</Result>
//! </TestCaseResult>
//! #endTestCaseResult
//! #endSession
//! ```
//!
//! Established result-parsing tools consume this layout, so marker names
//! and the result element stay exactly as above.

use crate::status::TestStatus;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const RESULT_VERSION: &str = "0.3.4";

/// Result log over any writer
///
/// The log is flushed after every case so an aborted run still leaves
/// a parseable prefix
pub struct TestLog<W: Write> {
    i_out: W,
}

impl TestLog<BufWriter<File>> {
    /// Create log file at `path`, truncating an existing one
    pub fn create<P: AsRef<Path>>(
        path: P,
        target_name: &str,
    ) -> io::Result<TestLog<BufWriter<File>>> {
        let file = File::create(path)?;

        TestLog::new(BufWriter::new(file), target_name)
    }
}

impl<W: Write> TestLog<W> {
    /// Wrap a writer and emit the session header
    pub fn new(mut out: W, target_name: &str) -> io::Result<TestLog<W>> {
        writeln!(out, "#sessionInfo releaseName {}", crate::RELEASE_NAME)?;
        writeln!(out, "#sessionInfo targetName \"{}\"", target_name)?;
        writeln!(out, "#beginSession")?;

        Ok(TestLog { i_out: out })
    }

    pub fn begin_case(&mut self, path: &str) -> io::Result<()> {
        writeln!(self.i_out, "#beginTestCaseResult {}", path)?;
        writeln!(self.i_out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(
            self.i_out,
            "<TestCaseResult Version=\"{}\" CasePath=\"{}\" CaseType=\"SelfValidate\">",
            RESULT_VERSION, path
        )
    }

    /// `<Text>` element inside the current case
    pub fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.i_out, " <Text>{}</Text>", escape_xml(text))
    }

    pub fn end_case(&mut self, status: &TestStatus) -> io::Result<()> {
        writeln!(
            self.i_out,
            " <Result StatusCode=\"{}\">{}</Result>",
            status.code().as_str(),
            escape_xml(status.description())
        )?;
        writeln!(self.i_out, "</TestCaseResult>")?;
        writeln!(self.i_out, "#endTestCaseResult")?;

        self.i_out.flush()
    }

    pub fn end_session(&mut self) -> io::Result<()> {
        writeln!(self.i_out, "#endSession")?;

        self.i_out.flush()
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }

    out
}
