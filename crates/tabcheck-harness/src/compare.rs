//! Byte comparison of expected and observed output.

use serde::{Deserialize, Serialize};

/// First line at which two outputs disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    /// 1-based line number.
    pub line: usize,
    /// `None` when the expected output has no such line.
    pub expected: Option<String>,
    /// `None` when the observed output has no such line.
    pub observed: Option<String>,
}

impl std::fmt::Display for LineDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "line {}:", self.line)?;
        writeln!(f, "< {}", self.expected.as_deref().unwrap_or("<missing>"))?;
        write!(f, "> {}", self.observed.as_deref().unwrap_or("<missing>"))
    }
}

/// `None` if the outputs are byte-identical, otherwise the first
/// differing line. A missing final newline counts as a difference.
#[must_use]
pub fn first_difference(expected: &[u8], observed: &[u8]) -> Option<LineDiff> {
    if expected == observed {
        return None;
    }
    let mut exp = expected.split(|b| *b == b'\n');
    let mut obs = observed.split(|b| *b == b'\n');
    let mut line = 1;
    loop {
        match (exp.next(), obs.next()) {
            (Some(e), Some(o)) if e == o => line += 1,
            (e, o) => {
                return Some(LineDiff {
                    line,
                    expected: e.map(|e| String::from_utf8_lossy(e).into_owned()),
                    observed: o.map(|o| String::from_utf8_lossy(o).into_owned()),
                });
            }
        }
    }
}
