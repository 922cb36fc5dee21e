//! Script-name detection over `nmap --script-help` output.
//!
//! The help listing prints each script as its name on one line followed by a
//! `Categories:` line, so a name is the line seen just before that marker.

pub const CATEGORIES_MARKER: &str = "Categories:";
pub const MAX_SCRIPT_NAMES: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookback {
    Start,
    Previous(String),
}

/// Single-pass classifier holding only the previous line.
#[derive(Debug, Clone)]
pub struct ScriptClassifier {
    lookback: Lookback,
    names: Vec<String>,
    cap: usize,
}

impl Default for ScriptClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptClassifier {
    pub fn new() -> Self {
        Self::with_cap(MAX_SCRIPT_NAMES)
    }

    pub fn with_cap(cap: usize) -> Self {
        ScriptClassifier { lookback: Lookback::Start, names: Vec::new(), cap }
    }

    /// Feed the next line. Returns true when the previous line was collected as a name.
    pub fn observe(&mut self, line: &str) -> bool {
        let previous = std::mem::replace(&mut self.lookback, Lookback::Previous(line.to_string()));
        match previous {
            Lookback::Previous(prev)
                if !prev.is_empty() && line.starts_with(CATEGORIES_MARKER) && self.names.len() < self.cap =>
            {
                self.names.push(prev);
                true
            }
            _ => false,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_full(&self) -> bool {
        self.names.len() >= self.cap
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}
