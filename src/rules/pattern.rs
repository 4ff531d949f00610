use crate::error::Error;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

lazy_static! {
    // `/body/flags`, where flags are any of `g`, `i` and `m`.
    static ref EXPLICIT_REGEX: Regex = Regex::new(r"^/(.*?)/([gim]*)$").unwrap();
}

/// A compiled host pattern.
///
/// A pattern written `/body/flags` is compiled from `body` verbatim, with `i` enabling case
/// insensitive matching and `m` multi-line mode. `g` is accepted and has no effect. Any other
/// pattern is a literal host name that must match the whole query name exactly.
#[derive(Debug, Clone)]
pub struct HostPattern {
    regex: Regex,
}

impl HostPattern {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHostPattern`] if an explicit `/body/flags` pattern isn't a valid
    /// regular expression.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let regex = match EXPLICIT_REGEX.captures(pattern) {
            Some(parts) => {
                let flags = &parts[2];
                RegexBuilder::new(&parts[1])
                    .case_insensitive(flags.contains('i'))
                    .multi_line(flags.contains('m'))
                    .build()
            }
            None => Regex::new(&format!("^{}$", regex::escape(pattern))),
        }
        .map_err(|source| Error::InvalidHostPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}
