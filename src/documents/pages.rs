// src/documents/pages.rs
use std::fmt;
use std::ops::RangeInclusive;

use crate::utils::error::ConfigError;

/// Page selection in the usual `all` / `8-16` / `1,3,5-7` notation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageRange {
    #[default]
    All,
    Spans(Vec<RangeInclusive<u32>>),
}

impl PageRange {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        let mut spans = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            let invalid = || ConfigError::PageRange(raw.to_string());
            let span = match part.split_once('-') {
                Some((start, end)) => {
                    let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                    let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                    if start == 0 || end < start {
                        return Err(invalid());
                    }
                    start..=end
                }
                None => {
                    let page: u32 = part.parse().map_err(|_| invalid())?;
                    if page == 0 {
                        return Err(invalid());
                    }
                    page..=page
                }
            };
            spans.push(span);
        }
        Ok(PageRange::Spans(spans))
    }

    /// Pages are 1-based.
    pub fn contains(&self, page: u32) -> bool {
        match self {
            PageRange::All => true,
            PageRange::Spans(spans) => spans.iter().any(|s| s.contains(&page)),
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::All => write!(f, "all"),
            PageRange::Spans(spans) => {
                let parts: Vec<String> = spans
                    .iter()
                    .map(|s| {
                        if s.start() == s.end() {
                            s.start().to_string()
                        } else {
                            format!("{}-{}", s.start(), s.end())
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}
