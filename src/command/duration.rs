//! Duration extraction from free text
//!
//! An ordered cascade of independent extractors; the first one that finds
//! anything wins. Each extractor is pure and reports the byte spans it
//! consumed so the caller can strip them before looking for a timer name.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::numbers::{is_number_word, parse_number_words};
use super::vocab::{is_unit, unit_multiplier};

/// Seconds found in a text and where they were found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationMatch {
    pub seconds: u64,
    pub spans: Vec<Range<usize>>,
}

impl DurationMatch {
    fn empty() -> Self {
        Self {
            seconds: 0,
            spans: Vec::new(),
        }
    }

    /// Accumulate one match; `None` on overflow so the token is skipped
    fn add(&mut self, amount: u64, multiplier: u64, span: Range<usize>) -> Option<()> {
        let seconds = amount.checked_mul(multiplier)?;
        self.seconds = self.seconds.checked_add(seconds)?;
        self.spans.push(span);
        Some(())
    }

    fn found(self) -> Option<Self> {
        if self.spans.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

type Extractor = fn(&str) -> Option<DurationMatch>;

/// Strategies in priority order
const EXTRACTORS: &[(&str, Extractor)] = &[
    ("attached_units", attached_units),
    ("loose_units", loose_units),
    ("spelled_units", spelled_units),
    ("bare_minutes", bare_minutes),
];

/// Run the cascade over normalized (lowercase) text
pub fn extract_duration(text: &str) -> Option<DurationMatch> {
    EXTRACTORS.iter().find_map(|(strategy, extract)| {
        let found = extract(text)?;
        debug!(strategy, seconds = found.seconds, "duration extracted");
        Some(found)
    })
}

fn number_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*([a-z]+)").expect("valid number-unit regex"))
}

fn bare_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+)\b").expect("valid bare number regex"))
}

fn loose_unit_res() -> &'static [(Regex, u64)] {
    static RES: OnceLock<Vec<(Regex, u64)>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            ("hours?", 3600),
            ("hrs?", 3600),
            ("minutes?", 60),
            ("mins?", 60),
            ("seconds?", 1),
            ("secs?", 1),
        ]
        .into_iter()
        .map(|(unit, multiplier)| {
            let re = Regex::new(&format!(r"(\d+)\s*{}", unit)).expect("valid loose unit regex");
            (re, multiplier)
        })
        .collect()
    })
}

fn word_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]+(?:-[a-z]+)*").expect("valid word token regex"))
}

/// Digits glued to a letter run ("1h30m") are not a standalone number
fn preceded_by_letter(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Digits that belong to a decimal ("1.5") are not whole numbers; fractional
/// durations are not supported, so such numbers are never counted.
fn part_of_decimal(text: &str, digits: &Range<usize>) -> bool {
    let bytes = text.as_bytes();
    let digit_at = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    let after_point = digits.start >= 2
        && bytes[digits.start - 1] == b'.'
        && digit_at(digits.start - 2);
    let before_point = bytes.get(digits.end) == Some(&b'.') && digit_at(digits.end + 1);
    after_point || before_point
}

/// `<digits><optional space><unit>` where the unit is a whole letter run:
/// "1 hour and 30 minutes", "1h30m", "5 min".
fn attached_units(text: &str) -> Option<DurationMatch> {
    let mut found = DurationMatch::empty();

    for caps in number_unit_re().captures_iter(text) {
        let (Some(whole), Some(digits), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if part_of_decimal(text, &digits.range()) {
            continue;
        }
        let chained = found.spans.last().is_some_and(|prev| prev.end == whole.start());
        if preceded_by_letter(text, whole.start()) && !chained {
            continue;
        }
        let Some(multiplier) = unit_multiplier(unit.as_str()) else {
            continue;
        };
        let Ok(amount) = digits.as_str().parse::<u64>() else {
            continue;
        };
        found.add(amount, multiplier, whole.range());
    }

    found.found()
}

/// Unit prefixes anywhere after a number ("5minutesish"). Each number is
/// counted once even when several unit spellings match it.
fn loose_units(text: &str) -> Option<DurationMatch> {
    let mut found = DurationMatch::empty();
    let mut claimed: Vec<usize> = Vec::new();

    for (re, multiplier) in loose_unit_res() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if claimed.contains(&digits.start()) || part_of_decimal(text, &digits.range()) {
                continue;
            }
            let Ok(amount) = digits.as_str().parse::<u64>() else {
                continue;
            };
            if found.add(amount, *multiplier, whole.range()).is_some() {
                claimed.push(digits.start());
            }
        }
    }

    found.found()
}

/// Spelled-out number before a unit word ("five minutes", "twenty five
/// seconds", "an hour").
fn spelled_units(text: &str) -> Option<DurationMatch> {
    let tokens: Vec<Range<usize>> = word_token_re()
        .find_iter(text)
        .map(|m| m.range())
        .collect();
    let adjacent = |left: &Range<usize>, right: &Range<usize>| {
        text[left.end..right.start].trim().is_empty()
    };

    let mut found = DurationMatch::empty();

    for (idx, unit) in tokens.iter().enumerate() {
        let unit_word = &text[unit.clone()];
        // Single letters are too ambiguous without a digit in front.
        if unit_word.len() < 2 || !is_unit(unit_word) {
            continue;
        }
        let Some(multiplier) = unit_multiplier(unit_word) else {
            continue;
        };

        // Walk back over the run of number words directly before the unit.
        let mut first = idx;
        while first > 0 {
            let prev = &tokens[first - 1];
            if !adjacent(prev, &tokens[first]) {
                break;
            }
            let word = &text[prev.clone()];
            let joins_numbers = word == "and" && first < idx;
            if is_number_word(word) || joins_numbers {
                first -= 1;
            } else {
                break;
            }
        }
        // A connecting "and" cannot start the number.
        while first < idx && &text[tokens[first].clone()] == "and" {
            first += 1;
        }

        if first == idx {
            // "a second" is as often an ordinal as a duration.
            if idx > 0 && multiplier >= 60 && adjacent(&tokens[idx - 1], unit) {
                let article = &tokens[idx - 1];
                if matches!(&text[article.clone()], "a" | "an") {
                    found.add(1, multiplier, article.start..unit.end);
                }
            }
            continue;
        }

        let phrase = &text[tokens[first].start..tokens[idx - 1].end];
        if let Some(amount) = parse_number_words(phrase) {
            found.add(amount, multiplier, tokens[first].start..unit.end);
        }
    }

    found.found()
}

/// A lone integer means minutes.
fn bare_minutes(text: &str) -> Option<DurationMatch> {
    let digits = bare_number_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find(|digits| !part_of_decimal(text, &digits.range()))?;
    let amount = digits.as_str().parse::<u64>().ok()?;

    let mut found = DurationMatch::empty();
    found.add(amount, 60, digits.range())?;
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(text: &str) -> Option<u64> {
        extract_duration(text).map(|found| found.seconds)
    }

    #[test]
    fn test_mixed_units() {
        assert_eq!(seconds("1 hour and 30 minutes"), Some(5400));
        assert_eq!(seconds("1h30m"), Some(5400));
        assert_eq!(seconds("2 hrs 5 secs"), Some(7205));
    }

    #[test]
    fn test_short_units() {
        assert_eq!(seconds("5 min"), Some(300));
        assert_eq!(seconds("45s"), Some(45));
        assert_eq!(seconds("set a timer for 10 minutes"), Some(600));
    }

    #[test]
    fn test_loose_attachment() {
        let found = loose_units("5minutesish").unwrap();
        assert_eq!(found.seconds, 300);
        assert_eq!(found.spans.len(), 1);
        assert_eq!(seconds("5minutesish"), Some(300));
    }

    #[test]
    fn test_spelled_numbers() {
        assert_eq!(seconds("ninety seconds"), Some(90));
        assert_eq!(seconds("five minutes"), Some(300));
        assert_eq!(seconds("twenty-five minutes"), Some(1500));
        assert_eq!(seconds("one hour and ten minutes"), Some(4200));
        assert_eq!(seconds("an hour"), Some(3600));
    }

    #[test]
    fn test_bare_number_is_minutes() {
        assert_eq!(seconds("25"), Some(1500));
        assert_eq!(seconds("tea 3"), Some(180));
    }

    #[test]
    fn test_no_duration() {
        assert_eq!(seconds("make some tea"), None);
        assert_eq!(seconds(""), None);
    }

    #[test]
    fn test_decimal_numbers_are_not_durations() {
        assert_eq!(seconds("1.5 hours"), None);
        assert_eq!(seconds("2.5"), None);
        assert_eq!(seconds("0.5 min"), None);
        assert_eq!(seconds("1.5 hours and 10 minutes"), Some(600));
    }

    #[test]
    fn test_article_counts_only_for_long_units() {
        assert_eq!(seconds("a minute"), Some(60));
        assert_eq!(seconds("a second timer"), None);
        assert_eq!(seconds("an hour and a second"), Some(3600));
    }

    #[test]
    fn test_glued_digits_are_not_attached() {
        assert_eq!(attached_units("mp3s"), None);
    }

    #[test]
    fn test_overflowing_numbers_are_skipped() {
        assert_eq!(seconds("99999999999999999999 minutes 5 seconds"), Some(5));
    }

    #[test]
    fn test_spans_cover_duration_text() {
        let text = "set a 5 minute timer for tea";
        let found = extract_duration(text).unwrap();
        assert_eq!(found.spans.len(), 1);
        assert_eq!(&text[found.spans[0].clone()], "5 minute");
    }
}
