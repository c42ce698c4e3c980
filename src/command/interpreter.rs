//! Free-text command interpreter
//!
//! Classification runs in a fixed precedence because the keyword sets
//! overlap: listing, regimens, clear-all, delete, pause/resume/stop, and
//! finally timer creation when a duration can be found.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::duration::extract_duration;
use super::vocab::{
    is_command_word, is_regimen_noun, is_unit, ARTICLES, DELETE, DESTRUCTIVE, LIST,
    LIST_REGIMEN_VERBS, LIST_VERBS, NAME_FILLER, NAMING_MARKERS, PAUSE, RESUME, RUN_VERBS, STOP,
    TOTALITY,
};
use super::Command;

/// Name used when a command names no timer
pub const DEFAULT_TIMER_NAME: &str = "timer";

/// Regimen launched when none is named
pub const DEFAULT_REGIMEN_NAME: &str = "workout";

/// Interpret a free-text command. `None` means the text was not understood.
pub fn interpret(text: &str) -> Option<Command> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let command = classify(&normalized, &words);
    debug!(text = %normalized, ?command, "interpreted command");
    command
}

fn classify(normalized: &str, words: &[&str]) -> Option<Command> {
    let regimen = classify_regimen(words);

    if wants_listing(words) {
        return Some(regimen.unwrap_or(Command::List));
    }

    if regimen.is_some() {
        return regimen;
    }

    if contains_any(words, DESTRUCTIVE) && contains_any(words, TOTALITY) {
        return Some(Command::ClearAll);
    }

    if let Some(pos) = first_position(words, DELETE) {
        return Some(Command::Delete {
            name: name_after(words, pos),
        });
    }

    if let Some(pos) = first_position(words, PAUSE) {
        return Some(Command::Pause {
            name: name_after(words, pos),
        });
    }

    if let Some(pos) = first_position(words, RESUME) {
        return Some(Command::Resume {
            name: name_after(words, pos),
        });
    }

    if let Some(pos) = first_position(words, STOP) {
        return Some(Command::Stop {
            name: name_after(words, pos),
        });
    }

    let duration = extract_duration(normalized)?;
    if duration.seconds == 0 {
        return None;
    }

    Some(Command::Create {
        name: extract_timer_name(normalized, &duration.spans),
        duration_seconds: duration.seconds,
    })
}

/// Lowercase, drop punctuation (keeping decimal points, hyphens and
/// apostrophes), collapse whitespace.
fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let digit_at = |idx: Option<usize>| {
        idx.and_then(|i| chars.get(i))
            .is_some_and(|c| c.is_ascii_digit())
    };

    let cleaned: String = chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let decimal_point = c == '.' && digit_at(i.checked_sub(1)) && digit_at(Some(i + 1));
            if c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '\'' || decimal_point {
                c
            } else {
                ' '
            }
        })
        .collect();

    collapse_whitespace(&cleaned)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The part of a word that keywords are compared against ("what's" -> "what")
fn keyword(word: &str) -> &str {
    word.split('\'').next().unwrap_or(word)
}

fn contains_any(words: &[&str], set: &[&str]) -> bool {
    first_position(words, set).is_some()
}

fn first_position(words: &[&str], set: &[&str]) -> Option<usize> {
    words.iter().position(|word| set.contains(&keyword(word)))
}

/// Listing keywords; the bare noun "timers" belongs to clear-all when a
/// destructive verb is present.
fn wants_listing(words: &[&str]) -> bool {
    if contains_any(words, DESTRUCTIVE) {
        contains_any(words, LIST_VERBS)
    } else {
        contains_any(words, LIST)
    }
}

fn strip_article<'a, 'b>(words: &'b [&'a str]) -> &'b [&'a str] {
    match words.first() {
        Some(first) if ARTICLES.contains(first) => &words[1..],
        _ => words,
    }
}

/// Timer name following the indicator at `pos`
fn name_after(words: &[&str], pos: usize) -> String {
    let rest = strip_article(&words[pos + 1..]);
    let name: Vec<&str> = rest.iter().copied().filter(|word| *word != "timer").collect();

    if name.is_empty() {
        DEFAULT_TIMER_NAME.to_string()
    } else {
        name.join(" ")
    }
}

fn classify_regimen(words: &[&str]) -> Option<Command> {
    if !words.iter().any(|word| is_regimen_noun(keyword(word))) {
        return None;
    }

    if let Some(pos) = first_position(words, RUN_VERBS) {
        return Some(Command::RunRegimen {
            name: regimen_name(words, pos),
        });
    }

    if contains_any(words, LIST_REGIMEN_VERBS) {
        return Some(Command::ListRegimens);
    }

    None
}

/// Regimen name: whatever follows the run verb, else whatever surrounds a
/// regimen noun, else the default.
fn regimen_name(words: &[&str], verb_pos: usize) -> String {
    let after_verb: Vec<&str> = strip_article(&words[verb_pos + 1..])
        .iter()
        .copied()
        .filter(|word| !is_regimen_noun(keyword(word)))
        .collect();
    if !after_verb.is_empty() {
        return after_verb.join(" ");
    }

    for (idx, word) in words.iter().enumerate() {
        if !is_regimen_noun(keyword(word)) {
            continue;
        }

        let after_noun: Vec<&str> = strip_article(&words[idx + 1..])
            .iter()
            .copied()
            .filter(|w| !RUN_VERBS.contains(w) && !is_regimen_noun(keyword(w)))
            .collect();
        if !after_noun.is_empty() {
            return after_noun.join(" ");
        }

        if let Some(before) = idx.checked_sub(1).map(|i| words[i]) {
            if !RUN_VERBS.contains(&before) && !ARTICLES.contains(&before) {
                return before.to_string();
            }
        }
    }

    DEFAULT_REGIMEN_NAME.to_string()
}

fn naming_marker_res() -> &'static [(&'static str, Regex)] {
    static RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        NAMING_MARKERS
            .iter()
            .map(|marker| {
                let pattern = format!(r"\b{}\s+(.+?)(?:\s+(?:timer|for|and)\b|$)", marker);
                let re = Regex::new(&pattern).expect("valid naming marker regex");
                (*marker, re)
            })
            .collect()
    })
}

/// Timer name for a create command, with the duration text removed
fn extract_timer_name(text: &str, duration_spans: &[Range<usize>]) -> String {
    let remaining = remove_spans(text, duration_spans);

    for (marker, re) in naming_marker_res() {
        let Some(captured) = re.captures(&remaining).and_then(|caps| caps.get(1)) else {
            continue;
        };
        let name = clean_marked_name(captured.as_str());
        if !name.is_empty() {
            debug!(marker, name = %name, "timer name from marker");
            return name;
        }
    }

    let leftovers: Vec<&str> = remaining
        .split_whitespace()
        .filter(|word| {
            let key = keyword(word);
            !is_unit(key) && !is_command_word(key) && !NAME_FILLER.contains(&key)
        })
        .collect();

    if leftovers.is_empty() {
        DEFAULT_TIMER_NAME.to_string()
    } else {
        leftovers.join(" ")
    }
}

fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut sorted = spans.to_vec();
    sorted.sort_by_key(|span| span.start);

    let mut remaining = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in sorted {
        if span.start < cursor {
            continue;
        }
        remaining.push_str(&text[cursor..span.start]);
        remaining.push(' ');
        cursor = span.end;
    }
    remaining.push_str(&text[cursor..]);

    collapse_whitespace(&remaining)
}

fn clean_marked_name(captured: &str) -> String {
    let words: Vec<&str> = captured.split_whitespace().collect();
    strip_article(&words)
        .iter()
        .copied()
        .filter(|word| !matches!(*word, "timer" | "for" | "and"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, duration_seconds: u64) -> Option<Command> {
        Some(Command::Create {
            name: name.to_string(),
            duration_seconds,
        })
    }

    #[test]
    fn test_create_with_called_marker() {
        assert_eq!(
            interpret("set a timer for 10 minutes called workout"),
            create("workout", 600)
        );
    }

    #[test]
    fn test_create_with_for_marker() {
        assert_eq!(
            interpret("Set a 5 minute timer for coffee break"),
            create("coffee break", 300)
        );
    }

    #[test]
    fn test_create_name_from_leftover_words() {
        assert_eq!(
            interpret("start a 25 min pomodoro timer"),
            create("pomodoro", 1500)
        );
        assert_eq!(
            interpret("create 1 hour meeting timer"),
            create("meeting", 3600)
        );
    }

    #[test]
    fn test_create_defaults() {
        assert_eq!(interpret("25"), create("timer", 1500));
        assert_eq!(interpret("1h30m"), create("timer", 5400));
        assert_eq!(
            interpret("set a timer for 1 hour and 30 minutes"),
            create("timer", 5400)
        );
        assert_eq!(interpret("ninety seconds"), create("timer", 90));
    }

    #[test]
    fn test_zero_duration_is_not_understood() {
        assert_eq!(interpret("set a timer for 0 minutes"), None);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(interpret("make me a sandwich"), None);
        assert_eq!(interpret("   "), None);
        assert_eq!(interpret("?!"), None);
    }

    #[test]
    fn test_list_wins_over_create() {
        assert_eq!(interpret("show timer for 5 minutes"), Some(Command::List));
        assert_eq!(interpret("What's running?"), Some(Command::List));
        assert_eq!(interpret("timers"), Some(Command::List));
    }

    #[test]
    fn test_regimen_commands() {
        assert_eq!(
            interpret("start pomodoro routine"),
            Some(Command::RunRegimen {
                name: "pomodoro".to_string()
            })
        );
        assert_eq!(
            interpret("run workout regimen"),
            Some(Command::RunRegimen {
                name: "workout".to_string()
            })
        );
        assert_eq!(
            interpret("run the regimen"),
            Some(Command::RunRegimen {
                name: "workout".to_string()
            })
        );
        assert_eq!(
            interpret("begin the sequence stretch"),
            Some(Command::RunRegimen {
                name: "stretch".to_string()
            })
        );
        assert_eq!(interpret("show regimens"), Some(Command::ListRegimens));
        assert_eq!(interpret("list all regimens"), Some(Command::ListRegimens));
    }

    #[test]
    fn test_clear_all() {
        assert_eq!(interpret("clear all timers"), Some(Command::ClearAll));
        assert_eq!(interpret("delete everything"), Some(Command::ClearAll));
        assert_eq!(interpret("remove all"), Some(Command::ClearAll));
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            interpret("delete the tea timer"),
            Some(Command::Delete {
                name: "tea".to_string()
            })
        );
        assert_eq!(
            interpret("destroy"),
            Some(Command::Delete {
                name: "timer".to_string()
            })
        );
    }

    #[test]
    fn test_pause_resume_stop() {
        assert_eq!(
            interpret("pause the coffee timer"),
            Some(Command::Pause {
                name: "coffee".to_string()
            })
        );
        assert_eq!(
            interpret("resume coffee"),
            Some(Command::Resume {
                name: "coffee".to_string()
            })
        );
        assert_eq!(
            interpret("stop meeting timer"),
            Some(Command::Stop {
                name: "meeting".to_string()
            })
        );
        assert_eq!(
            interpret("cancel"),
            Some(Command::Stop {
                name: "timer".to_string()
            })
        );
    }

    #[test]
    fn test_stop_is_not_pause() {
        assert_eq!(
            interpret("stop tea"),
            Some(Command::Stop {
                name: "tea".to_string()
            })
        );
    }

    #[test]
    fn test_fractional_duration_is_not_understood() {
        assert_eq!(interpret("1.5 hours"), None);
        assert_eq!(interpret("set a timer for 2.5 minutes"), None);
    }

    #[test]
    fn test_ordinal_second_is_not_a_duration() {
        assert_eq!(interpret("set a second timer for tea"), None);
        assert_eq!(interpret("set a second timer for 5 minutes"), create("timer", 300));
    }

    #[test]
    fn test_pause_precedes_stop() {
        assert_eq!(
            interpret("hold then stop the oven"),
            Some(Command::Pause {
                name: "then stop the oven".to_string()
            })
        );
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "good" contains "go" but is not the resume keyword
        assert_eq!(interpret("good tea 4 minutes"), create("good tea", 240));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Pause   THE Tea!  "), "pause the tea");
        assert_eq!(normalize("1.5 hours, please"), "1.5 hours please");
    }
}
