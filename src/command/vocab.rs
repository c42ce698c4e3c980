//! Keyword vocabularies used to classify free-text commands
//!
//! Every set is matched against whole lowercase words, never substrings.

/// Words that ask for the timer listing
pub const LIST: &[&str] = &["list", "show", "display", "view", "what", "status", "timers"];

/// Listing verbs; `LIST` minus the bare noun "timers"
pub const LIST_VERBS: &[&str] = &["list", "show", "display", "view", "what", "status"];

/// Nouns naming a regimen
pub const REGIMEN_NOUNS: &[&str] = &["regimen", "routine", "sequence", "workout", "program"];

/// Verbs that launch a regimen
pub const RUN_VERBS: &[&str] = &["run", "start", "execute", "begin"];

/// Verbs that list regimens
pub const LIST_REGIMEN_VERBS: &[&str] = &["list", "show"];

/// Verbs that, with a totality word, clear every timer
pub const DESTRUCTIVE: &[&str] = &["clear", "delete", "remove"];

/// Words meaning "every timer"
pub const TOTALITY: &[&str] = &["all", "everything", "timers"];

pub const CREATE: &[&str] = &["set", "create", "make", "start", "begin", "add", "new", "timer"];
pub const DELETE: &[&str] = &["delete", "remove", "clear", "destroy"];
pub const PAUSE: &[&str] = &["pause", "hold", "wait", "suspend", "freeze"];
pub const RESUME: &[&str] = &["resume", "continue", "unpause", "restart", "unfreeze", "go"];
pub const STOP: &[&str] = &["stop", "end", "cancel", "kill", "terminate", "abort"];

pub const ARTICLES: &[&str] = &["a", "an", "the"];

/// Markers introducing an explicit timer name, in priority order
pub const NAMING_MARKERS: &[&str] = &["called", "named", "for", "label", "titled"];

/// Filler dropped when guessing a timer name from leftover words
pub const NAME_FILLER: &[&str] = &["a", "an", "the", "timer", "for", "called", "named", "set", "and"];

/// Seconds per unit, for every accepted spelling
const UNITS: &[(&str, u64)] = &[
    ("second", 1),
    ("seconds", 1),
    ("sec", 1),
    ("secs", 1),
    ("s", 1),
    ("minute", 60),
    ("minutes", 60),
    ("min", 60),
    ("mins", 60),
    ("m", 60),
    ("hour", 3600),
    ("hours", 3600),
    ("hr", 3600),
    ("hrs", 3600),
    ("h", 3600),
];

/// Seconds per unit for a time-unit word
pub fn unit_multiplier(word: &str) -> Option<u64> {
    UNITS
        .iter()
        .find(|(unit, _)| *unit == word)
        .map(|(_, seconds)| *seconds)
}

pub fn is_unit(word: &str) -> bool {
    unit_multiplier(word).is_some()
}

/// Singular or plural regimen noun
pub fn is_regimen_noun(word: &str) -> bool {
    REGIMEN_NOUNS.contains(&word)
        || word
            .strip_suffix('s')
            .is_some_and(|singular| REGIMEN_NOUNS.contains(&singular))
}

/// Any word that selects a timer command
pub fn is_command_word(word: &str) -> bool {
    [CREATE, PAUSE, RESUME, STOP, LIST]
        .iter()
        .any(|set| set.contains(&word))
}
