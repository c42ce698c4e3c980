//! Spelled-out English integers ("five", "twenty-five", "one hundred and ten")

const SMALL: &[(&str, u64)] = &[
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

fn small_value(word: &str) -> Option<u64> {
    SMALL.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

/// True for any word that can appear inside a spelled-out number
pub fn is_number_word(word: &str) -> bool {
    word.split('-').all(|part| {
        small_value(part).is_some() || matches!(part, "hundred" | "thousand")
    })
}

/// Parse a spelled-out integer. Hyphens and spaces separate words; a
/// connecting "and" is allowed after the first word.
pub fn parse_number_words(phrase: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut current: u64 = 0;
    let mut seen = false;

    for word in phrase.split(|c: char| c == '-' || c.is_whitespace()) {
        match word {
            "" => continue,
            "and" if seen => continue,
            "hundred" => current = current.max(1).checked_mul(100)?,
            "thousand" => {
                total = total.checked_add(current.max(1).checked_mul(1000)?)?;
                current = 0;
            }
            _ => current = current.checked_add(small_value(word)?)?,
        }
        seen = true;
    }

    if seen {
        total.checked_add(current)
    } else {
        None
    }
}
