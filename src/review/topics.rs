//! Topic catalogue and the mapping between URL slugs and canonical keys.
//!
//! The web app addresses topics in kebab-case (`dates-seasons`), the question
//! bank stores them under PascalCase keys (`DatesSeasons`). Compound names
//! whose words cannot be recovered by re-casing live in [`IRREGULAR`].

use crate::error::AppError;

/// Canonical topic keys.
pub const TOPICS: &[&str] = &[
    "Animals",
    "Appearance",
    "Art",
    "Banking",
    "Business",
    "Careers",
    "Clothes",
    "Communication",
    "Crime",
    "Culture",
    "DatesSeasons",
    "Education",
    "Emotions",
    "Environment",
    "Family",
    "FoodDrink",
    "Friendship",
    "Health",
    "History",
    "Hobbies",
    "Holidays",
    "Housing",
    "ITTechnology",
    "Law",
    "Marketing",
    "Media",
    "Money",
    "Music",
    "Nature",
    "Numbers",
    "Politics",
    "Relationships",
    "Science",
    "Shopping",
    "Society",
    "Space",
    "Sports",
    "Transportation",
    "Travel",
    "TVFilm",
    "Weather",
    "WorkOffice",
];

/// Slug to key pairs that plain re-casing gets wrong.
const IRREGULAR: &[(&str, &str)] = &[
    ("dates-seasons", "DatesSeasons"),
    ("food-and-drink", "FoodDrink"),
    ("it-technology", "ITTechnology"),
    ("tv-film", "TVFilm"),
    ("work-and-office", "WorkOffice"),
];

fn is_separator(c: char) -> bool {
    matches!(c, '-' | '_' | ' ')
}

fn capitalize(word: &str, lower_rest: bool) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.collect();
            let rest = if lower_rest { rest.to_lowercase() } else { rest };
            first.to_uppercase().chain(rest.chars()).collect()
        }
        None => String::new(),
    }
}

/// Maps any spelling of a topic to its PascalCase key.
///
/// Known topics come back exactly as listed in [`TOPICS`]; anything else is
/// re-cased word by word. Applying it twice changes nothing.
pub fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(key) = TOPICS.iter().find(|k| **k == trimmed) {
        return (*key).to_string();
    }

    let lower = trimmed.to_lowercase();
    let kebab: String = lower
        .split(is_separator)
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if let Some((_, key)) = IRREGULAR.iter().find(|(slug, _)| *slug == kebab) {
        return (*key).to_string();
    }

    let squashed: String = lower.chars().filter(|c| !is_separator(*c)).collect();
    if let Some(key) = TOPICS.iter().find(|k| k.to_lowercase() == squashed) {
        return (*key).to_string();
    }

    if trimmed.contains(is_separator) {
        trimmed
            .split(is_separator)
            .filter(|w| !w.is_empty())
            .map(|w| capitalize(w, true))
            .collect()
    } else {
        capitalize(trimmed, false)
    }
}

/// Kebab-case slug for a canonical key.
pub fn slug(key: &str) -> String {
    if let Some((slug, _)) = IRREGULAR.iter().find(|(_, k)| *k == key) {
        return (*slug).to_string();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('-');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Resolves user input to a known topic key.
pub fn resolve(input: &str) -> Result<&'static str, AppError> {
    let normalized = normalize(input);
    TOPICS
        .iter()
        .copied()
        .find(|k| *k == normalized)
        .ok_or_else(|| AppError::UnknownTopic {
            topic: input.trim().to_string(),
            valid: TOPICS.to_vec(),
        })
}
