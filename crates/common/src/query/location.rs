//! Location normalization
//!
//! Pure string rules, no geocoding: keep the leading city words of a
//! location, dropping anything after the first comma and any trailing
//! state name, state abbreviation, ZIP code or country.

const STATE_ABBREVIATIONS: &[&str] = &[
    "al", "ak", "az", "ar", "ca", "co", "ct", "de", "fl", "ga", "hi", "id", "il", "in", "ia",
    "ks", "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv", "nh", "nj",
    "nm", "ny", "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn", "tx", "ut", "vt",
    "va", "wa", "wv", "wi", "wy", "dc",
];

const STATE_NAMES: &[&str] = &[
    "alabama", "alaska", "arizona", "arkansas", "california", "colorado", "connecticut",
    "delaware", "florida", "georgia", "hawaii", "idaho", "illinois", "indiana", "iowa",
    "kansas", "kentucky", "louisiana", "maine", "maryland", "massachusetts", "michigan",
    "minnesota", "mississippi", "missouri", "montana", "nebraska", "nevada", "new hampshire",
    "new jersey", "new mexico", "new york", "north carolina", "north dakota", "ohio",
    "oklahoma", "oregon", "pennsylvania", "rhode island", "south carolina", "south dakota",
    "tennessee", "texas", "utah", "vermont", "virginia", "washington", "west virginia",
    "wisconsin", "wyoming", "district of columbia",
];

const COUNTRY_NAMES: &[&str] = &["us", "usa", "united states", "united states of america"];

/// Longest multi-word suffix we try to match ("district of columbia")
const MAX_SUFFIX_WORDS: usize = 4;

/// Leading city words of a location. Never strips down to nothing, so
/// "New York" and "Washington" survive as cities.
pub fn city_only(location: &str) -> String {
    let head = location.split(',').next().unwrap_or_default();
    let mut words: Vec<&str> = head.split_whitespace().collect();

    while words.len() > 1 {
        let last = words[words.len() - 1];
        if is_zip_code(last) {
            words.pop();
            continue;
        }

        let strip = (1..=MAX_SUFFIX_WORDS.min(words.len() - 1))
            .rev()
            .find(|&n| is_region_suffix(&words[words.len() - n..]));
        match strip {
            Some(n) => words.truncate(words.len() - n),
            None => break,
        }
    }

    words.join(" ")
}

/// Capitalize each word (and each hyphenated part), lowercase the rest
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `search_location` metadata value: title-cased city, or empty
pub fn search_location(location: Option<&str>) -> String {
    location
        .map(city_only)
        .filter(|city| !city.is_empty())
        .map(|city| title_case(&city))
        .unwrap_or_default()
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn is_zip_code(word: &str) -> bool {
    let digits = word.split('-').next().unwrap_or_default();
    digits.len() == 5 && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_region_suffix(words: &[&str]) -> bool {
    let phrase = words
        .iter()
        .map(|w| w.trim_matches('.').replace('.', "").to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    STATE_NAMES.contains(&phrase.as_str())
        || COUNTRY_NAMES.contains(&phrase.as_str())
        || (words.len() == 1 && STATE_ABBREVIATIONS.contains(&phrase.as_str()))
}
