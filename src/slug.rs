//! Filename slugs: lowercase ASCII words joined by `-`.

use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\- ]+").expect("valid slug pattern"));

/// Slug used when nothing survives the filtering.
pub const FALLBACK_SLUG: &str = "document";

/// Builds a slug from free text.
///
/// Lowercases, folds common Latin diacritics to ASCII, drops anything that is
/// not a letter, digit, space or hyphen, collapses whitespace and joins the
/// words with hyphens. Applying it to its own output returns the same string.
pub fn create(input: &str) -> String {
    let folded: String = input.to_lowercase().chars().map(fold_diacritic).collect();
    let cleaned = NON_SLUG_CHARS.replace_all(&folded, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Output filename for a source file: slug of the stem plus the original
/// extension, lowercased.
pub fn output_filename(filename: &str) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let mut slug = create(stem);
    if slug.is_empty() {
        slug = FALLBACK_SLUG.to_string();
    }
    match ext {
        Some(ext) => format!("{slug}.{}", ext.to_lowercase()),
        None => slug,
    }
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => 'i',
        'ł' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' | 'ş' => 's',
        'ť' | 'ţ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}
