// Text normalization for lexicon matching.
//
// Turns arbitrary user text into a comparison-safe string so that spacing,
// digit substitution, accents and stretched letters don't hide a banned term.
// Pure and allocation-light; safe to call from any number of tasks at once.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Digit and symbol look-alikes mapped to the letter they stand in for.
const HOMOGLYPHS: &[(char, char)] = &[
    ('0', 'o'),
    ('1', 'i'),
    ('3', 'e'),
    ('4', 'a'),
    ('5', 's'),
    ('7', 't'),
    ('8', 'b'),
    ('@', 'a'),
    ('$', 's'),
];

/// Canonicalize `text` for comparison against the lexicon.
///
/// Steps run in a fixed order:
/// 1. lower-case
/// 2. drop whitespace (`"c h u t i y a"` → `"chutiya"`)
/// 3. resolve digit/symbol homoglyphs (`"sh1t"` → `"shit"`)
/// 4. fold accents and compatibility forms (`"fück"` → `"fuck"`)
/// 5. drop everything that isn't a letter
/// 6. collapse repeated letters (`"fuuuck"` → `"fuck"`)
///
/// The result is idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();

    let resolved: String = lowered
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(resolve_homoglyph)
        .collect();

    let folded = fold_diacritics(&resolved);

    // Compatibility decompositions can emit upper-case letters (e.g. U+210C),
    // so letters are lower-cased once more on the way through.
    let letters = folded
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphabetic() && !is_combining_mark(*c));

    collapse_runs(letters)
}

fn resolve_homoglyph(c: char) -> char {
    HOMOGLYPHS
        .iter()
        .find(|(glyph, _)| *glyph == c)
        .map(|(_, letter)| *letter)
        .unwrap_or(c)
}

/// NFKD-decompose and drop combining marks, leaving base letters.
fn fold_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

fn collapse_runs(chars: impl Iterator<Item = char>) -> String {
    let mut out = String::new();
    let mut previous = None;
    for c in chars {
        if previous != Some(c) {
            out.push(c);
            previous = Some(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }

    #[test]
    fn test_spaced_out_letters_are_joined() {
        assert_eq!(normalize("c h u t i y a"), "chutiya");
        assert_eq!(normalize("f u u u c k"), "fuck");
    }

    #[test]
    fn test_homoglyphs_resolve_to_letters() {
        assert_eq!(normalize("sh1t"), "shit");
        assert_eq!(normalize("ba5tard"), "bastard");
        assert_eq!(normalize("@$$"), "as");
        assert_eq!(normalize("8itch"), "bitch");
        assert_eq!(normalize("7h3 4ns3r"), "theanser");
    }

    #[test]
    fn test_diacritics_are_folded() {
        assert_eq!(normalize("fück"), "fuck");
        assert_eq!(normalize("Crème Brûlée"), "cremebrule");
        // Fullwidth forms decompose to ASCII
        assert_eq!(normalize("ＦＵＣＫ"), "fuck");
    }

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(normalize("F.U.C.K"), "fuck");
        assert_eq!(normalize("b-i-t-c-h!!!"), "bitch");
    }

    #[test]
    fn test_runs_collapse() {
        assert_eq!(normalize("fuuuuuck"), "fuck");
        assert_eq!(normalize("chutiyaaa"), "chutiya");
        // Runs formed after stripping also collapse
        assert_eq!(normalize("a.a.a"), "a");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "Hello World",
            "f u u u c k",
            "ch00tiya!!!",
            "Crème Brûlée",
            "ＦＵＬＬ width",
            "ℌello",
            "İstanbul",
            "ǅungla",
            "ﬁne ﬂags",
            "m0therfuck3r",
            "$$$ @@@ 111",
            "日本語のテキスト",
            "Привет мир",
            "aaAAaa  BBbb",
        ];

        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize not idempotent for {:?}", sample);
        }
    }
}
