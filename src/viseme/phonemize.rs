//! Heuristic grapheme-to-phoneme conversion.
//!
//! Used when no forced alignment is available. There is no dictionary: a
//! greedy scan maps spelling patterns to coarse phoneme classes, which is
//! all the mouth sprites can distinguish anyway. Output is deterministic.

/// Two-letter spellings checked before single letters, in priority order.
const DIGRAPHS: &[(&str, &str)] = &[
    ("th", "TH"),
    ("sh", "SH"),
    ("ch", "CH"),
    ("ph", "F"),
    ("wh", "W"),
    ("ck", "T"),
    ("ng", "N"),
    ("oo", "UW"),
    ("ee", "IY"),
    ("ea", "IY"),
    ("ai", "AY"),
    ("ay", "AY"),
    ("ou", "OW"),
    ("ow", "OW"),
    ("oa", "OW"),
];

/// Class for an alphanumeric character with no dedicated letter entry.
const OTHER_ALNUM: &str = "AH";

/// A phoneme class together with the number of letters that spelled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhonemeUnit {
    pub label: &'static str,
    pub chars: usize,
}

fn letter_class(c: char) -> &'static str {
    match c {
        'a' => "AA",
        'e' => "EH",
        'i' | 'y' => "IY",
        'o' => "OW",
        'u' => "UH",
        'p' | 'b' | 'm' => "M",
        'f' | 'v' => "FV",
        'l' => "L",
        's' | 'z' => "S",
        't' | 'd' | 'n' | 'r' | 'k' | 'g' | 'c' | 'q' | 'x' => "T",
        'h' => "HH",
        'w' => "W",
        'j' => "CH",
        _ => OTHER_ALNUM,
    }
}

fn digraph_class(first: char, second: char) -> Option<&'static str> {
    DIGRAPHS.iter().find_map(|(spelling, label)| {
        let mut it = spelling.chars();
        (it.next() == Some(first) && it.next() == Some(second)).then_some(*label)
    })
}

/// Scan `text` into phoneme units, collapsing consecutive identical classes.
///
/// Non-alphanumeric characters are skipped without breaking a run, so
/// `"a, a"` yields a single `AA`.
pub(crate) fn phonemize_units(text: &str) -> Vec<PhonemeUnit> {
    let chars: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
    let mut units: Vec<PhonemeUnit> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !c.is_alphanumeric() {
            i += 1;
            continue;
        }

        let (label, width) = match chars.get(i + 1).and_then(|&next| digraph_class(c, next)) {
            Some(label) => (label, 2),
            None => (letter_class(c), 1),
        };
        i += width;

        match units.last_mut() {
            Some(last) if last.label == label => last.chars += width,
            _ => units.push(PhonemeUnit {
                label,
                chars: width,
            }),
        }
    }

    units
}

/// Convert text to an ordered sequence of phoneme class labels.
///
/// The text is passed through [`clean_text`] first. Adjacent duplicates are
/// collapsed, so the result lists transitions only.
pub fn phonemize(text: &str) -> Vec<String> {
    phonemize_units(&clean_text(text))
        .into_iter()
        .map(|unit| unit.label.to_owned())
        .collect()
}

/// Prepare reply text for phonemization.
///
/// 1. Bracketed tags such as `[happy]` or `[feeling:warmth]` are removed
/// 2. Smart quotes and dashes become ASCII
/// 3. Control characters become spaces
pub fn clean_text(text: &str) -> String {
    let without_tags = strip_tags(text);
    without_tags
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

/// Remove short `[word]` / `[key:value]` tags. Brackets holding anything
/// else are kept as text.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if is_tag_body(&after[..close]) => {
                out.push(' ');
                rest = &after[close + 1..];
            }
            _ => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_tag_body(body: &str) -> bool {
    !body.is_empty()
        && body.len() <= 32
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'))
}
