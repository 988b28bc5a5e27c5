//! LaTeX text codec
//!
//! [`decode_latex`] turns BibTeX field text (accent commands, escaped
//! specials, grouping braces, dashes) into plain Unicode. [`escape_latex`] is
//! the inverse used when writing: special characters are backslash-escaped
//! and accented letters become accent commands such as `{\'e}`.

use unicode_normalization::UnicodeNormalization;

/// Accent command to Unicode combining mark
const ACCENTS: [(&str, char); 15] = [
    ("\"", '\u{0308}'),
    ("'", '\u{0301}'),
    ("`", '\u{0300}'),
    ("^", '\u{0302}'),
    ("~", '\u{0303}'),
    ("=", '\u{0304}'),
    (".", '\u{0307}'),
    ("c", '\u{0327}'),
    ("v", '\u{030C}'),
    ("u", '\u{0306}'),
    ("H", '\u{030B}'),
    ("k", '\u{0328}'),
    ("r", '\u{030A}'),
    ("d", '\u{0323}'),
    ("b", '\u{0331}'),
];

/// Control words that stand for a single character
const SYMBOLS: [(&str, &str); 52] = [
    ("ss", "ß"),
    ("ae", "æ"),
    ("AE", "Æ"),
    ("oe", "œ"),
    ("OE", "Œ"),
    ("aa", "å"),
    ("AA", "Å"),
    ("o", "ø"),
    ("O", "Ø"),
    ("l", "ł"),
    ("L", "Ł"),
    ("i", "ı"),
    ("j", "ȷ"),
    ("textendash", "–"),
    ("textemdash", "—"),
    ("textasciitilde", "~"),
    ("textbackslash", "\\"),
    ("textasciicircum", "^"),
    ("textquoteleft", "\u{2018}"),
    ("textquoteright", "\u{2019}"),
    ("textquotedblleft", "\u{201C}"),
    ("textquotedblright", "\u{201D}"),
    ("copyright", "©"),
    ("textregistered", "®"),
    ("texttrademark", "™"),
    ("pounds", "£"),
    ("euro", "€"),
    ("S", "§"),
    ("P", "¶"),
    ("dag", "†"),
    ("ddag", "‡"),
    ("textbullet", "•"),
    ("ldots", "…"),
    ("dots", "…"),
    ("textellipsis", "…"),
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ε"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("pi", "π"),
    ("sigma", "σ"),
    ("tau", "τ"),
    ("phi", "φ"),
    ("omega", "ω"),
    ("Delta", "Δ"),
    ("Omega", "Ω"),
    ("times", "×"),
    ("pm", "±"),
    ("infty", "∞"),
];

/// Characters escaped with a plain backslash
const ESCAPED: [char; 7] = ['&', '%', '$', '#', '_', '{', '}'];

/// Decode LaTeX markup into plain Unicode text.
///
/// Grouping braces and math shifts are dropped; formatting commands such as
/// `\emph{x}` keep their argument.
pub fn decode_latex(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => i = decode_command(&chars, i + 1, &mut out),
            '{' | '}' | '$' => i += 1,
            '~' => {
                out.push('\u{00A0}');
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                if chars.get(i + 2) == Some(&'-') {
                    out.push('—');
                    i += 3;
                } else {
                    out.push('–');
                    i += 2;
                }
            }
            '`' if chars.get(i + 1) == Some(&'`') => {
                out.push('\u{201C}');
                i += 2;
            }
            '\'' if chars.get(i + 1) == Some(&'\'') => {
                out.push('\u{201D}');
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out.nfc().collect()
}

/// Decode the command starting at `start` (just past the backslash) and
/// return the index after it.
fn decode_command(chars: &[char], start: usize, out: &mut String) -> usize {
    let Some(&first) = chars.get(start) else {
        return start;
    };

    if ESCAPED.contains(&first) {
        out.push(first);
        return start + 1;
    }
    if first == '\\' || first.is_whitespace() {
        out.push(' ');
        return start + 1;
    }

    if !first.is_ascii_alphabetic() {
        let name = first.to_string();
        if let Some(mark) = accent_mark(&name) {
            return decode_accent(chars, start + 1, mark, out);
        }
        // Unknown control symbol: keep the character
        out.push(first);
        return start + 1;
    }

    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_alphabetic() {
        end += 1;
    }
    let name: String = chars[start..end].iter().collect();

    if let Some(mark) = accent_mark(&name) {
        if name.len() == 1 {
            let next = skip_spaces(chars, end);
            return decode_accent(chars, next, mark, out);
        }
    }

    if let Some(symbol) = symbol_for(&name) {
        out.push_str(symbol);
    }
    // Control words swallow the spaces that follow them
    skip_spaces(chars, end)
}

/// Apply `mark` to the next character or braced group
fn decode_accent(chars: &[char], start: usize, mark: char, out: &mut String) -> usize {
    let (base, next) = match chars.get(start) {
        Some('{') => {
            let close = matching_brace(chars, start).unwrap_or(chars.len());
            let inner: String = chars[start + 1..close.min(chars.len())].iter().collect();
            (decode_latex(&inner), close + 1)
        }
        Some('\\') => {
            // \'\i and friends
            let mut base = String::new();
            let next = decode_command(chars, start + 1, &mut base);
            (base, next)
        }
        Some(&c) => (c.to_string(), start + 1),
        None => (String::new(), start),
    };

    let mut base_chars = base.chars();
    match base_chars.next() {
        Some(c) => {
            out.push(undotted(c));
            out.push(mark);
            out.extend(base_chars);
        }
        None => out.push(mark),
    }
    next.min(chars.len())
}

/// Dotless i/j take accents in LaTeX; the composed character uses i/j
fn undotted(c: char) -> char {
    match c {
        'ı' => 'i',
        'ȷ' => 'j',
        c => c,
    }
}

fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (offset, c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }
    i
}

fn accent_mark(command: &str) -> Option<char> {
    ACCENTS
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, mark)| *mark)
}

fn symbol_for(command: &str) -> Option<&'static str> {
    SYMBOLS
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, symbol)| *symbol)
}

fn command_for_mark(mark: char) -> Option<&'static str> {
    ACCENTS
        .iter()
        .find(|(_, m)| *m == mark)
        .map(|(name, _)| *name)
}

/// Escape plain text for a braced BibTeX value.
///
/// Returns the escaped text and whether any character had to be left as raw
/// Unicode because it has no LaTeX spelling here.
pub fn escape_latex(input: &str) -> (String, bool) {
    let mut out = String::with_capacity(input.len());
    let mut unencodable = false;

    for c in input.chars() {
        match c {
            c if ESCAPED.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\u{00A0}' => out.push('~'),
            '–' => out.push_str("--"),
            '—' => out.push_str("---"),
            c if c.is_ascii() => out.push(c),
            c => {
                if let Some(encoded) = encode_accented(c) {
                    out.push_str(&encoded);
                } else if let Some((name, _)) = SYMBOLS
                    .iter()
                    .find(|(name, symbol)| name.len() <= 2 && symbol.chars().eq(std::iter::once(c)))
                {
                    out.push_str(&format!("{{\\{}}}", name));
                } else {
                    unencodable = true;
                    out.push(c);
                }
            }
        }
    }

    (out, unencodable)
}

/// `é` -> `{\'e}`, `ç` -> `{\c{c}}`, `ǘ` -> `{\'{\"u}}`
fn encode_accented(c: char) -> Option<String> {
    let mut decomposed = std::iter::once(c).nfd();
    let base = decomposed.next()?;
    let marks: Vec<char> = decomposed.collect();
    if !base.is_ascii_alphabetic() || marks.is_empty() {
        return None;
    }

    let mut text = match base {
        'i' => "\\i".to_string(),
        'j' => "\\j".to_string(),
        b => b.to_string(),
    };
    for (n, mark) in marks.iter().enumerate() {
        let command = command_for_mark(*mark)?;
        let letter_command = command.chars().all(|ch| ch.is_ascii_alphabetic());
        text = if n == 0 && !letter_command && base != 'i' && base != 'j' {
            format!("\\{}{}", command, text)
        } else {
            format!("\\{}{{{}}}", command, text)
        };
    }
    Some(format!("{{{}}}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umlaut_decoding() {
        assert_eq!(decode_latex(r#"M\"uller"#), "Müller");
        assert_eq!(decode_latex(r#"M{\"u}ller"#), "Müller");
        assert_eq!(decode_latex(r#"M\"{u}ller"#), "Müller");
    }

    #[test]
    fn test_letter_accents() {
        assert_eq!(decode_latex(r"gar\c con"), "garçon");
        assert_eq!(decode_latex(r"\v{S}koda"), "Škoda");
        assert_eq!(decode_latex(r"Garc\'{\i}a"), "García");
        assert_eq!(decode_latex(r"Garc\'\i a"), "García");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(decode_latex(r"10\% off"), "10% off");
        assert_eq!(decode_latex(r"Smith \& Jones"), "Smith & Jones");
        assert_eq!(decode_latex(r"snake\_case"), "snake_case");
    }

    #[test]
    fn test_symbols_and_math() {
        assert_eq!(decode_latex(r"Stra{\ss}e"), "Straße");
        assert_eq!(decode_latex(r"$\alpha$ particles"), "α particles");
        assert_eq!(decode_latex(r"\ldots and more"), "…and more");
    }

    #[test]
    fn test_formatting_commands_keep_content() {
        assert_eq!(decode_latex(r"\textbf{bold} and \emph{italic}"), "bold and italic");
        assert_eq!(decode_latex("{DNA} Repair"), "DNA Repair");
    }

    #[test]
    fn test_dashes_and_quotes() {
        assert_eq!(decode_latex("1990--1995"), "1990–1995");
        assert_eq!(decode_latex("yes---no"), "yes—no");
        assert_eq!(decode_latex("``quoted''"), "\u{201C}quoted\u{201D}");
        assert_eq!(decode_latex("O'Brien"), "O'Brien");
    }

    #[test]
    fn test_escape_specials() {
        assert_eq!(escape_latex("A & B").0, r"A \& B");
        assert_eq!(escape_latex("10% of $5 #1 a_b").0, r"10\% of \$5 \#1 a\_b");
    }

    #[test]
    fn test_escape_diacritics() {
        assert_eq!(escape_latex("Müller").0, r#"M{\"u}ller"#);
        assert_eq!(escape_latex("café").0, r"caf{\'e}");
        assert_eq!(escape_latex("García").0, r"Garc{\'{\i}}a");
        assert_eq!(escape_latex("garçon").0, r"gar{\c{c}}on");
        assert_eq!(escape_latex("Straße").0, r"Stra{\ss}e");
    }

    #[test]
    fn test_escape_reports_unencodable() {
        let (text, lossy) = escape_latex("日本");
        assert_eq!(text, "日本");
        assert!(lossy);
        assert!(!escape_latex("plain").1);
    }

    #[test]
    fn test_escape_then_decode() {
        for text in ["Müller & Søn", "García 50% _x_", "Škoda {braces}", "a~b"] {
            let (escaped, _) = escape_latex(text);
            assert_eq!(decode_latex(&escaped), text);
        }
    }
}
