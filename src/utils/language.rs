//! Deterministic ISO-639-1 language detection used by P1 (spec §4.1,
//! "`question_language`, `database_language`: resolved, never null;
//! default English"). A full statistical language identifier is out of
//! scope for this crate's Non-goals (no learned models at request time);
//! this is a cheap Unicode-script heuristic sufficient to pick a code the
//! validator/translator templates can act on, falling back to English
//! whenever the script is ambiguous (Latin-script text of any language).

/// Returns a best-effort ISO-639-1 code for `text`, defaulting to `"en"`.
pub fn detect(text: &str) -> &'static str {
    let mut counts: [usize; 7] = [0; 7];
    // 0=latin 1=cyrillic 2=han 3=hiragana/katakana 4=hangul 5=arabic 6=greek
    for ch in text.chars() {
        let code = ch as u32;
        match code {
            0x0041..=0x024F => counts[0] += 1,
            0x0400..=0x04FF => counts[1] += 1,
            0x4E00..=0x9FFF | 0x3400..=0x4DBF => counts[2] += 1,
            0x3040..=0x30FF => counts[3] += 1,
            0xAC00..=0xD7A3 => counts[4] += 1,
            0x0600..=0x06FF => counts[5] += 1,
            0x0370..=0x03FF => counts[6] += 1,
            _ => {},
        }
    }

    let (dominant, &max) = counts.iter().enumerate().max_by_key(|(_, &c)| c).unwrap_or((0, &0));
    if max == 0 {
        return "en";
    }

    match dominant {
        1 => "ru",
        2 => "zh",
        3 => "ja",
        4 => "ko",
        5 => "ar",
        6 => "el",
        _ => "en",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_english_for_latin_text() {
        assert_eq!(detect("How many schools are exclusively virtual?"), "en");
    }

    #[test]
    fn detects_cyrillic() {
        assert_eq!(detect("Сколько школ полностью виртуальные?"), "ru");
    }

    #[test]
    fn detects_han() {
        assert_eq!(detect("有多少所学校是纯虚拟的?"), "zh");
    }

    #[test]
    fn empty_text_defaults_to_english() {
        assert_eq!(detect(""), "en");
    }
}
