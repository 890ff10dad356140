//! XSD regular expressions
//!
//! XSD patterns use their own dialect: they are implicitly anchored, `^` and
//! `$` are ordinary characters, `\i`/`\c` name the XML name character sets,
//! `\p{IsBlock}` names Unicode blocks and classes support subtraction
//! (`[a-z-[aeiou]]`). [`translate`] rewrites a pattern into the syntax
//! understood by `regex` and `regex-syntax`; [`compile`] adds the anchors.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-2/#regexs

use crate::error::{Error, Result};
use regex::Regex;

const NAME_START_SET: &str = concat!(
    r"\:A-Z_a-z\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}",
    r"\x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}",
    r"\x{FDF0}-\x{FFFD}\x{10000}-\x{EFFFF}",
);
const NAME_EXTRA_SET: &str = r"\-.0-9\x{B7}\x{300}-\x{36F}\x{203F}-\x{2040}";
const SPACE_SET: &str = r" \t\n\r";
const WORD_EXCLUDED: &str = r"\p{P}\p{Z}\p{C}";

const BLOCKS: &[(&str, u32, u32)] = &[
    ("BasicLatin", 0x0000, 0x007F),
    ("Latin-1Supplement", 0x0080, 0x00FF),
    ("LatinExtended-A", 0x0100, 0x017F),
    ("LatinExtended-B", 0x0180, 0x024F),
    ("IPAExtensions", 0x0250, 0x02AF),
    ("Greek", 0x0370, 0x03FF),
    ("GreekandCoptic", 0x0370, 0x03FF),
    ("Cyrillic", 0x0400, 0x04FF),
    ("Armenian", 0x0530, 0x058F),
    ("Hebrew", 0x0590, 0x05FF),
    ("Arabic", 0x0600, 0x06FF),
    ("Devanagari", 0x0900, 0x097F),
    ("Thai", 0x0E00, 0x0E7F),
    ("GeneralPunctuation", 0x2000, 0x206F),
    ("CurrencySymbols", 0x20A0, 0x20CF),
    ("LetterlikeSymbols", 0x2100, 0x214F),
    ("Arrows", 0x2190, 0x21FF),
    ("MathematicalOperators", 0x2200, 0x22FF),
    ("BoxDrawing", 0x2500, 0x257F),
    ("Hiragana", 0x3040, 0x309F),
    ("Katakana", 0x30A0, 0x30FF),
    ("CJKUnifiedIdeographs", 0x4E00, 0x9FFF),
    ("HangulSyllables", 0xAC00, 0xD7AF),
    ("PrivateUse", 0xE000, 0xF8FF),
];

/// Rewrite an XSD pattern into `regex` syntax (without anchors)
pub fn translate(pattern: &str) -> Result<String> {
    let mut translator = Translator {
        pattern,
        chars: pattern.chars().collect(),
        pos: 0,
    };
    translator.translate()
}

/// Compile an XSD pattern into an anchored regex
pub fn compile(pattern: &str) -> Result<Regex> {
    let body = translate(pattern)?;
    Regex::new(&format!(r"\A(?:{})\z", body)).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

struct Translator<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Translator<'_> {
    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        self.pos += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidPattern {
            pattern: self.pattern.to_string(),
            reason: reason.into(),
        }
    }

    fn translate(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.next() {
            match c {
                '\\' => out.push_str(&self.escape()?),
                '[' => out.push_str(&self.class()?),
                '.' => out.push_str(r"[^\n\r]"),
                '^' | '$' => {
                    out.push('\\');
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    /// Translate the escape following a backslash; the result is usable both
    /// inside and outside a character class
    fn escape(&mut self) -> Result<String> {
        let c = self.next().ok_or_else(|| self.error("trailing backslash"))?;
        let translated = match c {
            'i' => format!("[{}]", NAME_START_SET),
            'I' => format!("[^{}]", NAME_START_SET),
            'c' => format!("[{}{}]", NAME_START_SET, NAME_EXTRA_SET),
            'C' => format!("[^{}{}]", NAME_START_SET, NAME_EXTRA_SET),
            's' => format!("[{}]", SPACE_SET),
            'S' => format!("[^{}]", SPACE_SET),
            'w' => format!("[^{}]", WORD_EXCLUDED),
            'W' => format!("[{}]", WORD_EXCLUDED),
            'd' | 'D' | 'n' | 'r' | 't' => format!("\\{}", c),
            'p' | 'P' => self.property(c == 'P')?,
            '\\' | '|' | '.' | '-' | '^' | '?' | '*' | '+' | '{' | '}' | '(' | ')' | '[' | ']'
            | '$' => format!("\\{}", c),
            other => return Err(self.error(format!("unknown escape '\\{}'", other))),
        };
        Ok(translated)
    }

    fn property(&mut self, negated: bool) -> Result<String> {
        if self.next() != Some('{') {
            return Err(self.error("expected '{' after \\p"));
        }
        let mut name = String::new();
        loop {
            match self.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => return Err(self.error("unterminated \\p{...}")),
            }
        }
        if let Some(block) = name.strip_prefix("Is") {
            let (_, lo, hi) = BLOCKS
                .iter()
                .find(|(n, _, _)| *n == block)
                .ok_or_else(|| self.error(format!("unsupported block 'Is{}'", block)))?;
            let caret = if negated { "^" } else { "" };
            Ok(format!("[{}\\x{{{:X}}}-\\x{{{:X}}}]", caret, lo, hi))
        } else {
            let letter = if negated { 'P' } else { 'p' };
            Ok(format!("\\{}{{{}}}", letter, name))
        }
    }

    /// Translate a character class; the opening '[' is already consumed
    fn class(&mut self) -> Result<String> {
        let negated = if self.peek() == Some('^') {
            self.pos += 1;
            true
        } else {
            false
        };
        let mut body = String::new();
        let mut first = true;
        loop {
            let c = self.next().ok_or_else(|| self.error("unterminated character class"))?;
            match c {
                ']' if !first => {
                    let caret = if negated { "^" } else { "" };
                    return Ok(format!("[{}{}]", caret, body));
                }
                '-' if self.peek() == Some('[') => {
                    self.pos += 1;
                    let subtrahend = self.class()?;
                    if self.next() != Some(']') {
                        return Err(self.error("class subtraction must end the class"));
                    }
                    let base = if negated {
                        format!("[^{}]", body)
                    } else {
                        body
                    };
                    return Ok(format!("[{}--{}]", base, subtrahend));
                }
                '\\' => body.push_str(&self.escape()?),
                '[' | ']' | '&' | '~' | ':' => {
                    body.push('\\');
                    body.push(c);
                }
                _ => body.push(c),
            }
            first = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_anchoring() {
        let re = compile("[a-z]+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("ab1"));
        assert!(!re.is_match(""));
    }

    #[test]
    fn test_caret_and_dollar_are_literal() {
        let re = compile("a^b$").unwrap();
        assert!(re.is_match("a^b$"));
        assert!(!re.is_match("ab"));
    }

    #[test]
    fn test_dot_excludes_line_breaks() {
        let re = compile(".*").unwrap();
        assert!(re.is_match("a b\t"));
        assert!(!re.is_match("a\nb"));
        assert!(!re.is_match("a\rb"));
    }

    #[test]
    fn test_name_escapes() {
        let re = compile(r"\i\c*").unwrap();
        assert!(re.is_match("_x1.-"));
        assert!(!re.is_match("1x"));
        let re = compile(r"[\i-[:]][\c-[:]]*").unwrap();
        assert!(re.is_match("ncname"));
        assert!(!re.is_match("a:b"));
    }

    #[test]
    fn test_class_subtraction() {
        let re = compile("[a-z-[aeiou]]+").unwrap();
        assert!(re.is_match("bcd"));
        assert!(!re.is_match("bad"));

        let re = compile("[^a-z-[0-9]]").unwrap();
        assert!(re.is_match("A"));
        assert!(!re.is_match("5"));
        assert!(!re.is_match("q"));
    }

    #[test]
    fn test_blocks_and_categories() {
        let re = compile(r"\p{IsBasicLatin}+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("\u{E9}"));
        let re = compile(r"\p{Lu}\P{Lu}*").unwrap();
        assert!(re.is_match("Abc"));
        assert!(compile(r"\p{IsKlingon}").is_err());
    }

    #[test]
    fn test_space_escape_is_xml_whitespace() {
        let re = compile(r"a\sb").unwrap();
        assert!(re.is_match("a b"));
        assert!(!re.is_match("a\u{A0}b"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(compile("(a"), Err(Error::InvalidPattern { .. })));
        assert!(matches!(compile(r"\q"), Err(Error::InvalidPattern { .. })));
        assert!(matches!(compile("[abc"), Err(Error::InvalidPattern { .. })));
    }
}
