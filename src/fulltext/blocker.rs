// Blockers: split query and document text into index tokens. The Japanese
// blocker classifies characters and emits word tokens for alphanumeric runs
// and character n-grams for ideographic runs.

/// Character class driving tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharKind {
    Space,
    Alnum,
    Hiragana,
    Katakana,
    Kanji,
    Symbol,
}

pub fn char_kind(c: char) -> CharKind {
    match c {
        _ if c.is_whitespace() => CharKind::Space,
        _ if c.is_ascii_alphanumeric() => CharKind::Alnum,
        '\u{3041}'..='\u{309f}' => CharKind::Hiragana,
        '\u{30a0}'..='\u{30ff}' => CharKind::Katakana,
        // The iteration mark repeats the previous ideograph and blocks
        // like one.
        '\u{3005}' => CharKind::Kanji,
        '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' => CharKind::Kanji,
        _ if c.is_alphanumeric() => CharKind::Alnum,
        _ => CharKind::Symbol,
    }
}

/// One token with its character position in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub string: String,
    pub position: u32,
    pub is_bigram: bool,
}

pub trait Blocker {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Character positions where a token starts, plus the text end. Word
    /// match modes verify against this set.
    fn token_boundaries(&self, text: &str) -> Vec<u32> {
        let mut boundaries: Vec<u32> = self
            .tokenize(text)
            .iter()
            .filter(|t| !t.is_bigram)
            .map(|t| t.position)
            .collect();
        boundaries.push(text.chars().count() as u32);
        boundaries.sort_unstable();
        boundaries.dedup();
        boundaries
    }
}

/// Blocker for Japanese and mixed text: alphanumeric runs become one token
/// each; ideographic and kana runs become per-character tokens, plus
/// in-run bigrams when enabled.
#[derive(Debug, Clone)]
pub struct JapaneseBlocker {
    pub use_bigram: bool,
}

impl JapaneseBlocker {
    pub fn new(use_bigram: bool) -> JapaneseBlocker {
        JapaneseBlocker { use_bigram }
    }
}

impl Blocker for JapaneseBlocker {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let chars: Vec<(char, CharKind)> = text.chars().map(|c| (c, char_kind(c))).collect();
        let mut i = 0;
        while i < chars.len() {
            let kind = chars[i].1;
            match kind {
                CharKind::Space | CharKind::Symbol => {
                    i += 1;
                }
                CharKind::Alnum => {
                    let start = i;
                    let mut word = String::new();
                    while i < chars.len() && chars[i].1 == CharKind::Alnum {
                        word.extend(chars[i].0.to_lowercase());
                        i += 1;
                    }
                    tokens.push(Token {
                        string: word,
                        position: start as u32,
                        is_bigram: false,
                    });
                }
                CharKind::Hiragana | CharKind::Katakana | CharKind::Kanji => {
                    let run_kind = kind;
                    let start = i;
                    while i < chars.len() && chars[i].1 == run_kind {
                        tokens.push(Token {
                            string: chars[i].0.to_string(),
                            position: i as u32,
                            is_bigram: false,
                        });
                        i += 1;
                    }
                    if self.use_bigram {
                        for j in start..i.saturating_sub(1) {
                            tokens.push(Token {
                                string: format!("{}{}", chars[j].0, chars[j + 1].0),
                                position: j as u32,
                                is_bigram: true,
                            });
                        }
                    }
                }
            }
        }
        tokens
    }
}
