// The score-operator grammar:
//
//   #scale[v](...)
//   #window[lo,hi,{o|u}](...)
//   #term[{e|s|n|a|m|h|t|v},CALC,lang](word)
//
// The characters `, ) ( ] [ # \` escape with a backslash. A separator space
// splits the query into several terms when a proximity window is present;
// otherwise a separator between two alphanumeric characters is kept and
// every other separator is dropped.

use crate::error::{DbError, Result};

/// Word match mode of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// `e` - every token boundary must align.
    ExactWord,
    /// `s` - head and tail boundaries only.
    SimpleWord,
    /// `n` - plain string match.
    String,
    /// `a` - string match reporting observed boundary bits.
    Approximate,
    /// `m` - multi-language blocking.
    Multi,
    /// `h` - the match must start a word.
    WordHead,
    /// `t` - the match must end a word.
    WordTail,
    /// `v` - expand word variants.
    ExpandSynonym,
}

impl MatchMode {
    fn from_letter(letter: char) -> Result<MatchMode> {
        Ok(match letter {
            'e' => MatchMode::ExactWord,
            's' => MatchMode::SimpleWord,
            'n' => MatchMode::String,
            'a' => MatchMode::Approximate,
            'm' => MatchMode::Multi,
            'h' => MatchMode::WordHead,
            't' => MatchMode::WordTail,
            'v' => MatchMode::ExpandSynonym,
            _ => {
                return Err(DbError::InvalidArgument(format!(
                    "unknown match mode '{letter}'"
                )))
            }
        })
    }

    fn letter(self) -> char {
        match self {
            MatchMode::ExactWord => 'e',
            MatchMode::SimpleWord => 's',
            MatchMode::String => 'n',
            MatchMode::Approximate => 'a',
            MatchMode::Multi => 'm',
            MatchMode::WordHead => 'h',
            MatchMode::WordTail => 't',
            MatchMode::ExpandSynonym => 'v',
        }
    }
}

/// One `#term` with its calculator string, e.g.
/// `NormalizedOkapiTfIdf:0.0:1.0:0.25:1`, and language tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFormula {
    pub mode: MatchMode,
    pub calculator: String,
    pub language: String,
    pub word: String,
}

impl TermFormula {
    pub fn new(word: impl Into<String>) -> TermFormula {
        TermFormula {
            mode: MatchMode::String,
            calculator: String::new(),
            language: String::new(),
            word: word.into(),
        }
    }

    /// Render back into operator syntax.
    pub fn format(&self) -> String {
        format!(
            "#term[{},{},{}]({})",
            self.mode.letter(),
            escape(&self.calculator),
            escape(&self.language),
            escape(&self.word),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Term(TermFormula),
    Scale {
        factor: f64,
        child: Box<QueryNode>,
    },
    Window {
        lower: u32,
        upper: u32,
        ordered: bool,
        children: Vec<QueryNode>,
    },
}

const ESCAPABLE: &[char] = &[',', ')', '(', ']', '[', '#', '\\'];

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPABLE.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

struct Parser {
    chars: Vec<char>,
    position: usize,
    /// Inside a proximity window, separators split terms.
    in_window: bool,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            other => Err(DbError::InvalidArgument(format!(
                "expected '{expected}', found {other:?}"
            ))),
        }
    }

    fn starts_with(&self, keyword: &str) -> bool {
        self.chars[self.position..]
            .iter()
            .zip(keyword.chars())
            .filter(|(a, b)| **a == *b)
            .count()
            == keyword.len()
    }

    fn skip(&mut self, keyword: &str) {
        self.position += keyword.len();
    }

    /// Read until an unescaped terminator, unescaping as we go.
    fn until(&mut self, terminators: &[char]) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                if let Some(escaped) = self.bump() {
                    out.push(escaped);
                }
                continue;
            }
            if terminators.contains(&c) {
                break;
            }
            self.bump();
            out.push(c);
        }
        out
    }

    fn parse_node(&mut self) -> Result<QueryNode> {
        while self.peek() == Some(' ') {
            self.bump();
        }
        if self.starts_with("#scale[") {
            self.skip("#scale[");
            let factor: f64 = self.until(&[']']).trim().parse().map_err(|_| {
                DbError::InvalidArgument("malformed scale factor".into())
            })?;
            self.expect(']')?;
            self.expect('(')?;
            let child = self.parse_node()?;
            self.expect(')')?;
            return Ok(QueryNode::Scale {
                factor,
                child: Box::new(child),
            });
        }
        if self.starts_with("#window[") {
            self.skip("#window[");
            let lower: u32 = self.until(&[',']).trim().parse().map_err(|_| {
                DbError::InvalidArgument("malformed window lower bound".into())
            })?;
            self.expect(',')?;
            let upper: u32 = self.until(&[',']).trim().parse().map_err(|_| {
                DbError::InvalidArgument("malformed window upper bound".into())
            })?;
            self.expect(',')?;
            let ordered = match self.bump() {
                Some('o') => true,
                Some('u') => false,
                other => {
                    return Err(DbError::InvalidArgument(format!(
                        "window order must be 'o' or 'u', found {other:?}"
                    )))
                }
            };
            self.expect(']')?;
            self.expect('(')?;
            let was_in_window = self.in_window;
            self.in_window = true;
            let mut children = Vec::new();
            loop {
                while self.peek() == Some(' ') {
                    self.bump();
                }
                if self.peek() == Some(')') || self.peek().is_none() {
                    break;
                }
                children.push(self.parse_node()?);
            }
            self.in_window = was_in_window;
            self.expect(')')?;
            return Ok(QueryNode::Window {
                lower,
                upper,
                ordered,
                children,
            });
        }
        if self.starts_with("#term[") {
            self.skip("#term[");
            let mode_letter = self.bump().ok_or_else(|| {
                DbError::InvalidArgument("missing match mode".into())
            })?;
            let mode = MatchMode::from_letter(mode_letter)?;
            self.expect(',')?;
            let calculator = self.until(&[',']);
            self.expect(',')?;
            let language = self.until(&[']']);
            self.expect(']')?;
            self.expect('(')?;
            let word = self.until(&[')']);
            self.expect(')')?;
            return Ok(QueryNode::Term(TermFormula {
                mode,
                calculator,
                language,
                word,
            }));
        }

        // Bare text.
        let terminators: &[char] = if self.in_window {
            &[')', ' ']
        } else {
            &[')']
        };
        let raw = self.until(terminators);
        if raw.is_empty() {
            return Err(DbError::InvalidArgument("empty query term".into()));
        }
        Ok(QueryNode::Term(TermFormula::new(normalize_separators(&raw))))
    }
}

/// Outside a window, a separator between two alphanumeric characters stays;
/// every other separator is dropped.
fn normalize_separators(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            out.push(c);
            continue;
        }
        let before = i.checked_sub(1).map(|j| chars[j]);
        let after = chars.get(i + 1).copied();
        if before.is_some_and(|b| b.is_alphanumeric())
            && after.is_some_and(|a| a.is_alphanumeric())
        {
            out.push(c);
        }
    }
    out
}

/// Parse one score-operator expression.
pub fn parse_query(text: &str) -> Result<QueryNode> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        position: 0,
        in_window: false,
    };
    let node = parser.parse_node()?;
    if parser.peek().is_some() {
        return Err(DbError::InvalidArgument(format!(
            "trailing input at {}",
            parser.position
        )));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_term_with_calculator() {
        let node = parse_query("#term[e,NormalizedOkapiTfIdf:0.0:1.0:0.25:1,ja](検索)").unwrap();
        let QueryNode::Term(term) = node else {
            panic!("expected a term");
        };
        assert_eq!(term.mode, MatchMode::ExactWord);
        assert_eq!(term.calculator, "NormalizedOkapiTfIdf:0.0:1.0:0.25:1");
        assert_eq!(term.language, "ja");
        assert_eq!(term.word, "検索");
    }

    #[test]
    fn parses_nested_scale_and_window() {
        let node = parse_query("#scale[0.5](#window[1,8,o](alpha beta))").unwrap();
        let QueryNode::Scale { factor, child } = node else {
            panic!("expected a scale");
        };
        assert_eq!(factor, 0.5);
        let QueryNode::Window {
            lower,
            upper,
            ordered,
            children,
        } = *child
        else {
            panic!("expected a window");
        };
        assert_eq!((lower, upper, ordered), (1, 8, true));
        // The separator space split the window body into two terms.
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[0],
            QueryNode::Term(TermFormula::new("alpha"))
        );
    }

    #[test]
    fn separators_outside_window_collapse() {
        let node = parse_query("data-base  x").unwrap();
        let QueryNode::Term(term) = node else {
            panic!("expected a term");
        };
        // '-' joins two alphanumerics and stays; the double space does not.
        assert_eq!(term.word, "data-basex");
    }

    #[test]
    fn escapes_round_trip() {
        let mut formula = TermFormula::new("a,b(c)");
        formula.mode = MatchMode::SimpleWord;
        formula.calculator = "Ok:1".to_string();
        let rendered = formula.format();
        assert_eq!(rendered, "#term[s,Ok:1,](a\\,b\\(c\\))");
        let node = parse_query(&rendered).unwrap();
        assert_eq!(node, QueryNode::Term(formula));
    }

    #[test]
    fn unordered_window_flag() {
        let node = parse_query("#window[2,4,u](a b)").unwrap();
        let QueryNode::Window { ordered, .. } = node else {
            panic!("expected a window");
        };
        assert!(!ordered);
    }

    #[test]
    fn malformed_inputs_rejected() {
        assert!(parse_query("#term[z,,](x)").is_err());
        assert!(parse_query("#window[1,2,x](a b)").is_err());
        assert!(parse_query("#scale[v](x)").is_err());
        assert!(parse_query("").is_err());
    }
}
