//! Syntax gate run before any pattern matching.
//!
//! Python is parsed with tree-sitter, and Python 2 `print`/`exec` statements the
//! grammar tolerates are rejected. Other languages get a delimiter balance scan
//! that skips string literals, comments and JS/TS regex literals.

use crate::criteria::Language;
use tracing::warn;
use tree_sitter::{Node, Parser};

/// A syntax problem in generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub message: String,
    /// 1-based line
    pub line: Option<usize>,
}

impl SyntaxIssue {
    fn at(line: usize, message: impl Into<String>) -> Self {
        Self { message: message.into(), line: Some(line) }
    }
}

/// Check `code` for syntax errors. `None` means the code is well-formed.
pub fn check_syntax(code: &str, language: &Language) -> Option<SyntaxIssue> {
    match language {
        Language::Python => check_python(code),
        other => check_balance(code, other),
    }
}

fn check_python(code: &str) -> Option<SyntaxIssue> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        warn!(error = %e, "Python grammar unavailable, falling back to balance check");
        return check_balance(code, &Language::Python);
    }

    let Some(tree) = parser.parse(code, None) else {
        return Some(SyntaxIssue {
            message: "Syntax error: code could not be parsed".into(),
            line: None,
        });
    };

    let root = tree.root_node();
    if !root.has_error() {
        // The grammar still accepts Python 2 statement forms.
        return first_of_kind(root, &["print_statement", "exec_statement"]).map(|node| {
            let keyword = node.kind().trim_end_matches("_statement");
            SyntaxIssue::at(
                node.start_position().row + 1,
                format!("Syntax error: Python 2 '{}' statement", keyword),
            )
        });
    }

    let issue = first_error(root)
        .map(|node| describe(node, code))
        .unwrap_or_else(|| SyntaxIssue::at(1, "Syntax error: invalid syntax"));
    Some(issue)
}

fn first_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    if kinds.contains(&node.kind()) {
        return Some(node);
    }
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .find_map(|child| first_of_kind(child, kinds))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .filter(|child| child.has_error())
        .find_map(first_error)
}

fn describe(node: Node<'_>, code: &str) -> SyntaxIssue {
    let line = node.start_position().row + 1;
    if node.is_missing() {
        return SyntaxIssue::at(line, format!("Syntax error: missing '{}'", node.kind()));
    }

    let text = node.utf8_text(code.as_bytes()).unwrap_or_default();
    let near: String = text.lines().next().unwrap_or_default().trim().chars().take(40).collect();
    if near.is_empty() {
        SyntaxIssue::at(line, "Syntax error: invalid syntax")
    } else {
        SyntaxIssue::at(line, format!("Syntax error: invalid syntax near '{}'", near))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    LineComment,
    BlockComment,
    /// `raw` literals have no backslash escapes; a doubled quote is the only escape.
    Str { quote: char, multiline: bool, triple: bool, raw: bool },
    Regex { in_class: bool },
}

struct Lexicon {
    line_comments: &'static [&'static str],
    block_comments: bool,
    quotes: &'static [char],
    triple_quotes: bool,
    /// C# `@"..."` verbatim and `"""..."""` raw strings
    verbatim_strings: bool,
    regex_literals: bool,
}

fn lexicon(language: &Language) -> Lexicon {
    match language {
        Language::Python => Lexicon {
            line_comments: &["#"],
            block_comments: false,
            quotes: &['"', '\''],
            triple_quotes: true,
            verbatim_strings: false,
            regex_literals: false,
        },
        Language::TypeScript | Language::JavaScript => Lexicon {
            line_comments: &["//"],
            block_comments: true,
            quotes: &['"', '\'', '`'],
            triple_quotes: false,
            verbatim_strings: false,
            regex_literals: true,
        },
        Language::CSharp | Language::Java => Lexicon {
            line_comments: &["//"],
            block_comments: true,
            quotes: &['"', '\''],
            triple_quotes: *language == Language::CSharp,
            verbatim_strings: *language == Language::CSharp,
            regex_literals: false,
        },
        Language::Other(_) => Lexicon {
            line_comments: &["#", "//"],
            block_comments: true,
            quotes: &['"'],
            triple_quotes: false,
            verbatim_strings: false,
            regex_literals: false,
        },
    }
}

/// Check that `()`, `[]` and `{}` nest and close outside strings and comments.
pub fn check_balance(code: &str, language: &Language) -> Option<SyntaxIssue> {
    let lex = lexicon(language);
    let chars: Vec<char> = code.chars().collect();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut state = Scan::Code;
    let mut line = 1;
    let mut i = 0;

    let starts_with =
        |i: usize, s: &str| s.chars().enumerate().all(|(k, c)| chars.get(i + k) == Some(&c));
    let tripled = |i: usize, q: char| chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q);

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
        }

        match state {
            Scan::Code => {
                if lex.line_comments.iter().any(|p| starts_with(i, p)) {
                    state = Scan::LineComment;
                } else if lex.block_comments && starts_with(i, "/*") {
                    state = Scan::BlockComment;
                    i += 1;
                } else if lex.regex_literals && c == '/' && regex_may_start(&chars, i) {
                    state = Scan::Regex { in_class: false };
                } else if lex.quotes.contains(&c) {
                    let triple = lex.triple_quotes && tripled(i, c);
                    let verbatim =
                        lex.verbatim_strings && c == '"' && is_verbatim_prefix(&chars, i);
                    state = Scan::Str {
                        quote: c,
                        multiline: triple || verbatim || c == '`',
                        triple,
                        raw: lex.verbatim_strings && (triple || verbatim),
                    };
                    if triple {
                        i += 2;
                    }
                } else if let Some(open) = opening_for(c) {
                    match stack.pop() {
                        Some((top, _)) if top == open => {}
                        _ => {
                            let message = format!("Syntax error: unexpected '{}'", c);
                            return Some(SyntaxIssue::at(line, message));
                        }
                    }
                } else if matches!(c, '(' | '[' | '{') {
                    stack.push((c, line));
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if starts_with(i, "*/") {
                    state = Scan::Code;
                    i += 1;
                }
            }
            Scan::Regex { in_class } => {
                if c == '\\' {
                    i += 1;
                } else if c == '\n' {
                    state = Scan::Code;
                } else if in_class {
                    if c == ']' {
                        state = Scan::Regex { in_class: false };
                    }
                } else if c == '[' {
                    state = Scan::Regex { in_class: true };
                } else if c == '/' {
                    state = Scan::Code;
                }
            }
            Scan::Str { quote, raw: true, triple, .. } => {
                if triple {
                    if c == quote && tripled(i, quote) {
                        // Raw strings may close with more than three quotes.
                        while chars.get(i + 1) == Some(&quote) {
                            i += 1;
                        }
                        state = Scan::Code;
                    }
                } else if c == quote {
                    if chars.get(i + 1) == Some(&quote) {
                        i += 1;
                    } else {
                        state = Scan::Code;
                    }
                }
            }
            Scan::Str { quote, multiline, triple, .. } => {
                if c == '\\' {
                    if chars.get(i + 1) == Some(&'\n') {
                        line += 1;
                    }
                    i += 1;
                } else if c == '\n' && !multiline {
                    // Unterminated single-line literal; resume scanning code.
                    state = Scan::Code;
                } else if triple {
                    if c == quote && tripled(i, quote) {
                        state = Scan::Code;
                        i += 2;
                    }
                } else if c == quote {
                    state = Scan::Code;
                }
            }
        }
        i += 1;
    }

    if let Scan::Str { triple: true, .. }
    | Scan::Str { quote: '`', .. }
    | Scan::Str { raw: true, .. } = state
    {
        return Some(SyntaxIssue::at(line, "Syntax error: unterminated string literal"));
    }

    stack.pop().map(|(open, opened_at)| {
        SyntaxIssue::at(opened_at, format!("Syntax error: unclosed '{}'", open))
    })
}

/// `"` preceded by `@`, `$@` or `@$` opens a C# verbatim string.
fn is_verbatim_prefix(chars: &[char], quote_at: usize) -> bool {
    let before = |n: usize| quote_at.checked_sub(n).and_then(|k| chars.get(k)).copied();
    before(1) == Some('@') || (before(1) == Some('$') && before(2) == Some('@'))
}

/// A `/` starts a regex literal when it cannot be a division operator.
fn regex_may_start(chars: &[char], slash_at: usize) -> bool {
    let prev = chars[..slash_at].iter().rposition(|c| !c.is_whitespace());
    let Some(end) = prev else {
        return true;
    };
    if matches!(chars[end], '(' | '=' | ',' | ':' | '!' | '&' | '|' | '?' | ';' | '{' | '[') {
        return true;
    }
    let is_ident = |c: &char| c.is_alphanumeric() || *c == '_' || *c == '$';
    let start = chars[..=end].iter().rposition(|c| !is_ident(c)).map_or(0, |k| k + 1);
    chars[start..=end].iter().collect::<String>() == "return"
}

fn opening_for(c: char) -> Option<char> {
    match c {
        ')' => Some('('),
        ']' => Some('['),
        '}' => Some('{'),
        _ => None,
    }
}
