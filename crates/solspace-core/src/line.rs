//! Line-oriented reference collaborators.
//!
//! [`LineParser`] turns every non-blank source line into one statement node
//! under a `module` root. The anonymized tree renames identifiers to
//! `v0, v1, ...` in order of first appearance and keeps literals; the
//! canonical tree additionally replaces identifiers and literals by fixed
//! placeholders. [`LineDiff`] is a Levenshtein distance over statements and
//! [`LineRenderer`] prints statement labels back, one per line.
//!
//! These are deliberately simple. Production deployments plug a real
//! language front end in through the traits in [`crate::collab`].

use std::collections::{HashMap, HashSet};

use crate::collab::{DiffApplicator, EditDistance, ParsedCode, TreeDiff, TreeParser, TreeRenderer};
use crate::error::CoreError;
use crate::tree::SyntaxTree;

pub const MODULE_KIND: &str = "module";

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const BUILTINS: &[&str] = &[
    "abs", "bool", "dict", "float", "input", "int", "len", "list", "max", "min", "print", "range",
    "round", "set", "sorted", "str", "sum", "tuple",
];

const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "//=", "%=", "**="];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(String),
    Str(String),
    Punct(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::Number(s) | Token::Str(s) | Token::Punct(s) => s,
        }
    }
}

fn tokenize(line: &str) -> Vec<Token> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '#' {
            break;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            tokens.push(Token::Str(chars[start..i].iter().collect()));
        } else {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            let three: String = chars[i..(i + 3).min(chars.len())].iter().collect();
            let op = if three.len() == 3 && ["//=", "**="].contains(&three.as_str()) {
                three
            } else if two.len() == 2
                && ["==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "//", "**"]
                    .contains(&two.as_str())
            {
                two
            } else {
                c.to_string()
            };
            i += op.chars().count();
            tokens.push(Token::Punct(op));
        }
    }
    tokens
}

fn join_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for tok in tokens {
        let glue = match prev {
            None => false,
            Some(p) => {
                !matches!(tok, ")" | "]" | "," | ":" | "." | "(" | "[")
                    && !matches!(p, "(" | "[" | ".")
            }
        };
        // Calls and indexing hug their callee: `print(x)`, `a[0]`.
        let hug_open = matches!(tok, "(" | "[")
            && prev.is_some_and(|p| !matches!(p, "=" | "," | "(" | "[") && !is_operator(p));
        if glue || (matches!(tok, "(" | "[") && !hug_open && prev.is_some()) {
            out.push(' ');
        }
        out.push_str(tok);
        prev = Some(tok);
    }
    out
}

fn is_operator(tok: &str) -> bool {
    matches!(
        tok,
        "+" | "-" | "*" | "/" | "%" | "//" | "**" | "<" | ">" | "==" | "!=" | "<=" | ">="
    ) || ASSIGN_OPS.contains(&tok)
        || KEYWORDS.contains(&tok)
}

fn classify(tokens: &[Token]) -> &'static str {
    match tokens.first().map(Token::text) {
        Some("if") => "if",
        Some("elif") => "elif",
        Some("else") => "else",
        Some("for") => "for",
        Some("while") => "while",
        Some("def") => "def",
        Some("return") => "return",
        Some("import") | Some("from") => "import",
        Some("try") | Some("except") | Some("finally") => "try",
        _ if tokens
            .iter()
            .any(|t| matches!(t, Token::Punct(p) if ASSIGN_OPS.contains(&p.as_str()))) =>
        {
            "assign"
        }
        _ if tokens.iter().any(|t| t.text() == "(") => "call",
        _ => "expr",
    }
}

/// Reference parser: one statement node per non-blank line.
#[derive(Debug, Clone)]
pub struct LineParser {
    keywords: HashSet<&'static str>,
    builtins: HashSet<&'static str>,
}

impl Default for LineParser {
    fn default() -> Self {
        LineParser {
            keywords: KEYWORDS.iter().copied().collect(),
            builtins: BUILTINS.iter().copied().collect(),
        }
    }
}

impl LineParser {
    fn is_name(&self, word: &str) -> bool {
        !self.keywords.contains(word) && !self.builtins.contains(word)
    }
}

impl TreeParser for LineParser {
    fn parse(&self, source: &str) -> Result<ParsedCode, CoreError> {
        let mut renames: HashMap<String, String> = HashMap::new();
        let mut canonical = Vec::new();
        let mut anonymized = Vec::new();

        for line in source.lines() {
            let tokens = tokenize(line);
            if tokens.is_empty() {
                continue;
            }
            let indent_width = line.len() - line.trim_start().len();
            let indent = " ".repeat(indent_width);
            let kind = classify(&tokens);

            let anon_tokens: Vec<String> = tokens
                .iter()
                .map(|t| match t {
                    Token::Word(w) if self.is_name(w) => {
                        let next = format!("v{}", renames.len());
                        renames.entry(w.clone()).or_insert(next).clone()
                    }
                    other => other.text().to_string(),
                })
                .collect();
            let canon_tokens: Vec<&str> = tokens
                .iter()
                .map(|t| match t {
                    Token::Word(w) if self.is_name(w) => "x",
                    Token::Number(_) => "0",
                    Token::Str(_) => "''",
                    other => other.text(),
                })
                .collect();

            anonymized.push(SyntaxTree::leaf(
                kind,
                format!("{indent}{}", join_tokens(anon_tokens.iter().map(String::as_str))),
            ));
            canonical.push(SyntaxTree::leaf(
                kind,
                format!("{indent}{}", join_tokens(canon_tokens.into_iter())),
            ));
        }

        Ok(ParsedCode {
            canonical: SyntaxTree::new(MODULE_KIND).with_children(canonical),
            anonymized: SyntaxTree::new(MODULE_KIND).with_children(anonymized),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditOp {
    Keep(usize),
    Update(usize),
    Delete,
    Insert(usize),
}

/// Levenshtein alignment of two statement lists. `Update`/`Insert` carry the
/// target index.
fn align(from: &[SyntaxTree], to: &[SyntaxTree]) -> Vec<EditOp> {
    let (n, m) = (from.len(), to.len());
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i as u32;
    }
    for j in 0..=m {
        dp[0][j] = j as u32;
    }
    for i in 1..=n {
        for j in 1..=m {
            let sub = if from[i - 1] == to[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j - 1] + sub)
                .min(dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1);
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && from[i - 1] == to[j - 1] && dp[i][j] == dp[i - 1][j - 1] {
            ops.push(EditOp::Keep(i - 1));
            i -= 1;
            j -= 1;
        } else if i > 0 && j > 0 && dp[i][j] == dp[i - 1][j - 1] + 1 {
            ops.push(EditOp::Update(j - 1));
            i -= 1;
            j -= 1;
        } else if i > 0 && dp[i][j] == dp[i - 1][j] + 1 {
            ops.push(EditOp::Delete);
            i -= 1;
        } else {
            ops.push(EditOp::Insert(j - 1));
            j -= 1;
        }
    }
    ops.reverse();
    ops
}

/// Statement-level Levenshtein distance and edit application.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDiff;

impl TreeDiff for LineDiff {
    fn edit_distance(&self, from: &SyntaxTree, to: &SyntaxTree) -> Result<EditDistance, CoreError> {
        let mut distance = EditDistance::ZERO;
        if from.kind != to.kind || from.label != to.label {
            distance.total += 1;
        }
        for op in align(&from.children, &to.children) {
            match op {
                EditOp::Keep(_) => {}
                EditOp::Update(_) | EditOp::Insert(_) => distance.total += 1,
                EditOp::Delete => {
                    distance.total += 1;
                    distance.deletes += 1;
                }
            }
        }
        Ok(distance)
    }
}

impl DiffApplicator for LineDiff {
    fn apply_minimal_edits(
        &self,
        from: &SyntaxTree,
        to: &SyntaxTree,
    ) -> Result<SyntaxTree, CoreError> {
        let mut children = Vec::with_capacity(to.children.len());
        for op in align(&from.children, &to.children) {
            match op {
                EditOp::Keep(i) => children.push(from.children[i].clone()),
                EditOp::Update(j) | EditOp::Insert(j) => children.push(to.children[j].clone()),
                EditOp::Delete => {}
            }
        }
        Ok(SyntaxTree {
            kind: to.kind.clone(),
            label: to.label.clone(),
            children,
        })
    }
}

/// Prints every labelled node below the root, one per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineRenderer;

impl TreeRenderer for LineRenderer {
    fn render(&self, tree: &SyntaxTree) -> Result<String, CoreError> {
        let lines: Vec<&str> = tree
            .iter()
            .skip(1)
            .filter_map(|node| node.label.as_deref())
            .collect();
        Ok(lines.join("\n"))
    }
}
