//! Tokenizer for the script dialect.
//!
//! `logos` recognises the raw tokens; a second pass turns newlines and leading
//! whitespace into `Newline`/`Indent`/`Dedent` tokens, ignoring line breaks
//! inside brackets and blank lines.

use logos::Logos;

use super::error::{LineIndex, Pos, ScriptError};

/// Raw token type for logos - literal values are decoded in the second pass.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"([ \t\r\f]+|\\\r?\n|#[^\n]*)")]
enum RawToken {
    #[regex(r"\n[ \t]*")]
    Newline,

    // === Keywords ===
    #[token("def")]
    Def,
    #[token("lambda")]
    Lambda,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("pass")]
    Pass,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Name,
    #[regex("[0-9]+")]
    Int,
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    Float,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#)]
    Str,
    #[token("\"\"\"", triple_double)]
    #[token("'''", triple_single)]
    TripleStr,

    // === Operators (longer first) ===
    #[token("//=")]
    SlashSlashEq,
    #[token("**")]
    StarStar,
    #[token("//")]
    SlashSlash,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
}

fn triple_double(lex: &mut logos::Lexer<RawToken>) -> bool {
    close_triple(lex, "\"\"\"")
}

fn triple_single(lex: &mut logos::Lexer<RawToken>) -> bool {
    close_triple(lex, "'''")
}

fn close_triple(lex: &mut logos::Lexer<RawToken>, quote: &str) -> bool {
    match lex.remainder().find(quote) {
        Some(end) => {
            lex.bump(end + quote.len());
            true
        }
        None => false,
    }
}

/// A token produced for the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),

    Def,
    Lambda,
    Return,
    If,
    Elif,
    Else,
    For,
    In,
    Not,
    And,
    Or,
    Pass,
    Break,
    Continue,
    True,
    False,
    None,

    StarStar,
    SlashSlash,
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    SlashSlashEq,
    PercentEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Lt,
    Gt,
    Dot,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Newline,
    Indent,
    Dedent,
    Eof,
}

impl Token {
    /// Human-readable token description for parse errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Name(name) => format!("identifier {}", name),
            Token::Int(n) => format!("int literal {}", n),
            Token::Float(x) => format!("float literal {}", x),
            Token::Str(_) => "string literal".to_string(),
            Token::Newline => "newline".to_string(),
            Token::Indent => "indent".to_string(),
            Token::Dedent => "outdent".to_string(),
            Token::Eof => "end of file".to_string(),
            other => format!("{:?}", other).to_lowercase(),
        }
    }
}

/// A token together with where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub pos: Pos,
}

/// Tokenize script source into a flat token stream ending in `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, ScriptError> {
    let index = LineIndex::new(source);
    let mut raw = Vec::new();
    let mut lexer = RawToken::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => raw.push((token, span)),
            Err(()) => {
                let found = source[span.clone()].chars().next().unwrap_or(' ');
                let message = if found == '"' || found == '\'' {
                    "unterminated string literal".to_string()
                } else {
                    format!("invalid character {:?}", found)
                };
                return Err(ScriptError::at(message, index.pos(span.start)));
            }
        }
    }

    let mut out: Vec<Lexeme> = Vec::new();
    let mut indents: Vec<usize> = Vec::new();
    let mut depth = 0usize;

    for (i, (token, span)) in raw.iter().enumerate() {
        let pos = index.pos(span.start);
        let text = &source[span.clone()];
        if *token == RawToken::Newline {
            if depth > 0 {
                continue;
            }
            // Blank and comment-only lines do not affect indentation.
            match raw.get(i + 1) {
                None | Some((RawToken::Newline, _)) => continue,
                Some(_) => {}
            }
            let width = indent_width(&text[1..]);
            if indents.is_empty() {
                indents.push(width);
                continue;
            }
            if !matches!(out.last().map(|l| &l.token), Some(Token::Newline)) {
                out.push(Lexeme {
                    token: Token::Newline,
                    pos,
                });
            }
            let next_pos = index.pos(span.end);
            adjust_indent(&mut out, &mut indents, width, next_pos)?;
            continue;
        }
        if indents.is_empty() {
            indents.push((pos.col - 1) as usize);
        }
        match token {
            RawToken::LParen | RawToken::LBracket | RawToken::LBrace => depth += 1,
            RawToken::RParen | RawToken::RBracket | RawToken::RBrace => {
                depth = depth.saturating_sub(1)
            }
            _ => {}
        }
        out.push(Lexeme {
            token: convert(*token, text, pos)?,
            pos,
        });
    }

    let end = index.pos(source.len());
    if !out.is_empty() && !matches!(out.last().map(|l| &l.token), Some(Token::Newline)) {
        out.push(Lexeme {
            token: Token::Newline,
            pos: end,
        });
    }
    while indents.len() > 1 {
        indents.pop();
        out.push(Lexeme {
            token: Token::Dedent,
            pos: end,
        });
    }
    out.push(Lexeme {
        token: Token::Eof,
        pos: end,
    });
    Ok(out)
}

fn indent_width(whitespace: &str) -> usize {
    whitespace
        .chars()
        .fold(0, |width, c| if c == '\t' { width + 8 - width % 8 } else { width + 1 })
}

fn adjust_indent(
    out: &mut Vec<Lexeme>,
    indents: &mut Vec<usize>,
    width: usize,
    pos: Pos,
) -> Result<(), ScriptError> {
    let current = indents.last().copied().unwrap_or(0);
    if width > current {
        indents.push(width);
        out.push(Lexeme {
            token: Token::Indent,
            pos,
        });
        return Ok(());
    }
    while indents.len() > 1 && width < indents.last().copied().unwrap_or(0) {
        indents.pop();
        out.push(Lexeme {
            token: Token::Dedent,
            pos,
        });
    }
    if indents.last().copied().unwrap_or(0) != width {
        return Err(ScriptError::at(
            "unindent does not match any outer indentation level",
            pos,
        ));
    }
    Ok(())
}

fn convert(token: RawToken, text: &str, pos: Pos) -> Result<Token, ScriptError> {
    Ok(match token {
        RawToken::Name => Token::Name(text.to_string()),
        RawToken::Int => Token::Int(
            text.parse()
                .map_err(|_| ScriptError::at(format!("int literal {} out of range", text), pos))?,
        ),
        RawToken::Float => Token::Float(
            text.parse()
                .map_err(|_| ScriptError::at(format!("invalid float literal {}", text), pos))?,
        ),
        RawToken::Str => Token::Str(unescape(&text[1..text.len() - 1])),
        RawToken::TripleStr => Token::Str(unescape(&text[3..text.len() - 3])),
        RawToken::Def => Token::Def,
        RawToken::Lambda => Token::Lambda,
        RawToken::Return => Token::Return,
        RawToken::If => Token::If,
        RawToken::Elif => Token::Elif,
        RawToken::Else => Token::Else,
        RawToken::For => Token::For,
        RawToken::In => Token::In,
        RawToken::Not => Token::Not,
        RawToken::And => Token::And,
        RawToken::Or => Token::Or,
        RawToken::Pass => Token::Pass,
        RawToken::Break => Token::Break,
        RawToken::Continue => Token::Continue,
        RawToken::True => Token::True,
        RawToken::False => Token::False,
        RawToken::None => Token::None,
        RawToken::StarStar => Token::StarStar,
        RawToken::SlashSlash => Token::SlashSlash,
        RawToken::SlashSlashEq => Token::SlashSlashEq,
        RawToken::EqEq => Token::EqEq,
        RawToken::NotEq => Token::NotEq,
        RawToken::LtEq => Token::LtEq,
        RawToken::GtEq => Token::GtEq,
        RawToken::PlusEq => Token::PlusEq,
        RawToken::MinusEq => Token::MinusEq,
        RawToken::StarEq => Token::StarEq,
        RawToken::SlashEq => Token::SlashEq,
        RawToken::PercentEq => Token::PercentEq,
        RawToken::Plus => Token::Plus,
        RawToken::Minus => Token::Minus,
        RawToken::Star => Token::Star,
        RawToken::Slash => Token::Slash,
        RawToken::Percent => Token::Percent,
        RawToken::Eq => Token::Eq,
        RawToken::Lt => Token::Lt,
        RawToken::Gt => Token::Gt,
        RawToken::Dot => Token::Dot,
        RawToken::Comma => Token::Comma,
        RawToken::Colon => Token::Colon,
        RawToken::Semicolon => Token::Semicolon,
        RawToken::LParen => Token::LParen,
        RawToken::RParen => Token::RParen,
        RawToken::LBracket => Token::LBracket,
        RawToken::RBracket => Token::RBracket,
        RawToken::LBrace => Token::LBrace,
        RawToken::RBrace => Token::RBrace,
        RawToken::Newline => Token::Newline,
    })
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('\n') => {}
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn test_function_block_indentation() {
        let toks = tokens("\ndef transform(ds, ctx):\n  ds.set_body([1])\n");
        assert_eq!(toks[0], Token::Def);
        assert!(toks.contains(&Token::Indent));
        assert!(toks.contains(&Token::Dedent));
        assert_eq!(toks.last(), Some(&Token::Eof));
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let toks = tokens("x = [\n  1,\n  2,\n]\n");
        assert!(!toks.contains(&Token::Indent));
        assert_eq!(
            toks.iter().filter(|t| **t == Token::Newline).count(),
            1,
            "only the statement terminator should remain"
        );
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        let toks = tokens("a = 1\n\n# comment\n   \nb = 2\n");
        assert!(!toks.contains(&Token::Indent));
        assert_eq!(toks.iter().filter(|t| **t == Token::Newline).count(), 2);
    }

    #[test]
    fn test_string_escapes_and_triple_quotes() {
        let toks = tokens("a = \"x\\ny\"\nb = '''multi\nline'''\n");
        assert!(toks.contains(&Token::Str("x\ny".to_string())));
        assert!(toks.contains(&Token::Str("multi\nline".to_string())));
    }

    #[test]
    fn test_keywords_win_over_names() {
        let toks = tokens("define = None\n");
        assert_eq!(toks[0], Token::Name("define".to_string()));
        assert_eq!(toks[2], Token::None);
    }

    #[test]
    fn test_bad_dedent_is_an_error() {
        let err = tokenize("if x:\n    a = 1\n  b = 2\n").unwrap_err();
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn test_uniformly_indented_source_is_accepted() {
        let toks = tokens("    a = 1\n    b = 2\n");
        assert!(!toks.contains(&Token::Indent));
        assert!(!toks.contains(&Token::Dedent));
    }
}
