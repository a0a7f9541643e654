use crate::error::{MinipyError, Span};
use std::collections::HashMap;
use std::fmt;

/// Number of spaces in one indentation step.
const INDENT_WIDTH: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and identifiers
    Number(i32),
    Id(String),
    Str(String),
    /// Any single punctuation character that is not part of a two-character
    /// operator: `(`, `)`, `:`, `,`, `.`, `=`, `<`, `>`, `+`, `-`, ...
    Char(char),

    // Keywords
    Class,
    Return,
    If,
    Else,
    Def,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,

    // Two-character comparison operators
    Eq,
    NotEq,
    LessOrEq,
    GreaterOrEq,

    // Line structure
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Id(name) => write!(f, "identifier '{}'", name),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Char(c) => write!(f, "'{}'", c),
            TokenKind::Class => write!(f, "'class'"),
            TokenKind::Return => write!(f, "'return'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::Def => write!(f, "'def'"),
            TokenKind::Print => write!(f, "'print'"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::Not => write!(f, "'not'"),
            TokenKind::None => write!(f, "'None'"),
            TokenKind::True => write!(f, "'True'"),
            TokenKind::False => write!(f, "'False'"),
            TokenKind::Eq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::LessOrEq => write!(f, "'<='"),
            TokenKind::GreaterOrEq => write!(f, "'>='"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Turns source text into a token vector with significant-indentation
/// structure (`Newline`/`Indent`/`Dedent` synthesis), then serves the
/// parser through a peek/advance cursor.
pub struct Lexer {
    source: String,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    indent_level: usize,
    cursor: usize,
    keywords: HashMap<&'static str, TokenKind>,
}

impl Lexer {
    /// Tokenizes `source` eagerly; any malformed token surfaces here.
    pub fn new(source: String) -> Result<Self, MinipyError> {
        let mut keywords = HashMap::new();
        keywords.insert("class", TokenKind::Class);
        keywords.insert("return", TokenKind::Return);
        keywords.insert("if", TokenKind::If);
        keywords.insert("else", TokenKind::Else);
        keywords.insert("def", TokenKind::Def);
        keywords.insert("print", TokenKind::Print);
        keywords.insert("and", TokenKind::And);
        keywords.insert("or", TokenKind::Or);
        keywords.insert("not", TokenKind::Not);
        keywords.insert("None", TokenKind::None);
        keywords.insert("True", TokenKind::True);
        keywords.insert("False", TokenKind::False);

        let mut lexer = Self {
            source,
            tokens: Vec::new(),
            start: 0,
            current: 0,
            indent_level: 0,
            cursor: 0,
            keywords,
        };
        lexer.scan_tokens()?;
        Ok(lexer)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    // ---------------------------------------------------------------------
    // Cursor API consumed by the parser
    // ---------------------------------------------------------------------

    /// The token under the cursor. The stream always ends with `Eof`.
    pub fn current(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    /// Moves the cursor one token forward and returns the new current
    /// token. Never advances past `Eof`.
    pub fn advance(&mut self) -> &Token {
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        &self.tokens[self.cursor]
    }

    /// Asserts that the current token matches `expected` exactly, payload
    /// included.
    pub fn expect(&self, expected: &TokenKind) -> Result<&Token, MinipyError> {
        let token = self.current();
        if token.kind == *expected {
            Ok(token)
        } else {
            Err(MinipyError::lex_error(
                token.span.clone(),
                format!("Expected {} but found {}", expected, token.kind),
            ))
        }
    }

    /// Asserts that the current token is an identifier and returns its
    /// name.
    pub fn expect_id(&self) -> Result<String, MinipyError> {
        let token = self.current();
        match &token.kind {
            TokenKind::Id(name) => Ok(name.clone()),
            other => Err(MinipyError::lex_error(
                token.span.clone(),
                format!("Expected an identifier but found {}", other),
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------------

    fn scan_tokens(&mut self) -> Result<(), MinipyError> {
        // Leading spaces on the very first line carry no indentation.
        self.skip_spaces();
        while !self.is_at_end() {
            let before = self.current;
            self.scan_keyword_or_id();
            self.scan_operator_or_symbol();
            self.scan_number()?;
            self.scan_string()?;
            self.skip_spaces();
            self.scan_comment();
            self.scan_newline();
            self.scan_indentation()?;

            // No scanner claimed the input, so it is not part of the
            // language (a tab, a carriage return, a non-ASCII byte, ...).
            if self.current == before {
                if let Some(c) = self.peek() {
                    return Err(MinipyError::lex_error(
                        Span::single(self.current),
                        format!("Unexpected character: {:?}", c),
                    ));
                }
            }
        }

        // The stream invariant: Eof is preceded by Newline or Dedent, and
        // every Indent has been matched by a Dedent.
        if !self.tokens.is_empty()
            && !matches!(
                self.last_kind(),
                Some(TokenKind::Newline) | Some(TokenKind::Dedent)
            )
        {
            self.add_synthetic(TokenKind::Newline);
        }
        while self.indent_level > 0 {
            self.add_synthetic(TokenKind::Dedent);
            self.indent_level -= 1;
        }
        self.add_synthetic(TokenKind::Eof);
        Ok(())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        Some(c)
    }

    fn last_kind(&self) -> Option<&TokenKind> {
        self.tokens.last().map(|t| &t.kind)
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.tokens
            .push(Token::new(kind, Span::new(self.start, self.current)));
    }

    fn add_synthetic(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, Span::single(self.current)));
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.bump();
        }
    }

    fn scan_keyword_or_id(&mut self) {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return,
        }
        self.start = self.current;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.source[self.start..self.current];
        let kind = self
            .keywords
            .get(word)
            .cloned()
            .unwrap_or_else(|| TokenKind::Id(word.to_string()));
        self.add_token(kind);
    }

    fn scan_operator_or_symbol(&mut self) {
        let first = match self.peek() {
            Some(c) => c,
            None => return,
        };
        // Quotes open strings and '#' opens a comment; neither is an
        // operator.
        if !first.is_ascii_punctuation() || first == '"' || first == '\'' || first == '#' {
            return;
        }
        self.start = self.current;
        self.bump();
        let kind = match (first, self.peek()) {
            ('!', Some('=')) => {
                self.bump();
                TokenKind::NotEq
            }
            ('=', Some('=')) => {
                self.bump();
                TokenKind::Eq
            }
            ('>', Some('=')) => {
                self.bump();
                TokenKind::GreaterOrEq
            }
            ('<', Some('=')) => {
                self.bump();
                TokenKind::LessOrEq
            }
            _ => TokenKind::Char(first),
        };
        self.add_token(kind);
    }

    fn scan_number(&mut self) -> Result<(), MinipyError> {
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Ok(());
        }
        self.start = self.current;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.source[self.start..self.current];
        let value = text.parse::<i32>().map_err(|_| {
            MinipyError::lex_error(
                Span::new(self.start, self.current),
                format!("Integer literal {} is out of range", text),
            )
        })?;
        self.add_token(TokenKind::Number(value));
        Ok(())
    }

    fn scan_string(&mut self) -> Result<(), MinipyError> {
        let quote = match self.peek() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Ok(()),
        };
        self.start = self.current;
        self.bump();

        let mut value = String::new();
        loop {
            let c = match self.bump() {
                Some(c) => c,
                None => {
                    return Err(MinipyError::lex_error(
                        Span::new(self.start, self.current),
                        "Unterminated string literal",
                    ));
                }
            };
            if c == quote {
                break;
            }
            match c {
                '\\' => {
                    let escape = self.bump().ok_or_else(|| {
                        MinipyError::lex_error(
                            Span::new(self.start, self.current),
                            "Unterminated string literal",
                        )
                    })?;
                    match escape {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '"' => value.push('"'),
                        '\'' => value.push('\''),
                        '\\' => value.push('\\'),
                        other => {
                            return Err(MinipyError::lex_error(
                                Span::new(self.start, self.current),
                                format!("Unrecognized escape sequence \\{}", other),
                            ));
                        }
                    }
                }
                '\n' | '\r' => {
                    return Err(MinipyError::lex_error(
                        Span::new(self.start, self.current),
                        "Unexpected end of line inside a string literal",
                    ));
                }
                _ => value.push(c),
            }
        }
        self.add_token(TokenKind::Str(value));
        Ok(())
    }

    fn scan_comment(&mut self) {
        if self.peek() != Some('#') {
            return;
        }
        // The comment owns the rest of the physical line, newline included.
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
        if !self.tokens.is_empty()
            && !matches!(
                self.last_kind(),
                Some(TokenKind::Newline) | Some(TokenKind::Dedent)
            )
        {
            self.add_synthetic(TokenKind::Newline);
        }
    }

    fn scan_newline(&mut self) {
        if self.peek() != Some('\n') {
            return;
        }
        self.start = self.current;
        self.bump();
        // Blank lines and a leading newline collapse into nothing.
        if !self.tokens.is_empty() && self.last_kind() != Some(&TokenKind::Newline) {
            self.add_token(TokenKind::Newline);
        }
    }

    /// Runs at the start of a logical line: counts leading spaces and emits
    /// the `Indent`/`Dedent` tokens for the level change.
    fn scan_indentation(&mut self) -> Result<(), MinipyError> {
        if !self.tokens.is_empty() && self.last_kind() != Some(&TokenKind::Newline) {
            return Ok(());
        }
        // A line consisting solely of a newline is blank and keeps the
        // current level.
        if self.peek() == Some('\n') {
            return Ok(());
        }

        self.start = self.current;
        let mut count = 0usize;
        while self.peek() == Some(' ') {
            self.bump();
            count += 1;
        }
        if count % INDENT_WIDTH != 0 {
            return Err(MinipyError::lex_error(
                Span::new(self.start, self.current),
                format!(
                    "Indentation of {} spaces is not a multiple of {}",
                    count, INDENT_WIDTH
                ),
            )
            .with_help("Each indentation level is exactly two spaces; tabs are not accepted."));
        }

        let new_level = count / INDENT_WIDTH;
        while self.indent_level < new_level {
            self.add_synthetic(TokenKind::Indent);
            self.indent_level += 1;
        }
        while self.indent_level > new_level {
            self.add_synthetic(TokenKind::Dedent);
            self.indent_level -= 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Result<Vec<TokenKind>, MinipyError> {
        let lexer = Lexer::new(input.to_string())?;
        Ok(lexer.tokens().iter().map(|t| t.kind.clone()).collect())
    }

    fn id(name: &str) -> TokenKind {
        TokenKind::Id(name.to_string())
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(kinds("").unwrap(), vec![TokenKind::Eof]);
    }

    #[test]
    fn single_identifier() {
        assert_eq!(
            kinds("abc").unwrap(),
            vec![id("abc"), TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("class return if else def print and or not None True False\n").unwrap(),
            vec![
                TokenKind::Class,
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Def,
                TokenKind::Print,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::None,
                TokenKind::True,
                TokenKind::False,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keyword_prefixes_stay_identifiers() {
        assert_eq!(
            kinds("classes note Truest\n").unwrap(),
            vec![
                id("classes"),
                id("note"),
                id("Truest"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn two_char_operators_and_punctuation() {
        assert_eq!(
            kinds("== != <= >= < > = ( ) : , . + - * /\n").unwrap(),
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LessOrEq,
                TokenKind::GreaterOrEq,
                TokenKind::Char('<'),
                TokenKind::Char('>'),
                TokenKind::Char('='),
                TokenKind::Char('('),
                TokenKind::Char(')'),
                TokenKind::Char(':'),
                TokenKind::Char(','),
                TokenKind::Char('.'),
                TokenKind::Char('+'),
                TokenKind::Char('-'),
                TokenKind::Char('*'),
                TokenKind::Char('/'),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("0 42 1000000\n").unwrap(),
            vec![
                TokenKind::Number(0),
                TokenKind::Number(42),
                TokenKind::Number(1000000),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn number_out_of_range() {
        assert!(kinds("99999999999999\n").is_err());
    }

    #[test]
    fn strings_with_both_quote_styles() {
        assert_eq!(
            kinds("'hello' \"world\"\n").unwrap(),
            vec![
                TokenKind::Str("hello".to_string()),
                TokenKind::Str("world".to_string()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'a\nb\t\'\"\\c'"#).unwrap(),
            vec![
                TokenKind::Str("a\nb\t'\"\\c".to_string()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_escape_is_an_error() {
        assert!(kinds(r#"'a\qb'"#).is_err());
    }

    #[test]
    fn raw_newline_inside_string_is_an_error() {
        assert!(kinds("'abc\ndef'").is_err());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(kinds("'abc").is_err());
    }

    #[test]
    fn indent_and_dedent_synthesis() {
        assert_eq!(
            kinds("  a\n    b\n").unwrap(),
            vec![
                id("a"),
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Indent,
                id("b"),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Dedent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(
            kinds("a # c\nb\n").unwrap(),
            vec![
                id("a"),
                TokenKind::Newline,
                id("b"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comment_only_line_between_statements() {
        assert_eq!(
            kinds("a\n# whole-line comment\nb\n").unwrap(),
            vec![
                id("a"),
                TokenKind::Newline,
                id("b"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn odd_indentation_is_an_error() {
        assert!(kinds("a\n   b\n").is_err());
    }

    #[test]
    fn tabs_are_rejected() {
        assert!(kinds("a\n\tb\n").is_err());
        assert!(kinds("a\tb\n").is_err());
    }

    #[test]
    fn stray_characters_are_rejected() {
        assert!(kinds("a\r\n").is_err());
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(
            kinds("a\n\n\nb\n").unwrap(),
            vec![
                id("a"),
                TokenKind::Newline,
                id("b"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn missing_trailing_newline_still_closes_indentation() {
        assert_eq!(
            kinds("a\n  b").unwrap(),
            vec![
                id("a"),
                TokenKind::Newline,
                TokenKind::Indent,
                id("b"),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indent_dedent_balance_over_every_prefix() {
        let tokens = kinds("a\n  b\n    c\n  d\ne\n").unwrap();
        let mut depth = 0i32;
        for kind in &tokens {
            match kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn stream_ends_with_newline_or_dedent_before_eof() {
        for input in ["a", "a\n", "a\n  b", "a\n  b\n"] {
            let tokens = kinds(input).unwrap();
            assert_eq!(tokens.last(), Some(&TokenKind::Eof));
            let before_eof = &tokens[tokens.len() - 2];
            assert!(
                matches!(before_eof, TokenKind::Newline | TokenKind::Dedent),
                "got {:?} for {:?}",
                before_eof,
                input
            );
        }
    }

    #[test]
    fn token_equality_compares_payload() {
        assert_eq!(id("a"), id("a"));
        assert_ne!(id("a"), id("b"));
        assert_ne!(TokenKind::Number(1), TokenKind::Number(2));
        assert_ne!(id("a"), TokenKind::Str("a".to_string()));
    }

    #[test]
    fn cursor_stops_at_eof() {
        let mut lexer = Lexer::new("a\n".to_string()).unwrap();
        assert_eq!(lexer.current().kind, id("a"));
        assert_eq!(lexer.advance().kind, TokenKind::Newline);
        assert_eq!(lexer.advance().kind, TokenKind::Eof);
        assert_eq!(lexer.advance().kind, TokenKind::Eof);
        assert_eq!(lexer.current().kind, TokenKind::Eof);
    }

    #[test]
    fn expect_matches_kind_and_payload() {
        let lexer = Lexer::new("x = 1\n".to_string()).unwrap();
        assert!(lexer.expect(&id("x")).is_ok());
        assert!(lexer.expect(&id("y")).is_err());
        assert!(lexer.expect(&TokenKind::Char('=')).is_err());
        assert_eq!(lexer.expect_id().unwrap(), "x");
    }

    #[test]
    fn expect_id_rejects_non_identifiers() {
        let mut lexer = Lexer::new("1\n".to_string()).unwrap();
        assert!(lexer.expect_id().is_err());
        lexer.advance();
        assert!(lexer.expect(&TokenKind::Newline).is_ok());
    }
}
