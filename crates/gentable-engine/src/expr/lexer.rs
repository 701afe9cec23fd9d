//! Tokenizer for the formula surface syntax.
//!
//! The surface and canonical spellings lex to the same tokens:
//! `&&`/`and`, `||`/`or`, `!`/`not`. The sentinels `STOP` and `CONTINUE`
//! are whole-identifier matches only, so `STOPPED` stays a name and text
//! inside string literals is never rewritten.

use crate::error::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    And,
    Or,
    Not,
    If,
    Else,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Int(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Str(s) => format!("{:?}", s),
            Token::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Token::None => "None".to_string(),
            Token::Ident(name) => name.clone(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Question => "'?'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::StarStar => "'**'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
            Token::Not => "'not'".to_string(),
            Token::If => "'if'".to_string(),
            Token::Else => "'else'".to_string(),
            Token::EqEq => "'=='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Identifiers with a fixed meaning; they cannot name columns or parameters.
pub const KEYWORDS: &[&str] = &[
    "and", "or", "not", "if", "else", "True", "False", "true", "false", "None", "STOP",
    "CONTINUE",
];

fn keyword(ident: &str) -> Option<Token> {
    let token = match ident {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "if" => Token::If,
        "else" => Token::Else,
        "True" | "true" | "STOP" => Token::Bool(true),
        "False" | "false" | "CONTINUE" => Token::Bool(false),
        "None" => Token::None,
        _ => return None,
    };
    Some(token)
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Lexer { src: source, pos: 0 };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(ahead)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '"' | '\'' => self.lex_string(ch)?,
            c if c.is_ascii_digit() => self.lex_number()?,
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number()?,
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.lex_identifier();
                keyword(&ident).unwrap_or(Token::Ident(ident))
            }
            _ => {
                self.bump();
                match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    '?' => Token::Question,
                    ':' => Token::Colon,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '*' => {
                        if self.eat('*') {
                            Token::StarStar
                        } else {
                            Token::Star
                        }
                    }
                    '&' => {
                        if self.eat('&') {
                            Token::And
                        } else {
                            return Err(ParseError::new("unexpected '&'; use '&&' or 'and'", offset));
                        }
                    }
                    '|' => {
                        if self.eat('|') {
                            Token::Or
                        } else {
                            return Err(ParseError::new("unexpected '|'; use '||' or 'or'", offset));
                        }
                    }
                    '!' => {
                        if self.eat('=') {
                            Token::NotEq
                        } else {
                            Token::Not
                        }
                    }
                    '=' => {
                        if self.eat('=') {
                            Token::EqEq
                        } else {
                            return Err(ParseError::new(
                                "unexpected '='; assignment is not supported, use '==' for equality",
                                offset,
                            ));
                        }
                    }
                    '<' => {
                        if self.eat('=') {
                            Token::Le
                        } else {
                            Token::Lt
                        }
                    }
                    '>' => {
                        if self.eat('=') {
                            Token::Ge
                        } else {
                            Token::Gt
                        }
                    }
                    other => {
                        return Err(ParseError::new(
                            format!("unexpected character '{}'", other),
                            offset,
                        ));
                    }
                }
            }
        };

        Ok(Some(Spanned { token, offset }))
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn lex_identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn lex_number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let mut is_float = false;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.bump();
                if sign {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(ParseError::new("invalid number literal", start));
        }

        let text = &self.src[start..self.pos];
        if !is_float {
            // Integers too large for i64 degrade to floats.
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::Int(i));
            }
        }
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ParseError::new(format!("invalid number literal '{}'", text), start))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(ParseError::new("unterminated string literal", start));
            };
            match ch {
                c if c == quote => return Ok(Token::Str(value)),
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(ParseError::new("unterminated string literal", start));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' | '"' | '\'' => value.push(escaped),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                other => value.push(other),
            }
        }
    }
}
