//! Quote-aware tokenization and sequential token consumption.
//!
//! Tokens split on whitespace; a `"..."` or `'...'` span keeps its internal
//! whitespace as one token. Backslash escapes are honored inside double
//! quotes. An unterminated quote is an error, surfaced to the user rather
//! than silently repaired.

use sable_types::SableError;

/// Split raw command input into tokens.
///
/// An empty quoted span (`""`) yields an empty token. An unterminated quote
/// fails with [`SableError::UnterminatedQuote`].
pub fn tokenize(input: &str) -> Result<Vec<String>, SableError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '"' | '\'' => {
                in_token = true;
                let quote = ch;
                loop {
                    match chars.next() {
                        Some('\\') if quote == '"' => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err(SableError::UnterminatedQuote),
                        },
                        Some(c) if c == quote => break,
                        Some(c) => current.push(c),
                        None => return Err(SableError::UnterminatedQuote),
                    }
                }
            }
            _ => {
                in_token = true;
                current.push(ch);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Sequential consumption over tokenized input, with one-token backtracking.
///
/// The dispatcher peeks the next token to decide whether it names a child
/// command; when it does not, [`Arguments::backtrack`] puts it back so the
/// token is bound as an argument instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arguments {
    tokens: Vec<String>,
    cursor: usize,
}

impl Arguments {
    /// Wrap already-tokenized input.
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens, cursor: 0 }
    }

    /// Tokenize raw input and wrap it.
    pub fn parse(input: &str) -> Result<Self, SableError> {
        Ok(Self::new(tokenize(input)?))
    }

    /// Consume and return the next token.
    pub fn next(&mut self) -> Option<&str> {
        let token = self.tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }

    /// Look at the next token without consuming it.
    pub fn peek(&self) -> Option<&str> {
        self.tokens.get(self.cursor).map(String::as_str)
    }

    /// Un-consume the most recently consumed token. Saturates at the start.
    pub fn backtrack(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// The tokens not yet consumed.
    pub fn remaining(&self) -> &[String] {
        &self.tokens[self.cursor..]
    }

    /// Consume and return all remaining tokens.
    pub fn drain_remaining(&mut self) -> Vec<String> {
        let rest = self.tokens[self.cursor..].to_vec();
        self.cursor = self.tokens.len();
        rest
    }

    /// Whether every token has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize("foo bar  baz").unwrap(), vec!["foo", "bar", "baz"]);
        assert_eq!(tokenize("  foo\tbar ").unwrap(), vec!["foo", "bar"]);
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn double_quotes_span_whitespace() {
        assert_eq!(
            tokenize(r#"foo "bar baz" qux"#).unwrap(),
            vec!["foo", "bar baz", "qux"]
        );
    }

    #[test]
    fn single_quotes_span_whitespace() {
        assert_eq!(
            tokenize("say 'hello there' now").unwrap(),
            vec!["say", "hello there", "now"]
        );
    }

    #[test]
    fn escaped_quote_inside_double_quotes() {
        assert_eq!(
            tokenize(r#"echo "say \"hi\"""#).unwrap(),
            vec!["echo", r#"say "hi""#]
        );
    }

    #[test]
    fn empty_quoted_token_preserved() {
        assert_eq!(tokenize(r#"cmd "" arg"#).unwrap(), vec!["cmd", "", "arg"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = tokenize(r#"cmd "unterminated"#).unwrap_err();
        assert!(matches!(err, SableError::UnterminatedQuote));

        let err = tokenize("cmd 'open").unwrap_err();
        assert!(matches!(err, SableError::UnterminatedQuote));
    }

    #[test]
    fn trailing_escape_in_quotes_is_an_error() {
        let err = tokenize(r#"cmd "oops\"#).unwrap_err();
        assert!(matches!(err, SableError::UnterminatedQuote));
    }

    #[test]
    fn cursor_next_peek_backtrack() {
        let mut args = Arguments::parse("one two three").unwrap();
        assert_eq!(args.peek(), Some("one"));
        assert_eq!(args.next(), Some("one"));
        assert_eq!(args.next(), Some("two"));

        args.backtrack();
        assert_eq!(args.peek(), Some("two"));
        assert_eq!(args.next(), Some("two"));

        assert_eq!(args.drain_remaining(), vec!["three"]);
        assert!(args.is_exhausted());
        assert_eq!(args.next(), None);
    }

    #[test]
    fn backtrack_saturates_at_start() {
        let mut args = Arguments::parse("only").unwrap();
        args.backtrack();
        args.backtrack();
        assert_eq!(args.next(), Some("only"));
    }
}
