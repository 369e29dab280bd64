use std::fmt;
use std::ops::Range;

/// Token classification for source files.
///
/// Punctuation is carried as `Byte(b)` so callers can match `:`, `;`, `,`
/// and friends directly as token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Newline,
    Comment,
    CodeBlock,
    CodeInline,
    Anchor,
    Identifier,
    Eof,
    Byte(u8),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Whitespace => write!(f, "whitespace"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::CodeBlock => write!(f, "code block"),
            TokenKind::CodeInline => write!(f, "inline code"),
            TokenKind::Anchor => write!(f, "anchor"),
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Byte(b) => write!(f, "'{}'", *b as char),
        }
    }
}

/// A byte range into the source buffer being lexed. For comments the range
/// covers the bytes strictly between `<!--` and `-->`; for code tokens the
/// captured body; for anchors the whole `<a ...>...</a>` span.
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
}

impl Token {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Controls which token kinds the lexer silently discards, and whether
/// inline `<a>` tags are recognized as a distinct token kind.
///
/// The eat flags can be overridden per call; anchor recognition is a
/// property of the lexer itself and only consulted from its stored flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexerFlags {
    pub eat_whitespace: bool,
    pub eat_newline: bool,
    pub eat_comment: bool,
    pub anchors: bool,
}

impl LexerFlags {
    /// Nothing eaten, no anchor recognition.
    pub const NONE: LexerFlags = LexerFlags {
        eat_whitespace: false,
        eat_newline: false,
        eat_comment: false,
        anchors: false,
    };

    /// Whitespace eaten; used when scanning template and page files.
    pub const DEFAULT: LexerFlags = LexerFlags {
        eat_whitespace: true,
        ..LexerFlags::NONE
    };

    /// Whitespace and newlines eaten; used inside directive comments.
    pub const DIRECTIVE: LexerFlags = LexerFlags {
        eat_whitespace: true,
        eat_newline: true,
        ..LexerFlags::NONE
    };

    /// Nothing eaten, anchors recognized; used when scanning post bodies.
    pub const POST: LexerFlags = LexerFlags {
        anchors: true,
        ..LexerFlags::NONE
    };
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    at: usize,
    end: usize,
    name: &'a str,
    pub flags: LexerFlags,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, name: &'a str) -> Self {
        Self::with_flags(src, name, LexerFlags::DEFAULT)
    }

    pub fn with_flags(src: &'a str, name: &'a str, flags: LexerFlags) -> Self {
        Self {
            src,
            at: 0,
            end: src.len(),
            name,
            flags,
        }
    }

    /// A lexer constrained to a sub-range of `src`. Token offsets stay
    /// absolute into `src`, so section ranges computed from them line up
    /// with the parent buffer.
    pub fn slice(src: &'a str, range: Range<usize>, name: &'a str, flags: LexerFlags) -> Self {
        Self {
            src,
            at: range.start,
            end: range.end,
            name,
            flags,
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Current cursor position, in bytes from the start of `src`.
    pub fn pos(&self) -> usize {
        self.at
    }

    pub fn text(&self, token: &Token) -> &'a str {
        &self.src[token.range()]
    }

    fn byte(&self, at: usize) -> u8 {
        self.src.as_bytes()[at]
    }

    // Byte-wise so the cursor may sit inside a multi-byte character while
    // scanning comment, fence and anchor bodies.
    fn matches(&self, prefix: &str) -> bool {
        self.src.as_bytes()[self.at..self.end].starts_with(prefix.as_bytes())
    }

    pub fn next(&mut self) -> Token {
        self.next_with(self.flags)
    }

    /// One-token lookahead on a throwaway copy of the lexer state.
    pub fn peek(&self) -> Token {
        self.clone().next()
    }

    pub fn next_with(&mut self, flags: LexerFlags) -> Token {
        while self.at < self.end {
            let b = self.byte(self.at);

            if b == b' ' || b == b'\t' {
                let start = self.at;
                while self.at < self.end && matches!(self.byte(self.at), b' ' | b'\t') {
                    self.at += 1;
                }
                if !flags.eat_whitespace {
                    return self.token(TokenKind::Whitespace, start);
                }
            } else if b == b'\n' || b == b'\r' {
                let start = self.at;
                if self.byte(self.at) == b'\r' {
                    self.at += 1;
                }
                if self.at < self.end && self.byte(self.at) == b'\n' {
                    self.at += 1;
                }
                if !flags.eat_newline {
                    return self.token(TokenKind::Newline, start);
                }
            } else if self.matches("<!--") {
                self.at += 4;
                let start = self.at;
                let mut depth = 1;
                let mut body_end = None;

                while self.at < self.end {
                    if self.matches("-->") {
                        self.at += 3;
                        depth -= 1;
                        if depth == 0 {
                            body_end = Some(self.at - 3);
                            break;
                        }
                    } else if self.matches("<!--") {
                        self.at += 4;
                        depth += 1;
                    } else {
                        self.at += 1;
                    }
                }

                // Unterminated comments degrade to consuming the rest of
                // the input as the comment body.
                let len = body_end.unwrap_or(self.at) - start;
                if !flags.eat_comment {
                    return Token {
                        kind: TokenKind::Comment,
                        start,
                        len,
                    };
                }
            } else if self.matches("```") {
                self.at += 3;
                while self.at < self.end && matches!(self.byte(self.at), b' ' | b'\n' | b'\r') {
                    self.at += 1;
                }

                let start = self.at;
                while self.at < self.end && !self.matches("```") {
                    self.at += 1;
                }
                let len = self.at - start;

                if self.matches("```") {
                    self.at += 3;
                }
                return Token {
                    kind: TokenKind::CodeBlock,
                    start,
                    len,
                };
            } else if b == b'`' {
                self.at += 1;
                let start = self.at;
                while self.at < self.end && self.byte(self.at) != b'`' {
                    self.at += 1;
                }
                let len = self.at - start;

                if self.at < self.end {
                    self.at += 1;
                }
                return Token {
                    kind: TokenKind::CodeInline,
                    start,
                    len,
                };
            } else if self.flags.anchors && self.matches("<a") {
                let start = self.at;
                self.at += 1;
                while self.at < self.end {
                    if self.matches("</a>") {
                        self.at += 4;
                        break;
                    }
                    self.at += 1;
                }
                return self.token(TokenKind::Anchor, start);
            } else if is_identifier_byte(b) {
                let start = self.at;
                self.at += 1;
                while self.at < self.end && is_identifier_byte(self.byte(self.at)) {
                    self.at += 1;
                }
                return self.token(TokenKind::Identifier, start);
            } else {
                let start = self.at;
                self.at += 1;
                return self.token(TokenKind::Byte(b), start);
            }
        }

        Token {
            kind: TokenKind::Eof,
            start: self.end,
            len: 0,
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            start,
            len: self.at - start,
        }
    }
}

/// Bytes >= 128 are treated as identifier continuation so multi-byte text
/// lexes as identifiers and token boundaries stay on char boundaries.
fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b >= 128
}
