//! Content-stream tokenizer.
//!
//! Turns an operand/operator byte sequence into a flat list of
//! [`CosObject`]s, where operators are [`CosObject::Operator`]. The inline
//! image triplet `BI <params> ID <bytes> EI` becomes a single `BI` operator
//! carrying the parameter dictionary and a substream over the raw bytes.

use super::lexer::{self, Token};
use super::object_reader::ObjectReader;
use crate::config::ReaderOptions;
use crate::error::{PdfError, Result};
use crate::io::SeekableStream;
use crate::model::objects::{CosObject, Dict};
use crate::model::operator::{InlineImage, Keyword, Operator};

/// Outcome of one tokenizer step.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseStep {
    /// An object or operator.
    Token(CosObject),
    /// A byte that cannot start any token; it has been consumed.
    Corrupted { offset: u64, byte: u8 },
    /// End of input.
    End,
}

/// Tokenizer over a content stream.
pub struct ContentTokenizer {
    reader: ObjectReader,
    tokens: Vec<CosObject>,
    image_data_streams: Vec<SeekableStream>,
    corruption_offset: Option<u64>,
    finished: bool,
    /// Set while the parameters of an inline image are being read.
    in_image_params: bool,
}

impl ContentTokenizer {
    pub fn new(source: SeekableStream) -> Self {
        Self::with_options(source, &ReaderOptions::default())
    }

    pub fn with_options(source: SeekableStream, options: &ReaderOptions) -> Self {
        Self {
            reader: ObjectReader::new(source).with_max_nesting_depth(options.max_nesting_depth),
            tokens: Vec::new(),
            image_data_streams: Vec::new(),
            corruption_offset: None,
            finished: false,
            in_image_params: false,
        }
    }

    pub fn from_bytes(data: impl Into<bytes::Bytes>) -> Self {
        Self::new(SeekableStream::from_bytes(data))
    }

    /// Tokenize the rest of the stream into [`Self::tokens`].
    pub fn parse_tokens(&mut self) -> Result<()> {
        while let Some(token) = self.parse_next_token()? {
            self.tokens.push(token);
        }
        Ok(())
    }

    /// Tokens collected by [`Self::parse_tokens`].
    pub fn tokens(&self) -> &[CosObject] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<CosObject> {
        self.tokens
    }

    /// Lazy view over the remaining tokens. Tokens it yields are not added
    /// to [`Self::tokens`].
    pub fn tokens_iter(&mut self) -> TokenIter<'_> {
        TokenIter { tokenizer: self }
    }

    /// Offset where tokenizing stopped on a byte that starts no token.
    pub fn corruption_offset(&self) -> Option<u64> {
        self.corruption_offset
    }

    /// Raw-data substreams of every inline image produced so far.
    pub fn image_data_streams(&self) -> &[SeekableStream] {
        &self.image_data_streams
    }

    /// Close the tracked inline-image substreams.
    pub fn close_image_data_streams(&mut self) {
        for stream in &mut self.image_data_streams {
            stream.close();
        }
        self.image_data_streams.clear();
    }

    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    /// Move past whitespace and comments, so that [`Self::offset`] is where
    /// the next token starts.
    pub fn skip_whitespace(&mut self) -> Result<()> {
        self.reader.lexer().skip_whitespace()
    }

    /// Next token, or `None` at end of input. A byte that starts no token
    /// ends tokenizing; see [`Self::corruption_offset`].
    pub fn parse_next_token(&mut self) -> Result<Option<CosObject>> {
        if self.finished {
            return Ok(None);
        }
        match self.next_step()? {
            ParseStep::Token(token) => Ok(Some(token)),
            ParseStep::Corrupted { offset, byte } => {
                tracing::debug!(
                    offset,
                    byte = %char::from(byte),
                    "empty operator in content stream, stopping"
                );
                self.corruption_offset = Some(offset);
                self.finished = true;
                Ok(None)
            }
            ParseStep::End => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// One step of the tokenizer. Unlike [`Self::parse_next_token`] this keeps
    /// going after corrupted bytes.
    pub fn next_step(&mut self) -> Result<ParseStep> {
        self.reader.lexer().skip_whitespace()?;
        let offset = self.offset();
        let Some(b) = self.reader.lexer().peek()? else {
            return Ok(ParseStep::End);
        };

        let token = match b {
            b'<' => {
                let source = self.reader.source_mut();
                source.next_byte()?;
                let is_dict = source.peek()? == Some(b'<');
                source.unread();
                if is_dict {
                    CosObject::Dict(self.reader.read_dictionary()?)
                } else {
                    CosObject::String(self.reader.lexer().read_hex_string()?)
                }
            }
            b'[' => CosObject::Array(self.reader.read_array()?),
            b'(' => CosObject::String(self.reader.lexer().read_literal_string()?),
            b'/' => CosObject::Name(self.reader.read_name()?),
            b'n' => {
                let word = self.reader.lexer().read_until_delimiter()?;
                if word == b"null" {
                    CosObject::Null
                } else {
                    Operator::from_bytes(&word).into()
                }
            }
            b't' | b'f' => {
                let word = self.reader.lexer().read_until_delimiter()?;
                match word.as_slice() {
                    b"true" => CosObject::Bool(true),
                    b"false" => CosObject::Bool(false),
                    _ => Operator::from_bytes(&word).into(),
                }
            }
            b'0'..=b'9' | b'.' | b'-' | b'+' => match self.reader.lexer().read_number()? {
                Token::Int(n) => CosObject::Int(n),
                Token::Real(n) => CosObject::Real(n),
                other => {
                    return Err(PdfError::syntax(
                        offset,
                        format!("expected number, got {other:?}"),
                    ));
                }
            },
            b'B' => {
                let word = self.reader.lexer().read_until_delimiter()?;
                let keyword = Keyword::from_bytes(&word);
                if keyword == Keyword::BI {
                    if self.in_image_params {
                        return Err(PdfError::syntax(offset, "BI inside inline image parameters"));
                    }
                    self.read_inline_image()?.into()
                } else {
                    Operator::new(keyword).into()
                }
            }
            b'I' => self.read_image_data()?.into(),
            _ => {
                let word = self.next_operator()?;
                if word.is_empty() {
                    self.reader.source_mut().next_byte()?;
                    return Ok(ParseStep::Corrupted { offset, byte: b });
                }
                Operator::from_bytes(&word).into()
            }
        };
        Ok(ParseStep::Token(token))
    }

    /// Scan a bare operator name. Stops at whitespace, `]`, `[`, `<`, `(`,
    /// `/` or a digit, except that `d0` and `d1` are read whole.
    pub fn next_operator(&mut self) -> Result<Vec<u8>> {
        self.reader.lexer().skip_whitespace()?;
        let source = self.reader.source_mut();
        let mut word = Vec::new();
        while let Some(b) = source.peek()? {
            if lexer::is_whitespace(b)
                || matches!(b, b']' | b'[' | b'<' | b'(' | b'/')
                || b.is_ascii_digit()
            {
                break;
            }
            source.next_byte()?;
            word.push(b);
            if b == b'd' && word.len() == 1 {
                if let Some(digit @ (b'0' | b'1')) = source.peek()? {
                    source.next_byte()?;
                    word.push(digit);
                    break;
                }
            }
        }
        Ok(word)
    }

    /// After `BI`: name/value pairs up to the `ID` operator.
    fn read_inline_image(&mut self) -> Result<Operator> {
        self.in_image_params = true;
        let image = self.read_image_params();
        self.in_image_params = false;
        image
    }

    fn read_image_params(&mut self) -> Result<Operator> {
        let mut params = Dict::new();
        let mut next = self.parse_image_token()?;

        let data = loop {
            match next {
                Some(CosObject::Name(key)) => match self.parse_image_token()? {
                    Some(CosObject::Operator(mut op)) if *op.keyword() == Keyword::ID => {
                        tracing::debug!(key = %key, "inline image parameter without value");
                        break op.take_image().and_then(|image| image.data);
                    }
                    Some(CosObject::Operator(op)) => {
                        tracing::debug!(
                            key = %key,
                            value = %op,
                            "skipping operator in inline image parameters"
                        );
                    }
                    Some(value) => {
                        params.insert(key, value);
                    }
                    None => return Err(PdfError::UnexpectedEof),
                },
                Some(CosObject::Operator(mut op)) if *op.keyword() == Keyword::ID => {
                    break op.take_image().and_then(|image| image.data);
                }
                Some(other) => {
                    return Err(PdfError::syntax(
                        self.offset(),
                        format!(
                            "expected inline image data operator, got {}",
                            other.type_name()
                        ),
                    ));
                }
                None => return Err(PdfError::UnexpectedEof),
            }
            next = self.parse_image_token()?;
        };

        Ok(Operator::with_image(Keyword::BI, InlineImage { params, data }))
    }

    fn parse_image_token(&mut self) -> Result<Option<CosObject>> {
        loop {
            match self.next_step()? {
                ParseStep::Token(token) => return Ok(Some(token)),
                ParseStep::Corrupted { offset, byte } => {
                    tracing::debug!(
                        offset,
                        byte = %char::from(byte),
                        "skipping stray byte in inline image parameters"
                    );
                }
                ParseStep::End => return Ok(None),
            }
        }
    }

    /// `ID`, one whitespace byte, then raw bytes up to `EI` or end of input.
    fn read_image_data(&mut self) -> Result<Operator> {
        let lex = self.reader.lexer();
        lex.expect_byte(b'I')?;
        lex.expect_byte(b'D')?;

        let source = self.reader.source_mut();
        if source.peek()?.is_some_and(lexer::is_whitespace) {
            source.next_byte()?;
        }

        let start = source.offset();
        let mut prev = None;
        let end = loop {
            match source.next_byte()? {
                None => break source.offset(),
                Some(b'I') if prev == Some(b'E') => break source.offset() - 2,
                Some(b) => prev = Some(b),
            }
        };

        let data = source.substream(start, end - start)?;
        self.image_data_streams.push(data.share()?);
        Ok(Operator::with_image(
            Keyword::ID,
            InlineImage {
                params: Dict::new(),
                data: Some(data),
            },
        ))
    }
}

/// Lazy, single-pass token sequence. Yields `None` once the stream is
/// exhausted or after the first error.
pub struct TokenIter<'a> {
    tokenizer: &'a mut ContentTokenizer,
}

impl Iterator for TokenIter<'_> {
    type Item = Result<CosObject>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.tokenizer.parse_next_token() {
            Ok(token) => token.map(Ok),
            Err(err) => {
                self.tokenizer.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for TokenIter<'_> {}
