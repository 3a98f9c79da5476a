//! The snapshot token stream: an opcode-driven state machine over the
//! byte-level primitives.
//!
//! The grammar has three states. `Start` emits the file envelope and moves
//! to `Init`, where auxiliary fields are allowed and a database selector
//! opens the first section. Inside a section (`InDb`) the decoder accepts
//! further selectors, one resize hint per section, expiry-tagged keys, and
//! plain keys, until the EOF opcode terminates the stream. Any opcode seen
//! outside its legal state is a fatal protocol error.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::model::key::{Key, Value};
use crate::rdb::{intset, opcode, reader, value_type, ziplist, zipmap};

/// One element of the snapshot token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// The file envelope; always the first token.
    Magic { version: u32 },
    /// A file-scoped auxiliary field (server version, creation time, ...).
    Aux { key: Bytes, value: Bytes },
    /// Opens a database section.
    SelectDb(u32),
    /// Hash-table sizing hint for the current section.
    ResizeDb { main: u32, expires: u32 },
    /// A decoded key, annotated with the database it belongs to.
    Key(Key),
    /// End of stream; always the last token. The checksum is surfaced but
    /// not verified.
    Eof { checksum: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Init,
    InDb,
    Done,
}

/// Streaming snapshot decoder.
///
/// Two consumption modes: [`next_token`](Self::next_token) surfaces every
/// structural token, while [`next_key`](Self::next_key) consumes structural
/// tokens internally and yields only data keys. Both return `None` once the
/// EOF token has been emitted.
#[derive(Debug)]
pub struct Decoder<R> {
    input: R,
    state: State,
    current_db: u32,
    resize_seen: bool,
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            state: State::Start,
            current_db: 0,
            resize_seen: false,
        }
    }

    /// The next token of the stream, or `None` after EOF.
    pub async fn next_token(&mut self) -> Result<Option<Token>> {
        match self.state {
            State::Start => {
                let version = reader::read_magic(&mut self.input).await?;
                self.state = State::Init;
                return Ok(Some(Token::Magic { version }));
            }
            State::Done => return Ok(None),
            State::Init | State::InDb => {}
        }

        let op = self.input.read_u8().await?;
        match op {
            opcode::AUX => {
                self.expect_state(op, &[State::Init])?;
                let key = reader::read_string(&mut self.input).await?;
                let value = reader::read_string(&mut self.input).await?;
                Ok(Some(Token::Aux { key, value }))
            }
            opcode::SELECTDB => {
                self.expect_state(op, &[State::Init, State::InDb])?;
                let db = reader::read_plain_length(&mut self.input).await?;
                self.state = State::InDb;
                self.current_db = db;
                self.resize_seen = false;
                Ok(Some(Token::SelectDb(db)))
            }
            opcode::RESIZEDB => {
                self.expect_state(op, &[State::InDb])?;
                if self.resize_seen {
                    return Err(Error::protocol("duplicate resize hint in database section"));
                }
                self.resize_seen = true;
                let main = reader::read_plain_length(&mut self.input).await?;
                let expires = reader::read_plain_length(&mut self.input).await?;
                Ok(Some(Token::ResizeDb { main, expires }))
            }
            opcode::EXPIRY_SECONDS | opcode::EXPIRY_MS => {
                self.expect_state(op, &[State::InDb])?;
                let expire_ms = reader::read_expiry(&mut self.input, op).await?;
                // The expiry attaches to the key introduced by the very next
                // opcode, which must be a value type.
                let next = self.input.read_u8().await?;
                if next >= opcode::AUX {
                    return Err(Error::protocol(format!(
                        "expiry followed by structural opcode {next:#04x}"
                    )));
                }
                let key = self.read_key(next, Some(expire_ms)).await?;
                Ok(Some(Token::Key(key)))
            }
            opcode::EOF => {
                self.expect_state(op, &[State::Init, State::InDb])?;
                let checksum = reader::read_checksum(&mut self.input).await?;
                self.state = State::Done;
                Ok(Some(Token::Eof { checksum }))
            }
            value_op => {
                self.expect_state(value_op, &[State::InDb])?;
                let key = self.read_key(value_op, None).await?;
                Ok(Some(Token::Key(key)))
            }
        }
    }

    /// The next data key, or `None` once the stream ends. Structural tokens
    /// are consumed internally; keys carry the database index of the
    /// section they appeared in.
    pub async fn next_key(&mut self) -> Result<Option<Key>> {
        loop {
            match self.next_token().await? {
                Some(Token::Key(key)) => return Ok(Some(key)),
                Some(Token::Eof { .. }) | None => return Ok(None),
                Some(_) => continue,
            }
        }
    }

    fn expect_state(&self, op: u8, allowed: &[State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::protocol(format!(
                "opcode {op:#04x} not valid in state {:?}",
                self.state
            )))
        }
    }

    async fn read_key(&mut self, op: u8, expire_ms: Option<u64>) -> Result<Key> {
        let name = reader::read_string(&mut self.input).await?;
        let value = self.read_value(op).await?;
        Ok(Key {
            db: self.current_db,
            name,
            // A zero expiry means no expiry at all.
            expire_ms: expire_ms.filter(|&ms| ms != 0),
            value,
        })
    }

    async fn read_value(&mut self, op: u8) -> Result<Value> {
        match op {
            value_type::STRING => {
                let value = reader::read_string(&mut self.input).await?;
                Ok(Value::String(value))
            }
            value_type::LIST => {
                let count = reader::read_plain_length(&mut self.input).await?;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(reader::read_string(&mut self.input).await?);
                }
                Ok(Value::List(items))
            }
            value_type::SET => {
                let count = reader::read_plain_length(&mut self.input).await?;
                let mut members = HashSet::with_capacity(count as usize);
                for _ in 0..count {
                    members.insert(reader::read_string(&mut self.input).await?);
                }
                Ok(Value::Set(members))
            }
            value_type::SORTED_SET => {
                let count = reader::read_plain_length(&mut self.input).await?;
                let mut members = HashMap::with_capacity(count as usize);
                for _ in 0..count {
                    let member = reader::read_string(&mut self.input).await?;
                    let score = reader::read_double(&mut self.input).await?;
                    members.insert(member, score);
                }
                Ok(Value::SortedSet(members))
            }
            value_type::HASH => {
                let count = reader::read_plain_length(&mut self.input).await?;
                let mut fields = HashMap::with_capacity(count as usize);
                for _ in 0..count {
                    let field = reader::read_string(&mut self.input).await?;
                    let value = reader::read_string(&mut self.input).await?;
                    fields.insert(field, value);
                }
                Ok(Value::Hash(fields))
            }
            value_type::HASH_ZIPMAP => {
                let blob = reader::read_string(&mut self.input).await?;
                Ok(Value::Hash(zipmap::fields(&blob)?))
            }
            value_type::LIST_ZIPLIST => {
                let blob = reader::read_string(&mut self.input).await?;
                Ok(Value::List(ziplist::entries(&blob)?))
            }
            value_type::SET_INTSET => {
                let blob = reader::read_string(&mut self.input).await?;
                Ok(Value::IntegerSet(intset::members(&blob)?))
            }
            value_type::SORTED_SET_ZIPLIST => {
                let blob = reader::read_string(&mut self.input).await?;
                let mut members = HashMap::new();
                for (member, score) in ziplist::pairs(&blob)? {
                    members.insert(member, parse_score(&score)?);
                }
                Ok(Value::SortedSet(members))
            }
            value_type::HASH_ZIPLIST => {
                let blob = reader::read_string(&mut self.input).await?;
                let mut fields = HashMap::new();
                for (field, value) in ziplist::pairs(&blob)? {
                    fields.insert(field, value);
                }
                Ok(Value::Hash(fields))
            }
            value_type::LIST_QUICKLIST => {
                let count = reader::read_plain_length(&mut self.input).await?;
                let mut items = Vec::new();
                for _ in 0..count {
                    let blob = reader::read_string(&mut self.input).await?;
                    items.extend(ziplist::entries(&blob)?);
                }
                Ok(Value::List(items))
            }
            other => Err(Error::protocol(format!(
                "unknown value opcode {other:#04x}"
            ))),
        }
    }
}

/// Sorted-set scores inside ziplists are ASCII decimals.
fn parse_score(raw: &[u8]) -> Result<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| {
            Error::protocol(format!(
                "invalid sorted-set score {:?}",
                String::from_utf8_lossy(raw)
            ))
        })
}
