//! The command entity: one argv-style command from the live stream, plus the
//! classifier mapping its head to a known verb.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::model::key::{Key, Value};

/// The verbs the replication client recognizes.
///
/// `Rdb` is synthetic: the RESP layer produces it when the master announces
/// the snapshot payload with a top-level bulk-string header. Anything not in
/// the table classifies as `Undefined`; an empty argv or a blank head is
/// `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Select,
    ZAdd,
    SAdd,
    ZRem,
    Del,
    Rdb,
    Undefined,
    Empty,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CommandKind::Ping => "ping",
            CommandKind::Select => "select",
            CommandKind::ZAdd => "zadd",
            CommandKind::SAdd => "sadd",
            CommandKind::ZRem => "zrem",
            CommandKind::Del => "delete",
            CommandKind::Rdb => "rdb",
            CommandKind::Undefined => "undefined",
            CommandKind::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// An argv-style command: an ordered list of byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Wrap an argv.
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// Build a command from string-ish arguments; test and fixture sugar.
    pub fn from_args<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        Self::new(args.into_iter().map(Into::into).collect())
    }

    /// The raw argv.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// True when the argv is empty.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Classify the command by its head, lowercased and trimmed.
    pub fn kind(&self) -> CommandKind {
        let Some(head) = self.args.first() else {
            return CommandKind::Empty;
        };
        match trimmed_lower(head).as_slice() {
            b"" => CommandKind::Empty,
            b"ping" => CommandKind::Ping,
            b"select" => CommandKind::Select,
            b"zadd" => CommandKind::ZAdd,
            b"sadd" => CommandKind::SAdd,
            b"zrem" => CommandKind::ZRem,
            b"delete" | b"del" => CommandKind::Del,
            b"rdb" => CommandKind::Rdb,
            _ => CommandKind::Undefined,
        }
    }

    /// The key name for commands that carry one (del, zrem, zadd, sadd).
    pub fn key_name(&self) -> Result<&Bytes> {
        if self.args.len() < 2 {
            return Err(Error::protocol(format!(
                "expected at least 2 args but got {}",
                self.args.len()
            )));
        }
        match self.kind() {
            CommandKind::Del | CommandKind::ZRem | CommandKind::ZAdd | CommandKind::SAdd => {
                Ok(&self.args[1])
            }
            other => Err(Error::protocol(format!(
                "command {other} does not carry a key name"
            ))),
        }
    }

    /// The member list of a zrem command.
    pub fn members(&self) -> Result<&[Bytes]> {
        if self.args.len() < 3 {
            return Err(Error::protocol(format!(
                "expected at least 3 args but got {}",
                self.args.len()
            )));
        }
        match self.kind() {
            CommandKind::ZRem => Ok(&self.args[2..]),
            other => Err(Error::protocol(format!(
                "command {other} does not carry members"
            ))),
        }
    }

    /// Convert a select command into the database index it targets.
    pub fn db_index(&self) -> Result<u32> {
        if self.args.len() < 2 {
            return Err(Error::protocol(format!(
                "expected at least 2 args but got {}",
                self.args.len()
            )));
        }
        let kind = self.kind();
        if kind != CommandKind::Select {
            return Err(Error::protocol(format!(
                "expected select command but got {kind}"
            )));
        }
        parse_ascii::<u32>(&self.args[1])
            .ok_or_else(|| Error::protocol("select argument is not a database index"))
    }

    /// Convert a synthetic rdb command into the announced snapshot length.
    pub fn snapshot_len(&self) -> Result<u64> {
        if self.args.len() < 2 {
            return Err(Error::protocol(format!(
                "expected at least 2 args but got {}",
                self.args.len()
            )));
        }
        let kind = self.kind();
        if kind != CommandKind::Rdb {
            return Err(Error::protocol(format!(
                "expected rdb command but got {kind}"
            )));
        }
        parse_ascii::<u64>(&self.args[1])
            .ok_or_else(|| Error::protocol("rdb argument is not a length"))
    }

    /// Convert a zadd command into a sorted-set key for the given database.
    ///
    /// Argv layout is `zadd name score member [score member ...]`, so the
    /// total argument count must be even.
    pub fn into_sorted_set_key(self, db: u32) -> Result<Key> {
        if self.args.len() < 4 {
            return Err(Error::protocol(format!(
                "expected at least 4 args but got {}",
                self.args.len()
            )));
        }
        if self.args.len() % 2 != 0 {
            return Err(Error::protocol("expected even arg count but got odd"));
        }
        let kind = self.kind();
        if kind != CommandKind::ZAdd {
            return Err(Error::protocol(format!(
                "expected zadd command but got {kind}"
            )));
        }
        let mut members = HashMap::new();
        for pair in self.args[2..].chunks(2) {
            let score = parse_ascii::<f64>(&pair[0])
                .ok_or_else(|| Error::protocol("zadd score is not a number"))?;
            members.insert(pair[1].clone(), score);
        }
        Ok(Key::new(self.args[1].clone(), Value::SortedSet(members)).with_db(db))
    }

    /// Convert a sadd command into a set key for the given database.
    pub fn into_set_key(self, db: u32) -> Result<Key> {
        if self.args.len() < 3 {
            return Err(Error::protocol(format!(
                "expected at least 3 args but got {}",
                self.args.len()
            )));
        }
        let kind = self.kind();
        if kind != CommandKind::SAdd {
            return Err(Error::protocol(format!(
                "expected sadd command but got {kind}"
            )));
        }
        let members: HashSet<Bytes> = self.args[2..].iter().cloned().collect();
        Ok(Key::new(self.args[1].clone(), Value::Set(members)).with_db(db))
    }
}

/// Lowercase a byte string with leading and trailing ASCII whitespace
/// removed.
fn trimmed_lower(raw: &[u8]) -> Vec<u8> {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    raw[start..end].to_ascii_lowercase()
}

/// Parse an ASCII decimal argument, tolerating surrounding whitespace.
fn parse_ascii<T: std::str::FromStr>(raw: &[u8]) -> Option<T> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ping_case_and_whitespace() {
        for head in ["PING", "ping", "  Ping  "] {
            let cmd = Command::from_args([head]);
            assert_eq!(cmd.kind(), CommandKind::Ping, "head {head:?}");
        }
    }

    #[test]
    fn test_kind_table() {
        let cases = [
            ("SELECT", CommandKind::Select),
            ("zadd", CommandKind::ZAdd),
            ("SAdd", CommandKind::SAdd),
            ("ZREM", CommandKind::ZRem),
            ("delete", CommandKind::Del),
            ("del", CommandKind::Del),
            ("rdb", CommandKind::Rdb),
            ("TEST123", CommandKind::Undefined),
        ];
        for (head, expected) in cases {
            assert_eq!(Command::from_args([head]).kind(), expected, "head {head:?}");
        }
    }

    #[test]
    fn test_kind_empty() {
        assert_eq!(Command::default().kind(), CommandKind::Empty);
        assert_eq!(Command::from_args(["   "]).kind(), CommandKind::Empty);
    }

    #[test]
    fn test_db_index() {
        let cmd = Command::from_args(["SELECT", "10"]);
        assert_eq!(cmd.db_index().unwrap(), 10);
    }

    #[test]
    fn test_db_index_too_few_args() {
        assert!(Command::from_args(["select"]).db_index().is_err());
    }

    #[test]
    fn test_db_index_wrong_kind() {
        assert!(Command::from_args(["PING", "1"]).db_index().is_err());
    }

    #[test]
    fn test_db_index_not_a_number() {
        assert!(Command::from_args(["select", "abc"]).db_index().is_err());
    }

    #[test]
    fn test_snapshot_len() {
        let cmd = Command::from_args(["rdb", "1024"]);
        assert_eq!(cmd.snapshot_len().unwrap(), 1024);
        assert!(Command::from_args(["rdb"]).snapshot_len().is_err());
        assert!(Command::from_args(["ping", "1024"]).snapshot_len().is_err());
    }

    #[test]
    fn test_key_name() {
        let cmd = Command::from_args(["DEL", "user:1"]);
        assert_eq!(cmd.key_name().unwrap(), &Bytes::from("user:1"));
        assert!(Command::from_args(["PING", "x"]).key_name().is_err());
    }

    #[test]
    fn test_into_sorted_set_key() {
        let cmd = Command::from_args(["ZADD", "board", "1.5", "alice", "2", "bob"]);
        let key = cmd.into_sorted_set_key(3).unwrap();
        assert_eq!(key.db, 3);
        assert_eq!(key.name, Bytes::from("board"));
        let members = key.value.as_sorted_set().unwrap();
        assert_eq!(members[&Bytes::from("alice")], 1.5);
        assert_eq!(members[&Bytes::from("bob")], 2.0);
    }

    #[test]
    fn test_into_sorted_set_key_odd_args() {
        let cmd = Command::from_args(["ZADD", "board", "1.5", "alice", "2"]);
        assert!(cmd.into_sorted_set_key(0).is_err());
    }

    #[test]
    fn test_into_set_key() {
        let cmd = Command::from_args(["SADD", "tags", "a", "b", "a"]);
        let key = cmd.into_set_key(1).unwrap();
        let members = key.value.as_set().unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.contains(&Bytes::from("a")));
    }

    #[test]
    fn test_zrem_members() {
        let cmd = Command::from_args(["zrem", "board", "alice", "bob"]);
        assert_eq!(cmd.members().unwrap().len(), 2);
        assert!(Command::from_args(["zrem", "board"]).members().is_err());
    }
}
