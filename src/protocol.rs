// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The wire protocol: JSON frames exchanged between a connection actor and
//! its transport. `Cmd` is tagged by small integers on the wire (not
//! strings), mirroring `internal/msgs/msgs.go` and the `Op` union encoding
//! in `ot/ot.go`'s `MarshalJSON`/`UnmarshalJSON`.

use crate::ot::Ops;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A per-connection handle binding one open of one document to one
/// connection. Allocation is monotonically increasing per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(pub u64);

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Fd {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Fd {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(u64::deserialize(deserializer)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    Nil,
    Open,
    OpenResp,
    Write,
    WriteResp,
}

impl Cmd {
    const fn tag(self) -> u8 {
        match self {
            Self::Nil => 0,
            Self::Open => 1,
            Self::OpenResp => 2,
            Self::Write => 3,
            Self::WriteResp => 4,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Nil),
            1 => Some(Self::Open),
            2 => Some(Self::OpenResp),
            3 => Some(Self::Write),
            4 => Some(Self::WriteResp),
            _ => None,
        }
    }
}

impl Serialize for Cmd {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.tag())
    }
}

impl<'de> Deserialize<'de> for Cmd {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = u8::deserialize(deserializer)?;
        Self::from_tag(tag).ok_or_else(|| serde::de::Error::custom(format!("unknown Cmd tag {tag}")))
    }
}

/// A single frame on the wire. Absent optional fields are omitted from the
/// serialized JSON rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msg {
    #[serde(rename = "Cmd")]
    pub cmd: Cmd,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(rename = "Fd", skip_serializing_if = "Option::is_none", default)]
    pub fd: Option<Fd>,
    #[serde(rename = "Rev", skip_serializing_if = "Option::is_none", default)]
    pub rev: Option<u64>,
    #[serde(rename = "Hash", skip_serializing_if = "Option::is_none", default)]
    pub hash: Option<String>,
    #[serde(rename = "Ops", skip_serializing_if = "Option::is_none", default)]
    pub ops: Option<Ops>,
}

impl Msg {
    #[must_use]
    pub const fn open(name: String, rev: u64) -> Self {
        Self { cmd: Cmd::Open, name: Some(name), fd: None, rev: Some(rev), hash: None, ops: None }
    }

    #[must_use]
    pub const fn open_resp(name: String, fd: Fd) -> Self {
        Self { cmd: Cmd::OpenResp, name: Some(name), fd: Some(fd), rev: None, hash: None, ops: None }
    }

    #[must_use]
    pub const fn write(fd: Fd, rev: u64, hash: Option<String>, ops: Ops) -> Self {
        Self { cmd: Cmd::Write, name: None, fd: Some(fd), rev: Some(rev), hash, ops: Some(ops) }
    }

    #[must_use]
    pub const fn write_resp(fd: Fd, rev: u64, ops: Ops) -> Self {
        Self { cmd: Cmd::WriteResp, name: None, fd: Some(fd), rev: Some(rev), hash: None, ops: Some(ops) }
    }
}
