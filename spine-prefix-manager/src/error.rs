//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

// Prefix manager errors.
#[derive(Debug)]
pub enum Error {
    InvalidNodeId(String),
    NoAreas,
    InvalidArea(String),
    UnknownArea(String),
    KvEntryDecode(String, serde_json::Error),
    KeyParse(String, KeyParseError),
}

// Prefix key parse errors.
#[derive(Debug, Eq, PartialEq)]
pub enum KeyParseError {
    UnknownMarker,
    MissingField,
    BadFormatVersion(u8),
    BadAddressFamily(u8),
    BadPrefixLength(u8),
    BadEncoding,
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::InvalidNodeId(name) => {
                error!(%name, "{}", self);
            }
            Error::NoAreas => {
                error!("{}", self);
            }
            Error::InvalidArea(area) | Error::UnknownArea(area) => {
                error!(%area, "{}", self);
            }
            Error::KvEntryDecode(key, error) => {
                warn!(%key, %error, "{}", self);
            }
            Error::KeyParse(key, error) => {
                warn!(%key, %error, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidNodeId(..) => {
                write!(f, "invalid node identifier")
            }
            Error::NoAreas => {
                write!(f, "no areas configured")
            }
            Error::InvalidArea(..) => {
                write!(f, "invalid area name")
            }
            Error::UnknownArea(..) => {
                write!(f, "reference to unknown area")
            }
            Error::KvEntryDecode(..) => {
                write!(f, "failed to decode key-value entry")
            }
            Error::KeyParse(..) => {
                write!(f, "failed to parse prefix key")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::KvEntryDecode(_, error) => Some(error),
            Error::KeyParse(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== impl KeyParseError =====

impl std::fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyParseError::UnknownMarker => {
                write!(f, "unknown key marker")
            }
            KeyParseError::MissingField => {
                write!(f, "missing key field")
            }
            KeyParseError::BadFormatVersion(version) => {
                write!(f, "unsupported format version: {}", version)
            }
            KeyParseError::BadAddressFamily(af) => {
                write!(f, "invalid address family: {}", af)
            }
            KeyParseError::BadPrefixLength(plen) => {
                write!(f, "invalid prefix length: {}", plen)
            }
            KeyParseError::BadEncoding => {
                write!(f, "malformed key encoding")
            }
        }
    }
}

impl std::error::Error for KeyParseError {}
