//! Typed identifiers for proposals, comments, and users.
//!
//! All three wrap a [`Uuid`]. Freshly minted proposal and comment ids are
//! `UUIDv7`, so their byte order follows creation order. Parsing accepts
//! only the canonical hyphenated form (`8-4-4-4-12` hex digits) and fails
//! with [`CivicError::Validation`] before anything touches the store.

use crate::error::CivicError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const CANONICAL_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

fn parse_canonical(field: &'static str, raw: &str) -> Result<Uuid, CivicError> {
    if raw.is_empty() {
        return Err(CivicError::validation(field, "must not be empty"));
    }
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == CANONICAL_LEN
        && HYPHEN_POSITIONS.iter().all(|&i| bytes[i] == b'-');
    if !shaped {
        return Err(CivicError::validation(
            field,
            format!("'{raw}' is not a hyphenated 36-character identifier"),
        ));
    }
    Uuid::try_parse(raw).map_err(|err| {
        CivicError::validation(field, format!("'{raw}' is not a valid identifier: {err}"))
    })
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Field name used in validation errors for this identifier.
            pub const FIELD: &'static str = $field;

            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse a caller-supplied identifier.
            ///
            /// # Errors
            ///
            /// Returns [`CivicError::Validation`] for anything other than the
            /// canonical hyphenated form.
            pub fn parse(raw: &str) -> Result<Self, CivicError> {
                parse_canonical(Self::FIELD, raw).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = CivicError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Identity of a proposal; `UUIDv7` so it embeds creation order.
    ProposalId,
    "proposal-id"
);
uuid_id!(
    /// Identity of a comment within its proposal partition.
    CommentId,
    "comment-id"
);
uuid_id!(
    /// Identity of a user as issued by the external session service.
    UserId,
    "user-id"
);

impl ProposalId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl CommentId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl UserId {
    /// The nil id stands for "no identity set".
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_form() {
        let raw = "6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e";
        let id: ProposalId = raw.parse().expect("canonical id parses");
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn uppercase_hex_is_accepted_and_normalized() {
        let id = CommentId::parse("6F1C2B9E-8D1A-4C8E-9A57-2F4A9B1C3D5E").expect("parse");
        assert_eq!(id.to_string(), "6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e");
    }

    #[test]
    fn rejects_non_canonical_shapes() {
        for raw in [
            "",
            "not-a-uuid",
            "6f1c2b9e8d1a4c8e9a572f4a9b1c3d5e",
            "{6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e}",
            "urn:uuid:6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e",
            "6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5z",
        ] {
            let err = ProposalId::parse(raw).expect_err("must reject");
            assert!(
                matches!(err, CivicError::Validation { field: "proposal-id", .. }),
                "unexpected error for {raw:?}: {err}"
            );
        }
    }

    #[test]
    fn generated_ids_follow_creation_order() {
        let ids: Vec<ProposalId> = (0..64).map(|_| ProposalId::generate()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn nil_user_id_means_unset() {
        assert!(UserId::from_uuid(Uuid::nil()).is_nil());
        assert!(!UserId::parse("6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e").expect("parse").is_nil());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = UserId::parse("6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e").expect("parse");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"6f1c2b9e-8d1a-4c8e-9a57-2f4a9b1c3d5e\"");
    }
}
