use std::fmt;

use crate::entity::EntityKind;
use crate::error::AddressError;

/// URI scheme under which cached catalog entities are addressable.
pub const SCHEME: &str = "threat";

/// Canonical address of one cached catalog entity: `threat://<kind>/<id>`.
///
/// Addresses round-trip losslessly. The kind segment ends at the first
/// slash, so an id may itself contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    pub kind: EntityKind,
    pub id: String,
}

impl ResourceAddress {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    /// Decode a `threat://<kind>/<id>` address.
    ///
    /// A wrong scheme or missing segment is `InvalidAddress`; a kind segment
    /// outside the closed set is `UnknownResourceType`.
    pub fn parse(uri: &str) -> Result<Self, AddressError> {
        let rest = uri
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| AddressError::InvalidAddress(uri.to_string()))?;
        let (kind, id) = rest
            .split_once('/')
            .ok_or_else(|| AddressError::InvalidAddress(uri.to_string()))?;
        if id.is_empty() {
            return Err(AddressError::InvalidAddress(uri.to_string()));
        }
        let kind = EntityKind::parse(kind)
            .ok_or_else(|| AddressError::UnknownResourceType(kind.to_string()))?;
        Ok(Self {
            kind,
            id: id.to_string(),
        })
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_round_trip_for_every_kind() {
        for kind in EntityKind::ALL {
            let address = ResourceAddress::new(kind, "e5b9d54f");
            let parsed = ResourceAddress::parse(&address.to_string()).unwrap();
            assert_eq!(parsed, address);
        }
    }

    #[test]
    fn id_may_contain_slashes() {
        let address = ResourceAddress::parse("threat://report/2024/q3/r1").unwrap();
        assert_eq!(address.kind, EntityKind::Report);
        assert_eq!(address.id, "2024/q3/r1");
        assert_eq!(address.to_string(), "threat://report/2024/q3/r1");
    }

    #[test]
    fn foreign_scheme_is_invalid() {
        let err = ResourceAddress::parse("foo://report/1").unwrap_err();
        assert_eq!(err, AddressError::InvalidAddress("foo://report/1".to_string()));
    }

    #[test]
    fn unknown_kind_segment_is_rejected() {
        let err = ResourceAddress::parse("threat://widget/1").unwrap_err();
        assert_eq!(err, AddressError::UnknownResourceType("widget".to_string()));
    }

    #[test]
    fn missing_segments_are_invalid() {
        for uri in ["threat://report", "threat://report/", "threat:/report/1", "threat"] {
            let err = ResourceAddress::parse(uri).unwrap_err();
            assert_eq!(err, AddressError::InvalidAddress(uri.to_string()), "uri: {uri}");
        }
    }
}
