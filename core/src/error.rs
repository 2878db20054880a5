use thiserror::Error;

/// Failure modes when decoding a `threat://` resource address.
///
/// Both variants are caller errors: the address itself is unusable, so
/// retrying the same read cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address is malformed or uses a scheme other than `threat`.
    #[error("unsupported resource address '{0}'")]
    InvalidAddress(String),
    /// The kind segment names a category outside report/actor/source.
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),
}

impl AddressError {
    /// Machine-readable code used when rendering the error as JSON.
    pub fn code(&self) -> &'static str {
        match self {
            AddressError::InvalidAddress(_) => "invalid_address",
            AddressError::UnknownResourceType(_) => "unknown_resource_type",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_messages_name_the_offending_input() {
        let err = AddressError::InvalidAddress("foo://report/1".to_string());
        assert_eq!(err.code(), "invalid_address");
        assert_eq!(err.to_string(), "unsupported resource address 'foo://report/1'");

        let err = AddressError::UnknownResourceType("widget".to_string());
        assert_eq!(err.code(), "unknown_resource_type");
        assert_eq!(err.to_string(), "unknown resource type 'widget'");
    }
}
