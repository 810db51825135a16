use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an account address string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with '0x'")]
    InvalidPrefix,
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("address payload must be exactly 20 bytes")]
    InvalidPayloadLength,
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 20;
/// Expected string length of an encoded address (`0x` + 40 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 2 + ADDRESS_BYTES * 2;

/// Encode a 20-byte account identifier as lowercase `0x`-prefixed hex.
pub fn encode_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
    encoded.push_str("0x");
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode a `0x`-prefixed hex address. Mixed-case (checksummed) input is
/// accepted; the checksum itself is not verified.
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let payload = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or(AddressError::InvalidPrefix)?;

    if address.len() != ADDRESS_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_STRING_LENGTH,
            actual: address.len(),
        });
    }

    let decoded = hex::decode(payload)?;

    let bytes: [u8; ADDRESS_BYTES] = decoded
        .try_into()
        .map_err(|_| AddressError::InvalidPayloadLength)?;

    Ok(bytes)
}

/// Check whether the provided string is a valid address.
pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// Account address of a payee, the vault, or a governance caller.
///
/// Serialises as its hex string so configuration files and JSON output stay
/// human readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    /// The null address. Never a valid payee.
    pub const ZERO: Address = Address([0u8; ADDRESS_BYTES]);

    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_BYTES]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", encode_address(&self.0))
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        encode_address(&value.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_address(&value).map(Address)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address(s).map(Address)
    }
}
