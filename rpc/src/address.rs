use std::sync::OnceLock;

use data_encoding::{Encoding, BASE32_NOPAD};
use sha2::{Digest, Sha512_256};

/// Length of the encoded address string.
pub const ADDRESS_LEN: usize = 58;

const PUBLIC_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

/// A structurally valid account address.
///
/// Encoded as unpadded RFC 4648 base32 of the 32-byte public key followed by
/// a 4-byte checksum, the last 4 bytes of SHA-512/256(public key). The
/// encoded form is always 58 characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; PUBLIC_KEY_LEN]);

/// Reasons an address string is rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be {ADDRESS_LEN} characters, got {0}")]
    Length(usize),

    #[error("address is not valid base32")]
    Encoding,

    #[error("address checksum mismatch")]
    Checksum,
}

/// Base32 decoder that ignores the 2 unused bits of the final character, as
/// the reference SDK does.
fn decoder() -> &'static Encoding {
    static DECODER: OnceLock<Encoding> = OnceLock::new();
    DECODER.get_or_init(|| {
        let mut spec = BASE32_NOPAD.specification();
        spec.check_trailing_bits = false;
        spec.encoding().unwrap_or_else(|_| BASE32_NOPAD.clone())
    })
}

fn checksum(public_key: &[u8; PUBLIC_KEY_LEN]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
    out
}

impl Address {
    /// The raw public key bytes.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Encode to the 58-character checksummed form.
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LEN + CHECKSUM_LEN);
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(&checksum(&self.0));
        BASE32_NOPAD.encode(&bytes)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ADDRESS_LEN {
            return Err(AddressError::Length(s.len()));
        }

        let decoded = decoder()
            .decode(s.as_bytes())
            .map_err(|_| AddressError::Encoding)?;
        if decoded.len() != PUBLIC_KEY_LEN + CHECKSUM_LEN {
            return Err(AddressError::Encoding);
        }

        let mut public_key = [0u8; PUBLIC_KEY_LEN];
        public_key.copy_from_slice(&decoded[..PUBLIC_KEY_LEN]);

        if decoded[PUBLIC_KEY_LEN..] != checksum(&public_key) {
            return Err(AddressError::Checksum);
        }

        Ok(Address(public_key))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Structural validity check performed before any account fetch.
pub fn is_valid_address(address: &str) -> bool {
    address.parse::<Address>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &str = "YX5KZSZT27L7WZAW7TNONVDZHQQAURJKT4BPRS364KTH2DGMEKLLFOPK3U";
    const KNOWN_KEY_HEX: &str = "c5faaccb33d7d7fb6416fcdae6d4793c200a452a9f02f8cb7ee2a67d0ccc2296";

    #[test]
    fn decodes_known_address() {
        let addr: Address = KNOWN.parse().unwrap();
        assert_eq!(hex::encode(addr.public_key()), KNOWN_KEY_HEX);
        assert!(is_valid_address(KNOWN));
    }

    #[test]
    fn zero_key_encoding() {
        let addr = Address([0u8; 32]);
        assert_eq!(
            addr.encode(),
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ"
        );
    }

    #[test]
    fn encode_then_parse_is_identity() {
        let addr = Address([7u8; 32]);
        let encoded = addr.encode();
        assert_eq!(encoded.len(), ADDRESS_LEN);
        assert_eq!(encoded.parse::<Address>().unwrap(), addr);
        assert_eq!(addr.to_string(), encoded);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!("".parse::<Address>(), Err(AddressError::Length(0)));
        assert_eq!(
            KNOWN[..57].parse::<Address>(),
            Err(AddressError::Length(57))
        );
    }

    #[test]
    fn rejects_bad_alphabet() {
        // '1' is not in the base32 alphabet.
        let bad = format!("1{}", &KNOWN[1..]);
        assert_eq!(bad.parse::<Address>(), Err(AddressError::Encoding));
        assert!(!is_valid_address(&KNOWN.to_lowercase()));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut chars: Vec<char> = KNOWN.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert_eq!(tampered.parse::<Address>(), Err(AddressError::Checksum));
    }

    #[test]
    fn ignores_unused_trailing_bits() {
        // 'U' and 'V' differ only in the two bits past the 36th byte.
        assert!(KNOWN.ends_with('U'));
        let loose = format!("{}V", &KNOWN[..57]);
        let addr: Address = loose.parse().unwrap();
        assert_eq!(hex::encode(addr.public_key()), KNOWN_KEY_HEX);
        assert_eq!(addr.encode(), KNOWN);
    }
}
