// crates/carbon-core/src/crypto.rs

use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};

use crate::address::Address;

/// Compute the Keccak-256 hash of the given bytes.
///
/// This is the pre-standard Keccak used by the EVM, not NIST SHA3-256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// First four bytes of the Keccak-256 hash of a canonical signature
/// such as `mint(address,uint256,string)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Derive the 20-byte ledger address of a secp256k1 public key.
///
/// Address = last 20 bytes of Keccak-256 over the uncompressed point without its 0x04 tag.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// Encode bytes as 0x-prefixed lowercase hex.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
