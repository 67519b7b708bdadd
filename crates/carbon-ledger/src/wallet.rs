// crates/carbon-ledger/src/wallet.rs
//
// In-memory secp256k1 signer for the contract owner account.
//
// The secret is parsed once from its hex form and lives only inside the
// k256 SigningKey, which zeroizes itself on drop. It is never written
// anywhere and Debug output is redacted.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::zeroize::Zeroize;

use carbon_core::crypto::address_from_verifying_key;
use carbon_core::{Address, CarbonError};

/// A recoverable ECDSA signature split into its transaction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1, the parity of the ephemeral point's y coordinate.
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// Recover the signer's public key from a signature over `prehash`.
    pub fn recover(&self, prehash: &[u8; 32]) -> Result<VerifyingKey, CarbonError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        let signature = Signature::from_slice(&bytes)?;
        let recovery_id = RecoveryId::from_byte(self.recovery_id)
            .ok_or_else(|| CarbonError::Crypto(format!("bad recovery id {}", self.recovery_id)))?;
        Ok(VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)?)
    }
}

/// Signs transaction hashes with a locally held private key.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl LocalSigner {
    /// Parse a 32-byte hex private key, with or without a `0x` prefix.
    pub fn from_hex(secret: &str) -> Result<Self, CarbonError> {
        let trimmed = secret.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 64 {
            return Err(CarbonError::Crypto(format!(
                "private key must be 64 hex characters, got {}",
                digits.len()
            )));
        }
        // Error text from hex would echo the offending character, so keep it generic.
        let mut bytes = hex::decode(digits)
            .map_err(|_| CarbonError::Crypto("private key is not valid hex".to_string()))?;
        let key = SigningKey::from_slice(&bytes);
        bytes.zeroize();
        let key = key.map_err(|_| {
            CarbonError::Crypto("private key is not a valid secp256k1 scalar".to_string())
        })?;
        Ok(Self::from_signing_key(key))
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest.
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<RecoverableSignature, CarbonError> {
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(prehash)?;
        let (r, s) = signature.split_bytes();
        let mut out = RecoverableSignature {
            r: [0u8; 32],
            s: [0u8; 32],
            recovery_id: recovery_id.to_byte(),
        };
        out.r.copy_from_slice(&r);
        out.s.copy_from_slice(&s);
        Ok(out)
    }
}
