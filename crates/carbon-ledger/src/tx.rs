// crates/carbon-ledger/src/tx.rs
//
// Legacy (type 0) transactions with EIP-155 replay protection.
//
// Signing payload: rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])
// Signed form:     rlp([nonce, gasPrice, gas, to, value, data, v, r, s])
//                  with v = recovery_id + 35 + 2 * chainId
// Hash:            keccak256(signed form)

use carbon_core::crypto::{keccak256, to_hex_prefixed};
use carbon_core::{Address, CarbonError};

use crate::rlp;
use crate::wallet::{LocalSigner, RecoverableSignature};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// Raw signed bytes ready for `eth_sendRawTransaction`, plus their hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn hash_hex(&self) -> String {
        to_hex_prefixed(&self.hash)
    }

    pub fn raw_hex(&self) -> String {
        to_hex_prefixed(&self.raw)
    }
}

impl LegacyTransaction {
    fn common_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_u64(self.nonce),
            rlp::encode_u128(self.gas_price),
            rlp::encode_u64(self.gas_limit),
            rlp::encode_bytes(self.to.as_bytes()),
            rlp::encode_u128(self.value),
            rlp::encode_bytes(&self.data),
        ]
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        let mut fields = self.common_fields();
        fields.push(rlp::encode_u64(self.chain_id));
        fields.push(rlp::encode_u64(0));
        fields.push(rlp::encode_u64(0));
        rlp::encode_list(&fields)
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    /// EIP-155 `v` for a given recovery id.
    pub fn v(&self, recovery_id: u8) -> Result<u64, CarbonError> {
        self.chain_id
            .checked_mul(2)
            .and_then(|c| c.checked_add(35 + recovery_id as u64))
            .ok_or_else(|| CarbonError::Crypto(format!("chain id {} too large", self.chain_id)))
    }

    pub fn encode_signed(&self, signature: &RecoverableSignature) -> Result<SignedTransaction, CarbonError> {
        let mut fields = self.common_fields();
        fields.push(rlp::encode_u64(self.v(signature.recovery_id)?));
        fields.push(rlp::encode_uint_bytes(&signature.r));
        fields.push(rlp::encode_uint_bytes(&signature.s));
        let raw = rlp::encode_list(&fields);
        let hash = keccak256(&raw);
        Ok(SignedTransaction { raw, hash })
    }

    pub fn sign(&self, signer: &LocalSigner) -> Result<SignedTransaction, CarbonError> {
        let signature = signer.sign_prehash(&self.signing_hash())?;
        self.encode_signed(&signature)
    }
}
