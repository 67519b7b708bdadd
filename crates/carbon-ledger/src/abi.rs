// crates/carbon-ledger/src/abi.rs
//
// Solidity ABI encoding for the handful of calls the minter makes, and
// decoding of their return values and of the `CarbonCreditMinted` event.
//
// Every static value occupies one 32-byte word. A dynamic `string` is
// referenced from the head by a byte offset and stored in the tail as a
// length word followed by the UTF-8 bytes, right-padded to a word boundary.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use carbon_core::crypto::{keccak256, selector};
use carbon_core::{Address, CarbonError};

pub const MINT_SIGNATURE: &str = "mint(address,uint256,string)";
pub const MINTED_EVENT_SIGNATURE: &str = "CarbonCreditMinted(address,uint256,string)";

pub const NAME_SIGNATURE: &str = "name()";
pub const SYMBOL_SIGNATURE: &str = "symbol()";
pub const DECIMALS_SIGNATURE: &str = "decimals()";
pub const TOTAL_SUPPLY_SIGNATURE: &str = "totalSupply()";
pub const OWNER_SIGNATURE: &str = "owner()";
pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";

const WORD: usize = 32;

/// topic0 of `CarbonCreditMinted`.
pub fn minted_topic() -> [u8; 32] {
    keccak256(MINTED_EVENT_SIGNATURE.as_bytes())
}

/// Encode an unsigned integer as a 32-byte big-endian word.
pub fn uint_word(value: &BigUint) -> Result<[u8; 32], CarbonError> {
    let bytes = value.to_bytes_be();
    if bytes.len() > WORD {
        return Err(CarbonError::AmountOutOfRange(format!(
            "{} does not fit in uint256",
            value
        )));
    }
    let mut word = [0u8; 32];
    word[WORD - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

fn usize_word(value: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

/// Length word plus right-padded bytes.
fn encode_string_tail(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

/// Calldata for `mint(address account, uint256 amount, string systemId)`.
pub fn encode_mint(
    recipient: &Address,
    amount: &BigUint,
    system_identifier: &str,
) -> Result<Vec<u8>, CarbonError> {
    let mut data = Vec::with_capacity(4 + WORD * 5);
    data.extend_from_slice(&selector(MINT_SIGNATURE));
    data.extend_from_slice(&recipient.to_word());
    data.extend_from_slice(&uint_word(amount)?);
    // Three head words precede the string tail.
    data.extend_from_slice(&usize_word(3 * WORD));
    data.extend_from_slice(&encode_string_tail(system_identifier));
    Ok(data)
}

/// Calldata for a call that takes no arguments.
pub fn encode_no_args(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

pub fn encode_balance_of(account: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector(BALANCE_OF_SIGNATURE));
    data.extend_from_slice(&account.to_word());
    data
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn word_at(data: &[u8], index: usize) -> Result<&[u8], CarbonError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        CarbonError::InvalidResponse(format!(
            "ABI data too short: need word {} of {} bytes",
            index,
            data.len()
        ))
    })
}

fn word_as_usize(word: &[u8]) -> Result<usize, CarbonError> {
    BigUint::from_bytes_be(word)
        .to_usize()
        .ok_or_else(|| CarbonError::InvalidResponse("ABI offset or length overflows".to_string()))
}

pub fn decode_uint(data: &[u8]) -> Result<BigUint, CarbonError> {
    Ok(BigUint::from_bytes_be(word_at(data, 0)?))
}

pub fn decode_u8(data: &[u8]) -> Result<u8, CarbonError> {
    decode_uint(data)?
        .to_u8()
        .ok_or_else(|| CarbonError::InvalidResponse("value does not fit in uint8".to_string()))
}

pub fn decode_address(data: &[u8]) -> Result<Address, CarbonError> {
    Address::from_word(word_at(data, 0)?)
}

/// `len` bytes at `start`, with both values taken from untrusted data.
fn checked_slice(data: &[u8], start: usize, len: usize) -> Option<&[u8]> {
    data.get(start..start.checked_add(len)?)
}

/// Decode a `string` whose offset sits in head word `head_index`.
fn decode_string_at(data: &[u8], head_index: usize) -> Result<String, CarbonError> {
    let offset = word_as_usize(word_at(data, head_index)?)?;
    let len_word = checked_slice(data, offset, WORD).ok_or_else(|| {
        CarbonError::InvalidResponse(format!("string offset {} out of bounds", offset))
    })?;
    let len = word_as_usize(len_word)?;
    let bytes = offset
        .checked_add(WORD)
        .and_then(|start| checked_slice(data, start, len))
        .ok_or_else(|| {
            CarbonError::InvalidResponse(format!("string of {} bytes out of bounds", len))
        })?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| CarbonError::InvalidResponse(format!("string is not UTF-8: {}", e)))
}

/// Decode a single `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String, CarbonError> {
    decode_string_at(data, 0)
}

/// Fields of one `CarbonCreditMinted(address indexed account, uint256 amount, string systemId)` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedLog {
    pub account: Address,
    pub amount: BigUint,
    pub system_identifier: String,
}

/// Decode a `CarbonCreditMinted` log from its topics and data.
///
/// `account` is indexed (topic1); `amount` and `systemId` are in the data.
pub fn decode_minted_log(topics: &[[u8; 32]], data: &[u8]) -> Result<MintedLog, CarbonError> {
    let (topic0, topic1) = match topics {
        [t0, t1, ..] => (t0, t1),
        _ => {
            return Err(CarbonError::InvalidResponse(format!(
                "CarbonCreditMinted log has {} topics, expected 2",
                topics.len()
            )))
        }
    };
    if *topic0 != minted_topic() {
        return Err(CarbonError::InvalidResponse(
            "log is not a CarbonCreditMinted event".to_string(),
        ));
    }
    Ok(MintedLog {
        account: Address::from_word(topic1)?,
        amount: decode_uint(data)?,
        system_identifier: decode_string_at(data, 1)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> Address {
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
    }

    #[test]
    fn test_uint_word() {
        let word = uint_word(&BigUint::from(0x0102u32)).unwrap();
        assert_eq!(&word[30..], &[0x01, 0x02]);
        assert!(word[..30].iter().all(|b| *b == 0));

        let too_big = BigUint::from(1u8) << 256;
        assert!(matches!(uint_word(&too_big), Err(CarbonError::AmountOutOfRange(_))));
    }

    #[test]
    fn test_encode_mint_layout() {
        let amount = BigUint::from(43u32) * BigUint::from(10u32).pow(18);
        let data = encode_mint(&recipient(), &amount, "AC:XX0001").unwrap();

        assert_eq!(&data[..4], &selector(MINT_SIGNATURE));
        let body = &data[4..];
        assert_eq!(body.len(), 5 * 32);
        assert_eq!(Address::from_word(&body[..32]).unwrap(), recipient());
        assert_eq!(BigUint::from_bytes_be(&body[32..64]), amount);
        assert_eq!(body[95], 0x60);
        assert_eq!(body[127], 9);
        assert_eq!(&body[128..137], b"AC:XX0001");
        assert!(body[137..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_mint_string_on_word_boundary() {
        let id = "x".repeat(32);
        let data = encode_mint(&recipient(), &BigUint::from(1u8), &id).unwrap();
        assert_eq!(data.len(), 4 + 5 * 32);
    }

    #[test]
    fn test_string_return_round_trip_with_tail() {
        // `name()` returning "Carbon Credit" as a node would encode it.
        let mut data = usize_word(32).to_vec();
        data.extend_from_slice(&encode_string_tail("Carbon Credit"));
        assert_eq!(decode_string(&data).unwrap(), "Carbon Credit");
    }

    #[test]
    fn test_hostile_offset_and_length_are_errors() {
        // Offset near usize::MAX: offset + 32 would wrap.
        let mut data = usize_word(usize::MAX - 8).to_vec();
        data.extend_from_slice(&[0u8; 32]);
        assert!(matches!(decode_string(&data), Err(CarbonError::InvalidResponse(_))));

        // Sane offset, length near usize::MAX: start + len would wrap.
        let mut data = usize_word(32).to_vec();
        data.extend_from_slice(&usize_word(usize::MAX));
        assert!(matches!(decode_string(&data), Err(CarbonError::InvalidResponse(_))));

        let mut data = usize_word(32).to_vec();
        data.extend_from_slice(&usize_word(usize::MAX - 40));
        assert!(matches!(decode_string(&data), Err(CarbonError::InvalidResponse(_))));
    }

    #[test]
    fn test_minted_log_with_hostile_string_length() {
        let mut data = uint_word(&BigUint::from(1u8)).unwrap().to_vec();
        data.extend_from_slice(&usize_word(64));
        data.extend_from_slice(&usize_word(usize::MAX));
        let topics = [minted_topic(), recipient().to_word()];
        assert!(decode_minted_log(&topics, &data).is_err());
    }

    #[test]
    fn test_decode_u8_and_short_data() {
        let mut word = [0u8; 32];
        word[31] = 18;
        assert_eq!(decode_u8(&word).unwrap(), 18);
        assert!(decode_uint(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_decode_minted_log() {
        let amount = BigUint::from(5u32) * BigUint::from(10u32).pow(18);
        let mut data = uint_word(&amount).unwrap().to_vec();
        data.extend_from_slice(&usize_word(64));
        data.extend_from_slice(&encode_string_tail("AC:XX0002"));

        let topics = [minted_topic(), recipient().to_word()];
        let log = decode_minted_log(&topics, &data).unwrap();
        assert_eq!(log.account, recipient());
        assert_eq!(log.amount, amount);
        assert_eq!(log.system_identifier, "AC:XX0002");

        let wrong = [keccak256(b"Transfer(address,address,uint256)"), recipient().to_word()];
        assert!(decode_minted_log(&wrong, &data).is_err());
        assert!(decode_minted_log(&topics[..1], &data).is_err());
    }
}
