// crates/carbon-ledger/src/rlp.rs
//
// Recursive Length Prefix encoding, the serialization used for signed
// EVM transactions. Only encoding is needed: the minter builds and signs
// transactions but never parses them.
//
//   single byte < 0x80      -> the byte itself
//   string, len < 56        -> 0x80 + len, bytes
//   string, len >= 56       -> 0xb7 + len(len), len (big-endian), bytes
//   list payload, len < 56  -> 0xc0 + len, payload
//   list payload, len >= 56 -> 0xf7 + len(len), len (big-endian), payload

/// Encode a byte string.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = length_prefix(0x80, 0xb7, bytes.len());
    out.extend_from_slice(bytes);
    out
}

/// Encode an unsigned integer given as big-endian bytes.
///
/// Integers are minimal: leading zeros are stripped and zero is the empty string.
pub fn encode_uint_bytes(be: &[u8]) -> Vec<u8> {
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
    encode_bytes(&be[first..])
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_uint_bytes(&value.to_be_bytes())
}

pub fn encode_u128(value: u128) -> Vec<u8> {
    encode_uint_bytes(&value.to_be_bytes())
}

/// Wrap already-encoded items into a list.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = length_prefix(0xc0, 0xf7, payload_len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn length_prefix(short_base: u8, long_base: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        return vec![short_base + len as u8];
    }
    let len_be = (len as u64).to_be_bytes();
    let first = len_be.iter().position(|b| *b != 0).unwrap_or(len_be.len() - 1);
    let len_bytes = &len_be[first..];
    let mut out = Vec::with_capacity(1 + len_bytes.len() + len);
    out.push(long_base + len_bytes.len() as u8);
    out.extend_from_slice(len_bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings() {
        assert_eq!(encode_bytes(b"dog"), vec![0x83, b'd', b'o', b'g']);
        assert_eq!(encode_bytes(b""), vec![0x80]);
        assert_eq!(encode_bytes(&[0x0f]), vec![0x0f]);
        assert_eq!(encode_bytes(&[0x80]), vec![0x81, 0x80]);
    }

    #[test]
    fn test_long_string() {
        let text = b"Lorem ipsum dolor sit amet, consectetur adipisicing elit";
        assert_eq!(text.len(), 56);
        let encoded = encode_bytes(text);
        assert_eq!(&encoded[..2], &[0xb8, 0x38]);
        assert_eq!(&encoded[2..], &text[..]);
    }

    #[test]
    fn test_integers() {
        assert_eq!(encode_u64(0), vec![0x80]);
        assert_eq!(encode_u64(15), vec![0x0f]);
        assert_eq!(encode_u64(1024), vec![0x82, 0x04, 0x00]);
        assert_eq!(encode_u128(20_000_000_000), vec![0x85, 0x04, 0xa8, 0x17, 0xc8, 0x00]);
    }

    #[test]
    fn test_lists() {
        assert_eq!(encode_list(&[]), vec![0xc0]);
        let cat_dog = encode_list(&[encode_bytes(b"cat"), encode_bytes(b"dog")]);
        assert_eq!(
            cat_dog,
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }
}
