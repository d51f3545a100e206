use rand::Rng;

const PREFIX: &[u8; 8] = b"-RB0001-";
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a 20-byte Azureus-style peer-id: the 8-byte client prefix
/// `-RB0001-` followed by 12 bytes sampled uniformly from `[0-9a-z]`.
pub fn generate() -> [u8; 20] {
    let mut id = [0u8; 20];
    id[..8].copy_from_slice(PREFIX);
    let mut rng = rand::thread_rng();
    for slot in &mut id[8..] {
        *slot = ALPHABET[rng.gen_range(0..ALPHABET.len())];
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_the_required_prefix() {
        let id = generate();
        assert_eq!(&id[..8], PREFIX);
    }

    #[test]
    fn suffix_is_lowercase_alphanumeric() {
        let id = generate();
        for byte in &id[8..] {
            assert!(ALPHABET.contains(byte), "byte {byte} not in alphabet");
        }
    }
}
