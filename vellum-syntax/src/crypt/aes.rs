//! AES-128 and AES-256 in CBC and ECB modes, as used by the `AESV2` and
//! `AESV3` crypt filters.
//!
//! The S-boxes are derived from the field arithmetic at first use instead
//! of being spelled out as tables.

use std::sync::OnceLock;

fn xtime(a: u8) -> u8 {
    (a << 1) ^ if a & 0x80 != 0 { 0x1b } else { 0 }
}

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut out = 0;

    while b != 0 {
        if b & 1 != 0 {
            out ^= a;
        }

        a = xtime(a);
        b >>= 1;
    }

    out
}

struct SBoxes {
    forward: [u8; 256],
    inverse: [u8; 256],
}

fn sboxes() -> &'static SBoxes {
    static SBOXES: OnceLock<SBoxes> = OnceLock::new();

    SBOXES.get_or_init(|| {
        // Multiplicative inverses in GF(2^8), by exhaustive search; this
        // runs once.
        let mut field_inverse = [0u8; 256];

        for a in 1..=255u8 {
            for b in 1..=255u8 {
                if gf_mul(a, b) == 1 {
                    field_inverse[usize::from(a)] = b;

                    break;
                }
            }
        }

        let mut forward = [0u8; 256];
        let mut inverse = [0u8; 256];

        for a in 0..=255u8 {
            let b = field_inverse[usize::from(a)];
            let s = b ^ b.rotate_left(1) ^ b.rotate_left(2) ^ b.rotate_left(3) ^ b.rotate_left(4)
                ^ 0x63;

            forward[usize::from(a)] = s;
            inverse[usize::from(s)] = a;
        }

        SBoxes { forward, inverse }
    })
}

/// An AES block cipher with an expanded key schedule.
pub(crate) struct Aes {
    round_keys: Vec<[u8; 16]>,
}

impl Aes {
    /// Create a cipher from a 16-byte (AES-128) or 32-byte (AES-256) key.
    pub(crate) fn new(key: &[u8]) -> Option<Self> {
        let key_words = match key.len() {
            16 => 4usize,
            32 => 8usize,
            _ => return None,
        };

        let rounds = key_words + 6;
        let sbox = &sboxes().forward;

        let mut words: Vec<[u8; 4]> = key
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();

        let mut rcon = 1u8;

        for i in key_words..4 * (rounds + 1) {
            let mut temp = words[i - 1];

            if i % key_words == 0 {
                temp.rotate_left(1);

                for b in &mut temp {
                    *b = sbox[usize::from(*b)];
                }

                temp[0] ^= rcon;
                rcon = xtime(rcon);
            } else if key_words > 6 && i % key_words == 4 {
                for b in &mut temp {
                    *b = sbox[usize::from(*b)];
                }
            }

            let prev = words[i - key_words];
            words.push([
                prev[0] ^ temp[0],
                prev[1] ^ temp[1],
                prev[2] ^ temp[2],
                prev[3] ^ temp[3],
            ]);
        }

        let round_keys = words
            .chunks_exact(4)
            .map(|c| {
                let mut rk = [0u8; 16];

                for (i, word) in c.iter().enumerate() {
                    rk[4 * i..4 * i + 4].copy_from_slice(word);
                }

                rk
            })
            .collect();

        Some(Self { round_keys })
    }

    fn rounds(&self) -> usize {
        self.round_keys.len() - 1
    }

    pub(crate) fn encrypt_block(&self, mut state: [u8; 16]) -> [u8; 16] {
        let sbox = &sboxes().forward;

        add_round_key(&mut state, &self.round_keys[0]);

        for round in 1..self.rounds() {
            sub_bytes(&mut state, sbox);
            shift_rows(&mut state);
            mix_columns(&mut state);
            add_round_key(&mut state, &self.round_keys[round]);
        }

        sub_bytes(&mut state, sbox);
        shift_rows(&mut state);
        add_round_key(&mut state, &self.round_keys[self.rounds()]);

        state
    }

    pub(crate) fn decrypt_block(&self, mut state: [u8; 16]) -> [u8; 16] {
        let inv_sbox = &sboxes().inverse;

        add_round_key(&mut state, &self.round_keys[self.rounds()]);

        for round in (1..self.rounds()).rev() {
            inv_shift_rows(&mut state);
            sub_bytes(&mut state, inv_sbox);
            add_round_key(&mut state, &self.round_keys[round]);
            inv_mix_columns(&mut state);
        }

        inv_shift_rows(&mut state);
        sub_bytes(&mut state, inv_sbox);
        add_round_key(&mut state, &self.round_keys[0]);

        state
    }

    /// Decrypt in CBC mode. With `strip_padding`, a trailing RFC 2898
    /// padding block is removed when it is well-formed.
    pub(crate) fn decrypt_cbc(&self, data: &[u8], iv: &[u8; 16], strip_padding: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut prev = *iv;

        for block in data.chunks_exact(16) {
            let block: [u8; 16] = block.try_into().unwrap();
            let mut plain = self.decrypt_block(block);

            for (p, c) in plain.iter_mut().zip(prev) {
                *p ^= c;
            }

            out.extend_from_slice(&plain);
            prev = block;
        }

        if strip_padding
            && let Some(last) = out.last().copied()
            && (1..=16).contains(&last)
            && out.len() >= usize::from(last)
            && out[out.len() - usize::from(last)..]
                .iter()
                .all(|b| *b == last)
        {
            out.truncate(out.len() - usize::from(last));
        }

        out
    }

    /// Encrypt in CBC mode. The input length must be a multiple of the
    /// block size; no padding is added.
    pub(crate) fn encrypt_cbc(&self, data: &[u8], iv: &[u8; 16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut prev = *iv;

        for block in data.chunks_exact(16) {
            let mut input: [u8; 16] = block.try_into().unwrap();

            for (i, p) in input.iter_mut().zip(prev) {
                *i ^= p;
            }

            prev = self.encrypt_block(input);
            out.extend_from_slice(&prev);
        }

        out
    }

    /// Decrypt a single block without chaining (ECB), as the `/Perms`
    /// check requires.
    pub(crate) fn decrypt_block_ecb(&self, block: &[u8; 16]) -> [u8; 16] {
        self.decrypt_block(*block)
    }
}

fn add_round_key(state: &mut [u8; 16], rk: &[u8; 16]) {
    for (s, k) in state.iter_mut().zip(rk) {
        *s ^= k;
    }
}

fn sub_bytes(state: &mut [u8; 16], sbox: &[u8; 256]) {
    for s in state.iter_mut() {
        *s = sbox[usize::from(*s)];
    }
}

// The state is laid out in input order: index 4 * column + row. Row `r`
// rotates left by `r` positions.
fn shift_rows(state: &mut [u8; 16]) {
    let old = *state;

    for row in 1..4 {
        for col in 0..4 {
            state[4 * col + row] = old[4 * ((col + row) % 4) + row];
        }
    }
}

fn inv_shift_rows(state: &mut [u8; 16]) {
    let old = *state;

    for row in 1..4 {
        for col in 0..4 {
            state[4 * ((col + row) % 4) + row] = old[4 * col + row];
        }
    }
}

fn mix_columns(state: &mut [u8; 16]) {
    for col in state.chunks_exact_mut(4) {
        let [a, b, c, d] = [col[0], col[1], col[2], col[3]];

        col[0] = gf_mul(a, 2) ^ gf_mul(b, 3) ^ c ^ d;
        col[1] = a ^ gf_mul(b, 2) ^ gf_mul(c, 3) ^ d;
        col[2] = a ^ b ^ gf_mul(c, 2) ^ gf_mul(d, 3);
        col[3] = gf_mul(a, 3) ^ b ^ c ^ gf_mul(d, 2);
    }
}

fn inv_mix_columns(state: &mut [u8; 16]) {
    for col in state.chunks_exact_mut(4) {
        let [a, b, c, d] = [col[0], col[1], col[2], col[3]];

        col[0] = gf_mul(a, 0x0e) ^ gf_mul(b, 0x0b) ^ gf_mul(c, 0x0d) ^ gf_mul(d, 0x09);
        col[1] = gf_mul(a, 0x09) ^ gf_mul(b, 0x0e) ^ gf_mul(c, 0x0b) ^ gf_mul(d, 0x0d);
        col[2] = gf_mul(a, 0x0d) ^ gf_mul(b, 0x09) ^ gf_mul(c, 0x0e) ^ gf_mul(d, 0x0b);
        col[3] = gf_mul(a, 0x0b) ^ gf_mul(b, 0x0d) ^ gf_mul(c, 0x09) ^ gf_mul(d, 0x0e);
    }
}

#[cfg(test)]
mod tests {
    use super::Aes;
    use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};

    const PLAIN: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    #[test]
    fn fips_197_aes128() {
        let key: Vec<u8> = (0..16).collect();
        let cipher = Aes::new(&key).unwrap();

        assert_eq!(cipher.encrypt_block(PLAIN), [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ]);
    }

    #[test]
    fn fips_197_aes256() {
        let key: Vec<u8> = (0..32).collect();
        let cipher = Aes::new(&key).unwrap();

        assert_eq!(cipher.encrypt_block(PLAIN), [
            0x8e, 0xa2, 0xb7, 0xca, 0x51, 0x67, 0x45, 0xbf, 0xea, 0xfc, 0x49, 0x90, 0x4b, 0x49,
            0x60, 0x89,
        ]);
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        let cipher = Aes::new(&[7u8; 32]).unwrap();
        let encrypted = cipher.encrypt_block(PLAIN);
        assert_eq!(cipher.decrypt_block(encrypted), PLAIN);
    }

    #[test]
    fn against_reference_implementation() {
        let key = [0x42u8; 16];
        let ours = Aes::new(&key).unwrap().encrypt_block(PLAIN);

        let reference = aes::Aes128::new(GenericArray::from_slice(&key));
        let mut block = GenericArray::clone_from_slice(&PLAIN);
        reference.encrypt_block(&mut block);

        assert_eq!(ours.as_slice(), block.as_slice());
    }

    #[test]
    fn cbc_roundtrip_with_padding_strip() {
        let cipher = Aes::new(&[3u8; 16]).unwrap();
        let iv = [9u8; 16];

        // A message padded to the block size by hand.
        let mut message = b"attack at dawn".to_vec();
        message.extend_from_slice(&[2, 2]);

        let encrypted = cipher.encrypt_cbc(&message, &iv);
        let decrypted = cipher.decrypt_cbc(&encrypted, &iv, true);

        assert_eq!(decrypted, b"attack at dawn");
    }
}
