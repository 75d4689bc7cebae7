//! The standard security handler.
//!
//! These implementations exist to read already-encrypted documents; they
//! have not been audited and must not be used to protect new data.

pub(crate) mod aes;
pub(crate) mod md5;
pub(crate) mod rc4;
mod sha2;

use crate::crypt::aes::Aes;
use crate::crypt::rc4::Rc4;
use crate::object::dict::keys::{
    CF, CFM, ENCRYPT_METADATA, FILTER, LENGTH, O, OE, P, PERMS, R, STM_F, STR_F, U, UE, V,
};
use crate::object::{ByteString, Dict, Name, ObjRef};
use log::warn;

pub(crate) const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// An error produced while setting up decryption.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// The trailer has no `/ID` entry, which the key derivation needs.
    MissingId,
    /// Neither the user nor the owner password matched.
    InvalidPassword,
    /// The encryption dictionary is damaged.
    InvalidEncryption,
    /// The document uses an encryption scheme this crate doesn't support.
    UnsupportedAlgorithm,
}

impl std::fmt::Display for DecryptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId => write!(f, "the trailer has no /ID entry"),
            Self::InvalidPassword => write!(f, "the password doesn't match"),
            Self::InvalidEncryption => write!(f, "the encryption dictionary is damaged"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported encryption scheme"),
        }
    }
}

impl std::error::Error for DecryptionError {}

/// What kind of data is being decrypted. Streams and strings may use
/// different crypt filters.
#[derive(Debug, Copy, Clone)]
pub(crate) enum DecryptionTarget {
    String,
    Stream,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CryptMethod {
    Identity,
    Rc4,
    Aes128,
    Aes256,
}

impl CryptMethod {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"None" | b"Identity" => Some(Self::Identity),
            b"V2" => Some(Self::Rc4),
            b"AESV2" => Some(Self::Aes128),
            b"AESV3" => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// A file decryptor: the derived file key plus the per-target methods.
#[derive(Debug, Clone)]
pub struct Decryptor {
    key: Vec<u8>,
    stream_method: CryptMethod,
    string_method: CryptMethod,
}

impl Decryptor {
    /// Decrypt the data of a string or stream belonging to the object
    /// `id`.
    pub(crate) fn decrypt(
        &self,
        id: ObjRef,
        data: &[u8],
        target: DecryptionTarget,
    ) -> Option<Vec<u8>> {
        let method = match target {
            DecryptionTarget::String => self.string_method,
            DecryptionTarget::Stream => self.stream_method,
        };

        match method {
            CryptMethod::Identity => Some(data.to_vec()),
            CryptMethod::Rc4 => {
                let key = object_key(&self.key, id, false);

                Some(Rc4::new(&key).apply(data))
            }
            CryptMethod::Aes128 => {
                let key = object_key(&self.key, id, true);
                let (iv, content) = data.split_at_checked(16)?;
                let cipher = Aes::new(&key)?;

                Some(cipher.decrypt_cbc(content, iv.try_into().ok()?, true))
            }
            CryptMethod::Aes256 => {
                let (iv, content) = data.split_at_checked(16)?;
                let cipher = Aes::new(&self.key)?;

                Some(cipher.decrypt_cbc(content, iv.try_into().ok()?, true))
            }
        }
    }
}

/// Algorithm 1, steps a-d: extend the file key with the low bytes of the
/// object and generation number (plus `sAlT` for AES) and hash.
pub(crate) fn object_key(file_key: &[u8], id: ObjRef, aes: bool) -> Vec<u8> {
    let n = file_key.len();

    let mut input = file_key.to_vec();
    input.extend_from_slice(&id.num.to_le_bytes()[..3]);
    input.extend_from_slice(&id.r#gen.to_le_bytes()[..2]);

    if aes {
        input.extend_from_slice(b"sAlT");
    }

    let hash = md5::digest(&input);

    hash[..(n + 5).min(16)].to_vec()
}

/// Build a decryptor from the `/Encrypt` dictionary, the first element of
/// the trailer `/ID`, and a caller-supplied password.
pub(crate) fn build(
    dict: &Dict,
    file_id: &[u8],
    password: &[u8],
) -> Result<Decryptor, DecryptionError> {
    use DecryptionError::*;

    let filter = dict.get_direct::<Name>(FILTER).ok_or(InvalidEncryption)?;

    if *filter != b"Standard"[..] {
        return Err(UnsupportedAlgorithm);
    }

    let version = dict.get_direct::<u8>(V).ok_or(InvalidEncryption)?;
    let revision = dict.get_direct::<u8>(R).ok_or(InvalidEncryption)?;
    let encrypt_metadata = dict.get_direct::<bool>(ENCRYPT_METADATA).unwrap_or(true);

    let length_bits = match version {
        1 => 40,
        2 => dict.get_direct::<u16>(LENGTH).unwrap_or(40),
        4 => dict.get_direct::<u16>(LENGTH).unwrap_or(128),
        5 => 256,
        _ => return Err(UnsupportedAlgorithm),
    };

    let owner_entry = dict.get_direct::<ByteString>(O).ok_or(InvalidEncryption)?;
    let user_entry = dict.get_direct::<ByteString>(U).ok_or(InvalidEncryption)?;

    let permissions = {
        let raw = dict.get_direct::<i64>(P).ok_or(InvalidEncryption)?;

        raw as u32
    };

    let (stream_method, string_method) = match version {
        1 | 2 => (CryptMethod::Rc4, CryptMethod::Rc4),
        4 | 5 => crypt_filter_methods(dict).ok_or(InvalidEncryption)?,
        _ => return Err(UnsupportedAlgorithm),
    };

    let mut key = if revision <= 4 {
        derive_key_legacy(
            password,
            &owner_entry,
            &user_entry,
            permissions,
            file_id,
            revision,
            length_bits / 8,
            encrypt_metadata,
        )?
    } else {
        derive_key_modern(dict, password, &owner_entry, &user_entry, revision)?
    };

    // Some producers declare a shorter key than AES-128 needs.
    if version == 4 && key.len() < 16 {
        key.resize(16, 0);
    }

    Ok(Decryptor {
        key,
        stream_method,
        string_method,
    })
}

/// Resolve `/StmF` and `/StrF` through the `/CF` dictionary.
fn crypt_filter_methods(dict: &Dict) -> Option<(CryptMethod, CryptMethod)> {
    let cf = dict.get_direct::<Dict>(CF).unwrap_or_default();

    let lookup = |key: &[u8]| -> CryptMethod {
        let Some(name) = dict.get_direct::<Name>(key) else {
            return CryptMethod::Identity;
        };

        if *name == b"Identity"[..] {
            return CryptMethod::Identity;
        }

        cf.get_direct::<Dict>(&name)
            .and_then(|filter| filter.get_direct::<Name>(CFM))
            .and_then(|method| CryptMethod::from_name(&method))
            .unwrap_or(CryptMethod::Identity)
    };

    Some((lookup(STM_F), lookup(STR_F)))
}

pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = password.len().min(32);

    out[..len].copy_from_slice(&password[..len]);
    out[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);

    out
}

/// Key derivation for revisions 2 to 4: try the password as the user
/// password, then as the owner password.
fn derive_key_legacy(
    password: &[u8],
    owner_entry: &[u8],
    user_entry: &[u8],
    permissions: u32,
    file_id: &[u8],
    revision: u8,
    key_bytes: u16,
    encrypt_metadata: bool,
) -> Result<Vec<u8>, DecryptionError> {
    let attempt = |padded: &[u8; 32]| -> Option<Vec<u8>> {
        let key = file_key_rev4(
            padded,
            owner_entry,
            permissions,
            file_id,
            revision,
            key_bytes,
            encrypt_metadata,
        );

        authenticate_user_password(&key, file_id, user_entry, revision).then_some(key)
    };

    if let Some(key) = attempt(&pad_password(password)) {
        return Ok(key);
    }

    // Algorithm 7: recover the user password from `/O` with the owner
    // password, then authenticate with that.
    let recovered = recover_user_password(password, owner_entry, revision, key_bytes);

    if let Some(key) = recovered.as_ref().and_then(|pw| attempt(pw)) {
        return Ok(key);
    }

    Err(DecryptionError::InvalidPassword)
}

/// Algorithm 2: the file key from a padded password.
pub(crate) fn file_key_rev4(
    padded_password: &[u8; 32],
    owner_entry: &[u8],
    permissions: u32,
    file_id: &[u8],
    revision: u8,
    key_bytes: u16,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut input = vec![];
    input.extend_from_slice(padded_password);
    input.extend_from_slice(owner_entry);
    input.extend_from_slice(&permissions.to_le_bytes());
    input.extend_from_slice(file_id);

    if !encrypt_metadata && revision >= 4 {
        input.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
    }

    let mut hash = md5::digest(&input);

    if revision >= 3 {
        for _ in 0..50 {
            hash = md5::digest(&hash[..usize::from(key_bytes)]);
        }
    }

    hash[..usize::from(key_bytes)].to_vec()
}

/// Algorithms 4/5 + 6: recompute the `/U` entry from the key and compare.
fn authenticate_user_password(
    key: &[u8],
    file_id: &[u8],
    user_entry: &[u8],
    revision: u8,
) -> bool {
    match revision {
        2 => Rc4::new(key).apply(&PASSWORD_PADDING) == user_entry,
        3 | 4 => {
            let mut input = vec![];
            input.extend_from_slice(&PASSWORD_PADDING);
            input.extend_from_slice(file_id);

            let mut value = Rc4::new(key).apply(&md5::digest(&input));

            for i in 1..=19u8 {
                let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                value = Rc4::new(&round_key).apply(&value);
            }

            // Only the first 16 bytes are significant.
            Some(value.as_slice()) == user_entry.get(..16)
        }
        _ => false,
    }
}

/// Algorithm 3 in reverse: decrypt `/O` with the owner-password key,
/// yielding the padded user password.
fn recover_user_password(
    owner_password: &[u8],
    owner_entry: &[u8],
    revision: u8,
    key_bytes: u16,
) -> Option<[u8; 32]> {
    let mut hash = md5::digest(&pad_password(owner_password));

    if revision >= 3 {
        for _ in 0..50 {
            hash = md5::digest(&hash);
        }
    }

    let key = &hash[..usize::from(key_bytes)];

    let decrypted = if revision == 2 {
        Rc4::new(key).apply(owner_entry)
    } else {
        let mut value = owner_entry.to_vec();

        for i in (0..=19u8).rev() {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            value = Rc4::new(&round_key).apply(&value);
        }

        value
    };

    decrypted.get(..32)?.try_into().ok()
}

/// Algorithm 2.A: the file key for revisions 5 and 6.
fn derive_key_modern(
    dict: &Dict,
    password: &[u8],
    owner_entry: &[u8],
    user_entry: &[u8],
    revision: u8,
) -> Result<Vec<u8>, DecryptionError> {
    use DecryptionError::*;

    // The password is truncated to 127 UTF-8 bytes.
    let password = &password[..password.len().min(127)];

    let owner = owner_entry.get(..48).ok_or(InvalidEncryption)?;
    let user = user_entry.get(..48).ok_or(InvalidEncryption)?;

    let (owner_hash, owner_salts) = owner.split_at(32);
    let (owner_validation_salt, owner_key_salt) = owner_salts.split_at(8);
    let (user_hash, user_salts) = user.split_at(32);
    let (user_validation_salt, user_key_salt) = user_salts.split_at(8);

    let unwrap_key = |wrapped: Option<ByteString>, intermediate: [u8; 32]| {
        let wrapped = wrapped.ok_or(InvalidEncryption)?;

        if wrapped.len() != 32 {
            return Err(InvalidEncryption);
        }

        let cipher = Aes::new(&intermediate).ok_or(InvalidEncryption)?;

        Ok(cipher.decrypt_cbc(&wrapped, &[0u8; 16], false))
    };

    let key = if password_hash(password, owner_validation_salt, Some(user), revision)? == owner_hash
    {
        let intermediate = password_hash(password, owner_key_salt, Some(user), revision)?;

        unwrap_key(dict.get_direct::<ByteString>(OE), intermediate)?
    } else if password_hash(password, user_validation_salt, None, revision)? == user_hash {
        let intermediate = password_hash(password, user_key_salt, None, revision)?;

        unwrap_key(dict.get_direct::<ByteString>(UE), intermediate)?
    } else {
        return Err(InvalidPassword);
    };

    check_perms(dict, &key);

    Ok(key)
}

/// Decrypt `/Perms` with the file key and verify the integrity block.
fn check_perms(dict: &Dict, key: &[u8]) {
    let Some(perms) = dict.get_direct::<ByteString>(PERMS) else {
        return;
    };

    let Some(block): Option<[u8; 16]> = perms.get(..16).and_then(|b| b.try_into().ok()) else {
        warn!("/Perms entry is too short");

        return;
    };

    let Some(cipher) = Aes::new(key) else {
        return;
    };

    let decrypted = cipher.decrypt_block_ecb(&block);

    if &decrypted[9..12] != b"adb" {
        warn!("/Perms integrity block doesn't verify; continuing anyway");
    }
}

/// Algorithm 2.B: the password hash for revisions 5 and 6.
fn password_hash(
    password: &[u8],
    salt: &[u8],
    user_entry: Option<&[u8]>,
    revision: u8,
) -> Result<[u8; 32], DecryptionError> {
    let mut input = vec![];
    input.extend_from_slice(password);
    input.extend_from_slice(salt);

    if let Some(user_entry) = user_entry {
        input.extend_from_slice(user_entry);
    }

    let mut k = sha2::sha256(&input).to_vec();

    if revision == 5 {
        return Ok(k.try_into().map_err(|_| DecryptionError::InvalidEncryption)?);
    }

    // Revision 6 iterates a hash chain whose round count depends on the
    // data itself.
    let mut round: u16 = 0;

    loop {
        let mut single = vec![];
        single.extend_from_slice(password);
        single.extend_from_slice(&k);

        if let Some(user_entry) = user_entry {
            single.extend_from_slice(user_entry);
        }

        let k1 = single.repeat(64);

        let cipher =
            Aes::new(&k[..16]).ok_or(DecryptionError::InvalidEncryption)?;
        let iv: [u8; 16] = k[16..32]
            .try_into()
            .map_err(|_| DecryptionError::InvalidEncryption)?;
        let e = cipher.encrypt_cbc(&k1, &iv);

        let selector = u128::from_be_bytes(
            e[..16]
                .try_into()
                .map_err(|_| DecryptionError::InvalidEncryption)?,
        ) % 3;

        k = match selector {
            0 => sha2::sha256(&e).to_vec(),
            1 => sha2::sha384(&e).to_vec(),
            _ => sha2::sha512(&e).to_vec(),
        };

        round += 1;

        if round > 63 {
            let last = *e.last().ok_or(DecryptionError::InvalidEncryption)?;

            if u16::from(last) <= round - 32 {
                break;
            }
        }
    }

    k[..32]
        .try_into()
        .map_err(|_| DecryptionError::InvalidEncryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_padding() {
        let padded = pad_password(b"test");
        assert_eq!(&padded[..4], b"test");
        assert_eq!(&padded[4..], &PASSWORD_PADDING[..28]);

        let empty = pad_password(b"");
        assert_eq!(empty, PASSWORD_PADDING);
    }

    #[test]
    fn object_key_extension() {
        let key = object_key(&[1, 2, 3, 4, 5], ObjRef::new(7, 0), false);
        // n + 5 = 10 bytes of the MD5 output.
        assert_eq!(key.len(), 10);
    }

    // Round-trip the legacy derivation: build /O and /U entries for known
    // passwords the way a writer would, then check that both passwords
    // authenticate and a wrong one doesn't.
    fn make_legacy_entries(
        user_pw: &[u8],
        owner_pw: &[u8],
        permissions: u32,
        file_id: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        // Algorithm 3: the /O entry.
        let mut hash = md5::digest(&pad_password(owner_pw));
        for _ in 0..50 {
            hash = md5::digest(&hash);
        }
        let okey = &hash[..16];

        let mut o = pad_password(user_pw).to_vec();
        for i in 0..=19u8 {
            let round_key: Vec<u8> = okey.iter().map(|b| b ^ i).collect();
            o = Rc4::new(&round_key).apply(&o);
        }

        // Algorithm 2 + 5: the file key and the /U entry.
        let key = file_key_rev4(
            &pad_password(user_pw),
            &o,
            permissions,
            file_id,
            4,
            16,
            true,
        );

        let mut input = vec![];
        input.extend_from_slice(&PASSWORD_PADDING);
        input.extend_from_slice(file_id);
        let mut u = Rc4::new(&key).apply(&md5::digest(&input));
        for i in 1..=19u8 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            u = Rc4::new(&round_key).apply(&u);
        }
        u.resize(32, 0);

        (o, u)
    }

    #[test]
    fn legacy_user_and_owner_password() {
        let file_id = b"\x01\x02\x03\x04\x05\x06\x07\x08";
        let permissions = 0xffff_ffccu32;
        let (o, u) = make_legacy_entries(b"test", b"owner", permissions, file_id);

        let user_key =
            derive_key_legacy(b"test", &o, &u, permissions, file_id, 4, 16, true).unwrap();
        let owner_key =
            derive_key_legacy(b"owner", &o, &u, permissions, file_id, 4, 16, true).unwrap();

        assert_eq!(user_key, owner_key);

        assert_eq!(
            derive_key_legacy(b"wrong", &o, &u, permissions, file_id, 4, 16, true),
            Err(DecryptionError::InvalidPassword)
        );
    }
}
