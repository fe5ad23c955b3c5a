//! Access token derivation.
//!
//! The hub hands out a `token` string with every device list. Write commands
//! must carry that token encrypted under the user's 16-byte key with AES-128
//! in ECB mode and no padding, hex encoded in upper case. ECB is what the hub
//! firmware checks against, so it cannot be swapped for another mode.

use crate::encryption::error::TokenError;
use aes::Aes128;
use cipher::{
    BlockEncrypt,
    KeyInit,
    generic_array::GenericArray,
};
use std::fmt;

pub const BLOCK_SIZE: usize = 16;

/// The 16-byte key shown in the Brel app.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; BLOCK_SIZE]);

impl SharedKey {
    pub fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for SharedKey {
    type Error = TokenError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let key: [u8; BLOCK_SIZE] = bytes
            .try_into()
            .map_err(|_| TokenError::InvalidKey(bytes.len()))?;
        Ok(Self(key))
    }
}

impl TryFrom<&str> for SharedKey {
    type Error = TokenError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::try_from(key.as_bytes())
    }
}

// Never print key material.
impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(****)")
    }
}

/// Encrypts `data` block by block. `data` must already be block aligned.
pub fn encrypt_ecb(key: &SharedKey, data: &[u8]) -> Result<Vec<u8>, TokenError> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(TokenError::InvalidTokenLength(data.len()));
    }

    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
    }
    Ok(out)
}

/// Derives the `AccessToken` sent with `WriteDevice` requests.
pub fn derive_access_token(key: &SharedKey, gateway_token: &str) -> Result<String, TokenError> {
    let encrypted = encrypt_ecb(key, gateway_token.as_bytes())?;
    Ok(hex::encode_upper(encrypted))
}
