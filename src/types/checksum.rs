use anyhow::{bail, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt::Display;

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Checksum {
    Sha256(Vec<u8>),
    Sha512(Vec<u8>),
}

impl Checksum {
    pub fn from_sha256_str(s: &str) -> Result<Self> {
        if s.len() != 64 {
            bail!("Malformed Sha256 string: bad length")
        }
        Ok(Checksum::Sha256(hex::decode(s)?))
    }

    pub fn from_sha512_str(s: &str) -> Result<Self> {
        if s.len() != 128 {
            bail!("Malformed Sha512 string: bad length")
        }
        Ok(Checksum::Sha512(hex::decode(s)?))
    }

    /// Check if data matches this checksum
    pub fn verify(&self, data: &[u8]) -> bool {
        match self {
            Checksum::Sha256(hex) => hex.as_slice() == Sha256::digest(data).as_slice(),
            Checksum::Sha512(hex) => hex.as_slice() == Sha512::digest(data).as_slice(),
        }
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Checksum::Sha256(hex) => {
                f.write_str("sha256::")?;
                f.write_str(&hex::encode(hex))
            }
            Checksum::Sha512(hex) => {
                f.write_str("sha512::")?;
                f.write_str(&hex::encode(hex))
            }
        }
    }
}
