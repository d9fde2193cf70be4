use crate::error::UnsupportedHashAlgorithm;
use sha2::{Digest, Sha256, Sha512};

/// identity multihash code (0x00)
pub const IDENTITY: u64 = 0x00;

/// SHA2-256 multihash code (0x12)
pub const SHA2_256: u64 = 0x12;

/// SHA2-512 multihash code (0x13)
pub const SHA2_512: u64 = 0x13;

/// BLAKE3 multihash code (0x1e)
pub const BLAKE3: u64 = 0x1e;

/// Hash algorithms a block can be verified with
///
/// The set is closed: a CID naming any other multihash code cannot be verified,
/// and [`HashAlgorithm::from_code`] says so explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// Digest is the data itself
    Identity,
    /// SHA2-256
    Sha2_256,
    /// SHA2-512
    Sha2_512,
    /// BLAKE3 with the default 32 byte output
    Blake3,
}

impl HashAlgorithm {
    /// Resolve a multihash code
    pub fn from_code(code: u64) -> Result<Self, UnsupportedHashAlgorithm> {
        match code {
            IDENTITY => Ok(Self::Identity),
            SHA2_256 => Ok(Self::Sha2_256),
            SHA2_512 => Ok(Self::Sha2_512),
            BLAKE3 => Ok(Self::Blake3),
            code => Err(UnsupportedHashAlgorithm { code }),
        }
    }

    /// Multihash code for this algorithm
    pub const fn code(self) -> u64 {
        match self {
            Self::Identity => IDENTITY,
            Self::Sha2_256 => SHA2_256,
            Self::Sha2_512 => SHA2_512,
            Self::Blake3 => BLAKE3,
        }
    }

    /// Hash `data`
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Identity => data.to_vec(),
            Self::Sha2_256 => Sha256::digest(data).to_vec(),
            Self::Sha2_512 => Sha512::digest(data).to_vec(),
            Self::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        }
    }

    /// Hash `data` and wrap the digest as a multihash
    ///
    /// Fails only for identity hashes of more than 64 bytes.
    pub fn multihash(self, data: &[u8]) -> Result<multihash::Multihash<64>, multihash::Error> {
        multihash::Multihash::wrap(self.code(), &self.digest(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_codes() {
        for alg in [
            HashAlgorithm::Identity,
            HashAlgorithm::Sha2_256,
            HashAlgorithm::Sha2_512,
            HashAlgorithm::Blake3,
        ] {
            assert_eq!(HashAlgorithm::from_code(alg.code()), Ok(alg));
        }
    }

    #[test]
    fn rejects_unknown_code() {
        // sha3-256
        let err = HashAlgorithm::from_code(0x16).unwrap_err();
        assert_eq!(err.code, 0x16);
        assert_eq!(err.to_string(), "Unsupported multihash algorithm 0x16");
    }

    #[test]
    fn digest_lengths() {
        assert_eq!(HashAlgorithm::Sha2_256.digest(b"abc").len(), 32);
        assert_eq!(HashAlgorithm::Sha2_512.digest(b"abc").len(), 64);
        assert_eq!(HashAlgorithm::Blake3.digest(b"abc").len(), 32);
        assert_eq!(HashAlgorithm::Identity.digest(b"abc"), b"abc".to_vec());
    }

    #[test]
    fn sha256_known_vector() {
        let digest = HashAlgorithm::Sha2_256.digest(b"hello world");
        assert_eq!(
            digest[..4],
            [0xb9, 0x4d, 0x27, 0xb9],
            "sha256(\"hello world\") starts with b94d27b9"
        );
    }
}
