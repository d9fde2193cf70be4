use crate::error::CidError;
use ::cid::Cid as IpldCid;

/// Path prefix accepted in front of a CID
pub const IPFS_PATH_PREFIX: &str = "/ipfs/";

/// URI scheme accepted in front of a CID
pub const IPFS_SCHEME: &str = "ipfs://";

/// Parse a CID from user input
///
/// Accepts a bare CID, `/ipfs/<cid>` or `ipfs://<cid>`. Anything left after the
/// CID is a path, and paths are not resolved: such input is rejected with
/// [`CidError::UnsupportedPath`] rather than silently truncated.
///
/// ```
/// use trustless_common::{parse_cid, CidError};
///
/// let cid = parse_cid("/ipfs/bafybeicklkqcnlvtiscr2hzkubjwnwjinvskffn4xorqeduft3wq7vm5u4").unwrap();
/// assert_eq!(cid.codec(), 0x70);
///
/// assert!(matches!(
///     parse_cid("/ipfs/bafybeicklkqcnlvtiscr2hzkubjwnwjinvskffn4xorqeduft3wq7vm5u4/a.txt"),
///     Err(CidError::UnsupportedPath { .. })
/// ));
/// ```
pub fn parse_cid(input: &str) -> Result<IpldCid, CidError> {
    let trimmed = input.trim();
    let rest = trimmed
        .strip_prefix(IPFS_PATH_PREFIX)
        .or_else(|| trimmed.strip_prefix(IPFS_SCHEME))
        .unwrap_or(trimmed);

    if rest.contains('/') {
        return Err(CidError::UnsupportedPath {
            input: input.to_string(),
        });
    }
    if rest.is_empty() {
        return Err(CidError::Empty);
    }

    IpldCid::try_from(rest).map_err(|source| CidError::Invalid {
        input: rest.to_string(),
        source,
    })
}

/// Shorten a CID string for display: `bafy...5u4`
///
/// Keeps the first four and the last three characters. Strings shorter than
/// eight characters are returned as-is.
pub fn shorten_cid(cid: &str) -> String {
    let chars: Vec<char> = cid.chars().collect();
    if chars.len() < 8 {
        return cid.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}...{tail}")
}
