//! CoboSafe constants and encoding helpers
//!
//! Role names, contract names and authorizer types are stored on chain as
//! `bytes32`: ASCII, left-aligned, zero padded.

use ethers::abi::{self, AbiParser, Function, ParamType, Token};
use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::types::{Address, H256};
use ethers::utils::{id, to_checksum};
use rand::RngCore;

use crate::error::{Error, Result};

/// Default CoboFactory (same address on every supported chain)
pub const FACTORY_ADDRESS: &str = "0xC0B00000e19D71fA50a9BB1fcaC2eC92fac9549C";

/// Placeholder used by authorizers for native ETH
pub const ETH_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

lazy_static::lazy_static! {
    static ref ADDRESS_RE: regex::Regex =
        regex::Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex");
}

/// Call kind of a transaction envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    Call = 0,
    DelegateCall = 1,
}

impl Operation {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Call => write!(f, "call"),
            Operation::DelegateCall => write!(f, "delegatecall"),
        }
    }
}

/// Encode an ASCII tag as `bytes32`
pub fn b32(name: &str) -> Result<H256> {
    let bytes = name.as_bytes();
    if !name.is_ascii() || bytes.len() > 32 {
        return Err(Error::Abi(format!("{} does not fit in bytes32", name)));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(H256::from(out))
}

/// Decode a `bytes32` tag, dropping the zero padding
pub fn s32(data: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::Decode(format!("0x{} is not a utf-8 tag", hex::encode(data))))?;
    Ok(text.trim_matches('\0').to_string())
}

/// First four bytes of keccak256 of the function signature
pub fn func_selector(signature: &str) -> [u8; 4] {
    id(signature)
}

/// Encode a call from its signature and already tokenized arguments
pub fn abi_encode_with_sig(signature: &str, args: &[Token]) -> Result<Vec<u8>> {
    let function = parse_signature(signature, args.len())?;

    let mut data = function.short_signature().to_vec();
    data.extend_from_slice(&abi::encode(args));
    Ok(data)
}

/// Tokenize string arguments against the parameter types of a signature
///
/// Arrays and tuples use the bracket syntax, eg `[0xabc..,0xdef..]`.
pub fn tokenize_args(signature: &str, args: &[&str]) -> Result<Vec<Token>> {
    let function = parse_signature(signature, args.len())?;

    function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| tokenize(&param.kind, arg))
        .collect()
}

fn parse_signature(signature: &str, arity: usize) -> Result<Function> {
    let function = AbiParser::default()
        .parse_function(signature)
        .map_err(|e| Error::Abi(format!("invalid signature {}: {}", signature, e)))?;

    if function.inputs.len() != arity {
        return Err(Error::Abi(format!(
            "{} expects {} arguments, got {}",
            signature,
            function.inputs.len(),
            arity
        )));
    }
    Ok(function)
}

fn tokenize(kind: &ParamType, arg: &str) -> Result<Token> {
    LenientTokenizer::tokenize(kind, arg)
        .map_err(|e| Error::Abi(format!("cannot parse {} as {}: {}", arg, kind, e)))
}

/// 32 random bytes for CREATE2 salts and authorizer tags
pub fn rand_salt() -> H256 {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    H256::from(salt)
}

/// Parse a user supplied address
///
/// Mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address> {
    let input = input.trim();
    if !ADDRESS_RE.is_match(input) {
        return Err(Error::InvalidAddress(input.to_string()));
    }

    let hex_part = &input[2..];
    let mut raw = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut raw).map_err(|_| Error::InvalidAddress(input.to_string()))?;
    let address = Address::from(raw);

    let is_mixed = hex_part.chars().any(|c| c.is_ascii_lowercase())
        && hex_part.chars().any(|c| c.is_ascii_uppercase());
    if is_mixed && to_checksum(&address, None) != input {
        return Err(Error::InvalidAddress(input.to_string()));
    }

    Ok(address)
}

/// EIP-55 display form
pub fn fmt_address(address: &Address) -> String {
    to_checksum(address, None)
}

/// Comma separated checksum addresses
pub fn join_addresses(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(fmt_address)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn eth_address() -> Address {
    // ETH_ADDRESS is a valid checksum literal
    parse_address(ETH_ADDRESS).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    #[test]
    fn test_b32_round_trip_tag() {
        let role = b32("harvester").unwrap();
        assert_eq!(&role.as_bytes()[..9], b"harvester");
        assert!(role.as_bytes()[9..].iter().all(|b| *b == 0));
        assert_eq!(s32(role.as_bytes()).unwrap(), "harvester");
    }

    #[test]
    fn test_s32_rejects_invalid_utf8() {
        let mut data = [0u8; 32];
        data[..2].copy_from_slice(&[0xff, 0xfe]);
        assert!(matches!(s32(&data), Err(Error::Decode(_))));
    }

    #[test]
    fn test_b32_rejects_long_names() {
        assert!(b32(&"x".repeat(33)).is_err());
        assert!(b32("rôle").is_err());
    }

    #[test]
    fn test_func_selector() {
        assert_eq!(
            hex::encode(func_selector("transfer(address,uint256)")),
            "a9059cbb"
        );
    }

    #[test]
    fn test_abi_encode_with_sig() {
        let to = parse_address("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").unwrap();
        let data = abi_encode_with_sig(
            "transfer(address,uint256)",
            &[Token::Address(to), Token::Uint(U256::from(5))],
        )
        .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[16..36], to.as_bytes());
        assert_eq!(data[67], 5);
    }

    #[test]
    fn test_abi_encode_with_sig_arity() {
        assert!(abi_encode_with_sig("transfer(address,uint256)", &[]).is_err());
    }

    #[test]
    fn test_tokenize_args() {
        let tokens = tokenize_args(
            "transfer(address,uint256)",
            &["0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "100"],
        )
        .unwrap();
        assert_eq!(tokens[1], Token::Uint(U256::from(100)));
        assert!(matches!(tokens[0], Token::Address(_)));
    }

    #[test]
    fn test_parse_address() {
        let lower = parse_address("0xc0b00000e19d71fa50a9bb1fcac2ec92fac9549c").unwrap();
        let checksummed = parse_address(FACTORY_ADDRESS).unwrap();
        assert_eq!(lower, checksummed);
        assert_eq!(fmt_address(&lower), FACTORY_ADDRESS);

        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("c0b00000e19d71fa50a9bb1fcac2ec92fac9549c").is_err());
        // Wrong checksum casing
        assert!(parse_address("0xc0B00000e19D71fA50a9BB1fcaC2eC92fac9549C").is_err());
    }

    #[test]
    fn test_eth_address() {
        assert_eq!(fmt_address(&eth_address()), ETH_ADDRESS);
    }

    #[test]
    fn test_rand_salt_differs() {
        assert_ne!(rand_salt(), rand_salt());
    }
}
