use super::types::Signature;
use super::wire::{self, WireAction};
use crate::core::errors::ExchangeError;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use std::fmt;
use zeroize::Zeroizing;

// EIP-712 domain every L1 action is signed under
pub const CHAIN_ID: u64 = 1337;
pub const DOMAIN_NAME: &str = "Exchange";
pub const DOMAIN_VERSION: &str = "1";
pub const VERIFYING_CONTRACT: [u8; 20] = [0u8; 20];

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const AGENT_TYPE: &str = "Agent(string source,bytes32 connectionId)";

pub const MAINNET_SOURCE: &str = "a";
pub const TESTNET_SOURCE: &str = "b";

#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Keccak256::digest(data));
    hash
}

/// Hash binding an action to its nonce and optional vault.
///
/// `keccak256(msgpack(action) ‖ nonce as u64 BE ‖ 0x00)` without a vault,
/// `… ‖ 0x01 ‖ 20 vault bytes` with one.
pub fn action_hash<T: WireAction>(
    action: &T,
    nonce: u64,
    vault_address: Option<&str>,
) -> Result<[u8; 32], ExchangeError> {
    let mut data = wire::encode_action(action)?;
    data.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => data.push(0x00),
        Some(vault) => {
            data.push(0x01);
            data.extend_from_slice(&wire::address_bytes(vault)?);
        }
    }
    Ok(keccak256(&data))
}

pub fn domain_separator() -> [u8; 32] {
    let mut chain_id = [0u8; 32];
    chain_id[24..].copy_from_slice(&CHAIN_ID.to_be_bytes());
    let mut contract = [0u8; 32];
    contract[12..].copy_from_slice(&VERIFYING_CONTRACT);

    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak256(DOMAIN_NAME.as_bytes()));
    encoded.extend_from_slice(&keccak256(DOMAIN_VERSION.as_bytes()));
    encoded.extend_from_slice(&chain_id);
    encoded.extend_from_slice(&contract);
    keccak256(&encoded)
}

fn agent_struct_hash(source: &str, connection_id: &[u8; 32]) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(3 * 32);
    encoded.extend_from_slice(&keccak256(AGENT_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak256(source.as_bytes()));
    encoded.extend_from_slice(connection_id);
    keccak256(&encoded)
}

/// Final EIP-712 digest of `Agent { source, connectionId }`
pub fn typed_data_digest(connection_id: &[u8; 32], is_mainnet: bool) -> [u8; 32] {
    let source = if is_mainnet {
        MAINNET_SOURCE
    } else {
        TESTNET_SOURCE
    };
    let mut encoded = Vec::with_capacity(2 + 2 * 32);
    encoded.extend_from_slice(&[0x19, 0x01]);
    encoded.extend_from_slice(&domain_separator());
    encoded.extend_from_slice(&agent_struct_hash(source, connection_id));
    keccak256(&encoded)
}

/// Secp256k1 signer for L1 actions. Holds the key for the life of the client.
#[derive(Clone)]
pub struct HyperliquidSigner {
    secret_key: SecretKey,
    wallet_address: String,
    secp: Secp256k1<secp256k1::All>,
}

impl fmt::Debug for HyperliquidSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperliquidSigner")
            .field("wallet_address", &self.wallet_address)
            .finish_non_exhaustive()
    }
}

impl HyperliquidSigner {
    /// Parse a 32-byte hex key, with or without `0x`
    pub fn with_private_key(private_key: &str) -> Result<Self, ExchangeError> {
        let raw = Zeroizing::new(
            hex::decode(private_key.trim().trim_start_matches("0x"))
                .map_err(|e| ExchangeError::key(format!("Invalid private key hex: {}", e)))?,
        );
        if raw.len() != 32 {
            return Err(ExchangeError::key(format!(
                "Private key must be 32 bytes, got {}",
                raw.len()
            )));
        }
        let secret_key = SecretKey::from_slice(&raw)
            .map_err(|e| ExchangeError::key(format!("Invalid private key: {}", e)))?;

        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let wallet_address = public_key_to_address(&public_key);

        Ok(Self {
            secret_key,
            wallet_address,
            secp,
        })
    }

    /// Lowercase `0x` address derived from the key
    pub fn wallet_address(&self) -> &str {
        &self.wallet_address
    }

    /// Sign the typed-data digest built around `connection_id`
    pub fn sign(
        &self,
        connection_id: &[u8; 32],
        is_mainnet: bool,
    ) -> Result<Signature, ExchangeError> {
        let digest = typed_data_digest(connection_id, is_mainnet);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ExchangeError::key(format!("Failed to create message: {}", e)))?;

        // RFC 6979 nonces: same key and digest always give the same signature
        let signature = self.secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        Ok(Signature {
            r: format!("0x{}", hex::encode(&compact[..32])),
            s: format!("0x{}", hex::encode(&compact[32..])),
            v: 27 + recovery_id.to_i32() as u8,
        })
    }

    pub fn sign_l1_action<T: WireAction>(
        &self,
        action: &T,
        nonce: u64,
        vault_address: Option<&str>,
        is_mainnet: bool,
    ) -> Result<Signature, ExchangeError> {
        let connection_id = action_hash(action, nonce, vault_address)?;
        self.sign(&connection_id, is_mainnet)
    }
}

/// Address that produced `signature` over the digest for `connection_id`
pub fn recover_address(
    connection_id: &[u8; 32],
    is_mainnet: bool,
    signature: &Signature,
) -> Result<String, ExchangeError> {
    let decode = |part: &str| {
        hex::decode(part.trim_start_matches("0x"))
            .map_err(|e| ExchangeError::key(format!("Invalid signature hex: {}", e)))
    };
    let mut compact = decode(&signature.r)?;
    compact.extend(decode(&signature.s)?);

    let recovery_id = RecoveryId::from_i32(i32::from(signature.v) - 27)
        .map_err(|e| ExchangeError::key(format!("Invalid recovery id: {}", e)))?;
    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| ExchangeError::key(format!("Invalid signature: {}", e)))?;

    let digest = typed_data_digest(connection_id, is_mainnet);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ExchangeError::key(format!("Failed to create message: {}", e)))?;
    let public_key = Secp256k1::verification_only()
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| ExchangeError::key(format!("Recovery failed: {}", e)))?;

    Ok(public_key_to_address(&public_key))
}

fn public_key_to_address(public_key: &PublicKey) -> String {
    let public_key_bytes = public_key.serialize_uncompressed();

    // Drop the 0x04 prefix, keep the last 20 bytes of the hash
    let hash = keccak256(&public_key_bytes[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Millisecond wall-clock nonce
pub fn generate_nonce() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::hyperliquid::types::{Action, BulkCancel, CancelWire};

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn cancel_action() -> Action {
        Action::Cancel(BulkCancel {
            cancels: vec![CancelWire { asset: 0, oid: 1 }],
        })
    }

    #[test]
    fn test_keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_domain_type_hash() {
        assert_eq!(
            hex::encode(keccak256(DOMAIN_TYPE.as_bytes())),
            "8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f"
        );
    }

    #[test]
    fn test_address_derivation() {
        let signer = HyperliquidSigner::with_private_key(KEY_ONE).unwrap();
        assert_eq!(
            signer.wallet_address(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(
            HyperliquidSigner::with_private_key("not hex"),
            Err(ExchangeError::KeyError(_))
        ));
        assert!(matches!(
            HyperliquidSigner::with_private_key("0x1234"),
            Err(ExchangeError::KeyError(_))
        ));
        // zero is outside the curve order range
        assert!(matches!(
            HyperliquidSigner::with_private_key(&"00".repeat(32)),
            Err(ExchangeError::KeyError(_))
        ));
    }

    #[test]
    fn test_action_hash_depends_on_nonce_and_vault() {
        let action = cancel_action();
        let base = action_hash(&action, 1_700_000_000_000, None).unwrap();
        assert_eq!(base, action_hash(&action, 1_700_000_000_000, None).unwrap());
        assert_ne!(base, action_hash(&action, 1_700_000_000_001, None).unwrap());

        let vault = "0x1111111111111111111111111111111111111111";
        assert_ne!(
            base,
            action_hash(&action, 1_700_000_000_000, Some(vault)).unwrap()
        );
    }

    #[test]
    fn test_action_hash_layout() {
        let action = cancel_action();
        let nonce = 42u64;
        let mut expected = wire::encode_action(&action).unwrap();
        expected.extend_from_slice(&nonce.to_be_bytes());
        expected.push(0x00);
        assert_eq!(action_hash(&action, nonce, None).unwrap(), keccak256(&expected));
    }

    #[test]
    fn test_signature_is_deterministic_and_recoverable() {
        let signer = HyperliquidSigner::with_private_key(KEY_ONE).unwrap();
        let action = cancel_action();

        let first = signer.sign_l1_action(&action, 7, None, true).unwrap();
        let second = signer.sign_l1_action(&action, 7, None, true).unwrap();
        assert_eq!(first, second);
        assert!(first.v == 27 || first.v == 28);
        assert_eq!(first.r.len(), 66);
        assert_eq!(first.s.len(), 66);

        let connection_id = action_hash(&action, 7, None).unwrap();
        assert_eq!(
            recover_address(&connection_id, true, &first).unwrap(),
            signer.wallet_address()
        );
    }

    #[test]
    fn test_network_changes_signature() {
        let signer = HyperliquidSigner::with_private_key(KEY_ONE).unwrap();
        let connection_id = [7u8; 32];
        let mainnet = signer.sign(&connection_id, true).unwrap();
        let testnet = signer.sign(&connection_id, false).unwrap();
        assert_ne!(mainnet, testnet);
        assert_ne!(
            typed_data_digest(&connection_id, true),
            typed_data_digest(&connection_id, false)
        );
        // a testnet signature does not recover to the signer under mainnet rules
        assert_ne!(
            recover_address(&connection_id, true, &testnet).unwrap(),
            signer.wallet_address()
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = HyperliquidSigner::with_private_key(KEY_ONE).unwrap();
        let debug = format!("{:?}", signer);
        assert!(debug.contains("0x7e5f"));
        assert!(!debug.contains(&"0".repeat(63)));
    }

    #[derive(serde::Serialize)]
    struct Dummy {
        #[serde(rename = "type")]
        kind: &'static str,
        num: u64,
    }

    impl wire::sealed::Sealed for Dummy {}
    impl WireAction for Dummy {}

    #[test]
    fn test_l1_signature_matches_reference_vector() {
        let signer = HyperliquidSigner::with_private_key(
            "0x0123456789012345678901234567890123456789012345678901234567890123",
        )
        .unwrap();
        let action = Dummy {
            kind: "dummy",
            num: 100_000_000_000,
        };

        let mainnet = signer.sign_l1_action(&action, 0, None, true).unwrap();
        assert_eq!(
            mainnet,
            Signature {
                r: "0x053749d5b30552aeb2fca34b530185976545bb22d0b3ce6f62e31be961a59298".to_string(),
                s: "0x755c40ba9bf05223521753995abb2f73ab3229be8ec921f350cb447e384d8ed8".to_string(),
                v: 27,
            }
        );

        let testnet = signer.sign_l1_action(&action, 0, None, false).unwrap();
        assert_eq!(
            testnet,
            Signature {
                r: "0x542af61ef1f429707e3c76c5293c80d01f74ef853e34b76efffcb57e574f9510".to_string(),
                s: "0x17b8b32f086e8cdede991f1e2c529f5dd5297cbe8128500e00cbaf766204a613".to_string(),
                v: 28,
            }
        );
    }

    #[test]
    fn test_generate_nonce_is_milliseconds() {
        let nonce = generate_nonce();
        assert!(nonce > 1_600_000_000_000);
    }
}
