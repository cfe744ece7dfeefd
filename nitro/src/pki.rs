use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use secp256k1::{ecdsa::Signature, Keypair, Message, PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Human-readable prefix of account addresses.
pub const ADDRESS_PREFIX: &str = "nitro1";
const ADDRESS_BYTES: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PubKey(pub PublicKey);

impl PubKey {
    pub fn to_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }

    pub fn address(&self) -> String {
        address_of(self)
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", faster_hex::hex_string(&self.to_bytes()))
    }
}

impl BorshSerialize for PubKey {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.0.serialize())
    }
}

impl BorshDeserialize for PubKey {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut buf = [0u8; 33];
        reader.read_exact(&mut buf)?;
        PublicKey::from_slice(&buf).map(PubKey).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sig(pub Signature);

impl BorshSerialize for Sig {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.0.serialize_compact())
    }
}

impl BorshDeserialize for Sig {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut buf = [0u8; 64];
        reader.read_exact(&mut buf)?;
        Signature::from_compact(&buf).map(Sig).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

pub fn generate_keypair() -> (SecretKey, PubKey) {
    let (sk, pk) = SECP256K1.generate_keypair(&mut secp256k1::rand::thread_rng());
    (sk, PubKey(pk))
}

pub fn keypair_from_hex(sk_hex: &str) -> Option<Keypair> {
    let mut private_key_bytes = [0u8; 32];
    faster_hex::hex_decode(sk_hex.trim().as_bytes(), &mut private_key_bytes).ok()?;
    Keypair::from_seckey_slice(SECP256K1, &private_key_bytes).ok()
}

/// SHA-256 over the borsh encoding of `data`.
pub fn to_message<T: BorshSerialize>(data: &T) -> Message {
    let bytes = borsh::to_vec(data).expect("borsh serialization into a Vec does not fail");
    let digest: [u8; 32] = Sha256::digest(&bytes).into();
    Message::from_digest(digest)
}

pub fn sign_message(sk: &SecretKey, msg: &Message) -> Sig {
    Sig(SECP256K1.sign_ecdsa(msg, sk))
}

pub fn verify_signature(pk: &PubKey, msg: &Message, sig: &Sig) -> bool {
    SECP256K1.verify_ecdsa(msg, &sig.0, &pk.0).is_ok()
}

/// `nitro1` followed by the hex of the first 20 bytes of SHA-256(compressed pubkey).
pub fn address_of(pk: &PubKey) -> String {
    let digest = Sha256::digest(pk.to_bytes());
    format!("{ADDRESS_PREFIX}{}", faster_hex::hex_string(&digest[..ADDRESS_BYTES]))
}
