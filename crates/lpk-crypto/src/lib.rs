//! Cryptographic primitives for LPK archives
//!
//! This crate provides the two pieces of key material handling that the
//! archive engine builds on:
//!
//! - **Hashing**: crypt-table name hashing producing a slot hash and two
//!   verifier hashes per path ([`NameHash`])
//! - **Encryption**: per-entry payload ciphers behind the [`PayloadCipher`]
//!   trait ([`XorCipher`], [`TeaCipher`], [`XxteaCipher`])
//!
//! # Examples
//!
//! ## Name hashing
//!
//! ```
//! use lpk_crypto::NameHash;
//!
//! let hash = NameHash::of("sprites/hero.png");
//! assert_eq!(hash, NameHash::of("SPRITES\\HERO.PNG"));
//! ```
//!
//! ## Payload encryption
//!
//! ```
//! use lpk_crypto::{PayloadCipher, XxteaCipher};
//!
//! let mut data = vec![0u8; XxteaCipher.padded_len(5)];
//! data[..5].copy_from_slice(b"hello");
//! XxteaCipher.encrypt(&mut data, b"key", 0x1234)?;
//! XxteaCipher.decrypt(&mut data, b"key", 0x1234)?;
//! assert_eq!(&data[..5], b"hello");
//! # Ok::<(), lpk_crypto::CryptoError>(())
//! ```

#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod hash;
pub mod tea;
pub mod xor;
pub mod xxtea;

pub use cipher::{PayloadCipher, derive_key128};
pub use error::CryptoError;
pub use hash::{NameHash, hash_string, hash_tag, normalize_path};
pub use tea::TeaCipher;
pub use xor::XorCipher;
pub use xxtea::XxteaCipher;
