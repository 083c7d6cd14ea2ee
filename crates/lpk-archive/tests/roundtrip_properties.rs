#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Property tests: whatever goes into an archive comes back out unchanged

use lpk_archive::{
    ArchiveBuilder, CompressionAlgorithm, EncryptionAlgorithm, FileSpec, LpkArchive, Platform,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn compression() -> impl Strategy<Value = Option<CompressionAlgorithm>> {
    prop_oneof![
        Just(None),
        Just(Some(CompressionAlgorithm::None)),
        Just(Some(CompressionAlgorithm::Zlib)),
        Just(Some(CompressionAlgorithm::Default)),
    ]
}

fn encryption() -> impl Strategy<Value = Option<EncryptionAlgorithm>> {
    prop_oneof![
        Just(None),
        Just(Some(EncryptionAlgorithm::Xor)),
        Just(Some(EncryptionAlgorithm::Tea)),
        Just(Some(EncryptionAlgorithm::Xxtea)),
    ]
}

fn platform() -> impl Strategy<Value = Platform> {
    prop_oneof![
        Just(Platform::Default),
        Just(Platform::Ios),
        Just(Platform::Android),
    ]
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    locale: u16,
    platform: Platform,
    data: Vec<u8>,
    compression: Option<CompressionAlgorithm>,
    encryption: Option<EncryptionAlgorithm>,
    crc: bool,
}

fn entry() -> impl Strategy<Value = Entry> {
    (
        "[a-z]{1,8}(/[a-z0-9_]{1,8}){0,2}\\.[a-z]{3}",
        prop_oneof![Just(0u16), Just(0x0409u16)],
        platform(),
        prop::collection::vec(any::<u8>(), 0..2048),
        compression(),
        encryption(),
        any::<bool>(),
    )
        .prop_map(
            |(name, locale, platform, data, compression, encryption, crc)| Entry {
                name,
                locale,
                platform,
                data,
                compression,
                encryption,
                crc,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn extract_returns_what_was_built(
        entries in prop::collection::vec(entry(), 1..24),
        block_code in 0u16..3,
        key in prop::collection::vec(any::<u8>(), 1..24),
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prop.lpk");

        let mut builder = ArchiveBuilder::new().capacity(8).block_size_code(block_code);
        // later adds replace earlier ones with the same variant
        let mut expected = BTreeMap::new();
        for e in &entries {
            let mut spec = FileSpec::new(e.name.clone(), e.data.clone())
                .locale(e.locale)
                .platform(e.platform);
            if let Some(alg) = e.compression {
                spec = spec.compressed(alg);
            }
            if let Some(alg) = e.encryption {
                spec = spec.encrypted(alg, key.clone());
            }
            if e.crc {
                spec = spec.with_crc();
            }
            builder = builder.add(spec);
            expected.insert(
                (e.name.to_ascii_uppercase(), e.locale, u16::from(e.platform)),
                e.clone(),
            );
        }
        builder.write_to(&path).unwrap();

        let archive = LpkArchive::open(&path).unwrap();
        prop_assert_eq!(archive.count_used(), expected.len());

        for e in expected.values() {
            let size = archive.file_size(&e.name, e.locale, e.platform).unwrap();
            prop_assert_eq!(size as usize, e.data.len());

            let key = e.encryption.map(|_| key.as_slice());
            let data = archive
                .extract(&e.name, key, e.locale, e.platform)
                .map_err(|err| TestCaseError::fail(format!("{}: {err}", e.name)))?;
            prop_assert_eq!(&data, &e.data);
        }
    }
}
