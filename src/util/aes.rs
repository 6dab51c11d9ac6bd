use tracing::instrument;

use crate::{
    common::KeyBytes,
    disc::{wii::HASHES_SIZE, SECTOR_SIZE},
    util::array_ref,
};

/// Decrypts data in-place using AES-128-CBC with the given key and IV.
pub fn aes_cbc_decrypt(key: &KeyBytes, iv: &KeyBytes, data: &mut [u8]) {
    use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
    assert_eq!(data.len() % 16, 0);
    <cbc::Decryptor<aes::Aes128>>::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .unwrap();
}

/// Decrypts data buffer-to-buffer using AES-128-CBC with the given key and IV.
pub fn aes_cbc_decrypt_b2b(key: &KeyBytes, iv: &KeyBytes, data: &[u8], out: &mut [u8]) {
    use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
    assert_eq!(data.len() % 16, 0);
    assert_eq!(data.len(), out.len());
    <cbc::Decryptor<aes::Aes128>>::new(key.into(), iv.into())
        .decrypt_padded_b2b_mut::<NoPadding>(data, out)
        .unwrap();
}

/// Decrypts a Wii partition sector buffer-to-buffer.
///
/// The hash block is encrypted with a zero IV; the data IV is carried inside
/// the encrypted hash block at offset 0x3D0.
#[instrument(skip_all)]
pub fn decrypt_sector_b2b(data: &[u8; SECTOR_SIZE], out: &mut [u8; SECTOR_SIZE], key: &KeyBytes) {
    let iv = *array_ref![data, 0x3D0, 16];
    aes_cbc_decrypt_b2b(key, &[0u8; 16], &data[..HASHES_SIZE], &mut out[..HASHES_SIZE]);
    aes_cbc_decrypt_b2b(key, &iv, &data[HASHES_SIZE..], &mut out[HASHES_SIZE..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIST SP 800-38A F.2.2 (CBC-AES128.Decrypt, first block)
    #[test]
    fn test_aes_cbc_decrypt() {
        let key: KeyBytes = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ];
        let iv: KeyBytes = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let mut data = [
            0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9,
            0x19, 0x7d,
        ];
        let expected = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];
        let mut out = [0u8; 16];
        aes_cbc_decrypt_b2b(&key, &iv, &data, &mut out);
        assert_eq!(out, expected);
        aes_cbc_decrypt(&key, &iv, &mut data);
        assert_eq!(data, expected);
    }
}
