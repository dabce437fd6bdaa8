//! Error-correction codec boundary (§6: "Reed–Solomon codec (consumed)").
//!
//! The codec is a black box to the rest of the core: `encode(src[k] ->
//! dst[n])` and `decode(src[n] -> dst[k])` returning success/failure, where
//! `n = nDataBitsPerTx/8` and `k = n - nECCBytesPerTx`. Modeling it as a
//! trait keeps the modulator/demodulator ignorant of which concrete RS
//! implementation backs it, and lets tests substitute a codec double.

use crate::errors::{CoreError, DecodeError};

pub trait EccCodec: Send {
    /// Systematic-encode `src` (length `k`) into `dst` (length `n`).
    fn encode(&self, src: &[u8], dst: &mut [u8]);

    /// Attempt to repair a received codeword (length `n`) into the original
    /// message (length `k`), written into `dst`. Returns `true` on success;
    /// `false` means the codeword was uncorrectable and the frame must be
    /// discarded (§7.iii) — never propagated as an error.
    fn decode(&self, src: &[u8], dst: &mut [u8]) -> bool;
}

/// Adapter around the `reed-solomon` crate's systematic RS(n, k) codec.
pub struct ReedSolomonCodec {
    ecc_len: usize,
}

impl ReedSolomonCodec {
    /// Construct a codec for `ecc_len` parity bytes. Per §6, this is only
    /// ever called from `DataOn` handling, and only when `k > 0 &&
    /// nECCBytesPerTx > 0`; the caller is responsible for that precondition
    /// (see `crate::core_loop`).
    pub fn new(ecc_len: usize) -> Result<Self, CoreError> {
        if ecc_len == 0 {
            return Err(CoreError::Decode(DecodeError::CodecConstructionFailed {
                reason: "ecc_len must be positive".into(),
            }));
        }
        Ok(Self { ecc_len })
    }
}

impl EccCodec for ReedSolomonCodec {
    fn encode(&self, src: &[u8], dst: &mut [u8]) {
        let encoder = reed_solomon::Encoder::new(self.ecc_len);
        let encoded = encoder.encode(src);
        debug_assert_eq!(encoded.len(), dst.len());
        dst.copy_from_slice(&encoded[..]);
    }

    fn decode(&self, src: &[u8], dst: &mut [u8]) -> bool {
        let decoder = reed_solomon::Decoder::new(self.ecc_len);
        let mut buf = src.to_vec();
        match decoder.correct(&mut buf, None) {
            Ok(recovered) => {
                let data = recovered.data();
                if data.len() != dst.len() {
                    return false;
                }
                dst.copy_from_slice(data);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_errors() {
        let codec = ReedSolomonCodec::new(4).unwrap();
        let src = [1u8, 2, 3, 4, 5];
        let mut encoded = vec![0u8; src.len() + 4];
        codec.encode(&src, &mut encoded);

        let mut decoded = vec![0u8; src.len()];
        assert!(codec.decode(&encoded, &mut decoded));
        assert_eq!(decoded, src);
    }

    #[test]
    fn repairs_a_single_flipped_byte() {
        let codec = ReedSolomonCodec::new(4).unwrap();
        let src = [10u8, 20, 30, 40, 50, 60, 70, 80];
        let mut encoded = vec![0u8; src.len() + 4];
        codec.encode(&src, &mut encoded);

        encoded[2] ^= 0xFF;

        let mut decoded = vec![0u8; src.len()];
        assert!(codec.decode(&encoded, &mut decoded));
        assert_eq!(decoded, src);
    }
}
