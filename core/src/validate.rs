//! Validation helpers shared by configuration acceptance paths (spec §6).

use crate::error::EngineError;

/// Validate a DLMM pool address: 32-44 base58 characters decoding to a
/// plausible public-key byte length, without a network round trip.
///
/// Grounded on the base58 handling used for Solana wallet addresses in the
/// pack (`bs58` dependency), since a DLMM pool address is itself a
/// base58-encoded public key.
pub fn validate_pool_address(address: &str) -> Result<(), EngineError> {
    if !(32..=44).contains(&address.len()) {
        return Err(EngineError::validation(format!(
            "poolAddress '{address}' must be 32-44 base58 characters"
        )));
    }
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| EngineError::validation(format!("poolAddress is not valid base58: {e}")))?;
    if !(31..=32).contains(&decoded.len()) {
        return Err(EngineError::validation(format!(
            "poolAddress decodes to {} bytes, expected a 32-byte public key",
            decoded.len()
        )));
    }
    Ok(())
}

/// Clamp `monitoringInterval` (seconds) to the protective floor (spec §6, §8).
pub fn clamp_monitoring_interval(seconds: u64) -> u64 {
    seconds.max(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitoring_interval_is_clamped_to_floor() {
        assert_eq!(clamp_monitoring_interval(1), 5);
        assert_eq!(clamp_monitoring_interval(30), 30);
    }

    #[test]
    fn rejects_too_short_address() {
        assert!(validate_pool_address("short").is_err());
    }

    #[test]
    fn accepts_plausible_pool_address() {
        // 32 zero bytes, base58-encoded - a syntactically valid pubkey shape.
        let addr = bs58::encode([0u8; 32]).into_string();
        assert!(validate_pool_address(&addr).is_ok());
    }
}
