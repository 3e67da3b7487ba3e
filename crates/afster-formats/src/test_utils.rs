//! Test utilities for format round-trip testing

use crate::AfsterFormat;
use std::fmt::Debug;

/// Build `original`, parse the bytes back and require an equal value
pub fn test_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: AfsterFormat + PartialEq + Debug,
{
    let data = original.build()?;
    let parsed = T::parse(&data)?;

    if original != &parsed {
        return Err(format!(
            "Round-trip verification failed:\nOriginal: {:?}\nParsed: {:?}",
            original, parsed
        )
        .into());
    }

    Ok(())
}

/// Parse `data`, rebuild it and require the rebuilt bytes to parse equal
pub fn test_round_trip_with_data<T>(data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: AfsterFormat + PartialEq + Debug,
{
    let parsed = T::parse(data)?;
    let rebuilt = parsed.build()?;
    let reparsed = T::parse(&rebuilt)?;

    if parsed != reparsed {
        return Err(format!(
            "Round-trip with data failed:\nParsed: {:?}\nReparsed: {:?}",
            parsed, reparsed
        )
        .into());
    }

    Ok(())
}

/// Require parsing `invalid_data` to fail
pub fn test_invalid_data_rejected<T>(invalid_data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: AfsterFormat,
{
    match T::parse(invalid_data) {
        Ok(_) => Err("Expected parsing to fail for invalid data, but it succeeded".into()),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::afl::AflFile;
    use crate::afs::AfsIndex;

    #[test]
    fn test_invalid_inputs_rejected() {
        test_invalid_data_rejected::<AfsIndex>(b"").expect("Should reject empty data");
        test_invalid_data_rejected::<AfsIndex>(b"AFL\0\0\0\0\0")
            .expect("Should reject wrong magic");
        test_invalid_data_rejected::<AflFile>(b"AFS\0").expect("Should reject short data");
    }
}
