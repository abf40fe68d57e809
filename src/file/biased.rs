use crate::file::NmfError;

const BIAS32: i64 = 2_147_483_648;
const BIAS16: i32 = 32_768;

/// Decode a raw biased 32-bit value. The raw value must be at least one;
/// zero is excluded so the wire value range is [-2^31+1, 2^31-1].
pub(crate) fn decode_i32(raw: u32) -> Result<i32, NmfError> {
    if raw < 1 {
        return Err(NmfError::Field { field: "int32" });
    }
    Ok((raw as i64 - BIAS32) as i32)
}

/// Encode a signed 32-bit value with the +2^31 bias. The value -2^31 has
/// no raw representation and is rejected.
pub(crate) fn encode_i32(value: i32) -> Result<u32, NmfError> {
    if value == i32::MIN {
        return Err(NmfError::Field { field: "int32" });
    }
    Ok((value as i64 + BIAS32) as u32)
}

/// Decode a raw biased 16-bit value. The raw value must be at least one.
pub(crate) fn decode_i16(raw: u16) -> Result<i16, NmfError> {
    if raw < 1 {
        return Err(NmfError::Field { field: "int16" });
    }
    Ok((raw as i32 - BIAS16) as i16)
}

/// Encode a signed 16-bit value with the +2^15 bias. The value -2^15 has
/// no raw representation and is rejected.
pub(crate) fn encode_i16(value: i16) -> Result<u16, NmfError> {
    if value == i16::MIN {
        return Err(NmfError::Field { field: "int16" });
    }
    Ok((value as i32 + BIAS16) as u16)
}
