//! IEEE 754 binary16 encoding for escape surfaces.
//!
//! Escape values are uploaded as R16Float texels, so the CPU mirror stores
//! raw half-float bits. Encoding rounds to nearest, ties to even, keeps
//! subnormals and saturates overflow to signed infinity.

/// Bits written for any NaN input.
pub const HALF_NAN: u16 = 0x7E00;
/// Positive infinity. Negative infinity is `HALF_INFINITY | HALF_SIGN`.
pub const HALF_INFINITY: u16 = 0x7C00;
pub const HALF_SIGN: u16 = 0x8000;

/// Largest finite binary16 value.
pub const HALF_MAX: f32 = 65504.0;

/// Encode an `f32` as binary16 bits.
pub fn encode_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x007F_FFFF;

    if exp == 0xFF {
        return if mantissa != 0 {
            HALF_NAN
        } else {
            sign | HALF_INFINITY
        };
    }

    let half_exp = exp - 127 + 15;

    if half_exp >= 0x1F {
        return sign | HALF_INFINITY;
    }

    if half_exp <= 0 {
        // Result is subnormal (or rounds to zero). Shift the full significand,
        // implicit bit included, down to units of 2^-24.
        if half_exp < -10 {
            return sign;
        }
        let significand = mantissa | 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let mut half_mantissa = significand >> shift;
        let round_bit = (significand >> (shift - 1)) & 1;
        let sticky = significand & ((1 << (shift - 1)) - 1);
        if round_bit == 1 && (sticky != 0 || half_mantissa & 1 == 1) {
            // May carry into the exponent field, which yields the smallest
            // normal value: exactly the right encoding.
            half_mantissa += 1;
        }
        return sign | half_mantissa as u16;
    }

    let mut half = ((half_exp as u32) << 10) | (mantissa >> 13);
    let round_bit = (mantissa >> 12) & 1;
    let sticky = mantissa & 0x0FFF;
    if round_bit == 1 && (sticky != 0 || half & 1 == 1) {
        // Carry out of the mantissa bumps the exponent; at the top of the
        // range it lands on 0x7C00 (infinity), as it should.
        half += 1;
    }
    sign | half as u16
}

/// Decode binary16 bits to `f32`. Exact for every input.
pub fn decode_f16(bits: u16) -> f32 {
    let negative = bits & HALF_SIGN != 0;
    let exp = ((bits >> 10) & 0x1F) as u32;
    let mantissa = (bits & 0x03FF) as u32;
    let sign = if negative { 0x8000_0000 } else { 0 };

    match exp {
        0 => {
            // Zero or subnormal: mantissa * 2^-24 is exact in f32.
            let magnitude = mantissa as f32 * f32::from_bits(0x3380_0000);
            if negative {
                -magnitude
            } else {
                magnitude
            }
        }
        0x1F => f32::from_bits(sign | 0x7F80_0000 | (mantissa << 13)),
        _ => f32::from_bits(sign | ((exp + 127 - 15) << 23) | (mantissa << 13)),
    }
}

/// Encode a slice of `f32` into half-float bits.
pub fn encode_slice(values: &[f32], out: &mut [u16]) {
    for (dst, &src) in out.iter_mut().zip(values) {
        *dst = encode_f16(src);
    }
}
