//! Int4 packing: two values per byte, low nibble first in linear element order.

/// Pack unsigned 4-bit values (`0..=15`); higher bits are dropped.
pub fn pack_u4(values: &[u8]) -> Vec<u8> {
    values
        .chunks(2)
        .map(|pair| {
            let low = pair[0] & 0x0F;
            let high = pair.get(1).map_or(0, |value| value & 0x0F);
            low | (high << 4)
        })
        .collect()
}

/// Pack signed 4-bit values (`-8..=7`) in two's complement.
pub fn pack_s4(values: &[i8]) -> Vec<u8> {
    let nibbles: Vec<u8> = values.iter().map(|&value| (value as u8) & 0x0F).collect();
    pack_u4(&nibbles)
}

/// Unsigned nibble for element `index` of a packed buffer byte.
#[inline]
pub fn nibble(byte: u8, index: usize) -> u8 {
    if index.is_multiple_of(2) { byte & 0x0F } else { byte >> 4 }
}

/// Sign-extend a 4-bit two's-complement value.
#[inline]
pub fn sign_extend_s4(nibble: u8) -> i8 {
    ((nibble << 4) as i8) >> 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_low_nibble_first() {
        assert_eq!(pack_u4(&[1, 2, 3]), vec![0x21, 0x03]);
        assert_eq!(nibble(0x21, 0), 1);
        assert_eq!(nibble(0x21, 1), 2);
    }

    #[test]
    fn signed_values_survive_packing() {
        let values = [-8, -1, 0, 7];
        let packed = pack_s4(&values);
        let unpacked: Vec<i8> = (0..values.len())
            .map(|i| sign_extend_s4(nibble(packed[i / 2], i)))
            .collect();
        assert_eq!(unpacked, values);
    }
}
