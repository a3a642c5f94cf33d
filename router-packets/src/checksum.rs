/// Computes the internet checksum (RFC 1071) over `bytes`.
///
/// The data is summed as big-endian 16 bit words in one's complement arithmetic, an odd
/// trailing byte is padded with a zero low byte. The folded sum is complemented and
/// returned in host order, ready to be written with `to_be_bytes`. A complement of zero
/// is returned as `0xFFFF`, so the checksum field is never emitted as zero.
///
/// Summing a header that already carries its correct checksum yields `0xFFFF`, which is
/// what `verify_checksum` tests for.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut sum = bytes.chunks(2).fold(0u32, |acc, word| {
        let high = u32::from(word[0]) << 8;
        let low = word.get(1).copied().map_or(0, u32::from);
        acc + (high | low)
    });
    while sum > 0xFFFF {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    match !(sum as u16) {
        0 => 0xFFFF,
        complement => complement,
    }
}

/// True if `bytes`, checksum field included, sums to the all-ones value
pub fn verify_checksum(bytes: &[u8]) -> bool {
    checksum(bytes) == 0xFFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
        0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn known_ipv4_header() {
        assert_eq!(checksum(&IP_HEADER), 0xb8c0);
    }

    #[test]
    fn filled_checksum_sums_to_all_ones() {
        // Each buffer with the offset of its zeroed checksum field
        let buffers: Vec<(Vec<u8>, usize)> = vec![
            (IP_HEADER.to_vec(), 10),
            (vec![0x08, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01, b'h', b'i', b'!'], 2),
            (vec![0xff, 0xff, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff], 2),
            (vec![0x00, 0x01, 0x00, 0x00], 2),
        ];
        for (mut buffer, offset) in buffers {
            let sum = checksum(&buffer);
            buffer[offset..offset + 2].copy_from_slice(&sum.to_be_bytes());
            assert_eq!(checksum(&buffer), 0xFFFF, "buffer {:?}", buffer);
            assert!(verify_checksum(&buffer));
        }
    }

    #[test]
    fn odd_length_pads_low_byte() {
        // 0x0100 + 0x0200 = 0x0300
        assert_eq!(checksum(&[0x01, 0x00, 0x02]), !0x0300);
    }

    #[test]
    fn never_returns_zero() {
        // Words sum to 0xFFFF, whose complement is zero
        assert_eq!(checksum(&[0xff, 0xff]), 0xFFFF);
        assert_eq!(checksum(&[0xf0, 0x0f, 0x0f, 0xf0]), 0xFFFF);
    }

    #[test]
    fn carries_are_folded() {
        // 0xffff + 0x0002 = 0x10001 -> 0x0002
        assert_eq!(checksum(&[0xff, 0xff, 0x00, 0x02]), !0x0002);
    }

    #[test]
    fn corrupted_header_fails_verification() {
        let mut header = IP_HEADER;
        header[10..12].copy_from_slice(&0xb8c0u16.to_be_bytes());
        assert!(verify_checksum(&header));
        header[8] = 0x3f;
        assert!(!verify_checksum(&header));
    }
}
