/*++

Licensed under the Apache-2.0 license.

File Name:

    crc8.rs

Abstract:

    File contains the CRC-8 used to protect NV storage and rollback spaces.

--*/

/// Calculate CRC-8 (polynomial x^8 + x^2 + x + 1, initial value 0)
///
/// Computed bit by bit; the protected records are a few bytes long.
///
/// # Arguments
///
/// * `data` - Data to checksum
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}
