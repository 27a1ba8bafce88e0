use crate::hue::models::ColorUpdate;

/// Size of the fixed message header
pub const HEADER_LEN: usize = 16;
/// Size of one light record
pub const LIGHT_RECORD_LEN: usize = 9;

const PROTOCOL_NAME: &[u8; 9] = b"HueStream";
const DEVICE_TYPE_LIGHT: u8 = 0x00;
const COLOR_SPACE_RGB: u8 = 0x00;

/// Creates a Hue Entertainment streaming message (API v1).
///
/// Format:
/// - 16-byte Header:
///   - 9 bytes: "HueStream" (protocol name)
///   - 2 bytes: Version (0x01, 0x00 for v1.0)
///   - 1 byte:  Sequence number (ignored by the bridge)
///   - 2 bytes: Reserved (0x00, 0x00)
///   - 1 byte:  Color space (0x00 = RGB)
///   - 1 byte:  Reserved (0x00)
/// - N x 9-byte Light Data:
///   - 1 byte:  Device type (0x00 = light)
///   - 2 bytes: Light ID (16-bit BE)
///   - 6 bytes: RGB, 3x 16-bit BE
pub fn create_message(sequence: u8, updates: &[ColorUpdate]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + updates.len() * LIGHT_RECORD_LEN);

    buffer.extend_from_slice(PROTOCOL_NAME);
    buffer.extend_from_slice(&[0x01, 0x00]);
    buffer.push(sequence);
    buffer.extend_from_slice(&[0x00, 0x00]);
    buffer.push(COLOR_SPACE_RGB);
    buffer.push(0x00);

    for update in updates {
        buffer.push(DEVICE_TYPE_LIGHT);
        buffer.extend_from_slice(&update.light_id.to_be_bytes());
        buffer.extend_from_slice(&update.color.r.to_be_bytes());
        buffer.extend_from_slice(&update.color.g.to_be_bytes());
        buffer.extend_from_slice(&update.color.b.to_be_bytes());
    }

    buffer
}

/// Overwrite the sequence number of an encoded message
pub fn set_sequence(message: &mut [u8], sequence: u8) {
    if message.len() >= HEADER_LEN {
        message[11] = sequence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx::Rgb16;

    fn update(light_id: u16, color: Rgb16) -> ColorUpdate {
        ColorUpdate {
            fixture_id: light_id.to_string(),
            light_id,
            color,
        }
    }

    #[test]
    fn test_header_layout() {
        let msg = create_message(7, &[]);
        assert_eq!(msg.len(), HEADER_LEN);
        assert_eq!(&msg[0..9], b"HueStream");
        assert_eq!(&msg[9..11], &[0x01, 0x00]);
        assert_eq!(msg[11], 7);
        assert_eq!(&msg[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_light_records() {
        let msg = create_message(
            0,
            &[
                update(1, Rgb16::new(0x0A0A, 0x1414, 0x1E1E)),
                update(0x0102, Rgb16::new(65535, 0, 1)),
            ],
        );
        assert_eq!(msg.len(), HEADER_LEN + 2 * LIGHT_RECORD_LEN);
        assert_eq!(
            &msg[16..25],
            &[0x00, 0x00, 0x01, 0x0A, 0x0A, 0x14, 0x14, 0x1E, 0x1E]
        );
        assert_eq!(
            &msg[25..34],
            &[0x00, 0x01, 0x02, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_set_sequence() {
        let mut msg = create_message(1, &[update(3, Rgb16::BLACK)]);
        set_sequence(&mut msg, 200);
        assert_eq!(msg[11], 200);
    }
}
