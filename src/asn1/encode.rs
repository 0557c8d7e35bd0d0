use bytes::{BufMut, BytesMut};

// ASN.1 BER tag constants
pub const INTEGER_TAG: u8 = 0x02;
pub const OCTET_STRING_TAG: u8 = 0x04;
pub const NULL_TAG: u8 = 0x05;
pub const OBJECT_IDENTIFIER_TAG: u8 = 0x06;
pub const SEQUENCE_TAG: u8 = 0x30;

// SMIv2 application types
pub const IP_ADDRESS_TAG: u8 = 0x40;
pub const COUNTER32_TAG: u8 = 0x41;
pub const GAUGE32_TAG: u8 = 0x42;
pub const TIMETICKS_TAG: u8 = 0x43;
pub const OPAQUE_TAG: u8 = 0x44;
pub const COUNTER64_TAG: u8 = 0x46;

// varbind exceptions (RFC 3416)
pub const NO_SUCH_OBJECT_TAG: u8 = 0x80;
pub const NO_SUCH_INSTANCE_TAG: u8 = 0x81;
pub const END_OF_MIB_VIEW_TAG: u8 = 0x82;

pub const GET_REQUEST_TAG: u8 = 0xA0;
pub const GET_NEXT_REQUEST_TAG: u8 = 0xA1;
pub const GET_RESPONSE_TAG: u8 = 0xA2;
pub const SET_REQUEST_TAG: u8 = 0xA3;
pub const GET_BULK_REQUEST_TAG: u8 = 0xA5;
pub const INFORM_REQUEST_TAG: u8 = 0xA6;
pub const SNMPV2_TRAP_TAG: u8 = 0xA7;
pub const REPORT_TAG: u8 = 0xA8;

// use Definite Form
pub fn encode_length(len: usize, buf: &mut BytesMut) {
    if len < 0x80 {
        //short form - one byte
        buf.put_u8(len as u8);
    } else {
        //long form - mutiple bytes
        let mut bytes = Vec::new();
        let mut temp_len = len;

        while temp_len > 0 {
            bytes.push((temp_len & 0xFF) as u8);
            temp_len >>= 8;
        }

        buf.put_u8(0x80 | bytes.len() as u8);

        for i in bytes.iter().rev() {
            buf.put_u8(*i);
        }
    }
}

/// Encodes an ASN.1 INTEGER into the buffer using the fewest
/// two's-complement octets that hold the value.
pub fn encode_integer(value: i64, buf: &mut BytesMut) {
    buf.put_u8(INTEGER_TAG);

    let mut len = 1;
    while len < 8 {
        let bound = 1i64 << (8 * len - 1);
        if value >= -bound && value < bound {
            break;
        }
        len += 1;
    }

    encode_length(len, buf);

    for i in (0..len).rev() {
        let shift = i * 8;
        buf.put_u8(((value >> shift) & 0xFF) as u8);
    }
}

/// Encodes an unsigned application type (Counter32, Gauge32, TimeTicks,
/// Counter64). A leading zero octet keeps the high bit clear.
pub fn encode_unsigned(tag: u8, value: u64, buf: &mut BytesMut) {
    buf.put_u8(tag);

    let raw = value.to_be_bytes();
    let first = raw.iter().position(|&b| b != 0).unwrap_or(raw.len() - 1);
    let content = &raw[first..];

    if content[0] & 0x80 != 0 {
        encode_length(content.len() + 1, buf);
        buf.put_u8(0x00);
    } else {
        encode_length(content.len(), buf);
    }
    buf.put_slice(content);
}

pub fn encode_octet_string(data: &[u8], buf: &mut BytesMut) {
    encode_tagged(OCTET_STRING_TAG, data, buf);
}

pub fn encode_null(buf: &mut BytesMut) {
    buf.put_u8(NULL_TAG);
    buf.put_u8(0x00);
}

/// Writes a primitive value with an arbitrary tag. Used for IpAddress,
/// Opaque and the zero-length varbind exceptions.
pub fn encode_tagged(tag: u8, content: &[u8], buf: &mut BytesMut) {
    buf.put_u8(tag);
    encode_length(content.len(), buf);
    buf.put_slice(content);
}

/// Encodes content as an ASN.1 sequence with the given tag.
///
/// This function writes a tag byte, encodes the length of the content,
/// and then appends the content itself to the buffer. PDUs are encoded
/// the same way with their context-specific constructed tag.
///
/// # Arguments
///
/// * `content` - A slice of bytes representing the content to be encoded.
/// * `tag` - The ASN.1 tag to be used for the sequence.
/// * `buf` - A mutable reference to a `BytesMut` buffer where the encoded
///   sequence will be written.
pub fn encode_sequence(content: &[u8], tag: u8, buf: &mut BytesMut) {
    buf.put_u8(tag);
    encode_length(content.len(), buf);
    buf.put_slice(content);
    tracing::trace!(tag, len = content.len(), "encoded sequence");
}

fn put_base128(value: u32, buf: &mut BytesMut) {
    let mut bytes = Vec::new();
    let mut temp = value;
    bytes.push((temp & 0x7F) as u8);
    temp >>= 7;

    while temp > 0 {
        bytes.push(((temp & 0x7F) | 0x80) as u8);
        temp >>= 7;
    }

    for b in bytes.iter().rev() {
        buf.put_u8(*b);
    }
}

pub fn encode_oid(oid: &[u32], buf: &mut BytesMut) {
    buf.put_u8(OBJECT_IDENTIFIER_TAG);

    let mut oid_buf = BytesMut::new();

    match oid {
        [] => {}
        [first] => put_base128(40 * first, &mut oid_buf),
        [first, second, rest @ ..] => {
            put_base128(40 * first + second, &mut oid_buf);
            for &num in rest {
                put_base128(num, &mut oid_buf);
            }
        }
    }

    encode_length(oid_buf.len(), buf);
    buf.put_slice(&oid_buf);
}
