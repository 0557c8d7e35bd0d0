use crate::asn1::encode;
use anyhow::{Result, anyhow};
use bytes::{Buf, Bytes};
use std::error::Error;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum Asn1Error {
    InvalidTag { expected: u8, found: u8 },
    InvalidLength,
    UnexpectedEndOfData,
    UnsupportedEncoding,
}

impl fmt::Display for Asn1Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Asn1Error::InvalidTag { expected, found } => {
                write!(f, "Invalid tag: expected 0x{:02x}, got 0x{:02x}", expected, found)
            }
            Asn1Error::InvalidLength => write!(f, "Invalid length"),
            Asn1Error::UnexpectedEndOfData => write!(f, "Unexpected end of data"),
            Asn1Error::UnsupportedEncoding => write!(f, "Unsupported encoding"),
        }
    }
}

impl Error for Asn1Error {}

pub fn peek_tag(buf: &Bytes) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(anyhow!("Buffer underflow when peeking tag"));
    }
    Ok(buf[0])
}

pub fn decode_tag(buf: &mut Bytes) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(anyhow!("Buffer underflow when decoding tag"));
    }
    Ok(buf.get_u8())
}

fn expect_tag(buf: &mut Bytes, expected: u8) -> Result<()> {
    let found = decode_tag(buf)?;
    if found != expected {
        return Err(Asn1Error::InvalidTag { expected, found }.into());
    }
    Ok(())
}

pub fn decode_length(buf: &mut Bytes) -> Result<usize> {
    if buf.remaining() < 1 {
        return Err(anyhow!("Buffer underflow when decoding length"));
    }

    let first_byte = buf.get_u8();

    if first_byte < 0x80 {
        // Short form
        return Ok(first_byte as usize);
    }

    // Long form
    let num_bytes = first_byte & 0x7F;
    if num_bytes == 0 {
        // indefinite form never appears in SNMP
        return Err(Asn1Error::UnsupportedEncoding.into());
    }
    if num_bytes > 4 {
        return Err(anyhow!("Length encoding too large: {} bytes", num_bytes));
    }

    if buf.remaining() < num_bytes as usize {
        return Err(anyhow!("Buffer underflow when decoding long form length"));
    }

    let mut length: usize = 0;
    for _ in 0..num_bytes {
        length = (length << 8) | (buf.get_u8() as usize);
    }

    Ok(length)
}

/// Reads one TLV of any tag and returns the tag with its content.
pub fn decode_tlv(buf: &mut Bytes) -> Result<(u8, Bytes)> {
    let tag = decode_tag(buf)?;
    let length = decode_length(buf)?;

    if buf.remaining() < length {
        return Err(anyhow!(
            "Buffer underflow when decoding content of tag 0x{:02x}",
            tag
        ));
    }

    Ok((tag, buf.split_to(length)))
}

pub fn decode_sequence(buf: &mut Bytes) -> Result<Bytes> {
    let (tag, content) = decode_tlv(buf)?;
    if tag != encode::SEQUENCE_TAG {
        return Err(Asn1Error::InvalidTag {
            expected: encode::SEQUENCE_TAG,
            found: tag,
        }
        .into());
    }
    Ok(content)
}

pub fn decode_integer(buf: &mut Bytes) -> Result<i64> {
    expect_tag(buf, encode::INTEGER_TAG)?;

    let length = decode_length(buf)?;

    if length == 0 {
        return Err(Asn1Error::InvalidLength.into());
    }
    if length > 8 {
        return Err(anyhow!("INTEGER too large: {} bytes", length));
    }

    if buf.remaining() < length {
        return Err(anyhow!("Buffer underflow when decoding INTEGER content"));
    }

    let mut value: i64 = 0;
    let first_byte = buf.get_u8();

    // Handle sign bit
    if (first_byte & 0x80) != 0 {
        value = -1; // Start with all bits set
    }

    value = (value << 8) | (first_byte as i64);

    // Process remaining bytes
    for _ in 1..length {
        value = (value << 8) | (buf.get_u8() as i64);
    }

    Ok(value)
}

/// Decodes an unsigned application value carrying `expected_tag`.
pub fn decode_unsigned(buf: &mut Bytes, expected_tag: u8) -> Result<u64> {
    expect_tag(buf, expected_tag)?;

    let length = decode_length(buf)?;

    if length == 0 {
        return Err(Asn1Error::InvalidLength.into());
    }
    if buf.remaining() < length {
        return Err(anyhow!("Buffer underflow when decoding unsigned content"));
    }

    let mut content = buf.split_to(length);
    if length == 9 {
        if content.get_u8() != 0 {
            return Err(anyhow!("Unsigned value exceeds 64 bits"));
        }
    } else if length > 9 {
        return Err(anyhow!("Unsigned value too large: {} bytes", length));
    }

    let mut value: u64 = 0;
    while content.remaining() > 0 {
        value = (value << 8) | (content.get_u8() as u64);
    }

    Ok(value)
}

pub fn decode_octet_string(buf: &mut Bytes) -> Result<Vec<u8>> {
    expect_tag(buf, encode::OCTET_STRING_TAG)?;

    let length = decode_length(buf)?;

    if buf.remaining() < length {
        return Err(anyhow!(
            "Buffer underflow when decoding OCTET STRING content"
        ));
    }

    let mut result = vec![0; length];
    buf.copy_to_slice(&mut result);

    Ok(result)
}

pub fn decode_null(buf: &mut Bytes) -> Result<()> {
    expect_tag(buf, encode::NULL_TAG)?;

    let length = decode_length(buf)?;
    if length != 0 {
        return Err(anyhow!("NULL should have zero length, got {}", length));
    }

    Ok(())
}

fn decode_base128(oid_bytes: &mut Bytes) -> Result<u32> {
    let mut value: u32 = 0;

    // Each component can span multiple bytes
    loop {
        if oid_bytes.remaining() == 0 {
            return Err(Asn1Error::UnexpectedEndOfData.into());
        }
        let byte = oid_bytes.get_u8();
        if value > (u32::MAX >> 7) {
            return Err(anyhow!("OBJECT IDENTIFIER arc overflows 32 bits"));
        }
        value = (value << 7) | ((byte & 0x7F) as u32);

        // If high bit is not set, this is the last byte of this component
        if (byte & 0x80) == 0 {
            return Ok(value);
        }
    }
}

// Decode an OBJECT IDENTIFIER
pub fn decode_oid(buf: &mut Bytes) -> Result<Vec<u32>> {
    expect_tag(buf, encode::OBJECT_IDENTIFIER_TAG)?;

    let length = decode_length(buf)?;
    if buf.remaining() < length {
        return Err(anyhow!("Buffer underflow when decoding OBJECT IDENTIFIER content"));
    }

    let mut oid_bytes = buf.split_to(length);
    if oid_bytes.remaining() == 0 {
        return Err(anyhow!("Empty OBJECT IDENTIFIER"));
    }

    // First sub-identifier encodes the first two components
    let first = decode_base128(&mut oid_bytes)?;
    let mut result = match first {
        0..=39 => vec![0, first],
        40..=79 => vec![1, first - 40],
        _ => vec![2, first - 80],
    };

    while oid_bytes.remaining() > 0 {
        result.push(decode_base128(&mut oid_bytes)?);
    }

    Ok(result)
}
