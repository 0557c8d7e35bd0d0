use crate::asn1::{decode, encode};
use crate::oid::Oid;
use anyhow::{Context, Result, anyhow};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

pub const SNMP_VERSION_2C: i64 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    GetBulkRequest,
    InformRequest,
    SnmpV2Trap,
    Report,
}

impl PduType {
    pub fn to_tag(self) -> u8 {
        match self {
            PduType::GetRequest => encode::GET_REQUEST_TAG,
            PduType::GetNextRequest => encode::GET_NEXT_REQUEST_TAG,
            PduType::Response => encode::GET_RESPONSE_TAG,
            PduType::SetRequest => encode::SET_REQUEST_TAG,
            PduType::GetBulkRequest => encode::GET_BULK_REQUEST_TAG,
            PduType::InformRequest => encode::INFORM_REQUEST_TAG,
            PduType::SnmpV2Trap => encode::SNMPV2_TRAP_TAG,
            PduType::Report => encode::REPORT_TAG,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            encode::GET_REQUEST_TAG => PduType::GetRequest,
            encode::GET_NEXT_REQUEST_TAG => PduType::GetNextRequest,
            encode::GET_RESPONSE_TAG => PduType::Response,
            encode::SET_REQUEST_TAG => PduType::SetRequest,
            encode::GET_BULK_REQUEST_TAG => PduType::GetBulkRequest,
            encode::INFORM_REQUEST_TAG => PduType::InformRequest,
            encode::SNMPV2_TRAP_TAG => PduType::SnmpV2Trap,
            encode::REPORT_TAG => PduType::Report,
            _ => return None,
        })
    }
}

/// Error-status values of a Response PDU (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    Unknown(i64),
}

impl From<i64> for ErrorStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            5 => ErrorStatus::GenErr,
            6 => ErrorStatus::NoAccess,
            7 => ErrorStatus::WrongType,
            8 => ErrorStatus::WrongLength,
            9 => ErrorStatus::WrongEncoding,
            10 => ErrorStatus::WrongValue,
            11 => ErrorStatus::NoCreation,
            12 => ErrorStatus::InconsistentValue,
            13 => ErrorStatus::ResourceUnavailable,
            14 => ErrorStatus::CommitFailed,
            15 => ErrorStatus::UndoFailed,
            16 => ErrorStatus::AuthorizationError,
            17 => ErrorStatus::NotWritable,
            18 => ErrorStatus::InconsistentName,
            other => ErrorStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorStatus::NoError => "noError",
            ErrorStatus::TooBig => "tooBig",
            ErrorStatus::NoSuchName => "noSuchName",
            ErrorStatus::BadValue => "badValue",
            ErrorStatus::ReadOnly => "readOnly",
            ErrorStatus::GenErr => "genErr",
            ErrorStatus::NoAccess => "noAccess",
            ErrorStatus::WrongType => "wrongType",
            ErrorStatus::WrongLength => "wrongLength",
            ErrorStatus::WrongEncoding => "wrongEncoding",
            ErrorStatus::WrongValue => "wrongValue",
            ErrorStatus::NoCreation => "noCreation",
            ErrorStatus::InconsistentValue => "inconsistentValue",
            ErrorStatus::ResourceUnavailable => "resourceUnavailable",
            ErrorStatus::CommitFailed => "commitFailed",
            ErrorStatus::UndoFailed => "undoFailed",
            ErrorStatus::AuthorizationError => "authorizationError",
            ErrorStatus::NotWritable => "notWritable",
            ErrorStatus::InconsistentName => "inconsistentName",
            ErrorStatus::Unknown(code) => return write!(f, "unknown({})", code),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

/// How a value is shown on the console: `number` values are integers,
/// everything else is decoded to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Number,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Text => f.write_str("string"),
            ValueKind::Number => f.write_str("number"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub kind: ValueKind,
    pub text: String,
}

impl SnmpValue {
    pub fn render(&self) -> Rendered {
        let (kind, text) = match self {
            SnmpValue::Integer(val) => (ValueKind::Number, val.to_string()),
            SnmpValue::Counter32(val) | SnmpValue::Gauge32(val) | SnmpValue::TimeTicks(val) => {
                (ValueKind::Number, val.to_string())
            }
            SnmpValue::Counter64(val) => (ValueKind::Number, val.to_string()),
            SnmpValue::OctetString(val) => {
                (ValueKind::Text, String::from_utf8_lossy(val).into_owned())
            }
            SnmpValue::ObjectIdentifier(oid) => (ValueKind::Text, oid.to_string()),
            SnmpValue::IpAddress([a, b, c, d]) => {
                (ValueKind::Text, format!("{}.{}.{}.{}", a, b, c, d))
            }
            SnmpValue::Opaque(val) => (
                ValueKind::Text,
                val.iter().map(|b| format!("{:02x}", b)).collect::<String>(),
            ),
            SnmpValue::Null => (ValueKind::Text, "null".to_string()),
            SnmpValue::NoSuchObject => (ValueKind::Text, "noSuchObject".to_string()),
            SnmpValue::NoSuchInstance => (ValueKind::Text, "noSuchInstance".to_string()),
            SnmpValue::EndOfMibView => (ValueKind::Text, "endOfMibView".to_string()),
        };
        Rendered { kind, text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: Oid,
    pub value: SnmpValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpPdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<Varbind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMessage {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu: SnmpPdu,
}

/// A GetRequest asking for `oids`, each carried with a NULL value.
pub fn build_get_request(community: &str, request_id: i32, oids: &[Oid]) -> SnmpMessage {
    SnmpMessage {
        version: SNMP_VERSION_2C,
        community: community.as_bytes().to_vec(),
        pdu: SnmpPdu {
            pdu_type: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids
                .iter()
                .map(|oid| Varbind {
                    oid: oid.clone(),
                    value: SnmpValue::Null,
                })
                .collect(),
        },
    }
}

/// A Response echoing the request's version, community and request id.
pub fn build_response_message(
    request: &SnmpMessage,
    varbinds: Vec<Varbind>,
    error_status: i64,
    error_index: i64,
) -> SnmpMessage {
    SnmpMessage {
        version: request.version,
        community: request.community.clone(),
        pdu: SnmpPdu {
            pdu_type: PduType::Response,
            request_id: request.pdu.request_id,
            error_status,
            error_index,
            varbinds,
        },
    }
}

fn build_value(value: &SnmpValue, buf: &mut BytesMut) {
    match value {
        SnmpValue::Integer(val) => encode::encode_integer(*val, buf),
        SnmpValue::OctetString(val) => encode::encode_octet_string(val, buf),
        SnmpValue::Null => encode::encode_null(buf),
        SnmpValue::ObjectIdentifier(val) => encode::encode_oid(val.as_slice(), buf),
        SnmpValue::IpAddress(octets) => encode::encode_tagged(encode::IP_ADDRESS_TAG, octets, buf),
        SnmpValue::Counter32(val) => encode::encode_unsigned(encode::COUNTER32_TAG, *val as u64, buf),
        SnmpValue::Gauge32(val) => encode::encode_unsigned(encode::GAUGE32_TAG, *val as u64, buf),
        SnmpValue::TimeTicks(val) => {
            encode::encode_unsigned(encode::TIMETICKS_TAG, *val as u64, buf)
        }
        SnmpValue::Opaque(val) => encode::encode_tagged(encode::OPAQUE_TAG, val, buf),
        SnmpValue::Counter64(val) => encode::encode_unsigned(encode::COUNTER64_TAG, *val, buf),
        SnmpValue::NoSuchObject => encode::encode_tagged(encode::NO_SUCH_OBJECT_TAG, &[], buf),
        SnmpValue::NoSuchInstance => encode::encode_tagged(encode::NO_SUCH_INSTANCE_TAG, &[], buf),
        SnmpValue::EndOfMibView => encode::encode_tagged(encode::END_OF_MIB_VIEW_TAG, &[], buf),
    }
}

pub fn build_varbind(varbind: &Varbind, buf: &mut BytesMut) {
    let mut varbind_buf = BytesMut::new();

    encode::encode_oid(varbind.oid.as_slice(), &mut varbind_buf);
    build_value(&varbind.value, &mut varbind_buf);

    encode::encode_sequence(&varbind_buf, encode::SEQUENCE_TAG, buf);
}

pub fn build_varbind_list(varbinds: &[Varbind], buf: &mut BytesMut) {
    let mut varbind_list_buf = BytesMut::new();
    for varbind in varbinds {
        build_varbind(varbind, &mut varbind_list_buf);
    }

    encode::encode_sequence(&varbind_list_buf, encode::SEQUENCE_TAG, buf);
}

pub fn build_pdu(pdu: &SnmpPdu, buf: &mut BytesMut) {
    let mut pdu_buf = BytesMut::new();

    encode::encode_integer(pdu.request_id as i64, &mut pdu_buf);

    encode::encode_integer(pdu.error_status, &mut pdu_buf);

    encode::encode_integer(pdu.error_index, &mut pdu_buf);

    build_varbind_list(&pdu.varbinds, &mut pdu_buf);

    encode::encode_sequence(&pdu_buf, pdu.pdu_type.to_tag(), buf);
}

pub fn build_snmp_msg(message: &SnmpMessage, buf: &mut BytesMut) {
    let mut msg_buf = BytesMut::new();

    encode::encode_integer(message.version, &mut msg_buf);

    encode::encode_octet_string(&message.community, &mut msg_buf);

    let mut pdu_buf = BytesMut::new();
    build_pdu(&message.pdu, &mut pdu_buf);
    msg_buf.put_slice(&pdu_buf);

    encode::encode_sequence(&msg_buf, encode::SEQUENCE_TAG, buf);
}

/// Serializes a message to its wire form.
pub fn encode_message(message: &SnmpMessage) -> Bytes {
    let mut buf = BytesMut::new();
    build_snmp_msg(message, &mut buf);
    buf.freeze()
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{} value {} exceeds 32 bits", what, value))
}

fn decode_value(seq_data: &mut Bytes) -> Result<SnmpValue> {
    let tag = decode::peek_tag(seq_data).context("Failed to peek value tag")?;
    let value = match tag {
        encode::INTEGER_TAG => {
            SnmpValue::Integer(decode::decode_integer(seq_data).context("Failed to decode integer")?)
        }
        encode::OCTET_STRING_TAG => SnmpValue::OctetString(
            decode::decode_octet_string(seq_data).context("Failed to decode octet string")?,
        ),
        encode::NULL_TAG => {
            decode::decode_null(seq_data).context("Failed to decode null")?;
            SnmpValue::Null
        }
        encode::OBJECT_IDENTIFIER_TAG => {
            let arcs = decode::decode_oid(seq_data).context("Failed to decode OID value")?;
            SnmpValue::ObjectIdentifier(Oid::from_arcs(arcs)?)
        }
        encode::IP_ADDRESS_TAG => {
            let (_, content) = decode::decode_tlv(seq_data)?;
            let octets = <[u8; 4]>::try_from(&content[..])
                .map_err(|_| anyhow!("IpAddress must be 4 bytes, got {}", content.len()))?;
            SnmpValue::IpAddress(octets)
        }
        encode::COUNTER32_TAG => {
            let val = decode::decode_unsigned(seq_data, tag).context("Failed to decode Counter32")?;
            SnmpValue::Counter32(to_u32(val, "Counter32")?)
        }
        encode::GAUGE32_TAG => {
            let val = decode::decode_unsigned(seq_data, tag).context("Failed to decode Gauge32")?;
            SnmpValue::Gauge32(to_u32(val, "Gauge32")?)
        }
        encode::TIMETICKS_TAG => {
            let val = decode::decode_unsigned(seq_data, tag).context("Failed to decode TimeTicks")?;
            SnmpValue::TimeTicks(to_u32(val, "TimeTicks")?)
        }
        encode::OPAQUE_TAG => {
            let (_, content) = decode::decode_tlv(seq_data)?;
            SnmpValue::Opaque(content.to_vec())
        }
        encode::COUNTER64_TAG => SnmpValue::Counter64(
            decode::decode_unsigned(seq_data, tag).context("Failed to decode Counter64")?,
        ),
        encode::NO_SUCH_OBJECT_TAG | encode::NO_SUCH_INSTANCE_TAG | encode::END_OF_MIB_VIEW_TAG => {
            decode::decode_tlv(seq_data)?;
            match tag {
                encode::NO_SUCH_OBJECT_TAG => SnmpValue::NoSuchObject,
                encode::NO_SUCH_INSTANCE_TAG => SnmpValue::NoSuchInstance,
                _ => SnmpValue::EndOfMibView,
            }
        }
        _ => return Err(anyhow!("Invalid varbind value tag: 0x{:02x}", tag)),
    };
    Ok(value)
}

pub fn decode_varbind(buf: &mut Bytes) -> Result<Varbind> {
    let mut seq_data = decode::decode_sequence(buf).context("Failed to decode varbind sequence")?;
    let arcs = decode::decode_oid(&mut seq_data).context("Failed to decode OID")?;
    let oid = Oid::from_arcs(arcs)?;
    let value = decode_value(&mut seq_data)?;

    if seq_data.remaining() > 0 {
        return Err(anyhow!(
            "{} trailing bytes after varbind {}",
            seq_data.remaining(),
            oid
        ));
    }

    Ok(Varbind { oid, value })
}

pub fn decode_varbind_list(buf: &mut Bytes) -> Result<Vec<Varbind>> {
    let mut seq_data =
        decode::decode_sequence(buf).context("Failed to decode varbind list sequence")?;

    let mut varbinds = Vec::new();
    while seq_data.remaining() > 0 {
        varbinds.push(decode_varbind(&mut seq_data)?);
    }

    Ok(varbinds)
}

pub fn decode_pdu(buf: &mut Bytes) -> Result<SnmpPdu> {
    let (tag, mut pdu_data) = decode::decode_tlv(buf).context("Failed to decode PDU")?;

    let pdu_type =
        PduType::from_tag(tag).ok_or_else(|| anyhow!("Invalid PDU tag: 0x{:02x}", tag))?;

    let request_id = decode::decode_integer(&mut pdu_data).context("Failed to decode request ID")?;
    let request_id = i32::try_from(request_id)
        .map_err(|_| anyhow!("Request ID {} out of range", request_id))?;

    let error_status =
        decode::decode_integer(&mut pdu_data).context("Failed to decode error status")?;

    let error_index =
        decode::decode_integer(&mut pdu_data).context("Failed to decode error index")?;

    let varbinds = decode_varbind_list(&mut pdu_data)?;
    Ok(SnmpPdu {
        pdu_type,
        request_id,
        error_status,
        error_index,
        varbinds,
    })
}

pub fn decode_snmp_message(data: &[u8]) -> Result<SnmpMessage> {
    let mut buf = Bytes::copy_from_slice(data);
    let mut msg_data =
        decode::decode_sequence(&mut buf).context("Failed to decode message sequence")?;

    let version = decode::decode_integer(&mut msg_data).context("Failed to decode version")?;

    if version != SNMP_VERSION_2C {
        return Err(anyhow!("Invalid SNMP version: {}", version));
    }

    let community =
        decode::decode_octet_string(&mut msg_data).context("Failed to decode community string")?;

    let pdu = decode_pdu(&mut msg_data)?;
    tracing::trace!(
        request_id = pdu.request_id,
        varbinds = pdu.varbinds.len(),
        "decoded message"
    );

    Ok(SnmpMessage {
        version,
        community,
        pdu,
    })
}
