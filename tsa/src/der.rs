//! Minimal DER reader/writer shared by the request parser and the token encoders.
//!
//! Only definite-length, single-byte-tag encodings are handled. That covers
//! every structure the timestamp authority reads or produces.

// ASN.1 tags
pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTF8_STRING: u8 = 0x0C;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;
pub const TAG_CONTEXT_0: u8 = 0xA0; // [0] constructed
pub const TAG_CONTEXT_4: u8 = 0xA4; // [4] constructed (GeneralName.directoryName)

/// Encode a DER length field into the buffer.
pub fn encode_length(buf: &mut Vec<u8>, len: usize) {
    if len < 128 {
        buf.push(len as u8);
    } else if len < 256 {
        buf.push(0x81);
        buf.push(len as u8);
    } else if len < 65536 {
        buf.push(0x82);
        buf.push((len >> 8) as u8);
        buf.push(len as u8);
    } else if len < 1 << 24 {
        buf.push(0x83);
        buf.push((len >> 16) as u8);
        buf.push((len >> 8) as u8);
        buf.push(len as u8);
    } else {
        buf.push(0x84);
        buf.push((len >> 24) as u8);
        buf.push((len >> 16) as u8);
        buf.push((len >> 8) as u8);
        buf.push(len as u8);
    }
}

/// Write a DER TLV (tag-length-value) to a buffer.
pub fn write_tlv(buf: &mut Vec<u8>, tag: u8, value: &[u8]) {
    buf.push(tag);
    encode_length(buf, value.len());
    buf.extend_from_slice(value);
}

/// Build a standalone DER TLV.
pub fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(value.len() + 6);
    write_tlv(&mut buf, tag, value);
    buf
}

/// Encode a u64 as an ASN.1 INTEGER.
/// Handles leading zero byte for positive integers whose MSB is set.
pub fn encode_integer_u64(buf: &mut Vec<u8>, value: u64) {
    buf.push(TAG_INTEGER);

    if value == 0 {
        buf.push(0x01);
        buf.push(0x00);
        return;
    }

    // Find the minimal encoding
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 && bytes[start] == 0 {
        start += 1;
    }

    // Need leading zero if MSB of first significant byte is set
    let needs_leading_zero = bytes[start] & 0x80 != 0;
    let len = 8 - start + usize::from(needs_leading_zero);

    buf.push(len as u8);
    if needs_leading_zero {
        buf.push(0x00);
    }
    buf.extend_from_slice(&bytes[start..]);
}

/// A borrowed TLV element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Read a DER length encoding, returning (length, bytes_consumed).
pub fn read_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        return Some((first as usize, 1));
    }
    let count = (first & 0x7F) as usize;
    // 0x80 is the BER indefinite form, never valid in DER.
    if count == 0 || count > 4 || data.len() < 1 + count {
        return None;
    }
    let len = data[1..=count]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Some((len, 1 + count))
}

/// Read one TLV element, returning it with the bytes that follow it.
pub fn read_tlv(data: &[u8]) -> Option<(Tlv<'_>, &[u8])> {
    let tag = *data.first()?;
    let (len, len_bytes) = read_length(&data[1..])?;
    let start = 1 + len_bytes;
    let end = start.checked_add(len)?;
    if end > data.len() {
        return None;
    }
    Some((
        Tlv {
            tag,
            value: &data[start..end],
        },
        &data[end..],
    ))
}

/// Read one TLV element that must carry `tag`.
pub fn expect_tlv(data: &[u8], tag: u8) -> Option<(&[u8], &[u8])> {
    let (element, rest) = read_tlv(data)?;
    (element.tag == tag).then_some((element.value, rest))
}
