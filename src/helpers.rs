use std::borrow::Cow;

use nom::{
    bytes::complete::{take, take_till},
    IResult,
};

/// Reads a NUL terminated string. A missing terminator takes the rest of the
/// input. Invalid UTF-8 is replaced rather than rejected since install names
/// are raw bytes on disk.
pub fn string_upto_null_terminator(bytes: &[u8]) -> IResult<&[u8], Cow<'_, str>> {
    let (rest, name) = take_till::<_, _, nom::error::Error<&[u8]>>(|b| b == 0)(bytes)?;
    let rest = if rest.is_empty() { rest } else { &rest[1..] };
    Ok((rest, String::from_utf8_lossy(name)))
}

pub fn fixed_bytes<const N: usize>(bytes: &[u8]) -> IResult<&[u8], [u8; N]> {
    let (rest, taken) = take::<_, _, nom::error::Error<&[u8]>>(N)(bytes)?;
    let mut out = [0u8; N];
    out.copy_from_slice(taken);
    Ok((rest, out))
}

/// Name stored in a fixed size, zero padded field such as `segname`.
pub fn fixed_name(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

/// X.Y.Z packed as xxxx.yy.zz
pub fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        (version >> 16) & 0xffff,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

/// A.B.C.D.E packed as a24.b10.c10.d10.e10, leading zero components dropped.
pub fn source_version_string(version: u64) -> String {
    let a = (version >> 40) & 0xff_ffff;
    let b = (version >> 30) & 0x3ff;
    let c = (version >> 20) & 0x3ff;
    let d = (version >> 10) & 0x3ff;
    let e = version & 0x3ff;

    let mut out = String::new();
    for part in [a, b, c] {
        if part != 0 {
            out.push_str(&format!("{}.", part));
        }
    }
    out.push_str(&format!("{}.{}", d, e));
    out
}

pub fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}
