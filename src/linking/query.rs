//! # 表单编码解析
//!
//! 按 `application/x-www-form-urlencoded` 规则拆分键值对。值只做一次
//! 百分号解码并保留原始字节，不经过有损的 UTF-8 转换。

use std::borrow::Cow;

/// 拆分并解码键值对
///
/// 键按 UTF-8 有损解码；值保持解码后的原始字节。空片段被跳过，
/// 没有 `=` 的片段视为空值。
pub fn parse_pairs(input: &[u8]) -> impl Iterator<Item = (String, Vec<u8>)> + '_ {
    input
        .split(|byte| *byte == b'&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = match segment.iter().position(|byte| *byte == b'=') {
                Some(at) => (&segment[..at], &segment[at + 1..]),
                None => (segment, &[][..]),
            };
            let key = String::from_utf8_lossy(&decode_component(key)).into_owned();
            (key, decode_component(value))
        })
}

/// `+` 还原为空格后百分号解码一次；非法转义原样保留
fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Cow<'_, [u8]> = if raw.contains(&b'+') {
        Cow::Owned(
            raw.iter()
                .map(|byte| if *byte == b'+' { b' ' } else { *byte })
                .collect(),
        )
    } else {
        Cow::Borrowed(raw)
    };
    urlencoding::decode_binary(&spaced).into_owned()
}
