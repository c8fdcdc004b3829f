/// 未知碱基（包括所有非 acgt 字符）在序列中统一表示为 `n`
pub const UNKNOWN: u8 = b'n';

/// 碱基转 2-bit 编码 {0:a, 1:c, 2:g, 3:t}；非法字符返回 None
#[inline]
pub fn to_code(b: u8) -> Option<u64> {
    match b.to_ascii_lowercase() {
        b'a' => Some(0),
        b'c' => Some(1),
        b'g' => Some(2),
        b't' | b'u' => Some(3),
        _ => None,
    }
}

/// 滚动哈希使用的编码：非法字符按 0 计入（窗口本身会因 n 计数而被跳过）
#[inline]
pub fn hash_code(b: u8) -> u64 {
    to_code(b).unwrap_or(0)
}

#[inline]
pub fn is_valid(b: u8) -> bool {
    to_code(b).is_some()
}

/// 规范化为小写 acgtn；U 视为 T，其余字符一律视为 n
pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        let low = b.to_ascii_lowercase();
        let nb = match low {
            b'a' | b'c' | b'g' | b't' | b'n' => low,
            b'u' => b't',
            _ => UNKNOWN,
        };
        out.push(nb);
    }
    out
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_lowercase() {
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' | b'u' => b'a',
        _ => UNKNOWN,
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq.iter().rev() {
        out.push(complement(b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_unknown_to_n() {
        assert_eq!(normalize_seq(b"ACgtUx-N"), b"acgttnnn");
    }

    #[test]
    fn complement_codes_are_mirrored() {
        for &b in b"acgt" {
            let c = to_code(b).unwrap();
            assert_eq!(to_code(complement(b)).unwrap(), 3 - c);
        }
        assert_eq!(hash_code(b'n'), 0);
        assert!(!is_valid(b'n'));
    }

    #[test]
    fn revcomp_basic() {
        assert_eq!(revcomp(b"aaacgt"), b"acgttt");
        assert_eq!(revcomp(b"acgn"), b"ncgt");
    }
}
