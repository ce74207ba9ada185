//! 文字列を UTF-16 コード単位として扱うための補助。

pub fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

pub fn len(s: &str) -> usize {
    s.encode_utf16().count()
}

pub fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// `[start, end)` のコード単位範囲を切り出す。
pub fn slice(s: &str, start: usize, end: usize) -> String {
    let u = units(s);
    let end = end.min(u.len());
    if start >= end {
        return String::new();
    }
    from_units(&u[start..end])
}

/// `needle` が最初に現れるコード単位位置（`from` 以降）。
pub fn index_of(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let h = units(haystack);
    let n = units(needle);
    if n.is_empty() {
        return Some(from.min(h.len()));
    }
    if n.len() > h.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| h[i..i + n.len()] == n[..])
}

pub fn last_index_of(haystack: &str, needle: &str) -> Option<usize> {
    let h = units(haystack);
    let n = units(needle);
    if n.len() > h.len() {
        return None;
    }
    (0..=h.len() - n.len()).rev().find(|&i| h[i..i + n.len()] == n[..])
}

/// 相対位置（負数は末尾から）を `[0, len]` に収める。
pub fn relative_index(value: f64, len: usize) -> usize {
    let len_f = len as f64;
    let v = if value.is_nan() { 0.0 } else { value.trunc() };
    if v < 0.0 {
        (len_f + v).max(0.0) as usize
    } else {
        v.min(len_f) as usize
    }
}

/// バイト位置を UTF-16 位置へ変換する。
pub fn byte_to_unit_offset(s: &str, byte: usize) -> usize {
    s[..byte.min(s.len())].encode_utf16().count()
}

/// UTF-16 位置をバイト位置へ変換する（文字境界に丸める）。
pub fn unit_to_byte_offset(s: &str, unit: usize) -> usize {
    let mut count = 0;
    for (i, ch) in s.char_indices() {
        if count >= unit {
            return i;
        }
        count += ch.len_utf16();
    }
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// サロゲートペアは 2 単位として数える。
    fn surrogate_pairs_count_twice() {
        assert_eq!(len("a\u{1F600}"), 3);
        assert_eq!(slice("hello", 1, 3), "el");
        assert_eq!(index_of("abcabc", "c", 3), Some(5));
        assert_eq!(last_index_of("abcabc", "ab"), Some(3));
        assert_eq!(relative_index(-2.0, 5), 3);
        assert_eq!(unit_to_byte_offset("\u{e9}x", 1), 2);
    }
}
