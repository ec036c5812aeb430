//! 把辅助歌词（翻译、音译）按时间对齐到主歌词行上。

use crate::types::LrcLine;

/// 需要对齐的主歌词行：锚点时间，以及解析器预先填好的行内辅助文本。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignTarget<'a> {
    pub anchor_ms: u64,
    pub inline: Option<&'a str>,
}

impl<'a> AlignTarget<'a> {
    pub fn new(anchor_ms: u64) -> Self {
        Self {
            anchor_ms,
            inline: None,
        }
    }

    pub fn with_inline(mut self, inline: Option<&'a str>) -> Self {
        self.inline = inline;
        self
    }
}

/// 为每个主歌词行求出一条辅助文本，输出与 `targets` 一一对应。
///
/// - 行内已有的辅助文本优先。
/// - 行数相同时直接按下标配对，不看时间戳。
/// - 否则在 `aux` 中找与锚点时间差最小的一条，时间差超过 `tolerance_ms` 时为空字符串。
pub fn align(targets: &[AlignTarget<'_>], aux: &[LrcLine], tolerance_ms: u64) -> Vec<String> {
    if targets.len() == aux.len() {
        log::trace!("[Aligner] 行数相同 ({})，按下标配对", aux.len());
        return targets
            .iter()
            .zip(aux)
            .map(|(target, aux_line)| match target.inline {
                Some(inline) => inline.to_string(),
                None => aux_line.text.clone(),
            })
            .collect();
    }

    log::debug!(
        "[Aligner] 行数不一致 (主 {} / 辅 {})，按最近时间戳匹配，容差 {}ms",
        targets.len(),
        aux.len(),
        tolerance_ms
    );

    let mut sorted_aux: Vec<&LrcLine> = aux.iter().collect();
    sorted_aux.sort_by_key(|line| line.timestamp_ms);

    targets
        .iter()
        .map(|target| {
            if let Some(inline) = target.inline {
                return inline.to_string();
            }
            nearest_within(&sorted_aux, target.anchor_ms, tolerance_ms)
                .map(|line| line.text.clone())
                .unwrap_or_default()
        })
        .collect()
}

/// 在按时间升序排列的 `sorted_aux` 中找离 `anchor_ms` 最近的一条。
///
/// 时间差为 0 时立即返回；距离相同时取时间戳较小的一条；
/// 时间差大于 `tolerance_ms` 时返回 `None`。
pub fn nearest_within<'a>(
    sorted_aux: &[&'a LrcLine],
    anchor_ms: u64,
    tolerance_ms: u64,
) -> Option<&'a LrcLine> {
    let mut best: Option<(&'a LrcLine, u64)> = None;

    for &line in sorted_aux {
        let diff = line.timestamp_ms.abs_diff(anchor_ms);
        if diff == 0 {
            return Some(line);
        }
        // 严格小于：升序遍历下，距离相同时保留先出现（更早）的那条
        if best.is_none_or(|(_, best_diff)| diff < best_diff) {
            best = Some((line, diff));
        }
    }

    best.filter(|&(_, diff)| diff <= tolerance_ms)
        .map(|(line, _)| line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aux(entries: &[(u64, &str)]) -> Vec<LrcLine> {
        entries
            .iter()
            .map(|&(timestamp_ms, text)| LrcLine {
                timestamp_ms,
                text: text.to_string(),
            })
            .collect()
    }

    fn targets(anchors: &[u64]) -> Vec<AlignTarget<'static>> {
        anchors.iter().map(|&a| AlignTarget::new(a)).collect()
    }

    #[test]
    fn test_equal_length_pairs_by_index() {
        let aux = aux(&[(90_000, "one"), (10, "two")]);
        let result = align(&targets(&[1000, 2000]), &aux, 100);
        assert_eq!(result, vec!["one", "two"]);
    }

    #[test]
    fn test_nearest_match_within_tolerance() {
        let aux = aux(&[(1100, "first"), (9000, "far")]);
        let result = align(&targets(&[1000, 2000, 20_000]), &aux, 3000);
        assert_eq!(result, vec!["first", "first", ""]);
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let aux = aux(&[(4000, "edge")]);
        let result = align(&targets(&[1000, 999]), &aux, 3000);
        assert_eq!(result, vec!["edge", ""]);
    }

    #[test]
    fn test_tie_prefers_earlier_timestamp() {
        let aux = aux(&[(1500, "later"), (500, "earlier")]);
        let result = align(&targets(&[1000]), &aux, 5000);
        assert_eq!(result, vec!["earlier"]);
    }

    #[test]
    fn test_exact_match_wins() {
        let aux = aux(&[(999, "near"), (1000, "exact"), (1001, "near")]);
        let result = align(&targets(&[1000, 5000]), &aux, 5000);
        assert_eq!(result[0], "exact");
    }

    #[test]
    fn test_inline_value_takes_precedence() {
        let aux = aux(&[(1000, "from aux")]);
        let with_inline = vec![
            AlignTarget::new(1000).with_inline(Some("inline")),
            AlignTarget::new(2000),
        ];
        assert_eq!(align(&with_inline, &aux, 5000), vec!["inline", "from aux"]);

        let same_len = vec![AlignTarget::new(1000).with_inline(Some("inline"))];
        assert_eq!(align(&same_len, &aux, 5000), vec!["inline"]);
    }

    #[test]
    fn test_empty_aux_yields_empty_strings() {
        let result = align(&targets(&[0, 100]), &[], 5000);
        assert_eq!(result, vec!["", ""]);
        assert!(align(&[], &[], 5000).is_empty());
    }

    proptest! {
        #[test]
        fn prop_align_is_idempotent(
            anchors in proptest::collection::vec(0u64..600_000, 0..20),
            aux_times in proptest::collection::vec(0u64..600_000, 0..20),
            tolerance in 0u64..20_000,
        ) {
            let aux_lines: Vec<LrcLine> = aux_times
                .iter()
                .enumerate()
                .map(|(i, &t)| LrcLine { timestamp_ms: t, text: format!("aux{i}") })
                .collect();
            let targets = targets(&anchors);
            let first = align(&targets, &aux_lines, tolerance);
            let second = align(&targets, &aux_lines, tolerance);
            prop_assert_eq!(first.len(), anchors.len());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_equal_length_is_index_pairing(
            pairs in proptest::collection::vec((0u64..600_000, 0u64..600_000), 0..20),
            tolerance in 0u64..20_000,
        ) {
            let targets: Vec<AlignTarget<'static>> =
                pairs.iter().map(|&(a, _)| AlignTarget::new(a)).collect();
            let aux_lines: Vec<LrcLine> = pairs
                .iter()
                .enumerate()
                .map(|(i, &(_, t))| LrcLine { timestamp_ms: t, text: format!("aux{i}") })
                .collect();
            let result = align(&targets, &aux_lines, tolerance);
            let expected: Vec<String> = (0..pairs.len()).map(|i| format!("aux{i}")).collect();
            prop_assert_eq!(result, expected);
        }
    }
}
