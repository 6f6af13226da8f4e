//! # 再生回数ポリシー
//!
//! `view_count >= threshold` のときだけ署名に進む。純粋関数で、副作用は判定前のログのみ。

pub const BELOW_THRESHOLD_MESSAGE: &str = "View count below threshold";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Admitted,
    Denied { reason: String },
}

impl PolicyDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, PolicyDecision::Admitted)
    }
}

/// 再生回数と閾値を比較する。閾値0（既定）では全て通過する。
pub fn admit(view_count: u64, threshold: u64) -> PolicyDecision {
    tracing::info!(view_count, threshold, "再生回数を閾値と比較");

    if view_count >= threshold {
        PolicyDecision::Admitted
    } else {
        PolicyDecision::Denied {
            reason: BELOW_THRESHOLD_MESSAGE.to_string(),
        }
    }
}
