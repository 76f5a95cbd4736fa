//! Unserved-code sets and trial outcome classification.
//!
//! A status set decides whether the local origin "could not serve" a
//! request. Two sets are in play: the full set used after a trial
//! (default `{403, 404}`) and the narrower set that lets the cheap
//! probe skip the trial entirely (default `{404}`).

use axum::http::StatusCode;

use crate::origin::TrialResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnservedCodes(Vec<u16>);

impl UnservedCodes {
    #[must_use]
    pub fn new(codes: &[u16]) -> Self {
        Self(codes.to_vec())
    }

    /// Default set for post-trial classification.
    #[must_use]
    pub fn classify_default() -> Self {
        Self(vec![403, 404])
    }

    /// Default set for the cheap-probe short circuit.
    #[must_use]
    pub fn probe_default() -> Self {
        Self(vec![404])
    }

    #[must_use]
    pub fn contains(&self, status: StatusCode) -> bool {
        self.0.contains(&status.as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    ServeTrial,
    Forward,
}

/// Classify a completed trial. The execution return code takes
/// precedence when present and different from the final status.
#[must_use]
pub fn classify(trial: &TrialResult, unserved: &UnservedCodes) -> Decision {
    let effective = match trial.return_code {
        Some(code) if code != trial.status => code,
        _ => trial.status,
    };
    if unserved.contains(effective) {
        Decision::Forward
    } else {
        Decision::ServeTrial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(status: StatusCode, return_code: Option<StatusCode>) -> TrialResult {
        let mut t = TrialResult::with_status(status);
        t.return_code = return_code;
        t
    }

    #[test]
    fn ok_status_serves() {
        let t = trial(StatusCode::OK, None);
        assert_eq!(
            classify(&t, &UnservedCodes::classify_default()),
            Decision::ServeTrial
        );
    }

    #[test]
    fn unserved_status_forwards() {
        for code in [StatusCode::FORBIDDEN, StatusCode::NOT_FOUND] {
            let t = trial(code, None);
            assert_eq!(
                classify(&t, &UnservedCodes::classify_default()),
                Decision::Forward
            );
        }
    }

    #[test]
    fn return_code_takes_precedence_over_status() {
        // Handler ran far enough to set 200 but its execution result
        // says 404 — the return code wins.
        let t = trial(StatusCode::OK, Some(StatusCode::NOT_FOUND));
        assert_eq!(
            classify(&t, &UnservedCodes::classify_default()),
            Decision::Forward
        );
    }

    #[test]
    fn matching_return_code_falls_back_to_status() {
        let t = trial(StatusCode::OK, Some(StatusCode::OK));
        assert_eq!(
            classify(&t, &UnservedCodes::classify_default()),
            Decision::ServeTrial
        );
    }

    #[test]
    fn custom_set_is_honored() {
        let t = trial(StatusCode::IM_A_TEAPOT, None);
        let unserved = UnservedCodes::new(&[418]);
        assert_eq!(classify(&t, &unserved), Decision::Forward);
    }

    #[test]
    fn probe_default_is_narrower() {
        let probe = UnservedCodes::probe_default();
        assert!(probe.contains(StatusCode::NOT_FOUND));
        assert!(!probe.contains(StatusCode::FORBIDDEN));
    }
}
