use std::fmt;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube utils error: {0}")]
    KubeUtils(#[from] mesh_cni_k8s_utils::Error),

    #[error("invalid peer address {address}: {source}")]
    InvalidPeerAddress {
        address: String,
        source: ipnetwork::IpNetworkError,
    },

    #[error("invalid node selector on BgpPeeringPolicy {policy}: {reason}")]
    InvalidNodeSelector { policy: String, reason: String },

    #[error("failed to {op} {kind} {name}: {source}")]
    Store {
        op: &'static str,
        kind: String,
        name: String,
        source: StoreError,
    },

    #[error("reconciliation cancelled")]
    Cancelled,

    #[error("{}", JoinedDisplay(.0))]
    Joined(Vec<Error>),
}

impl Error {
    pub(crate) fn store(op: &'static str, kind: &str, name: &str, source: StoreError) -> Self {
        Self::Store {
            op,
            kind: kind.to_string(),
            name: name.to_string(),
            source,
        }
    }

    /// Every individual failure, with joined errors expanded.
    pub fn causes(&self) -> Vec<&Error> {
        match self {
            Error::Joined(errors) => errors.iter().flat_map(Error::causes).collect(),
            err => vec![err],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.causes()
            .iter()
            .any(|err| matches!(err, Error::Cancelled))
    }
}

struct JoinedDisplay<'a>(&'a [Error]);

impl fmt::Display for JoinedDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// Collects failures from independent operations so one failure never hides another.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<Error>,
}

impl ErrorList {
    pub fn push(&mut self, err: Error) {
        match err {
            Error::Joined(errors) => errors.into_iter().for_each(|e| self.push(e)),
            Error::Cancelled if self.errors.iter().any(|e| matches!(e, Error::Cancelled)) => {}
            err => self.errors.push(err),
        }
    }

    pub fn extend(&mut self, other: ErrorList) {
        other.errors.into_iter().for_each(|e| self.push(e));
    }

    /// Records a cancellation once the token fires. Callers stop issuing work when this
    /// returns true.
    pub fn cancelled(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            self.push(Error::Cancelled);
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_result(mut self) -> crate::Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(Error::Joined(self.errors)),
        }
    }
}

impl From<Error> for ErrorList {
    fn from(err: Error) -> Self {
        let mut errors = ErrorList::default();
        errors.push(err);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_selector(policy: &str) -> Error {
        Error::InvalidNodeSelector {
            policy: policy.into(),
            reason: "bad operator".into(),
        }
    }

    #[test]
    fn test_empty_list_is_ok() {
        assert!(ErrorList::default().into_result().is_ok());
    }

    #[test]
    fn test_single_error_is_not_wrapped() {
        let err = ErrorList::from(invalid_selector("a"))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidNodeSelector { .. }));
    }

    #[test]
    fn test_nested_joins_are_flattened() {
        let mut inner = ErrorList::default();
        inner.push(invalid_selector("a"));
        inner.push(invalid_selector("b"));

        let mut outer = ErrorList::default();
        outer.push(inner.into_result().unwrap_err());
        outer.push(invalid_selector("c"));
        assert_eq!(outer.len(), 3);

        let err = outer.into_result().unwrap_err();
        assert_eq!(err.causes().len(), 3);
        assert_eq!(
            err.to_string(),
            "invalid node selector on BgpPeeringPolicy a: bad operator\n\
             invalid node selector on BgpPeeringPolicy b: bad operator\n\
             invalid node selector on BgpPeeringPolicy c: bad operator"
        );
    }

    #[test]
    fn test_cancellation_recorded_once() {
        let cancel = CancellationToken::new();
        let mut errors = ErrorList::default();
        assert!(!errors.cancelled(&cancel));
        assert!(errors.is_empty());

        cancel.cancel();
        assert!(errors.cancelled(&cancel));
        assert!(errors.cancelled(&cancel));
        errors.push(Error::Cancelled);
        assert_eq!(errors.len(), 1);
        assert!(errors.into_result().unwrap_err().is_cancelled());
    }
}
