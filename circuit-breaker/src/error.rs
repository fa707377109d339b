// Copyright (c) James Kassemi, SC, US. All rights reserved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CircuitError<E> {
    #[error("{service} is cooling down after a failure; retry in {remaining_minutes} minute(s)")]
    Open {
        service: String,
        remaining_minutes: i64,
    },
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Inner(err) => Some(err),
            CircuitError::Open { .. } => None,
        }
    }
}
