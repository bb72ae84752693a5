//! Generic two-phase timelocked parameter.
//!
//! `pending` and `requested_at` are always set together by `init` and
//! cleared together by `commit`. Re-initiating while a change is pending
//! overwrites the proposal and restarts the timer.

use meterpay_types::{LedgerEvent, MeterpayError, Result, Timestamp};

/// Static description of one governed parameter.
pub struct ParameterSpec<T: 'static> {
    /// Human-readable name used in errors and logs.
    pub name: &'static str,
    /// Bounds check on a proposed value (equality with the current value is
    /// checked separately).
    pub validate: fn(&T) -> Result<()>,
    /// Event emitted when a change is initiated.
    pub on_init: fn(&T, Timestamp) -> LedgerEvent,
    /// Event emitted when a change is committed.
    pub on_commit: fn(&T) -> LedgerEvent,
}

/// Owned snapshot of one parameter's `current`/`pending`/timer triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterView<T> {
    pub current: T,
    pub pending: Option<T>,
    pub requested_at: Option<Timestamp>,
}

/// A parameter whose changes must wait out a fixed delay.
pub struct TimelockedParameter<T: 'static> {
    spec: &'static ParameterSpec<T>,
    current: T,
    pending: Option<T>,
    requested_at: Option<Timestamp>,
}

impl<T: Clone + PartialEq + 'static> TimelockedParameter<T> {
    #[must_use]
    pub fn new(spec: &'static ParameterSpec<T>, initial: T) -> Self {
        Self {
            spec,
            current: initial,
            pending: None,
            requested_at: None,
        }
    }

    /// Propose `value`, starting the timer at `now`.
    ///
    /// # Errors
    /// - whatever the parameter's `validate` returns for out-of-bounds values
    /// - `NoOpValue` if `value` equals the current value
    pub fn init(&mut self, value: T, now: Timestamp) -> Result<LedgerEvent> {
        (self.spec.validate)(&value)?;
        if value == self.current {
            return Err(MeterpayError::NoOpValue {
                parameter: self.spec.name,
                reason: "equals current value",
            });
        }
        let event = (self.spec.on_init)(&value, now);
        self.pending = Some(value);
        self.requested_at = Some(now);
        Ok(event)
    }

    /// Apply the pending value once `delay` has passed since `init`.
    ///
    /// `authorize` sees the pending value before anything changes; the
    /// platform-account instance uses it to require the caller to be the
    /// pending holder.
    ///
    /// # Errors
    /// - `NoOpValue` if nothing is pending
    /// - whatever `authorize` returns
    /// - `TimelockNotElapsed` if `now < requested_at + delay`
    pub fn commit(
        &mut self,
        now: Timestamp,
        delay: u64,
        authorize: impl FnOnce(&T) -> Result<()>,
    ) -> Result<LedgerEvent> {
        let (Some(pending), Some(requested_at)) = (self.pending.as_ref(), self.requested_at)
        else {
            return Err(MeterpayError::NoOpValue {
                parameter: self.spec.name,
                reason: "no pending change",
            });
        };
        authorize(pending)?;

        let ready_at = requested_at.saturating_add(delay);
        if now < ready_at {
            return Err(MeterpayError::TimelockNotElapsed {
                parameter: self.spec.name,
                ready_at,
                now,
            });
        }

        let event = (self.spec.on_commit)(pending);
        if let Some(value) = self.pending.take() {
            self.current = value;
        }
        self.requested_at = None;
        Ok(event)
    }

    #[must_use]
    pub fn current(&self) -> &T {
        &self.current
    }

    #[must_use]
    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn requested_at(&self) -> Option<Timestamp> {
        self.requested_at
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    #[must_use]
    pub fn view(&self) -> ParameterView<T> {
        ParameterView {
            current: self.current.clone(),
            pending: self.pending.clone(),
            requested_at: self.requested_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn below_ten(v: &u64) -> Result<()> {
        if *v >= 10 {
            return Err(MeterpayError::OutOfRange {
                parameter: "counter",
                value: *v,
                min: 0,
                max: 9,
            });
        }
        Ok(())
    }

    fn init_event(v: &u64, at: Timestamp) -> LedgerEvent {
        LedgerEvent::WithdrawTimeLimitChangeInit {
            value: *v,
            requested_at: at,
        }
    }

    fn commit_event(v: &u64) -> LedgerEvent {
        LedgerEvent::WithdrawTimeLimitChangeCommit { value: *v }
    }

    static COUNTER: ParameterSpec<u64> = ParameterSpec {
        name: "counter",
        validate: below_ten,
        on_init: init_event,
        on_commit: commit_event,
    };

    fn allow(_: &u64) -> Result<()> {
        Ok(())
    }

    #[test]
    fn init_sets_pending_without_touching_current() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        let ev = p.init(5, 100).unwrap();
        assert_eq!(
            ev,
            LedgerEvent::WithdrawTimeLimitChangeInit {
                value: 5,
                requested_at: 100
            }
        );
        assert_eq!(*p.current(), 1);
        assert_eq!(p.pending(), Some(&5));
        assert_eq!(p.requested_at(), Some(100));
    }

    #[test]
    fn init_rejects_out_of_range_and_leaves_state() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        p.init(5, 100).unwrap();
        let err = p.init(10, 200).unwrap_err();
        assert!(matches!(err, MeterpayError::OutOfRange { .. }));
        assert_eq!(p.pending(), Some(&5));
        assert_eq!(p.requested_at(), Some(100));
    }

    #[test]
    fn init_rejects_current_value() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        let err = p.init(1, 100).unwrap_err();
        assert!(matches!(err, MeterpayError::NoOpValue { .. }));
        assert_eq!(p.pending(), None);
        assert_eq!(p.requested_at(), None);
    }

    #[test]
    fn reinit_restarts_timer() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        p.init(5, 100).unwrap();
        p.init(6, 150).unwrap();
        assert_eq!(p.pending(), Some(&6));
        assert_eq!(p.requested_at(), Some(150));
        assert!(p.commit(200, 60, allow).is_err());
        p.commit(210, 60, allow).unwrap();
        assert_eq!(*p.current(), 6);
    }

    #[test]
    fn commit_before_delay_fails() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        p.init(5, 100).unwrap();
        let err = p.commit(159, 60, allow).unwrap_err();
        assert!(matches!(
            err,
            MeterpayError::TimelockNotElapsed {
                ready_at: 160,
                now: 159,
                ..
            }
        ));
        assert_eq!(*p.current(), 1);
        assert_eq!(p.pending(), Some(&5));
    }

    #[test]
    fn commit_at_delay_applies_and_clears() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        p.init(5, 100).unwrap();
        let ev = p.commit(160, 60, allow).unwrap();
        assert_eq!(ev, LedgerEvent::WithdrawTimeLimitChangeCommit { value: 5 });
        assert_eq!(
            p.view(),
            ParameterView {
                current: 5,
                pending: None,
                requested_at: None
            }
        );
    }

    #[test]
    fn commit_without_pending_fails() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        assert!(matches!(
            p.commit(1_000, 60, allow),
            Err(MeterpayError::NoOpValue { .. })
        ));

        // A spent proposal cannot be committed twice.
        p.init(5, 100).unwrap();
        p.commit(160, 60, allow).unwrap();
        assert!(matches!(
            p.commit(1_000, 60, allow),
            Err(MeterpayError::NoOpValue { .. })
        ));
    }

    #[test]
    fn authorize_sees_pending_and_can_veto() {
        let mut p = TimelockedParameter::new(&COUNTER, 1);
        p.init(5, 100).unwrap();
        let err = p
            .commit(1_000, 60, |pending| {
                assert_eq!(*pending, 5);
                Err(MeterpayError::Internal("veto".into()))
            })
            .unwrap_err();
        assert!(matches!(err, MeterpayError::Internal(_)));
        assert_eq!(*p.current(), 1);
        assert_eq!(p.pending(), Some(&5));
    }
}
