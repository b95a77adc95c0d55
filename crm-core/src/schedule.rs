//! Service-contract schedule arithmetic

use crate::{
    ContractStatus, Date, EntityId, ScheduleError, ServiceContract, ServiceFrequency, ServiceLog,
};
use chrono::{Days, Months};

impl ServiceFrequency {
    /// Next due date after a service performed on `from`.
    ///
    /// Month-based frequencies clamp to the last day of a shorter month, so
    /// a monthly service done on 31 January is next due on 28/29 February.
    pub fn advance(&self, from: Date) -> Result<Date, ScheduleError> {
        let next = match self {
            ServiceFrequency::Weekly => from.checked_add_days(Days::new(7)),
            ServiceFrequency::Monthly => from.checked_add_months(Months::new(1)),
            ServiceFrequency::Quarterly => from.checked_add_months(Months::new(3)),
            ServiceFrequency::SemiAnnual => from.checked_add_months(Months::new(6)),
            ServiceFrequency::Annual => from.checked_add_months(Months::new(12)),
            ServiceFrequency::EveryDays(0) => {
                return Err(ScheduleError::InvalidInterval { days: 0 })
            }
            ServiceFrequency::EveryDays(days) => from.checked_add_days(Days::new(u64::from(*days))),
        };
        next.ok_or(ScheduleError::Overflow { date: from })
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        match self {
            ServiceFrequency::EveryDays(0) => Err(ScheduleError::InvalidInterval { days: 0 }),
            _ => Ok(()),
        }
    }
}

/// New schedule state computed for a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleChange {
    pub previous_due_date: Option<Date>,
    pub next_due_date: Option<Date>,
    pub status: ContractStatus,
    pub last_completed_on: Option<Date>,
}

impl ScheduleChange {
    pub fn apply_to(&self, contract: &mut ServiceContract) {
        contract.next_due_date = self.next_due_date;
        contract.status = self.status;
        contract.last_completed_on = self.last_completed_on;
    }
}

/// Check that `date` falls within the contract term.
pub fn check_within_term(
    date: Date,
    start_date: Date,
    end_date: Option<Date>,
) -> Result<(), ScheduleError> {
    if date < start_date {
        return Err(ScheduleError::BeforeStart {
            date,
            start: start_date,
        });
    }
    match end_date {
        Some(end) if date > end => Err(ScheduleError::AfterEnd { date, end }),
        _ => Ok(()),
    }
}

/// Validate the dates of a new or edited contract.
pub fn validate_term(
    start_date: Date,
    end_date: Option<Date>,
    next_due_date: Option<Date>,
) -> Result<(), ScheduleError> {
    if let Some(end) = end_date {
        if end < start_date {
            return Err(ScheduleError::AfterEnd {
                date: start_date,
                end,
            });
        }
    }
    match next_due_date {
        Some(next) => check_within_term(next, start_date, end_date),
        None => Ok(()),
    }
}

fn require_active(contract: &ServiceContract) -> Result<(), ScheduleError> {
    if contract.status.is_active() {
        Ok(())
    } else {
        Err(ScheduleError::ContractNotActive {
            contract_id: contract.contract_id,
            status: contract.status,
        })
    }
}

/// Plan a completed service visit.
///
/// The next due date is anchored on the completion date, not on the old due
/// date. When it lands past `end_date` the contract expires and has no next
/// due date.
pub fn plan_completion(
    contract: &ServiceContract,
    completed_on: Date,
) -> Result<ScheduleChange, ScheduleError> {
    require_active(contract)?;
    if completed_on < contract.start_date {
        return Err(ScheduleError::BeforeStart {
            date: completed_on,
            start: contract.start_date,
        });
    }

    let next = contract.frequency.advance(completed_on)?;
    let (next_due_date, status) = match contract.end_date {
        Some(end) if next > end => (None, ContractStatus::Expired),
        _ => (Some(next), ContractStatus::Active),
    };

    Ok(ScheduleChange {
        previous_due_date: contract.next_due_date,
        next_due_date,
        status,
        last_completed_on: Some(completed_on),
    })
}

/// Plan moving the next visit to `new_due_date`.
pub fn plan_reschedule(
    contract: &ServiceContract,
    new_due_date: Date,
) -> Result<ScheduleChange, ScheduleError> {
    require_active(contract)?;
    check_within_term(new_due_date, contract.start_date, contract.end_date)?;

    Ok(ScheduleChange {
        previous_due_date: contract.next_due_date,
        next_due_date: Some(new_due_date),
        status: contract.status,
        last_completed_on: contract.last_completed_on,
    })
}

/// Ids of the logs that fall outside the newest `retention` entries.
/// A non-positive retention keeps everything.
pub fn logs_to_prune(logs: &[ServiceLog], retention: i32) -> Vec<EntityId> {
    let Ok(keep) = usize::try_from(retention) else {
        return Vec::new();
    };
    if keep == 0 || logs.len() <= keep {
        return Vec::new();
    }

    let mut ordered: Vec<&ServiceLog> = logs.iter().collect();
    ordered.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.log_id.cmp(&a.log_id))
    });
    ordered.into_iter().skip(keep).map(|log| log.log_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{new_entity_id, ServiceLogKind};
    use chrono::{Duration, NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(frequency: ServiceFrequency, end_date: Option<Date>) -> ServiceContract {
        let now = Utc::now();
        ServiceContract {
            contract_id: new_entity_id(),
            tenant_id: new_entity_id(),
            owner_id: None,
            account_id: new_entity_id(),
            name: "HVAC maintenance".to_string(),
            description: None,
            frequency,
            start_date: date(2026, 1, 1),
            end_date,
            next_due_date: Some(date(2026, 1, 31)),
            last_completed_on: None,
            status: ContractStatus::Active,
            calendar_event_id: None,
            log_retention: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_advance_clamps_to_month_end() {
        assert_eq!(
            ServiceFrequency::Monthly.advance(date(2026, 1, 31)),
            Ok(date(2026, 2, 28))
        );
        assert_eq!(
            ServiceFrequency::Quarterly.advance(date(2026, 11, 30)),
            Ok(date(2027, 2, 28))
        );
        assert_eq!(
            ServiceFrequency::Annual.advance(date(2028, 2, 29)),
            Ok(date(2029, 2, 28))
        );
        assert_eq!(
            ServiceFrequency::Weekly.advance(date(2026, 12, 29)),
            Ok(date(2027, 1, 5))
        );
        assert_eq!(
            ServiceFrequency::EveryDays(10).advance(date(2026, 3, 25)),
            Ok(date(2026, 4, 4))
        );
    }

    #[test]
    fn test_zero_day_interval_is_rejected() {
        assert_eq!(
            ServiceFrequency::EveryDays(0).advance(date(2026, 1, 1)),
            Err(ScheduleError::InvalidInterval { days: 0 })
        );
    }

    #[test]
    fn test_completion_anchors_on_completed_date() {
        let c = contract(ServiceFrequency::Monthly, None);
        let change = plan_completion(&c, date(2026, 2, 10)).unwrap();
        assert_eq!(change.previous_due_date, Some(date(2026, 1, 31)));
        assert_eq!(change.next_due_date, Some(date(2026, 3, 10)));
        assert_eq!(change.last_completed_on, Some(date(2026, 2, 10)));
        assert_eq!(change.status, ContractStatus::Active);
    }

    #[test]
    fn test_completion_past_end_date_expires_contract() {
        let c = contract(ServiceFrequency::Quarterly, Some(date(2026, 6, 30)));
        let change = plan_completion(&c, date(2026, 4, 15)).unwrap();
        assert_eq!(change.next_due_date, None);
        assert_eq!(change.status, ContractStatus::Expired);
    }

    #[test]
    fn test_inactive_contract_cannot_be_completed_or_rescheduled() {
        let mut c = contract(ServiceFrequency::Monthly, None);
        c.status = ContractStatus::Paused;
        assert!(matches!(
            plan_completion(&c, date(2026, 2, 1)),
            Err(ScheduleError::ContractNotActive { .. })
        ));
        assert!(matches!(
            plan_reschedule(&c, date(2026, 2, 1)),
            Err(ScheduleError::ContractNotActive { .. })
        ));
    }

    #[test]
    fn test_reschedule_must_stay_within_term() {
        let c = contract(ServiceFrequency::Monthly, Some(date(2026, 12, 31)));
        assert_eq!(
            plan_reschedule(&c, date(2025, 12, 31)),
            Err(ScheduleError::BeforeStart {
                date: date(2025, 12, 31),
                start: date(2026, 1, 1)
            })
        );
        assert_eq!(
            plan_reschedule(&c, date(2027, 1, 1)),
            Err(ScheduleError::AfterEnd {
                date: date(2027, 1, 1),
                end: date(2026, 12, 31)
            })
        );
        let change = plan_reschedule(&c, date(2026, 2, 14)).unwrap();
        assert_eq!(change.next_due_date, Some(date(2026, 2, 14)));
        assert_eq!(change.status, ContractStatus::Active);
    }

    #[test]
    fn test_validate_term() {
        assert!(validate_term(
            date(2026, 1, 1),
            Some(date(2026, 12, 31)),
            Some(date(2026, 2, 1))
        )
        .is_ok());
        assert!(validate_term(date(2026, 1, 1), Some(date(2025, 12, 31)), None).is_err());
        assert!(validate_term(date(2026, 1, 1), None, Some(date(2025, 6, 1))).is_err());
    }

    #[test]
    fn test_logs_to_prune_keeps_newest() {
        let base = Utc::now();
        let contract_id = new_entity_id();
        let logs: Vec<ServiceLog> = (0..5)
            .map(|i| ServiceLog {
                log_id: new_entity_id(),
                tenant_id: new_entity_id(),
                contract_id,
                kind: ServiceLogKind::Completed,
                performed_on: date(2026, 1, 1 + i as u32),
                previous_due_date: None,
                next_due_date: None,
                notes: None,
                performed_by: None,
                created_at: base + Duration::minutes(i),
            })
            .collect();

        let pruned = logs_to_prune(&logs, 3);
        assert_eq!(pruned, vec![logs[1].log_id, logs[0].log_id]);
        assert!(logs_to_prune(&logs, 5).is_empty());
        assert!(logs_to_prune(&logs, 0).is_empty());
        assert!(logs_to_prune(&logs, -1).is_empty());
    }

    use proptest::prelude::*;

    fn arb_date() -> impl Strategy<Value = Date> {
        (0u64..20_000).prop_map(|days| date(2000, 1, 1) + Days::new(days))
    }

    fn arb_frequency() -> impl Strategy<Value = ServiceFrequency> {
        prop_oneof![
            Just(ServiceFrequency::Weekly),
            Just(ServiceFrequency::Monthly),
            Just(ServiceFrequency::Quarterly),
            Just(ServiceFrequency::SemiAnnual),
            Just(ServiceFrequency::Annual),
            (1u32..400).prop_map(ServiceFrequency::EveryDays),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_advance_moves_forward(frequency in arb_frequency(), from in arb_date()) {
            let next = frequency.advance(from).unwrap();
            prop_assert!(next > from);
        }

        #[test]
        fn prop_completion_stays_within_term(
            frequency in arb_frequency(),
            offset in 0u64..400,
            term in proptest::option::of(0u64..800),
        ) {
            let mut c = contract(frequency, None);
            c.end_date = term.map(|days| c.start_date + Days::new(days));
            let completed_on = c.start_date + Days::new(offset);

            let change = plan_completion(&c, completed_on).unwrap();
            match change.next_due_date {
                Some(next) => {
                    prop_assert_eq!(change.status, ContractStatus::Active);
                    prop_assert!(next > completed_on);
                    if let Some(end) = c.end_date {
                        prop_assert!(next <= end);
                    }
                }
                None => prop_assert_eq!(change.status, ContractStatus::Expired),
            }
        }

        #[test]
        fn prop_pruning_keeps_newest_logs(len in 0usize..12, retention in 1i32..10) {
            let base = Utc::now();
            let logs: Vec<ServiceLog> = (0..len)
                .map(|i| ServiceLog {
                    log_id: new_entity_id(),
                    tenant_id: new_entity_id(),
                    contract_id: new_entity_id(),
                    kind: ServiceLogKind::Completed,
                    performed_on: date(2026, 1, 1),
                    previous_due_date: None,
                    next_due_date: None,
                    notes: None,
                    performed_by: None,
                    created_at: base + Duration::minutes(i as i64),
                })
                .collect();

            let pruned = logs_to_prune(&logs, retention);
            let keep = len.min(retention as usize);
            prop_assert_eq!(pruned.len(), len - keep);
            // Everything pruned is older than everything kept
            for log in &logs[len - keep..] {
                prop_assert!(!pruned.contains(&log.log_id));
            }
        }
    }
}
