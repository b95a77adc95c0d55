//! Enum types for CRM entities
//!
//! Every enum is stored as TEXT using its variant name. Parsing is
//! case-insensitive and ignores `_`, `-` and spaces so that `sales_rep`,
//! `SalesRep` and `Sales Rep` all resolve to the same variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind}: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

fn normalize_variant(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Declares a fieldless enum with TEXT codecs (`as_db_str`, `from_db_str`),
/// `Display`, `FromStr` and an `ALL` table.
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Convert to database string representation.
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Parse from database string representation.
            pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
                let wanted = normalize_variant(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize_variant(v.as_db_str()) == wanted)
                    .ok_or_else(|| EnumParseError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_db_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

db_enum! {
    /// Entity type discriminator for polymorphic references.
    pub enum EntityType as "entity type" {
        Profile,
        Lead,
        Account,
        Contact,
        Opportunity,
        Activity,
        Document,
        DocumentLink,
        Note,
        AuditLog,
        ServiceContract,
        ServiceLog,
        ImportBatch,
        StagedLead,
    }
}

impl EntityType {
    /// Whether documents, notes and activities may be attached to this type.
    pub fn is_linkable(&self) -> bool {
        matches!(
            self,
            EntityType::Lead
                | EntityType::Account
                | EntityType::Contact
                | EntityType::Opportunity
                | EntityType::ServiceContract
        )
    }
}

db_enum! {
    /// Role attached to a user profile.
    #[derive(Default)]
    pub enum Role as "role" {
        Admin,
        Manager,
        SalesRep,
        ServiceTech,
        #[default]
        Viewer,
    }
}

impl Role {
    /// Lenient parse used for role strings coming from tokens and profiles.
    /// Unknown roles get the least privileged role.
    pub fn from_role_str(s: &str) -> Self {
        Self::from_db_str(s).unwrap_or_default()
    }
}

db_enum! {
    /// Lifecycle of a lead.
    #[derive(Default)]
    pub enum LeadStatus as "lead status" {
        #[default]
        New,
        Contacted,
        Qualified,
        Unqualified,
        Converted,
    }
}

impl LeadStatus {
    pub fn can_convert(&self) -> bool {
        !matches!(self, LeadStatus::Converted)
    }
}

db_enum! {
    /// Discrete sales pipeline stages.
    #[derive(Default)]
    pub enum OpportunityStage as "opportunity stage" {
        #[default]
        Prospecting,
        Qualification,
        NeedsAnalysis,
        Proposal,
        Negotiation,
        ClosedWon,
        ClosedLost,
    }
}

impl OpportunityStage {
    /// Win probability (percent) assigned when an opportunity enters the stage.
    pub fn default_probability(&self) -> i32 {
        match self {
            OpportunityStage::Prospecting => 10,
            OpportunityStage::Qualification => 20,
            OpportunityStage::NeedsAnalysis => 40,
            OpportunityStage::Proposal => 60,
            OpportunityStage::Negotiation => 80,
            OpportunityStage::ClosedWon => 100,
            OpportunityStage::ClosedLost => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, OpportunityStage::ClosedWon | OpportunityStage::ClosedLost)
    }
}

db_enum! {
    pub enum ActivityType as "activity type" {
        Call,
        Email,
        Meeting,
        Task,
    }
}

db_enum! {
    /// Kind of change recorded in the audit log.
    pub enum AuditAction as "audit action" {
        Create,
        Update,
        Delete,
        Import,
        Convert,
        Complete,
        Reschedule,
    }
}

db_enum! {
    #[derive(Default)]
    pub enum ContractStatus as "contract status" {
        #[default]
        Active,
        Paused,
        Expired,
        Cancelled,
    }
}

impl ContractStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ContractStatus::Active)
    }
}

db_enum! {
    pub enum ServiceLogKind as "service log kind" {
        Completed,
        Rescheduled,
    }
}

db_enum! {
    /// Status of a staged CSV import batch.
    #[derive(Default)]
    pub enum ImportStatus as "import status" {
        #[default]
        Staged,
        Confirmed,
        Discarded,
    }
}

db_enum! {
    /// Outcome of validating a single staged CSV row.
    pub enum StagedRowStatus as "staged row status" {
        Valid,
        Invalid,
        Duplicate,
    }
}

/// Recurrence of a service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ServiceFrequency {
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    /// Fixed interval in days
    EveryDays(u32),
}

impl ServiceFrequency {
    const EVERY_DAYS_PREFIX: &'static str = "EveryDays:";

    /// Convert to database string representation (`EveryDays:14` for
    /// custom intervals).
    pub fn as_db_string(&self) -> String {
        match self {
            ServiceFrequency::Weekly => "Weekly".to_string(),
            ServiceFrequency::Monthly => "Monthly".to_string(),
            ServiceFrequency::Quarterly => "Quarterly".to_string(),
            ServiceFrequency::SemiAnnual => "SemiAnnual".to_string(),
            ServiceFrequency::Annual => "Annual".to_string(),
            ServiceFrequency::EveryDays(days) => format!("{}{}", Self::EVERY_DAYS_PREFIX, days),
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        let err = || EnumParseError {
            kind: "service frequency",
            value: s.to_string(),
        };
        if let Some(days) = s.strip_prefix(Self::EVERY_DAYS_PREFIX) {
            return days.trim().parse::<u32>().map(ServiceFrequency::EveryDays).map_err(|_| err());
        }
        match normalize_variant(s).as_str() {
            "weekly" => Ok(ServiceFrequency::Weekly),
            "monthly" => Ok(ServiceFrequency::Monthly),
            "quarterly" => Ok(ServiceFrequency::Quarterly),
            "semiannual" => Ok(ServiceFrequency::SemiAnnual),
            "annual" | "yearly" => Ok(ServiceFrequency::Annual),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for ServiceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_db_string())
    }
}

impl FromStr for ServiceFrequency {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_str_roundtrip_for_every_variant() {
        for role in Role::ALL {
            assert_eq!(Role::from_db_str(role.as_db_str()), Ok(*role));
        }
        for stage in OpportunityStage::ALL {
            assert_eq!(OpportunityStage::from_db_str(stage.as_db_str()), Ok(*stage));
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_separators() {
        assert_eq!(Role::from_db_str("sales_rep"), Ok(Role::SalesRep));
        assert_eq!(Role::from_db_str("SERVICE-TECH"), Ok(Role::ServiceTech));
        assert_eq!(
            OpportunityStage::from_db_str("closed won"),
            Ok(OpportunityStage::ClosedWon)
        );
    }

    #[test]
    fn test_parse_error_names_the_kind() {
        let err = LeadStatus::from_db_str("bogus").unwrap_err();
        assert_eq!(err.to_string(), "Invalid lead status: bogus");
    }

    #[test]
    fn test_unknown_role_falls_back_to_viewer() {
        assert_eq!(Role::from_role_str("superuser"), Role::Viewer);
        assert_eq!(Role::from_role_str("admin"), Role::Admin);
    }

    #[test]
    fn test_stage_probabilities() {
        assert_eq!(OpportunityStage::Prospecting.default_probability(), 10);
        assert_eq!(OpportunityStage::ClosedWon.default_probability(), 100);
        assert_eq!(OpportunityStage::ClosedLost.default_probability(), 0);
        assert!(OpportunityStage::ClosedLost.is_closed());
        assert!(!OpportunityStage::Proposal.is_closed());
    }

    #[test]
    fn test_frequency_db_string() {
        assert_eq!(ServiceFrequency::EveryDays(14).as_db_string(), "EveryDays:14");
        assert_eq!(
            ServiceFrequency::from_db_str("EveryDays:14"),
            Ok(ServiceFrequency::EveryDays(14))
        );
        assert_eq!(
            ServiceFrequency::from_db_str("semi_annual"),
            Ok(ServiceFrequency::SemiAnnual)
        );
        assert!(ServiceFrequency::from_db_str("EveryDays:x").is_err());
    }
}
