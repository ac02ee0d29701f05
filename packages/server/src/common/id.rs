//! Typed identifiers for the screening entities.
//!
//! Each entity gets its own UUID newtype, so an `InterviewId` cannot be
//! passed where an `ApplicationId` is expected. New ids are v7 (time-ordered)
//! which keeps primary key inserts append-only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn into_uuid(self) -> Uuid {
                self.0
            }

            /// Placeholder id for tests and error fixtures.
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// A candidate's application moving through screening.
    ApplicationId
);
entity_id!(
    /// A row in the `jobs` table. Its `entity_id` is an `ApplicationId`, or nil
    /// for the talent-system sync.
    JobId
);
entity_id!(
    /// An entry in the append-only decision log.
    DecisionId
);
entity_id!(
    /// An interview invitation sent to a candidate.
    InterviewId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_time_ordered() {
        let first = ApplicationId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ApplicationId::new();
        assert!(first < second);
        assert_eq!(first.into_uuid().get_version_num(), 7);
    }

    #[test]
    fn path_segment_parses_into_an_id() {
        let id = InterviewId::new();
        let parsed: InterviewId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("interview-42".parse::<InterviewId>().is_err());
    }

    #[test]
    fn serializes_as_a_bare_uuid() {
        let uuid = Uuid::now_v7();
        let id = JobId::from_uuid(uuid);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(uuid.to_string()));
        let back: JobId = serde_json::from_value(serde_json::json!(uuid.to_string())).unwrap();
        assert_eq!(back.into_uuid(), uuid);
    }

    #[test]
    fn application_id_converts_to_job_entity() {
        let application_id = ApplicationId::new();
        let entity: Uuid = application_id.into();
        assert_eq!(ApplicationId::from(entity), application_id);
        assert!(ApplicationId::nil().into_uuid().is_nil());
    }
}
