//! The event-log wire contract (spec.md §6).
//!
//! The event log viewer (out of scope for this crate) and the log writer
//! must agree on both the numeric id and the display name of every action.
//! This module is that shared contract: [`EventClass`], [`EventType`] and
//! the 70-entry [`EventAction`] enumeration.

use std::fmt;

/// Which subsystem raised the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    /// Host-level event.
    Host,
    /// Global/daemon-level event.
    Global,
    /// Directory-level event.
    Directory,
    /// Production (transfer outcome) event.
    Production,
}

impl EventClass {
    /// The single-character wire tag for this class.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Host => 'H',
            Self::Global => 'G',
            Self::Directory => 'D',
            Self::Production => 'P',
        }
    }
}

/// How the event was triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    /// Triggered by an external integration.
    Ext,
    /// Triggered by an operator action.
    Manual,
    /// Triggered automatically by the transfer core itself.
    Auto,
}

impl EventType {
    /// The single-character wire tag for this type.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Ext => 'E',
            Self::Manual => 'M',
            Self::Auto => 'A',
        }
    }
}

macro_rules! event_actions {
    ($( $id:literal => $variant:ident $(,)? )+) => {
        /// A fixed enumeration of event-action identifiers (spec.md §6).
        ///
        /// The numeric id is part of the wire contract: it must never be
        /// renumbered once written to a deployed event log.
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[repr(u8)]
        pub enum EventAction {
            $( $variant = $id, )+
        }

        impl EventAction {
            /// Looks up an action by its wire id.
            #[must_use]
            pub fn from_id(id: u8) -> Option<Self> {
                match id {
                    $( $id => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Returns the wire id for this action.
            #[must_use]
            pub const fn id(self) -> u8 {
                self as u8
            }

            /// The free-text display name the viewer renders.
            #[must_use]
            pub const fn display_name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }
        }
    };
}

event_actions! {
    1  => RereadDirConfig,
    2  => RereadHostConfig,
    3  => RereadRenameRule,
    4  => AmgStart,
    5  => AmgConfigError,
    6  => AmgLoop,
    7  => FdStart,
    8  => FdLoop,
    9  => FdShutdown,
    10 => DirConfigSaved,
    11 => HostConfigSaved,
    12 => AmgStartError,
    13 => AmgStop,
    14 => AmgOfflineFirstError,
    15 => AmgOfflineStop,
    16 => AfdStart,
    17 => AfdStop,
    18 => AfdShutdownForced,
    19 => AfdStartError,
    20 => AfdOfflineFirstError,
    21 => AfdOfflineStop,
    22 => AfdSystemRestart,
    23 => FdStopped,
    24 => ArchiveOff,
    25 => ArchiveOn,
    26 => CreateTargetDirOff,
    27 => CreateTargetDirOn,
    28 => Offline,
    29 => EnableHost,
    30 => DisableHost,
    31 => StartTransfer,
    32 => StopTransfer,
    33 => StartErrorQueue,
    34 => StopErrorQueue,
    35 => RetryOn,
    36 => RetryOff,
    37 => SwitchHost,
    38 => ToggleHost,
    39 => HostWarnTime,
    40 => ManualRetry,
    41 => UnsetErrorStatistics,
    42 => ConfigHostDisable,
    43 => ConfigHostEnable,
    44 => ConfigReread,
    45 => EventQueued,
    46 => WarnTimeSet,
    47 => WarnTimeUnset,
    48 => ErrorStart,
    49 => ErrorEnd,
    50 => MaxErrorsReached,
    51 => Online,
    52 => StartedTransferManual,
    53 => StoppedTransferManual,
    54 => MailConfigUpdated,
    55 => MailConfigAdded,
    56 => MailConfigRemoved,
    57 => Simulate,
    58 => ChangeInfo,
    59 => EnableDir,
    60 => DisableDir,
    61 => DirErrorOffline,
    62 => DirErrorOnline,
    63 => DirWarnTimeSet,
    64 => DirWarnTimeUnset,
    65 => RescanDir,
    66 => ForceReread,
    67 => SetDebugLevel,
    68 => UnsetDebugLevel,
    69 => ProductionLog,
    70 => ChangeRealHostname,
}

/// One record of the event log (spec.md §6): class, type, action, an
/// optional alias, and zero or more SEPARATOR-delimited fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Big-endian hex timestamp (unix seconds), as it appears on the wire.
    pub timestamp: u64,
    /// Event class.
    pub class: EventClass,
    /// Event type.
    pub event_type: EventType,
    /// Event action.
    pub action: EventAction,
    /// Host or directory alias this event concerns, if any.
    pub alias: Option<String>,
    /// Additional SEPARATOR-delimited fields (user, reason, old/new, ...).
    pub fields: Vec<String>,
}

/// The byte used to delimit fields within a single event-log line.
pub const FIELD_SEPARATOR: char = '\x0f';

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}{}{}{}",
            self.timestamp,
            self.class.tag(),
            self.event_type.tag(),
            self.action.id()
        )?;
        if let Some(alias) = &self.alias {
            write!(f, "{FIELD_SEPARATOR}{alias}")?;
        }
        for field in &self.fields {
            write!(f, "{FIELD_SEPARATOR}{field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        assert_eq!(EventAction::from_id(1), Some(EventAction::RereadDirConfig));
        assert_eq!(EventAction::from_id(70), Some(EventAction::ChangeRealHostname));
        assert_eq!(EventAction::from_id(0), None);
        assert_eq!(EventAction::from_id(71), None);
    }

    #[test]
    fn display_name_matches_variant_identifier() {
        assert_eq!(EventAction::SwitchHost.display_name(), "SwitchHost");
    }

    #[test]
    fn record_renders_hex_timestamp_and_separated_fields() {
        let record = EventRecord {
            timestamp: 0x6123_abcd,
            class: EventClass::Host,
            event_type: EventType::Manual,
            action: EventAction::DisableHost,
            alias: Some("host-a".into()),
            fields: vec!["alice".into(), "maintenance".into()],
        };
        let rendered = record.to_string();
        assert!(rendered.starts_with("6123abcdHM30"));
        assert_eq!(rendered.matches(FIELD_SEPARATOR).count(), 3);
    }
}
