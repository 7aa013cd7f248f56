//! Port orientation and the shared sync blob.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted and networked state shared between a part and its mirrors.
///
/// Each component owns a handful of keys; the port owns `"iodir"`.
pub type SyncData = Map<String, Value>;

/// Which way resource flows through a port, seen from the structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoDirection {
    /// Resource flows from the neighbor into the structure.
    #[default]
    Input,
    /// Resource flows from the structure out to the neighbor.
    Output,
}

impl IoDirection {
    /// `true` for [`IoDirection::Input`].
    pub fn is_input(self) -> bool {
        matches!(self, IoDirection::Input)
    }

    /// `true` for [`IoDirection::Output`].
    pub fn is_output(self) -> bool {
        matches!(self, IoDirection::Output)
    }

    /// The other direction.
    pub fn toggled(self) -> Self {
        match self {
            IoDirection::Input => IoDirection::Output,
            IoDirection::Output => IoDirection::Input,
        }
    }

    /// Ordinal tag written to the sync blob.
    pub fn ordinal(self) -> u8 {
        match self {
            IoDirection::Input => 0,
            IoDirection::Output => 1,
        }
    }

    /// Inverse of [`IoDirection::ordinal`].
    pub fn from_ordinal(ordinal: u64) -> Option<Self> {
        match ordinal {
            0 => Some(IoDirection::Input),
            1 => Some(IoDirection::Output),
            _ => None,
        }
    }

    /// Read a direction stored under `key`, falling back to `default` when the
    /// key is missing or does not hold a known ordinal.
    pub fn read(data: &SyncData, key: &str, default: IoDirection) -> IoDirection {
        data.get(key)
            .and_then(Value::as_u64)
            .and_then(Self::from_ordinal)
            .unwrap_or(default)
    }

    /// Store `value` under `key`.
    pub fn write(data: &mut SyncData, key: &str, value: IoDirection) {
        data.insert(key.to_string(), Value::from(value.ordinal()));
    }

    /// Short label used in status lines.
    pub fn label(self) -> &'static str {
        match self {
            IoDirection::Input => "input",
            IoDirection::Output => "output",
        }
    }
}

/// How a port handler was configured when the structure placed it.
///
/// Active handlers belong to ports that push on their own; passive handlers
/// wait for the neighbor to pull or push through the exposed capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// The port drives transfers.
    Active,
    /// The neighbor drives transfers.
    #[default]
    Passive,
}

impl IoMode {
    /// `true` for [`IoMode::Active`].
    pub fn is_active(self) -> bool {
        matches!(self, IoMode::Active)
    }

    /// `true` for [`IoMode::Passive`].
    pub fn is_passive(self) -> bool {
        matches!(self, IoMode::Passive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_falls_back_on_missing_or_corrupt_values() {
        let mut data = SyncData::new();
        assert_eq!(
            IoDirection::read(&data, "iodir", IoDirection::Input),
            IoDirection::Input
        );

        data.insert("iodir".to_string(), json!("sideways"));
        assert_eq!(
            IoDirection::read(&data, "iodir", IoDirection::Output),
            IoDirection::Output
        );

        data.insert("iodir".to_string(), json!(7));
        assert_eq!(
            IoDirection::read(&data, "iodir", IoDirection::Input),
            IoDirection::Input
        );

        data.insert("iodir".to_string(), json!(-1));
        assert_eq!(
            IoDirection::read(&data, "iodir", IoDirection::Input),
            IoDirection::Input
        );
    }

    #[test]
    fn write_stores_the_ordinal() {
        let mut data = SyncData::new();
        IoDirection::write(&mut data, "iodir", IoDirection::Output);
        assert_eq!(data.get("iodir"), Some(&json!(1)));
        assert_eq!(
            IoDirection::read(&data, "iodir", IoDirection::Input),
            IoDirection::Output
        );
    }

    #[test]
    fn predicates_are_exclusive() {
        assert!(IoDirection::Input.is_input() && !IoDirection::Input.is_output());
        assert!(IoDirection::Output.is_output() && !IoDirection::Output.is_input());
        assert_eq!(IoDirection::Input.toggled(), IoDirection::Output);
        assert!(IoMode::default().is_passive());
    }
}
