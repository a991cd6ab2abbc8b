//! Operation descriptors: one per exposed inference capability.

use std::fmt;
use std::str::FromStr;

/// Capabilities exposed through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    LicensePlate,
    Detect,
    Transcribe,
    RemoveBackground,
    Caption,
}

/// Shape of the JSON the upstream returns, and the gateway returns to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSchema {
    LicensePlate,
    Detection,
    Transcription,
    BackgroundRemoval,
    Caption,
}

/// Immutable description of one operation.
#[derive(Debug, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    /// Stable name used in logs, metrics and breaker groups.
    pub name: &'static str,
    /// Path on the upstream, relative to its base URL.
    pub path: &'static str,
    pub schema: ResponseSchema,
    /// Whether a circuit breaker guards this operation.
    pub guarded: bool,
}

pub static LICENSE_PLATE: Operation = Operation {
    kind: OperationKind::LicensePlate,
    name: "license-plate",
    path: "/api/v1/license-plate/detect",
    schema: ResponseSchema::LicensePlate,
    guarded: true,
};

pub static DETECT: Operation = Operation {
    kind: OperationKind::Detect,
    name: "detect",
    path: "/detect",
    schema: ResponseSchema::Detection,
    guarded: true,
};

pub static TRANSCRIBE: Operation = Operation {
    kind: OperationKind::Transcribe,
    name: "transcribe",
    path: "/transcribe",
    schema: ResponseSchema::Transcription,
    guarded: true,
};

// Background removal and captioning run without a breaker.
pub static REMOVE_BACKGROUND: Operation = Operation {
    kind: OperationKind::RemoveBackground,
    name: "remove-background",
    path: "/remove-background",
    schema: ResponseSchema::BackgroundRemoval,
    guarded: false,
};

pub static CAPTION: Operation = Operation {
    kind: OperationKind::Caption,
    name: "caption",
    path: "/caption",
    schema: ResponseSchema::Caption,
    guarded: false,
};

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::LicensePlate,
        OperationKind::Detect,
        OperationKind::Transcribe,
        OperationKind::RemoveBackground,
        OperationKind::Caption,
    ];

    pub fn descriptor(self) -> &'static Operation {
        match self {
            OperationKind::LicensePlate => &LICENSE_PLATE,
            OperationKind::Detect => &DETECT,
            OperationKind::Transcribe => &TRANSCRIBE,
            OperationKind::RemoveBackground => &REMOVE_BACKGROUND,
            OperationKind::Caption => &CAPTION,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_match_kind() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
            assert!(kind.descriptor().path.starts_with('/'));
        }
    }

    #[test]
    fn test_guarded_set() {
        let guarded: Vec<_> = OperationKind::ALL
            .into_iter()
            .filter(|k| k.descriptor().guarded)
            .map(OperationKind::name)
            .collect();
        assert_eq!(guarded, vec!["license-plate", "detect", "transcribe"]);
    }

    #[test]
    fn test_parse_by_name() {
        assert_eq!("remove-background".parse::<OperationKind>(), Ok(OperationKind::RemoveBackground));
        assert!("ocr".parse::<OperationKind>().is_err());
    }
}
