use serde::{Deserialize, Serialize};

/// Raised when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serialized form is the same string `as_str` returns.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Classification {
    Normal => "Normal",
    Abnormal => "Abnormal",
    Inconclusive => "Inconclusive",
});

str_enum!(RiskLevel {
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

str_enum!(AnalysisMode {
    Standard => "standard",
    MultiDisease => "multi-disease",
    Comparison => "comparison",
});

/// Upper bound (exclusive) of the Low band.
pub const LOW_RISK_CEILING: u8 = 30;
/// Upper bound (exclusive) of the Medium band.
pub const MEDIUM_RISK_CEILING: u8 = 60;

impl Classification {
    /// Lenient parse used by the wire decoder: the remote model is not
    /// consistent about casing.
    pub fn parse_loose(s: &str) -> Result<Self, InvalidEnum> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "abnormal" => Ok(Self::Abnormal),
            "inconclusive" => Ok(Self::Inconclusive),
            _ => Err(InvalidEnum {
                field: "Classification".into(),
                value: s.into(),
            }),
        }
    }
}

impl RiskLevel {
    /// Risk band for a 0-100 score: <30 Low, <60 Medium, else High.
    pub fn from_score(score: u8) -> Self {
        if score < LOW_RISK_CEILING {
            Self::Low
        } else if score < MEDIUM_RISK_CEILING {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl Default for AnalysisMode {
    fn default() -> Self {
        Self::Standard
    }
}

impl AnalysisMode {
    /// Comparison mode needs a second, previous scan.
    pub fn needs_reference_scan(&self) -> bool {
        matches!(self, Self::Comparison)
    }
}
