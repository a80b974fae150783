//! Macro for implementing Display and FromStr for status enums
//!
//! Status values are stored as lowercase text in SQLite and parsed back on
//! read, so every persisted status enum shares one conversion pair.
//!
//! # Example
//!
//! ```rust
//! use costsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum SyncPhase {
//!     Fetching,
//!     Persisting,
//! }
//!
//! impl_domain_status_conversions!(SyncPhase {
//!     Fetching => "fetching",
//!     Persisting => "persisting",
//! });
//!
//! assert_eq!(SyncPhase::Fetching.to_string(), "fetching");
//! assert_eq!("PERSISTING".parse::<SyncPhase>(), Ok(SyncPhase::Persisting));
//! ```

/// Implements `Display` and case-insensitive `FromStr` for a status enum.
///
/// Parsing failures return a `String` naming the enum and the rejected input.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Lowercase storage representation of this status.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
