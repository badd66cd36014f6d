//! Persisted Enum Tokens
//!
//! Every enum that reaches disk is written as a lowercase string token,
//! never as an ordinal, so variants can be added or reordered without
//! corrupting stored data.
//!
//! Reading is lenient: an unknown or missing token resolves to the enum's
//! documented default. A profile written by a newer build with a tag this
//! build does not know still loads.

/// Declares a string-token enum.
///
/// Generates `as_str`, the strict `parse`, the lenient `from_value`,
/// `Default`, `Display` and token-based serde impls.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident (default = $default:ident) {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $token:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored token for this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            /// Strict lookup (case-insensitive). `None` for unknown tokens.
            pub fn parse(value: &str) -> Option<Self> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($token) {
                        return Some($name::$variant);
                    }
                )+
                None
            }

            /// Lenient lookup: unknown or empty tokens resolve to the default.
            pub fn from_value(value: &str) -> Self {
                match Self::parse(value) {
                    Some(v) => v,
                    None => {
                        if !value.trim().is_empty() {
                            ::tracing::warn!(
                                "Unknown {} token {:?}, falling back to {}",
                                stringify!($name),
                                value,
                                $name::$default.as_str()
                            );
                        }
                        $name::$default
                    }
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <Option<String> as ::serde::Deserialize>::deserialize(deserializer)?;
                Ok(raw.as_deref().map(Self::from_value).unwrap_or_default())
            }
        }
    };
}

pub(crate) use token_enum;
