use std::{fmt, str::FromStr};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use snafu::Snafu;

/// An identifier could not be parsed from its hexadecimal form.
#[derive(Debug, Snafu)]
#[snafu(display("Invalid {} '{}': expected {} hexadecimal characters.", kind, input, expected_len))]
pub struct InvalidIdentifier {
    kind: &'static str,
    input: String,
    expected_len: usize,
}

fn decode_hex<const N: usize>(kind: &'static str, input: &str) -> Result<[u8; N], InvalidIdentifier> {
    let invalid = || {
        InvalidIdentifierSnafu {
            kind,
            input,
            expected_len: N * 2,
        }
        .build()
    };

    if input.len() != N * 2 || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let mut bytes = [0u8; N];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&input[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(bytes)
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $len:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Creates a new identifier from its raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes of the identifier.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Returns `true` if every byte of the identifier is zero.
            pub fn is_empty(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write_hex(f, &self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                write_hex(f, &self.0)?;
                write!(f, ")")
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdentifier;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex::<$len>($kind, s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(D::Error::custom)
            }
        }
    };
}

identifier!(
    /// A trace identifier.
    ///
    /// Groups all spans belonging to one distributed trace. Represented as 16 opaque bytes, and rendered as 32
    /// lowercase hexadecimal characters.
    TraceId,
    16,
    "trace ID"
);

identifier!(
    /// A span identifier.
    ///
    /// Represented as 8 opaque bytes, and rendered as 16 lowercase hexadecimal characters.
    SpanId,
    8,
    "span ID"
);

impl From<u128> for TraceId {
    fn from(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}
