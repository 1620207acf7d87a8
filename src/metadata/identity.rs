//! Assembly names as they appear in `Assembly` and `AssemblyRef` rows.
//!
//! An [`AssemblyNameReference`] is both the scope of a type reference into another
//! assembly and the key an [`crate::AssemblyResolver`] is asked to locate. Two names
//! denote the same assembly when their [`AssemblyNameReference::full_name`]s are equal.
//!
//! # ECMA-335 References
//! - **Section II.6.3**: Referencing assemblies
//! - **Section II.22.2**: Assembly table
//! - **Section II.22.5**: AssemblyRef table
//! - **Section II.6.2.1.3**: PublicKeyToken

use std::{fmt, str::FromStr, sync::Arc};

use bitflags::bitflags;
use sha1::{Digest, Sha1};

use crate::{
    metadata::{
        tables::{AssemblyRefRow, AssemblyRow, TableId},
        token::Token,
    },
    Error, Result,
};

/// Reference counted [`AssemblyNameReference`]
pub type AssemblyNameRc = Arc<AssemblyNameReference>;

bitflags! {
    /// `AssemblyFlags`, §II.23.1.2
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AssemblyFlags: u32 {
        /// The blob holds the full public key rather than its token
        const PUBLIC_KEY = 0x0001;
        /// The implementation may be retargeted at runtime
        const RETARGETABLE = 0x0100;
        /// Windows Runtime content
        const WINDOWS_RUNTIME = 0x0200;
        /// Reserved
        const DISABLE_JIT_COMPILE_OPTIMIZER = 0x4000;
        /// Reserved
        const ENABLE_JIT_COMPILE_TRACKING = 0x8000;
    }
}

/// Four-part assembly version (`major.minor.build.revision`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version number
    pub major: u16,
    /// Minor version number
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// The `0.0.0.0` version
    pub const ZERO: AssemblyVersion = AssemblyVersion::new(0, 0, 0, 0);

    /// Create a new version
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse `"1.2.3.4"`; missing trailing components default to `0`
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for empty input, more than four components or
    /// components that are not 16-bit unsigned numbers.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.trim().split('.').collect();

        if parts.is_empty() || parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl From<(u16, u16, u16, u16)> for AssemblyVersion {
    fn from(value: (u16, u16, u16, u16)) -> Self {
        AssemblyVersion::new(value.0, value.1, value.2, value.3)
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// The name of an assembly, either the defining one (`Assembly` row) or a referenced one
/// (`AssemblyRef` row, or minted by an import).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyNameReference {
    /// `AssemblyRef` / `Assembly` token; nil for names minted at runtime
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Culture, `None` for culture-neutral
    pub culture: Option<String>,
    /// Flags
    pub flags: AssemblyFlags,
    /// Full public key, empty if only the token is known
    pub public_key: Vec<u8>,
    /// 8-byte public key token, empty if the assembly is not strong-named
    pub public_key_token: Vec<u8>,
    /// Hash of the referenced assembly
    pub hash_value: Vec<u8>,
}

impl AssemblyNameReference {
    /// Create a culture-neutral, non-strong-named reference
    #[must_use]
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        AssemblyNameReference {
            token: Token::nil(TableId::AssemblyRef),
            name: name.into(),
            version,
            culture: None,
            flags: AssemblyFlags::empty(),
            public_key: Vec::new(),
            public_key_token: Vec::new(),
            hash_value: Vec::new(),
        }
    }

    /// Build the name of an `AssemblyRef` row
    #[must_use]
    pub fn from_assembly_ref(row: &AssemblyRefRow, token: Token) -> Self {
        let flags = AssemblyFlags::from_bits_retain(row.flags);
        let (public_key, public_key_token) = if flags.contains(AssemblyFlags::PUBLIC_KEY) {
            let token = public_key_token(&row.public_key_or_token);
            (row.public_key_or_token.clone(), token)
        } else {
            (Vec::new(), row.public_key_or_token.clone())
        };

        AssemblyNameReference {
            token,
            name: row.name.clone(),
            version: row.version.into(),
            culture: (!row.culture.is_empty()).then(|| row.culture.clone()),
            flags,
            public_key,
            public_key_token,
            hash_value: row.hash_value.clone(),
        }
    }

    /// Build the name of the `Assembly` row of an image
    #[must_use]
    pub fn from_assembly(row: &AssemblyRow, token: Token) -> Self {
        AssemblyNameReference {
            token,
            name: row.name.clone(),
            version: row.version.into(),
            culture: (!row.culture.is_empty()).then(|| row.culture.clone()),
            flags: AssemblyFlags::from_bits_retain(row.flags),
            public_key_token: public_key_token(&row.public_key),
            public_key: row.public_key.clone(),
            hash_value: Vec::new(),
        }
    }

    /// Parse a display name such as
    /// `"mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"`
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for an empty name and [`Error::Malformed`] for
    /// unparsable version or token components.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "Assembly name cannot be empty".to_string(),
            ));
        }

        let mut reference = AssemblyNameReference::new(name, AssemblyVersion::ZERO);
        for part in parts {
            if let Some(value) = part.strip_prefix("Version=") {
                reference.version = AssemblyVersion::parse(value)?;
            } else if let Some(value) = part.strip_prefix("Culture=") {
                if !value.eq_ignore_ascii_case("neutral") {
                    reference.culture = Some(value.to_string());
                }
            } else if let Some(value) = part.strip_prefix("PublicKeyToken=") {
                if value != "null" && !value.is_empty() {
                    reference.public_key_token = decode_hex(value)?;
                    if reference.public_key_token.len() != 8 {
                        return Err(malformed_error!(
                            "PublicKeyToken must be exactly 8 bytes, got '{}'",
                            value
                        ));
                    }
                }
            } else if let Some(value) = part.strip_prefix("Retargetable=") {
                reference
                    .flags
                    .set(AssemblyFlags::RETARGETABLE, value.eq_ignore_ascii_case("yes"));
            }
        }

        Ok(reference)
    }

    /// The display name used to compare and deduplicate assembly references
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut name = format!(
            "{}, Version={}, Culture={}, PublicKeyToken=",
            self.name,
            self.version,
            self.culture.as_deref().unwrap_or("neutral")
        );

        if self.public_key_token.is_empty() {
            name.push_str("null");
        } else {
            for byte in &self.public_key_token {
                name.push_str(&format!("{byte:02x}"));
            }
        }

        if self.flags.contains(AssemblyFlags::RETARGETABLE) {
            name.push_str(", Retargetable=Yes");
        }

        name
    }

    /// True if the name carries a public key or public key token
    #[must_use]
    pub fn is_strong_named(&self) -> bool {
        !self.public_key_token.is_empty()
    }

    /// A copy of this name suitable for insertion into another module: same identity,
    /// no token.
    #[must_use]
    pub fn detached(&self) -> Self {
        AssemblyNameReference {
            token: Token::nil(TableId::AssemblyRef),
            ..self.clone()
        }
    }
}

impl fmt::Display for AssemblyNameReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl FromStr for AssemblyNameReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AssemblyNameReference::parse(s)
    }
}

/// Compute the public key token: the last 8 bytes of the SHA-1 hash of the key, reversed.
///
/// An empty key yields an empty token.
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> Vec<u8> {
    if public_key.is_empty() {
        return Vec::new();
    }

    let hash = Sha1::digest(public_key);
    hash[hash.len() - 8..].iter().rev().copied().collect()
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    if value.len() % 2 != 0 {
        return Err(malformed_error!("Odd number of hex digits in '{}'", value));
    }

    (0..value.len())
        .step_by(2)
        .map(|i| {
            value
                .get(i..i + 2)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| malformed_error!("Invalid hex in '{}'", value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parse() {
        assert_eq!(
            AssemblyVersion::parse("4.0.30319.1").unwrap(),
            AssemblyVersion::new(4, 0, 30319, 1)
        );
        assert_eq!(
            AssemblyVersion::parse("2.1").unwrap(),
            AssemblyVersion::new(2, 1, 0, 0)
        );
        assert!(AssemblyVersion::parse("1.2.3.4.5").is_err());
        assert!(AssemblyVersion::parse("a.b").is_err());
        assert!(AssemblyVersion::parse("70000").is_err());
    }

    #[test]
    fn parse_full_display_name() {
        let name = AssemblyNameReference::parse(
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();

        assert_eq!(name.name, "mscorlib");
        assert_eq!(name.version, AssemblyVersion::new(4, 0, 0, 0));
        assert_eq!(name.culture, None);
        assert_eq!(
            name.public_key_token,
            vec![0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]
        );
        assert!(name.is_strong_named());
        assert_eq!(
            name.full_name(),
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn parse_simple_name() {
        let name: AssemblyNameReference = "Lib".parse().unwrap();
        assert_eq!(
            name.full_name(),
            "Lib, Version=0.0.0.0, Culture=neutral, PublicKeyToken=null"
        );
    }

    #[test]
    fn parse_rejects_empty_name() {
        assert!(matches!(
            AssemblyNameReference::parse(" , Version=1.0.0.0"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(AssemblyNameReference::parse("Lib, PublicKeyToken=abc").is_err());
    }

    #[test]
    fn retargetable_in_full_name() {
        let name = AssemblyNameReference::parse("System, Retargetable=Yes").unwrap();
        assert!(name.flags.contains(AssemblyFlags::RETARGETABLE));
        assert!(name.full_name().ends_with(", Retargetable=Yes"));
    }

    #[test]
    fn token_from_public_key() {
        let key = vec![0u8; 160];
        let token = public_key_token(&key);
        assert_eq!(token.len(), 8);

        let hash = Sha1::digest(&key);
        assert_eq!(token[0], hash[19]);
        assert_eq!(token[7], hash[12]);

        assert!(public_key_token(&[]).is_empty());
    }

    #[test]
    fn from_assembly_ref_with_full_key() {
        let row = AssemblyRefRow {
            version: (1, 2, 3, 4),
            flags: AssemblyFlags::PUBLIC_KEY.bits(),
            public_key_or_token: vec![1, 2, 3, 4],
            name: "Strong".into(),
            culture: "de-DE".into(),
            hash_value: Vec::new(),
        };

        let name = AssemblyNameReference::from_assembly_ref(&row, Token::new(TableId::AssemblyRef, 3));
        assert_eq!(name.token.row(), 3);
        assert_eq!(name.public_key, vec![1, 2, 3, 4]);
        assert_eq!(name.public_key_token, public_key_token(&[1, 2, 3, 4]));
        assert_eq!(name.culture.as_deref(), Some("de-DE"));
        assert!(name.full_name().contains("Culture=de-DE"));
    }

    #[test]
    fn detached_drops_token_only() {
        let row = AssemblyRefRow {
            version: (1, 0, 0, 0),
            flags: 0,
            public_key_or_token: Vec::new(),
            name: "Lib".into(),
            culture: String::new(),
            hash_value: Vec::new(),
        };
        let name = AssemblyNameReference::from_assembly_ref(&row, Token::new(TableId::AssemblyRef, 1));
        let detached = name.detached();

        assert!(detached.token.is_nil());
        assert_eq!(detached.full_name(), name.full_name());
    }
}
