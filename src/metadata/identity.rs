//! Assembly identities: versions, public key tokens, processor architectures and display
//! names.
//!
//! An [`AssemblyName`] models a display name such as
//! `System.Xml, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089`, either
//! fully specified (read from metadata) or partial (a lookup request where unspecified
//! attributes match anything).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use strum::{Display, EnumString};

use crate::{
    file::{MACHINE_AMD64, MACHINE_ARM64, MACHINE_ARMNT, MACHINE_I386, MACHINE_IA64},
    metadata::cor20header::CorFlags,
    Error, Result,
};

/// `AssemblyFlags.PublicKey`: the blob holds the full public key.
pub const ASSEMBLY_FLAG_PUBLIC_KEY: u32 = 0x0001;
/// `AssemblyFlags.Retargetable`
pub const ASSEMBLY_FLAG_RETARGETABLE: u32 = 0x0100;

/// A four-part assembly version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// Creates a version from its four parts.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    /// Parses `major.minor[.build[.revision]]`; missing parts are zero.
    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(Error::InvalidArgument(format!("Invalid version '{value}'")));
        }

        let mut components = [0u16; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u16>()
                .map_err(|_| Error::InvalidArgument(format!("Invalid version component '{part}'")))?;
        }

        Ok(AssemblyVersion::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
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

/// The platform a module targets, named as the .NET runtime names them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum ProcessorArchitecture {
    /// Unknown or unsupported combination
    #[default]
    None,
    /// Platform neutral IL
    MSIL,
    /// 32-bit Intel
    X86,
    /// Itanium
    IA64,
    /// 64-bit AMD/Intel
    #[strum(to_string = "Amd64", serialize = "x64")]
    Amd64,
    /// 32-bit ARM
    Arm,
    /// 64-bit ARM
    Arm64,
}

impl ProcessorArchitecture {
    /// Derives the architecture from the PE machine, the PE kind and the CLI header flags.
    ///
    /// IL-only PE32 images are platform neutral unless they require a 32-bit process; an
    /// AnyCPU image that merely prefers 32-bit stays neutral.
    #[must_use]
    pub fn from_image(machine: u16, pe32_plus: bool, flags: CorFlags) -> Self {
        if pe32_plus {
            return match machine {
                MACHINE_AMD64 => ProcessorArchitecture::Amd64,
                MACHINE_IA64 => ProcessorArchitecture::IA64,
                MACHINE_ARM64 => ProcessorArchitecture::Arm64,
                _ => ProcessorArchitecture::None,
            };
        }

        match machine {
            MACHINE_I386 => {
                let il_only = flags.contains(CorFlags::ILONLY);
                let requires_32bit = flags.contains(CorFlags::REQUIRES_32BIT)
                    && !flags.contains(CorFlags::PREFERS_32BIT);
                if il_only && !requires_32bit {
                    ProcessorArchitecture::MSIL
                } else {
                    ProcessorArchitecture::X86
                }
            }
            MACHINE_ARMNT => ProcessorArchitecture::Arm,
            _ => ProcessorArchitecture::None,
        }
    }
}

/// An 8-byte public key token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyToken(pub [u8; 8]);

impl PublicKeyToken {
    /// Computes the token of a full public key: the last 8 bytes of its SHA-1 hash, reversed.
    #[must_use]
    pub fn from_public_key(key: &[u8]) -> Self {
        let digest = Sha1::digest(key);
        let mut token = [0u8; 8];
        for (slot, byte) in token.iter_mut().zip(digest[12..20].iter().rev()) {
            *slot = *byte;
        }
        PublicKeyToken(token)
    }

    /// Interprets an AssemblyRef blob, which holds either a token or a full key.
    ///
    /// Returns `None` for an empty blob (unsigned reference).
    #[must_use]
    pub fn from_blob(blob: &[u8], is_full_key: bool) -> Option<Self> {
        if blob.is_empty() {
            return None;
        }

        if !is_full_key && blob.len() == 8 {
            let mut token = [0u8; 8];
            token.copy_from_slice(blob);
            return Some(PublicKeyToken(token));
        }

        Some(PublicKeyToken::from_public_key(blob))
    }
}

impl FromStr for PublicKeyToken {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let bytes = hex::decode(value.trim())
            .map_err(|e| Error::InvalidArgument(format!("Invalid PublicKeyToken '{value}': {e}")))?;
        let token: [u8; 8] = bytes.try_into().map_err(|_| {
            Error::InvalidArgument(format!("PublicKeyToken '{value}' is not 8 bytes"))
        })?;

        Ok(PublicKeyToken(token))
    }
}

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A parsed assembly display name.
///
/// `None` fields were not specified. For the public key token, `Some(None)` means the
/// name explicitly says `PublicKeyToken=null`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssemblyName {
    /// Simple name
    pub name: String,
    /// Version, if specified
    pub version: Option<AssemblyVersion>,
    /// Culture, if specified; the invariant culture is the empty string
    pub culture: Option<String>,
    /// Public key token, if specified
    pub public_key_token: Option<Option<PublicKeyToken>>,
    /// `Retargetable=Yes`
    pub retargetable: bool,
}

impl AssemblyName {
    /// Builds a fully specified name, as read from metadata.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: AssemblyVersion,
        culture: impl Into<String>,
        public_key_token: Option<PublicKeyToken>,
    ) -> Self {
        AssemblyName {
            name: name.into(),
            version: Some(version),
            culture: Some(culture.into()),
            public_key_token: Some(public_key_token),
            retargetable: false,
        }
    }

    /// Parses a display name.
    ///
    /// Attribute keys are case-insensitive; unknown attributes (`ProcessorArchitecture`,
    /// `ContentType`, ...) are accepted and ignored.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for an empty simple name, an attribute without `=`, or an
    /// invalid version, token or key.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "Assembly name is empty in '{display_name}'"
            )));
        }

        let mut result = AssemblyName {
            name: name.to_string(),
            ..AssemblyName::default()
        };

        for part in parts.filter(|part| !part.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::InvalidArgument(format!(
                    "Attribute '{part}' has no value"
                )));
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "version" => result.version = Some(value.parse()?),
                "culture" => {
                    let culture = if value.eq_ignore_ascii_case("neutral") {
                        ""
                    } else {
                        value
                    };
                    result.culture = Some(culture.to_string());
                }
                "publickeytoken" => {
                    result.public_key_token = Some(if value.eq_ignore_ascii_case("null") {
                        None
                    } else {
                        Some(value.parse()?)
                    });
                }
                "publickey" => {
                    let key = hex::decode(value).map_err(|e| {
                        Error::InvalidArgument(format!("Invalid PublicKey '{value}': {e}"))
                    })?;
                    result.public_key_token = Some(PublicKeyToken::from_blob(&key, true));
                }
                "retargetable" => result.retargetable = value.eq_ignore_ascii_case("yes"),
                _ => {}
            }
        }

        Ok(result)
    }

    /// The canonical display name, listing the specified attributes in the runtime's order.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.to_string()
    }

    /// True if this (concrete) name is an acceptable answer to `requested`: same simple name
    /// ignoring case, and equal in every attribute `requested` specifies.
    #[must_use]
    pub fn satisfies(&self, requested: &AssemblyName) -> bool {
        if !self.name.eq_ignore_ascii_case(&requested.name) {
            return false;
        }

        if requested.version.is_some() && self.version != requested.version {
            return false;
        }

        if let Some(culture) = &requested.culture {
            let own = self.culture.as_deref().unwrap_or_default();
            if !own.eq_ignore_ascii_case(culture) {
                return false;
            }
        }

        if let Some(token) = &requested.public_key_token {
            if self.public_key_token.flatten() != *token {
                return false;
            }
        }

        true
    }
}

impl fmt::Display for AssemblyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;

        if let Some(version) = &self.version {
            write!(f, ", Version={version}")?;
        }

        if let Some(culture) = &self.culture {
            let culture = if culture.is_empty() { "neutral" } else { culture };
            write!(f, ", Culture={culture}")?;
        }

        match &self.public_key_token {
            Some(Some(token)) => write!(f, ", PublicKeyToken={token}")?,
            Some(None) => f.write_str(", PublicKeyToken=null")?,
            None => {}
        }

        if self.retargetable {
            f.write_str(", Retargetable=Yes")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECMA_KEY: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];

    #[test]
    fn ecma_key_token() {
        let token = PublicKeyToken::from_public_key(&ECMA_KEY);
        assert_eq!(token.to_string(), "b77a5c561934e089");

        assert_eq!(PublicKeyToken::from_blob(&ECMA_KEY, true), Some(token));
        assert_eq!(PublicKeyToken::from_blob(&[], false), None);
        assert_eq!(
            PublicKeyToken::from_blob(&[0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89], false),
            Some(token)
        );
    }

    #[test]
    fn parse_full_name() {
        let name = AssemblyName::parse(
            "System.Xml, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();

        assert_eq!(name.name, "System.Xml");
        assert_eq!(name.version, Some(AssemblyVersion::new(4, 0, 0, 0)));
        assert_eq!(name.culture.as_deref(), Some(""));
        assert_eq!(
            name.public_key_token.unwrap().unwrap().to_string(),
            "b77a5c561934e089"
        );
        assert_eq!(
            name.display_name(),
            "System.Xml, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn parse_partial_name() {
        let name = AssemblyName::parse("  Dep  ").unwrap();
        assert_eq!(name.name, "Dep");
        assert!(name.version.is_none());
        assert!(name.culture.is_none());
        assert!(name.public_key_token.is_none());
        assert_eq!(name.display_name(), "Dep");

        let name = AssemblyName::parse("Dep, version=1.2, PUBLICKEYTOKEN=null, Retargetable=Yes, ProcessorArchitecture=MSIL").unwrap();
        assert_eq!(name.version, Some(AssemblyVersion::new(1, 2, 0, 0)));
        assert_eq!(name.public_key_token, Some(None));
        assert!(name.retargetable);
        assert_eq!(
            name.display_name(),
            "Dep, Version=1.2.0.0, PublicKeyToken=null, Retargetable=Yes"
        );
    }

    #[test]
    fn parse_invalid() {
        for input in [
            "",
            " , Version=1.0.0.0",
            "Dep, Version",
            "Dep, Version=one",
            "Dep, Version=1.2.3.4.5",
            "Dep, PublicKeyToken=xyz",
            "Dep, PublicKeyToken=b77a5c56",
        ] {
            assert!(
                matches!(AssemblyName::parse(input), Err(Error::InvalidArgument(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn satisfies() {
        let concrete = AssemblyName::new(
            "Dep",
            AssemblyVersion::new(2, 0, 0, 0),
            "",
            Some(PublicKeyToken([1, 2, 3, 4, 5, 6, 7, 8])),
        );

        assert!(concrete.satisfies(&AssemblyName::parse("dep").unwrap()));
        assert!(concrete.satisfies(&AssemblyName::parse("Dep, Version=2.0.0.0").unwrap()));
        assert!(concrete.satisfies(
            &AssemblyName::parse("Dep, Culture=neutral, PublicKeyToken=0102030405060708").unwrap()
        ));

        assert!(!concrete.satisfies(&AssemblyName::parse("Other").unwrap()));
        assert!(!concrete.satisfies(&AssemblyName::parse("Dep, Version=1.0.0.0").unwrap()));
        assert!(!concrete.satisfies(&AssemblyName::parse("Dep, Culture=de-DE").unwrap()));
        assert!(!concrete.satisfies(&AssemblyName::parse("Dep, PublicKeyToken=null").unwrap()));
    }

    #[test]
    fn architecture_from_image() {
        assert_eq!(
            ProcessorArchitecture::from_image(MACHINE_I386, false, CorFlags::ILONLY),
            ProcessorArchitecture::MSIL
        );
        assert_eq!(
            ProcessorArchitecture::from_image(
                MACHINE_I386,
                false,
                CorFlags::ILONLY | CorFlags::REQUIRES_32BIT
            ),
            ProcessorArchitecture::X86
        );
        assert_eq!(
            ProcessorArchitecture::from_image(
                MACHINE_I386,
                false,
                CorFlags::ILONLY | CorFlags::REQUIRES_32BIT | CorFlags::PREFERS_32BIT
            ),
            ProcessorArchitecture::MSIL
        );
        assert_eq!(
            ProcessorArchitecture::from_image(MACHINE_I386, false, CorFlags::empty()),
            ProcessorArchitecture::X86
        );
        assert_eq!(
            ProcessorArchitecture::from_image(MACHINE_AMD64, true, CorFlags::ILONLY),
            ProcessorArchitecture::Amd64
        );
        assert_eq!(
            ProcessorArchitecture::from_image(MACHINE_ARM64, true, CorFlags::ILONLY),
            ProcessorArchitecture::Arm64
        );
    }

    #[test]
    fn architecture_names() {
        assert_eq!(ProcessorArchitecture::Amd64.to_string(), "Amd64");
        assert_eq!(ProcessorArchitecture::MSIL.to_string(), "MSIL");
        assert_eq!(ProcessorArchitecture::X86.to_string(), "X86");
        assert_eq!(
            "x64".parse::<ProcessorArchitecture>().unwrap(),
            ProcessorArchitecture::Amd64
        );
        assert_eq!(
            "msil".parse::<ProcessorArchitecture>().unwrap(),
            ProcessorArchitecture::MSIL
        );
    }
}
