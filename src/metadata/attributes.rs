//! Decoding of the few assembly-level custom attributes that describe how a module was
//! built.
//!
//! A custom attribute value blob (ECMA-335 II.23.3) is a `0x0001` prolog followed by the
//! constructor's fixed arguments, laid out according to the constructor's method signature,
//! and then the named arguments. Only fixed arguments are read here.

use crate::{file::parser::Parser, Result};

/// Namespace of `DebuggableAttribute`
pub const DEBUGGABLE_NAMESPACE: &str = "System.Diagnostics";
/// Name of `DebuggableAttribute`
pub const DEBUGGABLE_NAME: &str = "DebuggableAttribute";
/// Namespace of `TargetFrameworkAttribute`
pub const TARGET_FRAMEWORK_NAMESPACE: &str = "System.Runtime.Versioning";
/// Name of `TargetFrameworkAttribute`
pub const TARGET_FRAMEWORK_NAME: &str = "TargetFrameworkAttribute";

/// `DebuggingModes.Default`: JIT tracking on.
pub const DEBUGGING_MODES_DEFAULT: i32 = 0x0001;
/// `DebuggingModes.DisableOptimizations`
pub const DEBUGGING_MODES_DISABLE_OPTIMIZATIONS: i32 = 0x0100;

const ELEMENT_TYPE_BOOLEAN: u8 = 0x02;
const ELEMENT_TYPE_I4: u8 = 0x08;
const ELEMENT_TYPE_VALUETYPE: u8 = 0x11;

const PROLOG: u16 = 0x0001;

/// Parameter element types of a method signature, as far as they can be told apart by
/// their leading byte.
fn parameter_types(signature: &[u8]) -> Result<Vec<u8>> {
    let mut parser = Parser::new(signature);

    let _calling_convention = parser.read_le::<u8>()?;
    let count = parser.read_compressed_uint()?;
    let _return_type = parser.read_le::<u8>()?;

    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let element = parser.read_le::<u8>()?;
        if element == ELEMENT_TYPE_VALUETYPE {
            let _type_token = parser.read_compressed_uint()?;
        }
        types.push(element);
    }

    Ok(types)
}

fn read_prolog(parser: &mut Parser) -> Result<()> {
    let prolog = parser.read_le::<u16>()?;
    if prolog != PROLOG {
        return Err(malformed_error!(
            "Invalid custom attribute prolog - {:#06x}",
            prolog
        ));
    }

    Ok(())
}

/// Decodes a `DebuggableAttribute` instance into "was this built for debugging".
///
/// Both constructors are understood: `(bool isJITTrackingEnabled, bool
/// isJITOptimizerDisabled)` and `(DebuggingModes modes)`. The module counts as a debug
/// build if JIT tracking is enabled or optimizations are disabled.
///
/// # Errors
/// Fails for an unknown constructor shape or a truncated blob.
pub fn decode_debuggable(ctor_signature: &[u8], value: &[u8]) -> Result<bool> {
    let types = parameter_types(ctor_signature)?;

    let mut parser = Parser::new(value);
    read_prolog(&mut parser)?;

    match types.as_slice() {
        [ELEMENT_TYPE_BOOLEAN, ELEMENT_TYPE_BOOLEAN] => {
            let tracking = parser.read_le::<u8>()? != 0;
            let optimizer_disabled = parser.read_le::<u8>()? != 0;
            Ok(tracking || optimizer_disabled)
        }
        [ELEMENT_TYPE_I4 | ELEMENT_TYPE_VALUETYPE] => {
            let modes = parser.read_le::<i32>()?;
            Ok(modes & (DEBUGGING_MODES_DEFAULT | DEBUGGING_MODES_DISABLE_OPTIMIZATIONS) != 0)
        }
        other => Err(malformed_error!(
            "Unexpected DebuggableAttribute constructor - {:?}",
            other
        )),
    }
}

/// Decodes the single string argument of an attribute such as `TargetFrameworkAttribute`.
///
/// Returns `None` for a null string.
///
/// # Errors
/// Fails for a bad prolog or a truncated blob.
pub fn decode_string_argument(value: &[u8]) -> Result<Option<String>> {
    let mut parser = Parser::new(value);
    read_prolog(&mut parser)?;
    parser.read_ser_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const CTOR_BOOL_BOOL: [u8; 5] = [0x20, 2, 0x01, 0x02, 0x02];
    const CTOR_MODES: [u8; 5] = [0x20, 1, 0x01, 0x11, 0x09];

    #[test]
    fn debuggable_bools() {
        assert!(decode_debuggable(&CTOR_BOOL_BOOL, &[1, 0, 1, 0, 0, 0]).unwrap());
        assert!(decode_debuggable(&CTOR_BOOL_BOOL, &[1, 0, 0, 1, 0, 0]).unwrap());
        assert!(!decode_debuggable(&CTOR_BOOL_BOOL, &[1, 0, 0, 0, 0, 0]).unwrap());
    }

    #[test]
    fn debuggable_modes() {
        // Release builds carry IgnoreSymbolStoreSequencePoints only
        assert!(!decode_debuggable(&CTOR_MODES, &[1, 0, 2, 0, 0, 0, 0, 0]).unwrap());
        // Default | DisableOptimizations | IgnoreSymbolStoreSequencePoints | EnableEditAndContinue
        assert!(decode_debuggable(&CTOR_MODES, &[1, 0, 7, 1, 0, 0, 0, 0]).unwrap());
        assert!(decode_debuggable(&CTOR_MODES, &[1, 0, 0, 1, 0, 0, 0, 0]).unwrap());
    }

    #[test]
    fn debuggable_invalid() {
        assert!(matches!(
            decode_debuggable(&CTOR_BOOL_BOOL, &[2, 0, 1, 1]),
            Err(Error::Malformed { .. })
        ));
        assert!(decode_debuggable(&CTOR_BOOL_BOOL, &[1, 0, 1]).is_err());
        assert!(decode_debuggable(&[0x20, 0, 0x01], &[1, 0]).is_err());
    }

    #[test]
    fn string_argument() {
        let mut blob = vec![1, 0, 24];
        blob.extend_from_slice(b".NETFramework,Version=v4");
        blob.extend_from_slice(&[0, 0]);
        assert_eq!(
            decode_string_argument(&blob).unwrap().as_deref(),
            Some(".NETFramework,Version=v4")
        );

        assert_eq!(decode_string_argument(&[1, 0, 0xFF, 0, 0]).unwrap(), None);
        assert!(decode_string_argument(&[1, 0, 10, b'a']).is_err());
    }
}
