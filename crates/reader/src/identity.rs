use std::fmt::Write;

use apicheck_metadata::Module;
use sha1::{Digest, Sha1};

/// The display name of the assembly a module belongs to:
/// `Name, Version=1.2.0.0, Culture=neutral, PublicKeyToken=0123456789abcdef`.
///
/// Netmodules without an Assembly row are identified by their module name.
pub fn assembly_identity(module: &Module) -> String {
    let Some(assembly) = &module.assembly else {
        return module.name.clone();
    };
    let [major, minor, build, revision] = assembly.version;
    let culture = if assembly.culture.is_empty() {
        "neutral"
    } else {
        assembly.culture.as_str()
    };
    let token = match public_key_token(&assembly.public_key) {
        Some(token) => token.iter().fold(String::with_capacity(16), |mut hex, b| {
            let _ = write!(hex, "{:02x}", b);
            hex
        }),
        None => "null".to_string(),
    };
    format!(
        "{}, Version={}.{}.{}.{}, Culture={}, PublicKeyToken={}",
        assembly.name, major, minor, build, revision, culture, token
    )
}

/// Last eight bytes of the key's SHA-1 hash, reversed.
pub fn public_key_token(public_key: &[u8]) -> Option<[u8; 8]> {
    if public_key.is_empty() {
        return None;
    }
    let digest = Sha1::digest(public_key);
    let mut token = [0u8; 8];
    for (slot, byte) in token.iter_mut().zip(digest[12..].iter().rev()) {
        *slot = *byte;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicheck_metadata::AssemblyInfo;

    #[test]
    fn test_standard_public_key_token() {
        let ecma_key = [0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            public_key_token(&ecma_key),
            Some([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89])
        );
        assert_eq!(public_key_token(&[]), None);
    }

    #[test]
    fn test_identity_string() {
        let mut module = Module {
            name: "Widgets.dll".to_string(),
            ..Default::default()
        };
        assert_eq!(assembly_identity(&module), "Widgets.dll");

        module.assembly = Some(AssemblyInfo {
            name: "Widgets".to_string(),
            version: [2, 1, 0, 0],
            culture: String::new(),
            public_key: Vec::new(),
            flags: 0,
        });
        assert_eq!(
            assembly_identity(&module),
            "Widgets, Version=2.1.0.0, Culture=neutral, PublicKeyToken=null"
        );

        if let Some(assembly) = module.assembly.as_mut() {
            assembly.culture = "fr-FR".to_string();
            assembly.public_key = vec![0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        }
        assert_eq!(
            assembly_identity(&module),
            "Widgets, Version=2.1.0.0, Culture=fr-FR, PublicKeyToken=b77a5c561934e089"
        );
    }
}
