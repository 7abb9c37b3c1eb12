/// A known payload layout: leading header bytes, a length-prefixed URL,
/// then a terminator field carrying an optional mirror URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub version: &'static str,
    pub header: &'static [u8],
    pub terminator_tag: &'static [u8],
}

/// Signatures observed in the wild. Add new layouts here; never loosen the match.
pub const SIGNATURES: &[Signature] = &[Signature {
    version: "v1",
    header: &[0x08, 0x13, 0x22],
    terminator_tag: &[0xd2, 0x01],
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_versions_unique() {
        let mut seen = std::collections::HashSet::new();
        for signature in SIGNATURES {
            assert!(
                seen.insert(signature.version),
                "Duplicate signature version: {}",
                signature.version
            );
            assert!(!signature.header.is_empty());
            assert!(!signature.terminator_tag.is_empty());
        }
    }
}
