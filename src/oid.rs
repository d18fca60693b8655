//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` to avoid heap allocation for common OIDs.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
///
/// An ordered sequence of `u32` arcs. Ordering is lexicographic over the
/// arcs, so a proper prefix always sorts before its descendants.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    ///
    /// An empty OID is never valid on the wire; it exists as a placeholder
    /// and as the root of every prefix test.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    ///
    /// ```
    /// use snmp_manager::oid::Oid;
    ///
    /// let oid = Oid::new([1, 3, 6, 1]);
    /// assert_eq!(oid.len(), 4);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted-decimal text (e.g., "1.3.6.1.2.1.1.1.0").
    ///
    /// A single leading dot is accepted (`".1.3.6.1"`), as printed by
    /// net-snmp tools. Empty input, empty components and non-numeric or
    /// out-of-range arcs are rejected.
    ///
    /// Arc constraints from X.690 are not checked here; see
    /// [`validate()`](Self::validate).
    ///
    /// ```
    /// use snmp_manager::oid::Oid;
    ///
    /// let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
    /// assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
    ///
    /// assert!(Oid::parse("").is_err());
    /// assert!(Oid::parse("1..3").is_err());
    /// assert!(Oid::parse("1.3.").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s).boxed());
        }

        let mut arcs = SmallVec::new();
        for part in body.split('.') {
            // u32::from_str accepts a leading '+', which is not dotted-decimal
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s).boxed());
            }
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s).boxed())?;
            arcs.push(arc);
        }

        if arcs.len() > MAX_OID_LEN {
            let kind = OidErrorKind::TooManyArcs {
                count: arcs.len(),
                max: MAX_OID_LEN,
            };
            return Err(Error::invalid_oid_with_input(kind, s).boxed());
        }

        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with another OID.
    ///
    /// An OID always starts with itself, and any OID starts with an empty OID.
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Check if this OID lies strictly inside the subtree rooted at `root`.
    ///
    /// True when `root` is a proper prefix of `self`: same leading arcs
    /// followed by at least one more.
    ///
    /// ```
    /// use snmp_manager::oid;
    ///
    /// let system = oid!(1, 3, 6, 1, 2, 1, 1);
    /// assert!(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0).is_descendant_of(&system));
    /// assert!(!system.is_descendant_of(&system));
    /// assert!(!oid!(1, 3, 6, 1, 2, 1, 2, 1).is_descendant_of(&system));
    /// ```
    pub fn is_descendant_of(&self, root: &Oid) -> bool {
        self.arcs.len() > root.arcs.len() && self.starts_with(root)
    }

    /// Get the parent OID (all arcs except the last).
    ///
    /// Returns `None` if the OID is empty.
    pub fn parent(&self) -> Option<Oid> {
        if self.arcs.is_empty() {
            None
        } else {
            Some(Oid {
                arcs: SmallVec::from_slice(&self.arcs[..self.arcs.len() - 1]),
            })
        }
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Validate OID arcs per X.690 Section 8.19.4.
    ///
    /// - arc1 must be 0, 1, or 2
    /// - arc2 must be <= 39 when arc1 is 0 or 1
    ///
    /// ```
    /// use snmp_manager::oid::Oid;
    ///
    /// assert!(Oid::from_slice(&[1, 3, 6, 1]).validate().is_ok());
    /// assert!(Oid::from_slice(&[3, 0]).validate().is_err());
    /// assert!(Oid::from_slice(&[0, 40]).validate().is_err());
    /// assert!(Oid::from_slice(&[2, 999]).validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<()> {
        let Some(&arc1) = self.arcs.first() else {
            return Ok(());
        };

        if arc1 > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(arc1)).boxed());
        }

        if let Some(&arc2) = self.arcs.get(1)
            && ((arc1 < 2 && arc2 >= 40) || arc2 > u32::MAX - 80)
        {
            return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                first: arc1,
                second: arc2,
            })
            .boxed());
        }

        Ok(())
    }

    /// Validate that the OID doesn't exceed [`MAX_OID_LEN`] arcs.
    pub fn validate_length(&self) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            })
            .boxed());
        }
        Ok(())
    }

    /// Validate everything required to put this OID in a request.
    ///
    /// Checks the arc count is between 2 and [`MAX_OID_LEN`] and the
    /// first two arcs satisfy [`validate()`](Self::validate). OIDs that
    /// pass encode and decode back to the same arcs.
    pub fn validate_for_wire(&self) -> Result<()> {
        if self.arcs.is_empty() {
            return Err(Error::invalid_oid(OidErrorKind::Empty).boxed());
        }
        if self.arcs.len() < 2 {
            return Err(Error::invalid_oid(OidErrorKind::TooShort).boxed());
        }
        self.validate()?;
        self.validate_length()
    }

    /// Encode the OID content octets (X.690 Section 8.19).
    ///
    /// - First two arcs encoded as (arc1 * 40) + arc2 using base-128
    /// - Remaining arcs encoded as base-128 variable length
    ///
    /// Encoding does not validate; an OID that fails
    /// [`validate_for_wire()`](Self::validate_for_wire) will not decode
    /// back to the same arcs.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        let first_subid = match self.arcs.as_slice() {
            [] => return bytes,
            [arc1] => arc1.saturating_mul(40),
            [arc1, arc2, ..] => arc1.saturating_mul(40).saturating_add(*arc2),
        };
        encode_subidentifier(&mut bytes, first_subid);

        for &arc in self.arcs.iter().skip(2) {
            encode_subidentifier(&mut bytes, arc);
        }

        bytes
    }

    /// Decode from BER content octets.
    ///
    /// Empty content is an error. Enforces [`MAX_OID_LEN`].
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::EmptyOid).boxed());
        }

        let mut arcs = SmallVec::new();

        let (first_subid, consumed) = decode_subidentifier(data, 0)?;
        match first_subid {
            0..40 => arcs.extend([0, first_subid]),
            40..80 => arcs.extend([1, first_subid - 40]),
            _ => arcs.extend([2, first_subid - 80]),
        }

        let mut i = consumed;
        while i < data.len() {
            let (arc, bytes_consumed) = decode_subidentifier(&data[i..], i)?;
            arcs.push(arc);
            i += bytes_consumed;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(i, DecodeErrorKind::InvalidOidEncoding).boxed());
            }
        }

        Ok(Self { arcs })
    }
}

/// Encode a subidentifier in base-128, most significant group first.
#[inline]
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    if value == 0 {
        bytes.push(0);
        return;
    }

    let groups = (32 - value.leading_zeros()).div_ceil(7);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode a subidentifier, returning (value, bytes_consumed).
///
/// `base` is the offset of `data` within the OID content, for error reporting.
fn decode_subidentifier(data: &[u8], base: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(Error::decode(base + i, DecodeErrorKind::IntegerOverflow).boxed());
        }

        value = (value << 7) | u32::from(byte & 0x7F);

        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(Error::decode(base + data.len(), DecodeErrorKind::TruncatedData).boxed())
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.arcs.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
            for arc in arcs {
                write!(f, ".{}", arc)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Macro to create an OID from literal arcs.
///
/// ```
/// use snmp_manager::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// assert!(sys_descr.starts_with(&oid!(1, 3, 6, 1, 2, 1, 1)));
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);

        let dotted = Oid::parse(".1.3.6.1").unwrap();
        assert_eq!(dotted.arcs(), &[1, 3, 6, 1]);
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        for input in ["", ".", "1..3", "1.3.", "1.3.abc.1", "1.3.-6.1", "1.+3", " 1.3", "1.4294967296"] {
            assert!(Oid::parse(input).is_err(), "{input:?} should be rejected");
        }
        assert_eq!(Oid::parse("1.4294967295").unwrap().arcs(), &[1, u32::MAX]);
    }

    #[test]
    fn test_parse_rejects_too_many_arcs() {
        let text = vec!["1"; MAX_OID_LEN + 1].join(".");
        let err = Oid::parse(&text).unwrap_err();
        assert!(matches!(
            *err,
            Error::InvalidOid {
                kind: OidErrorKind::TooManyArcs { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_display() {
        let oid = Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(Oid::empty().to_string(), "");
        assert_eq!(format!("{:?}", oid!(1, 3)), "Oid(1.3)");
    }

    #[test]
    fn test_display_parse_roundtrip() {
        let original = oid!(1, 3, 6, 1, 4, 1, 9, 9, 42);
        let parsed: Oid = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_starts_with_and_descendant() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let prefix = Oid::parse("1.3.6.1").unwrap();
        assert!(oid.starts_with(&prefix));
        assert!(!prefix.starts_with(&oid));
        assert!(oid.is_descendant_of(&prefix));
        assert!(!oid.is_descendant_of(&oid));
        // sibling sharing a numeric prefix is not a descendant
        assert!(!oid!(1, 3, 6, 10).is_descendant_of(&oid!(1, 3, 6, 1)));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(oid!(1, 3, 6) < oid!(1, 3, 6, 1));
        assert!(oid!(1, 3, 6, 1, 2) < oid!(1, 3, 6, 2));
        assert!(oid!(1, 3, 6, 9) < oid!(1, 3, 6, 10));
        assert!(oid!(1, 3, 7) > oid!(1, 3, 6, 1, 2, 1));
    }

    #[test]
    fn test_parent_child() {
        let system = oid!(1, 3, 6, 1, 2, 1, 1);
        let sys_descr = system.child(1).child(0);
        assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(sys_descr.parent().unwrap().parent().unwrap(), system);
        assert!(Oid::empty().parent().is_none());
    }

    #[test]
    fn test_ber_encoding() {
        // 1.3.6.1 encodes as: (1*40+3)=43, 6, 1
        let oid = Oid::parse("1.3.6.1").unwrap();
        assert_eq!(oid.to_ber().as_slice(), &[0x2B, 0x06, 0x01]);
    }

    #[test]
    fn test_ber_roundtrip() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let decoded = Oid::from_ber(&oid.to_ber()).unwrap();
        assert_eq!(oid, decoded);
    }

    #[test]
    fn test_ber_multibyte_arcs() {
        // 1.3.6.1.4.1.2021 => 2021 = 0x0F 0x65 in base-128
        let oid = oid!(1, 3, 6, 1, 4, 1, 2021);
        assert_eq!(
            oid.to_ber().as_slice(),
            &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x8F, 0x65]
        );

        let max = oid!(1, 3, u32::MAX);
        assert_eq!(
            max.to_ber().as_slice(),
            &[0x2B, 0x8F, 0xFF, 0xFF, 0xFF, 0x7F]
        );
        assert_eq!(Oid::from_ber(&max.to_ber()).unwrap(), max);
    }

    #[test]
    fn test_ber_encoding_large_arc2() {
        // X.690 example {2 999 3}: first subid = 1079 = 0x88 0x37
        let oid = Oid::from_slice(&[2, 999, 3]);
        assert_eq!(oid.to_ber().as_slice(), &[0x88, 0x37, 0x03]);
        assert_eq!(Oid::from_ber(&[0x88, 0x37, 0x03]).unwrap(), oid);
    }

    #[test]
    fn test_ber_encoding_first_subid_boundaries() {
        assert_eq!(oid!(2, 0).to_ber().as_slice(), &[80]);
        assert_eq!(oid!(2, 47).to_ber().as_slice(), &[127]);
        assert_eq!(oid!(2, 48).to_ber().as_slice(), &[0x81, 0x00]);
        assert_eq!(oid!(0, 0).to_ber().as_slice(), &[0]);
    }

    #[test]
    fn test_from_ber_rejects_empty() {
        let err = Oid::from_ber(&[]).unwrap_err();
        assert!(matches!(
            *err,
            Error::Decode {
                kind: DecodeErrorKind::EmptyOid,
                ..
            }
        ));
    }

    #[test]
    fn test_from_ber_rejects_truncated_arc() {
        // continuation bit set on the final byte
        let err = Oid::from_ber(&[0x2B, 0x06, 0x81]).unwrap_err();
        assert!(matches!(
            *err,
            Error::Decode {
                kind: DecodeErrorKind::TruncatedData,
                ..
            }
        ));
    }

    #[test]
    fn test_from_ber_rejects_arc_overflow() {
        // six groups exceed u32
        let err = Oid::from_ber(&[0x2B, 0x90, 0x80, 0x80, 0x80, 0x80, 0x00]).unwrap_err();
        assert!(matches!(
            *err,
            Error::Decode {
                kind: DecodeErrorKind::IntegerOverflow,
                ..
            }
        ));
    }

    #[test]
    fn test_from_ber_accepts_non_minimal_subidentifier() {
        assert_eq!(Oid::from_ber(&[0x2B, 0x80, 0x01]).unwrap().arcs(), &[1, 3, 1]);
    }

    #[test]
    fn test_from_ber_enforces_max_oid_len() {
        let mut at_limit = vec![0x2B];
        at_limit.extend(std::iter::repeat_n(0x01, MAX_OID_LEN - 2));
        assert_eq!(Oid::from_ber(&at_limit).unwrap().len(), MAX_OID_LEN);

        let mut over_limit = vec![0x2B];
        over_limit.extend(std::iter::repeat_n(0x01, MAX_OID_LEN - 1));
        assert!(Oid::from_ber(&over_limit).is_err());
    }

    #[test]
    fn test_validate_arcs() {
        assert!(Oid::from_slice(&[3, 0]).validate().is_err());
        assert!(Oid::from_slice(&[0, 39]).validate().is_ok());
        assert!(Oid::from_slice(&[1, 40]).validate().is_err());
        assert!(Oid::from_slice(&[2, 999]).validate().is_ok());
        assert!(Oid::from_slice(&[2, u32::MAX]).validate().is_err());
    }

    #[test]
    fn test_validate_for_wire() {
        assert!(oid!(1, 3, 6, 1).validate_for_wire().is_ok());

        let err = Oid::empty().validate_for_wire().unwrap_err();
        assert!(matches!(*err, Error::InvalidOid { kind: OidErrorKind::Empty, .. }));

        let err = oid!(1).validate_for_wire().unwrap_err();
        assert!(matches!(*err, Error::InvalidOid { kind: OidErrorKind::TooShort, .. }));

        let too_long = Oid::new((0..(MAX_OID_LEN + 1) as u32).map(|i| i % 30));
        assert!(too_long.validate_for_wire().is_err());
    }
}
